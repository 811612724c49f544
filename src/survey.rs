use log::{debug, info, warn};

use snafu::{prelude::*, Snafu};
use species_ranking::builder::CatalogBuilder;
use species_ranking::*;

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use text_diff::print_diff;

pub mod config_reader;
pub mod io_common;
pub mod io_csv;
pub mod io_excel;
pub mod report;

use crate::survey::config_reader::*;
use crate::survey::io_common::{make_default_id, Table};

#[derive(Debug, Snafu)]
pub enum SurveyError {
    #[snafu(display("Error opening file {path}"))]
    OpeningExcel {
        source: calamine::XlsxError,
        path: String,
    },
    #[snafu(display("Missing worksheet {sheet} in {path}"))]
    MissingSheet { path: String, sheet: String },
    #[snafu(display("No worksheet in {path}"))]
    EmptyExcel { path: String },
    #[snafu(display("Error opening file {path}"))]
    OpeningJson {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error parsing the JSON file {path}"))]
    ParsingJson {
        source: serde_json::Error,
        path: String,
    },
    #[snafu(display("Error serializing the summary"))]
    WritingJson { source: serde_json::Error },
    #[snafu(display("Error opening file {path}"))]
    CsvOpen { source: csv::Error, path: String },
    #[snafu(display("Error reading line {lineno} of {path}"))]
    CsvLineParse {
        source: csv::Error,
        path: String,
        lineno: usize,
    },
    #[snafu(display("Error writing the CSV report {path}"))]
    CsvWrite { source: csv::Error, path: String },
    #[snafu(display("Error writing {path}"))]
    WritingOutput {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Invalid column reference {content}"))]
    InvalidColumn { content: String },
    #[snafu(display("Column {column} not found in the first row of {path}"))]
    MissingColumn { column: String, path: String },
    #[snafu(display("Invalid reference data or rules"))]
    Catalog { source: RankingErrors },
    #[snafu(display("Cannot find the directory of {path}"))]
    MissingParentDir { path: String },

    #[snafu(whatever, display("{message}"))]
    Whatever {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error>, Some)))]
        source: Option<Box<dyn std::error::Error>>,
    },
}

pub type SurveyResult<T> = Result<T, SurveyError>;

/// One row of a record table, with its id.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct SurveyRecord {
    pub id: String,
    pub fields: BTreeMap<String, String>,
}

fn resolve_path(root: &Path, file_path: &str) -> String {
    let p: PathBuf = [root, Path::new(file_path)].iter().collect();
    p.as_path().display().to_string()
}

fn read_table(
    root: &Path,
    provider: Provider,
    file_path: &str,
    sheet: Option<&str>,
) -> SurveyResult<Table> {
    let path = resolve_path(root, file_path);
    info!("Attempting to read {:?} file {:?}", provider, path);
    match provider {
        Provider::Csv => {
            if sheet.is_some() {
                warn!("read_table: {}: sheet is ignored for CSV files", path);
            }
            io_csv::read_csv_table(&path)
        }
        Provider::Xlsx => io_excel::read_excel_table(&path, sheet),
    }
}

/// Reads the membership lists and the common names into a catalog.
pub fn load_catalog(
    root: &Path,
    reference: &ReferenceConfig,
    case: NameCase,
) -> SurveyResult<ReferenceCatalog> {
    let mut builder = CatalogBuilder::new().name_case(case);
    for ls in reference.membership_lists.iter() {
        let table = read_table(root, ls.provider, &ls.file_path, ls.sheet.as_deref())?;
        let entries = table.column_values(&ls.column()?, ls.first_row()?)?;
        debug!("load_catalog: list {}: {} rows", ls.name, entries.len());
        builder = builder
            .membership_list(&ls.name, &entries)
            .context(CatalogSnafu {})?;
    }

    if let Some(cn) = &reference.common_names {
        let table = read_table(root, cn.provider, &cn.file_path, cn.sheet.as_deref())?;
        let first_row = cn.first_row()?;
        let botanical = table.column_values(&cn.botanical_column()?, first_row)?;
        let common = table.column_values(&cn.common_column()?, first_row)?;
        let pairs: Vec<(String, String)> = botanical.into_iter().zip(common).collect();
        builder = builder.common_names(&pairs);
    } else {
        warn!("load_catalog: no common names table, the botanical names will be used");
    }

    let catalog = builder.build();
    for l in catalog.membership_lists() {
        if l.is_empty() {
            warn!("load_catalog: membership list {} is empty", l.name());
        }
    }
    Ok(catalog)
}

/// Checks the rules against the catalog before any record is processed.
pub fn validate_rules(
    config: &SurveyConfig,
    catalog: &ReferenceCatalog,
) -> SurveyResult<SurveyRules> {
    if config.record_sources.is_empty() {
        whatever!("No record source detected");
    }
    let rules = config.rules()?;
    rules.validate(catalog).context(CatalogSnafu {})?;
    Ok(rules)
}

fn read_records(
    root: &Path,
    sources: &[RecordSource],
    input_override: Option<String>,
) -> SurveyResult<Vec<SurveyRecord>> {
    let mut res: Vec<SurveyRecord> = Vec::new();
    for (idx, source) in sources.iter().enumerate() {
        // The input from the command line replaces the first source.
        let path = match (&input_override, idx) {
            (Some(p), 0) => p.clone(),
            _ => resolve_path(root, &source.file_path),
        };
        let table = match source.provider {
            Provider::Csv => io_csv::read_csv_table(&path)?,
            Provider::Xlsx => io_excel::read_excel_table(&path, source.sheet.as_deref())?,
        };
        let default_id = make_default_id(&path);
        let mut count = 0;
        for (lineno, fields) in table.records() {
            let id = match source.id_field.as_ref().and_then(|f| fields.get(f)) {
                Some(id) if !id.trim().is_empty() => id.trim().to_string(),
                _ => default_id(lineno),
            };
            res.push(SurveyRecord { id, fields });
            count += 1;
        }
        info!("read_records: {} records in {}", count, path);
    }
    Ok(res)
}

pub fn run_survey(
    config_path: &str,
    in_path: Option<String>,
    out_path: Option<String>,
    csv_out_path: Option<String>,
    check_summary_path: Option<String>,
) -> SurveyResult<()> {
    info!("Opening file {:?}", config_path);
    let config = read_config(config_path)?;
    let root_p = Path::new(config_path)
        .parent()
        .context(MissingParentDirSnafu { path: config_path })?;

    let catalog = load_catalog(
        root_p,
        &config.reference,
        config.output_settings.name_case(),
    )?;
    let rules = validate_rules(&config, &catalog)?;

    let records = read_records(root_p, &config.record_sources, in_path)?;
    if records.is_empty() {
        warn!("run_survey: no record found");
    }

    let results: Vec<(String, RecordResult)> = records
        .par_iter()
        .map(|r| (r.id.clone(), process_record(&r.fields, &rules, &catalog)))
        .collect();
    info!("run_survey: processed {} records", results.len());

    let result_js = report::summary_js(&config.output_config(), &results);
    let pretty_js_stats = serde_json::to_string_pretty(&result_js).context(WritingJsonSnafu {})?;

    match out_path.as_deref() {
        None | Some("stdout") => {
            println!("{}", pretty_js_stats);
        }
        Some(out) => {
            fs::write(out, &pretty_js_stats).context(WritingOutputSnafu { path: out })?;
            info!("Summary written to {}", out);
        }
    }

    if let Some(csv_out) = csv_out_path {
        let path = match &config.output_settings.output_directory {
            Some(dir) if Path::new(&csv_out).parent() == Some(Path::new("")) => {
                resolve_path(Path::new(&resolve_path(root_p, dir)), &csv_out)
            }
            _ => csv_out,
        };
        let header = report::flat_header(&rules);
        let absent = config.output_settings.absent_cover();
        let rows: Vec<Vec<String>> = results
            .iter()
            .map(|(id, res)| report::flat_row(id, res, &rules, &absent))
            .collect();
        io_csv::write_csv_report(&path, &header, &rows)?;
        info!("CSV report written to {}", path);
    }

    // The reference summary, if provided for comparison
    if let Some(summary_p) = check_summary_path {
        let summary_ref = read_summary(&summary_p)?;
        let pretty_js_summary_ref =
            serde_json::to_string_pretty(&summary_ref).context(WritingJsonSnafu {})?;
        if pretty_js_summary_ref != pretty_js_stats {
            warn!("Found differences with the reference summary");
            print_diff(
                pretty_js_summary_ref.as_str(),
                pretty_js_stats.as_ref(),
                "\n",
            );
            whatever!("Difference detected between calculated summary and reference summary")
        }
    }

    Ok(())
}

#[cfg(test)]
fn test_dir() -> &'static str {
    option_env!("VEGRANK_TEST_DIR").unwrap_or(concat!(env!("CARGO_MANIFEST_DIR"), "/tests"))
}

#[cfg(test)]
fn run_survey_test(test_name: &str, config_lpath: &str, summary_lpath: &str) -> SurveyResult<()> {
    let test_dir = test_dir();
    info!("Running test {}", test_name);
    let res = run_survey(
        &format!("{}/{}/{}", test_dir, test_name, config_lpath),
        None,
        None,
        None,
        Some(format!("{}/{}/{}", test_dir, test_name, summary_lpath)),
    );
    if let Err(e) = &res {
        warn!("Error occured {:?}", e);
        eprintln!("An error occured {}", e);
        if let Some(bt) = snafu::ErrorCompat::backtrace(e) {
            eprintln!("trace: {}", bt);
        }
    }
    res
}

#[cfg(test)]
pub fn test_wrapper(test_name: &str) -> SurveyResult<()> {
    run_survey_test(
        test_name,
        format!("{}_config.json", test_name).as_str(),
        format!("{}_expected_summary.json", test_name).as_str(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn init() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    #[test]
    fn star_transect() {
        init();
        assert!(test_wrapper("star_transect").is_ok());
    }

    #[test]
    fn star_transect_csv_report() {
        init();
        let config = format!("{}/star_transect/star_transect_config.json", test_dir());
        let tmp = std::env::temp_dir();
        let json_out = tmp.join("vegrank_star_transect.json").display().to_string();
        let out_s = tmp.join("vegrank_star_transect_report.csv").display().to_string();
        run_survey(&config, None, Some(json_out), Some(out_s.clone()), None).unwrap();

        let table = io_csv::read_csv_table(&out_s).unwrap();
        let header = &table.rows()[0];
        assert_eq!(header[0], "id");
        assert_eq!(header[1], "3P_bot_1");
        assert!(header.contains(&"perennial".to_string()));

        let records: Vec<(usize, BTreeMap<String, String>)> = table.records();
        assert_eq!(records.len(), 2);
        let first = &records[0].1;
        assert_eq!(first["id"], "ABC01");
        assert_eq!(first["3P_common_1"], "Kangaroo grass");
        assert_eq!(first["PG_bot_3"], "Enneapogon polyphyllus");
        // Absent covers are written as zero by default.
        assert_eq!(first["PG_cover_3"], "0");
        assert_eq!(first["AF_cover_1"], "1.5");
        assert_eq!(first["AF_bot_3"], "");
        assert_eq!(first["forb"], "5.5");
        // 8 recorded, minus the annual forbs.
        assert_eq!(first["perennial_forb_adjusted"], "6.5");
        let second = &records[1].1;
        assert_eq!(second["id"], "star_records.csv-00000003");
        assert_eq!(second["perennial"], "0");
        assert_eq!(second["perennial_forb_adjusted"], "3");
    }

    #[test]
    fn unknown_list_is_rejected_before_reading_records() {
        init();
        let config_path = format!("{}/star_transect/star_transect_config.json", test_dir());
        let mut config = read_config(&config_path).unwrap();
        config.groups[0].membership_list = Some("Unknown".to_string());
        let root = Path::new(&config_path).parent().unwrap();
        let catalog = load_catalog(root, &config.reference, NameCase::Sentence).unwrap();
        let res = validate_rules(&config, &catalog);
        assert!(matches!(
            res,
            Err(SurveyError::Catalog {
                source: RankingErrors::UnknownList(_)
            })
        ));
    }

    #[test]
    fn total_named_like_a_report_column_is_rejected() {
        init();
        let config_path = format!("{}/star_transect/star_transect_config.json", test_dir());
        let mut config = read_config(&config_path).unwrap();
        config.totals[0].name = "3P_total".to_string();
        let root = Path::new(&config_path).parent().unwrap();
        let catalog = load_catalog(root, &config.reference, NameCase::Sentence).unwrap();
        assert!(matches!(
            validate_rules(&config, &catalog),
            Err(SurveyError::Catalog {
                source: RankingErrors::ReservedName(_)
            })
        ));
    }

    #[test]
    fn missing_reference_table() {
        init();
        let res = run_survey(
            &format!("{}/star_transect/missing_table_config.json", test_dir()),
            None,
            None,
            None,
            None,
        );
        assert!(matches!(res, Err(SurveyError::CsvOpen { .. })));
    }
}
