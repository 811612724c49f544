// Primitives for reading and writing CSV files.

use crate::survey::*;

pub fn read_csv_table(path: &str) -> SurveyResult<Table> {
    let rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .context(CsvOpenSnafu { path })?;
    let mut rows: Vec<Vec<String>> = Vec::new();
    for (idx, line_r) in rdr.into_records().enumerate() {
        // The index starts at 1 to respect most conventions in the excel world
        let lineno = idx + 1;
        let line = line_r.context(CsvLineParseSnafu { path, lineno })?;
        rows.push(line.iter().map(|s| s.to_string()).collect());
    }
    debug!("read_csv_table: {}: {} rows", path, rows.len());
    Ok(Table::new(path, rows))
}

pub fn write_csv_report(path: &str, header: &[String], rows: &[Vec<String>]) -> SurveyResult<()> {
    let mut wtr = csv::Writer::from_path(path).context(CsvWriteSnafu { path })?;
    wtr.write_record(header).context(CsvWriteSnafu { path })?;
    for row in rows {
        wtr.write_record(row).context(CsvWriteSnafu { path })?;
    }
    wtr.flush().context(WritingOutputSnafu { path })?;
    Ok(())
}
