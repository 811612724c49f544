// The JSON summary and the flat CSV report.

use crate::survey::*;

use serde_json::json;
use serde_json::Map as JSMap;
use serde_json::Value as JSValue;

fn species_js(species: &[ClassifiedSpecies]) -> Vec<JSValue> {
    species
        .iter()
        .map(|s| {
            json!({
                "botanical": s.botanical_name,
                "common": s.common_name,
                "cover": s.cover_value,
            })
        })
        .collect()
}

fn record_js(id: &str, res: &RecordResult) -> JSValue {
    let categories: Vec<JSValue> = res
        .categories
        .iter()
        .map(|c| {
            json!({
                "category": c.category,
                "width": c.width,
                "species": species_js(&c.primary),
                "overflow": species_js(&c.overflow),
                "overflowInto": c.overflow_into,
                "total": c.total_cover,
            })
        })
        .collect();
    let mut totals: JSMap<String, JSValue> = JSMap::new();
    for (name, value) in res.totals.iter() {
        totals.insert(name.clone(), json!(value));
    }
    let mut reconciled: JSMap<String, JSValue> = JSMap::new();
    for r in res.reconciled.iter() {
        reconciled.insert(r.name.clone(), json!({"value": r.value, "amended": r.amended}));
    }
    json!({
        "record": id,
        "categories": categories,
        "totals": totals,
        "reconciled": reconciled,
    })
}

pub fn summary_js(config: &OutputConfig, results: &[(String, RecordResult)]) -> JSValue {
    let records: Vec<JSValue> = results.iter().map(|(id, res)| record_js(id, res)).collect();
    json!({
        "config": config,
        "results": records,
    })
}

pub fn flat_header(rules: &SurveyRules) -> Vec<String> {
    let mut header = rules.category_columns();
    for t in rules.totals.iter() {
        header.push(t.name.clone());
    }
    for r in rules.reconciliations.iter() {
        header.push(r.name.clone());
    }
    header
}

fn cover_text(cover: Option<f64>, absent: &AbsentCover) -> String {
    match (cover, absent) {
        (Some(x), _) => x.to_string(),
        (None, AbsentCover::Zero) => "0".to_string(),
        (None, AbsentCover::Blank) => String::new(),
        (None, AbsentCover::Marker(m)) => m.clone(),
    }
}

/// One row of the report. Categories narrower than their width are padded with empty cells.
pub fn flat_row(
    id: &str,
    res: &RecordResult,
    rules: &SurveyRules,
    absent: &AbsentCover,
) -> Vec<String> {
    let mut row: Vec<String> = vec![id.to_string()];
    for c in rules.categories.iter() {
        let primary: &[ClassifiedSpecies] = match res.category(&c.name) {
            Some(cr) => &cr.primary,
            None => &[],
        };
        for k in 0..c.width {
            row.push(
                primary
                    .get(k)
                    .map(|s| s.botanical_name.clone())
                    .unwrap_or_default(),
            );
        }
        for k in 0..c.width {
            row.push(
                primary
                    .get(k)
                    .map(|s| s.common_name.clone())
                    .unwrap_or_default(),
            );
        }
        for k in 0..c.width {
            row.push(
                primary
                    .get(k)
                    .map(|s| cover_text(s.cover_value, absent))
                    .unwrap_or_default(),
            );
        }
        let total = res.category(&c.name).map(|cr| cr.total_cover).unwrap_or(0.0);
        row.push(total.to_string());
    }
    for t in rules.totals.iter() {
        row.push(res.total(&t.name).unwrap_or(0.0).to_string());
    }
    // An unreadable recorded value stays blank whatever the absent cover setting.
    for r in rules.reconciliations.iter() {
        row.push(
            res.reconciled(&r.name)
                .and_then(|x| x.value)
                .map(|x| x.to_string())
                .unwrap_or_default(),
        );
    }
    row
}

#[cfg(test)]
mod tests {
    use super::*;

    fn species(bot: &str, common: &str, cover: Option<f64>) -> ClassifiedSpecies {
        ClassifiedSpecies {
            botanical_name: bot.to_string(),
            common_name: common.to_string(),
            cover_value: cover,
        }
    }

    fn rules() -> SurveyRules {
        SurveyRules {
            groups: vec![],
            categories: vec![CategoryRules {
                name: "AG".to_string(),
                width: 2,
                overflow_into: None,
            }],
            totals: vec![SiteTotalRule {
                name: "annual".to_string(),
                categories: vec!["AG".to_string()],
            }],
            reconciliations: vec![ReconciliationRule {
                name: "grass_adjusted".to_string(),
                recorded_field: "G_SUM_PROP".to_string(),
                subtract: vec!["AG".to_string()],
                condition: None,
                fallback_field: None,
            }],
        }
    }

    fn result() -> RecordResult {
        RecordResult {
            categories: vec![CategoryResult {
                category: "AG".to_string(),
                width: 2,
                primary: vec![species("Iseilema vaginiflorum", "Red Flinders grass", None)],
                overflow: vec![],
                overflow_into: None,
                total_cover: 0.0,
            }],
            totals: vec![("annual".to_string(), 0.0)],
            reconciled: vec![Reconciled {
                name: "grass_adjusted".to_string(),
                value: None,
                amended: false,
            }],
        }
    }

    #[test]
    fn flat_rows_are_padded() {
        let header = flat_header(&rules());
        assert_eq!(
            header,
            vec![
                "id",
                "AG_bot_1",
                "AG_bot_2",
                "AG_common_1",
                "AG_common_2",
                "AG_cover_1",
                "AG_cover_2",
                "AG_total",
                "annual",
                "grass_adjusted"
            ]
        );
        let row = flat_row("ABC01", &result(), &rules(), &AbsentCover::Blank);
        assert_eq!(row.len(), header.len());
        assert_eq!(
            row,
            vec![
                "ABC01",
                "Iseilema vaginiflorum",
                "",
                "Red Flinders grass",
                "",
                "",
                "",
                "0",
                "0",
                ""
            ]
        );
        let row = flat_row(
            "ABC01",
            &result(),
            &rules(),
            &AbsentCover::Marker("n/a".to_string()),
        );
        assert_eq!(row[5], "n/a");
        assert_eq!(row[6], "");
    }

    #[test]
    fn absent_cover_is_null_in_json() {
        let config = OutputConfig {
            survey: "Star transect".to_string(),
            date: None,
        };
        let js = summary_js(&config, &[("ABC01".to_string(), result())]);
        let cat = &js["results"][0]["categories"][0];
        assert_eq!(cat["species"][0]["cover"], JSValue::Null);
        assert_eq!(cat["overflowInto"], JSValue::Null);
        assert_eq!(js["results"][0]["totals"]["annual"], json!(0.0));
        assert_eq!(js["config"]["survey"], "Star transect");
        let reconciled = &js["results"][0]["reconciled"]["grass_adjusted"];
        assert_eq!(reconciled["value"], JSValue::Null);
        assert_eq!(reconciled["amended"], json!(false));
    }
}
