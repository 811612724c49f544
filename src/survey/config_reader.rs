use crate::survey::*;

use serde::{Deserialize, Serialize};
use serde_json::Value as JSValue;

use species_ranking::{
    CategoryRules, FieldCondition, GroupSplit, NameCase, ReconciliationRule, SiteTotalRule,
    SlotGroup, SlotLayout, SurveyRules,
};

/// The formats of the input tables.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Csv,
    Xlsx,
}

/// How an absent cover is written in the CSV report.
#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AbsentCover {
    Zero,
    Blank,
    Marker(String),
}

impl Default for AbsentCover {
    fn default() -> Self {
        AbsentCover::Zero
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NameCaseSetting {
    Sentence,
    Title,
}

impl From<NameCaseSetting> for NameCase {
    fn from(s: NameCaseSetting) -> NameCase {
        match s {
            NameCaseSetting::Sentence => NameCase::Sentence,
            NameCaseSetting::Title => NameCase::Title,
        }
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct OutputSettings {
    #[serde(rename = "surveyName")]
    pub survey_name: String,
    #[serde(rename = "surveyDate")]
    pub survey_date: Option<String>,
    #[serde(rename = "outputDirectory")]
    pub output_directory: Option<String>,
    #[serde(rename = "absentCover")]
    pub absent_cover: Option<AbsentCover>,
    #[serde(rename = "nameCase")]
    pub name_case: Option<NameCaseSetting>,
}

impl OutputSettings {
    pub fn absent_cover(&self) -> AbsentCover {
        self.absent_cover.clone().unwrap_or_default()
    }

    pub fn name_case(&self) -> NameCase {
        self.name_case
            .map(NameCase::from)
            .unwrap_or(NameCase::Sentence)
    }
}

/// The header of the JSON summary.
#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    pub survey: String,
    pub date: Option<String>,
}

/// A table of site records. The first row holds the field names.
#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct RecordSource {
    pub provider: Provider,
    #[serde(rename = "filePath")]
    pub file_path: String,
    pub sheet: Option<String>,
    #[serde(rename = "idField")]
    pub id_field: Option<String>,
}

/// A membership list, read from one column of a table.
#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct ListSource {
    pub name: String,
    pub provider: Provider,
    #[serde(rename = "filePath")]
    pub file_path: String,
    pub sheet: Option<String>,
    column: JSValue,
    #[serde(rename = "firstRow")]
    first_row: Option<JSValue>,
}

impl ListSource {
    pub fn column(&self) -> SurveyResult<ColumnRef> {
        read_column(&self.column)
    }

    /// 1-based.
    pub fn first_row(&self) -> SurveyResult<usize> {
        let column = self.column()?;
        read_first_row(&self.first_row, &[&column])
    }
}

/// The common names table: one column of botanical names, one column of common names.
#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct CommonNamesSource {
    pub provider: Provider,
    #[serde(rename = "filePath")]
    pub file_path: String,
    pub sheet: Option<String>,
    #[serde(rename = "botanicalColumn")]
    botanical_column: JSValue,
    #[serde(rename = "commonColumn")]
    common_column: JSValue,
    #[serde(rename = "firstRow")]
    first_row: Option<JSValue>,
}

impl CommonNamesSource {
    pub fn botanical_column(&self) -> SurveyResult<ColumnRef> {
        read_column(&self.botanical_column)
    }

    pub fn common_column(&self) -> SurveyResult<ColumnRef> {
        read_column(&self.common_column)
    }

    pub fn first_row(&self) -> SurveyResult<usize> {
        let bot = self.botanical_column()?;
        let common = self.common_column()?;
        read_first_row(&self.first_row, &[&bot, &common])
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct ReferenceConfig {
    #[serde(rename = "membershipLists", default)]
    pub membership_lists: Vec<ListSource>,
    #[serde(rename = "commonNames")]
    pub common_names: Option<CommonNamesSource>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct GroupConfig {
    #[serde(rename = "fieldPrefix")]
    pub field_prefix: String,
    #[serde(rename = "slotCount")]
    pub slot_count: usize,
    pub category: Option<String>,
    #[serde(rename = "membershipList")]
    pub membership_list: Option<String>,
    #[serde(rename = "memberCategory")]
    pub member_category: Option<String>,
    #[serde(rename = "nonMemberCategory")]
    pub non_member_category: Option<String>,
    #[serde(rename = "nameField")]
    pub name_field: Option<String>,
    #[serde(rename = "coverField")]
    pub cover_field: Option<String>,
    #[serde(rename = "otherField")]
    pub other_field: Option<String>,
    #[serde(rename = "namesOnly")]
    pub names_only: Option<bool>,
}

impl GroupConfig {
    pub fn slot_group(&self) -> SurveyResult<SlotGroup> {
        let split = match (
            &self.category,
            &self.membership_list,
            &self.member_category,
            &self.non_member_category,
        ) {
            (Some(category), None, None, None) => GroupSplit::Single {
                category: category.clone(),
            },
            (None, Some(list), Some(members), Some(non_members)) => GroupSplit::ByMembership {
                list: list.clone(),
                members: members.clone(),
                non_members: non_members.clone(),
            },
            (None, Some(list), _, _) => whatever!(
                "form {}: membership list {} needs both memberCategory and nonMemberCategory",
                self.field_prefix,
                list
            ),
            _ => whatever!(
                "form {}: expected either category or membershipList",
                self.field_prefix
            ),
        };

        let cover_field = if self.names_only.unwrap_or(false) {
            None
        } else {
            Some(
                self.cover_field
                    .clone()
                    .unwrap_or_else(|| SlotLayout::DEFAULT_COVER_FIELD.to_string()),
            )
        };
        let layout = SlotLayout {
            name_field: self
                .name_field
                .clone()
                .unwrap_or_else(|| SlotLayout::DEFAULT_NAME_FIELD.to_string()),
            cover_field,
            other_field: Some(
                self.other_field
                    .clone()
                    .unwrap_or_else(|| SlotLayout::DEFAULT_OTHER_FIELD.to_string()),
            ),
        };

        Ok(SlotGroup {
            field_prefix: self.field_prefix.clone(),
            slot_count: self.slot_count,
            layout,
            split,
        })
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct CategoryConfig {
    pub name: String,
    pub width: usize,
    #[serde(rename = "overflowInto")]
    pub overflow_into: Option<String>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct TotalConfig {
    pub name: String,
    pub categories: Vec<String>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct ConditionConfig {
    pub field: String,
    pub equals: String,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct ReconciliationConfig {
    pub name: String,
    #[serde(rename = "recordedField")]
    pub recorded_field: String,
    pub subtract: Vec<String>,
    pub when: Option<ConditionConfig>,
    #[serde(rename = "fallbackField")]
    pub fallback_field: Option<String>,
}

impl ReconciliationConfig {
    fn rule(&self) -> ReconciliationRule {
        ReconciliationRule {
            name: self.name.clone(),
            recorded_field: self.recorded_field.clone(),
            subtract: self.subtract.clone(),
            condition: self.when.as_ref().map(|c| FieldCondition {
                field: c.field.clone(),
                equals: c.equals.clone(),
            }),
            fallback_field: self.fallback_field.clone(),
        }
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct SurveyConfig {
    #[serde(rename = "outputSettings")]
    pub output_settings: OutputSettings,
    #[serde(rename = "recordSources")]
    pub record_sources: Vec<RecordSource>,
    pub reference: ReferenceConfig,
    pub groups: Vec<GroupConfig>,
    pub categories: Vec<CategoryConfig>,
    #[serde(default)]
    pub totals: Vec<TotalConfig>,
    #[serde(default)]
    pub reconciliations: Vec<ReconciliationConfig>,
}

impl SurveyConfig {
    pub fn rules(&self) -> SurveyResult<SurveyRules> {
        let groups: Vec<SlotGroup> = self
            .groups
            .iter()
            .map(|g| g.slot_group())
            .collect::<SurveyResult<Vec<SlotGroup>>>()?;
        let categories: Vec<CategoryRules> = self
            .categories
            .iter()
            .map(|c| CategoryRules {
                name: c.name.clone(),
                width: c.width,
                overflow_into: c.overflow_into.clone(),
            })
            .collect();
        let totals: Vec<SiteTotalRule> = self
            .totals
            .iter()
            .map(|t| SiteTotalRule {
                name: t.name.clone(),
                categories: t.categories.clone(),
            })
            .collect();
        Ok(SurveyRules {
            groups,
            categories,
            totals,
            reconciliations: self.reconciliations.iter().map(|r| r.rule()).collect(),
        })
    }

    pub fn output_config(&self) -> OutputConfig {
        OutputConfig {
            survey: self.output_settings.survey_name.clone(),
            date: self.output_settings.survey_date.clone(),
        }
    }
}

/// A column of a table, either by position or by the name in the first row.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum ColumnRef {
    /// 0-based.
    Index(usize),
    Header(String),
}

pub fn read_config(path: &str) -> SurveyResult<SurveyConfig> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    let config: SurveyConfig =
        serde_json::from_str(&contents).context(ParsingJsonSnafu { path })?;
    debug!("read_config: {:?}", config);
    Ok(config)
}

pub fn read_summary(path: &str) -> SurveyResult<JSValue> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    let js: JSValue = serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu { path })?;
    Ok(js)
}

/// Columns are 1-based numbers, spreadsheet letters (`D`, `AB`) or header names.
///
/// A header that looks like letters (`ID`) is given as `{"header": "ID"}`.
fn read_column(x: &JSValue) -> SurveyResult<ColumnRef> {
    match x {
        JSValue::Number(n) => match n.as_u64() {
            Some(i) if i >= 1 => Ok(ColumnRef::Index((i - 1) as usize)),
            _ => InvalidColumnSnafu {
                content: n.to_string(),
            }
            .fail(),
        },
        JSValue::String(s) if is_column_letters(s) => {
            let idx = s
                .chars()
                .fold(0, |acc, c| acc * 26 + (c as usize - 'A' as usize + 1));
            Ok(ColumnRef::Index(idx - 1))
        }
        JSValue::String(s) if !s.trim().is_empty() => Ok(ColumnRef::Header(s.trim().to_string())),
        JSValue::Object(obj) if obj.len() == 1 => match obj.get("header") {
            Some(JSValue::String(s)) if !s.trim().is_empty() => {
                Ok(ColumnRef::Header(s.trim().to_string()))
            }
            _ => InvalidColumnSnafu {
                content: x.to_string(),
            }
            .fail(),
        },
        _ => InvalidColumnSnafu {
            content: x.to_string(),
        }
        .fail(),
    }
}

fn is_column_letters(s: &str) -> bool {
    (1..=3).contains(&s.len()) && s.chars().all(|c| c.is_ascii_uppercase())
}

// The header row is skipped by default when a column is given by name.
fn read_first_row(x: &Option<JSValue>, columns: &[&ColumnRef]) -> SurveyResult<usize> {
    match x {
        None => {
            let by_header = columns.iter().any(|c| matches!(c, ColumnRef::Header(_)));
            Ok(if by_header { 2 } else { 1 })
        }
        Some(JSValue::Number(n)) => match n.as_u64() {
            Some(i) if i >= 1 => Ok(i as usize),
            _ => whatever!("firstRow must be at least 1, got {}", n),
        },
        Some(other) => whatever!("firstRow must be a number, got {}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn column_references() {
        assert_eq!(read_column(&json!(1)).unwrap(), ColumnRef::Index(0));
        assert_eq!(read_column(&json!("D")).unwrap(), ColumnRef::Index(3));
        assert_eq!(read_column(&json!("AB")).unwrap(), ColumnRef::Index(27));
        assert_eq!(
            read_column(&json!("copyBotanical2")).unwrap(),
            ColumnRef::Header("copyBotanical2".to_string())
        );
        assert!(read_column(&json!(0)).is_err());
        assert!(read_column(&json!("")).is_err());
    }

    #[test]
    fn short_headers_are_named_explicitly() {
        // "ID" alone is column 238.
        assert_eq!(read_column(&json!("ID")).unwrap(), ColumnRef::Index(237));
        assert_eq!(
            read_column(&json!({"header": "ID"})).unwrap(),
            ColumnRef::Header("ID".to_string())
        );
        assert_eq!(
            read_column(&json!({"header": " SP "})).unwrap(),
            ColumnRef::Header("SP".to_string())
        );
        assert!(read_column(&json!({"header": ""})).is_err());
        assert!(read_column(&json!({"header": 3})).is_err());
        assert!(read_column(&json!({"column": "ID"})).is_err());
        let by_name = read_column(&json!({"header": "SP"})).unwrap();
        assert_eq!(read_first_row(&None, &[&by_name]).unwrap(), 2);
    }

    #[test]
    fn reconciliation_rules() {
        let config: ReconciliationConfig = serde_json::from_value(json!({
            "name": "perennial_forb_adjusted",
            "recordedField": "F_SUM_PROP",
            "subtract": ["AF"],
            "when": {"field": "SITE_VEG_FRACTIONS:VEG_COVER_ADJUST", "equals": "representative"}
        }))
        .unwrap();
        let rule = config.rule();
        assert_eq!(rule.subtract, vec!["AF".to_string()]);
        assert_eq!(rule.fallback_field, None);
        assert_eq!(
            rule.condition,
            Some(FieldCondition {
                field: "SITE_VEG_FRACTIONS:VEG_COVER_ADJUST".to_string(),
                equals: "representative".to_string(),
            })
        );
        assert!(serde_json::from_value::<ReconciliationConfig>(json!({
            "name": "x", "subtract": ["AF"]
        }))
        .is_err());
    }

    #[test]
    fn first_row_defaults() {
        let by_letter = ColumnRef::Index(3);
        let by_name = ColumnRef::Header("botanical".to_string());
        assert_eq!(read_first_row(&None, &[&by_letter]).unwrap(), 1);
        assert_eq!(read_first_row(&None, &[&by_letter, &by_name]).unwrap(), 2);
        assert_eq!(read_first_row(&Some(json!(5)), &[&by_name]).unwrap(), 5);
        assert!(read_first_row(&Some(json!(0)), &[&by_name]).is_err());
    }

    #[test]
    fn absent_cover_settings() {
        let zero: AbsentCover = serde_json::from_value(json!("zero")).unwrap();
        assert_eq!(zero, AbsentCover::Zero);
        let marker: AbsentCover = serde_json::from_value(json!({"marker": "n/a"})).unwrap();
        assert_eq!(marker, AbsentCover::Marker("n/a".to_string()));
        assert!(serde_json::from_value::<AbsentCover>(json!("nothing")).is_err());
        assert!(serde_json::from_value::<Provider>(json!("ods")).is_err());
    }

    fn group(js: JSValue) -> GroupConfig {
        serde_json::from_value(js).unwrap()
    }

    #[test]
    fn group_splits() {
        let g = group(json!({"fieldPrefix": "AG", "slotCount": 10, "category": "AG"}))
            .slot_group()
            .unwrap();
        assert_eq!(
            g.split,
            GroupSplit::Single {
                category: "AG".to_string()
            }
        );
        assert_eq!(g.layout, SlotLayout::default());

        let g = group(json!({
            "fieldPrefix": "BS", "slotCount": 5, "category": "BS",
            "nameField": "{p}_SP:{p}{i}", "namesOnly": true
        }))
        .slot_group()
        .unwrap();
        assert_eq!(g.layout.cover_field, None);
        assert_eq!(g.layout.name_key("BS", 2), "BS_SP:BS2");

        assert!(group(json!({
            "fieldPrefix": "PG", "slotCount": 10, "membershipList": "3P", "memberCategory": "3P"
        }))
        .slot_group()
        .is_err());
        assert!(group(json!({"fieldPrefix": "PG", "slotCount": 10}))
            .slot_group()
            .is_err());
    }
}
