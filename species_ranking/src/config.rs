// ********* Input data structures ***********

use std::collections::{BTreeMap, HashMap, HashSet};
use std::error::Error;
use std::fmt::Display;

/// A record of a site visit, as exported by the survey forms.
///
/// Field names follow the conventions of the export (for example
/// `PG_SP:PG1_NAME`). A missing field and a blank field are treated the same way.
pub trait Record {
    fn field(&self, name: &str) -> Option<&str>;
}

impl Record for HashMap<String, String> {
    fn field(&self, name: &str) -> Option<&str> {
        self.get(name).map(|s| s.as_str())
    }
}

impl Record for BTreeMap<String, String> {
    fn field(&self, name: &str) -> Option<&str> {
        self.get(name).map(|s| s.as_str())
    }
}

/// One botanical name / cover value position of a form.
///
/// An empty botanical name is the "no data" placeholder: the slot was left blank
/// on the form. It still takes part in classification and ranking.
#[derive(PartialEq, Debug, Clone)]
pub struct ObservationSlot {
    /// 1-based position of the slot in the form, or after the last slot for
    /// species received as overflow from another category.
    pub slot_index: usize,
    pub botanical_name: String,
    /// Absent when the cover field was blank or could not be read as a number.
    pub cover_value: Option<f64>,
}

impl ObservationSlot {
    pub fn is_placeholder(&self) -> bool {
        self.botanical_name.is_empty()
    }
}

/// The casing applied to botanical names after cleaning.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum NameCase {
    /// `Themeda triandra`: first letter capitalized, the rest in lower case.
    Sentence,
    /// `Themeda Triandra`: every word capitalized.
    Title,
}

/// Names of the record fields holding the slots of a form.
///
/// Templates replace `{p}` with the field prefix (`PG`, `AG`, ...) and `{i}` with
/// the 1-based slot number.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct SlotLayout {
    pub name_field: String,
    /// None for forms that only record names (basal sweeps).
    pub cover_field: Option<String>,
    /// Where the real name of an `Other<n>` selection is written.
    pub other_field: Option<String>,
}

impl SlotLayout {
    pub const DEFAULT_NAME_FIELD: &'static str = "{p}_SP:{p}{i}_NAME";
    pub const DEFAULT_COVER_FIELD: &'static str = "{p}_COVER:{p}_SP{i}_COVER";
    pub const DEFAULT_OTHER_FIELD: &'static str = "{p}_SP:{p}_OTHER{i}";

    pub fn name_key(&self, prefix: &str, slot: usize) -> String {
        expand_template(&self.name_field, prefix, slot)
    }

    pub fn cover_key(&self, prefix: &str, slot: usize) -> Option<String> {
        self.cover_field
            .as_deref()
            .map(|t| expand_template(t, prefix, slot))
    }

    pub fn other_key(&self, prefix: &str, other_number: usize) -> Option<String> {
        self.other_field
            .as_deref()
            .map(|t| expand_template(t, prefix, other_number))
    }
}

impl Default for SlotLayout {
    fn default() -> Self {
        SlotLayout {
            name_field: SlotLayout::DEFAULT_NAME_FIELD.to_string(),
            cover_field: Some(SlotLayout::DEFAULT_COVER_FIELD.to_string()),
            other_field: Some(SlotLayout::DEFAULT_OTHER_FIELD.to_string()),
        }
    }
}

fn expand_template(template: &str, prefix: &str, slot: usize) -> String {
    template
        .replace("{p}", prefix)
        .replace("{i}", slot.to_string().as_str())
}

// ********* Reference data **********

/// A membership list: the canonical botanical names defining a sub-category,
/// such as the 3P (perennial, productive, palatable) grasses.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ReferenceList {
    name: String,
    case: NameCase,
    // Normalized names, in the order of the reference table.
    entries: Vec<String>,
    index: HashSet<String>,
}

impl ReferenceList {
    /// Blank and "no entry" rows are dropped, duplicates are kept once.
    pub fn new(name: &str, raw_entries: &[String], case: NameCase) -> ReferenceList {
        let mut entries: Vec<String> = Vec::new();
        let mut index: HashSet<String> = HashSet::new();
        for raw in raw_entries {
            let clean = crate::normalize_name(raw, case);
            if clean.is_empty() {
                continue;
            }
            if index.insert(clean.clone()) {
                entries.push(clean);
            }
        }
        ReferenceList {
            name: name.to_string(),
            case,
            entries,
            index,
        }
    }

    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Exact match after normalization. The placeholder is never a member.
    pub fn contains(&self, botanical_name: &str) -> bool {
        let clean = crate::normalize_name(botanical_name, self.case);
        !clean.is_empty() && self.index.contains(&clean)
    }
}

/// Botanical name -> common name.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct NameMap {
    case: NameCase,
    names: HashMap<String, String>,
}

impl NameMap {
    pub(crate) fn new(case: NameCase, names: HashMap<String, String>) -> NameMap {
        NameMap { case, names }
    }

    pub fn empty(case: NameCase) -> NameMap {
        NameMap::new(case, HashMap::new())
    }

    pub fn get(&self, botanical_name: &str) -> Option<&str> {
        let clean = crate::normalize_name(botanical_name, self.case);
        self.names.get(&clean).map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// All the reference data used to process a batch of records.
///
/// It is built once (see [crate::builder::CatalogBuilder]) and only read afterwards.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ReferenceCatalog {
    pub(crate) case: NameCase,
    pub(crate) lists: Vec<ReferenceList>,
    pub(crate) common_names: NameMap,
}

impl ReferenceCatalog {
    pub fn name_case(&self) -> NameCase {
        self.case
    }

    pub fn membership_list(&self, name: &str) -> Option<&ReferenceList> {
        self.lists.iter().find(|l| l.name == name)
    }

    pub fn membership_lists(&self) -> &[ReferenceList] {
        &self.lists
    }

    pub fn common_names(&self) -> &NameMap {
        &self.common_names
    }
}

// ******** Output data structures *********

/// A species that made it through ranking, with its resolved common name.
#[derive(PartialEq, Debug, Clone)]
pub struct ClassifiedSpecies {
    pub botanical_name: String,
    pub common_name: String,
    pub cover_value: Option<f64>,
}

/// The outcome for one category of one record.
#[derive(PartialEq, Debug, Clone)]
pub struct CategoryResult {
    pub category: String,
    pub width: usize,
    /// At most `width` species, by decreasing cover.
    pub primary: Vec<ClassifiedSpecies>,
    /// The species ranked below the first `width`.
    pub overflow: Vec<ClassifiedSpecies>,
    /// The category that received the overflow, if any.
    pub overflow_into: Option<String>,
    /// Sum of the covers in `primary`.
    pub total_cover: f64,
}

impl CategoryResult {
    pub fn name_pairs(&self) -> Vec<[String; 2]> {
        self.primary
            .iter()
            .map(|s| [s.botanical_name.clone(), s.common_name.clone()])
            .collect()
    }

    pub fn covers(&self) -> Vec<Option<f64>> {
        self.primary.iter().map(|s| s.cover_value).collect()
    }
}

/// A recorded site value after reconciliation with the category totals.
#[derive(PartialEq, Debug, Clone)]
pub struct Reconciled {
    pub name: String,
    /// Absent when the field to read is blank or not a number.
    pub value: Option<f64>,
    /// True when the category totals were subtracted from the recorded value.
    pub amended: bool,
}

#[derive(PartialEq, Debug, Clone)]
pub struct RecordResult {
    /// In the order of declaration of the categories.
    pub categories: Vec<CategoryResult>,
    /// Site totals, in the order of declaration.
    pub totals: Vec<(String, f64)>,
    pub reconciled: Vec<Reconciled>,
}

impl RecordResult {
    pub fn category(&self, name: &str) -> Option<&CategoryResult> {
        self.categories.iter().find(|c| c.category == name)
    }

    pub fn total(&self, name: &str) -> Option<f64> {
        self.totals
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, value)| *value)
    }

    pub fn reconciled(&self, name: &str) -> Option<&Reconciled> {
        self.reconciled.iter().find(|r| r.name == name)
    }
}

/// Errors in the reference data or in the rules.
///
/// Processing a record never fails: these are only returned while setting up a batch.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum RankingErrors {
    DuplicateList(String),
    UnknownList(String),
    DuplicateCategory(String),
    UnknownCategory(String),
    ZeroWidth(String),
    ZeroSlots(String),
    /// Overflow must flow into a category declared after its source.
    BackwardOverflow { from: String, into: String },
    /// A site total or reconciliation uses the name of a column of the report.
    ReservedName(String),
    DuplicateTotal(String),
}

impl Error for RankingErrors {}

impl Display for RankingErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RankingErrors::DuplicateList(n) => write!(f, "membership list {} is defined twice", n),
            RankingErrors::UnknownList(n) => write!(f, "unknown membership list {}", n),
            RankingErrors::DuplicateCategory(n) => write!(f, "category {} is declared twice", n),
            RankingErrors::UnknownCategory(n) => write!(f, "category {} is not declared", n),
            RankingErrors::ZeroWidth(n) => write!(f, "category {} must have a width of at least 1", n),
            RankingErrors::ZeroSlots(p) => write!(f, "form {} must have at least one slot", p),
            RankingErrors::BackwardOverflow { from, into } => write!(
                f,
                "overflow of {} cannot go into {}: the target must be declared after the source",
                from, into
            ),
            RankingErrors::ReservedName(n) => {
                write!(f, "{} is already a column of the report, choose another name", n)
            }
            RankingErrors::DuplicateTotal(n) => write!(f, "site total {} is declared twice", n),
        }
    }
}

// ********* Configuration **********

/// How the slots of one form are sent to categories.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum GroupSplit {
    /// Every slot goes to the same category.
    Single { category: String },
    /// Members of the list go to one category, all the other slots to another.
    ByMembership {
        list: String,
        members: String,
        non_members: String,
    },
}

/// One form of the record: a field prefix with a fixed number of slots.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct SlotGroup {
    pub field_prefix: String,
    pub slot_count: usize,
    pub layout: SlotLayout,
    pub split: GroupSplit,
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct CategoryRules {
    pub name: String,
    /// Number of species kept in the primary list.
    pub width: usize,
    /// Category receiving the species beyond `width`. It only flows one way.
    pub overflow_into: Option<String>,
}

/// A named sum of category totals (for example all the perennial grasses).
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct SiteTotalRule {
    pub name: String,
    pub categories: Vec<String>,
}

/// Holds when the field, trimmed, equals `equals` regardless of case.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct FieldCondition {
    pub field: String,
    pub equals: String,
}

impl FieldCondition {
    pub fn holds<R: Record + ?Sized>(&self, record: &R) -> bool {
        record
            .field(&self.field)
            .map_or(false, |v| v.trim().eq_ignore_ascii_case(self.equals.trim()))
    }
}

/// A value recorded on the site form, amended with the totals of some categories.
///
/// When the condition holds (or there is none) and one of the `subtract` categories
/// kept a species with a cover, the value is `recorded_field` minus the totals of
/// these categories. Otherwise `fallback_field` (or `recorded_field` when there is no
/// fallback) is reported as recorded.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ReconciliationRule {
    pub name: String,
    pub recorded_field: String,
    pub subtract: Vec<String>,
    pub condition: Option<FieldCondition>,
    pub fallback_field: Option<String>,
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct SurveyRules {
    pub groups: Vec<SlotGroup>,
    /// Categories are ranked in this order.
    pub categories: Vec<CategoryRules>,
    pub totals: Vec<SiteTotalRule>,
    pub reconciliations: Vec<ReconciliationRule>,
}

impl SurveyRules {
    /// The record id and the columns generated for each category, in report order.
    pub fn category_columns(&self) -> Vec<String> {
        let mut columns: Vec<String> = vec!["id".to_string()];
        for c in self.categories.iter() {
            for column in ["bot", "common", "cover"] {
                for k in 1..=c.width {
                    columns.push(format!("{}_{}_{}", c.name, column, k));
                }
            }
            columns.push(format!("{}_total", c.name));
        }
        columns
    }

    /// Checks the rules against themselves and against the catalog.
    pub fn validate(&self, catalog: &ReferenceCatalog) -> Result<(), RankingErrors> {
        let mut positions: HashMap<&str, usize> = HashMap::new();
        for (idx, c) in self.categories.iter().enumerate() {
            if positions.insert(c.name.as_str(), idx).is_some() {
                return Err(RankingErrors::DuplicateCategory(c.name.clone()));
            }
            if c.width == 0 {
                return Err(RankingErrors::ZeroWidth(c.name.clone()));
            }
        }

        for c in self.categories.iter() {
            if let Some(into) = &c.overflow_into {
                match positions.get(into.as_str()) {
                    None => return Err(RankingErrors::UnknownCategory(into.clone())),
                    Some(&target) if target <= positions[c.name.as_str()] => {
                        return Err(RankingErrors::BackwardOverflow {
                            from: c.name.clone(),
                            into: into.clone(),
                        });
                    }
                    Some(_) => {}
                }
            }
        }

        let check_category = |name: &String| -> Result<(), RankingErrors> {
            if positions.contains_key(name.as_str()) {
                Ok(())
            } else {
                Err(RankingErrors::UnknownCategory(name.clone()))
            }
        };

        for g in self.groups.iter() {
            if g.slot_count == 0 {
                return Err(RankingErrors::ZeroSlots(g.field_prefix.clone()));
            }
            match &g.split {
                GroupSplit::Single { category } => check_category(category)?,
                GroupSplit::ByMembership {
                    list,
                    members,
                    non_members,
                } => {
                    if catalog.membership_list(list).is_none() {
                        return Err(RankingErrors::UnknownList(list.clone()));
                    }
                    check_category(members)?;
                    check_category(non_members)?;
                }
            }
        }

        for t in self.totals.iter() {
            for c in t.categories.iter() {
                check_category(c)?;
            }
        }
        for r in self.reconciliations.iter() {
            for c in r.subtract.iter() {
                check_category(c)?;
            }
        }

        let reserved: HashSet<String> = self.category_columns().into_iter().collect();
        let mut seen: HashSet<&str> = HashSet::new();
        let names = self
            .totals
            .iter()
            .map(|t| &t.name)
            .chain(self.reconciliations.iter().map(|r| &r.name));
        for name in names {
            if reserved.contains(name) {
                return Err(RankingErrors::ReservedName(name.clone()));
            }
            if !seen.insert(name.as_str()) {
                return Err(RankingErrors::DuplicateTotal(name.clone()));
            }
        }
        Ok(())
    }
}
