/*!
Classification, ranking and capping of species cover observations.

A vegetation survey form records, for each site, a fixed number of slots with a
botanical name and a cover estimate. This crate turns these slots into ranked
lists of species per category, ready to be written in a report:

1. [extract_slots] reads and cleans the slots of one form of a record
2. [classify] splits them with a membership list (3P grasses, annual forbs, ...)
3. [merge_overflow] hands the species that did not fit in a category to the next one
4. [rank_and_cap] orders a category by cover and keeps the first `width` species
5. [resolve_names] attaches the common names
6. [category_total] sums the covers of the kept species

Each step only accepts the output of the previous one, so they cannot be
called out of order. [process_record] runs all of them for a record, following
[SurveyRules], then [reconcile]s the site values recorded on the form with the
category totals.

See the [manual] for the details of the rules.
*/

pub mod builder;
mod config;
pub mod manual;

use log::{debug, warn};

use std::cmp::Ordering;
use std::collections::HashMap;

pub use crate::config::*;

/// Names of the form that mean the field was left empty.
const NO_DATA_NAMES: [&str; 3] = ["nan", "none", "blank"];

/// The number of "Other" choices offered by the forms.
const MAX_OTHER_CHOICES: usize = 5;

/// Cleans a botanical name as written on a form.
///
/// Underscores and dashes become spaces, whitespace is collapsed and trimmed, and
/// the casing is normalized. The "no data" markers become the empty string.
pub fn normalize_name(raw: &str, case: NameCase) -> String {
    let spaced: String = raw
        .chars()
        .map(|c| if c == '_' || c == '-' { ' ' } else { c })
        .collect();
    let collapsed: Vec<&str> = spaced.split_whitespace().collect();
    let joined = collapsed.join(" ");
    if NO_DATA_NAMES.contains(&joined.to_lowercase().as_str()) {
        return String::new();
    }
    match case {
        NameCase::Sentence => capitalize(&joined),
        NameCase::Title => collapsed
            .iter()
            .map(|w| capitalize(w))
            .collect::<Vec<String>>()
            .join(" "),
    }
}

fn capitalize(s: &str) -> String {
    let lower = s.to_lowercase();
    let mut chars = lower.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Reads a cover value. Anything that is not a finite number is absent.
fn parse_cover(raw: Option<&str>, field: &str) -> Option<f64> {
    let s = raw.map(|s| s.trim()).unwrap_or("");
    if s.is_empty() || NO_DATA_NAMES.contains(&s.to_lowercase().as_str()) {
        return None;
    }
    match s.parse::<f64>() {
        Ok(x) if x.is_finite() => Some(x),
        _ => {
            warn!("parse_cover: field {}: cannot read {:?}, no cover", field, s);
            None
        }
    }
}

// "Other3" -> Some(3)
fn other_choice_number(clean_name: &str) -> Option<usize> {
    let lower = clean_name.to_lowercase();
    let digits = lower.strip_prefix("other")?;
    match digits.parse::<usize>() {
        Ok(n) if (1..=MAX_OTHER_CHOICES).contains(&n) => Some(n),
        _ => None,
    }
}

// ******** Pipeline stages *********

/// The slots of one form of one record, in form order.
#[derive(PartialEq, Debug, Clone)]
pub struct SlotSet {
    slots: Vec<ObservationSlot>,
}

impl SlotSet {
    pub fn new(slots: Vec<ObservationSlot>) -> SlotSet {
        SlotSet { slots }
    }

    pub fn slots(&self) -> &[ObservationSlot] {
        &self.slots
    }

    /// For forms that are not split: all the slots belong to one category.
    pub fn into_single_category(self) -> Classified {
        Classified { slots: self.slots }
    }
}

/// The slots assigned to one category, not ranked yet.
#[derive(PartialEq, Debug, Clone, Default)]
pub struct Classified {
    slots: Vec<ObservationSlot>,
}

impl Classified {
    pub fn empty() -> Classified {
        Classified { slots: Vec::new() }
    }

    pub fn slots(&self) -> &[ObservationSlot] {
        &self.slots
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Adds slots after the current ones. They are numbered after the last slot so
    /// that ties keep them behind the slots already present.
    fn append(&mut self, incoming: &[ObservationSlot]) {
        let mut next_index = self.slots.iter().map(|s| s.slot_index).max().unwrap_or(0);
        for s in incoming {
            next_index += 1;
            self.slots.push(ObservationSlot {
                slot_index: next_index,
                ..s.clone()
            });
        }
    }
}

#[derive(PartialEq, Debug, Clone)]
pub struct Partition {
    pub members: Classified,
    pub non_members: Classified,
}

/// The first `width` species of a category, by decreasing cover.
#[derive(PartialEq, Debug, Clone)]
pub struct Capped {
    entries: Vec<ObservationSlot>,
}

impl Capped {
    pub fn entries(&self) -> &[ObservationSlot] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The species ranked after the first `width`, by decreasing cover.
#[derive(PartialEq, Debug, Clone)]
pub struct Overflow {
    entries: Vec<ObservationSlot>,
}

impl Overflow {
    pub fn entries(&self) -> &[ObservationSlot] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(PartialEq, Debug, Clone)]
pub struct Ranked {
    pub primary: Capped,
    pub overflow: Overflow,
}

/// Ranked species with their common names.
#[derive(PartialEq, Debug, Clone)]
pub struct Resolved {
    species: Vec<ClassifiedSpecies>,
}

impl Resolved {
    pub fn species(&self) -> &[ClassifiedSpecies] {
        &self.species
    }

    pub fn pairs(&self) -> Vec<[String; 2]> {
        self.species
            .iter()
            .map(|s| [s.botanical_name.clone(), s.common_name.clone()])
            .collect()
    }

    pub fn into_species(self) -> Vec<ClassifiedSpecies> {
        self.species
    }
}

/// Something that can receive the overflow of another category.
pub trait AbsorbOverflow {
    fn absorb(self, overflow: &Overflow) -> Self;
}

impl AbsorbOverflow for Classified {
    fn absorb(mut self, overflow: &Overflow) -> Classified {
        self.append(&overflow.entries);
        self
    }
}

impl AbsorbOverflow for SlotSet {
    fn absorb(self, overflow: &Overflow) -> SlotSet {
        let merged = self.into_single_category().absorb(overflow);
        SlotSet {
            slots: merged.slots,
        }
    }
}

/// Reads `slot_count` slots of the form `field_prefix` from a record.
///
/// Missing fields give placeholders and absent covers, never errors.
pub fn extract_slots<R: Record + ?Sized>(
    record: &R,
    field_prefix: &str,
    slot_count: usize,
    layout: &SlotLayout,
    case: NameCase,
) -> SlotSet {
    let mut slots: Vec<ObservationSlot> = Vec::with_capacity(slot_count);
    for slot_index in 1..=slot_count {
        let name_key = layout.name_key(field_prefix, slot_index);
        let mut botanical_name = normalize_name(record.field(&name_key).unwrap_or(""), case);

        // The form offers a few "Other" choices, whose name is written in a separate field.
        if let Some(n) = other_choice_number(&botanical_name) {
            if let Some(other_key) = layout.other_key(field_prefix, n) {
                let other_name = normalize_name(record.field(&other_key).unwrap_or(""), case);
                if other_name.is_empty() {
                    warn!(
                        "extract_slots: {} is {} but {} is empty",
                        name_key, botanical_name, other_key
                    );
                } else {
                    botanical_name = other_name;
                }
            }
        }

        let cover_value = match layout.cover_key(field_prefix, slot_index) {
            Some(cover_key) => parse_cover(record.field(&cover_key), &cover_key),
            None => None,
        };
        slots.push(ObservationSlot {
            slot_index,
            botanical_name,
            cover_value,
        });
    }
    debug!("extract_slots: {}: {:?}", field_prefix, slots);
    SlotSet { slots }
}

/// Splits the slots between the members of the list and the others.
///
/// Every slot lands in exactly one side, placeholders included (on the
/// non-member side). Form order is kept on both sides.
pub fn classify(slots: SlotSet, list: &ReferenceList) -> Partition {
    let (members, non_members): (Vec<ObservationSlot>, Vec<ObservationSlot>) = slots
        .slots
        .into_iter()
        .partition(|s| list.contains(&s.botanical_name));
    debug!(
        "classify: {}: {} members, {} non members",
        list.name(),
        members.len(),
        non_members.len()
    );
    Partition {
        members: Classified { slots: members },
        non_members: Classified { slots: non_members },
    }
}

/// Adds the overflow of a category to the input of another one, before it is ranked.
/// The species keep their own cover.
pub fn merge_overflow<T: AbsorbOverflow>(overflow: &Overflow, target: T) -> T {
    target.absorb(overflow)
}

// Decreasing cover, absent covers last. Among equal covers a named species
// comes before a blank slot, then form order decides.
fn rank_order(a: &ObservationSlot, b: &ObservationSlot) -> Ordering {
    let by_cover = match (a.cover_value, b.cover_value) {
        (Some(x), Some(y)) => y.total_cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    };
    by_cover
        .then(a.is_placeholder().cmp(&b.is_placeholder()))
        .then(a.slot_index.cmp(&b.slot_index))
}

/// Orders a category and keeps the first `width` species. The others are the overflow.
///
/// Placeholders are ranked last but are not removed: a short category still fills
/// its rows.
pub fn rank_and_cap(input: Classified, width: usize) -> Ranked {
    let mut sorted = input.slots;
    sorted.sort_by(rank_order);
    let overflow_entries = if sorted.len() > width {
        sorted.split_off(width)
    } else {
        Vec::new()
    };
    debug!(
        "rank_and_cap: width {}: primary {:?} overflow {:?}",
        width, sorted, overflow_entries
    );
    Ranked {
        primary: Capped { entries: sorted },
        overflow: Overflow {
            entries: overflow_entries,
        },
    }
}

fn resolve_entries(entries: &[ObservationSlot], names: &NameMap) -> Vec<ClassifiedSpecies> {
    entries
        .iter()
        .map(|s| ClassifiedSpecies {
            botanical_name: s.botanical_name.clone(),
            common_name: names
                .get(&s.botanical_name)
                .map(|c| c.to_string())
                .unwrap_or_else(|| s.botanical_name.clone()),
            cover_value: s.cover_value,
        })
        .collect()
}

/// Attaches the common names. A name missing from the table is its own common name.
pub fn resolve_names(primary: &Capped, names: &NameMap) -> Resolved {
    Resolved {
        species: resolve_entries(&primary.entries, names),
    }
}

/// Same as [resolve_names], for the species that did not fit.
pub fn resolve_overflow(overflow: &Overflow, names: &NameMap) -> Vec<ClassifiedSpecies> {
    resolve_entries(&overflow.entries, names)
}

/// The sum of the covers of the kept species. Absent covers count as zero.
pub fn category_total(primary: &Resolved) -> f64 {
    primary
        .species
        .iter()
        .map(|s| s.cover_value.unwrap_or(0.0))
        .sum()
}

/// Amends a value recorded on the site form with the category totals of the record.
///
/// Categories missing from `categories` count as empty.
pub fn reconcile<R: Record + ?Sized>(
    record: &R,
    rule: &ReconciliationRule,
    categories: &[CategoryResult],
) -> Reconciled {
    let subtracted: Vec<&CategoryResult> = categories
        .iter()
        .filter(|c| rule.subtract.contains(&c.category))
        .collect();
    let has_cover = subtracted
        .iter()
        .any(|c| c.primary.iter().any(|s| s.cover_value.is_some()));
    let condition_holds = rule.condition.as_ref().map_or(true, |c| c.holds(record));

    if condition_holds && has_cover {
        let recorded = parse_cover(record.field(&rule.recorded_field), &rule.recorded_field);
        let sum: f64 = subtracted.iter().map(|c| c.total_cover).sum();
        debug!(
            "reconcile: {}: {:?} minus {} from {:?}",
            rule.name, recorded, sum, rule.subtract
        );
        Reconciled {
            name: rule.name.clone(),
            value: recorded.map(|x| x - sum),
            amended: true,
        }
    } else {
        let field = rule.fallback_field.as_ref().unwrap_or(&rule.recorded_field);
        Reconciled {
            name: rule.name.clone(),
            value: parse_cover(record.field(field), field),
            amended: false,
        }
    }
}

/// Runs all the stages for one record.
///
/// The rules are expected to be valid for this catalog (see [SurveyRules::validate]).
pub fn process_record<R: Record + ?Sized>(
    record: &R,
    rules: &SurveyRules,
    catalog: &ReferenceCatalog,
) -> RecordResult {
    let case = catalog.name_case();
    let mut pending: HashMap<&str, Classified> = HashMap::new();

    for group in rules.groups.iter() {
        let slots = extract_slots(
            record,
            &group.field_prefix,
            group.slot_count,
            &group.layout,
            case,
        );
        match &group.split {
            GroupSplit::Single { category } => {
                add_pending(&mut pending, category, slots.into_single_category());
            }
            GroupSplit::ByMembership {
                list,
                members,
                non_members,
            } => match catalog.membership_list(list) {
                Some(reference) => {
                    let p = classify(slots, reference);
                    add_pending(&mut pending, members, p.members);
                    add_pending(&mut pending, non_members, p.non_members);
                }
                None => {
                    warn!(
                        "process_record: unknown membership list {}, {} slots are not members",
                        list, group.field_prefix
                    );
                    add_pending(&mut pending, non_members, slots.into_single_category());
                }
            },
        }
    }

    let mut incoming: HashMap<&str, Vec<Overflow>> = HashMap::new();
    let mut categories: Vec<CategoryResult> = Vec::new();
    for cat in rules.categories.iter() {
        let mut input = pending.remove(cat.name.as_str()).unwrap_or_default();
        for overflow in incoming.remove(cat.name.as_str()).unwrap_or_default() {
            input = merge_overflow(&overflow, input);
        }

        let ranked = rank_and_cap(input, cat.width);
        if let Some(into) = &cat.overflow_into {
            if !ranked.overflow.is_empty() {
                debug!(
                    "process_record: {} species of {} go into {}",
                    ranked.overflow.len(),
                    cat.name,
                    into
                );
            }
            incoming
                .entry(into.as_str())
                .or_default()
                .push(ranked.overflow.clone());
        }

        let primary = resolve_names(&ranked.primary, catalog.common_names());
        let total_cover = category_total(&primary);
        categories.push(CategoryResult {
            category: cat.name.clone(),
            width: cat.width,
            primary: primary.into_species(),
            overflow: resolve_overflow(&ranked.overflow, catalog.common_names()),
            overflow_into: cat.overflow_into.clone(),
            total_cover,
        });
    }

    let totals: Vec<(String, f64)> = rules
        .totals
        .iter()
        .map(|t| {
            let sum: f64 = categories
                .iter()
                .filter(|c| t.categories.contains(&c.category))
                .map(|c| c.total_cover)
                .sum();
            (t.name.clone(), sum)
        })
        .collect();

    let reconciled: Vec<Reconciled> = rules
        .reconciliations
        .iter()
        .map(|r| reconcile(record, r, &categories))
        .collect();

    RecordResult {
        categories,
        totals,
        reconciled,
    }
}

fn add_pending<'a>(pending: &mut HashMap<&'a str, Classified>, category: &'a str, slots: Classified) {
    match pending.get_mut(category) {
        Some(existing) => existing.append(&slots.slots),
        None => {
            pending.insert(category, slots);
        }
    }
}
