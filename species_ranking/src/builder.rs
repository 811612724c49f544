pub use crate::config::*;

use log::{debug, warn};
use std::collections::HashMap;

/// A builder for the reference catalog.
///
/// ```
/// pub use species_ranking::builder::CatalogBuilder;
/// # use species_ranking::RankingErrors;
///
/// let catalog = CatalogBuilder::new()
///     .membership_list("3P", &["Themeda triandra".to_string()])?
///     .common_names(&[("Themeda triandra".to_string(), "Kangaroo grass".to_string())])
///     .build();
///
/// assert!(catalog.membership_list("3P").unwrap().contains("themeda_triandra"));
/// assert_eq!(catalog.common_names().get("Themeda triandra"), Some("Kangaroo grass"));
/// # Ok::<(), RankingErrors>(())
/// ```
pub struct CatalogBuilder {
    pub(crate) _case: NameCase,
    pub(crate) _lists: Vec<(String, Vec<String>)>,
    pub(crate) _common_names: Vec<(String, String)>,
}

impl CatalogBuilder {
    pub fn new() -> CatalogBuilder {
        CatalogBuilder {
            _case: NameCase::Sentence,
            _lists: Vec::new(),
            _common_names: Vec::new(),
        }
    }

    pub fn name_case(self, case: NameCase) -> CatalogBuilder {
        CatalogBuilder {
            _case: case,
            ..self
        }
    }

    /// Registers a membership list with its raw entries, as read from the
    /// reference table. Blank rows are dropped when the catalog is built.
    pub fn membership_list(
        mut self,
        name: &str,
        entries: &[String],
    ) -> Result<CatalogBuilder, RankingErrors> {
        if self._lists.iter().any(|(n, _)| n == name) {
            return Err(RankingErrors::DuplicateList(name.to_string()));
        }
        self._lists.push((name.to_string(), entries.to_vec()));
        Ok(self)
    }

    /// Adds (botanical name, common name) pairs to the lookup table.
    pub fn common_names(mut self, pairs: &[(String, String)]) -> CatalogBuilder {
        self._common_names.extend(pairs.iter().cloned());
        self
    }

    pub fn build(self) -> ReferenceCatalog {
        let case = self._case;
        let lists: Vec<ReferenceList> = self
            ._lists
            .iter()
            .map(|(name, entries)| ReferenceList::new(name, entries, case))
            .collect();
        for l in lists.iter() {
            debug!("build: membership list {}: {} entries", l.name(), l.len());
        }

        let mut names: HashMap<String, String> = HashMap::new();
        for (botanical, common) in self._common_names.iter() {
            let key = crate::normalize_name(botanical, case);
            let value = common.trim();
            if key.is_empty() || crate::normalize_name(value, case).is_empty() {
                continue;
            }
            match names.get(&key) {
                // The first row of the table wins.
                Some(existing) if existing != value => {
                    warn!(
                        "build: {} has several common names, keeping {:?} and ignoring {:?}",
                        key, existing, value
                    );
                }
                Some(_) => {}
                None => {
                    names.insert(key, value.to_string());
                }
            }
        }
        debug!("build: {} common names", names.len());

        ReferenceCatalog {
            case,
            lists,
            common_names: NameMap::new(case, names),
        }
    }
}

impl Default for CatalogBuilder {
    fn default() -> Self {
        CatalogBuilder::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(xs: &[&str]) -> Vec<String> {
        xs.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn blank_rows_are_not_members() {
        let catalog = CatalogBuilder::new()
            .membership_list(
                "3P",
                &strings(&["Themeda triandra", "", "Nan", "BLANK", "themeda-triandra"]),
            )
            .unwrap()
            .build();
        let list = catalog.membership_list("3P").unwrap();
        assert_eq!(list.entries(), &["Themeda triandra".to_string()]);
        assert!(!list.contains(""));
        assert!(!list.contains("nan"));
    }

    #[test]
    fn duplicate_list_is_rejected() {
        let res = CatalogBuilder::new()
            .membership_list("3P", &strings(&["Themeda triandra"]))
            .unwrap()
            .membership_list("3P", &strings(&["Astrebla lappacea"]));
        assert_eq!(
            res.err(),
            Some(RankingErrors::DuplicateList("3P".to_string()))
        );
    }

    #[test]
    fn first_common_name_wins() {
        let catalog = CatalogBuilder::new()
            .common_names(&[
                ("Astrebla lappacea".to_string(), "Curly Mitchell grass".to_string()),
                ("astrebla_lappacea".to_string(), "Mitchell grass".to_string()),
                ("Sida fibulifera".to_string(), "".to_string()),
            ])
            .build();
        let names = catalog.common_names();
        assert_eq!(names.get("Astrebla lappacea"), Some("Curly Mitchell grass"));
        assert_eq!(names.get("Sida fibulifera"), None);
        assert_eq!(names.len(), 1);
    }

    #[test]
    fn title_case_catalog() {
        let catalog = CatalogBuilder::new()
            .name_case(NameCase::Title)
            .membership_list("AF", &strings(&["portulaca oleracea"]))
            .unwrap()
            .build();
        let list = catalog.membership_list("AF").unwrap();
        assert_eq!(list.entries(), &["Portulaca Oleracea".to_string()]);
        assert!(list.contains("PORTULACA OLERACEA"));
    }
}
