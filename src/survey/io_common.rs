use crate::survey::*;

pub fn simplify_file_name(path: &str) -> String {
    Path::new(path)
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or(path)
        .to_string()
}

/// Ids of the records without an id: the file name and the line number.
pub fn make_default_id(path: &str) -> impl Fn(usize) -> String {
    let simplified_file_name = simplify_file_name(path);
    move |lineno| format!("{}-{:08}", simplified_file_name, lineno)
}

/// A table read from a CSV file or a worksheet, all the cells as text.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Table {
    path: String,
    rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(path: &str, rows: Vec<Vec<String>>) -> Table {
        Table {
            path: path.to_string(),
            rows,
        }
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    fn column_index(&self, column: &ColumnRef) -> SurveyResult<usize> {
        match column {
            ColumnRef::Index(idx) => Ok(*idx),
            ColumnRef::Header(name) => {
                let header = self.rows.first().context(MissingColumnSnafu {
                    column: name.as_str(),
                    path: self.path.as_str(),
                })?;
                header
                    .iter()
                    .position(|h| h.trim() == name)
                    .context(MissingColumnSnafu {
                        column: name.as_str(),
                        path: self.path.as_str(),
                    })
            }
        }
    }

    /// The cells of a column, starting at the 1-based row `first_row`.
    /// Short rows give empty cells.
    pub fn column_values(&self, column: &ColumnRef, first_row: usize) -> SurveyResult<Vec<String>> {
        let idx = self.column_index(column)?;
        let values: Vec<String> = self
            .rows
            .iter()
            .skip(first_row.saturating_sub(1))
            .map(|row| row.get(idx).cloned().unwrap_or_default())
            .collect();
        debug!(
            "column_values: {}: column {:?}: {} values",
            self.path,
            column,
            values.len()
        );
        Ok(values)
    }

    /// The rows after the first one, as field name -> value, with their 1-based line number.
    pub fn records(&self) -> Vec<(usize, BTreeMap<String, String>)> {
        let header = match self.rows.first() {
            Some(h) => h,
            None => return Vec::new(),
        };
        let mut res: Vec<(usize, BTreeMap<String, String>)> = Vec::new();
        for (idx, row) in self.rows.iter().enumerate().skip(1) {
            let lineno = idx + 1;
            if row.len() > header.len() {
                warn!(
                    "records: {}: line {} has {} cells for {} fields",
                    self.path,
                    lineno,
                    row.len(),
                    header.len()
                );
            }
            let fields: BTreeMap<String, String> = header
                .iter()
                .zip(row.iter())
                .map(|(k, v)| (k.trim().to_string(), v.clone()))
                .collect();
            res.push((lineno, fields));
        }
        res
    }
}
