use calamine::{open_workbook, DataType, Range, Reader, Xlsx};

use crate::survey::*;

pub fn read_excel_table(path: &str, sheet: Option<&str>) -> SurveyResult<Table> {
    let wrange = get_range(path, sheet)?;
    let rows: Vec<Vec<String>> = wrange
        .rows()
        .map(|row| row.iter().map(cell_text).collect())
        .collect();
    debug!(
        "read_excel_table: {} {:?}: {} rows",
        path,
        sheet,
        rows.len()
    );
    Ok(Table::new(path, rows))
}

fn get_range(path: &str, sheet: Option<&str>) -> SurveyResult<Range<DataType>> {
    let mut workbook: Xlsx<_> = open_workbook(path).context(OpeningExcelSnafu { path })?;

    // A worksheet name was provided, use it.
    if let Some(worksheet_name) = sheet {
        let wrange = workbook
            .worksheet_range(worksheet_name)
            .context(MissingSheetSnafu {
                path,
                sheet: worksheet_name,
            })?
            .context(OpeningExcelSnafu { path })?;
        Ok(wrange)
    } else {
        let wrange = workbook
            .worksheet_range_at(0)
            .context(EmptyExcelSnafu { path })?
            .context(OpeningExcelSnafu { path })?;
        Ok(wrange)
    }
}

fn cell_text(cell: &DataType) -> String {
    match cell {
        DataType::Empty => String::new(),
        DataType::String(s) => s.clone(),
        DataType::Error(e) => {
            warn!("cell_text: cell error {:?}, read as empty", e);
            String::new()
        }
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cells_as_text() {
        assert_eq!(cell_text(&DataType::Empty), "");
        assert_eq!(
            cell_text(&DataType::String("Themeda triandra".to_string())),
            "Themeda triandra"
        );
        assert_eq!(cell_text(&DataType::Float(1.5)), "1.5");
        assert_eq!(cell_text(&DataType::Int(20)), "20");
    }

    #[test]
    fn missing_workbook() {
        assert!(matches!(
            read_excel_table("/nonexistent/veg.xlsx", None),
            Err(SurveyError::OpeningExcel { .. })
        ));
    }
}
