// Spreadsheet uploads (xlsx, xls, ods). Only the first worksheet is read.

use calamine::{open_workbook_auto, Data, Reader};
use chrono::{Duration, NaiveDate};
use std::path::Path;

use super::{file_name, has_extension, ImportError, ImportParser, ImportResults, ParseMeta};

pub struct SpreadsheetParser;

/// Date cells become ISO dates so the mapping's date parsing accepts them
pub fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::String(v) => v.trim().to_string(),
        Data::Float(v) => v.to_string(),
        Data::Int(v) => v.to_string(),
        Data::Bool(v) => v.to_string(),
        // out-of-range serials stay numeric and fail date parsing on their row
        Data::DateTime(v) => excel_serial_to_date(v.as_f64()).unwrap_or_else(|| v.as_f64().to_string()),
        Data::DateTimeIso(v) => v.to_string(),
        Data::DurationIso(v) => v.to_string(),
        Data::Error(v) => format!("{v:?}"),
        Data::Empty => String::new(),
    }
}

/// Largest day offset a `NaiveDate` can represent from the serial base
const MAX_SERIAL_DAYS: f64 = 100_000_000.0;

fn excel_serial_to_date(serial: f64) -> Option<String> {
    if !serial.is_finite() || serial.abs() > MAX_SERIAL_DAYS {
        return None;
    }
    // 1899-12-30 absorbs the 1900 leap year bug
    NaiveDate::from_ymd_opt(1899, 12, 30)?
        .checked_add_signed(Duration::days(serial.trunc() as i64))
        .map(|date| date.format("%Y-%m-%d").to_string())
}

impl ImportParser for SpreadsheetParser {
    fn can_parse(&self, path: &Path) -> bool {
        has_extension(path, &["xlsx", "xlsm", "xls", "ods"])
    }

    fn parse(&self, path: &Path) -> Result<ImportResults, ImportError> {
        let mut workbook =
            open_workbook_auto(path).map_err(|e| ImportError::Spreadsheet(e.to_string()))?;

        let range = workbook
            .worksheet_range_at(0)
            .ok_or_else(|| ImportError::Spreadsheet("workbook has no worksheets".to_string()))?
            .map_err(|e| ImportError::Spreadsheet(e.to_string()))?;

        let mut lines = range.rows().map(|row| row.iter().map(cell_to_string).collect::<Vec<_>>());
        let headers = lines.next().ok_or(ImportError::MissingHeaders)?;
        if headers.iter().all(String::is_empty) {
            return Err(ImportError::MissingHeaders);
        }

        let rows: Vec<Vec<String>> = lines.collect();
        Ok(ImportResults {
            headers,
            meta: ParseMeta {
                delimiter: None,
                row_count: rows.len(),
                source: file_name(path),
            },
            rows,
            errors: Vec::new(),
        })
    }

    fn name(&self) -> &str {
        "spreadsheet"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_to_string() {
        assert_eq!(cell_to_string(&Data::String(" Grocer ".to_string())), "Grocer");
        assert_eq!(cell_to_string(&Data::Float(-12.5)), "-12.5");
        assert_eq!(cell_to_string(&Data::Empty), "");
    }

    #[test]
    fn test_excel_serial_to_date() {
        assert_eq!(excel_serial_to_date(45292.0).as_deref(), Some("2024-01-01"));
        assert_eq!(excel_serial_to_date(45292.75).as_deref(), Some("2024-01-01"));
    }

    #[test]
    fn test_unrepresentable_serials_are_left_numeric() {
        assert_eq!(excel_serial_to_date(1.0e12), None);
        assert_eq!(excel_serial_to_date(-9.9e7), None);
        assert_eq!(excel_serial_to_date(f64::NAN), None);
        assert_eq!(excel_serial_to_date(f64::INFINITY), None);
    }

    #[test]
    fn test_extensions() {
        assert!(SpreadsheetParser.can_parse(Path::new("statement.XLSX")));
        assert!(!SpreadsheetParser.can_parse(Path::new("statement.csv")));
    }
}
