// 📥 Import - Uploaded files to Import Rows
//
// Step 1: a parser turns a file into `ImportResults` (header + string cells)
// Step 2: the user maps columns to fields (`mapping::ColumnMapping`)
// Step 3: the mapping converts every row into an `ImportRow`
//
// Parsers are picked by `can_parse`, the first match wins.

pub mod delimited;
pub mod mapping;
#[cfg(feature = "xlsx")]
pub mod spreadsheet;

pub use delimited::CsvParser;
pub use mapping::{ColumnMapping, ImportField, ImportRow};
#[cfg(feature = "xlsx")]
pub use spreadsheet::SpreadsheetParser;

use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::config::ImportSettings;

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("failed to read spreadsheet: {0}")]
    Spreadsheet(String),

    #[error("unsupported file type: {0}")]
    UnsupportedFormat(String),

    #[error("file has no header row")]
    MissingHeaders,

    #[error("required columns are not mapped: {}", list_fields(.0))]
    IncompleteMapping(Vec<ImportField>),

    #[error("row {row}: {message}")]
    InvalidCell {
        row: usize,
        field: ImportField,
        message: String,
    },
}

fn list_fields(fields: &[ImportField]) -> String {
    fields
        .iter()
        .map(|f| f.name())
        .collect::<Vec<_>>()
        .join(", ")
}

/// A row-level problem found while parsing (row numbers start at 1,
/// header excluded)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseIssue {
    pub row: usize,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParseMeta {
    /// `None` for spreadsheets
    pub delimiter: Option<char>,
    pub row_count: usize,
    /// File name the rows came from
    pub source: String,
}

/// Parsed upload. `Default` is the empty placeholder the wizard resets to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportResults {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
    pub errors: Vec<ParseIssue>,
    pub meta: ParseMeta,
}

impl ImportResults {
    pub fn placeholder() -> Self {
        Self::default()
    }

    pub fn is_placeholder(&self) -> bool {
        self.headers.is_empty() && self.rows.is_empty()
    }

    pub fn column_count(&self) -> usize {
        self.headers.len()
    }
}

/// A file format the import understands
pub trait ImportParser {
    fn can_parse(&self, path: &Path) -> bool;
    fn parse(&self, path: &Path) -> Result<ImportResults, ImportError>;
    fn name(&self) -> &str;
}

/// Every parser available with the enabled features
pub fn parsers(settings: &ImportSettings) -> Vec<Box<dyn ImportParser>> {
    let mut parsers: Vec<Box<dyn ImportParser>> = vec![Box::new(CsvParser::from_settings(settings))];
    #[cfg(feature = "xlsx")]
    parsers.push(Box::new(SpreadsheetParser));
    parsers
}

/// Parse `path` with the first parser that accepts it
pub fn load_file(path: &Path, settings: &ImportSettings) -> Result<ImportResults, ImportError> {
    let parser = parsers(settings)
        .into_iter()
        .find(|p| p.can_parse(path))
        .ok_or_else(|| ImportError::UnsupportedFormat(path.display().to_string()))?;

    let results = parser.parse(path)?;
    tracing::info!(
        parser = parser.name(),
        file = %results.meta.source,
        rows = results.meta.row_count,
        issues = results.errors.len(),
        "file parsed"
    );
    Ok(results)
}

pub(crate) fn file_name(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("upload")
        .to_string()
}

pub(crate) fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map_or(false, |ext| extensions.iter().any(|known| ext.eq_ignore_ascii_case(known)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_file_picks_csv_parser() {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(file, "Date,Payee,Amount").unwrap();
        writeln!(file, "2024-01-03,Grocer,-12.50").unwrap();

        let results = load_file(file.path(), &ImportSettings::default()).unwrap();
        assert_eq!(results.headers, vec!["Date", "Payee", "Amount"]);
        assert_eq!(results.meta.row_count, 1);
        assert_eq!(results.meta.delimiter, Some(','));
    }

    #[test]
    fn test_unknown_extension_is_rejected() {
        let file = tempfile::Builder::new().suffix(".pdf").tempfile().unwrap();
        let err = load_file(file.path(), &ImportSettings::default()).unwrap_err();

        assert!(matches!(err, ImportError::UnsupportedFormat(_)));
    }

    #[test]
    fn test_placeholder() {
        assert!(ImportResults::placeholder().is_placeholder());
    }
}
