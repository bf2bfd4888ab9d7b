// Column mapping - which uploaded column feeds which transaction field

use chrono::NaiveDate;
use std::fmt;

use super::{ImportError, ImportResults};
use crate::entities::{parse_amount, parse_date, TransactionDraft, ValidationError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImportField {
    Date,
    Payee,
    Amount,
    Notes,
}

impl ImportField {
    pub const ALL: [ImportField; 4] = [
        ImportField::Date,
        ImportField::Payee,
        ImportField::Amount,
        ImportField::Notes,
    ];

    pub const REQUIRED: [ImportField; 3] = [ImportField::Date, ImportField::Payee, ImportField::Amount];

    pub fn name(&self) -> &'static str {
        match self {
            ImportField::Date => "date",
            ImportField::Payee => "payee",
            ImportField::Amount => "amount",
            ImportField::Notes => "notes",
        }
    }

    pub fn is_required(&self) -> bool {
        Self::REQUIRED.contains(self)
    }

    /// Header names recognized by `ColumnMapping::detect`
    fn aliases(&self) -> &'static [&'static str] {
        match self {
            ImportField::Date => &["date", "transaction date", "posted", "booking date", "fecha"],
            ImportField::Payee => &["payee", "description", "merchant", "name", "counterparty"],
            ImportField::Amount => &["amount", "value", "sum", "monto"],
            ImportField::Notes => &["notes", "note", "memo", "reference"],
        }
    }

    /// Words that identify the field inside a longer header ("Posted Date").
    /// Generic aliases like "name" only count as whole headers.
    fn keywords(&self) -> &'static [&'static str] {
        match self {
            ImportField::Date => &["date", "posted", "fecha"],
            ImportField::Payee => &["payee", "description", "merchant", "counterparty"],
            ImportField::Amount => &["amount", "monto"],
            ImportField::Notes => &["notes", "note", "memo", "reference"],
        }
    }
}

impl fmt::Display for ImportField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A parsed, validated row that still lacks an account
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportRow {
    pub date: NaiveDate,
    pub payee: String,
    pub amount: i64,
    pub notes: Option<String>,
    pub category_id: Option<String>,
}

impl ImportRow {
    pub fn into_draft(self, account_id: &str) -> TransactionDraft {
        TransactionDraft {
            amount: self.amount,
            payee: self.payee,
            notes: self.notes,
            date: self.date,
            account_id: account_id.to_string(),
            category_id: self.category_id,
        }
    }
}

/// One optional field per column. A field is mapped to at most one column.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnMapping {
    columns: Vec<Option<ImportField>>,
}

impl ColumnMapping {
    /// Every column skipped
    pub fn new(column_count: usize) -> Self {
        ColumnMapping {
            columns: vec![None; column_count],
        }
    }

    /// Guess the mapping from header names. Exact alias matches are tried
    /// before keyword matches on whole words; unmatched columns stay skipped.
    pub fn detect(headers: &[String]) -> Self {
        let mut mapping = Self::new(headers.len());
        let normalized: Vec<String> = headers.iter().map(|h| h.trim().to_lowercase()).collect();

        for field in ImportField::ALL {
            let exact = normalized
                .iter()
                .position(|h| field.aliases().contains(&h.as_str()));
            let partial = || {
                normalized.iter().enumerate().position(|(column, h)| {
                    mapping.columns[column].is_none()
                        && h
                            .split(|c: char| !c.is_alphanumeric())
                            .any(|word| field.keywords().contains(&word))
                })
            };

            if let Some(column) = exact.filter(|c| mapping.columns[*c].is_none()).or_else(partial) {
                mapping.columns[column] = Some(field);
            }
        }

        mapping
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Map `column` to `field` (or skip it with `None`). The field is
    /// removed from whichever column held it before. Returns false for an
    /// out-of-range column.
    pub fn assign(&mut self, column: usize, field: Option<ImportField>) -> bool {
        if column >= self.columns.len() {
            return false;
        }
        if let Some(field) = field {
            for slot in self.columns.iter_mut() {
                if *slot == Some(field) {
                    *slot = None;
                }
            }
        }
        self.columns[column] = field;
        true
    }

    /// Step the column through skip → date → payee → amount → notes → skip
    pub fn cycle(&mut self, column: usize) {
        let next = match self.field_for(column) {
            None => Some(ImportField::Date),
            Some(ImportField::Date) => Some(ImportField::Payee),
            Some(ImportField::Payee) => Some(ImportField::Amount),
            Some(ImportField::Amount) => Some(ImportField::Notes),
            Some(ImportField::Notes) => None,
        };
        self.assign(column, next);
    }

    pub fn field_for(&self, column: usize) -> Option<ImportField> {
        self.columns.get(column).copied().flatten()
    }

    pub fn column_of(&self, field: ImportField) -> Option<usize> {
        self.columns.iter().position(|slot| *slot == Some(field))
    }

    /// (mapped required fields, required fields)
    pub fn progress(&self) -> (usize, usize) {
        let mapped = ImportField::REQUIRED
            .iter()
            .filter(|field| self.column_of(**field).is_some())
            .count();
        (mapped, ImportField::REQUIRED.len())
    }

    pub fn missing(&self) -> Vec<ImportField> {
        ImportField::REQUIRED
            .into_iter()
            .filter(|field| self.column_of(*field).is_none())
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.missing().is_empty()
    }

    /// Convert every non-blank row. The first unparsable cell aborts with
    /// its row number (1-based, header excluded).
    pub fn build_rows(&self, results: &ImportResults, date_format: &str) -> Result<Vec<ImportRow>, ImportError> {
        let missing = self.missing();
        if !missing.is_empty() {
            return Err(ImportError::IncompleteMapping(missing));
        }

        let mut rows = Vec::with_capacity(results.rows.len());
        for (index, cells) in results.rows.iter().enumerate() {
            let row = index + 1;
            let cell = |field: ImportField| {
                self.column_of(field)
                    .and_then(|column| cells.get(column))
                    .map(|value| value.trim())
                    .unwrap_or("")
            };

            if ImportField::ALL.iter().all(|field| cell(*field).is_empty()) {
                continue;
            }

            let invalid = |field: ImportField, err: ValidationError| ImportError::InvalidCell {
                row,
                field,
                message: err.to_string(),
            };

            let date = parse_date(cell(ImportField::Date), date_format)
                .map_err(|e| invalid(ImportField::Date, e))?;
            let amount = parse_amount(cell(ImportField::Amount)).map_err(|e| invalid(ImportField::Amount, e))?;
            let payee = cell(ImportField::Payee);
            if payee.is_empty() {
                return Err(invalid(ImportField::Payee, ValidationError::Required("payee")));
            }
            let notes = cell(ImportField::Notes);

            rows.push(ImportRow {
                date,
                payee: payee.to_string(),
                amount,
                notes: (!notes.is_empty()).then(|| notes.to_string()),
                category_id: None,
            });
        }

        tracing::debug!(rows = rows.len(), skipped = results.rows.len() - rows.len(), "rows mapped");
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FORMAT: &str = "%Y-%m-%d %H:%M:%S";

    fn results(headers: &[&str], rows: &[&[&str]]) -> ImportResults {
        ImportResults {
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows: rows
                .iter()
                .map(|r| r.iter().map(|c| c.to_string()).collect())
                .collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_detect_from_headers() {
        let headers: Vec<String> = ["Posted Date", "Description", "Amount", "Memo", "Balance"]
            .iter()
            .map(|h| h.to_string())
            .collect();
        let mapping = ColumnMapping::detect(&headers);

        assert_eq!(mapping.field_for(0), Some(ImportField::Date));
        assert_eq!(mapping.field_for(1), Some(ImportField::Payee));
        assert_eq!(mapping.field_for(2), Some(ImportField::Amount));
        assert_eq!(mapping.field_for(3), Some(ImportField::Notes));
        assert_eq!(mapping.field_for(4), None);
        assert!(mapping.is_complete());
    }

    #[test]
    fn test_detect_matches_whole_words_only() {
        let headers: Vec<String> = ["Account Name", "Summary", "Date", "Merchant Name", "Amount (EUR)"]
            .iter()
            .map(|h| h.to_string())
            .collect();
        let mapping = ColumnMapping::detect(&headers);

        assert_eq!(mapping.field_for(0), None);
        assert_eq!(mapping.field_for(1), None);
        assert_eq!(mapping.field_for(2), Some(ImportField::Date));
        assert_eq!(mapping.field_for(3), Some(ImportField::Payee));
        assert_eq!(mapping.field_for(4), Some(ImportField::Amount));
    }

    #[test]
    fn test_assign_moves_field() {
        let mut mapping = ColumnMapping::new(3);
        assert!(mapping.assign(0, Some(ImportField::Amount)));
        assert!(mapping.assign(2, Some(ImportField::Amount)));

        assert_eq!(mapping.field_for(0), None);
        assert_eq!(mapping.column_of(ImportField::Amount), Some(2));
        assert_eq!(mapping.progress(), (1, 3));
        assert!(!mapping.assign(7, Some(ImportField::Date)));
    }

    #[test]
    fn test_cycle_wraps_to_skip() {
        let mut mapping = ColumnMapping::new(1);
        for _ in 0..5 {
            mapping.cycle(0);
        }
        assert_eq!(mapping.field_for(0), None);
    }

    #[test]
    fn test_incomplete_mapping_is_rejected() {
        let mut mapping = ColumnMapping::new(2);
        mapping.assign(0, Some(ImportField::Date));

        let err = mapping.build_rows(&results(&["d", "p"], &[]), FORMAT).unwrap_err();
        match err {
            ImportError::IncompleteMapping(missing) => {
                assert_eq!(missing, vec![ImportField::Payee, ImportField::Amount])
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_build_rows_converts_cells() {
        let data = results(
            &["Date", "Payee", "Amount", "Notes"],
            &[
                &["2024-01-03 10:15:00", "Grocer", "$1,234.50", ""],
                &["", "", "", ""],
                &["2024-01-04", "Refund", "(5.25)", "card"],
            ],
        );
        let rows = ColumnMapping::detect(&data.headers).build_rows(&data, FORMAT).unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].amount, 1_234_500);
        assert_eq!(rows[0].date, NaiveDate::from_ymd_opt(2024, 1, 3).unwrap());
        assert_eq!(rows[0].notes, None);
        assert_eq!(rows[1].amount, -5_250);
        assert_eq!(rows[1].notes.as_deref(), Some("card"));

        let draft = rows[1].clone().into_draft("acc-1");
        assert_eq!(draft.account_id, "acc-1");
    }

    #[test]
    fn test_bad_cell_reports_row_number() {
        let data = results(
            &["Date", "Payee", "Amount"],
            &[&["2024-01-03", "Grocer", "1.00"], &["2024-01-04", "Cafe", "abc"]],
        );
        let err = ColumnMapping::detect(&data.headers).build_rows(&data, FORMAT).unwrap_err();

        assert!(matches!(
            err,
            ImportError::InvalidCell { row: 2, field: ImportField::Amount, .. }
        ));
    }
}
