// CSV uploads. The first record is the header row.

use csv::{ReaderBuilder, Trim};
use std::fs::File;
use std::io::Read;
use std::path::Path;

use super::{file_name, has_extension, ImportError, ImportParser, ImportResults, ParseIssue, ParseMeta};
use crate::config::ImportSettings;

pub struct CsvParser {
    delimiter: u8,
}

impl Default for CsvParser {
    fn default() -> Self {
        CsvParser { delimiter: b',' }
    }
}

impl CsvParser {
    /// Non-ASCII delimiters are rejected when settings load; fall back to a comma
    pub fn from_settings(settings: &ImportSettings) -> Self {
        let delimiter = u8::try_from(settings.delimiter).unwrap_or(b',');
        CsvParser { delimiter }
    }

    /// Parse CSV text from any reader. Records whose width differs from
    /// the header are kept (padded or cut) and reported as issues.
    pub fn parse_reader<R: Read>(&self, reader: R, source: &str) -> Result<ImportResults, ImportError> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .delimiter(self.delimiter)
            .flexible(true)
            .trim(Trim::All)
            .from_reader(reader);

        let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
        if headers.iter().all(|h| h.is_empty()) {
            return Err(ImportError::MissingHeaders);
        }

        let mut rows = Vec::new();
        let mut errors = Vec::new();

        for (index, result) in reader.records().enumerate() {
            let row = index + 1;
            let record = match result {
                Ok(record) => record,
                Err(err) => {
                    errors.push(ParseIssue {
                        row,
                        message: err.to_string(),
                    });
                    continue;
                }
            };

            let mut cells: Vec<String> = record.iter().map(str::to_string).collect();
            if cells.len() != headers.len() {
                errors.push(ParseIssue {
                    row,
                    message: format!("expected {} fields, found {}", headers.len(), cells.len()),
                });
                cells.resize(headers.len(), String::new());
            }
            rows.push(cells);
        }

        Ok(ImportResults {
            headers,
            meta: ParseMeta {
                delimiter: Some(char::from(self.delimiter)),
                row_count: rows.len(),
                source: source.to_string(),
            },
            rows,
            errors,
        })
    }
}

impl ImportParser for CsvParser {
    fn can_parse(&self, path: &Path) -> bool {
        has_extension(path, &["csv", "txt", "tsv"])
    }

    fn parse(&self, path: &Path) -> Result<ImportResults, ImportError> {
        let file = File::open(path).map_err(|source| ImportError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        self.parse_reader(file, &file_name(path))
    }

    fn name(&self) -> &str {
        "csv"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> ImportResults {
        CsvParser::default().parse_reader(text.as_bytes(), "test.csv").unwrap()
    }

    #[test]
    fn test_quoted_fields_and_trimming() {
        let results = parse("Date, Description ,Amount\n2024-01-02,\"Coffee, large\",\"-1,200.00\"\n");

        assert_eq!(results.headers, vec!["Date", "Description", "Amount"]);
        assert_eq!(results.rows, vec![vec!["2024-01-02", "Coffee, large", "-1,200.00"]]);
        assert!(results.errors.is_empty());
    }

    #[test]
    fn test_ragged_rows_are_reported_and_padded() {
        let results = parse("a,b,c\n1,2\n1,2,3\n");

        assert_eq!(results.rows.len(), 2);
        assert_eq!(results.rows[0], vec!["1", "2", ""]);
        assert_eq!(
            results.errors,
            vec![ParseIssue { row: 1, message: "expected 3 fields, found 2".to_string() }]
        );
    }

    #[test]
    fn test_custom_delimiter() {
        let parser = CsvParser { delimiter: b';' };
        let results = parser.parse_reader("Date;Amount\n2024-01-01;5,00\n".as_bytes(), "eu.csv").unwrap();

        assert_eq!(results.rows[0], vec!["2024-01-01", "5,00"]);
        assert_eq!(results.meta.delimiter, Some(';'));
    }

    #[test]
    fn test_empty_file_has_no_headers() {
        let err = CsvParser::default().parse_reader("".as_bytes(), "empty.csv").unwrap_err();
        assert!(matches!(err, ImportError::MissingHeaders));
    }
}
