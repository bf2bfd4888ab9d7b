// 💸 Transaction Entity
//
// Amounts are signed integers in milliunits (1.00 = 1000). Negative amounts
// are expenses, positive amounts are income. Dates are calendar dates with
// no time component.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use super::{new_id, required_text, ValidationError};

/// Milliunits per whole currency unit
pub const MILLIUNITS: i64 = 1000;

const ISO_DATE: &str = "%Y-%m-%d";

// ============================================================================
// TRANSACTION ENTITY
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: String,
    pub amount: i64,
    pub payee: String,
    #[serde(default)]
    pub notes: Option<String>,
    pub date: NaiveDate,
    pub account_id: String,

    /// Joined account name (read-only, filled by the store)
    #[serde(default)]
    pub account: String,

    #[serde(default)]
    pub category_id: Option<String>,

    /// Joined category name (read-only, filled by the store)
    #[serde(default)]
    pub category: Option<String>,
}

impl Transaction {
    /// Create a transaction record from a validated draft.
    /// Joined names stay empty until the record is read back from the store.
    pub fn new(draft: &TransactionDraft) -> Result<Self, ValidationError> {
        let draft = draft.normalized()?;
        Ok(Transaction {
            id: new_id(),
            amount: draft.amount,
            payee: draft.payee,
            notes: draft.notes,
            date: draft.date,
            account_id: draft.account_id,
            account: String::new(),
            category_id: draft.category_id,
            category: None,
        })
    }

    pub fn is_expense(&self) -> bool {
        self.amount < 0
    }

    pub fn to_draft(&self) -> TransactionDraft {
        TransactionDraft {
            amount: self.amount,
            payee: self.payee.clone(),
            notes: self.notes.clone(),
            date: self.date,
            account_id: self.account_id.clone(),
            category_id: self.category_id.clone(),
        }
    }
}

// ============================================================================
// TRANSACTION DRAFT (create / update / bulk-create payload)
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionDraft {
    pub amount: i64,
    pub payee: String,
    #[serde(default)]
    pub notes: Option<String>,
    pub date: NaiveDate,
    pub account_id: String,
    #[serde(default)]
    pub category_id: Option<String>,
}

impl TransactionDraft {
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.normalized().map(|_| ())
    }

    /// Trimmed copy with blank optional fields collapsed to `None`
    pub fn normalized(&self) -> Result<TransactionDraft, ValidationError> {
        Ok(TransactionDraft {
            amount: self.amount,
            payee: required_text(&self.payee, "payee")?,
            notes: blank_to_none(self.notes.as_deref()),
            date: self.date,
            account_id: required_text(&self.account_id, "accountId")?,
            category_id: blank_to_none(self.category_id.as_deref()),
        })
    }
}

// ============================================================================
// FORM VALUES (what a transaction form collects before conversion)
// ============================================================================

/// Raw form input. The amount is typed as text ("-12.50") and converted
/// to milliunits on submit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionFormValues {
    pub account_id: String,
    pub category_id: Option<String>,
    pub amount: String,
    pub date: Option<NaiveDate>,
    pub payee: String,
    pub notes: String,
}

impl TransactionFormValues {
    /// Prefill a form from an existing record (edit sheet)
    pub fn from_transaction(transaction: &Transaction) -> Self {
        TransactionFormValues {
            account_id: transaction.account_id.clone(),
            category_id: transaction.category_id.clone(),
            amount: format_amount(transaction.amount),
            date: Some(transaction.date),
            payee: transaction.payee.clone(),
            notes: transaction.notes.clone().unwrap_or_default(),
        }
    }

    pub fn into_draft(self) -> Result<TransactionDraft, ValidationError> {
        let date = self.date.ok_or(ValidationError::Required("date"))?;
        let amount = parse_amount(&self.amount)?;

        TransactionDraft {
            amount,
            payee: self.payee,
            notes: Some(self.notes),
            date,
            account_id: self.account_id,
            category_id: self.category_id,
        }
        .normalized()
    }
}

// ============================================================================
// LIST FILTER
// ============================================================================

/// Query parameters for transaction lists and the summary
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionFilter {
    #[serde(default)]
    pub from: Option<NaiveDate>,
    #[serde(default)]
    pub to: Option<NaiveDate>,
    #[serde(default)]
    pub account_id: Option<String>,
}

impl TransactionFilter {
    pub fn for_account(account_id: impl Into<String>) -> Self {
        TransactionFilter {
            account_id: Some(account_id.into()),
            ..Default::default()
        }
    }

    pub fn between(from: NaiveDate, to: NaiveDate) -> Self {
        TransactionFilter {
            from: Some(from),
            to: Some(to),
            account_id: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.from.is_none() && self.to.is_none() && self.account_id.is_none()
    }
}

// ============================================================================
// AMOUNT / DATE CONVERSION
// ============================================================================

/// Parse a decimal amount into milliunits.
///
/// Accepts thousands separators, currency symbols, a leading sign and
/// accounting-style parentheses for negatives: "(1,234.50)" → -1234500.
/// Digits past the third decimal round half up.
pub fn parse_amount(input: &str) -> Result<i64, ValidationError> {
    let invalid = || ValidationError::InvalidAmount(input.trim().to_string());

    let cleaned: String = input
        .trim()
        .chars()
        .filter(|c| !matches!(c, ',' | '$' | '€' | '£' | ' '))
        .collect();

    let (negative, body) = if let Some(inner) = cleaned
        .strip_prefix('(')
        .and_then(|rest| rest.strip_suffix(')'))
    {
        (true, inner)
    } else if let Some(rest) = cleaned.strip_prefix('-') {
        (true, rest)
    } else {
        (false, cleaned.strip_prefix('+').unwrap_or(cleaned.as_str()))
    };

    let (whole, frac) = body.split_once('.').unwrap_or((body, ""));
    if whole.is_empty() && frac.is_empty() {
        return Err(invalid());
    }
    if !whole.chars().all(|c| c.is_ascii_digit()) || !frac.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid());
    }

    let whole_value: i64 = if whole.is_empty() {
        0
    } else {
        whole.parse().map_err(|_| invalid())?
    };

    let mut digits: Vec<i64> = frac.bytes().map(|b| i64::from(b - b'0')).collect();
    let round_up = digits.get(3).map_or(false, |d| *d >= 5);
    digits.resize(3, 0);
    let frac_value = digits[0] * 100 + digits[1] * 10 + digits[2] + i64::from(round_up);

    let value = whole_value
        .checked_mul(MILLIUNITS)
        .and_then(|v| v.checked_add(frac_value))
        .ok_or_else(invalid)?;

    Ok(if negative { -value } else { value })
}

/// Format milliunits as a decimal string ("-12.50"), exactly.
/// Two decimals unless the third is significant ("-1.234").
pub fn format_amount(milliunits: i64) -> String {
    let sign = if milliunits < 0 { "-" } else { "" };
    let abs = milliunits.unsigned_abs();
    let scale = MILLIUNITS.unsigned_abs();
    let (units, fraction) = (abs / scale, abs % scale);

    if fraction % 10 == 0 {
        format!("{sign}{units}.{:02}", fraction / 10)
    } else {
        format!("{sign}{units}.{fraction:03}")
    }
}

/// Parse a date cell using `format`, falling back to ISO `YYYY-MM-DD`.
/// Formats with a time component are accepted; the time is dropped.
pub fn parse_date(input: &str, format: &str) -> Result<NaiveDate, ValidationError> {
    let value = input.trim();

    NaiveDateTime::parse_from_str(value, format)
        .map(|dt| dt.date())
        .or_else(|_| NaiveDate::parse_from_str(value, format))
        .or_else(|_| NaiveDate::parse_from_str(value, ISO_DATE))
        .map_err(|_| ValidationError::InvalidDate(value.to_string()))
}

fn blank_to_none(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

// ============================================================================
// TESTS
// ============================================================================
