// Entity Models
//
// Accounts and categories are named records with a stable UUID identity.
// Transactions reference an account (required) and a category (optional).
//
// Each entity has:
// - A persisted record (what the API returns)
// - A draft (what create/update requests carry), validated before it is sent

pub mod account;
pub mod category;
pub mod transaction;

pub use account::{Account, AccountDraft};
pub use category::{Category, CategoryDraft};
pub use transaction::{
    format_amount, parse_amount, parse_date, Transaction, TransactionDraft, TransactionFilter,
    TransactionFormValues, MILLIUNITS,
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Input rejected before it reaches the store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{0} is required")]
    Required(&'static str),

    #[error("invalid amount: {0:?}")]
    InvalidAmount(String),

    #[error("invalid date: {0:?}")]
    InvalidDate(String),
}

/// Reference to a deleted record, returned by delete endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletedRef {
    pub id: String,
}

/// Request body for the bulk-delete endpoints.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkIds {
    pub ids: Vec<String>,
}

pub(crate) fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Trim a required text field, rejecting blanks.
pub(crate) fn required_text(value: &str, field: &'static str) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::Required(field));
    }
    Ok(trimmed.to_string())
}
