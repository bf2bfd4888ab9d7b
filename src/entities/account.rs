// 💳 Account Entity
//
// "Account name is a VALUE (can change), Account UUID is IDENTITY (never changes)"
//
// Transactions hold the account id as a foreign key, so renaming an account
// never touches its transactions. Deleting one removes its transactions
// on the server.

use serde::{Deserialize, Serialize};

use super::{new_id, required_text, ValidationError};

// ============================================================================
// ACCOUNT ENTITY
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    /// Stable identity (UUID) - NEVER changes
    pub id: String,

    /// Display name (e.g., "Checking")
    pub name: String,
}

impl Account {
    /// Create a new account from a validated draft
    pub fn new(draft: &AccountDraft) -> Result<Self, ValidationError> {
        Ok(Account {
            id: new_id(),
            name: draft.validated_name()?,
        })
    }
}

// ============================================================================
// ACCOUNT DRAFT (create / update payload)
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountDraft {
    pub name: String,
}

impl AccountDraft {
    pub fn new(name: impl Into<String>) -> Self {
        AccountDraft { name: name.into() }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        self.validated_name().map(|_| ())
    }

    /// Name with surrounding whitespace removed
    pub fn validated_name(&self) -> Result<String, ValidationError> {
        required_text(&self.name, "name")
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_creation() {
        let account = Account::new(&AccountDraft::new("  Checking ")).unwrap();

        assert!(!account.id.is_empty());
        assert_eq!(account.name, "Checking");
    }

    #[test]
    fn test_blank_name_rejected() {
        let draft = AccountDraft::new("   ");

        assert_eq!(draft.validate(), Err(ValidationError::Required("name")));
        assert!(Account::new(&draft).is_err());
    }

    #[test]
    fn test_account_json_shape() {
        let account = Account {
            id: "a1".to_string(),
            name: "Savings".to_string(),
        };

        let json = serde_json::to_value(&account).unwrap();
        assert_eq!(json, serde_json::json!({"id": "a1", "name": "Savings"}));
    }
}
