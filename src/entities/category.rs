// 🏷️ Category Entity
//
// Same lifecycle shape as Account. Transactions reference a category
// optionally; deleting a category clears the reference instead of
// deleting the transactions.

use serde::{Deserialize, Serialize};

use super::{new_id, required_text, ValidationError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: String,
    pub name: String,
}

impl Category {
    pub fn new(draft: &CategoryDraft) -> Result<Self, ValidationError> {
        Ok(Category {
            id: new_id(),
            name: required_text(&draft.name, "name")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryDraft {
    pub name: String,
}

impl CategoryDraft {
    pub fn new(name: impl Into<String>) -> Self {
        CategoryDraft { name: name.into() }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        required_text(&self.name, "name").map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_creation() {
        let category = Category::new(&CategoryDraft::new("Groceries")).unwrap();

        assert!(!category.id.is_empty());
        assert_eq!(category.name, "Groceries");
    }

    #[test]
    fn test_two_categories_get_distinct_ids() {
        let a = Category::new(&CategoryDraft::new("Rent")).unwrap();
        let b = Category::new(&CategoryDraft::new("Rent")).unwrap();

        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_empty_name_rejected() {
        assert_eq!(
            CategoryDraft::new("").validate(),
            Err(ValidationError::Required("name"))
        );
    }
}
