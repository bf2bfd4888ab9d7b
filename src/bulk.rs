// Bulk submission - attach the account and create all rows in one request

use thiserror::Error;

use crate::client::FinanceApi;
use crate::dialog::GateError;
use crate::entities::{Transaction, TransactionDraft};
use crate::hooks::{MutationError, TransactionHooks};
use crate::import::{ImportError, ImportRow};

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("nothing to import")]
    NoRows,

    #[error("no account selected")]
    NoAccount,

    #[error("no import in progress")]
    NotImporting,

    #[error("an import is already being submitted")]
    Busy,

    #[error(transparent)]
    Rows(#[from] ImportError),

    #[error(transparent)]
    Gate(#[from] GateError),

    #[error(transparent)]
    Mutation(#[from] MutationError),
}

pub struct BulkSubmission<A> {
    transactions: TransactionHooks<A>,
}

impl<A: FinanceApi> BulkSubmission<A> {
    pub fn new(transactions: TransactionHooks<A>) -> Self {
        BulkSubmission { transactions }
    }

    /// Rows with the account id attached
    pub fn drafts(rows: Vec<ImportRow>, account_id: &str) -> Vec<TransactionDraft> {
        rows.into_iter().map(|row| row.into_draft(account_id)).collect()
    }

    /// Issue exactly one bulk-create request. Empty rows or a blank
    /// account id return early without touching the API.
    pub async fn submit(&self, rows: Vec<ImportRow>, account_id: &str) -> Result<Vec<Transaction>, SubmitError> {
        if rows.is_empty() {
            return Err(SubmitError::NoRows);
        }
        if account_id.trim().is_empty() {
            return Err(SubmitError::NoAccount);
        }

        let drafts = Self::drafts(rows, account_id);
        let created = self
            .transactions
            .bulk_create_reporting(&drafts, "Transactions imported successfully", "Failed to import transactions")
            .await?;

        tracing::info!(count = created.len(), account_id, "import committed");
        Ok(created)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::testing::{self, CountingApi};
    use crate::client::{Accounts, RouterClient, Transactions};
    use crate::entities::{AccountDraft, TransactionFilter};
    use crate::hooks::EntityHooks;
    use crate::notify::RecordingNotifier;
    use crate::query_cache::QueryCache;
    use chrono::NaiveDate;
    use std::sync::Arc;

    fn row(payee: &str, amount: i64) -> ImportRow {
        ImportRow {
            date: NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
            payee: payee.to_string(),
            amount,
            notes: None,
            category_id: None,
        }
    }

    fn setup() -> (Arc<CountingApi<RouterClient>>, BulkSubmission<CountingApi<RouterClient>>, Arc<RecordingNotifier>) {
        let api = Arc::new(testing::in_memory());
        let notifier = Arc::new(RecordingNotifier::new());
        let hooks = EntityHooks::new(api.clone(), Arc::new(QueryCache::new()), notifier.clone());
        (api, BulkSubmission::new(hooks), notifier)
    }

    #[tokio::test]
    async fn test_empty_rows_issue_no_request() {
        let (api, bulk, notifier) = setup();

        let err = bulk.submit(Vec::new(), "acc-1").await.unwrap_err();
        assert!(matches!(err, SubmitError::NoRows));
        assert!(api.requests().is_empty());
        assert!(notifier.notifications().is_empty());
    }

    #[tokio::test]
    async fn test_submit_attaches_account() {
        let (api, bulk, notifier) = setup();
        let checking = api.create::<Accounts>(&AccountDraft::new("Checking")).await.unwrap();
        api.reset();

        let created = bulk
            .submit(vec![row("Grocer", -4_000), row("Employer", 250_000)], &checking.id)
            .await
            .unwrap();

        assert_eq!(api.writes(), vec!["POST /transactions/bulk-create"]);
        assert!(created.iter().all(|t| t.account_id == checking.id));
        assert_eq!(notifier.messages(), vec!["Transactions imported successfully"]);
    }

    #[tokio::test]
    async fn test_unknown_account_rejects_whole_batch() {
        let (api, bulk, notifier) = setup();

        let err = bulk.submit(vec![row("Grocer", -4_000)], "no-such-account").await.unwrap_err();
        assert!(matches!(err, SubmitError::Mutation(MutationError::Api(_))));
        assert_eq!(notifier.messages(), vec!["Failed to import transactions"]);

        let stored = api.list::<Transactions>(&TransactionFilter::default()).await.unwrap();
        assert!(stored.is_empty());
    }
}
