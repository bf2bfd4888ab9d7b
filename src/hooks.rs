// Entity hooks - cached queries and notifying mutations per resource
//
// Queries read through the `QueryCache`. Mutations validate first, then
// call the API once. On success they notify and invalidate the item key
// plus every scope the resource lists in `dependent_scopes`; on failure
// they notify a generic error and leave the cache alone. No retries.

use std::marker::PhantomData;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use thiserror::Error;

use crate::client::{Accounts, ApiError, ApiResult, Categories, FinanceApi, Resource, Transactions};
use crate::entities::{DeletedRef, Transaction, TransactionDraft, TransactionFilter, ValidationError};
use crate::notify::{Notification, Notifier};
use crate::query_cache::{QueryCache, QueryKey};
use crate::summary::Summary;

#[derive(Debug, Error)]
pub enum MutationError {
    #[error(transparent)]
    Invalid(#[from] ValidationError),

    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Counts in-flight mutations while alive
struct PendingGuard(Arc<AtomicUsize>);

impl PendingGuard {
    fn begin(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        PendingGuard(Arc::clone(counter))
    }
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Messages for one mutation outcome
struct Outcome {
    success: String,
    failure: String,
}

impl Outcome {
    fn new(success: impl Into<String>, failure: impl Into<String>) -> Self {
        Outcome {
            success: success.into(),
            failure: failure.into(),
        }
    }
}

pub struct EntityHooks<A, R> {
    api: Arc<A>,
    cache: Arc<QueryCache>,
    notifier: Arc<dyn Notifier>,
    pending: Arc<AtomicUsize>,
    _resource: PhantomData<fn() -> R>,
}

pub type AccountHooks<A> = EntityHooks<A, Accounts>;
pub type CategoryHooks<A> = EntityHooks<A, Categories>;
pub type TransactionHooks<A> = EntityHooks<A, Transactions>;

impl<A, R> Clone for EntityHooks<A, R> {
    fn clone(&self) -> Self {
        EntityHooks {
            api: Arc::clone(&self.api),
            cache: Arc::clone(&self.cache),
            notifier: Arc::clone(&self.notifier),
            pending: Arc::clone(&self.pending),
            _resource: PhantomData,
        }
    }
}

impl<A: FinanceApi, R: Resource> EntityHooks<A, R> {
    pub fn new(api: Arc<A>, cache: Arc<QueryCache>, notifier: Arc<dyn Notifier>) -> Self {
        EntityHooks {
            api,
            cache,
            notifier,
            pending: Arc::new(AtomicUsize::new(0)),
            _resource: PhantomData,
        }
    }

    /// True while any mutation of this hook is in flight
    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::SeqCst) > 0
    }

    pub async fn list(&self, filter: &R::Filter) -> ApiResult<Vec<R::Entity>> {
        let api = &self.api;
        self.cache
            .fetch(R::list_key(filter), move || api.list::<R>(filter))
            .await
    }

    pub async fn get(&self, id: &str) -> ApiResult<R::Entity> {
        let api = &self.api;
        self.cache
            .fetch(R::item_key(id), move || api.get::<R>(id))
            .await
    }

    pub async fn create(&self, draft: &R::Draft) -> Result<R::Entity, MutationError> {
        R::validate(draft)?;
        let outcome = Outcome::new(
            format!("{} created", R::LABEL),
            format!("Failed to create {}", R::LABEL.to_lowercase()),
        );
        let created = self.mutate(outcome, self.api.create::<R>(draft)).await?;
        self.invalidate(Some(R::entity_id(&created)));
        Ok(created)
    }

    pub async fn update(&self, id: &str, draft: &R::Draft) -> Result<R::Entity, MutationError> {
        R::validate(draft)?;
        let outcome = Outcome::new(
            format!("{} updated", R::LABEL),
            format!("Failed to edit {}", R::LABEL.to_lowercase()),
        );
        let updated = self.mutate(outcome, self.api.update::<R>(id, draft)).await?;
        self.invalidate(Some(id));
        Ok(updated)
    }

    pub async fn delete(&self, id: &str) -> Result<R::Entity, MutationError> {
        let outcome = Outcome::new(
            format!("{} deleted", R::LABEL),
            format!("Failed to delete {}", R::LABEL.to_lowercase()),
        );
        let deleted = self.mutate(outcome, self.api.delete::<R>(id)).await?;
        self.invalidate(Some(id));
        Ok(deleted)
    }

    /// One request for all `ids`; an empty list is rejected locally
    pub async fn bulk_delete(&self, ids: &[String]) -> Result<Vec<DeletedRef>, MutationError> {
        if ids.is_empty() {
            return Err(ValidationError::Required("ids").into());
        }
        let outcome = Outcome::new(
            format!("{} deleted", R::PLURAL),
            format!("Failed to delete {}", R::PLURAL.to_lowercase()),
        );
        let deleted = self.mutate(outcome, self.api.bulk_delete::<R>(ids)).await?;
        for removed in &deleted {
            self.cache.invalidate(&R::item_key(&removed.id));
        }
        self.invalidate(None);
        Ok(deleted)
    }

    async fn mutate<T>(
        &self,
        outcome: Outcome,
        request: impl std::future::Future<Output = ApiResult<T>>,
    ) -> Result<T, MutationError> {
        let _pending = PendingGuard::begin(&self.pending);
        match request.await {
            Ok(value) => {
                self.notifier.notify(Notification::success(outcome.success));
                Ok(value)
            }
            Err(err) => {
                tracing::warn!(resource = R::PLURAL, "mutation failed: {err}");
                self.notifier.notify(Notification::error(outcome.failure));
                Err(err.into())
            }
        }
    }

    fn invalidate(&self, id: Option<&str>) {
        if let Some(id) = id {
            self.cache.invalidate(&R::item_key(id));
        }
        for scope in R::dependent_scopes() {
            self.cache.invalidate_scope(*scope);
        }
    }
}

impl<A: FinanceApi> EntityHooks<A, Transactions> {
    /// Create many transactions with one request
    pub async fn bulk_create(&self, drafts: &[TransactionDraft]) -> Result<Vec<Transaction>, MutationError> {
        self.bulk_create_reporting(drafts, "Transactions created", "Failed to create transactions")
            .await
    }

    /// `bulk_create` with caller-chosen notification texts
    pub(crate) async fn bulk_create_reporting(
        &self,
        drafts: &[TransactionDraft],
        success: &str,
        failure: &str,
    ) -> Result<Vec<Transaction>, MutationError> {
        if drafts.is_empty() {
            return Err(ValidationError::Required("transactions").into());
        }
        for draft in drafts {
            draft.validate()?;
        }

        let created = self
            .mutate(
                Outcome::new(success, failure),
                self.api.bulk_create_transactions(drafts),
            )
            .await?;
        self.invalidate(None);
        Ok(created)
    }
}

/// Cached read of `/summary`
pub struct SummaryHook<A> {
    api: Arc<A>,
    cache: Arc<QueryCache>,
}

impl<A> Clone for SummaryHook<A> {
    fn clone(&self) -> Self {
        SummaryHook {
            api: Arc::clone(&self.api),
            cache: Arc::clone(&self.cache),
        }
    }
}

impl<A: FinanceApi> SummaryHook<A> {
    pub fn new(api: Arc<A>, cache: Arc<QueryCache>) -> Self {
        SummaryHook { api, cache }
    }

    pub async fn get(&self, filter: &TransactionFilter) -> ApiResult<Summary> {
        let api = &self.api;
        self.cache
            .fetch(QueryKey::Summary(filter.clone()), move || api.summary(filter))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::testing::{self, CountingApi};
    use crate::client::RouterClient;
    use crate::entities::{AccountDraft, CategoryDraft};
    use crate::notify::RecordingNotifier;
    use chrono::NaiveDate;

    struct Fixture {
        api: Arc<CountingApi<RouterClient>>,
        cache: Arc<QueryCache>,
        notifier: Arc<RecordingNotifier>,
    }

    impl Fixture {
        fn new() -> Self {
            Fixture {
                api: Arc::new(testing::in_memory()),
                cache: Arc::new(QueryCache::new()),
                notifier: Arc::new(RecordingNotifier::new()),
            }
        }

        fn hooks<R: Resource>(&self) -> EntityHooks<CountingApi<RouterClient>, R> {
            EntityHooks::new(self.api.clone(), self.cache.clone(), self.notifier.clone())
        }
    }

    fn draft(account_id: &str, payee: &str, amount: i64) -> TransactionDraft {
        TransactionDraft {
            amount,
            payee: payee.to_string(),
            notes: None,
            date: NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
            account_id: account_id.to_string(),
            category_id: None,
        }
    }

    #[tokio::test]
    async fn test_list_is_cached_until_mutation() {
        let fx = Fixture::new();
        let accounts = fx.hooks::<Accounts>();

        assert!(accounts.list(&()).await.unwrap().is_empty());
        assert!(accounts.list(&()).await.unwrap().is_empty());
        assert_eq!(fx.api.requests().len(), 1);

        accounts.create(&AccountDraft::new("Checking")).await.unwrap();
        let listed = accounts.list(&()).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(fx.notifier.messages(), vec!["Account created"]);
    }

    #[tokio::test]
    async fn test_invalid_draft_sends_nothing() {
        let fx = Fixture::new();
        let categories = fx.hooks::<Categories>();

        let err = categories.create(&CategoryDraft::new("   ")).await.unwrap_err();
        assert!(matches!(err, MutationError::Invalid(ValidationError::Required("name"))));
        assert!(fx.api.requests().is_empty());
        assert!(fx.notifier.notifications().is_empty());
    }

    #[tokio::test]
    async fn test_failure_notifies_and_keeps_cache() {
        let fx = Fixture::new();
        let categories = fx.hooks::<Categories>();
        categories.list(&()).await.unwrap();

        fx.api.set_offline(true);
        let err = categories.create(&CategoryDraft::new("Food")).await.unwrap_err();

        assert!(matches!(err, MutationError::Api(ApiError::Transport(_))));
        assert_eq!(fx.notifier.messages(), vec!["Failed to create category"]);
        assert!(fx.cache.contains(&QueryKey::Categories));
        assert!(!categories.is_pending());
    }

    #[tokio::test]
    async fn test_category_delete_invalidates_transactions_and_summary() {
        let fx = Fixture::new();
        let categories = fx.hooks::<Categories>();
        let transactions = fx.hooks::<Transactions>();
        let summary = SummaryHook::new(fx.api.clone(), fx.cache.clone());

        let food = categories.create(&CategoryDraft::new("Food")).await.unwrap();
        categories.get(&food.id).await.unwrap();
        transactions.list(&TransactionFilter::default()).await.unwrap();
        summary.get(&TransactionFilter::default()).await.unwrap();

        categories.delete(&food.id).await.unwrap();

        assert!(fx.cache.is_empty());
        assert_eq!(fx.notifier.last().unwrap().message, "Category deleted");
    }

    #[tokio::test]
    async fn test_bulk_create_and_bulk_delete() {
        let fx = Fixture::new();
        let accounts = fx.hooks::<Accounts>();
        let transactions = fx.hooks::<Transactions>();
        let checking = accounts.create(&AccountDraft::new("Checking")).await.unwrap();

        let created = transactions
            .bulk_create(&[draft(&checking.id, "Grocer", -12_000), draft(&checking.id, "Cafe", -4_500)])
            .await
            .unwrap();
        assert_eq!(created.len(), 2);

        let ids: Vec<String> = created.iter().map(|t| t.id.clone()).collect();
        fx.api.reset();
        let deleted = transactions.bulk_delete(&ids).await.unwrap();

        assert_eq!(deleted.len(), 2);
        assert_eq!(fx.api.writes(), vec!["POST /transactions/bulk-delete"]);
        assert!(transactions.list(&TransactionFilter::default()).await.unwrap().is_empty());
        assert_eq!(fx.notifier.last().unwrap().message, "Transactions deleted");
    }

    #[tokio::test]
    async fn test_empty_bulk_requests_are_local_errors() {
        let fx = Fixture::new();
        let transactions = fx.hooks::<Transactions>();

        assert!(transactions.bulk_delete(&[]).await.is_err());
        assert!(transactions.bulk_create(&[]).await.is_err());
        assert!(fx.api.requests().is_empty());
    }
}
