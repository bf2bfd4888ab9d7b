// Query cache - client-side cache of API query results
//
// Results are stored per `QueryKey` as JSON values. A mutation makes
// related results stale by invalidating either one exact key
// (`Account(id)`) or every key of a scope (`Transactions(_)` for all
// filters). The next read of an invalidated key goes back to the API.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::entities::TransactionFilter;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum QueryKey {
    Accounts,
    Account(String),
    Categories,
    Category(String),
    Transactions(TransactionFilter),
    Transaction(String),
    Summary(TransactionFilter),
}

/// A key without its parameters; invalidating a scope drops every key in it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryScope {
    Accounts,
    Account,
    Categories,
    Category,
    Transactions,
    Transaction,
    Summary,
}

impl QueryKey {
    pub fn scope(&self) -> QueryScope {
        match self {
            QueryKey::Accounts => QueryScope::Accounts,
            QueryKey::Account(_) => QueryScope::Account,
            QueryKey::Categories => QueryScope::Categories,
            QueryKey::Category(_) => QueryScope::Category,
            QueryKey::Transactions(_) => QueryScope::Transactions,
            QueryKey::Transaction(_) => QueryScope::Transaction,
            QueryKey::Summary(_) => QueryScope::Summary,
        }
    }
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<QueryKey, serde_json::Value>,
    /// Bumped on every invalidation; a fetch that started before the bump
    /// must not write its (possibly stale) result back.
    epoch: u64,
}

#[derive(Default)]
pub struct QueryCache {
    state: Mutex<CacheState>,
}

impl QueryCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Cached value for `key`, if present and decodable as `T`
    pub fn get<T: DeserializeOwned>(&self, key: &QueryKey) -> Option<T> {
        let value = self.lock().entries.get(key).cloned()?;
        serde_json::from_value(value).ok()
    }

    pub fn set<T: Serialize>(&self, key: QueryKey, value: &T) {
        if let Ok(json) = serde_json::to_value(value) {
            self.lock().entries.insert(key, json);
        }
    }

    pub fn contains(&self, key: &QueryKey) -> bool {
        self.lock().entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Return the cached value or run `fetcher` and cache its result.
    /// Errors are returned as-is and never cached.
    pub async fn fetch<T, E, F, Fut>(&self, key: QueryKey, fetcher: F) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(cached) = self.get::<T>(&key) {
            tracing::trace!(?key, "cache hit");
            return Ok(cached);
        }

        let epoch = self.lock().epoch;
        let value = fetcher().await?;

        if let Ok(json) = serde_json::to_value(&value) {
            let mut state = self.lock();
            if state.epoch == epoch {
                state.entries.insert(key, json);
            } else {
                tracing::debug!(?key, "invalidated during fetch, result not cached");
            }
        }
        Ok(value)
    }

    /// Drop one exact key. Returns whether it was cached.
    pub fn invalidate(&self, key: &QueryKey) -> bool {
        let mut state = self.lock();
        state.epoch += 1;
        state.entries.remove(key).is_some()
    }

    /// Drop every key in `scope`. Returns how many entries were removed.
    pub fn invalidate_scope(&self, scope: QueryScope) -> usize {
        let mut state = self.lock();
        state.epoch += 1;
        let before = state.entries.len();
        state.entries.retain(|key, _| key.scope() != scope);
        let removed = before - state.entries.len();
        tracing::debug!(?scope, removed, "invalidated");
        removed
    }

    pub fn clear(&self) {
        let mut state = self.lock();
        state.epoch += 1;
        state.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_fetch_caches_until_invalidated() {
        let cache = QueryCache::new();
        let calls = AtomicUsize::new(0);
        let counter = &calls;

        let load = move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok::<_, String>(vec!["a".to_string()])
        };

        let first: Vec<String> = cache.fetch(QueryKey::Accounts, load).await.unwrap();
        let second: Vec<String> = cache.fetch(QueryKey::Accounts, load).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        assert!(cache.invalidate(&QueryKey::Accounts));
        let _: Vec<String> = cache.fetch(QueryKey::Accounts, load).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_errors_are_not_cached() {
        let cache = QueryCache::new();

        let failed: Result<Vec<String>, String> = cache
            .fetch(QueryKey::Categories, || async { Err("boom".to_string()) })
            .await;
        assert!(failed.is_err());
        assert!(!cache.contains(&QueryKey::Categories));
    }

    #[test]
    fn test_scope_invalidation_spans_filters() {
        let cache = QueryCache::new();
        let day = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();

        cache.set(QueryKey::Transactions(TransactionFilter::default()), &1);
        cache.set(QueryKey::Transactions(TransactionFilter::between(day, day)), &2);
        cache.set(QueryKey::Transaction("t1".to_string()), &3);
        cache.set(QueryKey::Summary(TransactionFilter::default()), &4);

        assert_eq!(cache.invalidate_scope(QueryScope::Transactions), 2);
        assert!(cache.contains(&QueryKey::Transaction("t1".to_string())));
        assert_eq!(cache.len(), 2);
    }

    #[tokio::test]
    async fn test_invalidation_during_fetch_discards_result() {
        let cache = QueryCache::new();
        let shared = &cache;

        let value: i32 = cache
            .fetch(QueryKey::Summary(TransactionFilter::default()), move || async move {
                shared.invalidate_scope(QueryScope::Summary);
                Ok::<_, String>(7)
            })
            .await
            .unwrap();

        assert_eq!(value, 7);
        assert!(cache.is_empty());
    }
}
