// API client - the dashboard's view of the REST API
//
// `FinanceApi` has a single required method, `send`, which performs one
// request and unwraps the `{success, data, error}` envelope. Every typed
// operation is built on top of it from a `Resource` description (path,
// cache keys, validation). `RouterClient` sends requests through the axum
// router in-process, so the client and the server share one code path.

use axum::body::Body;
use axum::http::{header, Method, Request};
use axum::Router;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::future::Future;
use std::path::Path;
use thiserror::Error;
use tower::ServiceExt;

use crate::api::{self, ApiResponse, AppState};
use crate::db;
use crate::entities::{
    Account, AccountDraft, BulkIds, Category, CategoryDraft, DeletedRef, Transaction,
    TransactionDraft, TransactionFilter, ValidationError,
};
use crate::query_cache::{QueryKey, QueryScope};
use crate::summary::Summary;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request failed with status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("malformed response: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("response carried no data")]
    EmptyResponse,
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

// ============================================================================
// RESOURCES
// ============================================================================

/// One REST collection and how the client caches it
pub trait Resource: Send + Sync + 'static {
    type Entity: Serialize + DeserializeOwned + Clone + Send + Sync + 'static;
    type Draft: Serialize + Clone + Send + Sync + 'static;
    type Filter: Clone + Default + Send + Sync + 'static;

    /// Collection path below `/api`
    const PATH: &'static str;
    /// Singular name used in notifications ("Account created")
    const LABEL: &'static str;
    /// Plural name used in notifications ("Accounts deleted")
    const PLURAL: &'static str;

    fn list_key(filter: &Self::Filter) -> QueryKey;
    fn item_key(id: &str) -> QueryKey;
    fn entity_id(entity: &Self::Entity) -> &str;
    fn validate(draft: &Self::Draft) -> Result<(), ValidationError>;

    /// Scopes that go stale whenever this resource changes
    fn dependent_scopes() -> &'static [QueryScope];

    fn query_string(_filter: &Self::Filter) -> String {
        String::new()
    }
}

pub struct Accounts;
pub struct Categories;
pub struct Transactions;

impl Resource for Accounts {
    type Entity = Account;
    type Draft = AccountDraft;
    type Filter = ();

    const PATH: &'static str = "/accounts";
    const LABEL: &'static str = "Account";
    const PLURAL: &'static str = "Accounts";

    fn list_key(_filter: &()) -> QueryKey {
        QueryKey::Accounts
    }

    fn item_key(id: &str) -> QueryKey {
        QueryKey::Account(id.to_string())
    }

    fn entity_id(entity: &Account) -> &str {
        &entity.id
    }

    fn validate(draft: &AccountDraft) -> Result<(), ValidationError> {
        draft.validate()
    }

    fn dependent_scopes() -> &'static [QueryScope] {
        &[QueryScope::Accounts, QueryScope::Summary, QueryScope::Transactions]
    }
}

impl Resource for Categories {
    type Entity = Category;
    type Draft = CategoryDraft;
    type Filter = ();

    const PATH: &'static str = "/categories";
    const LABEL: &'static str = "Category";
    const PLURAL: &'static str = "Categories";

    fn list_key(_filter: &()) -> QueryKey {
        QueryKey::Categories
    }

    fn item_key(id: &str) -> QueryKey {
        QueryKey::Category(id.to_string())
    }

    fn entity_id(entity: &Category) -> &str {
        &entity.id
    }

    fn validate(draft: &CategoryDraft) -> Result<(), ValidationError> {
        draft.validate()
    }

    fn dependent_scopes() -> &'static [QueryScope] {
        &[QueryScope::Categories, QueryScope::Summary, QueryScope::Transactions]
    }
}

impl Resource for Transactions {
    type Entity = Transaction;
    type Draft = TransactionDraft;
    type Filter = TransactionFilter;

    const PATH: &'static str = "/transactions";
    const LABEL: &'static str = "Transaction";
    const PLURAL: &'static str = "Transactions";

    fn list_key(filter: &TransactionFilter) -> QueryKey {
        QueryKey::Transactions(filter.clone())
    }

    fn item_key(id: &str) -> QueryKey {
        QueryKey::Transaction(id.to_string())
    }

    fn entity_id(entity: &Transaction) -> &str {
        &entity.id
    }

    fn validate(draft: &TransactionDraft) -> Result<(), ValidationError> {
        draft.validate()
    }

    fn dependent_scopes() -> &'static [QueryScope] {
        &[QueryScope::Transactions, QueryScope::Summary]
    }

    fn query_string(filter: &TransactionFilter) -> String {
        filter_query(filter)
    }
}

/// `?from=..&to=..&accountId=..` with unset fields left out
pub fn filter_query(filter: &TransactionFilter) -> String {
    let mut pairs = Vec::new();
    if let Some(from) = filter.from {
        pairs.push(format!("from={from}"));
    }
    if let Some(to) = filter.to {
        pairs.push(format!("to={to}"));
    }
    if let Some(account_id) = &filter.account_id {
        pairs.push(format!("accountId={}", urlencoding::encode(account_id)));
    }

    if pairs.is_empty() {
        String::new()
    } else {
        format!("?{}", pairs.join("&"))
    }
}

fn encode_id(id: &str) -> String {
    urlencoding::encode(id).into_owned()
}

fn decode<T: DeserializeOwned>(data: Value) -> ApiResult<T> {
    Ok(serde_json::from_value(data)?)
}

// ============================================================================
// API TRAIT
// ============================================================================

pub trait FinanceApi: Send + Sync + 'static {
    /// Perform one request against `/api{path}` and return the envelope's
    /// `data`. Non-2xx responses and `success: false` become `ApiError::Status`.
    fn send(
        &self,
        method: Method,
        path: String,
        body: Option<Value>,
    ) -> impl Future<Output = ApiResult<Value>> + Send;

    fn list<R: Resource>(
        &self,
        filter: &R::Filter,
    ) -> impl Future<Output = ApiResult<Vec<R::Entity>>> + Send {
        let path = format!("{}{}", R::PATH, R::query_string(filter));
        async move { decode(self.send(Method::GET, path, None).await?) }
    }

    fn get<R: Resource>(&self, id: &str) -> impl Future<Output = ApiResult<R::Entity>> + Send {
        let path = format!("{}/{}", R::PATH, encode_id(id));
        async move { decode(self.send(Method::GET, path, None).await?) }
    }

    fn create<R: Resource>(
        &self,
        draft: &R::Draft,
    ) -> impl Future<Output = ApiResult<R::Entity>> + Send {
        let body = serde_json::to_value(draft);
        async move {
            let data = self.send(Method::POST, R::PATH.to_string(), Some(body?)).await?;
            decode(data)
        }
    }

    fn update<R: Resource>(
        &self,
        id: &str,
        draft: &R::Draft,
    ) -> impl Future<Output = ApiResult<R::Entity>> + Send {
        let path = format!("{}/{}", R::PATH, encode_id(id));
        let body = serde_json::to_value(draft);
        async move { decode(self.send(Method::PATCH, path, Some(body?)).await?) }
    }

    fn delete<R: Resource>(&self, id: &str) -> impl Future<Output = ApiResult<R::Entity>> + Send {
        let path = format!("{}/{}", R::PATH, encode_id(id));
        async move { decode(self.send(Method::DELETE, path, None).await?) }
    }

    fn bulk_delete<R: Resource>(
        &self,
        ids: &[String],
    ) -> impl Future<Output = ApiResult<Vec<DeletedRef>>> + Send {
        let path = format!("{}/bulk-delete", R::PATH);
        let body = serde_json::to_value(BulkIds { ids: ids.to_vec() });
        async move { decode(self.send(Method::POST, path, Some(body?)).await?) }
    }

    fn bulk_create_transactions(
        &self,
        drafts: &[TransactionDraft],
    ) -> impl Future<Output = ApiResult<Vec<Transaction>>> + Send {
        let path = format!("{}/bulk-create", Transactions::PATH);
        let body = serde_json::to_value(drafts);
        async move { decode(self.send(Method::POST, path, Some(body?)).await?) }
    }

    fn summary(&self, filter: &TransactionFilter) -> impl Future<Output = ApiResult<Summary>> + Send {
        let path = format!("/summary{}", filter_query(filter));
        async move { decode(self.send(Method::GET, path, None).await?) }
    }
}

// ============================================================================
// IN-PROCESS CLIENT
// ============================================================================

/// Sends requests through the API router without a socket
#[derive(Clone)]
pub struct RouterClient {
    router: Router,
}

impl RouterClient {
    pub fn new(router: Router) -> Self {
        RouterClient { router }
    }

    /// Client over a database file (created if missing)
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        let conn = db::open_database(path)?;
        Ok(Self::new(api::router(AppState::new(conn))))
    }

    /// Client over a fresh in-memory database
    pub fn in_memory() -> anyhow::Result<Self> {
        let conn = rusqlite::Connection::open_in_memory()?;
        db::setup_database(&conn)?;
        Ok(Self::new(api::router(AppState::new(conn))))
    }
}

impl FinanceApi for RouterClient {
    async fn send(&self, method: Method, path: String, body: Option<Value>) -> ApiResult<Value> {
        let uri = format!("/api{path}");
        tracing::debug!(%method, %uri, "api request");

        let builder = Request::builder().method(method).uri(&uri);
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(serde_json::to_vec(&body)?)),
            None => builder.body(Body::empty()),
        }
        .map_err(|e| ApiError::Transport(e.to_string()))?;

        let response = match self.router.clone().oneshot(request).await {
            Ok(response) => response,
            Err(never) => match never {},
        };

        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        if !status.is_success() {
            // extractor rejections answer with plain text, not the envelope
            let message = serde_json::from_slice::<ApiResponse<Value>>(&bytes)
                .ok()
                .and_then(|envelope| envelope.error)
                .unwrap_or_else(|| String::from_utf8_lossy(&bytes).into_owned());
            tracing::debug!(%uri, status = status.as_u16(), %message, "api error");
            return Err(ApiError::Status {
                status: status.as_u16(),
                message,
            });
        }

        let envelope: ApiResponse<Value> = serde_json::from_slice(&bytes)?;
        if !envelope.success {
            return Err(ApiError::Status {
                status: status.as_u16(),
                message: envelope.error.unwrap_or_default(),
            });
        }
        envelope.data.ok_or(ApiError::EmptyResponse)
    }
}

// ============================================================================
// TEST SUPPORT
// ============================================================================

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    /// Wraps a client, records every request and can simulate an outage
    pub(crate) struct CountingApi<A> {
        inner: A,
        requests: Mutex<Vec<(Method, String)>>,
        offline: AtomicBool,
    }

    impl<A: FinanceApi> CountingApi<A> {
        pub(crate) fn new(inner: A) -> Self {
            CountingApi {
                inner,
                requests: Mutex::new(Vec::new()),
                offline: AtomicBool::new(false),
            }
        }

        pub(crate) fn set_offline(&self, offline: bool) {
            self.offline.store(offline, Ordering::SeqCst);
        }

        pub(crate) fn requests(&self) -> Vec<(Method, String)> {
            self.requests.lock().unwrap().clone()
        }

        /// Requests other than GET
        pub(crate) fn writes(&self) -> Vec<String> {
            self.requests()
                .into_iter()
                .filter(|(method, _)| *method != Method::GET)
                .map(|(method, path)| format!("{method} {path}"))
                .collect()
        }

        pub(crate) fn reset(&self) {
            self.requests.lock().unwrap().clear();
        }
    }

    pub(crate) fn in_memory() -> CountingApi<RouterClient> {
        CountingApi::new(RouterClient::in_memory().unwrap())
    }

    impl<A: FinanceApi> FinanceApi for CountingApi<A> {
        async fn send(&self, method: Method, path: String, body: Option<Value>) -> ApiResult<Value> {
            self.requests.lock().unwrap().push((method.clone(), path.clone()));
            if self.offline.load(Ordering::SeqCst) {
                return Err(ApiError::Transport("connection refused".to_string()));
            }
            self.inner.send(method, path, body).await
        }
    }
}
