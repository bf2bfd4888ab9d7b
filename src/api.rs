// REST API with Axum
//
// Thin layer over `db`: every handler locks the connection, calls one store
// function and wraps the result in `ApiResponse`. The router is nested under
// `/api` and shared by the server binary and the in-process client.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::db;
use crate::entities::{
    Account, AccountDraft, BulkIds, Category, CategoryDraft, DeletedRef, Transaction,
    TransactionDraft, TransactionFilter,
};
use crate::summary::{self, Summary};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    db: Arc<Mutex<Connection>>,
}

impl AppState {
    pub fn new(conn: Connection) -> Self {
        Self {
            db: Arc::new(Mutex::new(conn)),
        }
    }

    // a handler that panicked mid-request leaves no open transaction behind
    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.db.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// API Response wrapper
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

/// Error half of every handler: a status plus a message for the envelope
#[derive(Debug)]
pub struct ApiFailure {
    status: StatusCode,
    message: String,
}

impl ApiFailure {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn not_found(what: &str) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: format!("{what} not found"),
        }
    }

    fn internal(err: anyhow::Error) -> Self {
        tracing::error!("store error: {err:#}");
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: "internal server error".to_string(),
        }
    }

    /// Constraint violations are caller mistakes (unknown account/category)
    fn from_store(err: anyhow::Error) -> Self {
        if db::is_constraint_violation(&err) {
            tracing::warn!("rejected write: {err:#}");
            Self::bad_request("unknown account or category")
        } else {
            Self::internal(err)
        }
    }
}

impl IntoResponse for ApiFailure {
    fn into_response(self) -> Response {
        (self.status, Json(ApiResponse::<()>::failure(self.message))).into_response()
    }
}

type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiFailure>;

fn found<T>(value: Option<T>, what: &str) -> ApiResult<T> {
    value
        .map(|v| Json(ApiResponse::ok(v)))
        .ok_or_else(|| ApiFailure::not_found(what))
}

fn require_ids(body: &BulkIds) -> Result<(), ApiFailure> {
    if body.ids.is_empty() {
        return Err(ApiFailure::bad_request("ids is required"));
    }
    Ok(())
}

fn deleted_refs(ids: Vec<String>) -> Vec<DeletedRef> {
    ids.into_iter().map(|id| DeletedRef { id }).collect()
}

// ============================================================================
// Router
// ============================================================================

/// Build the `/api` router over an open connection
pub fn router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/accounts", get(list_accounts).post(create_account))
        .route("/accounts/bulk-delete", post(bulk_delete_accounts))
        .route(
            "/accounts/:id",
            get(get_account).patch(update_account).delete(delete_account),
        )
        .route("/categories", get(list_categories).post(create_category))
        .route("/categories/bulk-delete", post(bulk_delete_categories))
        .route(
            "/categories/:id",
            get(get_category).patch(update_category).delete(delete_category),
        )
        .route("/transactions", get(list_transactions).post(create_transaction))
        .route("/transactions/bulk-create", post(bulk_create_transactions))
        .route("/transactions/bulk-delete", post(bulk_delete_transactions))
        .route(
            "/transactions/:id",
            get(get_transaction)
                .patch(update_transaction)
                .delete(delete_transaction),
        )
        .route("/summary", get(get_summary))
        .with_state(state);

    Router::new().nest("/api", api_routes)
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

// --- accounts ---------------------------------------------------------------

/// GET /api/accounts
async fn list_accounts(State(state): State<AppState>) -> ApiResult<Vec<Account>> {
    let conn = state.conn();
    let accounts = db::list_accounts(&conn).map_err(ApiFailure::internal)?;
    Ok(Json(ApiResponse::ok(accounts)))
}

/// POST /api/accounts
async fn create_account(
    State(state): State<AppState>,
    Json(draft): Json<AccountDraft>,
) -> ApiResult<Account> {
    draft
        .validate()
        .map_err(|e| ApiFailure::bad_request(e.to_string()))?;
    let conn = state.conn();
    let account = db::insert_account(&conn, &draft).map_err(ApiFailure::from_store)?;
    tracing::info!(id = %account.id, "account created");
    Ok(Json(ApiResponse::ok(account)))
}

/// GET /api/accounts/:id
async fn get_account(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Account> {
    let conn = state.conn();
    found(db::get_account(&conn, &id).map_err(ApiFailure::internal)?, "account")
}

/// PATCH /api/accounts/:id
async fn update_account(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(draft): Json<AccountDraft>,
) -> ApiResult<Account> {
    draft
        .validate()
        .map_err(|e| ApiFailure::bad_request(e.to_string()))?;
    let conn = state.conn();
    found(
        db::update_account(&conn, &id, &draft).map_err(ApiFailure::from_store)?,
        "account",
    )
}

/// DELETE /api/accounts/:id
async fn delete_account(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Account> {
    let conn = state.conn();
    found(db::delete_account(&conn, &id).map_err(ApiFailure::internal)?, "account")
}

/// POST /api/accounts/bulk-delete
async fn bulk_delete_accounts(
    State(state): State<AppState>,
    Json(body): Json<BulkIds>,
) -> ApiResult<Vec<DeletedRef>> {
    require_ids(&body)?;
    let mut conn = state.conn();
    let deleted = db::delete_accounts(&mut conn, &body.ids).map_err(ApiFailure::internal)?;
    Ok(Json(ApiResponse::ok(deleted_refs(deleted))))
}

// --- categories -------------------------------------------------------------

/// GET /api/categories
async fn list_categories(State(state): State<AppState>) -> ApiResult<Vec<Category>> {
    let conn = state.conn();
    let categories = db::list_categories(&conn).map_err(ApiFailure::internal)?;
    Ok(Json(ApiResponse::ok(categories)))
}

/// POST /api/categories
async fn create_category(
    State(state): State<AppState>,
    Json(draft): Json<CategoryDraft>,
) -> ApiResult<Category> {
    draft
        .validate()
        .map_err(|e| ApiFailure::bad_request(e.to_string()))?;
    let conn = state.conn();
    let category = db::insert_category(&conn, &draft).map_err(ApiFailure::from_store)?;
    tracing::info!(id = %category.id, "category created");
    Ok(Json(ApiResponse::ok(category)))
}

/// GET /api/categories/:id
async fn get_category(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Category> {
    let conn = state.conn();
    found(db::get_category(&conn, &id).map_err(ApiFailure::internal)?, "category")
}

/// PATCH /api/categories/:id
async fn update_category(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(draft): Json<CategoryDraft>,
) -> ApiResult<Category> {
    draft
        .validate()
        .map_err(|e| ApiFailure::bad_request(e.to_string()))?;
    let conn = state.conn();
    found(
        db::update_category(&conn, &id, &draft).map_err(ApiFailure::from_store)?,
        "category",
    )
}

/// DELETE /api/categories/:id
async fn delete_category(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Category> {
    let conn = state.conn();
    found(db::delete_category(&conn, &id).map_err(ApiFailure::internal)?, "category")
}

/// POST /api/categories/bulk-delete
async fn bulk_delete_categories(
    State(state): State<AppState>,
    Json(body): Json<BulkIds>,
) -> ApiResult<Vec<DeletedRef>> {
    require_ids(&body)?;
    let mut conn = state.conn();
    let deleted = db::delete_categories(&mut conn, &body.ids).map_err(ApiFailure::internal)?;
    Ok(Json(ApiResponse::ok(deleted_refs(deleted))))
}

// --- transactions -----------------------------------------------------------

/// GET /api/transactions?from&to&accountId
async fn list_transactions(
    State(state): State<AppState>,
    Query(filter): Query<TransactionFilter>,
) -> ApiResult<Vec<Transaction>> {
    let conn = state.conn();
    let transactions = db::list_transactions(&conn, &filter).map_err(ApiFailure::internal)?;
    Ok(Json(ApiResponse::ok(transactions)))
}

/// POST /api/transactions
async fn create_transaction(
    State(state): State<AppState>,
    Json(draft): Json<TransactionDraft>,
) -> ApiResult<Transaction> {
    draft
        .validate()
        .map_err(|e| ApiFailure::bad_request(e.to_string()))?;
    let conn = state.conn();
    let tx = db::insert_transaction(&conn, &draft).map_err(ApiFailure::from_store)?;
    Ok(Json(ApiResponse::ok(tx)))
}

/// POST /api/transactions/bulk-create
async fn bulk_create_transactions(
    State(state): State<AppState>,
    Json(drafts): Json<Vec<TransactionDraft>>,
) -> ApiResult<Vec<Transaction>> {
    if drafts.is_empty() {
        return Err(ApiFailure::bad_request("at least one transaction is required"));
    }
    for (index, draft) in drafts.iter().enumerate() {
        draft
            .validate()
            .map_err(|e| ApiFailure::bad_request(format!("row {}: {e}", index + 1)))?;
    }

    let mut conn = state.conn();
    let created = db::insert_transactions(&mut conn, &drafts).map_err(ApiFailure::from_store)?;
    Ok(Json(ApiResponse::ok(created)))
}

/// GET /api/transactions/:id
async fn get_transaction(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Transaction> {
    let conn = state.conn();
    found(db::get_transaction(&conn, &id).map_err(ApiFailure::internal)?, "transaction")
}

/// PATCH /api/transactions/:id
async fn update_transaction(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(draft): Json<TransactionDraft>,
) -> ApiResult<Transaction> {
    draft
        .validate()
        .map_err(|e| ApiFailure::bad_request(e.to_string()))?;
    let conn = state.conn();
    found(
        db::update_transaction(&conn, &id, &draft).map_err(ApiFailure::from_store)?,
        "transaction",
    )
}

/// DELETE /api/transactions/:id
async fn delete_transaction(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Transaction> {
    let conn = state.conn();
    found(db::delete_transaction(&conn, &id).map_err(ApiFailure::internal)?, "transaction")
}

/// POST /api/transactions/bulk-delete
async fn bulk_delete_transactions(
    State(state): State<AppState>,
    Json(body): Json<BulkIds>,
) -> ApiResult<Vec<DeletedRef>> {
    require_ids(&body)?;
    let mut conn = state.conn();
    let deleted = db::delete_transactions(&mut conn, &body.ids).map_err(ApiFailure::internal)?;
    Ok(Json(ApiResponse::ok(deleted_refs(deleted))))
}

// --- summary ----------------------------------------------------------------

/// GET /api/summary?from&to&accountId
async fn get_summary(
    State(state): State<AppState>,
    Query(filter): Query<TransactionFilter>,
) -> ApiResult<Summary> {
    let today = chrono::Local::now().date_naive();
    summary::summary_periods(&filter, today)
        .map_err(|err| ApiFailure::bad_request(err.to_string()))?;

    let conn = state.conn();
    let summary = summary::build_summary(&conn, &filter, today).map_err(ApiFailure::internal)?;
    Ok(Json(ApiResponse::ok(summary)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn test_router() -> Router {
        let conn = Connection::open_in_memory().unwrap();
        db::setup_database(&conn).unwrap();
        router(AppState::new(conn))
    }

    async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json");
        let request = match body {
            Some(body) => request.body(Body::from(body.to_string())).unwrap(),
            None => request.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_health() {
        let app = test_router();
        let (status, body) = call(&app, "GET", "/api/health", None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"], "OK");
    }

    #[tokio::test]
    async fn test_account_crud() {
        let app = test_router();

        let (status, created) = call(&app, "POST", "/api/accounts", Some(json!({"name": "Checking"}))).await;
        assert_eq!(status, StatusCode::OK);
        let id = created["data"]["id"].as_str().unwrap().to_string();

        let (_, renamed) = call(
            &app,
            "PATCH",
            &format!("/api/accounts/{id}"),
            Some(json!({"name": "Main"})),
        )
        .await;
        assert_eq!(renamed["data"]["name"], "Main");

        let (status, deleted) = call(&app, "DELETE", &format!("/api/accounts/{id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(deleted["data"]["id"], id.as_str());

        let (status, missing) = call(&app, "GET", &format!("/api/accounts/{id}"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(missing["success"], false);
    }

    #[tokio::test]
    async fn test_blank_name_is_bad_request() {
        let app = test_router();
        let (status, body) = call(&app, "POST", "/api/categories", Some(json!({"name": "  "}))).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "name is required");
    }

    #[tokio::test]
    async fn test_bulk_delete_requires_ids() {
        let app = test_router();
        let (status, _) = call(&app, "POST", "/api/accounts/bulk-delete", Some(json!({"ids": []}))).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_bulk_create_and_filtered_list() {
        let app = test_router();
        let (_, account) = call(&app, "POST", "/api/accounts", Some(json!({"name": "Checking"}))).await;
        let account_id = account["data"]["id"].as_str().unwrap().to_string();

        let rows = json!([
            {"amount": -12500, "payee": "Grocer", "date": "2024-01-05", "accountId": account_id},
            {"amount": 300000, "payee": "Employer", "date": "2024-02-01", "accountId": account_id},
        ]);
        let (status, created) = call(&app, "POST", "/api/transactions/bulk-create", Some(rows)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(created["data"].as_array().unwrap().len(), 2);

        let (_, january) = call(
            &app,
            "GET",
            "/api/transactions?from=2024-01-01&to=2024-01-31",
            None,
        )
        .await;
        let january = january["data"].as_array().unwrap();
        assert_eq!(january.len(), 1);
        assert_eq!(january[0]["payee"], "Grocer");
        assert_eq!(january[0]["account"], "Checking");
    }

    #[tokio::test]
    async fn test_unknown_account_is_rejected() {
        let app = test_router();
        let rows = json!([
            {"amount": 1000, "payee": "Nobody", "date": "2024-01-05", "accountId": "missing"},
        ]);

        let (status, body) = call(&app, "POST", "/api/transactions/bulk-create", Some(rows)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn test_summary_shape() {
        let app = test_router();
        let (status, body) = call(&app, "GET", "/api/summary?from=2024-01-01&to=2024-01-07", None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["incomeAmount"], 0);
        assert_eq!(body["data"]["days"].as_array().unwrap().len(), 7);
    }

    #[tokio::test]
    async fn test_summary_rejects_unbounded_periods() {
        let app = test_router();

        let (status, body) = call(&app, "GET", "/api/summary?from=0001-01-01&to=9999-12-31", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("longer than"));

        let request = Request::builder()
            .uri("/api/summary?from=-200000-01-01&to=2024-01-01")
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        // the server keeps answering afterwards
        let (status, _) = call(&app, "GET", "/api/accounts", None).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_poisoned_lock_still_serves_requests() {
        let conn = Connection::open_in_memory().unwrap();
        db::setup_database(&conn).unwrap();
        let state = AppState::new(conn);

        let held = state.clone();
        let crashed = std::thread::spawn(move || {
            let _guard = held.db.lock().unwrap();
            panic!("handler crashed while holding the connection");
        })
        .join();
        assert!(crashed.is_err());
        assert!(state.db.is_poisoned());

        let app = router(state);
        let (status, body) = call(&app, "GET", "/api/accounts", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"], json!([]));
    }
}
