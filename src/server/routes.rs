use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::item::{Item, ItemFilter};
use crate::query::{CompletionStats, ConsoleResult, GroupBy, SessionDetail, SessionSummary};
use crate::server::AppState;
use crate::storage::Catalog;
use crate::Error;

#[derive(Deserialize)]
pub struct ItemUpdate {
    pub found: bool,
}

#[derive(Deserialize)]
pub struct SqlQuery {
    pub query: String,
}

#[derive(Deserialize)]
pub struct SessionCreate {
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Deserialize)]
pub struct SessionItemAdd {
    pub item_id: i64,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub detail: String,
}

/// A failed request: status code plus a JSON `detail` message
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub detail: String,
}

impl ApiError {
    fn internal(detail: impl Into<String>) -> Self {
        Self { status: StatusCode::INTERNAL_SERVER_ERROR, detail: detail.into() }
    }
}

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        let status = match &e {
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::StateConflict(_) | Error::Rejected(_) | Error::Execution(_) => StatusCode::BAD_REQUEST,
            Error::IngestionConflict(_) => StatusCode::CONFLICT,
            Error::InvalidRecord(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Error::Storage(_) | Error::Io(_) => {
                tracing::error!("Request failed: {}", e);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        Self { status, detail: e.to_string() }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorResponse { detail: self.detail })).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

/// Run a synchronous catalog call off the async runtime
async fn with_catalog<T, F>(state: &AppState, f: F) -> ApiResult<T>
where
    F: FnOnce(&Catalog) -> crate::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let catalog = state.catalog.clone();
    tokio::task::spawn_blocking(move || f(&catalog))
        .await
        .map_err(|e| ApiError::internal(format!("Catalog task failed: {}", e)))?
        .map(Json)
        .map_err(ApiError::from)
}

pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

// ========== Items ==========

pub async fn list_items(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<ItemFilter>,
) -> ApiResult<Vec<Item>> {
    let filter = filter.normalized();
    with_catalog(&state, move |catalog| catalog.list_items(&filter)).await
}

pub async fn get_item(State(state): State<Arc<AppState>>, Path(id): Path<i64>) -> ApiResult<Item> {
    with_catalog(&state, move |catalog| catalog.get_item(id)).await
}

pub async fn update_item(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(update): Json<ItemUpdate>,
) -> ApiResult<Item> {
    with_catalog(&state, move |catalog| catalog.set_found(id, update.found)).await
}

pub async fn get_categories(State(state): State<Arc<AppState>>) -> ApiResult<Vec<String>> {
    with_catalog(&state, |catalog| catalog.categories()).await
}

pub async fn get_regions(State(state): State<Arc<AppState>>) -> ApiResult<Vec<String>> {
    with_catalog(&state, |catalog| catalog.regions()).await
}

// ========== Console ==========

pub async fn execute_sql(
    State(state): State<Arc<AppState>>,
    Json(query): Json<SqlQuery>,
) -> ApiResult<ConsoleResult> {
    with_catalog(&state, move |catalog| catalog.run_select(&query.query)).await
}

// ========== Stats ==========

pub async fn get_stats(State(state): State<Arc<AppState>>) -> ApiResult<CompletionStats> {
    with_catalog(&state, |catalog| catalog.stats()).await
}

/// Grouped stats keyed by the grouping column name, e.g. `{"region": "Greenpath", ...}`
async fn grouped_stats(state: &AppState, by: GroupBy) -> ApiResult<Vec<serde_json::Value>> {
    let Json(groups) = with_catalog(state, move |catalog| catalog.group_stats(by)).await?;

    let mut rows = Vec::with_capacity(groups.len());
    for group in groups {
        let mut row = serde_json::to_value(&group.stats).map_err(|e| ApiError::internal(e.to_string()))?;
        row[by.column()] = serde_json::Value::String(group.group);
        rows.push(row);
    }
    Ok(Json(rows))
}

pub async fn get_region_stats(State(state): State<Arc<AppState>>) -> ApiResult<Vec<serde_json::Value>> {
    grouped_stats(&state, GroupBy::Region).await
}

pub async fn get_category_stats(State(state): State<Arc<AppState>>) -> ApiResult<Vec<serde_json::Value>> {
    grouped_stats(&state, GroupBy::Category).await
}

// ========== Sessions ==========

pub async fn list_sessions(State(state): State<Arc<AppState>>) -> ApiResult<Vec<SessionSummary>> {
    with_catalog(&state, |catalog| catalog.list_sessions()).await
}

pub async fn create_session(
    State(state): State<Arc<AppState>>,
    Json(body): Json<SessionCreate>,
) -> ApiResult<SessionSummary> {
    with_catalog(&state, move |catalog| catalog.create_session(body.name.as_deref())).await
}

pub async fn get_session(State(state): State<Arc<AppState>>, Path(id): Path<i64>) -> ApiResult<SessionDetail> {
    with_catalog(&state, move |catalog| catalog.get_session(id)).await
}

pub async fn delete_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> ApiResult<serde_json::Value> {
    let Json(id) = with_catalog(&state, move |catalog| catalog.delete_session(id)).await?;
    Ok(Json(serde_json::json!({ "message": "Session deleted", "id": id })))
}

pub async fn save_session(State(state): State<Arc<AppState>>, Path(id): Path<i64>) -> ApiResult<SessionDetail> {
    with_catalog(&state, move |catalog| catalog.save_session(id)).await
}

pub async fn clear_session(State(state): State<Arc<AppState>>, Path(id): Path<i64>) -> ApiResult<SessionDetail> {
    with_catalog(&state, move |catalog| catalog.clear_session(id)).await
}

pub async fn add_session_item(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(body): Json<SessionItemAdd>,
) -> ApiResult<SessionDetail> {
    with_catalog(&state, move |catalog| catalog.add_session_item(id, body.item_id)).await
}

pub async fn remove_session_item(
    State(state): State<Arc<AppState>>,
    Path((id, item_id)): Path<(i64, i64)>,
) -> ApiResult<SessionDetail> {
    with_catalog(&state, move |catalog| catalog.remove_session_item(id, item_id)).await
}
