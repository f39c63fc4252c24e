//! HTTP API over the sync error ledger.
//!
//! | Method | Path                                | Result                         |
//! |--------|-------------------------------------|--------------------------------|
//! | GET    | `/api/v1/sync-errors`               | active records, oldest first   |
//! | GET    | `/api/v1/sync-errors?all=true`      | every record, newest first     |
//! | GET    | `/api/v1/sync-errors/{id}`          | one record or 404              |
//! | POST   | `/api/v1/sync-errors/{id}/archive`  | updated record or 404          |
//! | POST   | `/api/v1/sync-errors/{id}/resolve`  | updated record or 404          |

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use crmsync_sync::{SyncError, SyncErrorLedger, SyncErrorRecord};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

/// Default page size for `?all=true` listings.
pub const DEFAULT_LIMIT: u32 = 50;

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    /// Include resolved and archived records.
    #[serde(default)]
    pub all: bool,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ErrorResponse {
    pub error: String,
}

/// Maps ledger failures to HTTP responses.
pub struct ApiError(SyncError);

impl From<SyncError> for ApiError {
    fn from(err: SyncError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.0 {
            SyncError::RecordNotFound(_) => StatusCode::NOT_FOUND,
            _ => {
                warn!(error = %self.0, "Ledger request failed");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, Json(ErrorResponse { error: self.0.to_string() })).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

async fn list_handler(
    State(ledger): State<Arc<SyncErrorLedger>>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Vec<SyncErrorRecord>> {
    let records = if query.all {
        ledger.list_all(query.limit.unwrap_or(DEFAULT_LIMIT), query.offset.unwrap_or(0))?
    } else {
        ledger.list_active()?
    };
    Ok(Json(records))
}

async fn get_handler(
    State(ledger): State<Arc<SyncErrorLedger>>,
    Path(id): Path<i64>,
) -> ApiResult<SyncErrorRecord> {
    ledger
        .get(id)?
        .map(Json)
        .ok_or(ApiError(SyncError::RecordNotFound(id)))
}

async fn archive_handler(
    State(ledger): State<Arc<SyncErrorLedger>>,
    Path(id): Path<i64>,
) -> ApiResult<SyncErrorRecord> {
    let record = ledger.archive(id)?;
    info!(id, "Archived sync error via API");
    Ok(Json(record))
}

async fn resolve_handler(
    State(ledger): State<Arc<SyncErrorLedger>>,
    Path(id): Path<i64>,
) -> ApiResult<SyncErrorRecord> {
    let record = ledger.resolve(id)?;
    info!(id, "Resolved sync error via API");
    Ok(Json(record))
}

/// Build the HTTP API router over the given ledger.
pub fn build_router(ledger: Arc<SyncErrorLedger>) -> Router {
    Router::new()
        .route("/api/v1/sync-errors", get(list_handler))
        .route("/api/v1/sync-errors/{id}", get(get_handler))
        .route("/api/v1/sync-errors/{id}/archive", post(archive_handler))
        .route("/api/v1/sync-errors/{id}/resolve", post(resolve_handler))
        .with_state(ledger)
}
