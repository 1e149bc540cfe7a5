use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{Balance, BalanceDlqEntry};
use crate::error::AppError;
use crate::handlers::{ok, Envelope};
use crate::middleware::CallerIdentity;
use crate::AppState;

const DEFAULT_DLQ_LIMIT: i64 = 100;
const MAX_DLQ_LIMIT: i64 = 1000;

pub fn dlq_routes() -> Router<AppState> {
    Router::new()
        .route("/charge/v1/dlq", get(list_dlq))
        .route("/charge/v1/dlq/:id/retry", post(retry_dlq))
}

#[derive(Debug, Default, Deserialize)]
pub struct DlqParams {
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct DlqListing {
    pub entries: Vec<BalanceDlqEntry>,
    pub count: usize,
}

async fn list_dlq(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Query(params): Query<DlqParams>,
) -> Result<Json<Envelope<DlqListing>>, AppError> {
    state.orchestrator.require_admin(&caller.user)?;

    let limit = params.limit.unwrap_or(DEFAULT_DLQ_LIMIT).clamp(1, MAX_DLQ_LIMIT);
    let entries = state.orchestrator.dead_letters(limit).await?;
    Ok(ok(DlqListing {
        count: entries.len(),
        entries,
    }))
}

async fn retry_dlq(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<String>,
) -> Result<Json<Envelope<Balance>>, AppError> {
    state.orchestrator.require_admin(&caller.user)?;

    let id = Uuid::parse_str(&id).map_err(|e| AppError::Validation(format!("id: {}", e)))?;
    let balance = state.orchestrator.retry_dead_letter(id).await?;
    Ok(ok(balance))
}
