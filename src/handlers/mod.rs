pub mod callback;
pub mod dlq;
pub mod recharge;

use crate::error::CODE_OK;
use crate::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;

/// Success envelope: `{"code":0,"msg":"OK","data":...}`.
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub code: u32,
    pub msg: &'static str,
    pub data: T,
}

pub fn ok<T: Serialize>(data: T) -> Json<Envelope<T>> {
    Json(Envelope {
        code: CODE_OK,
        msg: "OK",
        data,
    })
}

#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub version: &'static str,
    pub store: &'static str,
}

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let (status_code, status, store) = match state.orchestrator.ping().await {
        Ok(()) => (StatusCode::OK, "healthy", "connected"),
        Err(e) => {
            tracing::warn!(error = %e, "health check: store unreachable");
            (StatusCode::SERVICE_UNAVAILABLE, "unhealthy", "disconnected")
        }
    };

    (
        status_code,
        Json(HealthStatus {
            status,
            version: env!("CARGO_PKG_VERSION"),
            store,
        }),
    )
}
