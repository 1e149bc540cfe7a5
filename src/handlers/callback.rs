use axum::{
    body::Bytes,
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
};

use crate::utils::sanitize::describe_body;
use crate::AppState;

/// `POST /charge/v1/aipaycallback`
///
/// The gateway expects its signed message echoed back as plain text; the
/// status code tells it whether to redeliver.
pub async fn aipay_callback(State(state): State<AppState>, body: Bytes) -> impl IntoResponse {
    tracing::debug!(body = %describe_body(&body), "payment notification received");

    let reply = state.orchestrator.handle_notification(&body).await;
    let status = if reply.acknowledged {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };

    (
        status,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        reply.body,
    )
}
