pub mod adapters;
pub mod auth;
pub mod cli;
pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod gateway;
pub mod handlers;
pub mod middleware;
pub mod ports;
pub mod services;
pub mod startup;
pub mod utils;
pub mod validation;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use crate::auth::UserResolver;
use crate::services::TransactionOrchestrator;

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<TransactionOrchestrator>,
    pub users: Arc<dyn UserResolver>,
}

pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route(
            "/charge/v1/recharge",
            post(handlers::recharge::do_recharge).get(handlers::recharge::list_transactions),
        )
        .route("/charge/v1/recharge/coupon", post(handlers::recharge::coupon_recharge))
        .route("/charge/v1/recharge/:id", get(handlers::recharge::get_transaction))
        .route("/charge/v1/aipaycallback", post(handlers::callback::aipay_callback))
        .route("/charge/v1/balance", get(handlers::recharge::get_balance))
        .merge(handlers::dlq::dlq_routes())
        .layer(axum::middleware::from_fn(
            middleware::request_logger::request_logger_middleware,
        ))
        .with_state(state)
}
