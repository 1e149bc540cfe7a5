use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;

use crate::domain::query::parse_status_filter;
use crate::domain::{
    Balance, OrderBy, SortOrder, Transaction, TransactionFilter, TransactionPage, TransactionType,
};
use crate::error::AppError;
use crate::handlers::{ok, Envelope};
use crate::middleware::CallerIdentity;
use crate::services::{ChargeOutcome, ChargeRequest};
use crate::utils::pagination::PageRequest;
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct RechargeParams {
    #[serde(rename = "type")]
    pub transaction_type: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    #[serde(rename = "type")]
    pub transaction_type: Option<String>,
    pub namespace: Option<String>,
    pub status: Option<String>,
    pub region: Option<String>,
    pub orderby: Option<String>,
    pub sortorder: Option<String>,
    pub page: Option<String>,
    pub size: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct NamespaceParams {
    pub namespace: Option<String>,
}

fn parse_charge(body: &[u8]) -> Result<ChargeRequest, AppError> {
    serde_json::from_slice(body).map_err(|e| AppError::ParseJson(e.to_string()))
}

/// `POST /charge/v1/recharge[?type=deduction]`
pub async fn do_recharge(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Query(params): Query<RechargeParams>,
    body: Bytes,
) -> Result<Json<Envelope<ChargeOutcome>>, AppError> {
    let request = parse_charge(&body)?;
    let transaction_type = match params.transaction_type.as_deref() {
        Some("deduction") => TransactionType::Deduction,
        _ => TransactionType::Recharge,
    };

    if transaction_type == TransactionType::Recharge {
        if let Some(namespace) = request.namespace.as_deref().map(str::trim).filter(|ns| !ns.is_empty()) {
            caller.require_access(&state, namespace).await?;
        }
    }

    let outcome = state
        .orchestrator
        .submit(&caller.user, transaction_type, request)
        .await?;
    Ok(ok(outcome))
}

/// `POST /charge/v1/recharge/coupon`
pub async fn coupon_recharge(
    State(state): State<AppState>,
    caller: CallerIdentity,
    body: Bytes,
) -> Result<Json<Envelope<Balance>>, AppError> {
    let request = parse_charge(&body)?;
    let balance = state.orchestrator.coupon_recharge(&caller.user, request).await?;
    Ok(ok(balance))
}

/// `GET /charge/v1/recharge`
pub async fn list_transactions(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Query(params): Query<ListParams>,
) -> Result<Json<Envelope<TransactionPage>>, AppError> {
    let namespace = caller
        .scope_namespace(&state, params.namespace.as_deref())
        .await?;

    let filter = TransactionFilter {
        transaction_type: params
            .transaction_type
            .as_deref()
            .and_then(TransactionType::parse_filter),
        namespace,
        statuses: parse_status_filter(params.status.as_deref().unwrap_or_default()),
        region: params
            .region
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty()),
        order_by: params
            .orderby
            .as_deref()
            .and_then(OrderBy::parse)
            .unwrap_or_default(),
        sort_order: SortOrder::parse_or(
            params.sortorder.as_deref().unwrap_or_default(),
            SortOrder::Desc,
        ),
    };
    let page = PageRequest::from_params(params.page.as_deref(), params.size.as_deref());

    let result = state.orchestrator.list(&filter, page).await?;
    Ok(ok(result))
}

/// `GET /charge/v1/recharge/:id`
pub async fn get_transaction(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(transaction_id): Path<String>,
) -> Result<Json<Envelope<Transaction>>, AppError> {
    let tx = state.orchestrator.get(&transaction_id).await?;
    caller.require_access(&state, &tx.namespace).await?;
    Ok(ok(tx))
}

/// `GET /charge/v1/balance[?namespace=]`
pub async fn get_balance(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Query(params): Query<NamespaceParams>,
) -> Result<Json<Envelope<Balance>>, AppError> {
    let namespace = caller
        .scope_namespace(&state, params.namespace.as_deref())
        .await?
        .unwrap_or_else(|| caller.user.clone());

    let balance = state.orchestrator.balance(&namespace).await?;
    Ok(ok(balance))
}
