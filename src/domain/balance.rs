//! Per-namespace balance and the dead-letter record for credits that could
//! not be applied after their transaction was already completed.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Balance {
    pub namespace: String,
    pub balance: BigDecimal,
    #[serde(rename = "updatetime", skip_serializing_if = "Option::is_none")]
    pub update_time: Option<DateTime<Utc>>,
}

impl Balance {
    /// Balance of a namespace the ledger has never touched.
    pub fn empty(namespace: &str) -> Self {
        Self {
            namespace: namespace.to_string(),
            balance: BigDecimal::from(0),
            update_time: None,
        }
    }
}

/// Whether a debit may take a namespace below zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebitPolicy {
    AllowNegative,
    RejectOverdraft,
}

impl DebitPolicy {
    pub fn from_flag(allow_negative: bool) -> Self {
        if allow_negative {
            DebitPolicy::AllowNegative
        } else {
            DebitPolicy::RejectOverdraft
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BalanceDlqEntry {
    pub id: Uuid,
    pub transaction_id: String,
    pub namespace: String,
    pub amount: BigDecimal,
    pub error_reason: String,
    pub retry_count: i32,
    pub moved_to_dlq_at: DateTime<Utc>,
    pub last_retry_at: Option<DateTime<Utc>>,
}

impl BalanceDlqEntry {
    pub fn new(transaction_id: &str, namespace: &str, amount: BigDecimal, error_reason: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            transaction_id: transaction_id.to_string(),
            namespace: namespace.to_string(),
            amount,
            error_reason,
            retry_count: 0,
            moved_to_dlq_at: Utc::now(),
            last_retry_at: None,
        }
    }
}
