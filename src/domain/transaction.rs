//! Transaction domain entity.
//! Framework-agnostic representation of a recharge or deduction attempt.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Recharge,
    Deduction,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Recharge => "recharge",
            TransactionType::Deduction => "deduction",
        }
    }

    /// Lenient parse used by query parameters: unknown values mean "no filter".
    pub fn parse_filter(value: &str) -> Option<Self> {
        value.parse().ok()
    }
}

impl FromStr for TransactionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "recharge" => Ok(TransactionType::Recharge),
            "deduction" => Ok(TransactionType::Deduction),
            other => Err(format!("unknown transaction type '{}'", other)),
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persisted status codes. The single-letter codes are stored verbatim.
///
/// `I` waits for the gateway, `O` is completed, `E` failed on the gateway
/// side and `F` failed locally after the row was written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionStatus {
    #[serde(rename = "I")]
    Pending,
    #[serde(rename = "O")]
    Completed,
    #[serde(rename = "E")]
    Failed,
    #[serde(rename = "F")]
    Fatal,
}

impl TransactionStatus {
    pub fn code(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "I",
            TransactionStatus::Completed => "O",
            TransactionStatus::Failed => "E",
            TransactionStatus::Fatal => "F",
        }
    }

    /// Forward-only transition table, checked before every conditional write.
    pub fn can_transition_to(&self, next: TransactionStatus) -> bool {
        matches!(
            (self, next),
            (TransactionStatus::Pending, TransactionStatus::Completed)
                | (TransactionStatus::Pending, TransactionStatus::Failed)
                | (TransactionStatus::Completed, TransactionStatus::Fatal)
        )
    }
}

impl FromStr for TransactionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "I" => Ok(TransactionStatus::Pending),
            "O" => Ok(TransactionStatus::Completed),
            "E" => Ok(TransactionStatus::Failed),
            "F" => Ok(TransactionStatus::Fatal),
            other => Err(format!("unknown transaction status '{}'", other)),
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Settlement channel, chosen by the orchestrator and never by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayMode {
    Hongpay,
    Coupon,
}

impl PayMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PayMode::Hongpay => "hongpay",
            PayMode::Coupon => "coupon",
        }
    }
}

impl FromStr for PayMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hongpay" => Ok(PayMode::Hongpay),
            "coupon" => Ok(PayMode::Coupon),
            other => Err(format!("unknown paymode '{}'", other)),
        }
    }
}

/// Domain entity representing a transaction row.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub transaction_id: String,
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
    pub amount: BigDecimal,
    pub namespace: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paymode: Option<PayMode>,
    #[serde(rename = "createtime")]
    pub create_time: DateTime<Utc>,
    pub status: TransactionStatus,
    #[serde(rename = "statustime")]
    pub status_time: DateTime<Utc>,
}

impl Transaction {
    /// Builds a new row with a fresh id. Timestamps are provisional until the
    /// store assigns its own on insert.
    pub fn new(
        transaction_type: TransactionType,
        amount: BigDecimal,
        namespace: String,
        status: TransactionStatus,
    ) -> Self {
        let now = Utc::now();
        Self {
            transaction_id: generate_transaction_id(),
            transaction_type,
            amount,
            namespace,
            user: None,
            reason: None,
            region: None,
            paymode: None,
            create_time: now,
            status,
            status_time: now,
        }
    }
}

/// Time-ordered random identifier (UUIDv7, OS entropy).
pub fn generate_transaction_id() -> String {
    Uuid::now_v7().simple().to_string().to_uppercase()
}

/// Accepts both JSON numbers and strings for monetary amounts. Numbers go
/// through their shortest decimal rendering so `0.29` stays `0.29`.
pub fn deserialize_amount<'de, D>(deserializer: D) -> Result<BigDecimal, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawAmount {
        Number(serde_json::Number),
        Text(String),
    }

    let text = match RawAmount::deserialize(deserializer)? {
        RawAmount::Number(n) => n.to_string(),
        RawAmount::Text(s) => s.trim().to_string(),
    };
    BigDecimal::from_str(&text).map_err(serde::de::Error::custom)
}
