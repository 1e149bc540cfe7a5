//! Storage ports. The orchestrator only talks to these traits; Postgres and
//! in-memory adapters live under `crate::adapters`.

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::{
    Balance, BalanceDlqEntry, DebitPolicy, Transaction, TransactionFilter, TransactionPage,
    TransactionStatus,
};
use crate::utils::pagination::PageRequest;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RepositoryError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("duplicate key: {0}")]
    Duplicate(String),

    #[error("insufficient funds in namespace {0}")]
    InsufficientFunds(String),

    #[error("corrupt row: {0}")]
    Corrupt(String),

    #[error("database error: {0}")]
    Database(String),
}

impl From<sqlx::Error> for RepositoryError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => RepositoryError::NotFound("row".to_string()),
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                RepositoryError::Duplicate(db.message().to_string())
            }
            other => RepositoryError::Database(other.to_string()),
        }
    }
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Durable record of every recharge/deduction attempt.
#[async_trait]
pub trait TransactionRepository: Send + Sync {
    /// Inserts a new row; the store assigns `create_time` and `status_time`.
    async fn insert(&self, tx: &Transaction) -> RepositoryResult<Transaction>;

    /// Unconditional status write. Legality of the transition is the
    /// caller's responsibility.
    async fn update_status(
        &self,
        transaction_id: &str,
        status: TransactionStatus,
    ) -> RepositoryResult<()>;

    /// Compare-and-swap: moves the row to `to` only while it is still in
    /// `from`. Returns the updated row, or `None` when the row is missing or
    /// already elsewhere.
    async fn transition_status(
        &self,
        transaction_id: &str,
        from: TransactionStatus,
        to: TransactionStatus,
    ) -> RepositoryResult<Option<Transaction>>;

    async fn get_by_id(&self, transaction_id: &str) -> RepositoryResult<Transaction>;

    /// Returns the total number of matches and the clamped page.
    async fn list(
        &self,
        filter: &TransactionFilter,
        page: PageRequest,
    ) -> RepositoryResult<TransactionPage>;

    async fn ping(&self) -> RepositoryResult<()>;
}

/// Per-namespace balance. Every delta is a single atomic step in the
/// backing store; callers guarantee at most one call per transaction.
#[async_trait]
pub trait BalanceLedger: Send + Sync {
    async fn credit(&self, namespace: &str, amount: &BigDecimal) -> RepositoryResult<Balance>;

    async fn debit(
        &self,
        namespace: &str,
        amount: &BigDecimal,
        policy: DebitPolicy,
    ) -> RepositoryResult<Balance>;

    async fn get(&self, namespace: &str) -> RepositoryResult<Balance>;
}

/// Credits that belong to a completed transaction but never reached the ledger.
#[async_trait]
pub trait DeadLetterQueue: Send + Sync {
    async fn push(&self, entry: &BalanceDlqEntry) -> RepositoryResult<()>;

    async fn list(&self, limit: i64) -> RepositoryResult<Vec<BalanceDlqEntry>>;

    /// Removes and returns an entry so only one retry can own it.
    async fn take(&self, id: Uuid) -> RepositoryResult<Option<BalanceDlqEntry>>;
}
