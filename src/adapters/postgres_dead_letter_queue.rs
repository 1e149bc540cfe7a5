//! Postgres implementation of DeadLetterQueue (`df_balance_dlq`).

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::BalanceDlqEntry;
use crate::ports::{DeadLetterQueue, RepositoryError, RepositoryResult};

#[derive(Clone)]
pub struct PostgresDeadLetterQueue {
    pool: PgPool,
}

impl PostgresDeadLetterQueue {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DeadLetterQueue for PostgresDeadLetterQueue {
    async fn push(&self, entry: &BalanceDlqEntry) -> RepositoryResult<()> {
        sqlx::query(
            r#"
            INSERT INTO df_balance_dlq (
                id, transaction_id, namespace, amount, error_reason,
                retry_count, moved_to_dlq_at, last_retry_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(entry.id)
        .bind(&entry.transaction_id)
        .bind(&entry.namespace)
        .bind(&entry.amount)
        .bind(&entry.error_reason)
        .bind(entry.retry_count)
        .bind(entry.moved_to_dlq_at)
        .bind(entry.last_retry_at)
        .execute(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        Ok(())
    }

    async fn list(&self, limit: i64) -> RepositoryResult<Vec<BalanceDlqEntry>> {
        let rows = sqlx::query_as::<_, DlqRow>(
            "SELECT * FROM df_balance_dlq ORDER BY moved_to_dlq_at DESC LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        Ok(rows.into_iter().map(DlqRow::into_domain).collect())
    }

    async fn take(&self, id: Uuid) -> RepositoryResult<Option<BalanceDlqEntry>> {
        let row = sqlx::query_as::<_, DlqRow>("DELETE FROM df_balance_dlq WHERE id = $1 RETURNING *")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(RepositoryError::from)?;

        Ok(row.map(DlqRow::into_domain))
    }
}

#[derive(Debug, sqlx::FromRow)]
struct DlqRow {
    id: Uuid,
    transaction_id: String,
    namespace: String,
    amount: BigDecimal,
    error_reason: String,
    retry_count: i32,
    moved_to_dlq_at: DateTime<Utc>,
    last_retry_at: Option<DateTime<Utc>>,
}

impl DlqRow {
    fn into_domain(self) -> BalanceDlqEntry {
        BalanceDlqEntry {
            id: self.id,
            transaction_id: self.transaction_id,
            namespace: self.namespace,
            amount: self.amount,
            error_reason: self.error_reason,
            retry_count: self.retry_count,
            moved_to_dlq_at: self.moved_to_dlq_at,
            last_retry_at: self.last_retry_at,
        }
    }
}
