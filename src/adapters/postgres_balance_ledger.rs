//! Postgres implementation of BalanceLedger (`df_balance`).
//!
//! Every delta is one statement so concurrent transactions on the same
//! namespace cannot lose updates.

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::domain::{Balance, DebitPolicy};
use crate::ports::{BalanceLedger, RepositoryError, RepositoryResult};

#[derive(Clone)]
pub struct PostgresBalanceLedger {
    pool: PgPool,
}

impl PostgresBalanceLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BalanceLedger for PostgresBalanceLedger {
    async fn credit(&self, namespace: &str, amount: &BigDecimal) -> RepositoryResult<Balance> {
        let row = sqlx::query_as::<_, BalanceRow>(
            r#"
            INSERT INTO df_balance (namespace, balance, create_time, update_time)
            VALUES ($1, $2, NOW(), NOW())
            ON CONFLICT (namespace)
            DO UPDATE SET balance = df_balance.balance + EXCLUDED.balance, update_time = NOW()
            RETURNING namespace, balance, update_time
            "#,
        )
        .bind(namespace)
        .bind(amount)
        .fetch_one(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        Ok(row.into_domain())
    }

    async fn debit(
        &self,
        namespace: &str,
        amount: &BigDecimal,
        policy: DebitPolicy,
    ) -> RepositoryResult<Balance> {
        let row = match policy {
            DebitPolicy::AllowNegative => sqlx::query_as::<_, BalanceRow>(
                r#"
                INSERT INTO df_balance (namespace, balance, create_time, update_time)
                VALUES ($1, -$2::NUMERIC, NOW(), NOW())
                ON CONFLICT (namespace)
                DO UPDATE SET balance = df_balance.balance - $2, update_time = NOW()
                RETURNING namespace, balance, update_time
                "#,
            )
            .bind(namespace)
            .bind(amount)
            .fetch_one(&self.pool)
            .await
            .map_err(RepositoryError::from)?,
            DebitPolicy::RejectOverdraft => {
                sqlx::query(
                    r#"
                    INSERT INTO df_balance (namespace, balance, create_time, update_time)
                    VALUES ($1, 0, NOW(), NOW())
                    ON CONFLICT (namespace) DO NOTHING
                    "#,
                )
                .bind(namespace)
                .execute(&self.pool)
                .await
                .map_err(RepositoryError::from)?;

                sqlx::query_as::<_, BalanceRow>(
                    r#"
                    UPDATE df_balance SET balance = balance - $2, update_time = NOW()
                    WHERE namespace = $1 AND balance >= $2
                    RETURNING namespace, balance, update_time
                    "#,
                )
                .bind(namespace)
                .bind(amount)
                .fetch_optional(&self.pool)
                .await
                .map_err(RepositoryError::from)?
                .ok_or_else(|| RepositoryError::InsufficientFunds(namespace.to_string()))?
            }
        };

        Ok(row.into_domain())
    }

    async fn get(&self, namespace: &str) -> RepositoryResult<Balance> {
        let row = sqlx::query_as::<_, BalanceRow>(
            "SELECT namespace, balance, update_time FROM df_balance WHERE namespace = $1",
        )
        .bind(namespace)
        .fetch_optional(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        Ok(row
            .map(BalanceRow::into_domain)
            .unwrap_or_else(|| Balance::empty(namespace)))
    }
}

#[derive(Debug, sqlx::FromRow)]
struct BalanceRow {
    namespace: String,
    balance: BigDecimal,
    update_time: DateTime<Utc>,
}

impl BalanceRow {
    fn into_domain(self) -> Balance {
        Balance {
            namespace: self.namespace,
            balance: self.balance,
            update_time: Some(self.update_time),
        }
    }
}
