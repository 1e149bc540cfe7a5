//! Postgres implementation of TransactionRepository.

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::domain::{
    Transaction, TransactionFilter, TransactionPage, TransactionStatus,
};
use crate::ports::{RepositoryError, RepositoryResult, TransactionRepository};
use crate::utils::pagination::PageRequest;

const TRANSACTION_COLUMNS: &str = r#"transaction_id, type, amount, namespace, "user", reason,
    region, paymode, create_time, status, status_time"#;

/// Postgres-backed transaction store (`df_transaction`).
#[derive(Clone)]
pub struct PostgresTransactionRepository {
    pool: PgPool,
}

impl PostgresTransactionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn push_filters(builder: &mut QueryBuilder<'_, Postgres>, filter: &TransactionFilter) {
    builder.push(" WHERE TRUE");

    if let Some(statuses) = &filter.statuses {
        let codes: Vec<String> = statuses.iter().map(|s| s.code().to_string()).collect();
        builder.push(" AND status = ANY(").push_bind(codes).push(")");
    }
    if let Some(transaction_type) = filter.transaction_type {
        builder.push(" AND type = ").push_bind(transaction_type.as_str());
    }
    if let Some(namespace) = &filter.namespace {
        builder.push(" AND namespace = ").push_bind(namespace.clone());
    }
    if let Some(region) = &filter.region {
        builder.push(" AND region = ").push_bind(region.clone());
    }
}

#[async_trait]
impl TransactionRepository for PostgresTransactionRepository {
    async fn insert(&self, tx: &Transaction) -> RepositoryResult<Transaction> {
        let sql = format!(
            r#"
            INSERT INTO df_transaction (
                transaction_id, type, amount, namespace, "user", reason,
                region, paymode, create_time, status, status_time
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, NOW(), $9, NOW())
            RETURNING {}
            "#,
            TRANSACTION_COLUMNS
        );

        let row = sqlx::query_as::<_, TransactionRow>(&sql)
            .bind(&tx.transaction_id)
            .bind(tx.transaction_type.as_str())
            .bind(&tx.amount)
            .bind(&tx.namespace)
            .bind(&tx.user)
            .bind(&tx.reason)
            .bind(&tx.region)
            .bind(tx.paymode.map(|p| p.as_str()))
            .bind(tx.status.code())
            .fetch_one(&self.pool)
            .await
            .map_err(RepositoryError::from)?;

        row.into_domain()
    }

    async fn update_status(
        &self,
        transaction_id: &str,
        status: TransactionStatus,
    ) -> RepositoryResult<()> {
        let result = sqlx::query(
            "UPDATE df_transaction SET status = $1, status_time = NOW() WHERE transaction_id = $2",
        )
        .bind(status.code())
        .bind(transaction_id)
        .execute(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(transaction_id.to_string()));
        }
        Ok(())
    }

    async fn transition_status(
        &self,
        transaction_id: &str,
        from: TransactionStatus,
        to: TransactionStatus,
    ) -> RepositoryResult<Option<Transaction>> {
        let sql = format!(
            r#"
            UPDATE df_transaction SET status = $1, status_time = NOW()
            WHERE transaction_id = $2 AND status = $3
            RETURNING {}
            "#,
            TRANSACTION_COLUMNS
        );

        let row = sqlx::query_as::<_, TransactionRow>(&sql)
            .bind(to.code())
            .bind(transaction_id)
            .bind(from.code())
            .fetch_optional(&self.pool)
            .await
            .map_err(RepositoryError::from)?;

        row.map(TransactionRow::into_domain).transpose()
    }

    async fn get_by_id(&self, transaction_id: &str) -> RepositoryResult<Transaction> {
        let sql = format!(
            "SELECT {} FROM df_transaction WHERE transaction_id = $1",
            TRANSACTION_COLUMNS
        );
        let row = sqlx::query_as::<_, TransactionRow>(&sql)
            .bind(transaction_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(RepositoryError::from)?;

        row.ok_or_else(|| RepositoryError::NotFound(transaction_id.to_string()))?
            .into_domain()
    }

    async fn list(
        &self,
        filter: &TransactionFilter,
        page: PageRequest,
    ) -> RepositoryResult<TransactionPage> {
        let mut count_query = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM df_transaction");
        push_filters(&mut count_query, filter);
        let total: i64 = count_query
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await
            .map_err(RepositoryError::from)?;

        let page = page.clamp_to(total);
        if page.limit == 0 {
            return Ok(TransactionPage {
                total,
                results: Vec::new(),
            });
        }

        let mut select = QueryBuilder::<Postgres>::new(format!(
            "SELECT {} FROM df_transaction",
            TRANSACTION_COLUMNS
        ));
        push_filters(&mut select, filter);
        select
            .push(" ORDER BY ")
            .push(filter.order_by.column())
            .push(" ")
            .push(filter.sort_order.keyword())
            .push(", transaction_id ")
            .push(filter.sort_order.keyword())
            .push(" LIMIT ")
            .push_bind(page.limit)
            .push(" OFFSET ")
            .push_bind(page.offset);

        let rows = select
            .build_query_as::<TransactionRow>()
            .fetch_all(&self.pool)
            .await
            .map_err(RepositoryError::from)?;

        let results = rows
            .into_iter()
            .map(TransactionRow::into_domain)
            .collect::<RepositoryResult<Vec<_>>>()?;

        Ok(TransactionPage { total, results })
    }

    async fn ping(&self) -> RepositoryResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(RepositoryError::from)?;
        Ok(())
    }
}

/// Internal row type for SQLx. Not exposed outside the adapter.
#[derive(Debug, sqlx::FromRow)]
struct TransactionRow {
    transaction_id: String,
    #[sqlx(rename = "type")]
    transaction_type: String,
    amount: BigDecimal,
    namespace: String,
    user: Option<String>,
    reason: Option<String>,
    region: Option<String>,
    paymode: Option<String>,
    create_time: DateTime<Utc>,
    status: String,
    status_time: DateTime<Utc>,
}

impl TransactionRow {
    fn into_domain(self) -> RepositoryResult<Transaction> {
        let corrupt = |e: String| RepositoryError::Corrupt(format!("{}: {}", self.transaction_id, e));

        Ok(Transaction {
            transaction_type: self.transaction_type.parse().map_err(corrupt)?,
            status: self.status.parse().map_err(corrupt)?,
            paymode: self
                .paymode
                .as_deref()
                .filter(|p| !p.is_empty())
                .map(str::parse)
                .transpose()
                .map_err(corrupt)?,
            transaction_id: self.transaction_id,
            amount: self.amount,
            namespace: self.namespace,
            user: self.user,
            reason: self.reason,
            region: self.region,
            create_time: self.create_time,
            status_time: self.status_time,
        })
    }
}
