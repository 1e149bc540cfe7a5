//! In-memory adapters for every storage port.
//!
//! Used by `serve --in-memory` and by the test suites. Each store guards its
//! data with a single tokio lock, so every port operation is atomic.

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::{
    Balance, BalanceDlqEntry, DebitPolicy, SortOrder, Transaction, TransactionFilter,
    TransactionPage, TransactionStatus,
};
use crate::ports::{
    BalanceLedger, DeadLetterQueue, RepositoryError, RepositoryResult, TransactionRepository,
};
use crate::utils::pagination::PageRequest;

#[derive(Default, Clone)]
pub struct InMemoryTransactionRepository {
    transactions: Arc<RwLock<HashMap<String, Transaction>>>,
}

impl InMemoryTransactionRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TransactionRepository for InMemoryTransactionRepository {
    async fn insert(&self, tx: &Transaction) -> RepositoryResult<Transaction> {
        let mut transactions = self.transactions.write().await;
        if transactions.contains_key(&tx.transaction_id) {
            return Err(RepositoryError::Duplicate(tx.transaction_id.clone()));
        }

        let now = Utc::now();
        let mut stored = tx.clone();
        stored.create_time = now;
        stored.status_time = now;
        transactions.insert(stored.transaction_id.clone(), stored.clone());
        Ok(stored)
    }

    async fn update_status(
        &self,
        transaction_id: &str,
        status: TransactionStatus,
    ) -> RepositoryResult<()> {
        let mut transactions = self.transactions.write().await;
        let tx = transactions
            .get_mut(transaction_id)
            .ok_or_else(|| RepositoryError::NotFound(transaction_id.to_string()))?;
        tx.status = status;
        tx.status_time = Utc::now();
        Ok(())
    }

    async fn transition_status(
        &self,
        transaction_id: &str,
        from: TransactionStatus,
        to: TransactionStatus,
    ) -> RepositoryResult<Option<Transaction>> {
        let mut transactions = self.transactions.write().await;
        match transactions.get_mut(transaction_id) {
            Some(tx) if tx.status == from => {
                tx.status = to;
                tx.status_time = Utc::now();
                Ok(Some(tx.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn get_by_id(&self, transaction_id: &str) -> RepositoryResult<Transaction> {
        let transactions = self.transactions.read().await;
        transactions
            .get(transaction_id)
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound(transaction_id.to_string()))
    }

    async fn list(
        &self,
        filter: &TransactionFilter,
        page: PageRequest,
    ) -> RepositoryResult<TransactionPage> {
        let transactions = self.transactions.read().await;
        let mut matching: Vec<&Transaction> =
            transactions.values().filter(|tx| filter.matches(tx)).collect();

        matching.sort_by(|a, b| {
            let ordering = a
                .create_time
                .cmp(&b.create_time)
                .then_with(|| a.transaction_id.cmp(&b.transaction_id));
            match filter.sort_order {
                SortOrder::Asc => ordering,
                SortOrder::Desc => ordering.reverse(),
            }
        });

        let total = matching.len() as i64;
        let page = page.clamp_to(total);
        let results = matching
            .into_iter()
            .skip(page.offset as usize)
            .take(page.limit as usize)
            .cloned()
            .collect();

        Ok(TransactionPage { total, results })
    }

    async fn ping(&self) -> RepositoryResult<()> {
        Ok(())
    }
}

#[derive(Default, Clone)]
pub struct InMemoryBalanceLedger {
    balances: Arc<RwLock<HashMap<String, Balance>>>,
}

impl InMemoryBalanceLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BalanceLedger for InMemoryBalanceLedger {
    async fn credit(&self, namespace: &str, amount: &BigDecimal) -> RepositoryResult<Balance> {
        let mut balances = self.balances.write().await;
        let entry = balances
            .entry(namespace.to_string())
            .or_insert_with(|| Balance::empty(namespace));
        entry.balance = &entry.balance + amount;
        entry.update_time = Some(Utc::now());
        Ok(entry.clone())
    }

    async fn debit(
        &self,
        namespace: &str,
        amount: &BigDecimal,
        policy: DebitPolicy,
    ) -> RepositoryResult<Balance> {
        let mut balances = self.balances.write().await;
        let current = balances
            .get(namespace)
            .map(|b| b.balance.clone())
            .unwrap_or_else(|| BigDecimal::from(0));

        if policy == DebitPolicy::RejectOverdraft && &current < amount {
            return Err(RepositoryError::InsufficientFunds(namespace.to_string()));
        }

        let entry = balances
            .entry(namespace.to_string())
            .or_insert_with(|| Balance::empty(namespace));
        entry.balance = current - amount;
        entry.update_time = Some(Utc::now());
        Ok(entry.clone())
    }

    async fn get(&self, namespace: &str) -> RepositoryResult<Balance> {
        let balances = self.balances.read().await;
        Ok(balances
            .get(namespace)
            .cloned()
            .unwrap_or_else(|| Balance::empty(namespace)))
    }
}

#[derive(Default, Clone)]
pub struct InMemoryDeadLetterQueue {
    entries: Arc<RwLock<Vec<BalanceDlqEntry>>>,
}

impl InMemoryDeadLetterQueue {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DeadLetterQueue for InMemoryDeadLetterQueue {
    async fn push(&self, entry: &BalanceDlqEntry) -> RepositoryResult<()> {
        let mut entries = self.entries.write().await;
        if entries.iter().any(|e| e.id == entry.id) {
            return Err(RepositoryError::Duplicate(entry.id.to_string()));
        }
        entries.push(entry.clone());
        Ok(())
    }

    async fn list(&self, limit: i64) -> RepositoryResult<Vec<BalanceDlqEntry>> {
        let entries = self.entries.read().await;
        let mut newest_first: Vec<BalanceDlqEntry> = entries.iter().rev().cloned().collect();
        newest_first.sort_by(|a, b| b.moved_to_dlq_at.cmp(&a.moved_to_dlq_at));
        newest_first.truncate(limit.max(0) as usize);
        Ok(newest_first)
    }

    async fn take(&self, id: Uuid) -> RepositoryResult<Option<BalanceDlqEntry>> {
        let mut entries = self.entries.write().await;
        Ok(entries
            .iter()
            .position(|e| e.id == id)
            .map(|index| entries.remove(index)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{TransactionType, TransactionStatus::*};
    use std::str::FromStr;

    fn tx(namespace: &str, status: TransactionStatus) -> Transaction {
        Transaction::new(
            TransactionType::Recharge,
            BigDecimal::from(10),
            namespace.to_string(),
            status,
        )
    }

    #[tokio::test]
    async fn test_insert_rejects_duplicate_ids() {
        let repo = InMemoryTransactionRepository::new();
        let row = tx("team-a", Pending);
        repo.insert(&row).await.unwrap();

        let err = repo.insert(&row).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Duplicate(_)));
    }

    #[tokio::test]
    async fn test_transition_only_applies_from_expected_status() {
        let repo = InMemoryTransactionRepository::new();
        let row = repo.insert(&tx("team-a", Pending)).await.unwrap();

        let moved = repo
            .transition_status(&row.transaction_id, Pending, Completed)
            .await
            .unwrap();
        assert_eq!(moved.map(|t| t.status), Some(Completed));

        let again = repo
            .transition_status(&row.transaction_id, Pending, Completed)
            .await
            .unwrap();
        assert!(again.is_none());

        let missing = repo.transition_status("NOPE", Pending, Failed).await.unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_get_missing_is_not_found() {
        let repo = InMemoryTransactionRepository::new();
        assert!(matches!(
            repo.get_by_id("NOPE").await,
            Err(RepositoryError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_list_filters_orders_and_clamps() {
        let repo = InMemoryTransactionRepository::new();
        let mut ids = Vec::new();
        for _ in 0..3 {
            ids.push(repo.insert(&tx("team-a", Completed)).await.unwrap().transaction_id);
        }
        repo.insert(&tx("team-a", Fatal)).await.unwrap();
        repo.insert(&tx("team-b", Completed)).await.unwrap();

        let filter = TransactionFilter {
            namespace: Some("team-a".to_string()),
            statuses: Some(crate::domain::query::default_statuses()),
            sort_order: SortOrder::Asc,
            ..Default::default()
        };
        let page = repo.list(&filter, PageRequest::new(0, 30)).await.unwrap();
        assert_eq!(page.total, 3);
        let listed: Vec<String> = page.results.into_iter().map(|t| t.transaction_id).collect();
        assert_eq!(listed, ids);

        let past_end = repo.list(&filter, PageRequest::new(10, 2)).await.unwrap();
        assert_eq!(past_end.results.len(), 2);
        assert_eq!(past_end.results[1].transaction_id, ids[2]);

        let all = TransactionFilter {
            namespace: Some("team-a".to_string()),
            ..Default::default()
        };
        assert_eq!(repo.list(&all, PageRequest::default()).await.unwrap().total, 4);
    }

    #[tokio::test]
    async fn test_ledger_credit_and_debit_policies() {
        let ledger = InMemoryBalanceLedger::new();
        assert_eq!(ledger.get("team-a").await.unwrap().balance, BigDecimal::from(0));

        ledger
            .credit("team-a", &BigDecimal::from_str("12.50").unwrap())
            .await
            .unwrap();
        let after = ledger
            .debit("team-a", &BigDecimal::from(2), DebitPolicy::RejectOverdraft)
            .await
            .unwrap();
        assert_eq!(after.balance, BigDecimal::from_str("10.50").unwrap());

        let err = ledger
            .debit("team-a", &BigDecimal::from(11), DebitPolicy::RejectOverdraft)
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::InsufficientFunds(_)));
        assert_eq!(
            ledger.get("team-a").await.unwrap().balance,
            BigDecimal::from_str("10.50").unwrap()
        );

        let negative = ledger
            .debit("team-b", &BigDecimal::from(3), DebitPolicy::AllowNegative)
            .await
            .unwrap();
        assert_eq!(negative.balance, BigDecimal::from(-3));
    }

    #[tokio::test]
    async fn test_dead_letter_take_removes_entry() {
        let dlq = InMemoryDeadLetterQueue::new();
        let entry = BalanceDlqEntry::new("TX1", "team-a", BigDecimal::from(5), "down".to_string());
        dlq.push(&entry).await.unwrap();
        assert_eq!(dlq.list(10).await.unwrap().len(), 1);

        let taken = dlq.take(entry.id).await.unwrap();
        assert_eq!(taken.map(|e| e.transaction_id), Some("TX1".to_string()));
        assert!(dlq.take(entry.id).await.unwrap().is_none());
        assert!(dlq.list(10).await.unwrap().is_empty());
    }
}
