//! Transaction lifecycle: records intent, talks to the gateway, applies the
//! ledger delta and finalizes status. Holds no durable state of its own.

use bigdecimal::BigDecimal;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::transaction::deserialize_amount;
use crate::domain::{
    Balance, BalanceDlqEntry, DebitPolicy, PayMode, Transaction, TransactionFilter,
    TransactionPage, TransactionStatus, TransactionType,
};
use crate::error::AppError;
use crate::gateway::{PaymentGateway, PaymentRedirect, RechargeOrder};
use crate::ports::{BalanceLedger, DeadLetterQueue, RepositoryError, TransactionRepository};
use crate::services::authorization::AuthorizationPolicy;
use crate::utils::pagination::PageRequest;
use crate::validation::{
    normalize_optional, validate_amount, validate_namespace, REASON_MAX_LEN, REGION_MAX_LEN,
};

/// Body of a recharge, coupon or deduction request.
#[derive(Debug, Clone, Deserialize)]
pub struct ChargeRequest {
    #[serde(deserialize_with = "deserialize_amount")]
    pub amount: BigDecimal,
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
}

/// Result of a submission: synchronous paths return the new balance, the
/// gateway path returns where the caller must go next.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ChargeOutcome {
    Balance(Balance),
    Redirect(PaymentRedirect),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settlement {
    Success,
    Failure,
}

impl Settlement {
    fn target(self) -> TransactionStatus {
        match self {
            Settlement::Success => TransactionStatus::Completed,
            Settlement::Failure => TransactionStatus::Failed,
        }
    }
}

#[derive(Debug, Clone)]
pub enum SettleOutcome {
    /// This call moved the row out of `I`.
    Settled(Transaction),
    /// The row had already left `I`; nothing was applied.
    Unchanged(Transaction),
}

/// What to send back to the gateway for a notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationReply {
    pub acknowledged: bool,
    pub body: String,
}

#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub debit_policy: DebitPolicy,
    /// `aiurl` handed to the caller after a gateway submission.
    pub payment_page_url: String,
    /// Overrides the namespace as the account billed by the gateway.
    pub payer_account: Option<String>,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            debit_policy: DebitPolicy::AllowNegative,
            payment_page_url: String::new(),
            payer_account: None,
        }
    }
}

struct ValidatedCharge {
    amount: BigDecimal,
    namespace: String,
    reason: Option<String>,
    region: Option<String>,
}

#[derive(Clone)]
pub struct TransactionOrchestrator {
    transactions: Arc<dyn TransactionRepository>,
    ledger: Arc<dyn BalanceLedger>,
    dead_letters: Arc<dyn DeadLetterQueue>,
    gateway: Arc<dyn PaymentGateway>,
    policy: Arc<dyn AuthorizationPolicy>,
    settings: OrchestratorSettings,
}

impl TransactionOrchestrator {
    pub fn new(
        transactions: Arc<dyn TransactionRepository>,
        ledger: Arc<dyn BalanceLedger>,
        dead_letters: Arc<dyn DeadLetterQueue>,
        gateway: Arc<dyn PaymentGateway>,
        policy: Arc<dyn AuthorizationPolicy>,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            transactions,
            ledger,
            dead_letters,
            gateway,
            policy,
            settings,
        }
    }

    pub fn is_admin(&self, user: &str) -> bool {
        self.policy.is_admin(user)
    }

    pub fn require_admin(&self, user: &str) -> Result<(), AppError> {
        if self.policy.is_admin(user) {
            Ok(())
        } else {
            Err(AppError::PermissionDenied(format!("{} is not an admin", user)))
        }
    }

    /// Type dispatch for `POST /recharge`.
    pub async fn submit(
        &self,
        user: &str,
        transaction_type: TransactionType,
        request: ChargeRequest,
    ) -> Result<ChargeOutcome, AppError> {
        match transaction_type {
            TransactionType::Deduction => self.deduct(user, request).await.map(ChargeOutcome::Balance),
            TransactionType::Recharge => self.recharge(user, request).await.map(ChargeOutcome::Redirect),
        }
    }

    /// Admin-only synchronous debit. The row is written as `O` first; a
    /// failed debit downgrades it to `F` and is not retried.
    pub async fn deduct(&self, user: &str, request: ChargeRequest) -> Result<Balance, AppError> {
        let charge = self.validate(user, request)?;
        self.require_admin(user)?;

        let tx = self
            .record(user, TransactionType::Deduction, &charge, TransactionStatus::Completed, None)
            .await?;

        match self
            .ledger
            .debit(&tx.namespace, &tx.amount, self.settings.debit_policy)
            .await
        {
            Ok(balance) => {
                tracing::info!(
                    transaction_id = %tx.transaction_id,
                    namespace = %tx.namespace,
                    amount = %tx.amount,
                    "deduction applied"
                );
                Ok(balance)
            }
            Err(e) => {
                tracing::error!(
                    transaction_id = %tx.transaction_id,
                    namespace = %tx.namespace,
                    error = %e,
                    "deduction debit failed, marking transaction F"
                );
                if let Err(mark) = self
                    .advance(&tx.transaction_id, TransactionStatus::Completed, TransactionStatus::Fatal)
                    .await
                {
                    tracing::error!(
                        transaction_id = %tx.transaction_id,
                        error = %mark,
                        "failed to mark transaction F"
                    );
                }
                Err(AppError::UpdateBalance(e.to_string()))
            }
        }
    }

    /// Gateway-routed recharge. Only records a pending row; the ledger moves
    /// when the notification arrives.
    pub async fn recharge(
        &self,
        user: &str,
        request: ChargeRequest,
    ) -> Result<PaymentRedirect, AppError> {
        let charge = self.validate(user, request)?;

        let mut tx = Transaction::new(
            TransactionType::Recharge,
            charge.amount.clone(),
            charge.namespace.clone(),
            TransactionStatus::Pending,
        );
        let order = RechargeOrder {
            order_id: tx.transaction_id.clone(),
            amount: tx.amount.clone(),
            payer_account: self
                .settings
                .payer_account
                .clone()
                .unwrap_or_else(|| tx.namespace.clone()),
        };
        let packet = self.gateway.request_packet(&order).await?;

        tx.user = Some(user.to_string());
        tx.reason = charge.reason;
        tx.region = charge.region;
        tx.paymode = Some(PayMode::Hongpay);
        let tx = self
            .transactions
            .insert(&tx)
            .await
            .map_err(|e| AppError::RecordTransaction(e.to_string()))?;

        tracing::info!(
            transaction_id = %tx.transaction_id,
            namespace = %tx.namespace,
            amount = %tx.amount,
            "recharge submitted to gateway"
        );
        Ok(PaymentRedirect::new(&self.settings.payment_page_url, packet))
    }

    /// Admin-only direct credit. A credit that fails after the row is `O`
    /// is parked in the dead-letter queue.
    pub async fn coupon_recharge(
        &self,
        user: &str,
        request: ChargeRequest,
    ) -> Result<Balance, AppError> {
        let charge = self.validate(user, request)?;
        self.require_admin(user)?;

        let tx = self
            .record(
                user,
                TransactionType::Recharge,
                &charge,
                TransactionStatus::Completed,
                Some(PayMode::Coupon),
            )
            .await?;

        let balance = self.apply_credit(&tx).await?;
        tracing::info!(
            transaction_id = %tx.transaction_id,
            namespace = %tx.namespace,
            amount = %tx.amount,
            "coupon recharge applied"
        );
        Ok(balance)
    }

    /// Gateway notification: forward upstream, settle the order, and build
    /// the reply the gateway protocol expects.
    pub async fn handle_notification(&self, body: &[u8]) -> NotificationReply {
        let envelope = match self.gateway.confirm_notification(body).await {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::error!(error = %e, "payment confirmation failed");
                return NotificationReply {
                    acknowledged: false,
                    body: String::new(),
                };
            }
        };

        let notify = envelope.data.unwrap_or_default();
        let (settlement, acknowledged) = match (envelope.code, notify.succeeded()) {
            (0, true) => (Settlement::Success, true),
            (0, false) => (Settlement::Failure, true),
            _ => (Settlement::Failure, false),
        };
        if settlement == Settlement::Failure {
            tracing::warn!(
                order_id = %notify.order_id,
                code = envelope.code,
                result = notify.result,
                msg = %envelope.msg,
                "payment reported as failed"
            );
        }

        match self.settle(&notify.order_id, settlement).await {
            Ok(SettleOutcome::Settled(tx)) => tracing::info!(
                transaction_id = %tx.transaction_id,
                status = %tx.status,
                "recharge settled by notification"
            ),
            Ok(SettleOutcome::Unchanged(tx)) => tracing::warn!(
                transaction_id = %tx.transaction_id,
                status = %tx.status,
                "duplicate notification ignored"
            ),
            Err(e) => tracing::error!(order_id = %notify.order_id, error = %e, "failed to settle recharge"),
        }

        NotificationReply {
            acknowledged,
            body: notify.sign_pay_notify_msg,
        }
    }

    /// Moves a pending recharge to `O` or `E` exactly once. The ledger is
    /// credited only by the call that wins the `I -> O` swap.
    pub async fn settle(
        &self,
        transaction_id: &str,
        settlement: Settlement,
    ) -> Result<SettleOutcome, AppError> {
        let swapped = self
            .advance(transaction_id, TransactionStatus::Pending, settlement.target())
            .await?;

        let tx = match swapped {
            Some(tx) => tx,
            None => {
                let current = self.transactions.get_by_id(transaction_id).await?;
                return Ok(SettleOutcome::Unchanged(current));
            }
        };

        if settlement == Settlement::Success {
            self.apply_credit(&tx).await?;
        }
        Ok(SettleOutcome::Settled(tx))
    }

    pub async fn list(
        &self,
        filter: &TransactionFilter,
        page: PageRequest,
    ) -> Result<TransactionPage, AppError> {
        self.transactions
            .list(filter, page)
            .await
            .map_err(|e| AppError::QueryTransactions(e.to_string()))
    }

    pub async fn get(&self, transaction_id: &str) -> Result<Transaction, AppError> {
        Ok(self.transactions.get_by_id(transaction_id).await?)
    }

    pub async fn balance(&self, namespace: &str) -> Result<Balance, AppError> {
        self.ledger
            .get(namespace)
            .await
            .map_err(|e| AppError::QueryTransactions(e.to_string()))
    }

    pub async fn dead_letters(&self, limit: i64) -> Result<Vec<BalanceDlqEntry>, AppError> {
        self.dead_letters
            .list(limit)
            .await
            .map_err(|e| AppError::QueryTransactions(e.to_string()))
    }

    /// Claims a dead-lettered credit and applies it. On failure the entry is
    /// re-queued with its retry count bumped.
    pub async fn retry_dead_letter(&self, id: Uuid) -> Result<Balance, AppError> {
        let mut entry = self
            .dead_letters
            .take(id)
            .await
            .map_err(|e| AppError::RecordTransaction(e.to_string()))?
            .ok_or_else(|| AppError::NotFound(format!("dead letter {}", id)))?;

        match self.ledger.credit(&entry.namespace, &entry.amount).await {
            Ok(balance) => {
                tracing::info!(
                    transaction_id = %entry.transaction_id,
                    namespace = %entry.namespace,
                    retry_count = entry.retry_count,
                    "dead-lettered credit applied"
                );
                Ok(balance)
            }
            Err(e) => {
                entry.retry_count += 1;
                entry.last_retry_at = Some(Utc::now());
                entry.error_reason = e.to_string();
                if let Err(requeue) = self.dead_letters.push(&entry).await {
                    tracing::error!(
                        transaction_id = %entry.transaction_id,
                        error = %requeue,
                        "failed to re-queue dead-lettered credit"
                    );
                }
                Err(AppError::UpdateBalance(e.to_string()))
            }
        }
    }

    pub async fn ping(&self) -> Result<(), RepositoryError> {
        self.transactions.ping().await
    }

    /// Conditional status write, limited to the forward transitions.
    async fn advance(
        &self,
        transaction_id: &str,
        from: TransactionStatus,
        to: TransactionStatus,
    ) -> Result<Option<Transaction>, AppError> {
        if !from.can_transition_to(to) {
            return Err(AppError::Internal(format!(
                "illegal transition {} -> {} for {}",
                from, to, transaction_id
            )));
        }
        self.transactions
            .transition_status(transaction_id, from, to)
            .await
            .map_err(|e| AppError::RecordTransaction(e.to_string()))
    }

    fn validate(&self, user: &str, request: ChargeRequest) -> Result<ValidatedCharge, AppError> {
        let amount = validate_amount(&request.amount)?;
        let namespace = validate_namespace(request.namespace.as_deref().unwrap_or(user))?;
        let reason = normalize_optional("reason", request.reason.as_deref(), REASON_MAX_LEN)?;
        let region = normalize_optional("region", request.region.as_deref(), REGION_MAX_LEN)?;

        Ok(ValidatedCharge {
            amount,
            namespace,
            reason,
            region,
        })
    }

    async fn record(
        &self,
        user: &str,
        transaction_type: TransactionType,
        charge: &ValidatedCharge,
        status: TransactionStatus,
        paymode: Option<PayMode>,
    ) -> Result<Transaction, AppError> {
        let mut tx = Transaction::new(
            transaction_type,
            charge.amount.clone(),
            charge.namespace.clone(),
            status,
        );
        tx.user = Some(user.to_string());
        tx.reason = charge.reason.clone();
        tx.region = charge.region.clone();
        tx.paymode = paymode;

        self.transactions
            .insert(&tx)
            .await
            .map_err(|e| AppError::RecordTransaction(e.to_string()))
    }

    async fn apply_credit(&self, tx: &Transaction) -> Result<Balance, AppError> {
        match self.ledger.credit(&tx.namespace, &tx.amount).await {
            Ok(balance) => Ok(balance),
            Err(e) => {
                tracing::error!(
                    transaction_id = %tx.transaction_id,
                    namespace = %tx.namespace,
                    error = %e,
                    "credit failed after transaction completed, moving to DLQ"
                );
                let entry = BalanceDlqEntry::new(
                    &tx.transaction_id,
                    &tx.namespace,
                    tx.amount.clone(),
                    e.to_string(),
                );
                if let Err(push) = self.dead_letters.push(&entry).await {
                    tracing::error!(
                        transaction_id = %tx.transaction_id,
                        error = %push,
                        "failed to record dead-lettered credit"
                    );
                }
                Err(AppError::UpdateBalance(e.to_string()))
            }
        }
    }
}
