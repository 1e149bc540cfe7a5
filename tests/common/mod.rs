#![allow(dead_code)]

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use charge_core::adapters::{
    InMemoryBalanceLedger, InMemoryDeadLetterQueue, InMemoryTransactionRepository,
};
use charge_core::domain::{Balance, DebitPolicy};
use charge_core::gateway::{
    GatewayError, NotifyEnvelope, NotifyResult, PaymentGateway, RechargeOrder,
};
use charge_core::ports::{BalanceLedger, RepositoryError, RepositoryResult};
use charge_core::services::{AdminAllowList, OrchestratorSettings, TransactionOrchestrator};
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub fn dec(raw: &str) -> BigDecimal {
    BigDecimal::from_str(raw).unwrap()
}

/// Gateway double: hands out fixed packets and replays a queued verdict for
/// every notification.
#[derive(Default)]
pub struct StubGateway {
    pub fail_submission: AtomicBool,
    pub orders: Mutex<Vec<RechargeOrder>>,
    pub verdict: Mutex<Option<Result<NotifyEnvelope, String>>>,
}

impl StubGateway {
    pub fn confirm_with(&self, code: i64, order_id: &str, result: i64) {
        *self.verdict.lock().unwrap() = Some(Ok(NotifyEnvelope {
            code,
            msg: String::new(),
            data: Some(NotifyResult {
                sign_pay_notify_msg: format!("SIGNED-{}", order_id),
                order_id: order_id.to_string(),
                result,
            }),
        }));
    }

    pub fn confirm_fails(&self) {
        *self.verdict.lock().unwrap() = Some(Err("upstream down".to_string()));
    }
}

#[async_trait]
impl PaymentGateway for StubGateway {
    async fn request_packet(&self, order: &RechargeOrder) -> Result<String, GatewayError> {
        if self.fail_submission.load(Ordering::SeqCst) {
            return Err(GatewayError::Status(503));
        }
        self.orders.lock().unwrap().push(order.clone());
        Ok(format!("PACKET-{}", order.order_id))
    }

    async fn confirm_notification(&self, _body: &[u8]) -> Result<NotifyEnvelope, GatewayError> {
        match self.verdict.lock().unwrap().clone() {
            Some(Ok(envelope)) => Ok(envelope),
            Some(Err(e)) => Err(GatewayError::InvalidResponse(e)),
            None => Err(GatewayError::InvalidResponse("no verdict queued".to_string())),
        }
    }
}

/// Ledger wrapper that can be switched to fail and counts applied credits.
#[derive(Default)]
pub struct FlakyLedger {
    pub inner: InMemoryBalanceLedger,
    pub failing: AtomicBool,
    pub credits: AtomicUsize,
}

#[async_trait]
impl BalanceLedger for FlakyLedger {
    async fn credit(&self, namespace: &str, amount: &BigDecimal) -> RepositoryResult<Balance> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(RepositoryError::Database("ledger offline".to_string()));
        }
        self.credits.fetch_add(1, Ordering::SeqCst);
        self.inner.credit(namespace, amount).await
    }

    async fn debit(
        &self,
        namespace: &str,
        amount: &BigDecimal,
        policy: DebitPolicy,
    ) -> RepositoryResult<Balance> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(RepositoryError::Database("ledger offline".to_string()));
        }
        self.inner.debit(namespace, amount, policy).await
    }

    async fn get(&self, namespace: &str) -> RepositoryResult<Balance> {
        self.inner.get(namespace).await
    }
}

pub struct Harness {
    pub orchestrator: TransactionOrchestrator,
    pub transactions: Arc<InMemoryTransactionRepository>,
    pub ledger: Arc<FlakyLedger>,
    pub dead_letters: Arc<InMemoryDeadLetterQueue>,
    pub gateway: Arc<StubGateway>,
}

pub fn harness(debit_policy: DebitPolicy) -> Harness {
    let transactions = Arc::new(InMemoryTransactionRepository::new());
    let ledger = Arc::new(FlakyLedger::default());
    let dead_letters = Arc::new(InMemoryDeadLetterQueue::new());
    let gateway = Arc::new(StubGateway::default());

    let orchestrator = TransactionOrchestrator::new(
        transactions.clone(),
        ledger.clone(),
        dead_letters.clone(),
        gateway.clone(),
        Arc::new(AdminAllowList::new(["admin", "datafoundry"])),
        OrchestratorSettings {
            debit_policy,
            payment_page_url: "https://pay.example/aipay".to_string(),
            payer_account: None,
        },
    );

    Harness {
        orchestrator,
        transactions,
        ledger,
        dead_letters,
        gateway,
    }
}
