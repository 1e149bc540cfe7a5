pub mod authorization;
pub mod transaction_orchestrator;

pub use authorization::{AdminAllowList, AuthorizationPolicy};
pub use transaction_orchestrator::{
    ChargeOutcome, ChargeRequest, NotificationReply, OrchestratorSettings, SettleOutcome,
    Settlement, TransactionOrchestrator,
};
