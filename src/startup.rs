//! Backend wiring and the `config` validation report.

use anyhow::{Context, Result};
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;

use crate::adapters::{
    InMemoryBalanceLedger, InMemoryDeadLetterQueue, InMemoryTransactionRepository,
    PostgresBalanceLedger, PostgresDeadLetterQueue, PostgresTransactionRepository,
};
use crate::auth::{OpenShiftUserResolver, StaticUserResolver, UserResolver};
use crate::config::Config;
use crate::domain::DebitPolicy;
use crate::gateway::{AipayClient, DisabledGateway, PaymentGateway};
use crate::ports::{BalanceLedger, DeadLetterQueue, TransactionRepository};
use crate::services::{AdminAllowList, OrchestratorSettings, TransactionOrchestrator};
use crate::AppState;

pub fn build_orchestrator(
    config: &Config,
    transactions: Arc<dyn TransactionRepository>,
    ledger: Arc<dyn BalanceLedger>,
    dead_letters: Arc<dyn DeadLetterQueue>,
) -> TransactionOrchestrator {
    let gateway: Arc<dyn PaymentGateway> = match &config.aipay_base_url {
        Some(base_url) => Arc::new(AipayClient::new(
            base_url.clone(),
            config.return_url.clone(),
            config.aipay_timeout,
        )),
        None => Arc::new(DisabledGateway),
    };
    let settings = OrchestratorSettings {
        debit_policy: DebitPolicy::from_flag(config.allow_negative_balance),
        payment_page_url: config.aipay_web_url.clone(),
        payer_account: config.aipay_payer_account.clone(),
    };

    TransactionOrchestrator::new(
        transactions,
        ledger,
        dead_letters,
        gateway,
        Arc::new(AdminAllowList::new(config.admin_users.iter().cloned())),
        settings,
    )
}

pub fn build_postgres_orchestrator(config: &Config, pool: PgPool) -> TransactionOrchestrator {
    build_orchestrator(
        config,
        Arc::new(PostgresTransactionRepository::new(pool.clone())),
        Arc::new(PostgresBalanceLedger::new(pool.clone())),
        Arc::new(PostgresDeadLetterQueue::new(pool)),
    )
}

pub fn build_in_memory_orchestrator(config: &Config) -> TransactionOrchestrator {
    build_orchestrator(
        config,
        Arc::new(InMemoryTransactionRepository::new()),
        Arc::new(InMemoryBalanceLedger::new()),
        Arc::new(InMemoryDeadLetterQueue::new()),
    )
}

/// The API server resolver wins when configured; otherwise the static table.
pub fn build_user_resolver(config: &Config) -> Arc<dyn UserResolver> {
    match &config.api_server {
        Some(api_server) => Arc::new(OpenShiftUserResolver::new(api_server.clone())),
        None => {
            let resolver = StaticUserResolver::parse(&config.static_tokens);
            if resolver.is_empty() {
                tracing::warn!("no DATAFOUNDRY_API_SERVER and no AUTH_STATIC_TOKENS: every request will fail auth");
            }
            Arc::new(resolver)
        }
    }
}

pub fn build_state(config: &Config, orchestrator: TransactionOrchestrator) -> AppState {
    AppState {
        orchestrator: Arc::new(orchestrator),
        users: build_user_resolver(config),
    }
}

pub struct ValidationReport {
    pub environment: bool,
    pub database: bool,
    pub gateway: bool,
    pub errors: Vec<String>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.environment && self.database && self.gateway
    }

    pub fn print(&self) {
        println!("\n=== Startup Validation Report ===");
        println!("Environment Variables: {}", status(self.environment));
        println!("Database Connectivity: {}", status(self.database));
        println!("Gateway Reachability:  {}", status(self.gateway));

        if !self.errors.is_empty() {
            println!("\nErrors:");
            for error in &self.errors {
                println!("  ❌ {}", error);
            }
        }

        println!("\nOverall Status: {}", if self.is_valid() { "✅ PASS" } else { "❌ FAIL" });
        println!("=================================\n");
    }
}

fn status(ok: bool) -> &'static str {
    if ok { "✅ OK" } else { "❌ FAIL" }
}

pub async fn validate_environment(config: &Config, pool: Option<&PgPool>) -> ValidationReport {
    let mut report = ValidationReport {
        environment: true,
        database: true,
        gateway: true,
        errors: Vec::new(),
    };

    if let Err(e) = validate_env_vars(config) {
        report.environment = false;
        report.errors.push(format!("Environment: {}", e));
    }

    match pool {
        Some(pool) => {
            if let Err(e) = validate_database(pool).await {
                report.database = false;
                report.errors.push(format!("Database: {:#}", e));
            }
        }
        None => {
            report.database = false;
            report.errors.push("Database: DATABASE_URL is not set".to_string());
        }
    }

    let gateway = match config.require_aipay_base_url() {
        Ok(base_url) => validate_gateway(base_url).await,
        Err(e) => Err(e),
    };
    if let Err(e) = gateway {
        report.gateway = false;
        report.errors.push(format!("Gateway: {:#}", e));
    }

    report
}

fn validate_env_vars(config: &Config) -> Result<()> {
    if config.server_port == 0 {
        anyhow::bail!("SERVER_PORT must be greater than 0");
    }
    let gateway_url = config.require_aipay_base_url()?;
    if !gateway_url.starts_with("http://") && !gateway_url.starts_with("https://") {
        anyhow::bail!("JAVA_AIPAY_REQUESTPACKET_URL is not an http(s) URL");
    }
    if config.admin_users.is_empty() {
        anyhow::bail!("ADMIN_USERS is empty");
    }
    if config.api_server.is_none() && StaticUserResolver::parse(&config.static_tokens).is_empty() {
        anyhow::bail!("set DATAFOUNDRY_API_SERVER or AUTH_STATIC_TOKENS");
    }
    Ok(())
}

async fn validate_database(pool: &PgPool) -> Result<()> {
    sqlx::query("SELECT 1")
        .fetch_one(pool)
        .await
        .context("Failed to connect to database")?;

    let applied: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM _sqlx_migrations")
        .fetch_one(pool)
        .await
        .context("Failed to check migrations table")?;

    if applied == 0 {
        anyhow::bail!("No migrations applied");
    }

    Ok(())
}

/// Any HTTP answer counts; only transport failures fail the check.
async fn validate_gateway(base_url: &str) -> Result<()> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()?;

    client
        .get(base_url)
        .send()
        .await
        .context("Failed to reach the payment gateway")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(pairs: &[(&str, &str)]) -> Config {
        let vars: HashMap<&str, &str> = pairs.iter().copied().collect();
        Config::from_lookup(|key| vars.get(key).map(|v| v.to_string())).unwrap()
    }

    #[test]
    fn test_validate_env_vars_requires_a_user_source() {
        let config = config(&[("JAVA_AIPAY_REQUESTPACKET_URL", "http://aipay")]);
        assert!(validate_env_vars(&config).is_err());
    }

    #[test]
    fn test_validate_env_vars_rejects_non_http_gateway() {
        let config = config(&[
            ("JAVA_AIPAY_REQUESTPACKET_URL", "aipay.local"),
            ("AUTH_STATIC_TOKENS", "t:admin"),
        ]);
        assert!(validate_env_vars(&config).is_err());
    }

    #[test]
    fn test_validate_env_vars_accepts_minimal_config() {
        let config = config(&[
            ("JAVA_AIPAY_REQUESTPACKET_URL", "http://aipay"),
            ("AUTH_STATIC_TOKENS", "t:admin"),
        ]);
        assert!(validate_env_vars(&config).is_ok());
    }

    #[test]
    fn test_validate_env_vars_requires_gateway_url() {
        let config = config(&[("AUTH_STATIC_TOKENS", "t:admin")]);
        assert!(validate_env_vars(&config).is_err());
    }

    #[tokio::test]
    async fn test_orchestrator_builds_without_gateway_url() {
        let config = config(&[("AUTH_STATIC_TOKENS", "t:admin")]);
        let orchestrator = build_in_memory_orchestrator(&config);
        assert!(orchestrator.ping().await.is_ok());

        let request = serde_json::from_value(serde_json::json!({ "amount": "5" })).unwrap();
        let err = orchestrator.recharge("alice", request).await.unwrap_err();
        assert!(err.to_string().contains("not configured"));
    }

    #[tokio::test]
    async fn test_in_memory_state_uses_static_tokens() {
        let config = config(&[
            ("JAVA_AIPAY_REQUESTPACKET_URL", "http://aipay"),
            ("AUTH_STATIC_TOKENS", "t:admin"),
        ]);
        let state = build_state(&config, build_in_memory_orchestrator(&config));
        assert_eq!(state.users.resolve("Bearer t").await.unwrap(), "admin");
        assert!(state.orchestrator.is_admin("admin"));
        assert!(state.orchestrator.ping().await.is_ok());
    }
}
