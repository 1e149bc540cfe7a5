use clap::{Parser, Subcommand, ValueEnum};

use crate::config::Config;
use crate::services::{SettleOutcome, Settlement, TransactionOrchestrator};

#[derive(Parser)]
#[command(name = "charge-core")]
#[command(about = "Charge Core - namespace balance and recharge service", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server (default)
    Serve {
        /// Keep all state in process memory instead of Postgres
        #[arg(long)]
        in_memory: bool,
    },

    /// Transaction management commands
    #[command(subcommand)]
    Tx(TxCommands),

    /// Database management commands
    #[command(subcommand)]
    Db(DbCommands),

    /// Configuration validation
    Config,
}

#[derive(Subcommand)]
pub enum TxCommands {
    /// Print a transaction as JSON
    Show {
        #[arg(value_name = "TX_ID")]
        tx_id: String,
    },

    /// Settle a pending recharge whose notification never arrived
    Resolve {
        #[arg(value_name = "TX_ID")]
        tx_id: String,

        #[arg(long, value_enum)]
        outcome: Outcome,
    },
}

#[derive(Subcommand)]
pub enum DbCommands {
    /// Run database migrations
    Migrate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Outcome {
    Success,
    Failed,
}

impl From<Outcome> for Settlement {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Success => Settlement::Success,
            Outcome::Failed => Settlement::Failure,
        }
    }
}

pub async fn handle_tx_show(orchestrator: &TransactionOrchestrator, tx_id: &str) -> anyhow::Result<()> {
    let tx = orchestrator.get(tx_id).await?;
    println!("{}", serde_json::to_string_pretty(&tx)?);
    Ok(())
}

pub async fn handle_tx_resolve(
    orchestrator: &TransactionOrchestrator,
    tx_id: &str,
    outcome: Outcome,
) -> anyhow::Result<()> {
    match orchestrator.settle(tx_id, outcome.into()).await? {
        SettleOutcome::Settled(tx) => {
            tracing::info!(transaction_id = %tx.transaction_id, status = %tx.status, "Transaction resolved manually");
            println!("✓ Transaction {} moved to {}", tx.transaction_id, tx.status);
            Ok(())
        }
        SettleOutcome::Unchanged(tx) => {
            anyhow::bail!(
                "Transaction {} is not pending (status {}), nothing changed",
                tx.transaction_id,
                tx.status
            )
        }
    }
}

pub async fn handle_db_migrate(config: &Config) -> anyhow::Result<()> {
    let pool = crate::db::create_pool(config).await?;

    tracing::info!("Running database migrations...");
    crate::db::run_migrations(&pool).await?;
    println!("✓ Database migrations completed");

    Ok(())
}

pub async fn handle_config_validate(config: &Config) -> anyhow::Result<()> {
    tracing::info!("Validating configuration...");

    println!("Configuration:");
    println!("  Server Port: {}", config.server_port);
    println!(
        "  Database URL: {}",
        config.database_url.as_deref().map(mask_password).unwrap_or_else(|| "(unset)".to_string())
    );
    println!("  Gateway URL: {}", config.aipay_base_url.as_deref().unwrap_or("(unset)"));
    println!("  Admin Users: {}", config.admin_users.join(","));
    println!("  Allow Negative Balance: {}", config.allow_negative_balance);

    let pool = match &config.database_url {
        Some(_) => match crate::db::create_pool(config).await {
            Ok(pool) => Some(pool),
            Err(e) => {
                tracing::warn!(error = %e, "Could not open database pool");
                None
            }
        },
        None => None,
    };

    let report = crate::startup::validate_environment(config, pool.as_ref()).await;
    report.print();

    if report.is_valid() {
        tracing::info!("Configuration is valid");
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn mask_password(url: &str) -> String {
    if let Some(at_pos) = url.rfind('@') {
        if let Some(colon_pos) = url[..at_pos].rfind(':') {
            if let Some(slash_pos) = url[..colon_pos].rfind("//") {
                let prefix = &url[..slash_pos + 2];
                let user = &url[slash_pos + 2..colon_pos];
                let suffix = &url[at_pos..];
                return format!("{}{}:****{}", prefix, user, suffix);
            }
        }
    }
    url.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_password() {
        assert_eq!(
            mask_password("postgres://charge:secret@db:5432/charge"),
            "postgres://charge:****@db:5432/charge"
        );
        assert_eq!(mask_password("postgres://db/charge"), "postgres://db/charge");
    }

    #[test]
    fn test_cli_parses_resolve() {
        let cli = Cli::try_parse_from(["charge-core", "tx", "resolve", "ABC", "--outcome", "failed"]).unwrap();
        match cli.command {
            Some(Commands::Tx(TxCommands::Resolve { tx_id, outcome })) => {
                assert_eq!(tx_id, "ABC");
                assert_eq!(outcome, Outcome::Failed);
            }
            _ => panic!("expected tx resolve"),
        }
    }

    #[test]
    fn test_cli_defaults_to_serve() {
        let cli = Cli::try_parse_from(["charge-core"]).unwrap();
        assert!(cli.command.is_none());

        let cli = Cli::try_parse_from(["charge-core", "serve", "--in-memory"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Serve { in_memory: true })));
    }
}
