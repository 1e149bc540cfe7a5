use anyhow::Result;
use charge_core::cli::{self, Cli, Commands, DbCommands, TxCommands};
use charge_core::config::{Config, LogFormat};
use charge_core::{create_app, db, startup};
use clap::Parser;
use std::net::SocketAddr;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env()?;

    init_tracing(config.log_format);

    match cli.command.unwrap_or(Commands::Serve { in_memory: false }) {
        Commands::Serve { in_memory } => serve(config, in_memory).await,
        Commands::Db(DbCommands::Migrate) => cli::handle_db_migrate(&config).await,
        Commands::Tx(command) => {
            let pool = db::create_pool(&config).await?;
            let orchestrator = startup::build_postgres_orchestrator(&config, pool);
            match command {
                TxCommands::Show { tx_id } => cli::handle_tx_show(&orchestrator, &tx_id).await,
                TxCommands::Resolve { tx_id, outcome } => {
                    cli::handle_tx_resolve(&orchestrator, &tx_id, outcome).await
                }
            }
        }
        Commands::Config => cli::handle_config_validate(&config).await,
    }
}

fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info".into());
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

async fn serve(config: Config, in_memory: bool) -> Result<()> {
    let gateway_url = config.require_aipay_base_url()?;
    tracing::info!(gateway = %gateway_url, "Payment gateway client initialized");

    let orchestrator = if in_memory {
        tracing::warn!("Running with in-memory storage; all state is lost on exit");
        startup::build_in_memory_orchestrator(&config)
    } else {
        let pool = db::create_pool(&config).await?;
        db::run_migrations(&pool).await?;
        startup::build_postgres_orchestrator(&config, pool)
    };

    let app = create_app(startup::build_state(&config, orchestrator));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    tracing::info!("listening on {}", addr);

    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
    }
    tracing::info!("shutdown signal received");
}
