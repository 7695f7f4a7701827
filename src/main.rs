//! # BonusHub Main Entry Point
//!
//! Serves the API by default; `migrate` applies schema migrations and `rank`
//! runs a one-off ranking pass.

use std::sync::Arc;

use anyhow::Context;
use bonushub::{
    clock::SystemClock,
    config::ConfigLoader,
    db::{init_pool, run_migrations},
    ranking::RankingUpdater,
    server::run_server,
    telemetry::init_tracing,
};
use clap::{Parser, Subcommand};
use uuid::Uuid;

#[derive(Debug, Parser)]
#[command(name = "bonushub", version, about = "Affiliate listing ranking service")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Apply migrations and serve the HTTP API (default)
    Serve,
    /// Apply pending database migrations and exit
    Migrate,
    /// Run one ranking pass and exit
    Rank {
        /// Rank only this domain; all active domains otherwise
        #[arg(long)]
        tenant: Option<Uuid>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration from layered env files and variables
    let config = ConfigLoader::new()
        .load()
        .context("Failed to load configuration")?;
    init_tracing(&config).context("Failed to initialize telemetry")?;

    log::info!("Loaded configuration for profile: {}", config.profile);
    if let Ok(redacted_json) = config.redacted_json() {
        log::debug!("Configuration: {}", redacted_json);
    }

    let db = init_pool(&config).await?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            run_migrations(&db).await?;
            run_server(config, db).await
        }
        Command::Migrate => run_migrations(&db).await,
        Command::Rank { tenant } => {
            let updater =
                RankingUpdater::new(db, config.ranking.strategy(), Arc::new(SystemClock));
            match tenant {
                Some(tenant_id) => {
                    let ranked = updater.update_rankings(tenant_id).await?;
                    log::info!("Ranked {} records for tenant {}", ranked, tenant_id);
                }
                None => {
                    let summary = updater.update_all().await?;
                    log::info!(
                        "Ranked {} records across {} tenants ({} failed)",
                        summary.records_ranked,
                        summary.tenants,
                        summary.failed_tenants.len()
                    );
                }
            }
            Ok(())
        }
    }
}
