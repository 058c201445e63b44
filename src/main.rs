use clap::{Parser, Subcommand};
use funnel_sync::config::{Config, Credentials};
use funnel_sync::logging;
use funnel_sync::sheets::{RetryPolicy, SheetsClient};
use funnel_sync::storage::{InMemoryStorage, SqliteStorage, Storage};
use funnel_sync::sync::{snapshot, SyncOptions, SyncOrchestrator};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[derive(Parser)]
#[command(name = "funnel_sync")]
#[command(about = "Weekly sales-funnel metrics sync pipeline")]
#[command(version = "0.1.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one end-to-end sync for a period
    Sync {
        /// Period key, e.g. 2024-03
        #[arg(long)]
        period: String,
        /// Keep results in memory instead of the SQLite database
        #[arg(long)]
        dry_run: bool,
    },
    /// Show the persisted snapshot and last sync time for a period
    Status {
        /// Period key, e.g. 2024-03
        #[arg(long)]
        period: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();
    logging::init_logging();

    let cli = Cli::parse();
    let config = Config::load()?;

    match cli.command {
        Commands::Sync { period, dry_run } => {
            let credentials = Credentials::from_env()?;
            let retry = RetryPolicy {
                max_attempts: config.sheets.max_attempts,
                backoff: Duration::from_millis(config.sheets.backoff_ms),
            };
            let client = SheetsClient::new(credentials, &config.sheets, retry)?;

            let storage: Arc<dyn Storage> = if dry_run {
                info!("Dry run: using in-memory storage");
                Arc::new(InMemoryStorage::new())
            } else {
                Arc::new(SqliteStorage::open(&config.storage.db_path)?)
            };

            let orchestrator = SyncOrchestrator::new(
                Arc::new(client),
                storage,
                SyncOptions {
                    funnels: config.sync.funnels,
                    range: config.sheets.range,
                    log_type: config.sync.log_type,
                },
            );

            println!("🔄 Syncing funnel metrics for period {period}...");
            let entry = orchestrator.sync(&period).await?;
            println!(
                "📊 Sync finished with status '{}': {} ({} records)",
                entry.status.as_str(),
                entry.message,
                entry.records_synced
            );
        }
        Commands::Status { period } => {
            let storage = SqliteStorage::open(&config.storage.db_path)?;
            let view = snapshot(&storage, &config.sync.log_type, &period).await?;

            match view.last_synced_at {
                Some(at) => println!("🕒 Last sync: {}", at.to_rfc3339()),
                None => println!("🕒 No sync has run yet"),
            }
            if view.funnels.is_empty() {
                println!("📭 No funnel data persisted for period {period}");
            }
            for funnel in view.funnels {
                println!(
                    "   {} — investido R$ {:.2}, faturamento R$ {:.2}, ROAS {:.2}, alunos {}",
                    funnel.funnel_name,
                    funnel.investido,
                    funnel.faturamento_trafego,
                    funnel.roas_trafego,
                    funnel.numero_alunos
                );
            }
        }
    }

    Ok(())
}
