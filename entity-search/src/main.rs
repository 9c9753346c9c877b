//! Entity search service binary.
//!
//! Usage:
//!   entity-search run < events.ndjson
//!   entity-search search --tenant acme --body '{"query": "widget"}'
//!   entity-search purge
//!   entity-search health

use std::env;
use std::process::ExitCode;

use chrono::Utc;
use clap::{Parser, Subcommand};
use tokio::io::BufReader;
use tokio::sync::broadcast;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use entity_search::{AppError, Dependencies, Service, ServiceConfig};
use entity_search_repository::SearchIndexProvider;
use entity_search_shared::RequestContext;

#[derive(Parser)]
#[command(name = "entity-search")]
#[command(about = "Multi-tenant entity indexing and search service", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve NDJSON events and search requests from stdin
    Run,
    /// Run one search and print the response
    Search {
        /// Tenant identity of the caller
        #[arg(long)]
        tenant: Option<String>,

        /// JSON request body
        #[arg(long, default_value = "")]
        body: String,
    },
    /// Purge expired tombstones once
    Purge,
    /// Check that the index store is reachable and healthy
    Health,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = env::var("LOG_FORMAT").is_ok_and(|format| format.eq_ignore_ascii_case("json"));

    // Logs go to stderr; stdout carries responses.
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();

    match run(cli.command).await {
        Ok(code) => code,
        Err(e) => {
            error!(error = %e, "Entity search failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Commands) -> Result<ExitCode, AppError> {
    let config = ServiceConfig::from_env()?;
    let deps = Dependencies::new(&config).await?;

    match command {
        Commands::Run => {
            let service = Service::new(deps);
            let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    let _ = shutdown_tx.send(());
                }
            });

            let stdin = BufReader::new(tokio::io::stdin());
            service.run(stdin, tokio::io::stdout(), shutdown_rx).await?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Search { tenant, body } => {
            let ctx = RequestContext::new("search");
            let response = deps.search_handler.handle(&ctx, tenant.as_deref(), &body).await;
            println!("{}", response.body);
            if response.status_code == 200 {
                Ok(ExitCode::SUCCESS)
            } else {
                Ok(ExitCode::FAILURE)
            }
        }
        Commands::Purge => {
            let purged = deps.index_coordinator.purge_expired_tombstones(Utc::now()).await?;
            info!(purged, "Purge complete");
            println!("{}", purged);
            Ok(ExitCode::SUCCESS)
        }
        Commands::Health => {
            let healthy = deps.store.health_check().await?;
            println!("{}", if healthy { "healthy" } else { "unhealthy" });
            if healthy {
                Ok(ExitCode::SUCCESS)
            } else {
                Ok(ExitCode::FAILURE)
            }
        }
    }
}
