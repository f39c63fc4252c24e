//! crmsync operator tool
//!
//! Serves the sync error API, inspects and closes ledger records, and runs
//! one-off sync passes.
//!
//! Usage:
//!   crmsync-admin serve --port 4002
//!   crmsync-admin list --all
//!   crmsync-admin resolve 42
//!   crmsync-admin sync --config crmsync.json --direction pull

use std::{path::PathBuf, sync::Arc};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use crmsync_admin::{build_router, DEFAULT_LIMIT};
use crmsync_sync::{EngineConfig, SyncEngine, SyncErrorLedger, SyncErrorRecord, SyncRunReport};
use crmsync_types::{Causer, Direction, EntityType};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "crmsync-admin")]
#[command(about = "crmsync sync error ledger and operator tool")]
struct Args {
    /// Engine config file; supplies the ledger path when --ledger is not given
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Path to the sync error ledger
    #[arg(short, long, global = true)]
    ledger: Option<PathBuf>,

    /// Enable verbose debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the sync error HTTP API
    Serve {
        #[arg(short, long, default_value = "4002")]
        port: u16,
    },
    /// Print sync errors
    List {
        /// Include resolved and archived records
        #[arg(short, long)]
        all: bool,
        #[arg(long, default_value_t = DEFAULT_LIMIT)]
        limit: u32,
    },
    /// Archive a sync error
    Archive { id: i64 },
    /// Mark a sync error resolved
    Resolve { id: i64 },
    /// Run one sync pass using the engine config
    Sync {
        #[arg(short, long, value_enum, default_value = "push")]
        direction: DirectionArg,
        /// Only sync this entity type
        #[arg(short, long)]
        entity_type: Option<EntityType>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum DirectionArg {
    Push,
    Pull,
}

impl From<DirectionArg> for Direction {
    fn from(arg: DirectionArg) -> Self {
        match arg {
            DirectionArg::Push => Direction::Push,
            DirectionArg::Pull => Direction::Pull,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let log_level = if args.verbose { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .compact()
        .init();

    let config = match &args.config {
        Some(path) => EngineConfig::from_file(path).context("Failed to load engine config")?,
        None => EngineConfig::default(),
    };
    let ledger_path = args
        .ledger
        .clone()
        .unwrap_or_else(|| PathBuf::from(&config.ledger_path));

    match args.command {
        Command::Serve { port } => serve(open_ledger(&ledger_path)?, port).await,
        Command::List { all, limit } => {
            let ledger = open_ledger(&ledger_path)?;
            let records = if all {
                ledger.list_all(limit, 0)
            } else {
                ledger.list_active()
            }
            .context("Failed to list sync errors")?;
            print_records(&records);
            Ok(())
        }
        Command::Archive { id } => {
            let record = open_ledger(&ledger_path)?
                .archive(id)
                .with_context(|| format!("Failed to archive sync error {id}"))?;
            print_records(&[record]);
            Ok(())
        }
        Command::Resolve { id } => {
            let record = open_ledger(&ledger_path)?
                .resolve(id)
                .with_context(|| format!("Failed to resolve sync error {id}"))?;
            print_records(&[record]);
            Ok(())
        }
        Command::Sync {
            direction,
            entity_type,
        } => {
            let mut config = config;
            if let Some(path) = &args.ledger {
                config.ledger_path = path.to_string_lossy().into_owned();
            }
            run_sync(&config, direction.into(), entity_type).await
        }
    }
}

fn open_ledger(path: &PathBuf) -> Result<SyncErrorLedger> {
    info!("Opening sync error ledger at {:?}", path);
    SyncErrorLedger::open(&path.to_string_lossy()).context("Failed to open sync error ledger")
}

async fn serve(ledger: SyncErrorLedger, port: u16) -> Result<()> {
    let app = build_router(Arc::new(ledger));
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port))
        .await
        .context("Failed to bind HTTP port")?;
    info!("Sync error API listening on port {}", port);
    axum::serve(listener, app).await.context("HTTP server failed")
}

async fn run_sync(config: &EngineConfig, direction: Direction, entity_type: Option<EntityType>) -> Result<()> {
    let engine = SyncEngine::from_config(config).context("Failed to start sync engine")?;
    let causer = Causer::System("admin".to_string());

    let reports = match (entity_type, direction) {
        (Some(entity_type), _) => vec![engine.sync_type(entity_type, direction, causer).await?],
        (None, Direction::Push) => engine.push_all(causer).await?,
        (None, Direction::Pull) => engine.pull_all(causer).await?,
    };

    for report in &reports {
        print_report(report);
    }
    println!(
        "\n  Active sync errors: {}",
        engine.ledger().count_active().context("Failed to count sync errors")?
    );
    Ok(())
}

fn print_report(report: &SyncRunReport) {
    let label = report
        .entity_type
        .map_or_else(|| "mixed".to_string(), |t| t.to_string());
    println!(
        "  {:<12} {:>4} total  {:>4} ok  {:>4} failed  {:>4} skipped",
        label,
        report.total(),
        report.succeeded(),
        report.failed(),
        report.skipped()
    );
}

fn print_records(records: &[SyncErrorRecord]) {
    if records.is_empty() {
        println!("No sync errors.");
        return;
    }
    for r in records {
        let state = if r.resolved_at.is_some() {
            "resolved"
        } else if r.archived_at.is_some() {
            "archived"
        } else {
            "active"
        };
        println!(
            "#{:<6} {:<9} {} {} ({})  {}",
            r.id,
            state,
            r.entity_ref(),
            r.entity_name.as_deref().unwrap_or("-"),
            r.updated_at.format("%Y-%m-%d %H:%M:%S"),
            r.error_message
        );
    }
}
