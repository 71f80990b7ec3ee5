//! CLI definition and dispatch.

use chrono::{DateTime, SecondsFormat, Utc};
use clap::{Parser, Subcommand};
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::adapters::csv_adapter::{write_ledger_csv, CsvQuoteBook};
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::sqlite_adapter::SqliteAdapter;
use crate::adapters::static_selector::StaticSelector;
use crate::domain::config_validation::{build_trader_config, TraderConfig};
use crate::domain::engine::TradeEngine;
use crate::domain::error::TraderError;
use crate::domain::ledger::validate_alternation;
use crate::domain::portfolio::summarize;
use crate::domain::position::Position;
use crate::domain::reset::reset_paper_account;
use crate::ports::clock_port::{Clock, SystemClock};
use crate::ports::config_port::ConfigPort;
use crate::ports::store_port::PositionStore;
use crate::scheduler::{Scheduler, TickReport};

#[derive(Parser, Debug)]
#[command(name = "overnight", about = "Overnight index-option paper trader")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Recover state and run the scheduler
    Run {
        #[arg(short, long)]
        config: PathBuf,
        /// Process everything due now, then exit. Retry attempts live only in
        /// this process, so each invocation starts a fresh retry budget
        #[arg(long)]
        once: bool,
    },
    /// Show position, account and next runs
    Status {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// List recent trades, newest first
    History {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },
    /// List recent audit entries, newest first
    Audit {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },
    /// Wipe the paper ledger and force the position flat
    Reset {
        #[arg(short, long)]
        config: PathBuf,
        /// Must be RESET
        #[arg(long)]
        confirm: String,
    },
    /// Write the ledger as CSV
    Export {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    init_tracing();
    let result = match cli.command {
        Command::Run { config, once } => run_trader(&config, once),
        Command::Status { config } => run_status(&config),
        Command::History { config, limit } => run_history(&config, limit),
        Command::Audit { config, limit } => run_audit(&config, limit),
        Command::Reset { config, confirm } => run_reset(&config, &confirm),
        Command::Export { config, output } => run_export(&config, &output),
        Command::Validate { config } => run_validate(&config),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

/// Installs the global subscriber. `RUST_LOG` overrides the default filter.
pub fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("overnight=info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

pub fn load_config(path: &PathBuf) -> Result<FileConfigAdapter, TraderError> {
    FileConfigAdapter::from_file(path)
}

fn ts(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn load(path: &PathBuf) -> Result<(FileConfigAdapter, TraderConfig), TraderError> {
    let config = load_config(path)?;
    let trader = build_trader_config(&config)?;
    Ok((config, trader))
}

fn run_trader(config_path: &PathBuf, once: bool) -> Result<(), TraderError> {
    eprintln!("Loading config from {}", config_path.display());
    let (config, trader) = load(config_path)?;

    let store: Arc<dyn PositionStore> = Arc::new(SqliteAdapter::from_config(&config)?);
    let selector = Arc::new(StaticSelector::from_config(&config)?);
    let quotes = Arc::new(CsvQuoteBook::from_config(&config)?);
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let mut engine = TradeEngine::new(
        Arc::clone(&store),
        selector,
        quotes,
        trader.schedule.clone(),
        trader.engine.clone(),
    );
    match engine.recover(clock.now()) {
        Ok(_) => {}
        Err(TraderError::Integrity { reason }) => {
            error!(%reason, "starting halted; inspect and reset to resume trading");
        }
        Err(e) => return Err(e),
    }

    info!(
        buy = %trader.schedule.buy_time,
        sell = %trader.schedule.sell_time,
        timezone = %trader.schedule.timezone,
        once,
        "paper trader starting"
    );
    let engine = Arc::new(Mutex::new(engine));
    let mut scheduler = Scheduler::new(
        Arc::clone(&engine),
        Arc::clone(&clock),
        trader.retry.clone(),
        trader.tick_interval,
    );

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async {
        if once {
            let report = scheduler.tick().await?;
            print_tick(&report);
            return Ok(());
        }

        #[cfg(feature = "web")]
        spawn_web(&config, &trader, engine, store, clock).await?;
        #[cfg(not(feature = "web"))]
        let _ = (&config, engine, store);

        scheduler
            .run(async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    error!(error = %e, "failed to listen for shutdown signal");
                    std::future::pending::<()>().await;
                }
            })
            .await;
        Ok(())
    })
}

#[cfg(feature = "web")]
async fn spawn_web(
    config: &FileConfigAdapter,
    trader: &TraderConfig,
    engine: Arc<Mutex<TradeEngine>>,
    store: Arc<dyn PositionStore>,
    clock: Arc<dyn Clock>,
) -> Result<(), TraderError> {
    use crate::adapters::web::{build_router, AppState};
    use std::net::SocketAddr;

    let listen = config
        .get_string("web", "listen")
        .unwrap_or_else(|| "127.0.0.1:3000".to_string());
    let addr: SocketAddr = listen.parse().map_err(|_| TraderError::ConfigInvalid {
        section: "web".into(),
        key: "listen".into(),
        reason: format!("{listen:?} is not a socket address"),
    })?;

    let router = build_router(AppState {
        engine,
        store,
        schedule: trader.schedule.clone(),
        starting_cash: trader.starting_cash,
        clock,
    });
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "inspection API listening");

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router).await {
            error!(error = %e, "web server stopped");
        }
    });
    Ok(())
}

fn print_tick(report: &TickReport) {
    for trade in &report.trades {
        println!(
            "{} {} {} x{} @ {} ({})",
            ts(&trade.timestamp),
            trade.action,
            trade.instrument,
            trade.quantity,
            trade.price,
            trade.trigger_kind
        );
    }
    println!(
        "trades={} noops={} skipped={} abandoned={} halted={}",
        report.trades.len(),
        report.noops,
        report.skipped,
        report.abandoned,
        report.halted
    );
    if let Some(event) = &report.waiting {
        println!("waiting to retry {} due {}", event.kind, ts(&event.due_at));
    }
}

fn open_store(config_path: &PathBuf) -> Result<(SqliteAdapter, TraderConfig), TraderError> {
    let (config, trader) = load(config_path)?;
    Ok((SqliteAdapter::from_config(&config)?, trader))
}

fn run_status(config_path: &PathBuf) -> Result<(), TraderError> {
    let (store, trader) = open_store(config_path)?;
    let now = Utc::now();
    let snapshot = store.snapshot()?;
    let account = summarize(&snapshot.ledger, &snapshot.position, trader.starting_cash);

    println!("Mode:          PAPER");
    match &snapshot.position {
        Position::Flat => println!("Position:      FLAT"),
        Position::Open(open) => println!(
            "Position:      OPEN {} x{} @ {} since {}",
            open.instrument,
            open.quantity,
            open.entry_price,
            ts(&open.entry_time)
        ),
    }
    println!(
        "Watermark:     {}",
        snapshot
            .watermark
            .as_ref()
            .map(ts)
            .unwrap_or_else(|| "none".to_string())
    );
    match validate_alternation(&snapshot.ledger) {
        Ok(()) => println!("Ledger:        {} trades, consistent", snapshot.ledger.len()),
        Err(e) => println!("Ledger:        {} trades, {e}", snapshot.ledger.len()),
    }
    println!("Starting cash: {:.2}", account.starting_cash);
    println!("Cash:          {:.2}", account.cash);
    println!("Realized P&L:  {:.2}", account.realized_pnl);
    println!(
        "Round trips:   {} ({} winning)",
        account.round_trips.len(),
        account.win_count()
    );

    println!("\nNext runs ({}):", trader.schedule.timezone);
    for event in trader.schedule.upcoming(now, 4) {
        println!(
            "  {:<12} {}",
            event.kind.as_str(),
            trader.schedule.local(event.due_at).format("%Y-%m-%d %H:%M:%S %Z")
        );
    }
    Ok(())
}

fn run_history(config_path: &PathBuf, limit: usize) -> Result<(), TraderError> {
    let (store, _) = open_store(config_path)?;
    let trades = store.recent_trades(limit)?;
    if trades.is_empty() {
        println!("No trades.");
        return Ok(());
    }

    println!(
        "{:>5} {:<5} {:<24} {:>10} {:>6} {:<21} {}",
        "ID", "SIDE", "INSTRUMENT", "PRICE", "QTY", "TIME", "TRIGGER"
    );
    for t in trades {
        println!(
            "{:>5} {:<5} {:<24} {:>10.2} {:>6} {:<21} {}",
            t.id,
            t.action,
            t.instrument,
            t.price,
            t.quantity,
            ts(&t.timestamp),
            t.trigger_kind
        );
    }
    Ok(())
}

fn run_audit(config_path: &PathBuf, limit: usize) -> Result<(), TraderError> {
    let (store, _) = open_store(config_path)?;
    for entry in store.recent_audit(limit)? {
        let event = entry
            .event
            .map(|e| format!(" {} due {}", e, entry.due_at.as_ref().map(ts).unwrap_or_default()))
            .unwrap_or_default();
        println!(
            "{:>5} {} {}{}: {}",
            entry.id,
            ts(&entry.recorded_at),
            entry.kind,
            event,
            entry.detail
        );
    }
    Ok(())
}

fn run_reset(config_path: &PathBuf, confirm: &str) -> Result<(), TraderError> {
    let (store, _) = open_store(config_path)?;
    let report = reset_paper_account(&store, confirm, Utc::now())?;
    println!(
        "Paper account reset: {} trades removed at {}",
        report.trades_removed,
        ts(&report.at)
    );
    Ok(())
}

fn run_export(config_path: &PathBuf, output: &PathBuf) -> Result<(), TraderError> {
    let (store, _) = open_store(config_path)?;
    let ledger = store.load_ledger()?;
    let file = File::create(output)?;
    write_ledger_csv(&ledger, BufWriter::new(file))?;
    eprintln!("Wrote {} trades to {}", ledger.len(), output.display());
    Ok(())
}

fn run_validate(config_path: &PathBuf) -> Result<(), TraderError> {
    eprintln!("Validating config: {}", config_path.display());
    let (config, trader) = load(config_path)?;

    if config.get_string("sqlite", "path").is_none() {
        return Err(TraderError::ConfigMissing {
            section: "sqlite".into(),
            key: "path".into(),
        });
    }
    StaticSelector::from_config(&config)?;
    CsvQuoteBook::from_config(&config)?;

    let schedule = &trader.schedule;
    println!("Configuration is valid.");
    println!(
        "  buy {} / sell {} ({})",
        schedule.buy_time, schedule.sell_time, schedule.timezone
    );
    println!(
        "  catch-up {}, misfire grace {}s, quantity {}",
        trader.engine.catch_up.as_str(),
        trader.engine.misfire_grace.num_seconds(),
        trader.engine.quantity
    );
    println!(
        "  retry {} attempts, backoff {}s..{}s",
        trader.retry.max_attempts,
        trader.retry.initial_backoff.as_secs(),
        trader.retry.max_backoff.as_secs()
    );
    Ok(())
}
