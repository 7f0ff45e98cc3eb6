use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::watch;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use kite_intraday::core::{Clock, Config, MarketClock, Symbol};
use kite_intraday::engine::{Engine, EngineSettings, PositionBook};
use kite_intraday::exchanges::KiteGateway;
use kite_intraday::exclusions::ExclusionStore;
use kite_intraday::execution::OrderRouter;
use kite_intraday::feeds::Predictions;
use kite_intraday::journal::{JournalSummary, TradeJournal};

#[derive(Parser)]
#[command(name = "kite-intraday")]
#[command(about = "Prediction-driven intraday trading loop for NSE equities", long_about = None)]
struct Cli {
    /// Path to the TOML config
    #[arg(short, long, default_value = "config.toml", env = "KITE_INTRADAY_CONFIG")]
    config: PathBuf,

    /// Synthesize fills instead of sending orders
    #[arg(long, env = "KITE_DRY_RUN")]
    dry_run: bool,

    /// Seconds between in-window cycles
    #[arg(long)]
    poll_seconds: Option<u64>,

    /// Stop after this many loop iterations
    #[arg(long)]
    max_cycles: Option<u64>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the trading loop (default)
    Run,
    /// Print realized P/L from the trade journal
    Summary,
    /// Add a symbol to the exclusion list
    Exclude { symbol: String },
    /// Remove a symbol from the exclusion list
    Include { symbol: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    // Logging needs `log_dir`, so the config is read before the subscriber exists.
    let config = Config::load_or_default(&cli.config)?;
    init_logging(&config.paths.log_dir)?;
    if cli.config.exists() {
        tracing::info!("📋 Loaded config from {}", cli.config.display());
    } else {
        tracing::warn!("⚠️ No config at {}, using defaults", cli.config.display());
    }

    match cli.command.as_ref().unwrap_or(&Command::Run) {
        Command::Run => run(&cli, config).await,
        Command::Summary => summary(&config),
        Command::Exclude { symbol } => {
            let symbol = parse_symbol(symbol)?;
            let store = ExclusionStore::new(&config.paths.exclusions);
            if store.exclude(&symbol)? {
                println!("Excluded {}", symbol);
            } else {
                println!("{} was already excluded", symbol);
            }
            Ok(())
        }
        Command::Include { symbol } => {
            let symbol = parse_symbol(symbol)?;
            let store = ExclusionStore::new(&config.paths.exclusions);
            if store.include(&symbol)? {
                println!("Included {}", symbol);
            } else {
                println!("{} was not excluded", symbol);
            }
            Ok(())
        }
    }
}

/// Console plus a plain-text copy under `log_dir/app.log`.
fn init_logging(log_dir: &Path) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,kite_intraday=debug"));

    std::fs::create_dir_all(log_dir)?;
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_dir.join("app.log"))?;

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true))
        .with(
            fmt::layer()
                .with_ansi(false)
                .with_writer(std::sync::Mutex::new(file)),
        )
        .init();
    Ok(())
}

fn parse_symbol(raw: &str) -> anyhow::Result<Symbol> {
    Symbol::parse(raw).ok_or_else(|| anyhow::anyhow!("invalid symbol {:?}", raw))
}

async fn run(cli: &Cli, config: Config) -> anyhow::Result<()> {
    tracing::info!("🦀 Kite Intraday starting...");

    let session = config.session()?;
    let rules = config.exit_rules()?;
    let clock: Arc<dyn Clock> = Arc::new(MarketClock::new(session.timezone()));
    let today = clock.now().date_naive();

    let (api_key, access_token) = config.kite.credentials()?;
    let gateway = Arc::new(KiteGateway::new(&config.kite, &api_key, &access_token)?);
    let router = OrderRouter::new(gateway, cli.dry_run, config.request_timeout());
    if cli.dry_run {
        tracing::warn!("🧪 Dry-run mode: orders are simulated, nothing is sent");
    }

    let predictions = Predictions::load(&config.paths.predictions)?;
    if !predictions.is_for(today) {
        tracing::warn!(
            file_date = ?predictions.date,
            today = %today,
            "⚠️ Predictions are not dated for today's session"
        );
    }
    tracing::info!(
        count = predictions.symbols.len(),
        symbols = ?predictions.symbols,
        "📋 Loaded predictions"
    );

    let journal = TradeJournal::new(&config.paths.journal);
    let book = PositionBook::replay(&journal.read_all()?, today, &rules, cli.dry_run);
    if !book.is_empty() {
        tracing::info!(
            open = book.len(),
            capital = %book.committed_capital(),
            "♻️ Recovered open positions from journal"
        );
    }

    let poll_interval = config.poll_interval(cli.poll_seconds);
    let settings = EngineSettings {
        session,
        rules,
        poll_interval,
        idle_interval: config.idle_interval(poll_interval),
        max_cycles: cli.max_cycles,
    };

    let (stop_tx, stop_rx) = watch::channel(false);
    let signals = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("🛑 Ctrl-C received, stopping after the current cycle");
            let _ = stop_tx.send(true);
        }
    });

    let mut engine = Engine::new(
        router,
        clock,
        journal,
        ExclusionStore::new(&config.paths.exclusions),
        predictions.symbols,
        settings,
    )
    .with_book(book)
    .with_stop(stop_rx);

    let report = engine.run().await;
    signals.abort();
    let report = report?;

    tracing::info!(
        cycles = report.cycles,
        trading_cycles = report.trading_cycles,
        entries = report.entries,
        exits = report.exits,
        open = report.open_positions,
        "🏁 Trading loop finished"
    );
    if report.open_positions > 0 {
        tracing::warn!(
            open = report.open_positions,
            "Positions left open, they will be recovered from the journal on restart"
        );
    }
    Ok(())
}

fn summary(config: &Config) -> anyhow::Result<()> {
    let journal = TradeJournal::new(&config.paths.journal);
    let records = journal.read_all()?;
    let summary = JournalSummary::from_records(&records);

    println!("Journal: {}", journal.path().display());
    println!(
        "Trades:  {} ({} buys, {} sells)",
        summary.trades, summary.buys, summary.sells
    );
    for (symbol, pnl) in &summary.by_symbol {
        println!("  {:<12} {:>12.2}", symbol.as_str(), pnl);
    }
    println!("Net P/L: {:.2}", summary.net_pnl);
    if summary.simulated > 0 {
        println!(
            "Dry-run: {} fills (net {:.2}, not included above)",
            summary.simulated, summary.simulated_pnl
        );
    }
    Ok(())
}
