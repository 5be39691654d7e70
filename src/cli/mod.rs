//! Thin command-line adapter over the core.
//!
//! Handlers parse flags, call into `core`, and print. No business logic
//! lives here. Exit codes: 0 success, 1 user error, 2 system error.

mod commands;

pub use commands::execute;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "edgewatch", version, about = "Prediction market research and decision support")]
pub struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, global = true, default_value = "edgewatch.toml")]
    pub config: String,

    /// Override the database path.
    #[arg(long, global = true)]
    pub db: Option<String>,

    /// Emit JSON logs.
    #[arg(long, global = true)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Database maintenance.
    Db(DbArgs),
    /// Run the ingestion scheduler.
    Ingest(IngestArgs),
    /// Scan stored markets for opportunities.
    Scan(ScanArgs),
    /// Analyze a market's orderbook liquidity.
    Liquidity(LiquidityArgs),
    /// Reconcile fills into positions and P&L.
    Portfolio(PortfolioArgs),
    /// Run the research agent for one market.
    Analyze(AnalyzeArgs),
    /// List (and optionally refresh) exchange orders.
    Orders(OrdersArgs),
    /// Manage alerts.
    Alerts(AlertsArgs),
    /// Record an externally derived sentiment reading.
    Sentiment(SentimentArgs),
    /// Manage research theses.
    Thesis(ThesisArgs),
}

#[derive(Debug, Args)]
pub struct OrdersArgs {
    /// Refresh orders from the API first.
    #[arg(long)]
    pub sync: bool,
}

#[derive(Debug, Args)]
pub struct SentimentArgs {
    pub ticker: String,
    /// Signed score, conventionally in [-1, 1].
    pub score: f64,
    #[arg(long, default_value = "manual")]
    pub source: String,
}

#[derive(Debug, Args)]
pub struct DbArgs {
    #[command(subcommand)]
    pub command: DbCommand,
}

#[derive(Debug, Subcommand)]
pub enum DbCommand {
    /// Apply pending migrations.
    Migrate,
    /// Delete snapshots and news older than the cutoff (dry-run by default).
    Prune {
        /// Age cutoff in days.
        #[arg(long, default_value_t = 90)]
        older_than_days: u32,
        /// Actually delete instead of reporting counts.
        #[arg(long)]
        apply: bool,
    },
    /// Compact the store in place.
    Vacuum,
    /// Write a compacted copy to a new file.
    Recover {
        target: String,
    },
}

#[derive(Debug, Args)]
pub struct IngestArgs {
    /// Run a single pass and exit.
    #[arg(long)]
    pub once: bool,
    /// Comma-separated stages (sync-markets,snapshot,sync-settlements,sync-fills).
    #[arg(long)]
    pub stages: Option<String>,
    /// Override the tick period, in seconds.
    #[arg(long)]
    pub period: Option<u64>,
}

#[derive(Debug, Args)]
pub struct ScanArgs {
    /// Mode: close-race, high-volume, wide-spread, expiring-soon, movers,
    /// arbitrage, new-markets.
    pub mode: String,
    /// Quality profile: early, standard, strict.
    #[arg(long, default_value = "standard")]
    pub profile: String,
    /// Include unpriced listings in new-markets.
    #[arg(long)]
    pub include_unpriced: bool,
    /// Tickers for an explicit arbitrage set.
    #[arg(long)]
    pub tickers: Option<String>,
    /// Event ticker to scan for arbitrage.
    #[arg(long)]
    pub event: Option<String>,
    #[arg(long, default_value_t = 25)]
    pub limit: usize,
}

#[derive(Debug, Args)]
pub struct LiquidityArgs {
    pub ticker: String,
    /// Orderbook depth to request (0 = all levels).
    #[arg(long, default_value_t = 0)]
    pub depth: u32,
}

#[derive(Debug, Args)]
pub struct PortfolioArgs {
    /// Refresh fills and settlements from the API first.
    #[arg(long)]
    pub sync: bool,
}

#[derive(Debug, Args)]
pub struct AnalyzeArgs {
    pub ticker: String,
    /// Research mode: fast, standard, deep.
    #[arg(long)]
    pub mode: Option<String>,
    /// Budget in dollars for this run.
    #[arg(long)]
    pub budget: Option<String>,
    /// Use the mock synthesizer regardless of SYNTHESIZER_BACKEND.
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Debug, Args)]
pub struct AlertsArgs {
    #[command(subcommand)]
    pub command: AlertCommand,
}

#[derive(Debug, Subcommand)]
pub enum AlertCommand {
    /// Create an alert.
    Add {
        /// price, volume, spread, or sentiment.
        kind: String,
        ticker: String,
        threshold: String,
        /// above or below.
        direction: String,
    },
    /// List alerts.
    List {
        #[arg(long)]
        all: bool,
    },
    /// Delete an alert by id.
    Rm {
        id: String,
    },
    /// Evaluate active alerts against stored market state.
    Check,
}

#[derive(Debug, Args)]
pub struct ThesisArgs {
    #[command(subcommand)]
    pub command: ThesisCommand,
}

#[derive(Debug, Subcommand)]
pub enum ThesisCommand {
    /// Draft a thesis.
    Add {
        title: String,
        /// Comma-separated market tickers.
        #[arg(long)]
        markets: String,
        #[arg(long)]
        your_probability: f64,
        #[arg(long)]
        market_probability: f64,
        #[arg(long, default_value_t = 0.5)]
        confidence: f64,
    },
    /// List theses.
    List,
    /// Mark a thesis active.
    Activate {
        id: String,
    },
    /// Void a thesis.
    Void {
        id: String,
    },
}
