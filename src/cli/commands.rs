//! Command handlers. Each one wires core components and prints results.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Utc};
use rust_decimal::Decimal;

use super::{
    AlertCommand, AlertsArgs, AnalyzeArgs, Cli, Command, DbArgs, DbCommand, IngestArgs,
    LiquidityArgs, OrdersArgs, PortfolioArgs, ScanArgs, SentimentArgs, ThesisArgs, ThesisCommand,
};
use crate::app::{App, Config};
use crate::core::agent::synthesizer::MockSynthesizer;
use crate::core::agent::{Orchestrator, OrchestratorConfig, ResearchMode};
use crate::core::agent::research_http::HttpResearchProvider;
use crate::core::db;
use crate::core::domain::{
    Alert, AlertKind, Direction, EventTicker, PriceUnits, Thesis, ThesisId, ThesisStatus, Ticker,
};
use crate::core::exchange::MarketApi;
use crate::core::ingest::{IngestPipeline, IngestStage, RunMode};
use crate::core::liquidity;
use crate::core::portfolio::Portfolio;
use crate::core::scanner::{self, QualityProfile};
use crate::core::service::alerts as alert_service;
use crate::core::service::{ConsoleNotifier, Notifier, ShutdownSignal};
use crate::error::{ConfigError, Error, Result};

/// Dispatch the parsed invocation.
pub async fn execute(cli: Cli, shutdown: ShutdownSignal) -> Result<()> {
    let mut config = Config::load(&cli.config)?;
    if let Some(db_path) = cli.db {
        config.database = db_path;
    }
    if cli.json_logs {
        config.logging.format = "json".into();
    }
    config.logging.init();

    match cli.command {
        Command::Db(args) => run_db(&config, args),
        Command::Ingest(args) => run_ingest(config, args, shutdown).await,
        Command::Scan(args) => run_scan(config, args, shutdown).await,
        Command::Liquidity(args) => run_liquidity(config, args, shutdown).await,
        Command::Portfolio(args) => run_portfolio(config, args, shutdown).await,
        Command::Analyze(args) => run_analyze(config, args, shutdown).await,
        Command::Orders(args) => run_orders(config, args, shutdown).await,
        Command::Alerts(args) => run_alerts(config, args, shutdown),
        Command::Sentiment(args) => run_sentiment(config, args, shutdown),
        Command::Thesis(args) => run_thesis(config, args, shutdown),
    }
}

fn run_db(config: &Config, args: DbArgs) -> Result<()> {
    let pool = db::create_pool(&config.database)?;
    match args.command {
        DbCommand::Migrate => {
            db::run_migrations(&pool)?;
            println!("migrations up to date");
        }
        DbCommand::Prune {
            older_than_days,
            apply,
        } => {
            let cutoff = Utc::now() - ChronoDuration::days(i64::from(older_than_days));
            let report = db::prune(&pool, cutoff, apply)?;
            let verb = if report.applied { "deleted" } else { "would delete" };
            println!(
                "{verb}: {} price snapshots, {} orderbook snapshots, {} news items",
                report.price_snapshots, report.orderbook_snapshots, report.news_items
            );
            if !report.applied {
                println!("(dry run; pass --apply to delete)");
            }
        }
        DbCommand::Vacuum => {
            db::reclaim(&pool)?;
            println!("store compacted");
        }
        DbCommand::Recover { target } => {
            db::recover_to(&pool, &target)?;
            println!("compacted copy written to {target}");
        }
    }
    Ok(())
}

async fn run_ingest(config: Config, args: IngestArgs, shutdown: ShutdownSignal) -> Result<()> {
    let mut app = App::bootstrap(config, shutdown.clone())?;
    if let Some(period) = args.period {
        app.config.ingest.period_secs = period;
    }

    let mut ingest_config = app.ingest_config();
    if let Some(ref stages) = args.stages {
        ingest_config.stages = stages
            .split(',')
            .map(|s| {
                IngestStage::parse(s.trim()).ok_or_else(|| {
                    Error::Config(ConfigError::InvalidValue {
                        field: "stages",
                        value: s.trim().to_string(),
                    })
                })
            })
            .collect::<Result<Vec<_>>>()?;
    }

    let pipeline = IngestPipeline::new(
        app.api.clone(),
        app.ingest_stores(),
        ingest_config,
        shutdown,
    );
    let mode = if args.once {
        RunMode::Once
    } else {
        RunMode::Continuous
    };
    pipeline.run(mode).await
}

async fn run_scan(config: Config, args: ScanArgs, shutdown: ShutdownSignal) -> Result<()> {
    let app = App::bootstrap(config, shutdown)?;
    let profile = QualityProfile::by_name(&args.profile).ok_or_else(|| {
        Error::Config(ConfigError::InvalidValue {
            field: "profile",
            value: args.profile.clone(),
        })
    })?;
    let mut scan_config = app.config.scanner.clone();
    scan_config.limit = args.limit;
    scan_config.include_unpriced_new = args.include_unpriced;

    let markets = app.markets.list(None)?;
    let now = Utc::now();

    match args.mode.as_str() {
        "close-race" => print_hits(&scanner::close_race(&markets, &profile, &scan_config)),
        "high-volume" => print_hits(&scanner::high_volume(&markets, &profile, &scan_config)),
        "wide-spread" => print_hits(&scanner::wide_spread(&markets, &profile, &scan_config)),
        "expiring-soon" => print_hits(&scanner::expiring_soon(
            &markets,
            now,
            &profile,
            &scan_config,
        )),
        "new-markets" => print_hits(&scanner::new_markets(&markets, now, &profile, &scan_config)),
        "movers" => {
            let cutoff = now - ChronoDuration::seconds(scan_config.movers_period_secs);
            let mut prior = HashMap::new();
            for market in &markets {
                if let Some(snapshot) =
                    app.snapshots.latest_at_or_before(&market.ticker, cutoff)?
                {
                    prior.insert(market.ticker.clone(), snapshot);
                }
            }
            print_hits(&scanner::movers(&markets, &prior, &profile, &scan_config));
        }
        "arbitrage" => {
            let groups: Vec<Vec<crate::core::domain::Market>> =
                if let Some(ref tickers) = args.tickers {
                    let wanted: Vec<Ticker> =
                        tickers.split(',').map(|t| Ticker::from(t.trim())).collect();
                    vec![markets
                        .iter()
                        .filter(|m| wanted.contains(&m.ticker))
                        .cloned()
                        .collect()]
                } else if let Some(ref event) = args.event {
                    vec![app.markets.markets_by_event(&EventTicker::from(event.as_str()))?]
                } else {
                    // Group all stored markets by event.
                    let mut by_event: HashMap<String, Vec<crate::core::domain::Market>> =
                        HashMap::new();
                    for market in markets {
                        by_event
                            .entry(market.event_ticker.to_string())
                            .or_default()
                            .push(market);
                    }
                    by_event.into_values().collect()
                };

            let hits = scanner::arbitrage(&groups, scan_config.arbitrage_epsilon);
            if hits.is_empty() {
                println!("no mispriced complement sets found");
            }
            for hit in hits {
                println!(
                    "edge {:.3}  sum(yes) {:.3}  {}",
                    hit.edge,
                    hit.total_yes,
                    hit.tickers
                        .iter()
                        .map(Ticker::as_str)
                        .collect::<Vec<_>>()
                        .join(" + ")
                );
            }
        }
        other => {
            return Err(Error::Config(ConfigError::InvalidValue {
                field: "mode",
                value: other.to_string(),
            }))
        }
    }
    Ok(())
}

fn print_hits(hits: &[scanner::ScanHit]) {
    if hits.is_empty() {
        println!("no matches");
        return;
    }
    for hit in hits {
        let mid = hit
            .midpoint
            .map(|m| format!("{m:.2}"))
            .unwrap_or_else(|| "--".into());
        let label = hit.label.as_deref().unwrap_or("");
        println!(
            "{:<32} mid {mid}  vol24h {:>8}  score {:.3} {label}",
            hit.ticker, hit.volume_24h, hit.score
        );
    }
}

async fn run_liquidity(config: Config, args: LiquidityArgs, shutdown: ShutdownSignal) -> Result<()> {
    let app = App::bootstrap(config, shutdown)?;
    let ticker = Ticker::from(args.ticker.as_str());

    let market = app
        .api
        .market(&ticker)
        .await
        .map_err(|e| match e {
            Error::NotFound(_) => Error::NotFound(format!("market {ticker} not found")),
            other => other,
        })?;
    let book = app.api.orderbook(&ticker, args.depth).await?;
    app.snapshots.store_orderbook(&book)?;

    let analysis = liquidity::analyze(&market, &book, &app.config.liquidity);
    println!("{ticker}: score {} ({})", analysis.score, analysis.grade);
    println!(
        "depth: weighted {:.0}, yes {} / no {} contracts, imbalance {:+.2}",
        analysis.depth.weighted_score,
        analysis.depth.yes_contracts,
        analysis.depth.no_contracts,
        analysis.depth.imbalance
    );
    println!("max safe size (buy yes): {} contracts", analysis.max_safe_size);
    for estimate in &analysis.slippage_table {
        println!(
            "  buy {:>5}: filled {:>5}, avg {:.1}c, slippage {:.2}c, {} level(s)",
            estimate.requested,
            estimate.filled,
            estimate.avg_fill_cents,
            estimate.slippage_cents,
            estimate.levels_crossed
        );
    }
    for warning in &analysis.warnings {
        println!("warning: {warning}");
    }
    Ok(())
}

async fn run_portfolio(config: Config, args: PortfolioArgs, shutdown: ShutdownSignal) -> Result<()> {
    let app = App::bootstrap(config, shutdown.clone())?;

    if args.sync {
        let pipeline = IngestPipeline::new(
            app.api.clone(),
            app.ingest_stores(),
            {
                let mut c = app.ingest_config();
                c.stages = vec![IngestStage::SyncFills, IngestStage::SyncSettlements];
                c
            },
            shutdown,
        );
        pipeline.run(RunMode::Once).await?;
    }

    let fills = app.fills.all_ordered()?;
    if fills.is_empty() {
        println!("no fills recorded; run `edgewatch portfolio --sync` with credentials");
        return Ok(());
    }

    let mut portfolio = Portfolio::from_fills(fills);
    for settlement in app.settlements.all()? {
        portfolio.apply_settlement(&settlement);
    }

    // Mark open positions, preferring a live orderbook midpoint and falling
    // back to the latest stored snapshot.
    let mut marks = HashMap::new();
    for position in portfolio.positions() {
        let live_mid = match app.api.orderbook(&position.ticker, 8).await {
            Ok(book) => book.midpoint_cents().map(|c| c / 100.0),
            Err(_) => None,
        };
        let mid = match live_mid {
            Some(mid) => Some(mid),
            None => app
                .snapshots
                .latest(&position.ticker)?
                .and_then(|s| s.midpoint()),
        };
        if let Some(mid) = mid {
            marks.insert(
                position.ticker.clone(),
                PriceUnits::from_units((mid * 10_000.0).round() as i64),
            );
        }
    }

    for position in portfolio.positions() {
        let avg = position
            .avg_cost()
            .map(|p| format!("{p}"))
            .unwrap_or_else(|| "--".into());
        let unrealized = marks
            .get(&position.ticker)
            .map(|mark| format!("{:.2}", position.unrealized_units(*mark) as f64 / 10_000.0))
            .unwrap_or_else(|| "--".into());
        println!(
            "{:<32} {} x{:<6} avg {avg}  realized ${:.2}  unrealized ${unrealized}",
            position.ticker,
            position.side.as_str(),
            position.open_quantity(),
            position.realized_pnl_units as f64 / 10_000.0,
        );
    }
    println!(
        "totals: realized ${:.2}, unrealized ${:.2}, fees ${:.2}",
        portfolio.realized_units() as f64 / 10_000.0,
        portfolio.unrealized_units(&marks) as f64 / 10_000.0,
        portfolio.fees_units() as f64 / 10_000.0,
    );
    Ok(())
}

async fn run_analyze(config: Config, args: AnalyzeArgs, shutdown: ShutdownSignal) -> Result<()> {
    let app = App::bootstrap(config, shutdown.clone())?;
    let ticker = Ticker::from(args.ticker.as_str());

    let mut orchestrator_config = OrchestratorConfig {
        budget_usd: app.config.agent.budget_usd,
        liquidity: app.config.liquidity.clone(),
        ..OrchestratorConfig::default()
    };
    let mode = args.mode.unwrap_or_else(|| app.config.agent.mode.clone());
    orchestrator_config.mode = ResearchMode::parse(&mode).ok_or_else(|| {
        Error::Config(ConfigError::InvalidValue {
            field: "mode",
            value: mode.clone(),
        })
    })?;
    if let Some(ref budget) = args.budget {
        orchestrator_config.budget_usd = Decimal::from_str(budget).map_err(|_| {
            Error::Config(ConfigError::InvalidValue {
                field: "budget",
                value: budget.clone(),
            })
        })?;
    }

    let synthesizer = if args.dry_run {
        Arc::new(MockSynthesizer) as Arc<dyn crate::core::agent::Synthesizer>
    } else {
        app.build_synthesizer()?
    };
    let research = Arc::new(HttpResearchProvider::from_env(Some(
        app.config.agent.cache_dir.clone().into(),
    ))?);

    let orchestrator = Orchestrator::new(
        app.api.clone(),
        research,
        synthesizer,
        app.predictions.clone(),
        app.theses.clone(),
        orchestrator_config,
        shutdown,
    );
    let result = orchestrator.run(&ticker).await?;

    // Keep the sources on file for later review.
    let news = crate::core::store::NewsStore::new(app.pool.clone());
    let now = Utc::now();
    let items: Vec<crate::core::domain::NewsItem> = result
        .analysis
        .citations
        .iter()
        .map(|url| crate::core::domain::NewsItem {
            ticker: Some(ticker.clone()),
            url: url.clone(),
            title: String::new(),
            published_at: None,
            fetched_at: now,
        })
        .collect();
    news.insert_batch(&items)?;

    if result.escalated {
        ConsoleNotifier.notify(&crate::core::service::NotifyEvent::EscalationSuggested {
            ticker: ticker.clone(),
            reason: result
                .verification
                .calibration_note
                .clone()
                .unwrap_or_else(|| "verification suggested escalation".into()),
        });
    }

    println!(
        "{ticker}: predicted {:.3} ({} confidence)",
        result.analysis.predicted_probability,
        result.analysis.confidence.as_str()
    );
    println!("reasoning: {}", result.analysis.reasoning);
    for factor in &result.analysis.factors {
        println!("  - {}", factor.text);
    }
    println!(
        "verification: passed={} grounding={:.2} escalate={}",
        result.verification.passed, result.verification.grounding_score, result.escalated
    );
    println!("cost: ${}", result.total_cost_usd);
    Ok(())
}

async fn run_orders(config: Config, args: OrdersArgs, shutdown: ShutdownSignal) -> Result<()> {
    use crate::core::exchange::paging::collect_pages;
    use crate::core::store::OrderStore;

    let app = App::bootstrap(config, shutdown)?;
    let orders = OrderStore::new(app.pool.clone());

    if args.sync {
        let api = app.api.clone();
        let collected = collect_pages("get_orders", None, Some(app.config.ingest.max_pages), |c| {
            let api = api.clone();
            async move { api.orders_page(c, 200).await }
        })
        .await?;
        orders.upsert_batch(&collected.items)?;
        println!("{} orders synced", collected.items.len());
    }

    for order in orders.list()? {
        println!(
            "{}  {:<32} {} {} {}c x{} ({} open)  {}",
            order.order_id,
            order.ticker,
            order.side.as_str(),
            order.action.as_str(),
            order.yes_price_cents,
            order.count,
            order.remaining_count,
            order.status
        );
    }
    Ok(())
}

fn run_sentiment(config: Config, args: SentimentArgs, shutdown: ShutdownSignal) -> Result<()> {
    use crate::core::domain::SentimentScore;
    use crate::core::store::SentimentStore;

    let app = App::bootstrap(config, shutdown)?;
    let store = SentimentStore::new(app.pool.clone());
    store.upsert(&SentimentScore {
        ticker: Ticker::from(args.ticker.as_str()),
        scored_at: Utc::now(),
        score: args.score,
        source: args.source,
    })?;
    println!("sentiment recorded for {}", args.ticker);
    Ok(())
}

fn run_alerts(config: Config, args: AlertsArgs, shutdown: ShutdownSignal) -> Result<()> {
    let app = App::bootstrap(config, shutdown)?;
    match args.command {
        AlertCommand::Add {
            kind,
            ticker,
            threshold,
            direction,
        } => {
            let kind = AlertKind::parse(&kind).ok_or_else(|| {
                Error::Config(ConfigError::InvalidValue {
                    field: "kind",
                    value: kind.clone(),
                })
            })?;
            let direction = Direction::parse(&direction).ok_or_else(|| {
                Error::Config(ConfigError::InvalidValue {
                    field: "direction",
                    value: direction.clone(),
                })
            })?;
            let threshold = Decimal::from_str(&threshold).map_err(|_| {
                Error::Config(ConfigError::InvalidValue {
                    field: "threshold",
                    value: threshold.clone(),
                })
            })?;
            let alert = Alert::new(kind, Ticker::from(ticker.as_str()), threshold, direction);
            app.alerts.save(&alert)?;
            println!("alert {} created", alert.id);
        }
        AlertCommand::List { all } => {
            for alert in app.alerts.list(!all)? {
                println!(
                    "{}  {} {} {} {}  {}",
                    alert.id,
                    alert.kind.as_str(),
                    alert.ticker,
                    alert.direction.as_str(),
                    alert.threshold,
                    if alert.active { "active" } else { "inactive" }
                );
            }
        }
        AlertCommand::Rm { id } => {
            let removed = app
                .alerts
                .delete(&crate::core::domain::AlertId::from(id.as_str()))?;
            if !removed {
                return Err(Error::NotFound(format!("no alert with id {id}")));
            }
            println!("alert removed");
        }
        AlertCommand::Check => {
            use crate::core::store::SentimentStore;

            let alerts = app.alerts.list(true)?;
            let markets: HashMap<Ticker, crate::core::domain::Market> = app
                .markets
                .list(None)?
                .into_iter()
                .map(|m| (m.ticker.clone(), m))
                .collect();

            let sentiment_store = SentimentStore::new(app.pool.clone());
            let mut sentiment = HashMap::new();
            for alert in &alerts {
                if let Some(score) = sentiment_store.latest(&alert.ticker)? {
                    sentiment.insert(alert.ticker.clone(), score);
                }
            }

            let evaluations = alert_service::evaluate(&alerts, &markets, &sentiment);
            let fired = alert_service::notify_triggered(&evaluations, &ConsoleNotifier);
            println!("{} of {} alerts triggered", fired, evaluations.len());
        }
    }
    Ok(())
}

fn run_thesis(config: Config, args: ThesisArgs, shutdown: ShutdownSignal) -> Result<()> {
    let app = App::bootstrap(config, shutdown)?;
    match args.command {
        ThesisCommand::Add {
            title,
            markets,
            your_probability,
            market_probability,
            confidence,
        } => {
            let markets = markets
                .split(',')
                .map(|t| Ticker::from(t.trim()))
                .collect::<Vec<_>>();
            let thesis = Thesis::draft(
                title,
                markets,
                your_probability,
                market_probability,
                confidence,
            );
            app.theses.save(&thesis)?;
            println!("thesis {} drafted", thesis.id);
        }
        ThesisCommand::List => {
            for thesis in app.theses.list(None)? {
                println!(
                    "{}  [{}] {} (your {:.2} vs market {:.2})",
                    thesis.id,
                    thesis.status.as_str(),
                    thesis.title,
                    thesis.your_probability,
                    thesis.market_probability
                );
            }
        }
        ThesisCommand::Activate { id } => {
            set_thesis_status(&app, &id, ThesisStatus::Active)?;
            println!("thesis activated");
        }
        ThesisCommand::Void { id } => {
            set_thesis_status(&app, &id, ThesisStatus::Void)?;
            println!("thesis voided");
        }
    }
    Ok(())
}

fn set_thesis_status(app: &App, id: &str, status: ThesisStatus) -> Result<()> {
    let id = ThesisId::from(id);
    let mut thesis = app
        .theses
        .find(&id)?
        .ok_or_else(|| Error::NotFound(format!("no thesis with id {id}")))?;
    thesis.status = status;
    thesis.updated_at = Utc::now();
    app.theses.save(&thesis)
}
