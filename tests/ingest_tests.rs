//! Ingestion pipeline behavior against a scripted exchange.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use edgewatch::core::domain::{Settlement, Ticker};
use edgewatch::core::ingest::{IngestConfig, IngestPipeline, IngestStage, IngestStores, RunMode};
use edgewatch::core::service::{ShutdownController, ShutdownSignal};
use edgewatch::core::store::{
    FillStore, MarketStore, PredictionStore, SettlementStore, SnapshotStore, ThesisStore,
};
use edgewatch::error::Error;
use edgewatch::testkit::{
    fill_at, market, memory_pool, numbered_pages, prediction, ScriptedMarketApi,
};

fn stores(pool: edgewatch::core::db::DbPool) -> IngestStores {
    IngestStores {
        markets: Arc::new(MarketStore::new(pool.clone())),
        snapshots: Arc::new(SnapshotStore::new(pool.clone())),
        settlements: Arc::new(SettlementStore::new(pool.clone())),
        fills: Arc::new(FillStore::new(pool.clone())),
        predictions: Arc::new(PredictionStore::new(pool.clone())),
        theses: Arc::new(ThesisStore::new(pool)),
    }
}

fn config(stages: Vec<IngestStage>) -> IngestConfig {
    IngestConfig {
        stages,
        period: Duration::from_secs(60),
        max_pages: Some(10),
        failure_threshold: 2,
        page_limit: 200,
    }
}

#[tokio::test]
async fn full_tick_discovers_markets_and_snapshots_prices() {
    let pool = memory_pool();
    let api = ScriptedMarketApi::new();
    api.push_market_pages(numbered_pages(vec![
        vec![market("MKT-1", Some(40), Some(44)), market("MKT-2", Some(30), Some(34))],
        vec![market("MKT-3", Some(55), Some(59))],
    ]));

    let pipeline = IngestPipeline::new(
        Arc::new(api),
        stores(pool.clone()),
        config(vec![IngestStage::SyncMarkets, IngestStage::Snapshot]),
        ShutdownSignal::never(),
    );
    pipeline.run(RunMode::Once).await.unwrap();

    let markets = MarketStore::new(pool.clone());
    let snapshots = SnapshotStore::new(pool);
    assert_eq!(markets.count().unwrap(), 3);
    assert_eq!(snapshots.count().unwrap(), 3);
    assert!(snapshots.latest(&Ticker::from("MKT-3")).unwrap().is_some());
}

#[tokio::test]
async fn rerunning_a_tick_leaves_the_store_unchanged() {
    let pool = memory_pool();
    let api = Arc::new(ScriptedMarketApi::new());
    api.push_market_pages(numbered_pages(vec![vec![market("MKT-1", Some(40), Some(44))]]));

    let pipeline = IngestPipeline::new(
        api,
        stores(pool.clone()),
        config(vec![IngestStage::SyncMarkets]),
        ShutdownSignal::never(),
    );
    pipeline.run(RunMode::Once).await.unwrap();
    pipeline.run(RunMode::Once).await.unwrap();

    assert_eq!(MarketStore::new(pool).count().unwrap(), 1);
}

#[tokio::test]
async fn mid_stream_failure_keeps_committed_pages() {
    let pool = memory_pool();
    let mut api = ScriptedMarketApi::new();
    api.push_market_pages(numbered_pages(vec![
        vec![market("MKT-1", Some(40), Some(44)), market("MKT-2", Some(30), Some(34))],
        vec![market("MKT-3", Some(55), Some(59))],
    ]));
    api.fail_markets_after = Some(1);

    let pipeline = IngestPipeline::new(
        Arc::new(api),
        stores(pool.clone()),
        config(vec![IngestStage::SyncMarkets]),
        ShutdownSignal::never(),
    );
    let err = pipeline.run(RunMode::Once).await.unwrap_err();
    assert!(matches!(err, Error::Transport(_)));

    // Page 1 landed before the failure.
    assert_eq!(MarketStore::new(pool).count().unwrap(), 2);
}

#[tokio::test(start_paused = true)]
async fn persistent_failure_terminates_the_continuous_loop() {
    let pool = memory_pool();
    let mut api = ScriptedMarketApi::new();
    api.push_market_pages(numbered_pages(vec![vec![market("MKT-1", Some(40), Some(44))]]));
    api.fail_markets_after = Some(0);

    let pipeline = IngestPipeline::new(
        Arc::new(api),
        stores(pool),
        config(vec![IngestStage::SyncMarkets]),
        ShutdownSignal::never(),
    );
    // failure_threshold is 2; the loop must give up rather than spin.
    let err = pipeline.run(RunMode::Continuous).await.unwrap_err();
    assert!(matches!(err, Error::Transport(_)));
}

#[tokio::test]
async fn settlement_sync_resolves_predictions_and_fills_brier() {
    let pool = memory_pool();
    let predictions = PredictionStore::new(pool.clone());
    predictions.insert(&prediction("DONE-1", 0.8)).unwrap();

    let api = ScriptedMarketApi::new();
    api.push_settlement_pages(numbered_pages(vec![vec![Settlement {
        ticker: Ticker::from("DONE-1"),
        settled_at: Utc::now(),
        settlement_value: 1,
        determined_at: None,
    }]]));

    let pipeline = IngestPipeline::new(
        Arc::new(api),
        stores(pool.clone()),
        config(vec![IngestStage::SyncSettlements]),
        ShutdownSignal::never(),
    );
    pipeline.run(RunMode::Once).await.unwrap();

    let (_, log) = predictions
        .for_ticker(&Ticker::from("DONE-1"))
        .unwrap()
        .into_iter()
        .next()
        .unwrap();
    assert_eq!(log.actual_outcome, Some(1));
    assert!((log.brier_score.unwrap() - 0.04).abs() < 1e-12);
}

#[tokio::test]
async fn fills_sync_feeds_portfolio_reconciliation() {
    use edgewatch::core::domain::FillAction;
    use edgewatch::core::portfolio::Portfolio;

    let pool = memory_pool();
    let now = Utc::now();
    let api = ScriptedMarketApi::new();
    api.push_fill_pages(numbered_pages(vec![vec![
        fill_at("f1", "MKT-1", FillAction::Buy, 100, 45, now),
        fill_at("f2", "MKT-1", FillAction::Buy, 50, 50, now + chrono::Duration::seconds(1)),
        fill_at("f3", "MKT-1", FillAction::Sell, 120, 60, now + chrono::Duration::seconds(2)),
    ]]));

    let pipeline = IngestPipeline::new(
        Arc::new(api),
        stores(pool.clone()),
        config(vec![IngestStage::SyncFills]),
        ShutdownSignal::never(),
    );
    pipeline.run(RunMode::Once).await.unwrap();

    let fills = FillStore::new(pool).all_ordered().unwrap();
    let portfolio = Portfolio::from_fills(fills);
    // FIFO: 100*(60-45) + 20*(60-50) = 1700 cents.
    assert_eq!(portfolio.realized_units(), 1700 * 100);
    assert_eq!(portfolio.positions()[0].open_quantity(), 30);
}

#[tokio::test]
async fn cancellation_stops_the_loop_cleanly() {
    let pool = memory_pool();
    let api = Arc::new(ScriptedMarketApi::new());
    api.push_market_pages(numbered_pages(vec![vec![market("MKT-1", Some(40), Some(44))]]));

    let controller = ShutdownController::new();
    let signal = controller.signal();
    controller.trigger();

    let pipeline = IngestPipeline::new(
        api,
        stores(pool),
        config(vec![IngestStage::SyncMarkets]),
        signal,
    );
    // An already-cancelled continuous run exits Ok without work.
    pipeline.run(RunMode::Continuous).await.unwrap();
}
