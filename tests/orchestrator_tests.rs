//! End-to-end orchestrator runs against scripted research and synthesis.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use edgewatch::core::agent::synthesizer::MockSynthesizer;
use edgewatch::core::agent::{Orchestrator, OrchestratorConfig, ResearchMode};
use edgewatch::core::domain::{MarketStatus, RunStatus, Ticker};
use edgewatch::core::service::ShutdownSignal;
use edgewatch::core::store::{PredictionStore, ThesisStore};
use edgewatch::error::Error;
use edgewatch::testkit::{
    book, market, memory_pool, CountingSynthesizer, ScriptedMarketApi, ScriptedResearchProvider,
};

struct Harness {
    orchestrator: Orchestrator,
    predictions: Arc<PredictionStore>,
    research: Arc<ScriptedResearchProvider>,
}

fn harness(
    api: ScriptedMarketApi,
    research: ScriptedResearchProvider,
    config: OrchestratorConfig,
) -> Harness {
    let pool = memory_pool();
    let predictions = Arc::new(PredictionStore::new(pool.clone()));
    let theses = Arc::new(ThesisStore::new(pool));
    let research = Arc::new(research);
    let orchestrator = Orchestrator::new(
        Arc::new(api),
        research.clone(),
        Arc::new(MockSynthesizer),
        predictions.clone(),
        theses,
        config,
        ShutdownSignal::never(),
    );
    Harness {
        orchestrator,
        predictions,
        research,
    }
}

fn scripted_api() -> ScriptedMarketApi {
    let api = ScriptedMarketApi::new();
    let mut m = market("FED-24DEC", Some(48), Some(52));
    m.volume_24h = 10_000;
    m.open_interest = 5_000;
    api.insert_market(m);
    api.insert_book(book(
        "FED-24DEC",
        &[(48, 500), (47, 400)],
        &[(48, 500), (47, 400)],
    ));
    api
}

/// Standard-mode costs sum to $0.05: search 0.02 + contents 0.02 + answer 0.01.
fn standard_cost_research() -> ScriptedResearchProvider {
    ScriptedResearchProvider {
        search_cost: dec!(0.02),
        contents_cost: dec!(0.02),
        answer_cost: dec!(0.01),
        ..ScriptedResearchProvider::default()
    }
}

#[tokio::test]
async fn budget_downshifts_deep_to_standard() {
    // Budget $0.08: deep ($0.15) is skipped, standard ($0.05) runs,
    // leaving $0.03.
    let config = OrchestratorConfig {
        budget_usd: dec!(0.08),
        mode: ResearchMode::Deep,
        synth_estimate: dec!(0.00),
        ..OrchestratorConfig::default()
    };
    let h = harness(scripted_api(), standard_cost_research(), config);

    let result = h.orchestrator.run(&Ticker::from("FED-24DEC")).await.unwrap();

    assert_eq!(h.research.task_calls.load(Ordering::SeqCst), 0, "deep must not start");
    assert_eq!(h.research.search_calls.load(Ordering::SeqCst), 1);
    assert_eq!(result.total_cost_usd, dec!(0.05));
}

#[tokio::test]
async fn budget_too_small_for_any_mode_is_refused_up_front() {
    let config = OrchestratorConfig {
        budget_usd: dec!(0.001),
        mode: ResearchMode::Fast,
        ..OrchestratorConfig::default()
    };
    let h = harness(scripted_api(), ScriptedResearchProvider::new(), config);

    let err = h.orchestrator.run(&Ticker::from("FED-24DEC")).await.unwrap_err();
    assert!(matches!(err, Error::BudgetExceeded { .. }));
    // No research dollar was spent.
    assert_eq!(h.research.search_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn deep_mode_polls_to_completion_when_funded() {
    let research = ScriptedResearchProvider {
        deep_polls: 3,
        ..ScriptedResearchProvider::default()
    };
    let config = OrchestratorConfig {
        budget_usd: dec!(1.00),
        mode: ResearchMode::Deep,
        ..OrchestratorConfig::default()
    };
    let h = harness(scripted_api(), research, config);

    let result = h.orchestrator.run(&Ticker::from("FED-24DEC")).await.unwrap();
    assert_eq!(h.research.task_calls.load(Ordering::SeqCst), 1);
    assert!(result.total_cost_usd >= dec!(0.15));
}

#[tokio::test]
async fn missing_market_fails_fast_and_persists_diagnostic() {
    let config = OrchestratorConfig::default();
    let h = harness(ScriptedMarketApi::new(), ScriptedResearchProvider::new(), config);

    let err = h.orchestrator.run(&Ticker::from("GONE")).await.unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));

    let rows = h.predictions.for_ticker(&Ticker::from("GONE")).unwrap();
    assert_eq!(rows.len(), 1);
    let (_, log) = &rows[0];
    assert_eq!(log.status, RunStatus::Failed);
    assert!(log.diagnostic.as_deref().unwrap().contains("not found"));
}

#[tokio::test]
async fn settled_market_is_rejected_before_any_spend() {
    let api = ScriptedMarketApi::new();
    let mut m = market("OLD-1", Some(48), Some(52));
    m.status = MarketStatus::Settled;
    api.insert_market(m);

    let h = harness(api, ScriptedResearchProvider::new(), OrchestratorConfig::default());
    let err = h.orchestrator.run(&Ticker::from("OLD-1")).await.unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
    assert_eq!(h.research.search_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn successful_run_persists_a_prediction_row() {
    let config = OrchestratorConfig {
        budget_usd: dec!(1.00),
        mode: ResearchMode::Fast,
        ..OrchestratorConfig::default()
    };
    let h = harness(scripted_api(), ScriptedResearchProvider::new(), config);

    let result = h.orchestrator.run(&Ticker::from("FED-24DEC")).await.unwrap();

    let rows = h.predictions.for_ticker(&Ticker::from("FED-24DEC")).unwrap();
    assert_eq!(rows.len(), 1);
    let (_, log) = &rows[0];
    assert_eq!(log.status, RunStatus::Ok);
    assert!((log.predicted_prob - result.analysis.predicted_probability).abs() < 1e-12);
    assert!(log.market_prob_at_time.is_some());
    assert!(log.actual_outcome.is_none());
}

#[tokio::test]
async fn one_schema_violation_is_retried_then_succeeds() {
    let pool = memory_pool();
    let predictions = Arc::new(PredictionStore::new(pool.clone()));
    let theses = Arc::new(ThesisStore::new(pool));
    let synthesizer = Arc::new(CountingSynthesizer::new(MockSynthesizer, 1));

    let orchestrator = Orchestrator::new(
        Arc::new(scripted_api()),
        Arc::new(ScriptedResearchProvider::new()),
        synthesizer.clone(),
        predictions,
        theses,
        OrchestratorConfig {
            budget_usd: dec!(1.00),
            mode: ResearchMode::Fast,
            ..OrchestratorConfig::default()
        },
        ShutdownSignal::never(),
    );

    orchestrator.run(&Ticker::from("FED-24DEC")).await.unwrap();
    assert_eq!(synthesizer.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn two_schema_violations_surface_as_invalid_output() {
    let pool = memory_pool();
    let predictions = Arc::new(PredictionStore::new(pool.clone()));
    let theses = Arc::new(ThesisStore::new(pool));
    let synthesizer = Arc::new(CountingSynthesizer::new(MockSynthesizer, 2));

    let orchestrator = Orchestrator::new(
        Arc::new(scripted_api()),
        Arc::new(ScriptedResearchProvider::new()),
        synthesizer.clone(),
        predictions.clone(),
        theses,
        OrchestratorConfig {
            budget_usd: dec!(1.00),
            mode: ResearchMode::Fast,
            ..OrchestratorConfig::default()
        },
        ShutdownSignal::never(),
    );

    let err = orchestrator.run(&Ticker::from("FED-24DEC")).await.unwrap_err();
    assert!(matches!(err, Error::SynthesizerInvalidOutput(_)));
    assert_eq!(synthesizer.calls.load(Ordering::SeqCst), 2);

    // The failure is persisted with a diagnostic.
    let rows = predictions.for_ticker(&Ticker::from("FED-24DEC")).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].1.status, RunStatus::Failed);
}

#[tokio::test]
async fn thin_sourcing_suggests_escalation() {
    // A single source forces low confidence from the mock synthesizer,
    // which always escalates.
    let research = ScriptedResearchProvider {
        urls: vec!["https://news.example/only".into()],
        ..ScriptedResearchProvider::default()
    };
    let config = OrchestratorConfig {
        budget_usd: dec!(1.00),
        mode: ResearchMode::Fast,
        ..OrchestratorConfig::default()
    };
    let h = harness(scripted_api(), research, config);

    let result = h.orchestrator.run(&Ticker::from("FED-24DEC")).await.unwrap();
    assert!(result.escalated);
    assert!(result.verification.suggested_escalation);
}

#[tokio::test]
async fn total_cost_never_exceeds_budget() {
    let budget = dec!(0.06);
    let config = OrchestratorConfig {
        budget_usd: budget,
        mode: ResearchMode::Deep,
        synth_estimate: Decimal::ZERO,
        ..OrchestratorConfig::default()
    };
    let h = harness(scripted_api(), standard_cost_research(), config);

    let result = h.orchestrator.run(&Ticker::from("FED-24DEC")).await.unwrap();
    assert!(
        result.total_cost_usd <= budget,
        "spent {} over budget {budget}",
        result.total_cost_usd
    );
}
