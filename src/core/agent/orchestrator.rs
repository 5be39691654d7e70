//! The agent orchestrator: research, synthesize, verify, persist, under a
//! hard budget.
//!
//! A run walks `Init -> LoadMarket -> Research -> Synthesize -> Verify ->
//! Persist -> Done`, downshifting the research mode when the remaining
//! budget cannot cover a step's estimate. Steps that would exceed budget are
//! never started. Terminal failures persist a `failed` prediction row with
//! a diagnostic.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use tracing::{info, warn};

use super::research::{ContentsOptions, ResearchProvider, ResearchTaskStatus, SearchOptions};
use super::synthesizer::{SynthesisInput, Synthesizer};
use super::verifier::{verify, VerifierConfig};
use crate::core::domain::{
    AnalysisResult, Confidence, Factor, Market, Polarity, PredictionLog, RunId, RunStatus,
    Thesis, Ticker, VerificationReport,
};
use crate::core::exchange::MarketApi;
use crate::core::liquidity::{analyze, Grade, LiquidityConfig};
use crate::core::service::ShutdownSignal;
use crate::core::store::{PredictionStore, ThesisStore};
use crate::error::{Error, Result};

/// Research depth requested for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResearchMode {
    Fast,
    Standard,
    Deep,
}

impl ResearchMode {
    /// The downshift chain, most expensive first.
    #[must_use]
    pub fn chain(self) -> &'static [ResearchMode] {
        match self {
            Self::Deep => &[Self::Deep, Self::Standard, Self::Fast],
            Self::Standard => &[Self::Standard, Self::Fast],
            Self::Fast => &[Self::Fast],
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Fast => "fast",
            Self::Standard => "standard",
            Self::Deep => "deep",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "fast" => Some(Self::Fast),
            "standard" => Some(Self::Standard),
            "deep" => Some(Self::Deep),
            _ => None,
        }
    }
}

/// Orchestrator tuning. Budget enforcement is hard: a step whose estimate
/// exceeds the remaining budget is not started.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub budget_usd: Decimal,
    pub mode: ResearchMode,
    pub fast_estimate: Decimal,
    pub standard_estimate: Decimal,
    pub deep_estimate: Decimal,
    pub synth_estimate: Decimal,
    /// Results requested in fast mode.
    pub fast_results: u32,
    /// Results requested in standard mode.
    pub standard_results: u32,
    /// Documents fetched in standard mode.
    pub top_k_contents: usize,
    pub deep_model: String,
    pub poll_deadline: Duration,
    pub poll_interval: Duration,
    pub verifier: VerifierConfig,
    pub liquidity: LiquidityConfig,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            budget_usd: Decimal::new(50, 2), // $0.50
            mode: ResearchMode::Standard,
            fast_estimate: Decimal::new(1, 2),      // $0.01
            standard_estimate: Decimal::new(5, 2),  // $0.05
            deep_estimate: Decimal::new(15, 2),     // $0.15
            synth_estimate: Decimal::new(2, 2),     // $0.02
            fast_results: 5,
            standard_results: 10,
            top_k_contents: 3,
            deep_model: "exa-research".into(),
            poll_deadline: Duration::from_secs(300),
            poll_interval: Duration::from_secs(5),
            verifier: VerifierConfig::default(),
            liquidity: LiquidityConfig::default(),
        }
    }
}

/// What a completed run returns.
#[derive(Debug, Clone)]
pub struct AgentRunResult {
    pub run_id: RunId,
    pub analysis: AnalysisResult,
    pub verification: VerificationReport,
    pub total_cost_usd: Decimal,
    pub escalated: bool,
}

/// Evidence gathered by the research step.
#[derive(Debug, Clone, Default)]
struct ResearchBundle {
    factors: Vec<Factor>,
    citations: Vec<String>,
    cost: Decimal,
}

/// Tracks spend against the hard budget.
struct Budget {
    total: Decimal,
    spent: Decimal,
}

impl Budget {
    fn new(total: Decimal) -> Self {
        Self {
            total,
            spent: Decimal::ZERO,
        }
    }

    fn remaining(&self) -> Decimal {
        self.total - self.spent
    }

    fn charge(&mut self, cost: Decimal) {
        self.spent += cost;
    }

    /// Refuse to start a step whose estimate exceeds what is left.
    fn check(&self, step: &'static str, estimate: Decimal) -> Result<()> {
        if estimate > self.remaining() {
            return Err(Error::BudgetExceeded {
                step,
                estimate,
                remaining: self.remaining(),
            });
        }
        Ok(())
    }
}

/// Runs the research -> synthesize -> verify pipeline for one ticker.
pub struct Orchestrator {
    api: Arc<dyn MarketApi>,
    research: Arc<dyn ResearchProvider>,
    synthesizer: Arc<dyn Synthesizer>,
    predictions: Arc<PredictionStore>,
    theses: Arc<ThesisStore>,
    config: OrchestratorConfig,
    shutdown: ShutdownSignal,
    /// Single-flight guard: one run per ticker at a time. Runs across
    /// distinct tickers may execute in parallel under the rate limiter.
    in_flight: Mutex<HashSet<String>>,
}

impl Orchestrator {
    pub fn new(
        api: Arc<dyn MarketApi>,
        research: Arc<dyn ResearchProvider>,
        synthesizer: Arc<dyn Synthesizer>,
        predictions: Arc<PredictionStore>,
        theses: Arc<ThesisStore>,
        config: OrchestratorConfig,
        shutdown: ShutdownSignal,
    ) -> Self {
        Self {
            api,
            research,
            synthesizer,
            predictions,
            theses,
            config,
            shutdown,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    /// Run the full pipeline for `ticker`.
    pub async fn run(&self, ticker: &Ticker) -> Result<AgentRunResult> {
        if !self.in_flight.lock().insert(ticker.to_string()) {
            return Err(Error::Validation(format!(
                "an analysis run for {ticker} is already in flight"
            )));
        }
        let result = self.run_guarded(ticker).await;
        self.in_flight.lock().remove(ticker.as_str());

        if let Err(ref err) = result {
            // Terminal failures leave a diagnostic row; cancellation does not.
            if !matches!(err, Error::Cancelled) {
                self.persist_failure(ticker, err);
            }
        }
        result
    }

    async fn run_guarded(&self, ticker: &Ticker) -> Result<AgentRunResult> {
        let run_id = RunId::new();
        let mut budget = Budget::new(self.config.budget_usd);

        // LoadMarket: fail fast on missing or non-trading markets.
        let market = self
            .api
            .market(ticker)
            .await
            .map_err(|e| match e {
                Error::NotFound(_) => Error::NotFound(format!("market {ticker} not found")),
                other => other,
            })?;
        if !market.status.is_trading() {
            return Err(Error::Validation(format!(
                "market {ticker} is not trading (status: {})",
                market.status.as_str()
            )));
        }

        let thesis_context = self.pinned_thesis_context(ticker)?;
        let market_probability = market.midpoint();

        // Research, downshifting to fit the budget.
        let bundle = self.research_step(&market, &mut budget).await?;
        info!(
            ticker = %ticker,
            sources = bundle.citations.len(),
            research_cost = %bundle.cost,
            "research complete"
        );

        // Synthesize, retrying one schema violation.
        budget.check("synthesize", self.config.synth_estimate)?;
        let input = SynthesisInput {
            ticker: ticker.clone(),
            title: market.title.clone(),
            market_probability,
            close_time: market.close_time,
            factors: bundle.factors.clone(),
            citations: bundle.citations.clone(),
            thesis_context,
        };
        let (analysis, synth_cost) = self.synthesize_with_retry(&input).await?;
        budget.charge(synth_cost);

        // Verify (advisory).
        let grade = self.liquidity_grade(&market).await;
        let verification = verify(
            &analysis,
            market_probability,
            grade,
            &self.config.verifier,
        );
        if !verification.passed {
            warn!(
                ticker = %ticker,
                grounding = verification.grounding_score,
                issues = verification.consistency_issues.len(),
                "verification flagged the analysis"
            );
        }

        // Persist.
        self.predictions.insert(&PredictionLog {
            ticker: ticker.clone(),
            predicted_prob: analysis.predicted_probability,
            market_prob_at_time: market_probability,
            confidence: analysis.confidence,
            reasoning: analysis.reasoning.clone(),
            factors_json: serde_json::to_string(&analysis.factors)?,
            status: RunStatus::Ok,
            diagnostic: None,
            predicted_at: Utc::now(),
            actual_outcome: None,
            resolved_at: None,
            brier_score: None,
        })?;

        let escalated = verification.suggested_escalation;
        info!(
            ticker = %ticker,
            run_id = %run_id,
            predicted = analysis.predicted_probability,
            cost = %budget.spent,
            escalated,
            "analysis run complete"
        );

        Ok(AgentRunResult {
            run_id,
            analysis,
            verification,
            total_cost_usd: budget.spent,
            escalated,
        })
    }

    fn pinned_thesis_context(&self, ticker: &Ticker) -> Result<Option<String>> {
        let theses = self.theses.active_covering(ticker)?;
        if theses.is_empty() {
            return Ok(None);
        }
        Ok(Some(
            theses
                .iter()
                .map(|t: &Thesis| {
                    format!(
                        "{} (your: {:.2}, market at the time: {:.2})",
                        t.title, t.your_probability, t.market_probability
                    )
                })
                .collect::<Vec<_>>()
                .join("\n"),
        ))
    }

    fn mode_estimate(&self, mode: ResearchMode) -> Decimal {
        match mode {
            ResearchMode::Fast => self.config.fast_estimate,
            ResearchMode::Standard => self.config.standard_estimate,
            ResearchMode::Deep => self.config.deep_estimate,
        }
    }

    /// Pick the deepest affordable mode from the downshift chain and run it.
    async fn research_step(&self, market: &Market, budget: &mut Budget) -> Result<ResearchBundle> {
        let mut selected = None;
        for &mode in self.config.mode.chain() {
            let estimate = self.mode_estimate(mode);
            if estimate <= budget.remaining() {
                selected = Some(mode);
                break;
            }
            info!(
                mode = mode.as_str(),
                estimate = %estimate,
                remaining = %budget.remaining(),
                "downshifting research mode"
            );
        }
        let Some(mode) = selected else {
            return Err(Error::BudgetExceeded {
                step: "research",
                estimate: self.mode_estimate(ResearchMode::Fast),
                remaining: budget.remaining(),
            });
        };

        if self.shutdown.is_cancelled() {
            return Err(Error::Cancelled);
        }

        match mode {
            ResearchMode::Fast => self.research_fast(market, budget).await,
            ResearchMode::Standard => self.research_standard(market, budget).await,
            ResearchMode::Deep => self.research_deep(market, budget).await,
        }
    }

    async fn research_fast(&self, market: &Market, budget: &mut Budget) -> Result<ResearchBundle> {
        let response = self
            .research
            .search(&market.title, &SearchOptions::fast(self.config.fast_results))
            .await?;
        budget.charge(response.cost_dollars);

        let mut bundle = ResearchBundle {
            cost: response.cost_dollars,
            ..ResearchBundle::default()
        };
        for result in response.results {
            bundle.factors.push(Factor {
                text: result
                    .snippet
                    .clone()
                    .unwrap_or_else(|| result.title.clone()),
                polarity: Polarity::Neutral,
                citation_urls: vec![result.url.clone()],
            });
            bundle.citations.push(result.url);
        }
        Ok(bundle)
    }

    async fn research_standard(
        &self,
        market: &Market,
        budget: &mut Budget,
    ) -> Result<ResearchBundle> {
        let mut bundle = self.search_into_bundle(market, budget).await?;

        // Read the top documents in full.
        let top: Vec<String> = bundle
            .citations
            .iter()
            .take(self.config.top_k_contents)
            .cloned()
            .collect();
        if !top.is_empty() {
            let contents = self
                .research
                .get_contents(&top, &ContentsOptions::default())
                .await?;
            budget.charge(contents.cost_dollars);
            bundle.cost += contents.cost_dollars;
            for doc in contents.documents {
                if let Some(summary) = doc.summary.or(doc.text) {
                    bundle.factors.push(Factor {
                        text: truncate_text(&summary, 500),
                        polarity: Polarity::Neutral,
                        citation_urls: vec![doc.url],
                    });
                }
            }
        }

        // One direct answer, if the budget still allows it.
        if budget.remaining() >= self.config.fast_estimate {
            let question = format!("What is the latest on: {}?", market.title);
            match self.research.answer(&question).await {
                Ok(answer) => {
                    budget.charge(answer.cost_dollars);
                    bundle.cost += answer.cost_dollars;
                    bundle.factors.push(Factor {
                        text: truncate_text(&answer.answer, 500),
                        polarity: Polarity::Neutral,
                        citation_urls: answer.citations.clone(),
                    });
                    bundle.citations.extend(answer.citations);
                }
                Err(e) => warn!(error = %e, "answer step failed; continuing with search results"),
            }
        }

        bundle.citations.sort();
        bundle.citations.dedup();
        Ok(bundle)
    }

    async fn search_into_bundle(
        &self,
        market: &Market,
        budget: &mut Budget,
    ) -> Result<ResearchBundle> {
        let response = self
            .research
            .search(
                &market.title,
                &SearchOptions::standard(self.config.standard_results),
            )
            .await?;
        budget.charge(response.cost_dollars);

        let mut bundle = ResearchBundle {
            cost: response.cost_dollars,
            ..ResearchBundle::default()
        };
        for result in response.results {
            bundle.citations.push(result.url);
        }
        Ok(bundle)
    }

    async fn research_deep(&self, market: &Market, budget: &mut Budget) -> Result<ResearchBundle> {
        let instructions = format!(
            "Research the prediction market question below and list the strongest \
             bullish and bearish factors with sources.\n\nQuestion: {}",
            market.title
        );
        let task_id = self
            .research
            .start_research_task(&instructions, &self.config.deep_model, None)
            .await?;

        let deadline = tokio::time::Instant::now() + self.config.poll_deadline;
        let mut shutdown = self.shutdown.clone();
        loop {
            if tokio::time::Instant::now() >= deadline {
                return Err(Error::Transport(format!(
                    "research task {task_id} missed its {}s deadline",
                    self.config.poll_deadline.as_secs()
                )));
            }
            tokio::select! {
                () = tokio::time::sleep(self.config.poll_interval) => {}
                () = shutdown.cancelled() => return Err(Error::Cancelled),
            }

            let poll = self.research.poll_research_task(&task_id).await?;
            match poll.status {
                ResearchTaskStatus::Completed => {
                    budget.charge(poll.cost_dollars);
                    let mut bundle = ResearchBundle {
                        cost: poll.cost_dollars,
                        citations: poll.citations.clone(),
                        ..ResearchBundle::default()
                    };
                    if let Some(output) = poll.output {
                        bundle.factors.push(Factor {
                            text: truncate_text(&output, 2000),
                            polarity: Polarity::Neutral,
                            citation_urls: poll.citations,
                        });
                    }
                    return Ok(bundle);
                }
                ResearchTaskStatus::Failed => {
                    budget.charge(poll.cost_dollars);
                    return Err(Error::Transport(format!(
                        "research task {task_id} failed upstream"
                    )));
                }
                ResearchTaskStatus::Pending | ResearchTaskStatus::Running => {}
            }
        }
    }

    async fn synthesize_with_retry(
        &self,
        input: &SynthesisInput,
    ) -> Result<(AnalysisResult, Decimal)> {
        match self.synthesizer.synthesize(input).await {
            Ok(ok) => Ok(ok),
            Err(Error::SynthesizerInvalidOutput(first)) => {
                warn!(error = %first, "synthesizer output invalid; retrying once");
                match self.synthesizer.synthesize(input).await {
                    Ok(ok) => Ok(ok),
                    Err(Error::SynthesizerInvalidOutput(second)) => {
                        Err(Error::SynthesizerInvalidOutput(second))
                    }
                    Err(other) => Err(other),
                }
            }
            Err(other) => Err(other),
        }
    }

    async fn liquidity_grade(&self, market: &Market) -> Option<Grade> {
        match self.api.orderbook(&market.ticker, 0).await {
            Ok(book) => Some(analyze(market, &book, &self.config.liquidity).grade),
            Err(e) => {
                warn!(ticker = %market.ticker, error = %e, "orderbook unavailable for grading");
                None
            }
        }
    }

    fn persist_failure(&self, ticker: &Ticker, err: &Error) {
        let row = PredictionLog {
            ticker: ticker.clone(),
            predicted_prob: 0.0,
            market_prob_at_time: None,
            confidence: Confidence::Low,
            reasoning: String::new(),
            factors_json: "[]".into(),
            status: RunStatus::Failed,
            diagnostic: Some(err.to_string()),
            predicted_at: Utc::now(),
            actual_outcome: None,
            resolved_at: None,
            brier_score: None,
        };
        if let Err(e) = self.predictions.insert(&row) {
            warn!(ticker = %ticker, error = %e, "failed to persist failure diagnostic");
        }
    }
}

fn truncate_text(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max_chars).collect();
        format!("{cut}…")
    }
}
