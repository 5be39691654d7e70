//! Agent pipeline: research gathering, structured synthesis, deterministic
//! verification, and the budget-capped orchestrator that runs them in order.

pub mod orchestrator;
pub mod research;
pub mod research_http;
pub mod synth_http;
pub mod synthesizer;
pub mod verifier;

pub use orchestrator::{AgentRunResult, Orchestrator, OrchestratorConfig, ResearchMode};
pub use research::{
    AnswerResponse, ContentsOptions, ContentsResponse, Document, Livecrawl, ResearchProvider,
    ResearchTaskPoll, ResearchTaskStatus, SearchOptions, SearchResponse, SearchResultItem,
    SearchType,
};
pub use synthesizer::{SynthesisInput, Synthesizer, SynthesizerBackend};
pub use verifier::{verify, VerifierConfig};
