//! Pure domain types.
//!
//! Entities are immutable value objects once loaded; all durable state is
//! owned by the persistence layer, and derived entities (positions, scan
//! results) are recomputed on demand.

mod alert;
mod analysis;
mod fill;
mod id;
mod market;
mod news;
mod orderbook;
mod price;
mod snapshot;
mod thesis;

pub use alert::{Alert, AlertKind, Direction};
pub use analysis::{
    AnalysisResult, Confidence, Factor, Polarity, PredictionLog, RunStatus, VerificationReport,
};
pub use fill::{Fill, FillAction, FillSide};
pub use id::{AlertId, EventTicker, FillId, OrderId, RunId, SeriesTicker, ThesisId, Ticker};
pub use market::{Event, Market, MarketStatus, Series};
pub use news::{NewsItem, SentimentScore};
pub use orderbook::{Level, OrderbookSnapshot, Side};
pub use price::PriceUnits;
pub use snapshot::{PriceSnapshot, Settlement};
pub use thesis::{Thesis, ThesisStatus};
