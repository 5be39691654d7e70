//! Research-side repositories: theses, prediction log, news, sentiment.

use chrono::{DateTime, Utc};
use diesel::prelude::*;

use super::{opt_ts_from_string, ts_from_string, ts_to_string, BATCH_SIZE};
use crate::core::db::model::{
    NewNewsRow, NewPredictionRow, NewsRow, PredictionRow, SentimentRow, ThesisRow,
};
use crate::core::db::schema::{news_items, prediction_log, sentiment_scores, theses};
use crate::core::db::DbPool;
use crate::core::domain::{
    Confidence, NewsItem, PredictionLog, RunStatus, SentimentScore, Thesis, ThesisId,
    ThesisStatus, Ticker,
};
use crate::error::{Error, Result};

/// SQLite-backed thesis store.
pub struct ThesisStore {
    pool: DbPool,
}

impl ThesisStore {
    #[must_use]
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn to_row(thesis: &Thesis) -> Result<ThesisRow> {
        Ok(ThesisRow {
            id: thesis.id.to_string(),
            title: thesis.title.clone(),
            markets: serde_json::to_string(
                &thesis.markets.iter().map(Ticker::as_str).collect::<Vec<_>>(),
            )?,
            your_probability: thesis.your_probability,
            market_probability: thesis.market_probability,
            confidence: thesis.confidence,
            status: thesis.status.as_str().to_string(),
            resolution_outcome: thesis.resolution_outcome,
            created_at: ts_to_string(thesis.created_at),
            updated_at: ts_to_string(thesis.updated_at),
        })
    }

    fn from_row(row: ThesisRow) -> Result<Thesis> {
        let markets: Vec<String> = serde_json::from_str(&row.markets)?;
        let status = ThesisStatus::parse(&row.status)
            .ok_or_else(|| Error::Parse(format!("theses.status: {:?}", row.status)))?;
        Ok(Thesis {
            id: ThesisId::from(row.id),
            title: row.title,
            markets: markets.into_iter().map(Ticker::from).collect(),
            your_probability: row.your_probability,
            market_probability: row.market_probability,
            confidence: row.confidence,
            status,
            resolution_outcome: row.resolution_outcome,
            created_at: ts_from_string("theses.created_at", &row.created_at)?,
            updated_at: ts_from_string("theses.updated_at", &row.updated_at)?,
        })
    }

    pub fn save(&self, thesis: &Thesis) -> Result<()> {
        let row = Self::to_row(thesis)?;
        let mut conn = self
            .pool
            .get()
            .map_err(|e| Error::Connection(e.to_string()))?;
        diesel::replace_into(theses::table)
            .values(&row)
            .execute(&mut conn)
            .map_err(|e| Error::Database(e.to_string()))?;
        Ok(())
    }

    pub fn find(&self, id: &ThesisId) -> Result<Option<Thesis>> {
        let mut conn = self
            .pool
            .get()
            .map_err(|e| Error::Connection(e.to_string()))?;
        let row: Option<ThesisRow> = theses::table
            .find(id.to_string())
            .first(&mut conn)
            .optional()
            .map_err(|e| Error::Database(e.to_string()))?;
        row.map(Self::from_row).transpose()
    }

    pub fn list(&self, status: Option<ThesisStatus>) -> Result<Vec<Thesis>> {
        let mut conn = self
            .pool
            .get()
            .map_err(|e| Error::Connection(e.to_string()))?;
        let rows: Vec<ThesisRow> = match status {
            Some(status) => theses::table
                .filter(theses::status.eq(status.as_str()))
                .load(&mut conn)
                .map_err(|e| Error::Database(e.to_string()))?,
            None => theses::table
                .load(&mut conn)
                .map_err(|e| Error::Database(e.to_string()))?,
        };
        rows.into_iter().map(Self::from_row).collect()
    }

    /// Active theses covering the ticker, used as prior context by the
    /// orchestrator.
    pub fn active_covering(&self, ticker: &Ticker) -> Result<Vec<Thesis>> {
        Ok(self
            .list(Some(ThesisStatus::Active))?
            .into_iter()
            .filter(|t| t.covers(ticker))
            .collect())
    }

    /// Resolve every active thesis covering `ticker` with the outcome.
    pub fn resolve_covering(&self, ticker: &Ticker, outcome: i32) -> Result<usize> {
        let mut resolved = 0;
        for mut thesis in self.active_covering(ticker)? {
            thesis.status = ThesisStatus::Resolved;
            thesis.resolution_outcome = Some(outcome);
            thesis.updated_at = Utc::now();
            self.save(&thesis)?;
            resolved += 1;
        }
        Ok(resolved)
    }

    pub fn delete(&self, id: &ThesisId) -> Result<bool> {
        let mut conn = self
            .pool
            .get()
            .map_err(|e| Error::Connection(e.to_string()))?;
        let deleted = diesel::delete(theses::table.find(id.to_string()))
            .execute(&mut conn)
            .map_err(|e| Error::Database(e.to_string()))?;
        Ok(deleted > 0)
    }
}

/// SQLite-backed prediction log.
pub struct PredictionStore {
    pool: DbPool,
}

impl PredictionStore {
    #[must_use]
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn from_row(row: PredictionRow) -> Result<(i32, PredictionLog)> {
        let confidence = Confidence::parse(&row.confidence)
            .ok_or_else(|| Error::Parse(format!("prediction_log.confidence: {:?}", row.confidence)))?;
        let status = RunStatus::parse(&row.status)
            .ok_or_else(|| Error::Parse(format!("prediction_log.status: {:?}", row.status)))?;
        Ok((
            row.id,
            PredictionLog {
                ticker: Ticker::from(row.ticker),
                predicted_prob: row.predicted_prob,
                market_prob_at_time: row.market_prob_at_time,
                confidence,
                reasoning: row.reasoning,
                factors_json: row.factors_json,
                status,
                diagnostic: row.diagnostic,
                predicted_at: ts_from_string("prediction_log.predicted_at", &row.predicted_at)?,
                actual_outcome: row.actual_outcome,
                resolved_at: opt_ts_from_string(
                    "prediction_log.resolved_at",
                    row.resolved_at.as_ref(),
                )?,
                brier_score: row.brier_score,
            },
        ))
    }

    pub fn insert(&self, log: &PredictionLog) -> Result<()> {
        let row = NewPredictionRow {
            ticker: log.ticker.to_string(),
            predicted_prob: log.predicted_prob,
            market_prob_at_time: log.market_prob_at_time,
            confidence: log.confidence.as_str().to_string(),
            reasoning: log.reasoning.clone(),
            factors_json: log.factors_json.clone(),
            status: log.status.as_str().to_string(),
            diagnostic: log.diagnostic.clone(),
            predicted_at: ts_to_string(log.predicted_at),
        };
        let mut conn = self
            .pool
            .get()
            .map_err(|e| Error::Connection(e.to_string()))?;
        diesel::insert_into(prediction_log::table)
            .values(&row)
            .execute(&mut conn)
            .map_err(|e| Error::Database(e.to_string()))?;
        Ok(())
    }

    /// Successful predictions awaiting settlement of their market.
    pub fn unresolved(&self) -> Result<Vec<(i32, Ticker, f64)>> {
        let mut conn = self
            .pool
            .get()
            .map_err(|e| Error::Connection(e.to_string()))?;
        let rows: Vec<PredictionRow> = prediction_log::table
            .filter(prediction_log::actual_outcome.is_null())
            .filter(prediction_log::status.eq(RunStatus::Ok.as_str()))
            .load(&mut conn)
            .map_err(|e| Error::Database(e.to_string()))?;
        Ok(rows
            .into_iter()
            .map(|r| (r.id, Ticker::from(r.ticker), r.predicted_prob))
            .collect())
    }

    /// Record the settlement outcome and Brier score for one prediction.
    pub fn resolve(
        &self,
        id: i32,
        outcome: i32,
        resolved_at: DateTime<Utc>,
        brier: f64,
    ) -> Result<()> {
        let mut conn = self
            .pool
            .get()
            .map_err(|e| Error::Connection(e.to_string()))?;
        diesel::update(prediction_log::table.find(id))
            .set((
                prediction_log::actual_outcome.eq(Some(outcome)),
                prediction_log::resolved_at.eq(Some(ts_to_string(resolved_at))),
                prediction_log::brier_score.eq(Some(brier)),
            ))
            .execute(&mut conn)
            .map_err(|e| Error::Database(e.to_string()))?;
        Ok(())
    }

    pub fn for_ticker(&self, ticker: &Ticker) -> Result<Vec<(i32, PredictionLog)>> {
        let mut conn = self
            .pool
            .get()
            .map_err(|e| Error::Connection(e.to_string()))?;
        let rows: Vec<PredictionRow> = prediction_log::table
            .filter(prediction_log::ticker.eq(ticker.as_str()))
            .order(prediction_log::predicted_at.desc())
            .load(&mut conn)
            .map_err(|e| Error::Database(e.to_string()))?;
        rows.into_iter().map(Self::from_row).collect()
    }

    /// Mean Brier score over resolved predictions, with the sample size.
    pub fn calibration_summary(&self) -> Result<Option<(f64, usize)>> {
        let mut conn = self
            .pool
            .get()
            .map_err(|e| Error::Connection(e.to_string()))?;
        let briers: Vec<Option<f64>> = prediction_log::table
            .filter(prediction_log::brier_score.is_not_null())
            .select(prediction_log::brier_score)
            .load(&mut conn)
            .map_err(|e| Error::Database(e.to_string()))?;
        let briers: Vec<f64> = briers.into_iter().flatten().collect();
        if briers.is_empty() {
            return Ok(None);
        }
        let mean = briers.iter().sum::<f64>() / briers.len() as f64;
        Ok(Some((mean, briers.len())))
    }
}

/// SQLite-backed news store.
pub struct NewsStore {
    pool: DbPool,
}

impl NewsStore {
    #[must_use]
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn insert_batch(&self, batch: &[NewsItem]) -> Result<usize> {
        let mut conn = self
            .pool
            .get()
            .map_err(|e| Error::Connection(e.to_string()))?;
        let mut written = 0;
        for chunk in batch.chunks(BATCH_SIZE) {
            let rows: Vec<NewNewsRow> = chunk
                .iter()
                .map(|item| NewNewsRow {
                    ticker: item.ticker.as_ref().map(ToString::to_string),
                    url: item.url.clone(),
                    title: item.title.clone(),
                    published_at: item.published_at.map(ts_to_string),
                    fetched_at: ts_to_string(item.fetched_at),
                })
                .collect();
            written += conn.immediate_transaction::<_, Error, _>(|conn| {
                diesel::insert_into(news_items::table)
                    .values(&rows)
                    .execute(conn)
                    .map_err(|e| Error::Database(e.to_string()))
            })?;
        }
        Ok(written)
    }

    pub fn recent_for_ticker(&self, ticker: &Ticker, limit: i64) -> Result<Vec<NewsItem>> {
        let mut conn = self
            .pool
            .get()
            .map_err(|e| Error::Connection(e.to_string()))?;
        let rows: Vec<NewsRow> = news_items::table
            .filter(news_items::ticker.eq(ticker.as_str()))
            .order(news_items::fetched_at.desc())
            .limit(limit)
            .load(&mut conn)
            .map_err(|e| Error::Database(e.to_string()))?;
        rows.into_iter()
            .map(|row| {
                Ok(NewsItem {
                    ticker: row.ticker.map(Ticker::from),
                    url: row.url,
                    title: row.title,
                    published_at: opt_ts_from_string(
                        "news_items.published_at",
                        row.published_at.as_ref(),
                    )?,
                    fetched_at: ts_from_string("news_items.fetched_at", &row.fetched_at)?,
                })
            })
            .collect()
    }
}

/// SQLite-backed sentiment store.
pub struct SentimentStore {
    pool: DbPool,
}

impl SentimentStore {
    #[must_use]
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn upsert(&self, score: &SentimentScore) -> Result<()> {
        let row = SentimentRow {
            ticker: score.ticker.to_string(),
            scored_at: ts_to_string(score.scored_at),
            score: score.score,
            source: score.source.clone(),
        };
        let mut conn = self
            .pool
            .get()
            .map_err(|e| Error::Connection(e.to_string()))?;
        diesel::replace_into(sentiment_scores::table)
            .values(&row)
            .execute(&mut conn)
            .map_err(|e| Error::Database(e.to_string()))?;
        Ok(())
    }

    pub fn latest(&self, ticker: &Ticker) -> Result<Option<SentimentScore>> {
        let mut conn = self
            .pool
            .get()
            .map_err(|e| Error::Connection(e.to_string()))?;
        let row: Option<SentimentRow> = sentiment_scores::table
            .filter(sentiment_scores::ticker.eq(ticker.as_str()))
            .order(sentiment_scores::scored_at.desc())
            .first(&mut conn)
            .optional()
            .map_err(|e| Error::Database(e.to_string()))?;
        row.map(|row| {
            Ok(SentimentScore {
                ticker: Ticker::from(row.ticker),
                scored_at: ts_from_string("sentiment_scores.scored_at", &row.scored_at)?,
                score: row.score,
                source: row.source,
            })
        })
        .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::memory_pool;

    #[test]
    fn thesis_roundtrip_keeps_uuid_and_markets() {
        let store = ThesisStore::new(memory_pool());
        let thesis = Thesis::draft(
            "Rate cut by December",
            vec![Ticker::from("FED-24DEC"), Ticker::from("FED-25JAN")],
            0.7,
            0.55,
            0.6,
        );
        store.save(&thesis).unwrap();

        let loaded = store.find(&thesis.id).unwrap().unwrap();
        assert_eq!(loaded.id, thesis.id);
        assert_eq!(loaded.markets.len(), 2);
        assert!(loaded.covers(&Ticker::from("FED-24DEC")));
    }

    #[test]
    fn resolve_covering_targets_active_theses_only() {
        let store = ThesisStore::new(memory_pool());
        let mut active = Thesis::draft("live", vec![Ticker::from("MKT-1")], 0.6, 0.5, 0.5);
        active.status = ThesisStatus::Active;
        let draft = Thesis::draft("idea", vec![Ticker::from("MKT-1")], 0.6, 0.5, 0.5);
        store.save(&active).unwrap();
        store.save(&draft).unwrap();

        let resolved = store.resolve_covering(&Ticker::from("MKT-1"), 1).unwrap();
        assert_eq!(resolved, 1);

        let reloaded = store.find(&active.id).unwrap().unwrap();
        assert_eq!(reloaded.status, ThesisStatus::Resolved);
        assert_eq!(reloaded.resolution_outcome, Some(1));
        assert_eq!(
            store.find(&draft.id).unwrap().unwrap().status,
            ThesisStatus::Draft
        );
    }

    #[test]
    fn prediction_resolution_sets_outcome_and_brier() {
        let store = PredictionStore::new(memory_pool());
        let log = crate::testkit::prediction("MKT-1", 0.7);
        store.insert(&log).unwrap();

        let unresolved = store.unresolved().unwrap();
        assert_eq!(unresolved.len(), 1);
        let (id, ticker, predicted) = unresolved.into_iter().next().unwrap();
        assert_eq!(ticker.as_str(), "MKT-1");

        let brier = PredictionLog::brier(predicted, 1);
        store.resolve(id, 1, Utc::now(), brier).unwrap();

        assert!(store.unresolved().unwrap().is_empty());
        let (_, resolved) = store
            .for_ticker(&Ticker::from("MKT-1"))
            .unwrap()
            .into_iter()
            .next()
            .unwrap();
        assert_eq!(resolved.actual_outcome, Some(1));
        assert!((resolved.brier_score.unwrap() - 0.09).abs() < 1e-12);
    }

    #[test]
    fn failed_runs_are_not_candidates_for_resolution() {
        let store = PredictionStore::new(memory_pool());
        let mut log = crate::testkit::prediction("MKT-1", 0.5);
        log.status = RunStatus::Failed;
        log.diagnostic = Some("budget exceeded".into());
        store.insert(&log).unwrap();
        assert!(store.unresolved().unwrap().is_empty());
    }

    #[test]
    fn calibration_summary_averages_resolved_briers() {
        let store = PredictionStore::new(memory_pool());
        store.insert(&crate::testkit::prediction("A", 1.0)).unwrap();
        store.insert(&crate::testkit::prediction("B", 0.5)).unwrap();
        for (id, _, predicted) in store.unresolved().unwrap() {
            store
                .resolve(id, 1, Utc::now(), PredictionLog::brier(predicted, 1))
                .unwrap();
        }
        let (mean, n) = store.calibration_summary().unwrap().unwrap();
        assert_eq!(n, 2);
        assert!((mean - 0.125).abs() < 1e-12);
    }
}
