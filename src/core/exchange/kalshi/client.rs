//! Signed Kalshi REST client.
//!
//! A single client serves both anonymous market-data access and, when a
//! signer is attached, the authenticated portfolio surface. Every request
//! passes through the shared rate limiter and the retry policy.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::{Client as HttpClient, Method, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, info};
use url::Url;

use super::auth::RequestSigner;
use super::retry::{with_retry, RetryPolicy};
use super::wire;
use crate::core::domain::{
    Event, EventTicker, Fill, Market, OrderbookSnapshot, SeriesTicker, Settlement, Side, Ticker,
};
use crate::core::exchange::paging::Page;
use crate::core::exchange::rate_limit::{OpClass, RateLimiter};
use crate::core::exchange::{
    Balance, CandleInterval, Candlestick, ExchangePosition, MarketApi, MarketFilter, OrderRecord,
    OrderResponse, OrderSpec,
};
use crate::core::service::ShutdownSignal;
use crate::error::{Error, Result};

/// Per-endpoint page caps.
const MARKETS_PAGE_CAP: u32 = 1000;
const EVENTS_PAGE_CAP: u32 = 200;
const FILLS_PAGE_CAP: u32 = 200;
const CANDLE_BATCH_CAP: i64 = 100;
const PORTFOLIO_PAGE_CAP: u32 = 200;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP client for the Kalshi trade API.
pub struct KalshiClient {
    http: HttpClient,
    base: Url,
    signer: Option<Arc<RequestSigner>>,
    limiter: Arc<RateLimiter>,
    retry: RetryPolicy,
    shutdown: ShutdownSignal,
}

impl KalshiClient {
    /// Create an anonymous client against the given base URL, e.g.
    /// `https://demo-api.kalshi.co/trade-api/v2`.
    pub fn new(
        base_url: &str,
        limiter: Arc<RateLimiter>,
        shutdown: ShutdownSignal,
    ) -> Result<Self> {
        let base = Url::parse(base_url)?;
        let http = HttpClient::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| Error::Connection(e.to_string()))?;
        Ok(Self {
            http,
            base,
            signer: None,
            limiter,
            retry: RetryPolicy::default(),
            shutdown,
        })
    }

    /// Attach credentials for the authenticated surface.
    #[must_use]
    pub fn with_signer(mut self, signer: Arc<RequestSigner>) -> Self {
        self.signer = Some(signer);
        self
    }

    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.signer.is_some()
    }

    fn require_signer(&self) -> Result<&Arc<RequestSigner>> {
        self.signer.as_ref().ok_or_else(|| Error::Auth {
            status: 0,
            message: "operation requires credentials (KEY_ID / private key)".into(),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        // Join against the versioned base, keeping its path prefix.
        let joined = format!(
            "{}/{}",
            self.base.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        Ok(Url::parse(&joined)?)
    }

    async fn request_json<T: DeserializeOwned>(
        &self,
        op: &'static str,
        class: OpClass,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<serde_json::Value>,
        auth: bool,
    ) -> Result<T> {
        let mut url = self.endpoint(path)?;
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (k, v) in query {
                pairs.append_pair(k, v);
            }
        }

        with_retry(self.retry, op, &self.shutdown, || {
            let url = url.clone();
            let method = method.clone();
            let body = body.clone();
            async move {
                self.limiter.acquire(class, op, &self.shutdown).await?;

                let mut request = self.http.request(method.clone(), url.clone());
                if auth {
                    let signer = self.require_signer()?;
                    let ts = Utc::now().timestamp_millis();
                    // The signature covers the path only, never the query.
                    for (name, value) in signer.headers(ts, method.as_str(), url.path())? {
                        request = request.header(name, value);
                    }
                }
                if let Some(ref body) = body {
                    request = request.json(body);
                }

                debug!(op, url = %url, "sending request");
                let response = request.send().await?;
                Self::handle_response(response).await
            }
        })
        .await
    }

    async fn handle_response<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        let status = response.status();
        if status.is_success() {
            return response.json::<T>().await.map_err(Into::into);
        }

        let retry_after_secs = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok());
        let body = response.text().await.unwrap_or_default();
        let message = wire::decode_error_message(&body);

        Err(match status {
            StatusCode::TOO_MANY_REQUESTS => Error::RateLimited { retry_after_secs },
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Error::Auth {
                status: status.as_u16(),
                message,
            },
            StatusCode::NOT_FOUND => Error::NotFound(message),
            _ => Error::Api {
                status: status.as_u16(),
                message,
            },
        })
    }

    fn markets_query(filter: &MarketFilter, cursor: Option<String>, limit: u32) -> Vec<(&'static str, String)> {
        let mut query = vec![("limit", limit.min(MARKETS_PAGE_CAP).to_string())];
        if let Some(cursor) = cursor {
            query.push(("cursor", cursor));
        }
        if let Some(status) = filter.status {
            query.push(("status", status.as_str().to_string()));
        }
        if !filter.tickers.is_empty() {
            let joined = filter
                .tickers
                .iter()
                .map(Ticker::as_str)
                .collect::<Vec<_>>()
                .join(",");
            query.push(("tickers", joined));
        }
        if let Some(ref event) = filter.event_ticker {
            query.push(("event_ticker", event.as_str().to_string()));
        }
        if let Some(ref series) = filter.series_ticker {
            query.push(("series_ticker", series.as_str().to_string()));
        }
        if let Some(min) = filter.min_close_ts {
            query.push(("min_close_ts", min.timestamp().to_string()));
        }
        if let Some(max) = filter.max_close_ts {
            query.push(("max_close_ts", max.timestamp().to_string()));
        }
        query
    }
}

#[async_trait::async_trait]
impl MarketApi for KalshiClient {
    async fn markets_page(
        &self,
        filter: &MarketFilter,
        cursor: Option<String>,
        limit: u32,
    ) -> Result<Page<Market>> {
        let query = Self::markets_query(filter, cursor, limit);
        let response: wire::MarketsResponse = self
            .request_json(
                "get_markets",
                OpClass::Read,
                Method::GET,
                "/markets",
                &query,
                None,
                false,
            )
            .await?;

        let markets = wire::markets_into_domain(response.markets)
            .into_iter()
            .filter(|m| filter.admits(m))
            .collect();
        Ok(Page::new(markets, response.cursor))
    }

    async fn market(&self, ticker: &Ticker) -> Result<Market> {
        let response: wire::SingleMarketResponse = self
            .request_json(
                "get_market",
                OpClass::Read,
                Method::GET,
                &format!("/markets/{ticker}"),
                &[],
                None,
                false,
            )
            .await?;
        response.market.into_domain()
    }

    async fn events_page(&self, cursor: Option<String>, limit: u32) -> Result<Page<Event>> {
        let mut query = vec![("limit", limit.min(EVENTS_PAGE_CAP).to_string())];
        if let Some(cursor) = cursor {
            query.push(("cursor", cursor));
        }
        let response: wire::EventsResponse = self
            .request_json(
                "get_events",
                OpClass::Read,
                Method::GET,
                "/events",
                &query,
                None,
                false,
            )
            .await?;
        let events = response
            .events
            .into_iter()
            .map(|e| e.into_domain(false))
            .collect();
        Ok(Page::new(events, response.cursor))
    }

    async fn orderbook(&self, ticker: &Ticker, depth: u32) -> Result<OrderbookSnapshot> {
        let mut query = Vec::new();
        if depth > 0 {
            query.push(("depth", depth.to_string()));
        }
        let response: wire::OrderbookResponse = self
            .request_json(
                "get_orderbook",
                OpClass::Read,
                Method::GET,
                &format!("/markets/{ticker}/orderbook"),
                &query,
                None,
                false,
            )
            .await?;
        response.orderbook.into_domain(ticker.clone(), Utc::now())
    }

    async fn candlesticks(
        &self,
        series: &SeriesTicker,
        ticker: &Ticker,
        interval: CandleInterval,
        start_ts: DateTime<Utc>,
        end_ts: DateTime<Utc>,
    ) -> Result<Vec<Candlestick>> {
        let periods = (end_ts.timestamp() - start_ts.timestamp()) / (interval.minutes() * 60);
        if periods > CANDLE_BATCH_CAP {
            return Err(Error::Validation(format!(
                "candlestick request spans {periods} periods; batch cap is {CANDLE_BATCH_CAP}"
            )));
        }

        let query = vec![
            ("start_ts", start_ts.timestamp().to_string()),
            ("end_ts", end_ts.timestamp().to_string()),
            ("period_interval", interval.minutes().to_string()),
        ];
        let response: wire::CandlesticksResponse = self
            .request_json(
                "get_candlesticks",
                OpClass::Read,
                Method::GET,
                &format!("/series/{series}/markets/{ticker}/candlesticks"),
                &query,
                None,
                false,
            )
            .await?;
        response
            .candlesticks
            .into_iter()
            .map(wire::WireCandle::into_domain)
            .collect()
    }

    async fn settlements_page(
        &self,
        cursor: Option<String>,
        limit: u32,
    ) -> Result<Page<Settlement>> {
        self.require_signer()?;
        let mut query = vec![("limit", limit.min(PORTFOLIO_PAGE_CAP).to_string())];
        if let Some(cursor) = cursor {
            query.push(("cursor", cursor));
        }
        let response: wire::SettlementsResponse = self
            .request_json(
                "get_settlements",
                OpClass::Read,
                Method::GET,
                "/portfolio/settlements",
                &query,
                None,
                true,
            )
            .await?;
        let settlements = response
            .settlements
            .into_iter()
            .map(wire::WireSettlement::into_domain)
            .collect::<Result<Vec<_>>>()?;
        Ok(Page::new(settlements, response.cursor))
    }

    async fn fills_page(&self, cursor: Option<String>, limit: u32) -> Result<Page<Fill>> {
        self.require_signer()?;
        let mut query = vec![("limit", limit.min(FILLS_PAGE_CAP).to_string())];
        if let Some(cursor) = cursor {
            query.push(("cursor", cursor));
        }
        let response: wire::FillsResponse = self
            .request_json(
                "get_fills",
                OpClass::Read,
                Method::GET,
                "/portfolio/fills",
                &query,
                None,
                true,
            )
            .await?;
        let fills = response
            .fills
            .into_iter()
            .map(wire::WireFill::into_domain)
            .collect::<Result<Vec<_>>>()?;
        Ok(Page::new(fills, response.cursor))
    }

    async fn positions(&self) -> Result<Vec<ExchangePosition>> {
        self.require_signer()?;
        let mut all = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let mut query = vec![("limit", PORTFOLIO_PAGE_CAP.to_string())];
            if let Some(c) = cursor.take() {
                query.push(("cursor", c));
            }
            let response: wire::PositionsResponse = self
                .request_json(
                    "get_positions",
                    OpClass::Read,
                    Method::GET,
                    "/portfolio/positions",
                    &query,
                    None,
                    true,
                )
                .await?;
            for position in response.market_positions {
                all.push(position.into_domain()?);
            }
            match response.cursor.filter(|c| !c.is_empty()) {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }
        Ok(all)
    }

    async fn balance(&self) -> Result<Balance> {
        self.require_signer()?;
        let response: wire::BalanceResponse = self
            .request_json(
                "get_balance",
                OpClass::Read,
                Method::GET,
                "/portfolio/balance",
                &[],
                None,
                true,
            )
            .await?;
        response.into_domain()
    }

    async fn orders_page(&self, cursor: Option<String>, limit: u32) -> Result<Page<OrderRecord>> {
        self.require_signer()?;
        let mut query = vec![("limit", limit.min(PORTFOLIO_PAGE_CAP).to_string())];
        if let Some(cursor) = cursor {
            query.push(("cursor", cursor));
        }
        let response: wire::OrdersResponse = self
            .request_json(
                "get_orders",
                OpClass::Read,
                Method::GET,
                "/portfolio/orders",
                &query,
                None,
                true,
            )
            .await?;
        let orders = response
            .orders
            .into_iter()
            .map(wire::WireOrder::into_domain)
            .collect::<Result<Vec<_>>>()?;
        Ok(Page::new(orders, response.cursor))
    }

    async fn create_order(&self, spec: &OrderSpec, dry_run: bool) -> Result<OrderResponse> {
        spec.validate()?;

        if dry_run {
            // Validated but never sent.
            info!(ticker = %spec.ticker, count = spec.count, "dry-run order, skipping submission");
            return Ok(OrderResponse {
                order_id: "DRY_RUN".into(),
                status: "dry_run".to_string(),
                spec: spec.clone(),
            });
        }

        self.require_signer()?;
        let price_key = match spec.side {
            Side::Yes => "yes_price",
            Side::No => "no_price",
        };
        let body = serde_json::json!({
            "ticker": spec.ticker.as_str(),
            "client_order_id": spec.client_order_id,
            "side": spec.side.as_str(),
            "action": spec.action.as_str(),
            "count": spec.count,
            "type": "limit",
            price_key: spec.price_cents,
        });

        let response: wire::CreateOrderResponse = self
            .request_json(
                "create_order",
                OpClass::Write,
                Method::POST,
                "/portfolio/orders",
                &[],
                Some(body),
                true,
            )
            .await?;
        let order = response.order.into_domain()?;
        Ok(OrderResponse {
            order_id: order.order_id.clone(),
            status: order.status,
            spec: spec.clone(),
        })
    }

    async fn multivariate_collections_page(
        &self,
        cursor: Option<String>,
        limit: u32,
    ) -> Result<Page<Event>> {
        let mut query = vec![("limit", limit.min(EVENTS_PAGE_CAP).to_string())];
        if let Some(cursor) = cursor {
            query.push(("cursor", cursor));
        }
        let response: wire::CollectionsResponse = self
            .request_json(
                "get_multivariate_event_collections",
                OpClass::Read,
                Method::GET,
                "/multivariate_event_collections",
                &query,
                None,
                false,
            )
            .await?;
        let events = response
            .multivariate_event_collections
            .into_iter()
            .map(|e| e.into_domain(true))
            .collect();
        Ok(Page::new(events, response.cursor))
    }

    async fn lookup_multivariate_ticker(
        &self,
        collection: &EventTicker,
        selected: &[Ticker],
    ) -> Result<Ticker> {
        let body = serde_json::json!({
            "selected_markets": selected.iter().map(Ticker::as_str).collect::<Vec<_>>(),
        });
        let response: wire::LookupTickersResponse = self
            .request_json(
                "lookup_multivariate_tickers",
                OpClass::Read,
                Method::PUT,
                &format!("/multivariate_event_collections/{collection}/lookup"),
                &[],
                Some(body),
                false,
            )
            .await?;
        Ok(Ticker::from(response.market_ticker))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::domain::FillAction;
    use crate::core::exchange::rate_limit::Tier;

    fn test_client() -> KalshiClient {
        KalshiClient::new(
            "https://demo-api.kalshi.co/trade-api/v2",
            Arc::new(RateLimiter::new(Tier::Basic)),
            ShutdownSignal::never(),
        )
        .unwrap()
    }

    #[test]
    fn endpoint_preserves_versioned_base_path() {
        let client = test_client();
        let url = client.endpoint("/markets").unwrap();
        assert_eq!(url.path(), "/trade-api/v2/markets");
        assert!(url.query().is_none());
    }

    #[tokio::test]
    async fn dry_run_order_short_circuits_without_network() {
        // The anonymous client has no signer; a dry run must still succeed
        // because the request is never sent.
        let client = test_client();
        let spec = OrderSpec {
            ticker: Ticker::from("MKT-1"),
            side: Side::Yes,
            action: FillAction::Buy,
            count: 10,
            price_cents: 45,
            client_order_id: "c-1".into(),
        };
        let response = client.create_order(&spec, true).await.unwrap();
        assert_eq!(response.order_id.as_str(), "DRY_RUN");
        assert_eq!(response.spec, spec);
    }

    #[tokio::test]
    async fn dry_run_still_rejects_bad_price() {
        let client = test_client();
        let spec = OrderSpec {
            ticker: Ticker::from("MKT-1"),
            side: Side::Yes,
            action: FillAction::Buy,
            count: 10,
            price_cents: 0,
            client_order_id: "c-1".into(),
        };
        assert!(client.create_order(&spec, true).await.is_err());
    }

    #[tokio::test]
    async fn authenticated_ops_require_signer() {
        let client = test_client();
        let err = client.balance().await.unwrap_err();
        assert!(matches!(err, Error::Auth { .. }));
    }

    #[test]
    fn markets_query_clamps_limit_and_serializes_filter() {
        let filter = MarketFilter {
            status: Some(crate::core::domain::MarketStatus::Open),
            tickers: vec![Ticker::from("A"), Ticker::from("B")],
            ..MarketFilter::default()
        };
        let query = KalshiClient::markets_query(&filter, Some("cur".into()), 5000);
        assert!(query.contains(&("limit", "1000".to_string())));
        assert!(query.contains(&("cursor", "cur".to_string())));
        assert!(query.contains(&("status", "open".to_string())));
        assert!(query.contains(&("tickers", "A,B".to_string())));
    }
}
