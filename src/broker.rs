//! # broker — BrokerGateway collaborator
//!
//! The engine consumes three broker calls: a quote snapshot, minute candles
//! for trend resolution, and order placement (live trading only).
//! [`HttpBroker`] talks to a REST bridge in front of the real broker.
//!
//! ## Bridge API Contract
//! ```text
//! GET  {base}/quote?instrument=NSE:INFY                         → Quote
//! GET  {base}/candles?instrument=..&interval=minute&from=..&to=.. → [Candle]
//! POST {base}/orders  (BrokerOrderRequest)                      → { "order_id": "..." }
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::config::AppConfig;
use crate::error::AppError;
use crate::models::{Candle, Instrument, OptionSide, Quote};

/// Broker calls must never hang a monitor worker.
const BROKER_TIMEOUT_SECS: u64 = 5;

// ─── Request types ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CandleInterval {
    Minute,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    Buy,
    Sell,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BrokerOrderRequest {
    pub instrument:       Instrument,
    pub option_side:      OptionSide,
    pub transaction_type: TransactionType,
    pub quantity:         u32,
    pub price:            Decimal,
    /// Internal order id, echoed back by the broker for reconciliation.
    pub tag:              String,
}

#[derive(Debug, Deserialize)]
struct PlaceOrderResponse {
    order_id: String,
}

// ─── Contract ─────────────────────────────────────────────────────────────────

#[async_trait]
pub trait BrokerGateway: Send + Sync {
    async fn get_quote(&self, instrument: &Instrument) -> Result<Quote, AppError>;

    async fn get_historical_candles(
        &self,
        instrument: &Instrument,
        interval:   CandleInterval,
        from:       DateTime<Utc>,
        to:         DateTime<Utc>,
    ) -> Result<Vec<Candle>, AppError>;

    /// Returns the broker's order id.
    async fn place_order(&self, request: &BrokerOrderRequest) -> Result<String, AppError>;
}

// ─── HttpBroker ───────────────────────────────────────────────────────────────

pub struct HttpBroker {
    client:   reqwest::Client,
    base_url: Option<String>,
    api_key:  Option<String>,
}

impl HttpBroker {
    pub fn new(client: reqwest::Client, base_url: Option<String>, api_key: Option<String>) -> Self {
        Self {
            client,
            base_url: base_url.map(|url| url.trim_end_matches('/').to_string()),
            api_key,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            reqwest::Client::new(),
            config.broker_base_url.clone(),
            config.broker_api_key.clone(),
        )
    }

    fn base_url(&self) -> Result<&str, AppError> {
        self.base_url
            .as_deref()
            .ok_or_else(|| AppError::NotConfigured("BROKER_BASE_URL is not set".into()))
    }

    fn is_mock(&self) -> bool {
        self.base_url.as_deref() == Some("mock")
    }

    fn authorised(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let request = request.timeout(std::time::Duration::from_secs(BROKER_TIMEOUT_SECS));
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }

    async fn read_json<T: serde::de::DeserializeOwned>(
        response: Result<reqwest::Response, reqwest::Error>,
        call: &'static str,
    ) -> Result<T, AppError> {
        let response = response.map_err(|e| {
            error!(call, error = %e, "Broker unreachable");
            AppError::Broker(format!("{call}: broker unreachable: {e}"))
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!(call, http_status = %status, body = %body, "Broker returned HTTP error");
            return Err(AppError::Broker(format!("{call}: HTTP {status}: {body}")));
        }

        response.json().await.map_err(|e| {
            error!(call, error = %e, "Broker response parse failed");
            AppError::Broker(format!("{call}: response parse error: {e}"))
        })
    }
}

#[async_trait]
impl BrokerGateway for HttpBroker {
    async fn get_quote(&self, instrument: &Instrument) -> Result<Quote, AppError> {
        if self.is_mock() {
            return Err(AppError::NotConfigured("quotes unavailable in mock broker mode".into()));
        }
        let url = format!("{}/quote", self.base_url()?);
        let response = self
            .authorised(self.client.get(&url))
            .query(&[("instrument", instrument.to_string())])
            .send()
            .await;
        Self::read_json(response, "get_quote").await
    }

    async fn get_historical_candles(
        &self,
        instrument: &Instrument,
        interval:   CandleInterval,
        from:       DateTime<Utc>,
        to:         DateTime<Utc>,
    ) -> Result<Vec<Candle>, AppError> {
        if self.is_mock() {
            return Err(AppError::NotConfigured("candles unavailable in mock broker mode".into()));
        }
        let url = format!("{}/candles", self.base_url()?);
        let interval = match interval {
            CandleInterval::Minute => "minute",
        };
        let response = self
            .authorised(self.client.get(&url))
            .query(&[
                ("instrument", instrument.to_string()),
                ("interval", interval.to_string()),
                ("from", from.to_rfc3339()),
                ("to", to.to_rfc3339()),
            ])
            .send()
            .await;
        Self::read_json(response, "get_historical_candles").await
    }

    async fn place_order(&self, request: &BrokerOrderRequest) -> Result<String, AppError> {
        if self.is_mock() {
            info!(tag = %request.tag, "🎭 [BROKER] MOCK mode — simulating order placement");
            return Ok(format!("MOCK-{}", request.tag));
        }

        let url = format!("{}/orders", self.base_url()?);
        info!(
            instrument  = %request.instrument,
            side        = ?request.option_side,
            transaction = ?request.transaction_type,
            quantity    = request.quantity,
            price       = %request.price,
            "🚀 [BROKER] Sending order"
        );

        let response = self.authorised(self.client.post(&url)).json(request).send().await;
        let placed: PlaceOrderResponse = Self::read_json(response, "place_order").await?;

        info!(broker_order_id = %placed.order_id, "✅ [BROKER] Order accepted");
        Ok(placed.order_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn request() -> BrokerOrderRequest {
        BrokerOrderRequest {
            instrument:       Instrument::new("NFO", "NIFTY25000CE"),
            option_side:      OptionSide::Call,
            transaction_type: TransactionType::Buy,
            quantity:         50,
            price:            dec!(25000),
            tag:              "order-1".into(),
        }
    }

    #[tokio::test]
    async fn unconfigured_broker_fails_with_not_configured() {
        let broker = HttpBroker::new(reqwest::Client::new(), None, None);
        let err = broker.place_order(&request()).await.unwrap_err();
        assert!(matches!(err, AppError::NotConfigured(_)));

        let err = broker.get_quote(&Instrument::new("NSE", "INFY")).await.unwrap_err();
        assert!(matches!(err, AppError::NotConfigured(_)));
    }

    #[tokio::test]
    async fn mock_broker_simulates_order_placement() {
        let broker = HttpBroker::new(reqwest::Client::new(), Some("mock".into()), None);
        let id = broker.place_order(&request()).await.unwrap();
        assert_eq!(id, "MOCK-order-1");
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let broker = HttpBroker::new(reqwest::Client::new(), Some("http://bridge:8081/".into()), None);
        assert_eq!(broker.base_url().unwrap(), "http://bridge:8081");
    }
}
