//! # testkit
//!
//! Scripted broker + fixtures for unit and integration tests.
//! Compiled for `cfg(test)` or with the `testkit` feature.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use rust_decimal::Decimal;

use crate::broker::{BrokerGateway, BrokerOrderRequest, CandleInterval};
use crate::error::AppError;
use crate::models::{Candle, Instrument, Ohlc, PriceData, Quote};

// ─── StubBroker ───────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct StubBroker {
    candles:     Mutex<HashMap<Instrument, Vec<Candle>>>,
    quotes:      Mutex<HashMap<Instrument, Quote>>,
    placed:      Mutex<Vec<BrokerOrderRequest>>,
    fail_data:   AtomicBool,
    fail_orders: AtomicBool,
}

impl StubBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Candles returned for `instrument` regardless of the requested window.
    pub fn set_candles(&self, instrument: &Instrument, candles: Vec<Candle>) {
        self.candles.lock().insert(instrument.clone(), candles);
    }

    pub fn set_quote(&self, instrument: &Instrument, last_price: Decimal) {
        let ohlc = Ohlc { open: last_price, high: last_price, low: last_price, close: last_price };
        self.quotes.lock().insert(
            instrument.clone(),
            Quote { last_price, ohlc, net_change: Decimal::ZERO, timestamp: Utc::now() },
        );
    }

    pub fn fail_market_data(&self, fail: bool) {
        self.fail_data.store(fail, Ordering::SeqCst);
    }

    pub fn fail_orders(&self, fail: bool) {
        self.fail_orders.store(fail, Ordering::SeqCst);
    }

    pub fn placed_orders(&self) -> Vec<BrokerOrderRequest> {
        self.placed.lock().clone()
    }
}

#[async_trait]
impl BrokerGateway for StubBroker {
    async fn get_quote(&self, instrument: &Instrument) -> Result<Quote, AppError> {
        if self.fail_data.load(Ordering::SeqCst) {
            return Err(AppError::Broker("stub: quote unavailable".into()));
        }
        self.quotes
            .lock()
            .get(instrument)
            .cloned()
            .ok_or_else(|| AppError::Broker(format!("stub: no quote for {instrument}")))
    }

    async fn get_historical_candles(
        &self,
        instrument: &Instrument,
        _interval:  CandleInterval,
        _from:      DateTime<Utc>,
        _to:        DateTime<Utc>,
    ) -> Result<Vec<Candle>, AppError> {
        if self.fail_data.load(Ordering::SeqCst) {
            return Err(AppError::Broker("stub: historical data unavailable".into()));
        }
        Ok(self.candles.lock().get(instrument).cloned().unwrap_or_default())
    }

    async fn place_order(&self, request: &BrokerOrderRequest) -> Result<String, AppError> {
        if self.fail_orders.load(Ordering::SeqCst) {
            return Err(AppError::Broker("stub: order rejected".into()));
        }
        let mut placed = self.placed.lock();
        placed.push(request.clone());
        Ok(format!("STUB-{}", placed.len()))
    }
}

// ─── Fixtures ─────────────────────────────────────────────────────────────────

/// One-minute candles with the given closes, the last ending at `end`.
pub fn minute_candles(closes: &[Decimal], end: DateTime<Utc>) -> Vec<Candle> {
    let n = closes.len() as i64;
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| Candle {
            timestamp: end - Duration::minutes(n - 1 - i as i64),
            open:      close,
            high:      close,
            low:       close,
            close,
            volume:    100,
        })
        .collect()
}

/// Price data with a flat OHLC around `last_price`.
pub fn price_data(last_price: Decimal, at: DateTime<Utc>) -> PriceData {
    let ohlc = Ohlc { open: last_price, high: last_price, low: last_price, close: last_price };
    PriceData::from_quote(last_price, ohlc, at)
}
