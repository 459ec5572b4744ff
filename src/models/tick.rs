//! # models::tick
//!
//! Market-data payloads that flow through the engine.
//!
//! - [`RawTick`] is what the broker stream delivers (keyed by `instrument_token`).
//! - [`PriceData`] is the normalised quote published to subscribers.
//! - [`PriceMessage`] is the envelope each subscriber queue receives.
//! - [`Candle`] / [`Quote`] come back from the BrokerGateway REST side.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

// ─── Instrument ───────────────────────────────────────────────────────────────

/// `(exchange, symbol)` pair — serialised as `"EXCHANGE:SYMBOL"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Instrument {
    pub exchange: String,
    pub symbol:   String,
}

impl Instrument {
    pub fn new(exchange: impl Into<String>, symbol: impl Into<String>) -> Self {
        Self {
            exchange: exchange.into(),
            symbol:   symbol.into(),
        }
    }

    /// เช็คว่า exchange/symbol ตรงกันไหม (ใช้ตอนกรอง alert / order)
    #[inline]
    pub fn matches(&self, exchange: &str, symbol: &str) -> bool {
        self.exchange == exchange && self.symbol == symbol
    }
}

impl fmt::Display for Instrument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.exchange, self.symbol)
    }
}

impl FromStr for Instrument {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // symbol อาจมีช่องว่าง เช่น "NSE:NIFTY 50" → split แค่ ':' ตัวแรก
        match s.split_once(':') {
            Some((exchange, symbol)) if !exchange.trim().is_empty() && !symbol.trim().is_empty() => {
                Ok(Self::new(exchange.trim(), symbol.trim()))
            }
            _ => Err(format!("invalid instrument '{s}', expected EXCHANGE:SYMBOL")),
        }
    }
}

impl Serialize for Instrument {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Instrument {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

// ─── OHLC ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Ohlc {
    pub open:  Decimal,
    pub high:  Decimal,
    pub low:   Decimal,
    /// Previous session close (broker convention for live quotes).
    pub close: Decimal,
}

// ─── RawTick ──────────────────────────────────────────────────────────────────

/// Tick exactly as the broker's streaming feed delivers it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawTick {
    pub instrument_token: u32,
    pub last_price:       Decimal,
    pub ohlc:             Ohlc,
    #[serde(default = "Utc::now")]
    pub timestamp:        DateTime<Utc>,
}

// ─── PriceData ────────────────────────────────────────────────────────────────

/// Normalised quote carried inside every [`PriceMessage`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceData {
    pub last_price:     Decimal,
    pub previous_close: Decimal,
    pub net_change:     Decimal,
    pub change_percent: Decimal,
    pub ohlc:           Ohlc,
    pub timestamp:      DateTime<Utc>,
}

impl PriceData {
    /// Derives `net_change` / `change_percent` from LTP and the OHLC close.
    pub fn from_quote(last_price: Decimal, ohlc: Ohlc, timestamp: DateTime<Utc>) -> Self {
        let previous_close = ohlc.close;
        let net_change = last_price - previous_close;
        let change_percent = if previous_close.is_zero() {
            Decimal::ZERO
        } else {
            (net_change / previous_close * Decimal::ONE_HUNDRED).round_dp(2)
        };

        Self {
            last_price,
            previous_close,
            net_change,
            change_percent,
            ohlc,
            timestamp,
        }
    }
}

// ─── PriceMessage ─────────────────────────────────────────────────────────────

/// Envelope delivered to each subscriber queue by the PricePublisher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceMessage {
    pub instrument:   Instrument,
    pub price_data:   PriceData,
    pub published_at: DateTime<Utc>,
}

// ─── Broker REST payloads ─────────────────────────────────────────────────────

/// One historical bar returned by `get_historical_candles`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub timestamp: DateTime<Utc>,
    pub open:      Decimal,
    pub high:      Decimal,
    pub low:       Decimal,
    pub close:     Decimal,
    #[serde(default)]
    pub volume:    u64,
}

/// Snapshot quote returned by `get_quote`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub last_price: Decimal,
    pub ohlc:       Ohlc,
    #[serde(default)]
    pub net_change: Decimal,
    pub timestamp:  DateTime<Utc>,
}
