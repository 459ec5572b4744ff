//! # models::signal
//!
//! [`TriggerEvent`] — อีเวนต์จาก AlertMonitor เมื่อราคาแตะ level
//! [`TradeSignal`]  — ผลลัพธ์จาก SignalGenerator (immutable ยกเว้น `status`)

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::{Instrument, PriceData, TtlType};

// ─── Enums ────────────────────────────────────────────────────────────────────

/// Option side chosen for the signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OptionSide {
    Call,
    Put,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Uptrend,
    Downtrend,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalStatus {
    Pending,
    Sent,
    Executed,
    Closed,
    Cancelled,
}

// ─── TriggerEvent ─────────────────────────────────────────────────────────────

/// Level breach forwarded from the AlertMonitor to the signal pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerEvent {
    pub level_alert_id: i64,
    pub user_id:        i64,
    pub instrument:     Instrument,
    pub price_level:    Decimal,
    pub current_price:  Decimal,
    pub triggered_at:   DateTime<Utc>,
    pub price_data:     PriceData,
}

// ─── TradeSignal ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeSignal {
    pub id:              i64,
    pub user_id:         i64,
    pub level_alert_id:  i64,
    pub exchange:        String,
    pub symbol:          String,
    pub option_side:     OptionSide,
    pub entry_price:     Decimal,
    pub stop_loss:       Decimal,
    pub target:          Decimal,
    pub trend_direction: TrendDirection,
    pub status:          SignalStatus,
    pub ttl_type:        TtlType,
    pub created_at:      DateTime<Utc>,
}

impl TradeSignal {
    pub fn instrument(&self) -> Instrument {
        Instrument::new(&self.exchange, &self.symbol)
    }
}

/// Signal before the store assigns an id.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTradeSignal {
    pub user_id:         i64,
    pub level_alert_id:  i64,
    pub exchange:        String,
    pub symbol:          String,
    pub option_side:     OptionSide,
    pub entry_price:     Decimal,
    pub stop_loss:       Decimal,
    pub target:          Decimal,
    pub trend_direction: TrendDirection,
    pub ttl_type:        TtlType,
}
