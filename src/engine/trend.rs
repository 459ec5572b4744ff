//! # engine::trend
//!
//! **TrendDirectionResolver** — ราคาเข้าหา level มาจากด้านบนหรือด้านล่าง?
//!
//! ```text
//! tolerance = level × 0.5%
//! start_close > level + tol   → FromTop
//! start_close < level − tol   → FromBottom
//! otherwise                   → same test on avg_close, else Indeterminate
//! ```
//! Classification is a pure function of the candle series.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;
use tracing::{debug, warn};

use crate::broker::{BrokerGateway, CandleInterval};
use crate::error::AppError;
use crate::models::{Candle, Instrument};

/// 50 bps band around the level treated as "ambiguous".
pub const APPROACH_TOLERANCE: Decimal = dec!(0.005);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Approach {
    FromTop,
    FromBottom,
    Indeterminate,
}

/// Classifies the approach using the earliest close, then the mean close.
///
/// Needs at least two candles.  Order of `candles` does not matter — the
/// earliest is picked by timestamp.
pub fn classify_approach(level: Decimal, candles: &[Candle]) -> Approach {
    if candles.len() < 2 {
        return Approach::Indeterminate;
    }

    let start_close = match candles.iter().min_by_key(|c| c.timestamp) {
        Some(candle) => candle.close,
        None => return Approach::Indeterminate,
    };
    let total: Decimal = candles.iter().map(|c| c.close).sum();
    let avg_close = total / Decimal::from(candles.len());

    let tolerance = level * APPROACH_TOLERANCE;
    let side_of = |price: Decimal| {
        if price > level + tolerance {
            Approach::FromTop
        } else if price < level - tolerance {
            Approach::FromBottom
        } else {
            Approach::Indeterminate
        }
    };

    match side_of(start_close) {
        Approach::Indeterminate => side_of(avg_close),
        decided => decided,
    }
}

// ─── Resolver ─────────────────────────────────────────────────────────────────

pub struct TrendDirectionResolver {
    broker: Arc<dyn BrokerGateway>,
}

impl TrendDirectionResolver {
    pub fn new(broker: Arc<dyn BrokerGateway>) -> Self {
        Self { broker }
    }

    /// Fetches `[now - lookback, now]` minute candles and classifies them.
    ///
    /// Broker failures are returned as errors; the caller decides whether
    /// that ends the trigger (it does, for the SignalGenerator).
    pub async fn resolve(
        &self,
        instrument:       &Instrument,
        level:            Decimal,
        lookback_minutes: u32,
        now:              DateTime<Utc>,
    ) -> Result<Approach, AppError> {
        let from = now - Duration::minutes(i64::from(lookback_minutes));

        let candles = self
            .broker
            .get_historical_candles(instrument, CandleInterval::Minute, from, now)
            .await
            .map_err(|e| {
                warn!(instrument = %instrument, error = %e, "Historical candles unavailable");
                e
            })?;

        let approach = classify_approach(level, &candles);
        debug!(
            instrument = %instrument,
            level      = %level,
            candles    = candles.len(),
            approach   = ?approach,
            "Trend resolved"
        );
        Ok(approach)
    }
}
