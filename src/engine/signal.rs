//! # engine::signal
//!
//! **SignalGenerator (TRE)** — TriggerEvent → TradeSignal
//!
//! ## ลำดับการทำงาน
//! ```text
//! 1. TRE settings ของ user ต้องมีและ active     → ไม่มี = NotConfigured
//! 2. TrendDirectionResolver                      → Indeterminate = Rejected
//!    FromTop    ⇒ CALL / downtrend
//!    FromBottom ⇒ PUT  / uptrend
//! 3. entry = current price, SL / target จาก %
//! 4. Dedup: pending signal (exchange, symbol, side) ที่ entry ห่างไม่เกิน 1% → Duplicate
//! 5. Persist (status = pending)
//! ```

use std::sync::Arc;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::{info, warn};

use crate::engine::trend::{Approach, TrendDirectionResolver};
use crate::error::AppError;
use crate::events::{EngineEvent, EventBus};
use crate::models::{NewTradeSignal, OptionSide, TradeSignal, TrendDirection, TriggerEvent};
use crate::store::Store;

/// Pending signals whose entry is within 1% of a new one suppress it.
pub const DEDUP_BAND: Decimal = dec!(0.01);

// ─── Outcome ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum SignalOutcome {
    Created(TradeSignal),
    /// Expected no-op: a matching pending signal already exists.
    Duplicate { existing_signal_id: i64 },
    /// Expected no-op: direction could not be determined.
    Rejected { reason: &'static str },
}

// ─── Pricing ──────────────────────────────────────────────────────────────────

/// `(stop_loss, target)` for an entry.  PUT brackets are inverted.
pub fn bracket_prices(
    side:              OptionSide,
    entry:             Decimal,
    stop_loss_percent: Decimal,
    target_percent:    Decimal,
) -> (Decimal, Decimal) {
    let sl  = stop_loss_percent / Decimal::ONE_HUNDRED;
    let tgt = target_percent / Decimal::ONE_HUNDRED;

    // คง precision เต็ม ไม่ปัดทศนิยม
    match side {
        OptionSide::Call => (entry * (Decimal::ONE - sl), entry * (Decimal::ONE + tgt)),
        OptionSide::Put  => (entry * (Decimal::ONE + sl), entry * (Decimal::ONE - tgt)),
    }
}

#[inline]
fn within_dedup_band(existing: Decimal, new: Decimal) -> bool {
    (existing - new).abs() <= new.abs() * DEDUP_BAND
}

// ─── Generator ────────────────────────────────────────────────────────────────

pub struct SignalGenerator {
    store:  Arc<dyn Store>,
    trend:  TrendDirectionResolver,
    events: EventBus,
}

impl SignalGenerator {
    pub fn new(store: Arc<dyn Store>, trend: TrendDirectionResolver, events: EventBus) -> Self {
        Self { store, trend, events }
    }

    pub async fn generate(&self, event: &TriggerEvent) -> Result<SignalOutcome, AppError> {
        // ── 1. Settings ──────────────────────────────────────────────────────
        let settings = self
            .store
            .tre_settings(event.user_id)?
            .filter(|s| s.is_active)
            .ok_or_else(|| {
                AppError::NotConfigured(format!(
                    "TRE settings not configured for user {}",
                    event.user_id
                ))
            })?;

        // ── 2. Direction ─────────────────────────────────────────────────────
        let approach = self
            .trend
            .resolve(
                &event.instrument,
                event.price_level,
                settings.lookback_minutes,
                event.triggered_at,
            )
            .await?;

        let (option_side, trend_direction) = match approach {
            Approach::FromTop    => (OptionSide::Call, TrendDirection::Downtrend),
            Approach::FromBottom => (OptionSide::Put, TrendDirection::Uptrend),
            Approach::Indeterminate => {
                warn!(
                    alert_id   = event.level_alert_id,
                    instrument = %event.instrument,
                    "Trend indeterminate — no signal"
                );
                return Ok(SignalOutcome::Rejected { reason: "trend direction indeterminate" });
            }
        };

        // ── 3. Prices ────────────────────────────────────────────────────────
        let entry_price = event.current_price;
        let (stop_loss, target) = bracket_prices(
            option_side,
            entry_price,
            settings.stop_loss_percent,
            settings.target_percent,
        );

        // ── 4. Dedup ─────────────────────────────────────────────────────────
        // generate() ถูกเรียกจาก AlertMonitor worker ตัวเดียว check-then-create จึงไม่ race
        let pending = self.store.pending_signals_for(
            &event.instrument.exchange,
            &event.instrument.symbol,
            option_side,
        )?;
        if let Some(existing) = pending
            .iter()
            .find(|s| within_dedup_band(s.entry_price, entry_price))
        {
            info!(
                existing_signal_id = existing.id,
                instrument         = %event.instrument,
                side               = ?option_side,
                entry              = %entry_price,
                "Duplicate signal suppressed"
            );
            return Ok(SignalOutcome::Duplicate { existing_signal_id: existing.id });
        }

        // ── 5. Persist ───────────────────────────────────────────────────────
        // snapshot ของ alert ณ ตอน trigger — ใช้แค่ ttl_type
        let ttl_type = self
            .store
            .get_alert(event.level_alert_id)?
            .map(|alert| alert.ttl_type)
            .unwrap_or_default();

        let signal = self.store.create_signal(NewTradeSignal {
            user_id:        event.user_id,
            level_alert_id: event.level_alert_id,
            exchange:       event.instrument.exchange.clone(),
            symbol:         event.instrument.symbol.clone(),
            option_side,
            entry_price,
            stop_loss,
            target,
            trend_direction,
            ttl_type,
        })?;

        info!(
            signal_id  = signal.id,
            user_id    = signal.user_id,
            instrument = %event.instrument,
            side       = ?signal.option_side,
            entry      = %signal.entry_price,
            stop_loss  = %signal.stop_loss,
            target     = %signal.target,
            "📈 Trade signal created"
        );
        self.events.emit(&EngineEvent::SignalCreated {
            signal: Box::new(signal.clone()),
        });

        Ok(SignalOutcome::Created(signal))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Instrument, NewLevelAlert, SignalStatus, TreSettings, TtlType};
    use crate::store::InMemoryStore;
    use crate::testkit::{minute_candles, price_data, StubBroker};
    use chrono::{TimeZone, Utc};

    struct Fixture {
        store:     Arc<InMemoryStore>,
        broker:    Arc<StubBroker>,
        generator: SignalGenerator,
    }

    fn nifty() -> Instrument {
        Instrument::new("NSE", "NIFTY 50")
    }

    fn fixture() -> Fixture {
        let store = Arc::new(InMemoryStore::new());
        let broker = Arc::new(StubBroker::new());
        store
            .upsert_tre_settings(TreSettings {
                user_id:           1,
                stop_loss_percent: dec!(1),
                target_percent:    dec!(2),
                lookback_minutes:  15,
                is_active:         true,
            })
            .unwrap();
        let generator = SignalGenerator::new(
            store.clone(),
            TrendDirectionResolver::new(broker.clone()),
            EventBus::default(),
        );
        Fixture { store, broker, generator }
    }

    fn trigger(fx: &Fixture, price: Decimal) -> TriggerEvent {
        let alert = fx
            .store
            .create_alert(NewLevelAlert {
                user_id:     1,
                exchange:    "NSE".into(),
                symbol:      "NIFTY 50".into(),
                price_level: dec!(25000),
                ttl_type:    TtlType::Longterm,
                expires_at:  None,
            })
            .unwrap();
        let at = Utc.with_ymd_and_hms(2024, 6, 3, 5, 0, 0).unwrap();
        TriggerEvent {
            level_alert_id: alert.id,
            user_id:        1,
            instrument:     nifty(),
            price_level:    dec!(25000),
            current_price:  price,
            triggered_at:   at,
            price_data:     price_data(price, at),
        }
    }

    fn approach_from_top(fx: &Fixture) {
        let end = Utc.with_ymd_and_hms(2024, 6, 3, 5, 0, 0).unwrap();
        fx.broker
            .set_candles(&nifty(), minute_candles(&[dec!(25300), dec!(25150), dec!(25010)], end));
    }

    #[test]
    fn call_and_put_brackets() {
        let (sl, tgt) = bracket_prices(OptionSide::Call, dec!(100), dec!(10), dec!(20));
        assert_eq!((sl, tgt), (dec!(90), dec!(120)));
        let (sl, tgt) = bracket_prices(OptionSide::Put, dec!(100), dec!(10), dec!(20));
        assert_eq!((sl, tgt), (dec!(110), dec!(80)));
    }

    #[test]
    fn brackets_keep_full_precision() {
        let (sl, tgt) = bracket_prices(OptionSide::Call, dec!(12.345), dec!(0.5), dec!(0.5));
        assert_eq!((sl, tgt), (dec!(12.283275), dec!(12.406725)));

        // premium ต่ำ ๆ bracket ต้องไม่ยุบเข้าหา entry
        let (sl, tgt) = bracket_prices(OptionSide::Call, dec!(0.50), dec!(1), dec!(1));
        assert_eq!((sl, tgt), (dec!(0.495), dec!(0.505)));
        assert!(sl < dec!(0.50) && tgt > dec!(0.50));

        let (sl, tgt) = bracket_prices(OptionSide::Put, dec!(0.50), dec!(1), dec!(1));
        assert_eq!((sl, tgt), (dec!(0.505), dec!(0.495)));
    }

    #[tokio::test]
    async fn from_top_creates_pending_call_signal() {
        let fx = fixture();
        approach_from_top(&fx);

        let outcome = fx.generator.generate(&trigger(&fx, dec!(25001))).await.unwrap();
        let signal = match outcome {
            SignalOutcome::Created(signal) => signal,
            other => panic!("expected a signal, got {other:?}"),
        };
        assert_eq!(signal.option_side, OptionSide::Call);
        assert_eq!(signal.trend_direction, TrendDirection::Downtrend);
        assert_eq!(signal.status, SignalStatus::Pending);
        assert_eq!(signal.entry_price, dec!(25001));
        assert_eq!(signal.stop_loss, dec!(24750.99));
        assert_eq!(signal.target, dec!(25501.02));
        assert_eq!(signal.ttl_type, TtlType::Longterm);
    }

    #[tokio::test]
    async fn from_bottom_creates_put_signal() {
        let fx = fixture();
        let end = Utc.with_ymd_and_hms(2024, 6, 3, 5, 0, 0).unwrap();
        fx.broker
            .set_candles(&nifty(), minute_candles(&[dec!(24700), dec!(24850), dec!(24990)], end));

        let outcome = fx.generator.generate(&trigger(&fx, dec!(25000))).await.unwrap();
        let signal = match outcome {
            SignalOutcome::Created(signal) => signal,
            other => panic!("expected a signal, got {other:?}"),
        };
        assert_eq!(signal.option_side, OptionSide::Put);
        assert_eq!(signal.trend_direction, TrendDirection::Uptrend);
        assert_eq!(signal.stop_loss, dec!(25250));
        assert_eq!(signal.target, dec!(24500));
    }

    #[tokio::test]
    async fn repeated_touch_within_one_percent_is_deduplicated() {
        let fx = fixture();
        approach_from_top(&fx);

        let first = fx.generator.generate(&trigger(&fx, dec!(25000))).await.unwrap();
        assert!(matches!(first, SignalOutcome::Created(_)));
        let second = fx.generator.generate(&trigger(&fx, dec!(25200))).await.unwrap();
        assert!(matches!(second, SignalOutcome::Duplicate { .. }));

        let signals = fx.store.signals_for_user(1).unwrap();
        assert_eq!(signals.len(), 1);
    }

    #[tokio::test]
    async fn non_pending_signal_does_not_block_new_one() {
        let fx = fixture();
        approach_from_top(&fx);

        let SignalOutcome::Created(first) =
            fx.generator.generate(&trigger(&fx, dec!(25000))).await.unwrap()
        else {
            panic!("expected first signal");
        };
        fx.store.update_signal_status(first.id, SignalStatus::Sent).unwrap();

        let second = fx.generator.generate(&trigger(&fx, dec!(25000))).await.unwrap();
        assert!(matches!(second, SignalOutcome::Created(_)));
    }

    #[tokio::test]
    async fn indeterminate_trend_creates_nothing() {
        let fx = fixture();
        let end = Utc.with_ymd_and_hms(2024, 6, 3, 5, 0, 0).unwrap();
        fx.broker.set_candles(&nifty(), minute_candles(&[dec!(25000)], end));

        let outcome = fx.generator.generate(&trigger(&fx, dec!(25000))).await.unwrap();
        assert!(matches!(outcome, SignalOutcome::Rejected { .. }));
        assert!(fx.store.signals_for_user(1).unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_settings_is_not_configured() {
        let fx = fixture();
        approach_from_top(&fx);
        let mut event = trigger(&fx, dec!(25000));
        event.user_id = 42;

        let err = fx.generator.generate(&event).await.unwrap_err();
        assert!(matches!(err, AppError::NotConfigured(_)));
    }

    #[tokio::test]
    async fn broker_failure_surfaces_as_error() {
        let fx = fixture();
        fx.broker.fail_market_data(true);

        let err = fx.generator.generate(&trigger(&fx, dec!(25000))).await.unwrap_err();
        assert!(matches!(err, AppError::Broker(_)));
        assert!(fx.store.signals_for_user(1).unwrap().is_empty());
    }
}
