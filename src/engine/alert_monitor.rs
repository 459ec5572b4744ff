//! # engine::alert_monitor
//!
//! **AlertMonitor** — แปลง tick เป็น trigger event เมื่อราคาแตะ level
//!
//! ## ลำดับการตรวจสอบ (ทุก Tick, ทุก alert ที่ active ของ instrument นั้น)
//! ```text
//! 1. Expiry   — intraday + expires_at ผ่านแล้ว → deactivate (ไม่ trigger)
//! 2. Breach   — |price − level| ≤ level × 0.0001 (touch, ไม่ดูทิศ)
//! 3. Cutoff   — breach ≥ 09:30 UTC → mark triggered แต่ไม่ส่งต่อ
//! 4. Forward  — mark triggered + ส่ง TriggerEvent ไปยัง TriggerSink
//! ```
//! Errors on one alert are logged and the remaining alerts still run.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::{debug, error, info, warn};

use crate::engine::publisher::PricePublisher;
use crate::engine::session::SessionClock;
use crate::engine::worker::{MonitorWorker, PriceConsumer};
use crate::error::AppError;
use crate::events::{EngineEvent, EventBus};
use crate::models::{LevelAlert, PriceMessage, TriggerEvent};
use crate::store::Store;

pub const SUBSCRIBER_ID: &str = "alert_monitor";

/// 1 basis point.
pub const ALERT_TOLERANCE: Decimal = dec!(0.0001);

/// Touch semantics: within 1 bp of the level, from either side.
#[inline]
pub fn is_breached(level: Decimal, price: Decimal) -> bool {
    price == level || (price - level).abs() <= level * ALERT_TOLERANCE
}

// ─── Downstream sink ──────────────────────────────────────────────────────────

/// Receives trigger events that passed the cutoff rule.
#[async_trait]
pub trait TriggerSink: Send + Sync {
    async fn on_trigger(&self, event: TriggerEvent) -> Result<(), AppError>;
}

// ─── Outcome ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertOutcome {
    /// ยังไม่แตะ level
    Waiting,
    Expired,
    /// `forwarded = false` → breach หลัง cutoff
    Triggered { forwarded: bool },
    /// Another writer already closed the alert, or the row is invalid.
    Skipped,
}

// ─── AlertMonitor ─────────────────────────────────────────────────────────────

pub struct AlertMonitor {
    store:     Arc<dyn Store>,
    sink:      Arc<dyn TriggerSink>,
    publisher: Arc<PricePublisher>,
    session:   SessionClock,
    events:    EventBus,
    poll:      Duration,
    shutdown:  Duration,
    worker:    Mutex<Option<MonitorWorker>>,
}

impl AlertMonitor {
    pub fn new(
        store:     Arc<dyn Store>,
        sink:      Arc<dyn TriggerSink>,
        publisher: Arc<PricePublisher>,
        session:   SessionClock,
        events:    EventBus,
        poll:      Duration,
        shutdown:  Duration,
    ) -> Self {
        Self {
            store,
            sink,
            publisher,
            session,
            events,
            poll,
            shutdown,
            worker: Mutex::new(None),
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────────────────────

    /// Spawns the worker.  Returns `false` if it is already running.
    pub fn start(self: &Arc<Self>) -> bool {
        let mut worker = self.worker.lock();
        if worker.as_ref().is_some_and(|w| !w.is_finished()) {
            return false;
        }
        *worker = Some(MonitorWorker::spawn(
            SUBSCRIBER_ID,
            Arc::clone(&self.publisher),
            Arc::clone(self) as Arc<dyn PriceConsumer>,
            self.poll,
        ));
        info!("🔔 AlertMonitor started");
        true
    }

    pub async fn stop(&self) {
        // take() ก่อน await — ห้ามถือ lock ข้าม await
        let worker = self.worker.lock().take();
        if let Some(worker) = worker {
            worker.stop(self.shutdown).await;
            info!("AlertMonitor stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.worker.lock().as_ref().is_some_and(|w| !w.is_finished())
    }

    // ── Evaluation ────────────────────────────────────────────────────────────

    /// Evaluates every active alert for the message's instrument.
    pub async fn process_tick(
        &self,
        message: &PriceMessage,
        now:     DateTime<Utc>,
    ) -> Vec<(i64, AlertOutcome)> {
        let instrument = &message.instrument;
        let alerts = match self.store.active_alerts_for(instrument) {
            Ok(alerts) => alerts,
            Err(e) => {
                error!(instrument = %instrument, error = %e, "Failed to load active alerts");
                return Vec::new();
            }
        };

        let mut outcomes = Vec::with_capacity(alerts.len());
        for alert in alerts {
            let outcome = match self.evaluate_alert(&alert, message, now).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!(alert_id = alert.id, error = %e, "Alert evaluation failed — continuing");
                    AlertOutcome::Skipped
                }
            };
            outcomes.push((alert.id, outcome));
        }
        outcomes
    }

    async fn evaluate_alert(
        &self,
        alert:   &LevelAlert,
        message: &PriceMessage,
        now:     DateTime<Utc>,
    ) -> Result<AlertOutcome, AppError> {
        // ── 1. Expiry ─────────────────────────────────────────────────────────
        if alert.is_expired(now) {
            if self.store.deactivate_alert(alert.id)? {
                info!(alert_id = alert.id, "⌛ Intraday alert expired");
                self.events.emit(&EngineEvent::AlertExpired { alert_id: alert.id });
            }
            return Ok(AlertOutcome::Expired);
        }

        if alert.price_level <= Decimal::ZERO {
            warn!(alert_id = alert.id, level = %alert.price_level, "Alert has non-positive level — skipped");
            return Ok(AlertOutcome::Skipped);
        }

        // ── 2. Breach ─────────────────────────────────────────────────────────
        let current_price = message.price_data.last_price;
        if !is_breached(alert.price_level, current_price) {
            return Ok(AlertOutcome::Waiting);
        }

        if !self.store.mark_alert_triggered(alert.id, now)? {
            return Ok(AlertOutcome::Skipped);
        }

        // ── 3. Cutoff ─────────────────────────────────────────────────────────
        let forwarded = !self.session.is_after_cutoff(now);

        let mut snapshot = alert.clone();
        snapshot.is_active    = false;
        snapshot.is_triggered = true;
        snapshot.triggered_at = Some(now);
        self.events.emit(&EngineEvent::AlertTriggered {
            alert: Box::new(snapshot),
            current_price,
            forwarded,
        });

        if !forwarded {
            info!(
                alert_id = alert.id,
                level    = %alert.price_level,
                price    = %current_price,
                "🚫 Alert breached after cutoff — closed without signal"
            );
            return Ok(AlertOutcome::Triggered { forwarded: false });
        }

        // ── 4. Forward ────────────────────────────────────────────────────────
        info!(
            alert_id   = alert.id,
            user_id    = alert.user_id,
            instrument = %message.instrument,
            level      = %alert.price_level,
            price      = %current_price,
            "🎯 Level alert triggered"
        );

        let event = TriggerEvent {
            level_alert_id: alert.id,
            user_id:        alert.user_id,
            instrument:     message.instrument.clone(),
            price_level:    alert.price_level,
            current_price,
            triggered_at:   now,
            price_data:     message.price_data.clone(),
        };
        if let Err(e) = self.sink.on_trigger(event).await {
            // alert ปิดไปแล้ว — trigger ครั้งนี้ถือว่าจบ
            warn!(alert_id = alert.id, error = %e, "Signal pipeline failed for trigger");
        }

        Ok(AlertOutcome::Triggered { forwarded: true })
    }
}

#[async_trait]
impl PriceConsumer for AlertMonitor {
    async fn on_price(&self, message: PriceMessage) {
        let outcomes = self.process_tick(&message, Utc::now()).await;
        debug!(instrument = %message.instrument, alerts = outcomes.len(), "Alerts evaluated");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Instrument, NewLevelAlert, TtlType};
    use crate::store::InMemoryStore;
    use crate::testkit::price_data;
    use chrono::{Duration as ChronoDuration, TimeZone};

    #[derive(Default)]
    struct RecordingSink {
        events: Mutex<Vec<TriggerEvent>>,
        fail:   bool,
    }

    #[async_trait]
    impl TriggerSink for RecordingSink {
        async fn on_trigger(&self, event: TriggerEvent) -> Result<(), AppError> {
            self.events.lock().push(event);
            if self.fail {
                return Err(AppError::Broker("boom".into()));
            }
            Ok(())
        }
    }

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 3, h, m, 0).unwrap()
    }

    fn monitor(store: Arc<InMemoryStore>, sink: Arc<RecordingSink>) -> AlertMonitor {
        AlertMonitor::new(
            store,
            sink,
            Arc::new(PricePublisher::default()),
            SessionClock::default(),
            EventBus::default(),
            Duration::from_millis(20),
            Duration::from_secs(1),
        )
    }

    fn add_alert(store: &InMemoryStore, level: Decimal, ttl_type: TtlType, expires_at: Option<DateTime<Utc>>) -> LevelAlert {
        store
            .create_alert(NewLevelAlert {
                user_id: 1,
                exchange: "NSE".into(),
                symbol: "NIFTY 50".into(),
                price_level: level,
                ttl_type,
                expires_at,
            })
            .unwrap()
    }

    fn tick(price: Decimal, now: DateTime<Utc>) -> PriceMessage {
        PriceMessage {
            instrument:   Instrument::new("NSE", "NIFTY 50"),
            price_data:   price_data(price, now),
            published_at: now,
        }
    }

    #[test]
    fn tolerance_is_one_basis_point_either_side() {
        let level = dec!(25000);
        assert!(is_breached(level, dec!(25000)));
        assert!(is_breached(level, dec!(25002)));
        assert!(is_breached(level, dec!(24997.5)));
        assert!(is_breached(level, dec!(25002.5)));
        assert!(!is_breached(level, dec!(25003)));
        assert!(!is_breached(level, dec!(24997)));
    }

    #[tokio::test]
    async fn breach_before_cutoff_triggers_and_forwards() {
        let store = Arc::new(InMemoryStore::new());
        let sink = Arc::new(RecordingSink::default());
        let monitor = monitor(store.clone(), sink.clone());
        let alert = add_alert(&store, dec!(25000), TtlType::Longterm, None);

        let now = at(5, 0);
        let outcomes = monitor.process_tick(&tick(dec!(25002), now), now).await;
        assert_eq!(outcomes, vec![(alert.id, AlertOutcome::Triggered { forwarded: true })]);

        let stored = store.get_alert(alert.id).unwrap().unwrap();
        assert!(stored.is_triggered && !stored.is_active);
        assert_eq!(stored.triggered_at, Some(now));

        let events = sink.events.lock();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].level_alert_id, alert.id);
        assert_eq!(events[0].current_price, dec!(25002));
        assert_eq!(events[0].price_level, dec!(25000));
    }

    #[tokio::test]
    async fn price_outside_tolerance_keeps_waiting() {
        let store = Arc::new(InMemoryStore::new());
        let sink = Arc::new(RecordingSink::default());
        let monitor = monitor(store.clone(), sink.clone());
        let alert = add_alert(&store, dec!(25000), TtlType::Longterm, None);

        let now = at(5, 0);
        let outcomes = monitor.process_tick(&tick(dec!(25003), now), now).await;
        assert_eq!(outcomes, vec![(alert.id, AlertOutcome::Waiting)]);
        assert!(store.get_alert(alert.id).unwrap().unwrap().is_active);
        assert!(sink.events.lock().is_empty());
    }

    #[tokio::test]
    async fn breach_after_cutoff_is_closed_but_not_forwarded() {
        let store = Arc::new(InMemoryStore::new());
        let sink = Arc::new(RecordingSink::default());
        let monitor = monitor(store.clone(), sink.clone());
        let alert = add_alert(&store, dec!(25000), TtlType::Longterm, None);

        let now = at(9, 31);
        let outcomes = monitor.process_tick(&tick(dec!(25000), now), now).await;
        assert_eq!(outcomes, vec![(alert.id, AlertOutcome::Triggered { forwarded: false })]);
        assert!(store.get_alert(alert.id).unwrap().unwrap().is_triggered);
        assert!(sink.events.lock().is_empty());
    }

    #[tokio::test]
    async fn expired_intraday_alert_is_deactivated_without_trigger() {
        let store = Arc::new(InMemoryStore::new());
        let sink = Arc::new(RecordingSink::default());
        let monitor = monitor(store.clone(), sink.clone());
        let now = at(5, 0);
        let alert = add_alert(&store, dec!(25000), TtlType::Intraday, Some(now - ChronoDuration::minutes(1)));

        let outcomes = monitor.process_tick(&tick(dec!(25000), now), now).await;
        assert_eq!(outcomes, vec![(alert.id, AlertOutcome::Expired)]);

        let stored = store.get_alert(alert.id).unwrap().unwrap();
        assert!(!stored.is_active);
        assert!(!stored.is_triggered);
        assert!(sink.events.lock().is_empty());
    }

    #[tokio::test]
    async fn triggered_alert_does_not_fire_twice() {
        let store = Arc::new(InMemoryStore::new());
        let sink = Arc::new(RecordingSink::default());
        let monitor = monitor(store.clone(), sink.clone());
        add_alert(&store, dec!(25000), TtlType::Longterm, None);

        let now = at(5, 0);
        monitor.process_tick(&tick(dec!(25000), now), now).await;
        let second = monitor.process_tick(&tick(dec!(25000), now), now).await;
        assert!(second.is_empty());
        assert_eq!(sink.events.lock().len(), 1);
    }

    #[tokio::test]
    async fn sink_failure_and_bad_alert_do_not_halt_monitoring() {
        let store = Arc::new(InMemoryStore::new());
        let sink = Arc::new(RecordingSink { fail: true, ..Default::default() });
        let monitor = monitor(store.clone(), sink.clone());
        let bad = add_alert(&store, dec!(0), TtlType::Longterm, None);
        let first = add_alert(&store, dec!(25000), TtlType::Longterm, None);
        let second = add_alert(&store, dec!(25001), TtlType::Longterm, None);

        let now = at(5, 0);
        let outcomes = monitor.process_tick(&tick(dec!(25000.5), now), now).await;
        assert_eq!(
            outcomes,
            vec![
                (bad.id, AlertOutcome::Skipped),
                (first.id, AlertOutcome::Triggered { forwarded: true }),
                (second.id, AlertOutcome::Triggered { forwarded: true }),
            ]
        );
        assert_eq!(sink.events.lock().len(), 2);
    }

    #[tokio::test]
    async fn start_is_idempotent_and_stop_unsubscribes() {
        let store = Arc::new(InMemoryStore::new());
        let publisher = Arc::new(PricePublisher::default());
        let monitor = Arc::new(AlertMonitor::new(
            store,
            Arc::new(RecordingSink::default()),
            Arc::clone(&publisher),
            SessionClock::default(),
            EventBus::default(),
            Duration::from_millis(20),
            Duration::from_secs(1),
        ));

        assert!(monitor.start());
        assert!(!monitor.start());
        assert!(monitor.is_running());
        assert!(publisher.is_subscribed(SUBSCRIBER_ID));

        monitor.stop().await;
        assert!(!monitor.is_running());
        assert!(!publisher.is_subscribed(SUBSCRIBER_ID));
    }
}
