//! # engine::publisher
//!
//! **PricePublisher** — in-process pub/sub hub ระหว่าง tick ingestion กับ monitors
//!
//! ```text
//!  broker tick ──▶ publish() ──try_send──▶ [queue "alert_monitor"]  ──▶ AlertMonitor
//!                             ──try_send──▶ [queue "order_orchestrator"] ──▶ OrderOrchestrator
//! ```
//!
//! ## Delivery
//! - Best-effort, at-most-once, FIFO per subscriber queue.
//! - `publish` never blocks: each enqueue is a `try_send`.  A full or closed
//!   queue drops **that** subscriber only.
//! - The registry mutex is held for the map read/update only; `try_send`
//!   never waits, so no blocking send ever happens under the lock.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use parking_lot::Mutex;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, warn};

use crate::events::{EngineEvent, EventBus};
use crate::models::{Instrument, PriceData, PriceMessage};

/// Default per-subscriber queue capacity.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1000;

// ─── Publish Report ───────────────────────────────────────────────────────────

/// Outcome of one `publish` call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishReport {
    pub delivered: usize,
    /// Subscribers removed during this publish (queue full / closed).
    pub dropped:   Vec<String>,
}

// ─── PricePublisher ───────────────────────────────────────────────────────────

pub struct PricePublisher {
    subscribers: Mutex<HashMap<String, mpsc::Sender<PriceMessage>>>,
    capacity:    usize,
    events:      EventBus,
    published:   AtomicU64,
}

impl PricePublisher {
    pub fn new(capacity: usize, events: EventBus) -> Self {
        Self {
            subscribers: Mutex::new(HashMap::new()),
            capacity:    capacity.max(1),
            events,
            published:   AtomicU64::new(0),
        }
    }

    /// Registers a bounded queue under `id`, replacing any existing one.
    ///
    /// The replaced queue's receiver sees the channel close once drained.
    pub fn subscribe(&self, id: &str) -> mpsc::Receiver<PriceMessage> {
        let (tx, rx) = mpsc::channel(self.capacity);
        let replaced = self.subscribers.lock().insert(id.to_string(), tx).is_some();

        if replaced {
            debug!(subscriber = id, "Subscriber re-registered — previous queue replaced");
        } else {
            debug!(subscriber = id, capacity = self.capacity, "Subscriber registered");
        }
        rx
    }

    /// Removes `id`'s queue.  Idempotent — returns `false` if it was absent.
    pub fn unsubscribe(&self, id: &str) -> bool {
        let removed = self.subscribers.lock().remove(id).is_some();
        if removed {
            debug!(subscriber = id, "Subscriber removed");
        }
        removed
    }

    /// Fan-out `{instrument, price_data, published_at}` to every subscriber.
    pub fn publish(&self, instrument: Instrument, price_data: PriceData) -> PublishReport {
        let message = PriceMessage {
            instrument,
            price_data,
            published_at: Utc::now(),
        };
        self.published.fetch_add(1, Ordering::Relaxed);

        let mut report = PublishReport::default();
        {
            let mut subscribers = self.subscribers.lock();
            subscribers.retain(|id, tx| match tx.try_send(message.clone()) {
                Ok(()) => {
                    report.delivered += 1;
                    true
                }
                Err(TrySendError::Full(_)) | Err(TrySendError::Closed(_)) => {
                    report.dropped.push(id.clone());
                    false
                }
            });
        }

        // Log + broadcast หลังปล่อย lock แล้ว
        for id in &report.dropped {
            warn!(
                subscriber = %id,
                instrument = %message.instrument,
                "⚠️ Subscriber queue full or closed — subscriber dropped"
            );
            self.events.emit(&EngineEvent::SubscriberDropped {
                subscriber_id: id.clone(),
            });
        }

        report
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }

    pub fn is_subscribed(&self, id: &str) -> bool {
        self.subscribers.lock().contains_key(id)
    }

    /// Total `publish` calls since startup.
    pub fn published_count(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }
}

impl Default for PricePublisher {
    fn default() -> Self {
        Self::new(DEFAULT_QUEUE_CAPACITY, EventBus::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Ohlc;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn price(last: Decimal) -> PriceData {
        let ohlc = Ohlc { open: dec!(100), high: dec!(110), low: dec!(90), close: dec!(100) };
        PriceData::from_quote(last, ohlc, Utc::now())
    }

    fn nifty() -> Instrument {
        Instrument::new("NSE", "NIFTY 50")
    }

    #[tokio::test]
    async fn delivers_to_every_subscriber_in_order() {
        let publisher = PricePublisher::default();
        let mut a = publisher.subscribe("a");
        let mut b = publisher.subscribe("b");

        publisher.publish(nifty(), price(dec!(101)));
        let report = publisher.publish(nifty(), price(dec!(102)));
        assert_eq!(report.delivered, 2);
        assert!(report.dropped.is_empty());

        for rx in [&mut a, &mut b] {
            assert_eq!(rx.recv().await.unwrap().price_data.last_price, dec!(101));
            assert_eq!(rx.recv().await.unwrap().price_data.last_price, dec!(102));
        }
        assert_eq!(publisher.published_count(), 2);
    }

    #[tokio::test]
    async fn full_queue_drops_only_that_subscriber() {
        let publisher = PricePublisher::new(1, EventBus::default());
        let _slow = publisher.subscribe("slow");
        let mut fast = publisher.subscribe("fast");
        assert_eq!(publisher.subscriber_count(), 2);

        publisher.publish(nifty(), price(dec!(101)));
        fast.recv().await.unwrap();

        // slow ยังไม่ได้อ่าน → queue เต็ม → โดนตัด
        let report = publisher.publish(nifty(), price(dec!(102)));
        assert_eq!(report.dropped, vec!["slow".to_string()]);
        assert_eq!(report.delivered, 1);
        assert_eq!(publisher.subscriber_count(), 1);
        assert!(!publisher.is_subscribed("slow"));
        assert_eq!(fast.recv().await.unwrap().price_data.last_price, dec!(102));

        let report = publisher.publish(nifty(), price(dec!(103)));
        assert!(report.dropped.is_empty());
        assert_eq!(report.delivered, 1);
    }

    #[tokio::test]
    async fn closed_receiver_is_dropped_and_broadcast() {
        let events = EventBus::new(8);
        let mut event_rx = events.subscribe();
        let publisher = PricePublisher::new(8, events);

        drop(publisher.subscribe("gone"));
        let mut alive = publisher.subscribe("alive");

        let report = publisher.publish(nifty(), price(dec!(100)));
        assert_eq!(report.dropped, vec!["gone".to_string()]);
        assert_eq!(publisher.subscriber_count(), 1);
        assert!(alive.recv().await.is_some());

        let event = event_rx.recv().await.unwrap();
        assert!(event.contains("SUBSCRIBER_DROPPED"));
        assert!(event.contains("gone"));
    }

    #[tokio::test]
    async fn resubscribe_replaces_previous_queue() {
        let publisher = PricePublisher::default();
        let mut old = publisher.subscribe("monitor");
        let mut new = publisher.subscribe("monitor");
        assert_eq!(publisher.subscriber_count(), 1);

        publisher.publish(nifty(), price(dec!(100)));
        assert!(old.recv().await.is_none());
        assert!(new.recv().await.is_some());
    }

    #[test]
    fn unsubscribe_is_idempotent() {
        let publisher = PricePublisher::default();
        let _rx = publisher.subscribe("x");
        assert!(publisher.unsubscribe("x"));
        assert!(!publisher.unsubscribe("x"));
        assert_eq!(publisher.subscriber_count(), 0);
    }

    #[test]
    fn publish_without_subscribers_is_a_no_op() {
        let publisher = PricePublisher::default();
        let report = publisher.publish(nifty(), price(dec!(100)));
        assert_eq!(report, PublishReport::default());
    }
}
