//! # engine::worker
//!
//! Background loop shared by AlertMonitor and OrderOrchestrator.
//!
//! ```text
//! loop {
//!   select! {
//!     shutdown signal        → break
//!     timeout(poll, recv())  → Some(msg) → consumer.on_price(msg)
//!                              None      → queue dropped by publisher → resubscribe
//!                              elapsed   → idle, loop again
//!   }
//! }
//! ```
//! The bounded wait is the only suspension point besides the consumer
//! itself.  Stop = send on the `watch` channel, join with a timeout, abort
//! the task if it does not finish in time.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::engine::publisher::PricePublisher;
use crate::models::PriceMessage;

/// Anything that consumes price messages on a monitor worker.
#[async_trait]
pub trait PriceConsumer: Send + Sync + 'static {
    async fn on_price(&self, message: PriceMessage);
}

pub struct MonitorWorker {
    subscriber_id: &'static str,
    publisher:     Arc<PricePublisher>,
    shutdown:      watch::Sender<bool>,
    handle:        JoinHandle<()>,
}

impl MonitorWorker {
    /// Subscribes `subscriber_id` and spawns the drain loop.
    pub fn spawn(
        subscriber_id: &'static str,
        publisher:     Arc<PricePublisher>,
        consumer:      Arc<dyn PriceConsumer>,
        poll:          Duration,
    ) -> Self {
        let (shutdown, mut shutdown_rx) = watch::channel(false);
        let mut rx = publisher.subscribe(subscriber_id);
        let loop_publisher = Arc::clone(&publisher);

        let handle = tokio::spawn(async move {
            info!(subscriber = subscriber_id, "▶️ Monitor worker started");

            loop {
                let polled = tokio::select! {
                    biased;
                    // Err = sender หายไปแล้ว → ถือว่า shutdown เหมือนกัน
                    _ = shutdown_rx.changed() => break,
                    polled = tokio::time::timeout(poll, rx.recv()) => polled,
                };

                match polled {
                    Ok(Some(message)) => consumer.on_price(message).await,
                    Ok(None) => {
                        warn!(
                            subscriber = subscriber_id,
                            "Subscription queue closed by publisher — resubscribing"
                        );
                        rx = loop_publisher.subscribe(subscriber_id);
                    }
                    Err(_) => debug!(subscriber = subscriber_id, "idle poll"),
                }
            }

            loop_publisher.unsubscribe(subscriber_id);
            info!(subscriber = subscriber_id, "⏹️ Monitor worker stopped");
        });

        Self {
            subscriber_id,
            publisher,
            shutdown,
            handle,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Signals shutdown and joins; aborts the task after `timeout`.
    pub async fn stop(self, timeout: Duration) {
        let _ = self.shutdown.send(true);
        let abort = self.handle.abort_handle();

        match tokio::time::timeout(timeout, self.handle).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(subscriber = self.subscriber_id, error = %e, "Monitor worker ended abnormally"),
            Err(_) => {
                warn!(subscriber = self.subscriber_id, "Monitor shutdown timed out — aborting worker");
                abort.abort();
            }
        }

        // ลบ subscription เสมอ แม้ worker จะโดน abort ไปก่อน
        self.publisher.unsubscribe(self.subscriber_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    use crate::models::{Instrument, Ohlc, PriceData};
    use chrono::Utc;
    use parking_lot::Mutex;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    #[derive(Default)]
    struct Recorder {
        prices: Mutex<Vec<Decimal>>,
    }

    #[async_trait]
    impl PriceConsumer for Recorder {
        async fn on_price(&self, message: PriceMessage) {
            self.prices.lock().push(message.price_data.last_price);
        }
    }

    fn tick(last: Decimal) -> PriceData {
        let ohlc = Ohlc { open: last, high: last, low: last, close: last };
        PriceData::from_quote(last, ohlc, Utc::now())
    }

    async fn wait_for(recorder: &Recorder, count: usize) {
        for _ in 0..200 {
            if recorder.prices.lock().len() >= count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("consumer did not receive {count} messages");
    }

    #[tokio::test]
    async fn worker_drains_queue_and_unsubscribes_on_stop() {
        let publisher = Arc::new(PricePublisher::default());
        let recorder = Arc::new(Recorder::default());
        let worker = MonitorWorker::spawn(
            "recorder",
            Arc::clone(&publisher),
            recorder.clone(),
            Duration::from_millis(20),
        );
        assert!(publisher.is_subscribed("recorder"));

        let inst = Instrument::new("NSE", "INFY");
        publisher.publish(inst.clone(), tick(dec!(1)));
        publisher.publish(inst, tick(dec!(2)));
        wait_for(&recorder, 2).await;
        assert_eq!(*recorder.prices.lock(), vec![dec!(1), dec!(2)]);

        worker.stop(Duration::from_secs(1)).await;
        assert!(!publisher.is_subscribed("recorder"));
    }

    #[tokio::test]
    async fn worker_resubscribes_after_being_dropped() {
        let publisher = Arc::new(PricePublisher::default());
        let recorder = Arc::new(Recorder::default());
        let worker = MonitorWorker::spawn(
            "recorder",
            Arc::clone(&publisher),
            recorder.clone(),
            Duration::from_millis(20),
        );

        // จำลอง publisher ตัดทิ้ง
        publisher.unsubscribe("recorder");
        for _ in 0..200 {
            if publisher.is_subscribed("recorder") {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(publisher.is_subscribed("recorder"));

        publisher.publish(Instrument::new("NSE", "TCS"), tick(dec!(7)));
        wait_for(&recorder, 1).await;

        worker.stop(Duration::from_secs(1)).await;
    }

    // ── Stuck consumer ────────────────────────────────────────────────────────

    /// `on_price` ค้างตลอด — ธงใน guard บอกว่า future ถูก drop (task โดน abort)
    #[derive(Default)]
    struct Stuck {
        entered: AtomicBool,
        dropped: Arc<AtomicBool>,
    }

    struct DropFlag(Arc<AtomicBool>);

    impl Drop for DropFlag {
        fn drop(&mut self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl PriceConsumer for Stuck {
        async fn on_price(&self, _message: PriceMessage) {
            let _guard = DropFlag(Arc::clone(&self.dropped));
            self.entered.store(true, Ordering::SeqCst);
            std::future::pending::<()>().await;
        }
    }

    async fn until(flag: &AtomicBool) -> bool {
        for _ in 0..200 {
            if flag.load(Ordering::SeqCst) {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        false
    }

    #[tokio::test]
    async fn stop_aborts_stuck_consumer_and_unsubscribes() {
        let publisher = Arc::new(PricePublisher::default());
        let stuck = Arc::new(Stuck::default());
        let worker = MonitorWorker::spawn(
            "stuck",
            Arc::clone(&publisher),
            stuck.clone(),
            Duration::from_millis(20),
        );

        publisher.publish(Instrument::new("NSE", "SBIN"), tick(dec!(3)));
        assert!(until(&stuck.entered).await, "consumer never received the tick");

        let stopped = tokio::time::timeout(
            Duration::from_secs(2),
            worker.stop(Duration::from_millis(50)),
        )
        .await;
        assert!(stopped.is_ok(), "stop did not return after its join timeout");
        assert!(!publisher.is_subscribed("stuck"));

        assert!(until(&stuck.dropped).await, "worker task was not aborted");
        // task ถูก drop แล้ว → ไม่มีใครถือ consumer นอกจาก test
        assert_eq!(Arc::strong_count(&stuck), 1);
    }
}
