//! # state
//!
//! AppState — ทุก component ของ engine ต่อกันที่นี่ และถูก inject เข้า Axum
//! handler ทุกตัวผ่าน `State<SharedState>`
//!
//! ```text
//! store ──┬──▶ SignalGenerator ──┐
//!         ├──▶ OrderOrchestrator ┴──▶ SignalPipeline ──▶ AlertMonitor
//! broker ─┘            ▲                                      ▲
//!                      └────────── PricePublisher ◀── TickIngestor
//! ```

use std::sync::atomic::AtomicU64;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::info;

use crate::broker::BrokerGateway;
use crate::config::AppConfig;
use crate::engine::alert_monitor::{AlertMonitor, TriggerSink};
use crate::engine::ingest::TickIngestor;
use crate::engine::orchestrator::OrderOrchestrator;
use crate::engine::pipeline::SignalPipeline;
use crate::engine::publisher::PricePublisher;
use crate::engine::session::SessionClock;
use crate::engine::signal::SignalGenerator;
use crate::engine::trend::TrendDirectionResolver;
use crate::events::EventBus;
use crate::store::Store;

// ─── AppState ─────────────────────────────────────────────────────────────────

pub struct AppState {
    pub config:       AppConfig,
    pub session:      SessionClock,

    // ── Collaborators ─────────────────────────────────────────────────────────
    pub store:        Arc<dyn Store>,
    pub broker:       Arc<dyn BrokerGateway>,

    // ── Distribution ──────────────────────────────────────────────────────────
    /// Broadcast ไปยัง `/ws/monitor` clients
    pub events:       EventBus,
    pub publisher:    Arc<PricePublisher>,
    pub ingestor:     Arc<TickIngestor>,

    // ── Engines ───────────────────────────────────────────────────────────────
    pub pipeline:     Arc<SignalPipeline>,
    pub orchestrator: Arc<OrderOrchestrator>,
    pub alert_monitor: Arc<AlertMonitor>,

    // ── Metrics ───────────────────────────────────────────────────────────────
    pub tick_count:   AtomicU64,
    pub started_at:   DateTime<Utc>,
}

pub type SharedState = Arc<AppState>;

/// Wires every engine component.  Monitors are not started here.
pub fn build_state(
    config: AppConfig,
    store:  Arc<dyn Store>,
    broker: Arc<dyn BrokerGateway>,
) -> SharedState {
    let session = SessionClock::new(config.trading_cutoff);
    let events = EventBus::new(config.event_channel_capacity);
    let publisher = Arc::new(PricePublisher::new(config.subscriber_capacity, events.clone()));
    let ingestor = Arc::new(TickIngestor::new(
        Arc::clone(&publisher),
        config.instrument_tokens.clone(),
    ));

    let generator = Arc::new(SignalGenerator::new(
        Arc::clone(&store),
        TrendDirectionResolver::new(Arc::clone(&broker)),
        events.clone(),
    ));
    let orchestrator = Arc::new(OrderOrchestrator::new(
        Arc::clone(&store),
        Arc::clone(&broker),
        Arc::clone(&publisher),
        session,
        events.clone(),
        config.monitor_poll,
        config.monitor_shutdown,
    ));
    let pipeline = Arc::new(SignalPipeline::new(
        generator,
        Arc::clone(&orchestrator),
        Arc::clone(&store),
    ));
    let alert_monitor = Arc::new(AlertMonitor::new(
        Arc::clone(&store),
        Arc::clone(&pipeline) as Arc<dyn TriggerSink>,
        Arc::clone(&publisher),
        session,
        events.clone(),
        config.monitor_poll,
        config.monitor_shutdown,
    ));

    Arc::new(AppState {
        config,
        session,
        store,
        broker,
        events,
        publisher,
        ingestor,
        pipeline,
        orchestrator,
        alert_monitor,
        tick_count: AtomicU64::new(0),
        started_at: Utc::now(),
    })
}

impl AppState {
    /// Starts AlertMonitor and OrderOrchestrator (no-op if already running).
    pub fn start_monitors(&self) {
        let alerts = self.alert_monitor.start();
        let orders = self.orchestrator.start();
        info!(alerts, orders, subscribers = self.publisher.subscriber_count(), "Monitors started");
    }

    /// Signals both workers and waits (bounded) for them to finish.
    pub async fn stop_monitors(&self) {
        self.alert_monitor.stop().await;
        self.orchestrator.stop().await;
    }
}
