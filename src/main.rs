//! # Levelbreak — Level Alert · Trade Signal · OCO Bracket Engine
//!
//! ## Architecture Overview
//!
//! ```text
//!  ┌──────────────┐   POST /api/ticks     ┌──────────────────┐
//!  │  Broker feed │ ─────────────────────▶│  TickIngestor    │
//!  └──────────────┘                       └────────┬─────────┘
//!                                                  ▼
//!                                         ┌──────────────────┐
//!                                         │  PricePublisher  │
//!                                         └───┬──────────┬───┘
//!                             alert_monitor   │          │   order_orchestrator
//!                                             ▼          ▼
//!                                   ┌──────────────┐  ┌──────────────────┐
//!                                   │ AlertMonitor │  │ OrderOrchestrator│──▶ Trade
//!                                   └──────┬───────┘  └──────────────────┘
//!                                          ▼                   ▲
//!                                   SignalGenerator ───────────┘
//!
//!  ┌──────────────┐   WebSocket           EngineEvent broadcast
//!  │  Dashboard   │ ◀─────────────────── /ws/monitor
//!  └──────────────┘
//! ```
//!
//! ## Environment Variables
//!
//! | Variable                    | Default         | Description                            |
//! |-----------------------------|-----------------|----------------------------------------|
//! | `BIND_ADDR`                 | `0.0.0.0:3000`  | Address Axum listens on                |
//! | `BROKER_BASE_URL`           | *(unset)*       | Broker REST base URL, `mock` = simulate|
//! | `BROKER_API_KEY`            | *(unset)*       | Bearer token for the broker            |
//! | `SUBSCRIBER_QUEUE_CAPACITY` | `1000`          | Per-subscriber queue size              |
//! | `MONITOR_POLL_MS`           | `1000`          | Worker wait between shutdown checks    |
//! | `MONITOR_SHUTDOWN_MS`       | `2000`          | Join timeout on stop                   |
//! | `TRADING_CUTOFF_UTC`        | `09:30`         | Intraday cutoff (HH:MM, UTC)           |
//! | `INSTRUMENT_TOKENS`         | *(empty)*       | `token=EX:SYM;...`                     |
//! | `EVENT_CHANNEL_CAPACITY`    | `256`           | `/ws/monitor` broadcast buffer         |
//! | `RUST_LOG`                  | `levelbreak=debug` | Tracing filter                      |

use std::sync::Arc;

use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use levelbreak::{
    broker::HttpBroker,
    config::AppConfig,
    routes,
    state::build_state,
    store::InMemoryStore,
};

// ─── Entry Point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Load .env (optional) ──────────────────────────────────────────────
    dotenvy::dotenv().ok();

    // ── 2. Initialise structured logging ─────────────────────────────────────
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env()
            .add_directive("levelbreak=debug".parse()?)
            .add_directive("tower_http=info".parse()?))
        .init();

    info!(
        r#"

  ╔═══════════════════════════════════════════════╗
  ║        LEVELBREAK — Alert · Signal · OCO      ║
  ║        Rust + Axum  ·  Pub/Sub Engine         ║
  ╚═══════════════════════════════════════════════╝"#
    );

    // ── 3. Config + collaborators ────────────────────────────────────────────
    let config = AppConfig::from_env()?;
    if config.broker_base_url.is_none() {
        warn!("⚠️ BROKER_BASE_URL not set — trend resolution and live orders will fail");
    }
    if config.instrument_tokens.is_empty() {
        warn!("⚠️ INSTRUMENT_TOKENS empty — every incoming tick will be dropped");
    }

    let broker = Arc::new(HttpBroker::from_config(&config));
    let store = Arc::new(InMemoryStore::new());
    let addr = config.bind_addr;

    // ── 4. Build shared state + start monitors ───────────────────────────────
    let state = build_state(config, store, broker);
    state.start_monitors();

    // ── 5. Router ────────────────────────────────────────────────────────────
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = routes::router(Arc::clone(&state))
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    info!(?addr, "🚀 Levelbreak server starting");

    // ── 6. Serve until Ctrl-C ────────────────────────────────────────────────
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // ── 7. Drain monitors ────────────────────────────────────────────────────
    state.stop_monitors().await;
    info!("👋 Levelbreak stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Ctrl-C handler failed — shutting down");
    }
    info!("🛑 Shutdown signal received");
}
