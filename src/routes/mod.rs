//! # routes
//!
//! | Method    | Path                          | Handler                         |
//! |-----------|-------------------------------|---------------------------------|
//! | GET       | `/api/health`                 | [`ticks::health`]               |
//! | POST      | `/api/ticks`                  | [`ticks::ingest_ticks`]         |
//! | POST      | `/api/alerts`                 | [`alerts::create_alert`]        |
//! | GET       | `/api/alerts?user_id=`        | [`alerts::list_alerts`]         |
//! | PUT       | `/api/settings/tre`           | [`trading::put_tre_settings`]   |
//! | PUT       | `/api/settings/oop`           | [`trading::put_oop_settings`]   |
//! | GET       | `/api/signals?user_id=`       | [`trading::list_signals`]       |
//! | POST      | `/api/signals/:id/order`      | [`trading::order_from_signal`]  |
//! | GET       | `/api/orders?user_id=`        | [`trading::list_orders`]        |
//! | POST      | `/api/orders/:id/cancel`      | [`trading::cancel_order`]       |
//! | GET       | `/api/trades?user_id=`        | [`trading::list_trades`]        |
//! | GET (WS)  | `/ws/monitor`                 | [`monitor::ws_monitor`]         |

use axum::{
    routing::{get, post, put},
    Router,
};
use serde::Deserialize;

use crate::state::SharedState;

pub mod alerts;
pub mod monitor;
pub mod ticks;
pub mod trading;

/// `?user_id=` for the per-user listings.
#[derive(Debug, Deserialize)]
pub struct UserQuery {
    pub user_id: i64,
}

/// All routes, state attached.  Middleware layers are added by the binary.
pub fn router(state: SharedState) -> Router {
    Router::new()
        // ── Ingestion ────────────────────────────────────────────────────────
        .route("/api/health",             get(ticks::health))
        .route("/api/ticks",              post(ticks::ingest_ticks))
        // ── Alerts ───────────────────────────────────────────────────────────
        .route("/api/alerts",             post(alerts::create_alert).get(alerts::list_alerts))
        // ── Settings ─────────────────────────────────────────────────────────
        .route("/api/settings/tre",       put(trading::put_tre_settings))
        .route("/api/settings/oop",       put(trading::put_oop_settings))
        // ── Signals / Orders / Trades ────────────────────────────────────────
        .route("/api/signals",            get(trading::list_signals))
        .route("/api/signals/:id/order",  post(trading::order_from_signal))
        .route("/api/orders",             get(trading::list_orders))
        .route("/api/orders/:id/cancel",  post(trading::cancel_order))
        .route("/api/trades",             get(trading::list_trades))
        // ── Monitor ──────────────────────────────────────────────────────────
        .route("/ws/monitor",             get(monitor::ws_monitor))
        .with_state(state)
}
