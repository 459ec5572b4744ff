//! # routes::ticks
//!
//! | Method | Path           | Description                                  |
//! |--------|----------------|----------------------------------------------|
//! | POST   | `/api/ticks`   | Broker tick (single or batch) → publisher    |
//! | GET    | `/api/health`  | Engine status                                |

use std::sync::atomic::Ordering;

use axum::{extract::State, response::IntoResponse, Json};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::{error::AppError, models::RawTick, state::SharedState};

/// Accepts `{...}` or `[{...}, ...]`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum TickBatch {
    Many(Vec<RawTick>),
    One(RawTick),
}

impl TickBatch {
    fn into_ticks(self) -> Vec<RawTick> {
        match self {
            TickBatch::Many(ticks) => ticks,
            TickBatch::One(tick) => vec![tick],
        }
    }
}

// ─── POST /api/ticks ──────────────────────────────────────────────────────────

/// ### Request body (JSON)
/// ```json
/// { "instrument_token": 256265, "last_price": "25010.5",
///   "ohlc": { "open": "24950", "high": "25040", "low": "24920", "close": "24980" } }
/// ```
///
/// ### Response
/// `{ "ok": true, "received": 1, "published": 1, "unknown_tokens": [], "delivered": 2, "dropped": [] }`
pub async fn ingest_ticks(
    State(state): State<SharedState>,
    Json(batch): Json<TickBatch>,
) -> Result<impl IntoResponse, AppError> {
    let ticks = batch.into_ticks();
    if ticks.is_empty() {
        return Err(AppError::BadRequest("no ticks in request body".into()));
    }

    let mut published = 0usize;
    let mut delivered = 0usize;
    let mut unknown_tokens = Vec::new();
    let mut dropped: Vec<String> = Vec::new();

    for tick in &ticks {
        match state.ingestor.ingest(tick) {
            Some(report) => {
                published += 1;
                delivered += report.delivered;
                dropped.extend(report.dropped);
            }
            None => unknown_tokens.push(tick.instrument_token),
        }
    }
    state.tick_count.fetch_add(ticks.len() as u64, Ordering::Relaxed);

    debug!(received = ticks.len(), published, delivered, "Ticks ingested");

    Ok(Json(json!({
        "ok":             true,
        "received":       ticks.len(),
        "published":      published,
        "unknown_tokens": unknown_tokens,
        "delivered":      delivered,
        "dropped":        dropped,
    })))
}

// ─── GET /api/health ──────────────────────────────────────────────────────────

pub async fn health(State(state): State<SharedState>) -> impl IntoResponse {
    let uptime_secs = (Utc::now() - state.started_at).num_seconds();

    Json(json!({
        "ok":                 true,
        "tick_count":         state.tick_count.load(Ordering::Relaxed),
        "published_count":    state.publisher.published_count(),
        "subscribers":        state.publisher.subscriber_count(),
        "instrument_tokens":  state.ingestor.token_count(),
        "alert_monitor":      state.alert_monitor.is_running(),
        "order_orchestrator": state.orchestrator.is_running(),
        "broker_configured":  state.config.broker_base_url.is_some(),
        "trading_cutoff_utc": state.session.cutoff().format("%H:%M").to_string(),
        "uptime_secs":        uptime_secs,
    }))
}
