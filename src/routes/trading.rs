//! # routes::trading
//!
//! Settings, signals, orders and trades.
//!
//! | Method | Path                       | Description                                |
//! |--------|----------------------------|--------------------------------------------|
//! | PUT    | `/api/settings/tre`        | upsert TRE settings (SL/target %, lookback)|
//! | PUT    | `/api/settings/oop`        | upsert OOP settings (qty, paper, auto)     |
//! | GET    | `/api/signals?user_id=`    | trade signals ของ user                     |
//! | POST   | `/api/signals/:id/order`   | สร้าง bracket order จาก pending signal     |
//! | GET    | `/api/orders?user_id=`     | orders ของ user                            |
//! | POST   | `/api/orders/:id/cancel`   | cancel pending / close active ที่ราคาล่าสุด |
//! | GET    | `/api/trades?user_id=`     | trades ที่ปิดแล้วของ user                  |

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use rust_decimal::Decimal;
use serde_json::json;
use tracing::info;

use crate::{
    error::AppError,
    models::{OopSettings, TreSettings},
    routes::UserQuery,
    state::SharedState,
};

// ─── Settings ─────────────────────────────────────────────────────────────────

/// PUT /api/settings/tre
pub async fn put_tre_settings(
    State(state): State<SharedState>,
    Json(body): Json<TreSettings>,
) -> Result<impl IntoResponse, AppError> {
    if body.stop_loss_percent <= Decimal::ZERO || body.target_percent <= Decimal::ZERO {
        return Err(AppError::BadRequest(
            "stop_loss_percent and target_percent must be positive".into(),
        ));
    }
    if body.stop_loss_percent >= Decimal::ONE_HUNDRED {
        return Err(AppError::BadRequest("stop_loss_percent must be below 100".into()));
    }
    if body.lookback_minutes < 2 {
        return Err(AppError::BadRequest("lookback_minutes must be at least 2".into()));
    }

    state.store.upsert_tre_settings(body.clone())?;
    info!(user_id = body.user_id, sl = %body.stop_loss_percent, target = %body.target_percent, "TRE settings saved");

    Ok(Json(json!({ "ok": true, "settings": body })))
}

/// PUT /api/settings/oop
pub async fn put_oop_settings(
    State(state): State<SharedState>,
    Json(body): Json<OopSettings>,
) -> Result<impl IntoResponse, AppError> {
    if body.quantity == 0 {
        return Err(AppError::BadRequest("quantity must be positive".into()));
    }

    state.store.upsert_oop_settings(body.clone())?;
    info!(
        user_id       = body.user_id,
        quantity      = body.quantity,
        paper_trading = body.paper_trading,
        auto_execute  = body.auto_execute,
        "OOP settings saved"
    );

    Ok(Json(json!({ "ok": true, "settings": body })))
}

// ─── Signals ──────────────────────────────────────────────────────────────────

/// GET /api/signals?user_id=
pub async fn list_signals(
    State(state): State<SharedState>,
    Query(query): Query<UserQuery>,
) -> Result<impl IntoResponse, AppError> {
    let signals = state.store.signals_for_user(query.user_id)?;
    Ok(Json(json!({ "ok": true, "count": signals.len(), "signals": signals })))
}

/// POST /api/signals/:id/order — manual order creation when auto_execute is off
pub async fn order_from_signal(
    State(state): State<SharedState>,
    Path(signal_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let order = state
        .orchestrator
        .create_order_from_signal(signal_id, Utc::now())
        .await?;
    Ok((StatusCode::CREATED, Json(json!({ "ok": true, "order": order }))))
}

// ─── Orders ───────────────────────────────────────────────────────────────────

/// GET /api/orders?user_id=
pub async fn list_orders(
    State(state): State<SharedState>,
    Query(query): Query<UserQuery>,
) -> Result<impl IntoResponse, AppError> {
    let orders = state.store.orders_for_user(query.user_id)?;
    Ok(Json(json!({ "ok": true, "count": orders.len(), "orders": orders })))
}

/// POST /api/orders/:id/cancel
pub async fn cancel_order(
    State(state): State<SharedState>,
    Path(order_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let order = state.orchestrator.cancel_order(order_id, Utc::now()).await?;
    let trades = state.store.trades_for_order(order_id)?;
    Ok(Json(json!({
        "ok":    true,
        "order": order,
        "trade": trades.last(),
    })))
}

// ─── Trades ───────────────────────────────────────────────────────────────────

/// GET /api/trades?user_id=
pub async fn list_trades(
    State(state): State<SharedState>,
    Query(query): Query<UserQuery>,
) -> Result<impl IntoResponse, AppError> {
    let trades = state.store.trades_for_user(query.user_id)?;
    let total_pnl: Decimal = trades.iter().map(|t| t.pnl).sum();
    Ok(Json(json!({
        "ok":        true,
        "count":     trades.len(),
        "total_pnl": total_pnl,
        "trades":    trades,
    })))
}
