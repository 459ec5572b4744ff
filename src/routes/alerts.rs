//! # routes::alerts
//!
//! | Method | Path                    | Description                     |
//! |--------|-------------------------|---------------------------------|
//! | POST   | `/api/alerts`           | สร้าง level alert               |
//! | GET    | `/api/alerts?user_id=`  | alerts ทั้งหมดของ user          |

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use serde_json::json;
use tracing::info;

use crate::{
    error::AppError,
    models::{NewLevelAlert, TtlType},
    routes::UserQuery,
    state::SharedState,
};

/// POST /api/alerts
///
/// Intraday alerts without `expires_at` expire at the next trading cutoff.
pub async fn create_alert(
    State(state): State<SharedState>,
    Json(mut body): Json<NewLevelAlert>,
) -> Result<impl IntoResponse, AppError> {
    if body.price_level <= rust_decimal::Decimal::ZERO {
        return Err(AppError::BadRequest("price_level must be positive".into()));
    }
    if body.exchange.trim().is_empty() || body.symbol.trim().is_empty() {
        return Err(AppError::BadRequest("exchange and symbol are required".into()));
    }

    let now = Utc::now();
    if body.ttl_type == TtlType::Intraday && body.expires_at.is_none() {
        body.expires_at = Some(state.session.next_cutoff(now));
    }
    if body.expires_at.is_some_and(|at| at <= now) {
        return Err(AppError::BadRequest("expires_at must be in the future".into()));
    }

    let alert = state.store.create_alert(body)?;
    info!(
        alert_id = alert.id,
        user_id  = alert.user_id,
        symbol   = %alert.instrument(),
        level    = %alert.price_level,
        ttl      = ?alert.ttl_type,
        "🎯 Level alert created"
    );

    Ok((StatusCode::CREATED, Json(json!({ "ok": true, "alert": alert }))))
}

/// GET /api/alerts?user_id=
pub async fn list_alerts(
    State(state): State<SharedState>,
    Query(query): Query<UserQuery>,
) -> Result<impl IntoResponse, AppError> {
    let alerts = state.store.alerts_for_user(query.user_id)?;
    Ok(Json(json!({
        "ok":     true,
        "count":  alerts.len(),
        "alerts": alerts,
    })))
}
