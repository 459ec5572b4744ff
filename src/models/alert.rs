//! # models::alert
//!
//! [`LevelAlert`] — a user-defined price level that the AlertMonitor watches.
//!
//! Invariant: `is_triggered == true ⇒ is_active == false`.  Only the
//! AlertMonitor flips these flags (or an explicit user edit/delete).

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::Instrument;

// ─── TtlType ──────────────────────────────────────────────────────────────────

/// Lifetime class shared by alerts, signals and orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TtlType {
    /// หมดอายุที่ trading-day cutoff
    #[default]
    Intraday,
    /// ไม่มี auto-expiry
    Longterm,
}

// ─── LevelAlert ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelAlert {
    pub id:           i64,
    pub user_id:      i64,
    pub exchange:     String,
    pub symbol:       String,
    pub price_level:  Decimal,
    pub ttl_type:     TtlType,
    pub expires_at:   Option<DateTime<Utc>>,
    pub is_active:    bool,
    pub is_triggered: bool,
    pub triggered_at: Option<DateTime<Utc>>,
    pub created_at:   DateTime<Utc>,
}

impl LevelAlert {
    pub fn instrument(&self) -> Instrument {
        Instrument::new(&self.exchange, &self.symbol)
    }

    /// Intraday alert whose `expires_at` is at or before `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.ttl_type == TtlType::Intraday
            && self.expires_at.map(|at| at <= now).unwrap_or(false)
    }
}

// ─── NewLevelAlert ────────────────────────────────────────────────────────────

/// Payload for creating an alert (user action).  `expires_at` is filled in
/// from the session cutoff for intraday alerts that omit it.
#[derive(Debug, Clone, Deserialize)]
pub struct NewLevelAlert {
    pub user_id:     i64,
    pub exchange:    String,
    pub symbol:      String,
    pub price_level: Decimal,
    #[serde(default)]
    pub ttl_type:    TtlType,
    #[serde(default)]
    pub expires_at:  Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rust_decimal_macros::dec;

    fn alert(ttl_type: TtlType, expires_at: Option<DateTime<Utc>>) -> LevelAlert {
        LevelAlert {
            id: 1,
            user_id: 7,
            exchange: "NSE".into(),
            symbol: "NIFTY 50".into(),
            price_level: dec!(25000),
            ttl_type,
            expires_at,
            is_active: true,
            is_triggered: false,
            triggered_at: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn intraday_alert_expires_after_deadline() {
        let now = Utc::now();
        assert!(alert(TtlType::Intraday, Some(now - Duration::minutes(1))).is_expired(now));
        assert!(!alert(TtlType::Intraday, Some(now + Duration::minutes(1))).is_expired(now));
        assert!(!alert(TtlType::Intraday, None).is_expired(now));
    }

    #[test]
    fn longterm_alert_never_expires() {
        let now = Utc::now();
        assert!(!alert(TtlType::Longterm, Some(now - Duration::days(3))).is_expired(now));
    }

    #[test]
    fn ttl_type_uses_lowercase_wire_names() {
        assert_eq!(serde_json::to_string(&TtlType::Longterm).unwrap(), r#""longterm""#);
        let parsed: TtlType = serde_json::from_str(r#""intraday""#).unwrap();
        assert_eq!(parsed, TtlType::Intraday);
    }
}
