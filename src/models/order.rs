//! # models::order
//!
//! Defines the OCO bracket [`Order`] and the immutable settlement [`Trade`].
//!
//! ## State machine
//! ```text
//! pending ──(entry fill)──▶ active ──▶ target_hit | stopped_out | expired | executed(manual)
//!    │                        │
//!    └──▶ expired / cancelled ◀┘ (cancelled: sibling fill or manual cancel)
//! ```
//! Orders sharing an `oco_group_id` are one logical position; exactly one may
//! settle, the rest end `cancelled`.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Instrument, OptionSide, TtlType};

// ─── OrderStatus ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// รอราคาเข้าใกล้ entry
    Pending,
    /// Entry filled — กำลังถือ position
    Active,
    Triggered,
    /// Closed manually
    Executed,
    StoppedOut,
    TargetHit,
    Cancelled,
    Expired,
}

impl OrderStatus {
    /// Terminal orders are never transitioned again.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Executed | Self::StoppedOut | Self::TargetHit | Self::Cancelled | Self::Expired
        )
    }
}

// ─── ExitReason ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    TargetHit,
    StopLoss,
    TimeBased,
    Manual,
}

impl ExitReason {
    /// Order status an active order lands in for this exit.
    pub fn order_status(self) -> OrderStatus {
        match self {
            Self::TargetHit => OrderStatus::TargetHit,
            Self::StopLoss  => OrderStatus::StoppedOut,
            Self::TimeBased => OrderStatus::Expired,
            Self::Manual    => OrderStatus::Executed,
        }
    }
}

// ─── Order ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id:              i64,
    pub user_id:         i64,
    pub trade_signal_id: i64,
    pub exchange:        String,
    pub symbol:          String,
    pub option_side:     OptionSide,
    pub entry_price:     Decimal,
    pub stop_loss_price: Decimal,
    pub target_price:    Decimal,
    pub quantity:        u32,
    pub oco_group_id:    Uuid,
    pub status:          OrderStatus,
    pub ttl_type:        TtlType,
    pub expires_at:      Option<DateTime<Utc>>,
    pub executed_price:  Option<Decimal>,
    pub pnl:             Option<Decimal>,
    pub pnl_percent:     Option<Decimal>,
    pub created_at:      DateTime<Utc>,
    pub updated_at:      DateTime<Utc>,
}

impl Order {
    pub fn instrument(&self) -> Instrument {
        Instrument::new(&self.exchange, &self.symbol)
    }
}

/// Order before the store assigns an id.
#[derive(Debug, Clone, PartialEq)]
pub struct NewOrder {
    pub user_id:         i64,
    pub trade_signal_id: i64,
    pub exchange:        String,
    pub symbol:          String,
    pub option_side:     OptionSide,
    pub entry_price:     Decimal,
    pub stop_loss_price: Decimal,
    pub target_price:    Decimal,
    pub quantity:        u32,
    pub oco_group_id:    Uuid,
    pub ttl_type:        TtlType,
    pub expires_at:      Option<DateTime<Utc>>,
}

// ─── Trade ────────────────────────────────────────────────────────────────────

/// Settlement record — สร้างครั้งเดียว ไม่มีวันแก้
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub id:          i64,
    pub order_id:    i64,
    pub user_id:     i64,
    pub entry_price: Decimal,
    pub exit_price:  Decimal,
    pub quantity:    u32,
    pub exit_reason: ExitReason,
    pub pnl:         Decimal,
    pub pnl_percent: Decimal,
    pub executed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewTrade {
    pub order_id:    i64,
    pub user_id:     i64,
    pub entry_price: Decimal,
    pub exit_price:  Decimal,
    pub quantity:    u32,
    pub exit_reason: ExitReason,
    pub pnl:         Decimal,
    pub pnl_percent: Decimal,
    pub executed_at: DateTime<Utc>,
}

// ─── P&L ──────────────────────────────────────────────────────────────────────

/// Realised P&L for a closed position, returned as `(pnl, pnl_percent)`.
///
/// CALL profits when price rises, PUT when it falls.  Both values are
/// rounded to 2 dp.
pub fn realised_pnl(
    side:  OptionSide,
    entry: Decimal,
    exit:  Decimal,
    qty:   u32,
) -> (Decimal, Decimal) {
    let qty = Decimal::from(qty);
    let pnl = match side {
        OptionSide::Call => (exit - entry) * qty,
        OptionSide::Put  => (entry - exit) * qty,
    };

    let notional = entry * qty;
    let pnl_percent = if notional.is_zero() {
        Decimal::ZERO
    } else {
        pnl / notional * Decimal::ONE_HUNDRED
    };

    (pnl.round_dp(2), pnl_percent.round_dp(2))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn call_pnl_profits_on_rise() {
        let (pnl, pct) = realised_pnl(OptionSide::Call, dec!(100), dec!(110), 1);
        assert_eq!(pnl, dec!(10));
        assert_eq!(pct, dec!(10.0));
    }

    #[test]
    fn put_pnl_profits_on_fall() {
        let (pnl, pct) = realised_pnl(OptionSide::Put, dec!(100), dec!(90), 1);
        assert_eq!(pnl, dec!(10));
        assert_eq!(pct, dec!(10.0));
    }

    #[test]
    fn pnl_scales_with_quantity_but_percent_does_not() {
        let (pnl, pct) = realised_pnl(OptionSide::Call, dec!(200), dec!(190), 50);
        assert_eq!(pnl, dec!(-500));
        assert_eq!(pct, dec!(-5));
    }

    #[test]
    fn terminal_statuses() {
        assert!(!OrderStatus::Pending.is_terminal());
        assert!(!OrderStatus::Active.is_terminal());
        assert!(!OrderStatus::Triggered.is_terminal());
        for status in [
            OrderStatus::Executed,
            OrderStatus::StoppedOut,
            OrderStatus::TargetHit,
            OrderStatus::Cancelled,
            OrderStatus::Expired,
        ] {
            assert!(status.is_terminal(), "{status:?} should be terminal");
        }
    }

    #[test]
    fn status_wire_names_are_snake_case() {
        assert_eq!(serde_json::to_string(&OrderStatus::StoppedOut).unwrap(), r#""stopped_out""#);
        assert_eq!(serde_json::to_string(&ExitReason::TimeBased).unwrap(), r#""time_based""#);
    }
}
