//! # models::settings
//!
//! Per-user engine settings.
//!
//! - [`TreSettings`] drive the SignalGenerator (SL/target %, lookback window).
//! - [`OopSettings`] drive the OrderOrchestrator (quantity, paper vs live).

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreSettings {
    pub user_id:           i64,
    /// เช่น 1.5 = 1.5%
    pub stop_loss_percent: Decimal,
    pub target_percent:    Decimal,
    pub lookback_minutes:  u32,
    #[serde(default = "default_true")]
    pub is_active:         bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OopSettings {
    pub user_id:       i64,
    pub quantity:      u32,
    /// true = paper trading (ไม่ยิงไป broker จริง)
    #[serde(default = "default_true")]
    pub paper_trading: bool,
    /// Create the bracket order as soon as a signal is generated.
    #[serde(default = "default_true")]
    pub auto_execute:  bool,
    #[serde(default = "default_true")]
    pub is_active:     bool,
}

fn default_true() -> bool {
    true
}
