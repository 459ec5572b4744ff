//! # events
//!
//! Defines [`EngineEvent`] — ทุก Event ที่ระบบ Broadcast ออกไปผ่าน WebSocket
//!
//! ใช้ `tokio::sync::broadcast::Sender<String>` โดยแปลง EngineEvent เป็น JSON
//! String ก่อนส่ง เพื่อหลีกเลี่ยง Clone constraints ที่ซับซ้อน

use rust_decimal::Decimal;
use serde::Serialize;
use tokio::sync::broadcast;

use crate::models::{ExitReason, LevelAlert, Order, Trade, TradeSignal};

/// Lifecycle events streamed to `/ws/monitor` clients.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EngineEvent {
    /// ราคาแตะ level — `forwarded = false` หมายถึงเลย cutoff แล้ว
    AlertTriggered {
        alert:         Box<LevelAlert>,
        current_price: Decimal,
        forwarded:     bool,
    },

    /// Intraday alert หมดอายุโดยไม่ถูก trigger
    AlertExpired {
        alert_id: i64,
    },

    SignalCreated {
        signal: Box<TradeSignal>,
    },

    OrderCreated {
        order: Box<Order>,
    },

    /// Entry filled — position เปิดแล้ว
    OrderActivated {
        order: Box<Order>,
    },

    /// Position settled (target / stop / time / manual)
    OrderClosed {
        order:       Box<Order>,
        trade:       Box<Trade>,
        exit_reason: ExitReason,
    },

    OrderCancelled {
        order_id: i64,
        reason:   String,
    },

    /// Pending order หมดอายุก่อน entry fill
    OrderExpired {
        order_id: i64,
    },

    /// Publisher ตัด subscriber ที่ queue เต็ม / ปิดไปแล้ว
    SubscriberDropped {
        subscriber_id: String,
    },
}

impl EngineEvent {
    /// แปลงเป็น JSON String สำหรับส่งผ่าน WebSocket
    #[inline]
    pub fn to_json(&self) -> String {
        serde_json::to_string(self)
            .unwrap_or_else(|_| r#"{"event":"SERIALIZATION_ERROR"}"#.to_string())
    }
}

// ─── EventBus ─────────────────────────────────────────────────────────────────

/// Cheap-to-clone handle around the broadcast sender.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<String>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// ไม่ panic ถ้าไม่มี listener (ปลอดภัยสำหรับ headless mode)
    pub fn emit(&self, event: &EngineEvent) {
        // Err เกิดขึ้นเมื่อไม่มี receiver — ไม่ใช่ error จริงๆ
        let _ = self.tx.send(event.to_json());
    }

    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
