//! # store — Database collaborator
//!
//! The engine only needs CRUD: create, get-by-filter, update-status and
//! list-active.  [`Store`] is that contract; [`InMemoryStore`] is the
//! process-local implementation the binary runs with.
//!
//! Calls are synchronous and assumed fast.  Locks are never held across an
//! `.await` by callers — every method takes and releases its guard inside.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    Instrument, LevelAlert, NewLevelAlert, NewOrder, NewTrade, NewTradeSignal, OopSettings, OptionSide, Order,
    OrderStatus, SignalStatus, Trade, TradeSignal, TreSettings,
};

// ─── Errors ───────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

// ─── Contract ─────────────────────────────────────────────────────────────────

pub trait Store: Send + Sync {
    // ── Level alerts ──────────────────────────────────────────────────────────
    /// Persists `alert` as given; expiry defaults are resolved by the caller.
    fn create_alert(&self, alert: NewLevelAlert) -> StoreResult<LevelAlert>;
    fn get_alert(&self, id: i64) -> StoreResult<Option<LevelAlert>>;
    fn active_alerts_for(&self, instrument: &Instrument) -> StoreResult<Vec<LevelAlert>>;
    fn alerts_for_user(&self, user_id: i64) -> StoreResult<Vec<LevelAlert>>;
    /// Returns `false` if the alert was already inactive.
    fn deactivate_alert(&self, id: i64) -> StoreResult<bool>;
    /// Sets `is_triggered` and clears `is_active`.  Returns `false` if the
    /// alert was already inactive.
    fn mark_alert_triggered(&self, id: i64, at: DateTime<Utc>) -> StoreResult<bool>;

    // ── Settings ──────────────────────────────────────────────────────────────
    fn tre_settings(&self, user_id: i64) -> StoreResult<Option<TreSettings>>;
    fn upsert_tre_settings(&self, settings: TreSettings) -> StoreResult<()>;
    fn oop_settings(&self, user_id: i64) -> StoreResult<Option<OopSettings>>;
    fn upsert_oop_settings(&self, settings: OopSettings) -> StoreResult<()>;

    // ── Trade signals ─────────────────────────────────────────────────────────
    fn create_signal(&self, signal: NewTradeSignal) -> StoreResult<TradeSignal>;
    fn get_signal(&self, id: i64) -> StoreResult<Option<TradeSignal>>;
    fn pending_signals_for(
        &self,
        exchange: &str,
        symbol: &str,
        side: OptionSide,
    ) -> StoreResult<Vec<TradeSignal>>;
    fn signals_for_user(&self, user_id: i64) -> StoreResult<Vec<TradeSignal>>;
    fn update_signal_status(&self, id: i64, status: SignalStatus) -> StoreResult<()>;

    // ── Orders ────────────────────────────────────────────────────────────────
    fn create_order(&self, order: NewOrder) -> StoreResult<Order>;
    fn get_order(&self, id: i64) -> StoreResult<Option<Order>>;
    /// Only `pending` / `active` orders for the instrument.
    fn get_active_oop_orders(&self, instrument: &Instrument) -> StoreResult<Vec<Order>>;
    fn orders_in_group(&self, oco_group_id: Uuid) -> StoreResult<Vec<Order>>;
    fn orders_for_user(&self, user_id: i64) -> StoreResult<Vec<Order>>;
    fn update_order(&self, order: &Order) -> StoreResult<()>;

    // ── Trades ────────────────────────────────────────────────────────────────
    fn create_trade(&self, trade: NewTrade) -> StoreResult<Trade>;
    fn trades_for_order(&self, order_id: i64) -> StoreResult<Vec<Trade>>;
    fn trades_for_user(&self, user_id: i64) -> StoreResult<Vec<Trade>>;
}

// ─── In-memory implementation ─────────────────────────────────────────────────

#[derive(Debug, Default)]
struct Tables {
    next_id:      i64,
    alerts:       HashMap<i64, LevelAlert>,
    tre_settings: HashMap<i64, TreSettings>,
    oop_settings: HashMap<i64, OopSettings>,
    signals:      HashMap<i64, TradeSignal>,
    orders:       HashMap<i64, Order>,
    trades:       Vec<Trade>,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// `HashMap` tables behind one `parking_lot::RwLock`.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Sort by id so listings are stable regardless of `HashMap` order.
fn sorted_by_id<T: Clone>(items: impl Iterator<Item = (i64, T)>) -> Vec<T> {
    let mut rows: Vec<(i64, T)> = items.collect();
    rows.sort_by_key(|(id, _)| *id);
    rows.into_iter().map(|(_, row)| row).collect()
}

impl Store for InMemoryStore {
    fn create_alert(&self, alert: NewLevelAlert) -> StoreResult<LevelAlert> {
        let mut tables = self.tables.write();
        let id = tables.next_id();
        let row = LevelAlert {
            id,
            user_id:      alert.user_id,
            exchange:     alert.exchange,
            symbol:       alert.symbol,
            price_level:  alert.price_level,
            ttl_type:     alert.ttl_type,
            expires_at:   alert.expires_at,
            is_active:    true,
            is_triggered: false,
            triggered_at: None,
            created_at:   Utc::now(),
        };
        tables.alerts.insert(id, row.clone());
        Ok(row)
    }

    fn get_alert(&self, id: i64) -> StoreResult<Option<LevelAlert>> {
        Ok(self.tables.read().alerts.get(&id).cloned())
    }

    fn active_alerts_for(&self, instrument: &Instrument) -> StoreResult<Vec<LevelAlert>> {
        let tables = self.tables.read();
        Ok(sorted_by_id(
            tables
                .alerts
                .values()
                .filter(|a| a.is_active && instrument.matches(&a.exchange, &a.symbol))
                .map(|a| (a.id, a.clone())),
        ))
    }

    fn alerts_for_user(&self, user_id: i64) -> StoreResult<Vec<LevelAlert>> {
        let tables = self.tables.read();
        Ok(sorted_by_id(
            tables
                .alerts
                .values()
                .filter(|a| a.user_id == user_id)
                .map(|a| (a.id, a.clone())),
        ))
    }

    fn deactivate_alert(&self, id: i64) -> StoreResult<bool> {
        let mut tables = self.tables.write();
        let alert = tables
            .alerts
            .get_mut(&id)
            .ok_or(StoreError::NotFound { entity: "level_alert", id })?;
        let changed = alert.is_active;
        alert.is_active = false;
        Ok(changed)
    }

    fn mark_alert_triggered(&self, id: i64, at: DateTime<Utc>) -> StoreResult<bool> {
        let mut tables = self.tables.write();
        let alert = tables
            .alerts
            .get_mut(&id)
            .ok_or(StoreError::NotFound { entity: "level_alert", id })?;
        if !alert.is_active {
            return Ok(false);
        }
        alert.is_active    = false;
        alert.is_triggered = true;
        alert.triggered_at = Some(at);
        Ok(true)
    }

    fn tre_settings(&self, user_id: i64) -> StoreResult<Option<TreSettings>> {
        Ok(self.tables.read().tre_settings.get(&user_id).cloned())
    }

    fn upsert_tre_settings(&self, settings: TreSettings) -> StoreResult<()> {
        self.tables.write().tre_settings.insert(settings.user_id, settings);
        Ok(())
    }

    fn oop_settings(&self, user_id: i64) -> StoreResult<Option<OopSettings>> {
        Ok(self.tables.read().oop_settings.get(&user_id).cloned())
    }

    fn upsert_oop_settings(&self, settings: OopSettings) -> StoreResult<()> {
        self.tables.write().oop_settings.insert(settings.user_id, settings);
        Ok(())
    }

    fn create_signal(&self, signal: NewTradeSignal) -> StoreResult<TradeSignal> {
        let mut tables = self.tables.write();
        let id = tables.next_id();
        let row = TradeSignal {
            id,
            user_id:         signal.user_id,
            level_alert_id:  signal.level_alert_id,
            exchange:        signal.exchange,
            symbol:          signal.symbol,
            option_side:     signal.option_side,
            entry_price:     signal.entry_price,
            stop_loss:       signal.stop_loss,
            target:          signal.target,
            trend_direction: signal.trend_direction,
            status:          SignalStatus::Pending,
            ttl_type:        signal.ttl_type,
            created_at:      Utc::now(),
        };
        tables.signals.insert(id, row.clone());
        Ok(row)
    }

    fn get_signal(&self, id: i64) -> StoreResult<Option<TradeSignal>> {
        Ok(self.tables.read().signals.get(&id).cloned())
    }

    fn pending_signals_for(
        &self,
        exchange: &str,
        symbol: &str,
        side: OptionSide,
    ) -> StoreResult<Vec<TradeSignal>> {
        let tables = self.tables.read();
        Ok(sorted_by_id(
            tables
                .signals
                .values()
                .filter(|s| {
                    s.status == SignalStatus::Pending
                        && s.option_side == side
                        && s.exchange == exchange
                        && s.symbol == symbol
                })
                .map(|s| (s.id, s.clone())),
        ))
    }

    fn signals_for_user(&self, user_id: i64) -> StoreResult<Vec<TradeSignal>> {
        let tables = self.tables.read();
        Ok(sorted_by_id(
            tables
                .signals
                .values()
                .filter(|s| s.user_id == user_id)
                .map(|s| (s.id, s.clone())),
        ))
    }

    fn update_signal_status(&self, id: i64, status: SignalStatus) -> StoreResult<()> {
        let mut tables = self.tables.write();
        let signal = tables
            .signals
            .get_mut(&id)
            .ok_or(StoreError::NotFound { entity: "trade_signal", id })?;
        signal.status = status;
        Ok(())
    }

    fn create_order(&self, order: NewOrder) -> StoreResult<Order> {
        let mut tables = self.tables.write();
        let id = tables.next_id();
        let now = Utc::now();
        let row = Order {
            id,
            user_id:         order.user_id,
            trade_signal_id: order.trade_signal_id,
            exchange:        order.exchange,
            symbol:          order.symbol,
            option_side:     order.option_side,
            entry_price:     order.entry_price,
            stop_loss_price: order.stop_loss_price,
            target_price:    order.target_price,
            quantity:        order.quantity,
            oco_group_id:    order.oco_group_id,
            status:          OrderStatus::Pending,
            ttl_type:        order.ttl_type,
            expires_at:      order.expires_at,
            executed_price:  None,
            pnl:             None,
            pnl_percent:     None,
            created_at:      now,
            updated_at:      now,
        };
        tables.orders.insert(id, row.clone());
        Ok(row)
    }

    fn get_order(&self, id: i64) -> StoreResult<Option<Order>> {
        Ok(self.tables.read().orders.get(&id).cloned())
    }

    fn get_active_oop_orders(&self, instrument: &Instrument) -> StoreResult<Vec<Order>> {
        let tables = self.tables.read();
        Ok(sorted_by_id(
            tables
                .orders
                .values()
                .filter(|o| {
                    matches!(o.status, OrderStatus::Pending | OrderStatus::Active)
                        && instrument.matches(&o.exchange, &o.symbol)
                })
                .map(|o| (o.id, o.clone())),
        ))
    }

    fn orders_in_group(&self, oco_group_id: Uuid) -> StoreResult<Vec<Order>> {
        let tables = self.tables.read();
        Ok(sorted_by_id(
            tables
                .orders
                .values()
                .filter(|o| o.oco_group_id == oco_group_id)
                .map(|o| (o.id, o.clone())),
        ))
    }

    fn orders_for_user(&self, user_id: i64) -> StoreResult<Vec<Order>> {
        let tables = self.tables.read();
        Ok(sorted_by_id(
            tables
                .orders
                .values()
                .filter(|o| o.user_id == user_id)
                .map(|o| (o.id, o.clone())),
        ))
    }

    fn update_order(&self, order: &Order) -> StoreResult<()> {
        let mut tables = self.tables.write();
        let row = tables
            .orders
            .get_mut(&order.id)
            .ok_or(StoreError::NotFound { entity: "order", id: order.id })?;
        *row = order.clone();
        row.updated_at = Utc::now();
        Ok(())
    }

    fn create_trade(&self, trade: NewTrade) -> StoreResult<Trade> {
        let mut tables = self.tables.write();
        let id = tables.next_id();
        let row = Trade {
            id,
            order_id:    trade.order_id,
            user_id:     trade.user_id,
            entry_price: trade.entry_price,
            exit_price:  trade.exit_price,
            quantity:    trade.quantity,
            exit_reason: trade.exit_reason,
            pnl:         trade.pnl,
            pnl_percent: trade.pnl_percent,
            executed_at: trade.executed_at,
        };
        tables.trades.push(row.clone());
        Ok(row)
    }

    fn trades_for_order(&self, order_id: i64) -> StoreResult<Vec<Trade>> {
        let tables = self.tables.read();
        Ok(tables.trades.iter().filter(|t| t.order_id == order_id).cloned().collect())
    }

    fn trades_for_user(&self, user_id: i64) -> StoreResult<Vec<Trade>> {
        let tables = self.tables.read();
        Ok(tables.trades.iter().filter(|t| t.user_id == user_id).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TtlType;
    use rust_decimal_macros::dec;

    fn new_alert(symbol: &str) -> NewLevelAlert {
        NewLevelAlert {
            user_id:     1,
            exchange:    "NSE".into(),
            symbol:      symbol.into(),
            price_level: dec!(25000),
            ttl_type:    TtlType::Longterm,
            expires_at:  None,
        }
    }

    #[test]
    fn triggered_alert_leaves_active_set() {
        let store = InMemoryStore::new();
        let nifty = Instrument::new("NSE", "NIFTY 50");
        let alert = store.create_alert(new_alert("NIFTY 50")).unwrap();
        assert_eq!(store.active_alerts_for(&nifty).unwrap().len(), 1);

        assert!(store.mark_alert_triggered(alert.id, Utc::now()).unwrap());
        assert!(store.active_alerts_for(&nifty).unwrap().is_empty());

        let stored = store.get_alert(alert.id).unwrap().unwrap();
        assert!(stored.is_triggered);
        assert!(!stored.is_active);
        assert!(stored.triggered_at.is_some());
    }

    #[test]
    fn second_trigger_is_reported_as_no_change() {
        let store = InMemoryStore::new();
        let alert = store.create_alert(new_alert("INFY")).unwrap();
        assert!(store.mark_alert_triggered(alert.id, Utc::now()).unwrap());
        assert!(!store.mark_alert_triggered(alert.id, Utc::now()).unwrap());
        assert!(!store.deactivate_alert(alert.id).unwrap());
    }

    #[test]
    fn active_alerts_filter_by_instrument() {
        let store = InMemoryStore::new();
        store.create_alert(new_alert("INFY")).unwrap();
        store.create_alert(new_alert("TCS")).unwrap();
        let infy = store.active_alerts_for(&Instrument::new("NSE", "INFY")).unwrap();
        assert_eq!(infy.len(), 1);
        assert_eq!(infy[0].symbol, "INFY");
        assert!(store.active_alerts_for(&Instrument::new("BSE", "INFY")).unwrap().is_empty());
    }

    #[test]
    fn explicit_expiry_is_persisted() {
        let store = InMemoryStore::new();
        let deadline = Utc::now() + chrono::Duration::hours(2);
        let alert = store
            .create_alert(NewLevelAlert { expires_at: Some(deadline), ..new_alert("SBIN") })
            .unwrap();
        assert_eq!(alert.expires_at, Some(deadline));
        assert_eq!(store.get_alert(alert.id).unwrap().unwrap().expires_at, Some(deadline));

        let open = store.create_alert(new_alert("SBIN")).unwrap();
        assert_eq!(open.expires_at, None);
    }

    #[test]
    fn unknown_alert_update_is_not_found() {
        let store = InMemoryStore::new();
        let err = store.deactivate_alert(99).unwrap_err();
        assert!(matches!(err, StoreError::NotFound { entity: "level_alert", id: 99 }));
    }
}
