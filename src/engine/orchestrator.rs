//! # engine::orchestrator
//!
//! **OrderOrchestrator (OOP)** — TradeSignal → OCO bracket Order → Trade
//!
//! ## ลำดับการตรวจสอบ (ทุก Tick, ทุก order ที่ pending/active ของ instrument นั้น)
//! ```text
//! 1. Time-based   intraday + (expires_at ผ่านแล้ว หรือ ถึง cutoff)
//!                 pending → expired (ไม่มี Trade) | active → settle(time_based)
//! 2. Entry fill   pending && |price − entry| ≤ entry × 0.001 → active
//! 3. Exit         active:
//!                 CALL  target: price ≥ target   stop: price ≤ stop
//!                 PUT   target: price ≤ target   stop: price ≥ stop
//!                 target ถูกเช็คก่อน stop เสมอ
//! ```
//! Settlement cancels every other non-terminal order in the `oco_group_id`
//! and writes one immutable Trade.
//!
//! All order transitions are serialised by `transitions`, so only one writer
//! advances an order at a time.  Terminal orders are skipped (idempotent).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::broker::{BrokerGateway, BrokerOrderRequest, TransactionType};
use crate::engine::publisher::PricePublisher;
use crate::engine::session::SessionClock;
use crate::engine::worker::{MonitorWorker, PriceConsumer};
use crate::error::AppError;
use crate::events::{EngineEvent, EventBus};
use crate::models::{
    realised_pnl, ExitReason, Instrument, NewOrder, NewTrade, OptionSide, Order, OrderStatus,
    PriceMessage, SignalStatus, Trade, TtlType,
};
use crate::store::Store;

pub const SUBSCRIBER_ID: &str = "order_orchestrator";

/// Entry fills within 10 bps of the entry price.
pub const ENTRY_TOLERANCE: Decimal = dec!(0.001);

// ─── Decision ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderAction {
    None,
    /// pending → active
    Activate,
    /// active → settled
    Exit(ExitReason),
    /// pending → expired (no Trade)
    Expire,
}

/// Pure transition decision for one order at one price.
pub fn decide(
    order:   &Order,
    price:   Decimal,
    now:     DateTime<Utc>,
    session: &SessionClock,
) -> OrderAction {
    if order.status.is_terminal() {
        return OrderAction::None;
    }

    // ── 1. Time-based close ───────────────────────────────────────────────────
    if order.ttl_type == TtlType::Intraday {
        let expired = order.expires_at.is_some_and(|at| at <= now);
        if expired || session.is_after_cutoff(now) {
            return match order.status {
                OrderStatus::Active => OrderAction::Exit(ExitReason::TimeBased),
                _ => OrderAction::Expire,
            };
        }
    }

    match order.status {
        // ── 2. Entry fill ─────────────────────────────────────────────────────
        OrderStatus::Pending => {
            if (price - order.entry_price).abs() <= order.entry_price * ENTRY_TOLERANCE {
                OrderAction::Activate
            } else {
                OrderAction::None
            }
        }

        // ── 3. Exit ───────────────────────────────────────────────────────────
        OrderStatus::Active => {
            let (target_hit, stop_hit) = match order.option_side {
                OptionSide::Call => (price >= order.target_price, price <= order.stop_loss_price),
                OptionSide::Put  => (price <= order.target_price, price >= order.stop_loss_price),
            };
            if target_hit {
                OrderAction::Exit(ExitReason::TargetHit)
            } else if stop_hit {
                OrderAction::Exit(ExitReason::StopLoss)
            } else {
                OrderAction::None
            }
        }

        _ => OrderAction::None,
    }
}

// ─── OrderOrchestrator ────────────────────────────────────────────────────────

pub struct OrderOrchestrator {
    store:       Arc<dyn Store>,
    broker:      Arc<dyn BrokerGateway>,
    publisher:   Arc<PricePublisher>,
    session:     SessionClock,
    events:      EventBus,
    poll:        Duration,
    shutdown:    Duration,
    /// ราคาล่าสุดต่อ instrument — เขียนโดย worker เท่านั้น
    last_prices: Mutex<HashMap<Instrument, Decimal>>,
    transitions: tokio::sync::Mutex<()>,
    worker:      Mutex<Option<MonitorWorker>>,
}

impl OrderOrchestrator {
    pub fn new(
        store:     Arc<dyn Store>,
        broker:    Arc<dyn BrokerGateway>,
        publisher: Arc<PricePublisher>,
        session:   SessionClock,
        events:    EventBus,
        poll:      Duration,
        shutdown:  Duration,
    ) -> Self {
        Self {
            store,
            broker,
            publisher,
            session,
            events,
            poll,
            shutdown,
            last_prices: Mutex::new(HashMap::new()),
            transitions: tokio::sync::Mutex::new(()),
            worker:      Mutex::new(None),
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────────────────────

    /// Spawns the worker.  Returns `false` if it is already running.
    pub fn start(self: &Arc<Self>) -> bool {
        let mut worker = self.worker.lock();
        if worker.as_ref().is_some_and(|w| !w.is_finished()) {
            return false;
        }
        *worker = Some(MonitorWorker::spawn(
            SUBSCRIBER_ID,
            Arc::clone(&self.publisher),
            Arc::clone(self) as Arc<dyn PriceConsumer>,
            self.poll,
        ));
        info!("📦 OrderOrchestrator started");
        true
    }

    pub async fn stop(&self) {
        let worker = self.worker.lock().take();
        if let Some(worker) = worker {
            worker.stop(self.shutdown).await;
            info!("OrderOrchestrator stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.worker.lock().as_ref().is_some_and(|w| !w.is_finished())
    }

    /// Last price observed on the orchestrator's subscription.
    pub fn last_price(&self, instrument: &Instrument) -> Option<Decimal> {
        self.last_prices.lock().get(instrument).copied()
    }

    // ── Order creation ────────────────────────────────────────────────────────

    /// Creates the bracket order for a `pending` signal and marks it `sent`.
    pub async fn create_order_from_signal(
        &self,
        signal_id: i64,
        now:       DateTime<Utc>,
    ) -> Result<Order, AppError> {
        let _guard = self.transitions.lock().await;

        let signal = self
            .store
            .get_signal(signal_id)?
            .ok_or_else(|| AppError::NotFound(format!("trade signal {signal_id}")))?;
        if signal.status != SignalStatus::Pending {
            return Err(AppError::BadRequest(format!(
                "trade signal {signal_id} is {:?}, expected pending",
                signal.status
            )));
        }

        let settings = self
            .store
            .oop_settings(signal.user_id)?
            .filter(|s| s.is_active)
            .ok_or_else(|| {
                AppError::NotConfigured(format!(
                    "OOP settings not configured for user {}",
                    signal.user_id
                ))
            })?;
        if settings.quantity == 0 {
            return Err(AppError::NotConfigured(format!(
                "OOP quantity for user {} must be positive",
                signal.user_id
            )));
        }

        let expires_at = match signal.ttl_type {
            TtlType::Intraday => Some(self.session.next_cutoff(now)),
            TtlType::Longterm => None,
        };

        let order = self.store.create_order(NewOrder {
            user_id:         signal.user_id,
            trade_signal_id: signal.id,
            exchange:        signal.exchange.clone(),
            symbol:          signal.symbol.clone(),
            option_side:     signal.option_side,
            entry_price:     signal.entry_price,
            stop_loss_price: signal.stop_loss,
            target_price:    signal.target,
            quantity:        settings.quantity,
            oco_group_id:    Uuid::new_v4(),
            ttl_type:        signal.ttl_type,
            expires_at,
        })?;
        self.store.update_signal_status(signal.id, SignalStatus::Sent)?;

        info!(
            order_id     = order.id,
            signal_id    = signal.id,
            oco_group_id = %order.oco_group_id,
            side         = ?order.option_side,
            entry        = %order.entry_price,
            target       = %order.target_price,
            stop_loss    = %order.stop_loss_price,
            quantity     = order.quantity,
            "🧾 Bracket order created"
        );
        self.events.emit(&EngineEvent::OrderCreated { order: Box::new(order.clone()) });

        Ok(order)
    }

    // ── Tick evaluation ───────────────────────────────────────────────────────

    /// Advances every pending/active order for the message's instrument.
    pub async fn process_tick(
        &self,
        message: &PriceMessage,
        now:     DateTime<Utc>,
    ) -> Vec<(i64, OrderAction)> {
        let instrument = &message.instrument;
        let price = message.price_data.last_price;
        self.last_prices.lock().insert(instrument.clone(), price);

        let _guard = self.transitions.lock().await;

        let orders = match self.store.get_active_oop_orders(instrument) {
            Ok(orders) => orders,
            Err(e) => {
                error!(instrument = %instrument, error = %e, "Failed to load active orders");
                return Vec::new();
            }
        };

        let mut actions = Vec::with_capacity(orders.len());
        for listed in orders {
            // อ่านใหม่ทุกครั้ง — sibling อาจถูก cancel ไปแล้วใน loop นี้
            let order = match self.store.get_order(listed.id) {
                Ok(Some(order)) if !order.status.is_terminal() => order,
                Ok(_) => continue,
                Err(e) => {
                    error!(order_id = listed.id, error = %e, "Failed to reload order");
                    continue;
                }
            };

            let action = decide(&order, price, now, &self.session);
            if action != OrderAction::None {
                if let Err(e) = self.apply(order, action, price, now).await {
                    error!(order_id = listed.id, action = ?action, error = %e, "Order transition failed");
                }
            }
            actions.push((listed.id, action));
        }
        actions
    }

    async fn apply(
        &self,
        mut order: Order,
        action:    OrderAction,
        price:     Decimal,
        now:       DateTime<Utc>,
    ) -> Result<(), AppError> {
        match action {
            OrderAction::None => Ok(()),

            OrderAction::Activate => {
                order.status         = OrderStatus::Active;
                order.executed_price = Some(order.entry_price);
                self.store.update_order(&order)?;
                self.store.update_signal_status(order.trade_signal_id, SignalStatus::Executed)?;

                if !self.is_paper(order.user_id) {
                    self.place_live(&order, TransactionType::Buy, order.entry_price).await;
                }

                info!(
                    order_id = order.id,
                    entry    = %order.entry_price,
                    price    = %price,
                    "✅ Entry filled — order active"
                );
                self.events.emit(&EngineEvent::OrderActivated { order: Box::new(order) });
                Ok(())
            }

            OrderAction::Exit(reason) => self.settle(order, price, reason, now).await.map(|_| ()),

            OrderAction::Expire => {
                order.status = OrderStatus::Expired;
                self.store.update_order(&order)?;
                self.store.update_signal_status(order.trade_signal_id, SignalStatus::Cancelled)?;

                info!(order_id = order.id, "⌛ Pending order expired before entry");
                self.events.emit(&EngineEvent::OrderExpired { order_id: order.id });
                Ok(())
            }
        }
    }

    /// Closes an active order: live exit (best-effort), P&L, OCO cancel, Trade.
    async fn settle(
        &self,
        mut order:  Order,
        exit_price: Decimal,
        reason:     ExitReason,
        now:        DateTime<Utc>,
    ) -> Result<Trade, AppError> {
        if !self.is_paper(order.user_id) {
            self.place_live(&order, TransactionType::Sell, exit_price).await;
        }

        let entry = order.executed_price.unwrap_or(order.entry_price);
        let (pnl, pnl_percent) = realised_pnl(order.option_side, entry, exit_price, order.quantity);

        order.status      = reason.order_status();
        order.pnl         = Some(pnl);
        order.pnl_percent = Some(pnl_percent);
        self.store.update_order(&order)?;

        self.cancel_siblings(&order, "oco sibling settled")?;

        let trade = self.store.create_trade(NewTrade {
            order_id:    order.id,
            user_id:     order.user_id,
            entry_price: entry,
            exit_price,
            quantity:    order.quantity,
            exit_reason: reason,
            pnl,
            pnl_percent,
            executed_at: now,
        })?;
        self.store.update_signal_status(order.trade_signal_id, SignalStatus::Closed)?;

        info!(
            order_id    = order.id,
            reason      = ?reason,
            entry       = %entry,
            exit        = %exit_price,
            pnl         = %pnl,
            pnl_percent = %pnl_percent,
            "💰 Position settled"
        );
        self.events.emit(&EngineEvent::OrderClosed {
            order:       Box::new(order),
            trade:       Box::new(trade.clone()),
            exit_reason: reason,
        });

        Ok(trade)
    }

    /// Cancels every other non-terminal order sharing `order`'s OCO group.
    fn cancel_siblings(&self, order: &Order, reason: &str) -> Result<usize, AppError> {
        let mut cancelled = 0;
        for mut sibling in self.store.orders_in_group(order.oco_group_id)? {
            if sibling.id == order.id || sibling.status.is_terminal() {
                continue;
            }
            sibling.status = OrderStatus::Cancelled;
            self.store.update_order(&sibling)?;
            cancelled += 1;

            debug!(order_id = sibling.id, oco_group_id = %order.oco_group_id, "OCO sibling cancelled");
            self.events.emit(&EngineEvent::OrderCancelled {
                order_id: sibling.id,
                reason:   reason.to_string(),
            });
        }
        Ok(cancelled)
    }

    // ── Manual control ────────────────────────────────────────────────────────

    /// Cancels a pending order, or closes an active one at the last price
    /// (`exit_reason = manual`).  Terminal orders are returned unchanged.
    pub async fn cancel_order(&self, order_id: i64, now: DateTime<Utc>) -> Result<Order, AppError> {
        let _guard = self.transitions.lock().await;

        let mut order = self
            .store
            .get_order(order_id)?
            .ok_or_else(|| AppError::NotFound(format!("order {order_id}")))?;

        if order.status.is_terminal() {
            debug!(order_id, status = ?order.status, "Cancel on terminal order ignored");
            return Ok(order);
        }

        if order.status == OrderStatus::Active {
            let instrument = order.instrument();
            let price = match self.last_price(&instrument) {
                Some(price) => price,
                None => self.broker.get_quote(&instrument).await?.last_price,
            };
            let settled_id = order.id;
            self.settle(order, price, ExitReason::Manual, now).await?;
            return self
                .store
                .get_order(settled_id)?
                .ok_or_else(|| AppError::NotFound(format!("order {settled_id}")));
        }

        order.status = OrderStatus::Cancelled;
        self.store.update_order(&order)?;
        self.store.update_signal_status(order.trade_signal_id, SignalStatus::Cancelled)?;
        self.cancel_siblings(&order, "bracket cancelled")?;

        info!(order_id, "🛑 Order cancelled manually");
        self.events.emit(&EngineEvent::OrderCancelled {
            order_id,
            reason: "manual".to_string(),
        });
        Ok(order)
    }

    // ── Live execution hook ───────────────────────────────────────────────────

    fn is_paper(&self, user_id: i64) -> bool {
        match self.store.oop_settings(user_id) {
            Ok(settings) => settings.map(|s| s.paper_trading).unwrap_or(true),
            Err(e) => {
                warn!(user_id, error = %e, "OOP settings unreadable — treating as paper trading");
                true
            }
        }
    }

    /// Failure is logged only; the paper-equivalent state change still happens.
    async fn place_live(&self, order: &Order, transaction_type: TransactionType, price: Decimal) {
        let request = BrokerOrderRequest {
            instrument: order.instrument(),
            option_side: order.option_side,
            transaction_type,
            quantity: order.quantity,
            price,
            tag: format!("LB-{}", order.id),
        };

        match self.broker.place_order(&request).await {
            Ok(broker_order_id) => info!(
                order_id = order.id,
                broker_order_id = %broker_order_id,
                transaction = ?transaction_type,
                "Live order placed"
            ),
            Err(e) => error!(
                order_id = order.id,
                transaction = ?transaction_type,
                error = %e,
                "Live order placement failed — continuing with paper settlement"
            ),
        }
    }
}

#[async_trait]
impl PriceConsumer for OrderOrchestrator {
    async fn on_price(&self, message: PriceMessage) {
        let actions = self.process_tick(&message, Utc::now()).await;
        debug!(instrument = %message.instrument, orders = actions.len(), "Orders evaluated");
    }
}
