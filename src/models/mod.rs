//! # models
//!
//! Typed entities shared across the engine.  Storage rows are mapped into
//! these at the store boundary.

pub mod alert;
pub mod order;
pub mod settings;
pub mod signal;
pub mod tick;

pub use alert::{LevelAlert, NewLevelAlert, TtlType};
pub use order::{realised_pnl, ExitReason, NewOrder, NewTrade, Order, OrderStatus, Trade};
pub use settings::{OopSettings, TreSettings};
pub use signal::{
    NewTradeSignal, OptionSide, SignalStatus, TradeSignal, TrendDirection, TriggerEvent,
};
pub use tick::{Candle, Instrument, Ohlc, PriceData, PriceMessage, Quote, RawTick};
