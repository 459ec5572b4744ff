//! # levelbreak
//!
//! Price distribution and OCO order orchestration for level-break trading.
//!
//! ```text
//!  broker ticks ──▶ TickIngestor ──▶ PricePublisher ──┬──▶ AlertMonitor ──▶ SignalGenerator (TRE)
//!                                                      │                         │
//!                                                      │                         ▼
//!                                                      └──▶ OrderOrchestrator (OOP) ──▶ Trade
//! ```

pub mod broker;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod models;
pub mod routes;
pub mod state;
pub mod store;

#[cfg(any(test, feature = "testkit"))]
pub mod testkit;
