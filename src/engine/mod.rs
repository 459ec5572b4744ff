//! # engine
//!
//! ```text
//! TickIngestor ─▶ PricePublisher ─┬─▶ AlertMonitor ─▶ SignalPipeline ─▶ SignalGenerator
//!                                 │                                   └─▶ OrderOrchestrator (create)
//!                                 └─▶ OrderOrchestrator (entry / exit / OCO)
//! ```

pub mod alert_monitor;
pub mod ingest;
pub mod orchestrator;
pub mod pipeline;
pub mod publisher;
pub mod session;
pub mod signal;
pub mod trend;
pub mod worker;
