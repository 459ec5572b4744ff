//! # engine::pipeline
//!
//! Glue between AlertMonitor and the trading engines:
//!
//! ```text
//! TriggerEvent ─▶ SignalGenerator ─Created─▶ (OOP active && auto_execute)
//!                                              └─▶ OrderOrchestrator::create_order_from_signal
//! ```
//! Duplicate / Rejected outcomes stop here.  Missing OOP settings leave the
//! signal `pending` for a manual `POST /api/signals/:id/order`.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, info};

use crate::engine::alert_monitor::TriggerSink;
use crate::engine::orchestrator::OrderOrchestrator;
use crate::engine::signal::{SignalGenerator, SignalOutcome};
use crate::error::AppError;
use crate::models::TriggerEvent;
use crate::store::Store;

pub struct SignalPipeline {
    generator:    Arc<SignalGenerator>,
    orchestrator: Arc<OrderOrchestrator>,
    store:        Arc<dyn Store>,
}

impl SignalPipeline {
    pub fn new(
        generator:    Arc<SignalGenerator>,
        orchestrator: Arc<OrderOrchestrator>,
        store:        Arc<dyn Store>,
    ) -> Self {
        Self { generator, orchestrator, store }
    }

    /// Returns the signal outcome; creates the order when auto-execution is on.
    pub async fn handle(&self, event: &TriggerEvent) -> Result<SignalOutcome, AppError> {
        let outcome = self.generator.generate(event).await?;

        let (signal_id, user_id) = match &outcome {
            SignalOutcome::Created(signal) => (signal.id, signal.user_id),
            _ => {
                debug!(alert_id = event.level_alert_id, outcome = ?outcome, "No new signal");
                return Ok(outcome);
            }
        };

        let auto = self
            .store
            .oop_settings(user_id)?
            .is_some_and(|s| s.is_active && s.auto_execute);
        if !auto {
            info!(signal_id, "Auto-execute off — signal left pending");
            return Ok(outcome);
        }

        self.orchestrator
            .create_order_from_signal(signal_id, Utc::now())
            .await?;
        Ok(outcome)
    }
}

#[async_trait]
impl TriggerSink for SignalPipeline {
    async fn on_trigger(&self, event: TriggerEvent) -> Result<(), AppError> {
        self.handle(&event).await.map(|_| ())
    }
}
