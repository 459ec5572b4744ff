//! # engine::ingest
//!
//! **TickIngestor** — broker tick stream (`instrument_token`) → PricePublisher
//!
//! The token map is loaded from `INSTRUMENT_TOKENS` at startup and can be
//! extended at runtime.  Ticks for unknown tokens are dropped with a warning.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::engine::publisher::{PricePublisher, PublishReport};
use crate::models::{Instrument, PriceData, RawTick};

pub struct TickIngestor {
    tokens:    RwLock<HashMap<u32, Instrument>>,
    publisher: Arc<PricePublisher>,
}

impl TickIngestor {
    pub fn new(publisher: Arc<PricePublisher>, tokens: Vec<(u32, Instrument)>) -> Self {
        Self {
            tokens: RwLock::new(tokens.into_iter().collect()),
            publisher,
        }
    }

    /// Maps `token` to `instrument`, returning the previous mapping if any.
    pub fn register(&self, token: u32, instrument: Instrument) -> Option<Instrument> {
        debug!(token, instrument = %instrument, "Instrument token registered");
        self.tokens.write().insert(token, instrument)
    }

    pub fn instrument_for(&self, token: u32) -> Option<Instrument> {
        self.tokens.read().get(&token).cloned()
    }

    pub fn token_count(&self) -> usize {
        self.tokens.read().len()
    }

    /// Resolves the token and derives `net_change` / `change_percent`.
    pub fn translate(&self, tick: &RawTick) -> Option<(Instrument, PriceData)> {
        let Some(instrument) = self.instrument_for(tick.instrument_token) else {
            warn!(token = tick.instrument_token, "⚠️ Tick for unknown instrument token — dropped");
            return None;
        };
        let price_data = PriceData::from_quote(tick.last_price, tick.ohlc, tick.timestamp);
        Some((instrument, price_data))
    }

    /// Translates and publishes one tick.  `None` = unknown token.
    pub fn ingest(&self, tick: &RawTick) -> Option<PublishReport> {
        let (instrument, price_data) = self.translate(tick)?;
        Some(self.publisher.publish(instrument, price_data))
    }
}
