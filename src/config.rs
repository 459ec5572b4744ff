//! # config — อ่าน Config จาก Environment Variables
//!
//! `dotenvy::dotenv()` is called by the binary first, so every key can also
//! live in `.env`.  Every key has a default; only `BROKER_BASE_URL` changes
//! behaviour when missing (broker calls fail with `NotConfigured`).

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Context;
use chrono::NaiveTime;

use crate::models::Instrument;

/// Trading-day cutoff: 15:00 IST = 09:30 UTC.
pub const DEFAULT_CUTOFF_UTC: &str = "09:30";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr:               SocketAddr,
    /// `None` = broker not configured, `"mock"` = simulate order placement
    pub broker_base_url:         Option<String>,
    pub broker_api_key:          Option<String>,
    /// ขนาด queue ต่อ subscriber
    pub subscriber_capacity:     usize,
    /// Bounded wait on the subscription queue between shutdown checks.
    pub monitor_poll:            Duration,
    pub monitor_shutdown:        Duration,
    pub trading_cutoff:          NaiveTime,
    pub instrument_tokens:       Vec<(u32, Instrument)>,
    pub event_channel_capacity:  usize,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let bind_addr: SocketAddr = std::env::var("BIND_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:3000".to_string())
            .parse()
            .context("BIND_ADDR must be host:port")?;

        let cutoff_raw = std::env::var("TRADING_CUTOFF_UTC")
            .unwrap_or_else(|_| DEFAULT_CUTOFF_UTC.to_string());
        let trading_cutoff = NaiveTime::parse_from_str(&cutoff_raw, "%H:%M")
            .with_context(|| format!("TRADING_CUTOFF_UTC must be HH:MM, got '{cutoff_raw}'"))?;

        let instrument_tokens = match std::env::var("INSTRUMENT_TOKENS") {
            Ok(raw) => parse_instrument_tokens(&raw)?,
            Err(_) => Vec::new(),
        };

        Ok(Self {
            bind_addr,
            broker_base_url:        non_empty_env("BROKER_BASE_URL"),
            broker_api_key:         non_empty_env("BROKER_API_KEY"),
            subscriber_capacity:    env_usize("SUBSCRIBER_QUEUE_CAPACITY", 1000),
            monitor_poll:           Duration::from_millis(env_u64("MONITOR_POLL_MS", 1000)),
            monitor_shutdown:       Duration::from_millis(env_u64("MONITOR_SHUTDOWN_MS", 2000)),
            trading_cutoff,
            instrument_tokens,
            event_channel_capacity: env_usize("EVENT_CHANNEL_CAPACITY", 256),
        })
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr:              SocketAddr::from(([0, 0, 0, 0], 3000)),
            broker_base_url:        None,
            broker_api_key:         None,
            subscriber_capacity:    1000,
            monitor_poll:           Duration::from_secs(1),
            monitor_shutdown:       Duration::from_secs(2),
            trading_cutoff:         NaiveTime::from_hms_opt(9, 30, 0).unwrap_or(NaiveTime::MIN),
            instrument_tokens:      Vec::new(),
            event_channel_capacity: 256,
        }
    }
}

/// Parses `token=EXCHANGE:SYMBOL;token=EXCHANGE:SYMBOL`.
pub fn parse_instrument_tokens(raw: &str) -> anyhow::Result<Vec<(u32, Instrument)>> {
    raw.split(';')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let (token, instrument) = entry
                .split_once('=')
                .with_context(|| format!("INSTRUMENT_TOKENS entry '{entry}' must be token=EXCHANGE:SYMBOL"))?;
            let token: u32 = token
                .trim()
                .parse()
                .with_context(|| format!("instrument token '{token}' must be a number"))?;
            let instrument: Instrument = instrument.parse().map_err(anyhow::Error::msg)?;
            Ok((token, instrument))
        })
        .collect()
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_token_map() {
        let tokens = parse_instrument_tokens("256265=NSE:NIFTY 50; 260105=NSE:NIFTY BANK;").unwrap();
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[0], (256265, Instrument::new("NSE", "NIFTY 50")));
        assert_eq!(tokens[1], (260105, Instrument::new("NSE", "NIFTY BANK")));
    }

    #[test]
    fn rejects_malformed_token_entry() {
        assert!(parse_instrument_tokens("abc=NSE:INFY").is_err());
        assert!(parse_instrument_tokens("1234").is_err());
        assert!(parse_instrument_tokens("1234=INFY").is_err());
    }

    #[test]
    fn default_cutoff_is_0930_utc() {
        let config = AppConfig::default();
        assert_eq!(config.trading_cutoff, NaiveTime::from_hms_opt(9, 30, 0).unwrap());
        assert_eq!(config.subscriber_capacity, 1000);
    }
}
