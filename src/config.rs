//! Configuration module for the depth feed handler

use serde::Deserialize;
use std::env;
use std::time::Duration;

use crate::subscription::Instrument;

const DEFAULT_CONFIG_ENDPOINT: &str = "http://127.0.0.1:5000/config";
const DEFAULT_FEED_ENDPOINT: &str = "wss://depth-api-feed.dhan.co/twentydepth";

const DEFAULT_RECONNECT_DELAY_MS: u64 = 5_000;
const DEFAULT_WATCHDOG_TIMEOUT_MS: u64 = 40_000;
const DEFAULT_SUBSCRIBE_GRACE_MS: u64 = 1_000;

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Credential endpoint returning `{token, clientId}`
    pub config_endpoint: String,

    /// WebSocket endpoint for the twentydepth feed
    pub feed_endpoint: String,

    /// Exchange segment of the subscribed instrument (e.g. "NSE_EQ")
    pub exchange_segment: String,

    /// Security id of the subscribed instrument
    pub security_id: String,

    /// Delay before reopening the socket after any close
    pub reconnect_delay_ms: u64,

    /// Idle window after which a silent connection is closed locally.
    /// The server heartbeat cadence is ~10s, so the default tolerates
    /// four missed beats.
    pub watchdog_timeout_ms: u64,

    /// Pause between unsubscribe-all and subscribe after socket open
    pub subscribe_grace_ms: u64,

    /// Bind address for the health/depth/metrics HTTP server
    pub http_bind: String,

    /// Depth status logging interval in seconds
    pub status_interval_secs: u64,
}

impl Config {
    /// Load configuration from environment variables
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            config_endpoint: env::var("CONFIG_ENDPOINT")
                .unwrap_or_else(|_| DEFAULT_CONFIG_ENDPOINT.to_string()),
            feed_endpoint: env::var("FEED_ENDPOINT")
                .unwrap_or_else(|_| DEFAULT_FEED_ENDPOINT.to_string()),
            exchange_segment: env::var("EXCHANGE_SEGMENT")
                .unwrap_or_else(|_| "NSE_EQ".to_string()),
            security_id: env::var("SECURITY_ID").unwrap_or_else(|_| "2885".to_string()),
            reconnect_delay_ms: env::var("RECONNECT_DELAY_MS")
                .unwrap_or_else(|_| DEFAULT_RECONNECT_DELAY_MS.to_string())
                .parse()
                .unwrap_or(DEFAULT_RECONNECT_DELAY_MS),
            watchdog_timeout_ms: env::var("WATCHDOG_TIMEOUT_MS")
                .unwrap_or_else(|_| DEFAULT_WATCHDOG_TIMEOUT_MS.to_string())
                .parse()
                .unwrap_or(DEFAULT_WATCHDOG_TIMEOUT_MS),
            subscribe_grace_ms: env::var("SUBSCRIBE_GRACE_MS")
                .unwrap_or_else(|_| DEFAULT_SUBSCRIBE_GRACE_MS.to_string())
                .parse()
                .unwrap_or(DEFAULT_SUBSCRIBE_GRACE_MS),
            http_bind: env::var("HTTP_BIND").unwrap_or_else(|_| "0.0.0.0:9090".to_string()),
            status_interval_secs: env::var("STATUS_INTERVAL_SECS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .unwrap_or(30),
        })
    }

    /// Instruments to subscribe to. The reference deployment tracks
    /// exactly one.
    pub fn instruments(&self) -> Vec<Instrument> {
        vec![Instrument {
            exchange_segment: self.exchange_segment.clone(),
            security_id: self.security_id.clone(),
        }]
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    pub fn watchdog_timeout(&self) -> Duration {
        Duration::from_millis(self.watchdog_timeout_ms)
    }

    pub fn subscribe_grace(&self) -> Duration {
        Duration::from_millis(self.subscribe_grace_ms)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            config_endpoint: DEFAULT_CONFIG_ENDPOINT.to_string(),
            feed_endpoint: DEFAULT_FEED_ENDPOINT.to_string(),
            exchange_segment: "NSE_EQ".to_string(),
            security_id: "2885".to_string(),
            reconnect_delay_ms: DEFAULT_RECONNECT_DELAY_MS,
            watchdog_timeout_ms: DEFAULT_WATCHDOG_TIMEOUT_MS,
            subscribe_grace_ms: DEFAULT_SUBSCRIBE_GRACE_MS,
            http_bind: "0.0.0.0:9090".to_string(),
            status_interval_secs: 30,
        }
    }
}
