//! Feed session metrics
//!
//! Prometheus counters on a private registry, exposed through the
//! `/metrics` endpoint.

use prometheus::{proto::MetricFamily, IntCounter, Registry};

pub struct Metrics {
    registry: Registry,
    /// Inbound websocket messages of any kind.
    pub messages_received: IntCounter,
    /// Successfully decoded depth/control frames.
    pub frames_decoded: IntCounter,
    /// Binary payloads too short to decode.
    pub malformed_buffers: IntCounter,
    /// Connection attempts after the first.
    pub reconnects: IntCounter,
    /// Credential evictions (close/disconnect code 805).
    pub evictions: IntCounter,
    /// Watchdog-triggered local closes.
    pub watchdog_timeouts: IntCounter,
}

impl Metrics {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let messages_received = IntCounter::new(
            "depth_messages_received_total",
            "Inbound websocket messages of any kind",
        )?;
        let frames_decoded = IntCounter::new(
            "depth_frames_decoded_total",
            "Successfully decoded depth frames",
        )?;
        let malformed_buffers = IntCounter::new(
            "depth_malformed_buffers_total",
            "Binary payloads dropped as too short to decode",
        )?;
        let reconnects = IntCounter::new(
            "depth_reconnects_total",
            "Feed connection attempts after the first",
        )?;
        let evictions = IntCounter::new(
            "depth_evictions_total",
            "Credential evictions reported by the server",
        )?;
        let watchdog_timeouts = IntCounter::new(
            "depth_watchdog_timeouts_total",
            "Local closes after a silent watchdog window",
        )?;

        registry.register(Box::new(messages_received.clone()))?;
        registry.register(Box::new(frames_decoded.clone()))?;
        registry.register(Box::new(malformed_buffers.clone()))?;
        registry.register(Box::new(reconnects.clone()))?;
        registry.register(Box::new(evictions.clone()))?;
        registry.register(Box::new(watchdog_timeouts.clone()))?;

        Ok(Self {
            registry,
            messages_received,
            frames_decoded,
            malformed_buffers,
            reconnects,
            evictions,
            watchdog_timeouts,
        })
    }

    pub fn gather(&self) -> Vec<MetricFamily> {
        self.registry.gather()
    }
}
