//! Subscription protocol messages
//!
//! Builders for the JSON control messages sent over the feed socket, plus
//! the close-code semantics shared by packet- and socket-level disconnects.

use serde::Serialize;

/// Request code for dropping every live subscription on this socket.
pub const REQUEST_CODE_UNSUBSCRIBE_ALL: u8 = 12;
/// Request code for subscribing to 20-level market depth.
pub const REQUEST_CODE_SUBSCRIBE: u8 = 23;

/// Subscription mode string for the 20-level ladder.
pub const DEPTH_MODE: &str = "20DEPTH";

/// Close / disconnect code: too many concurrent connections for this
/// credential, the oldest socket was evicted.
pub const EVICTION_CODE: u16 = 805;

/// Whether a websocket close code signals a credential eviction.
pub fn is_eviction(code: u16) -> bool {
    code == EVICTION_CODE
}

/// One instrument to subscribe to (exchange segment + security id).
#[derive(Debug, Clone)]
pub struct Instrument {
    pub exchange_segment: String,
    pub security_id: String,
}

/// `{"RequestCode":12}` — drop all subscriptions.
#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct UnsubscribeAll {
    request_code: u8,
}

/// `{"RequestCode":23,...}` — subscribe to 20-level depth for a set of
/// instruments.
#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct SubscribeRequest {
    request_code: u8,
    instrument_count: usize,
    instrument_list: Vec<SubscriptionEntry>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct SubscriptionEntry {
    exchange_segment: String,
    security_id: String,
    bid_ask_both: bool,
    mode: &'static str,
}

/// Build the unsubscribe-all control message.
pub fn unsubscribe_all() -> UnsubscribeAll {
    UnsubscribeAll {
        request_code: REQUEST_CODE_UNSUBSCRIBE_ALL,
    }
}

/// Build a 20-depth subscribe message for the given instruments.
pub fn subscribe(instruments: &[Instrument]) -> SubscribeRequest {
    SubscribeRequest {
        request_code: REQUEST_CODE_SUBSCRIBE,
        instrument_count: instruments.len(),
        instrument_list: instruments
            .iter()
            .map(|instrument| SubscriptionEntry {
                exchange_segment: instrument.exchange_segment.clone(),
                security_id: instrument.security_id.clone(),
                bid_ask_both: true,
                mode: DEPTH_MODE,
            })
            .collect(),
    }
}
