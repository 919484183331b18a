//! Parser module for twentydepth binary packets
//!
//! Decodes the fixed-layout 332-byte depth frames into bid/ask ladder
//! updates and control events. Pure byte handling, no I/O.

use bytes::Buf;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::{FeedError, Result};

/// Size of one depth frame (12-byte header + 20 slots of 16 bytes).
pub const FRAME_LEN: usize = 332;
/// Size of the response header preceding each frame.
pub const HEADER_LEN: usize = 12;
/// Number of depth slots per frame.
pub const DEPTH_SLOTS: usize = 20;
/// Size of one depth slot (price f64, quantity u32, orders u32).
pub const SLOT_LEN: usize = 16;

/// Feed response code for a bid ladder frame.
pub const FEED_CODE_BID: u8 = 41;
/// Feed response code for an ask ladder frame.
pub const FEED_CODE_ASK: u8 = 51;
/// Feed response code for a disconnect notice.
pub const FEED_CODE_DISCONNECT: u8 = 50;

/// One price rung of the book.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepthLevel {
    pub price: f64,
    pub quantity: u32,
    pub orders: u32,
}

/// One side of the book, in wire order, at most [`DEPTH_SLOTS`] entries.
pub type DepthSide = Vec<DepthLevel>;

/// Response header preceding every frame, little-endian.
#[derive(Debug, Clone, Copy)]
pub struct PacketHeader {
    pub msg_length: i16,
    pub feed_code: u8,
    pub exchange_segment: u8,
    pub security_id: i32,
    pub message_seq: u32,
}

impl PacketHeader {
    /// Parse a header from the start of `buf`.
    ///
    /// Callers must guarantee at least [`HEADER_LEN`] bytes.
    fn parse(mut buf: &[u8]) -> Self {
        Self {
            msg_length: buf.get_i16_le(),
            feed_code: buf.get_u8(),
            exchange_segment: buf.get_u8(),
            security_id: buf.get_i32_le(),
            message_seq: buf.get_u32_le(),
        }
    }
}

/// A decoded depth or control event.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedEvent {
    BidUpdate(DepthSide),
    AskUpdate(DepthSide),
    DisconnectNotice { code: i16 },
    Unrecognized { feed_code: u8 },
}

/// Decode one inbound binary message into its frame events.
///
/// A message carries either a single 332-byte frame or two concatenated
/// frames (664 bytes). Frame 1 is always decoded; frame 2 only when the
/// buffer is long enough — a short tail is skipped, not an error.
pub fn decode_message(buf: &[u8]) -> Result<Vec<DecodedEvent>> {
    if buf.len() < FRAME_LEN {
        return Err(FeedError::MalformedBuffer {
            len: buf.len(),
            min: FRAME_LEN,
        });
    }

    let mut events = vec![decode_frame(buf, 0)];
    if buf.len() >= 2 * FRAME_LEN {
        events.push(decode_frame(buf, FRAME_LEN));
    }

    Ok(events)
}

/// Decode the frame starting at `start`, which must have [`FRAME_LEN`]
/// bytes available.
fn decode_frame(buf: &[u8], start: usize) -> DecodedEvent {
    let frame = &buf[start..start + FRAME_LEN];
    let header = PacketHeader::parse(frame);

    trace!(
        offset = start,
        msg_length = header.msg_length,
        feed_code = header.feed_code,
        exchange_segment = header.exchange_segment,
        security_id = header.security_id,
        message_seq = header.message_seq,
        "decoding depth frame"
    );

    match header.feed_code {
        FEED_CODE_BID => DecodedEvent::BidUpdate(decode_levels(&frame[HEADER_LEN..])),
        FEED_CODE_ASK => DecodedEvent::AskUpdate(decode_levels(&frame[HEADER_LEN..])),
        FEED_CODE_DISCONNECT => {
            let mut payload = &frame[HEADER_LEN..];
            DecodedEvent::DisconnectNotice {
                code: payload.get_i16_le(),
            }
        }
        other => DecodedEvent::Unrecognized { feed_code: other },
    }
}

/// Decode the 20 fixed slots of a ladder payload, keeping only occupied
/// ones and preserving wire order.
fn decode_levels(mut payload: &[u8]) -> DepthSide {
    let mut levels = Vec::with_capacity(DEPTH_SLOTS);
    for _ in 0..DEPTH_SLOTS {
        let price = payload.get_f64_le();
        let quantity = payload.get_u32_le();
        let orders = payload.get_u32_le();
        if price > 0.0 || quantity > 0 {
            levels.push(DepthLevel {
                price,
                quantity,
                orders,
            });
        }
    }
    levels
}
