//! Depth book for a single instrument
//!
//! Holds the latest bid/ask ladders. Each side is replaced wholesale when
//! a fresh update for it arrives; levels are never merged individually.

use serde::{Deserialize, Serialize};

use crate::parser::{DecodedEvent, DepthLevel, DepthSide};

/// Live 20-level book, owned by the feed session (single writer).
#[derive(Debug, Default)]
pub struct DepthBook {
    bids: DepthSide,
    offers: DepthSide,
}

impl DepthBook {
    /// Create an empty book.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the bid ladder.
    pub fn apply_bids(&mut self, side: DepthSide) {
        self.bids = side;
    }

    /// Replace the offer ladder.
    pub fn apply_offers(&mut self, side: DepthSide) {
        self.offers = side;
    }

    /// Apply a decoded event to the book.
    ///
    /// Returns true if the event mutated a side; control events leave the
    /// book untouched.
    pub fn apply(&mut self, event: DecodedEvent) -> bool {
        match event {
            DecodedEvent::BidUpdate(side) => {
                self.apply_bids(side);
                true
            }
            DecodedEvent::AskUpdate(side) => {
                self.apply_offers(side);
                true
            }
            DecodedEvent::DisconnectNotice { .. } | DecodedEvent::Unrecognized { .. } => false,
        }
    }

    pub fn bids(&self) -> &[DepthLevel] {
        &self.bids
    }

    pub fn offers(&self) -> &[DepthLevel] {
        &self.offers
    }

    /// Owned, immutable copy of both ladders.
    pub fn snapshot(&self) -> DepthSnapshot {
        DepthSnapshot {
            bids: self.bids.clone(),
            offers: self.offers.clone(),
        }
    }
}

/// Point-in-time copy of the book handed to renderers and the HTTP surface.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DepthSnapshot {
    pub bids: Vec<DepthLevel>,
    pub offers: Vec<DepthLevel>,
}

impl DepthSnapshot {
    /// Aggregate resting buy quantity across all bid levels.
    pub fn total_bid_quantity(&self) -> u64 {
        self.bids.iter().map(|l| u64::from(l.quantity)).sum()
    }

    /// Aggregate resting sell quantity across all offer levels.
    pub fn total_offer_quantity(&self) -> u64 {
        self.offers.iter().map(|l| u64::from(l.quantity)).sum()
    }

    /// Highest bid price, if any bids are resting.
    pub fn best_bid(&self) -> Option<f64> {
        self.bids.iter().map(|l| l.price).reduce(f64::max)
    }

    /// Lowest offer price, if any offers are resting.
    pub fn best_offer(&self) -> Option<f64> {
        self.offers.iter().map(|l| l.price).reduce(f64::min)
    }
}
