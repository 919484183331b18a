//! Live 20-level market depth handler
//!
//! Maintains a live order-book view for one instrument by consuming the
//! twentydepth binary websocket feed: fixed-layout frame decoding, a
//! subscription lifecycle state machine with idle watchdog and automatic
//! reconnect, and read-only snapshots for downstream renderers.

use std::sync::Arc;
use tokio::sync::RwLock;

pub mod book;
pub mod config;
pub mod credentials;
pub mod error;
pub mod http;
pub mod metrics;
pub mod parser;
pub mod subscription;
pub mod websocket;

pub use book::{DepthBook, DepthSnapshot};
pub use config::Config;
pub use credentials::{Credentials, CredentialsClient};
pub use error::{FeedError, Result};
pub use metrics::Metrics;
pub use parser::{decode_message, DecodedEvent, DepthLevel, DepthSide, PacketHeader};
pub use websocket::{ConnectionManager, SessionHandle};

/// Application state shared across components
pub struct AppState {
    pub book: Arc<RwLock<DepthBook>>,
    pub metrics: Arc<Metrics>,
    pub config: Arc<Config>,
    pub session: SessionHandle,
}
