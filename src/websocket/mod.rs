//! WebSocket module for feed connection management

mod client;
mod manager;
mod state;

pub use client::{FeedMessage, FeedSocket};
pub use manager::{ConnectionManager, SessionHandle};
pub use state::{Command, SessionEvent, SessionMachine, SessionState};
