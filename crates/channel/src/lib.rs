//! Persistent streaming query channel to the ingestion backend.
//!
//! One websocket connection, one query in flight at a time. Connection
//! loss is handled with exponential-backoff reconnection and transparent
//! replay of queued queries, so transient network trouble is invisible
//! to callers up to the retry budget.

mod channel;
mod driver;
mod pumps;
mod query;
mod types;
mod wire;

pub use channel::StreamChannel;
pub use query::{ChunkCallback, QueryOutcome, QueryTicket};
pub use types::{ChannelConfig, ChannelEvent, ConnectionState, ReconnectConfig};

use tokio_tungstenite::tungstenite;

/// Errors surfaced by the stream channel.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("WebSocket error: {0}")]
    Ws(#[from] tungstenite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("channel closed")]
    Closed,

    #[error("backend error {code}: {message}")]
    Backend { code: i32, message: String },
}
