//! Protocol-wide constants and frame types.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Maximum accepted frame size (4 MiB). Oversized frames are dropped.
pub const MAX_FRAME_SIZE: usize = 4 * 1024 * 1024;

/// Interval between keepalive pings while the channel is open.
pub const HEARTBEAT_PERIOD: Duration = Duration::from_secs(25);

/// Silence threshold after which the channel is reported stale.
///
/// Intermediary proxies may silently drop ping replies, so health is
/// inferred from the time since *any* inbound frame, not from pongs.
pub const STALE_AFTER: Duration = Duration::from_secs(75);

/// Type discriminator for a wire frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FrameType {
    /// Client → server: a streaming query.
    Query,
    /// Client → server: cancel the in-flight query.
    Stop,
    /// Server → client: one chunk of a streamed answer.
    Chunk,
    /// Server → client: the in-flight query finished normally.
    Done,
    /// Server → client: the in-flight query was cancelled.
    Stopped,
    /// Either direction: error report.
    Error,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_type_serde_names() {
        let json = serde_json::to_string(&FrameType::Query).unwrap();
        assert_eq!(json, "\"query\"");
        let json = serde_json::to_string(&FrameType::Stopped).unwrap();
        assert_eq!(json, "\"stopped\"");
        let ft: FrameType = serde_json::from_str("\"done\"").unwrap();
        assert_eq!(ft, FrameType::Done);
    }

    #[test]
    fn stale_threshold_exceeds_heartbeat() {
        // A healthy connection must see at least one heartbeat round
        // before the stale threshold can fire.
        assert!(STALE_AFTER > 2 * HEARTBEAT_PERIOD);
    }
}
