//! Frame encoding and decoding over websocket messages.

use lectern_protocol::constants::{FrameType, MAX_FRAME_SIZE};
use lectern_protocol::envelope::Frame;
use lectern_protocol::types::QueryRequest;
use tokio_tungstenite::tungstenite::Message;
use tracing::warn;

/// Builds the outgoing message for a query submission.
pub(crate) fn query_message(id: &str, request: &QueryRequest) -> Result<Message, serde_json::Error> {
    let frame = Frame::new(id, FrameType::Query, Some(request))?;
    encode(&frame)
}

/// Builds the outgoing message cancelling the query with the given id.
pub(crate) fn stop_message(id: &str) -> Result<Message, serde_json::Error> {
    let frame = Frame::new::<()>(id, FrameType::Stop, None)?;
    encode(&frame)
}

fn encode(frame: &Frame) -> Result<Message, serde_json::Error> {
    let json = serde_json::to_string(frame)?;
    Ok(Message::Text(json.into()))
}

/// Decodes an inbound websocket message into a frame.
///
/// Non-text messages, oversized payloads and malformed JSON are dropped
/// with a warning rather than tearing the connection down.
pub(crate) fn decode(msg: &Message) -> Option<Frame> {
    let text = match msg {
        Message::Text(text) => text.as_str(),
        _ => return None,
    };
    if text.len() > MAX_FRAME_SIZE {
        warn!(size = text.len(), "dropping oversized frame");
        return None;
    }
    match serde_json::from_str(text) {
        Ok(frame) => Some(frame),
        Err(err) => {
            warn!(error = %err, "dropping malformed frame");
            None
        }
    }
}
