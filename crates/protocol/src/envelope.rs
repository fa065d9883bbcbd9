use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::constants::FrameType;

/// Error details carried in a frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameError {
    pub code: i32,
    pub message: String,
}

/// Envelope for all stream channel communication.
///
/// The `payload` field uses `serde_json::value::RawValue` to defer
/// deserialization until the frame type is known.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Frame {
    pub id: String,
    #[serde(rename = "type")]
    pub frame_type: FrameType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<Box<serde_json::value::RawValue>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<FrameError>,
}

impl Frame {
    /// Creates a new frame with the given type and payload.
    pub fn new<T: Serialize>(
        id: impl Into<String>,
        frame_type: FrameType,
        payload: Option<&T>,
    ) -> Result<Self, serde_json::Error> {
        let payload = payload
            .map(|p| {
                serde_json::to_string(p).and_then(serde_json::value::RawValue::from_string)
            })
            .transpose()?;
        Ok(Self {
            id: id.into(),
            frame_type,
            payload,
            error: None,
        })
    }

    /// Deserializes the payload into the given type.
    pub fn parse_payload<T: DeserializeOwned>(&self) -> Result<Option<T>, serde_json::Error> {
        self.payload
            .as_deref()
            .map(|raw| serde_json::from_str(raw.get()))
            .transpose()
    }

    /// Creates an error frame.
    pub fn error(id: impl Into<String>, code: i32, message: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            frame_type: FrameType::Error,
            payload: None,
            error: Some(FrameError {
                code,
                message: message.into(),
            }),
        }
    }

    /// Creates a response frame correlated to this request.
    pub fn reply<T: Serialize>(
        &self,
        frame_type: FrameType,
        payload: Option<&T>,
    ) -> Result<Self, serde_json::Error> {
        Frame::new(&self.id, frame_type, payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_new_with_payload() {
        let payload = serde_json::json!({"text": "hello"});
        let frame = Frame::new("f-1", FrameType::Chunk, Some(&payload)).unwrap();
        assert_eq!(frame.id, "f-1");
        assert_eq!(frame.frame_type, FrameType::Chunk);
        assert!(frame.payload.is_some());
        assert!(frame.error.is_none());
    }

    #[test]
    fn frame_new_without_payload() {
        let frame = Frame::new::<()>("f-2", FrameType::Stop, None).unwrap();
        assert!(frame.payload.is_none());
    }

    #[test]
    fn frame_error_creation() {
        let frame = Frame::error("f-3", 502, "backend unavailable");
        assert_eq!(frame.frame_type, FrameType::Error);
        let err = frame.error.unwrap();
        assert_eq!(err.code, 502);
        assert_eq!(err.message, "backend unavailable");
    }

    #[test]
    fn frame_parse_payload() {
        let payload = serde_json::json!({"text": "chunk body"});
        let frame = Frame::new("f-4", FrameType::Chunk, Some(&payload)).unwrap();
        let parsed: Option<serde_json::Value> = frame.parse_payload().unwrap();
        assert_eq!(parsed.unwrap()["text"], "chunk body");
    }

    #[test]
    fn frame_json_roundtrip() {
        let frame = Frame::error("e1", 500, "internal");
        let json = serde_json::to_string(&frame).unwrap();
        let parsed: Frame = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.id, "e1");
        assert_eq!(parsed.frame_type, FrameType::Error);
        assert!(parsed.error.is_some());
        assert!(parsed.payload.is_none());
    }

    #[test]
    fn frame_omits_null_fields() {
        let frame = Frame::new::<()>("f-5", FrameType::Stop, None).unwrap();
        let json = serde_json::to_string(&frame).unwrap();
        assert!(!json.contains("payload"));
        assert!(!json.contains("error"));
    }

    #[test]
    fn reply_preserves_id() {
        let query = Frame::new::<()>("q-42", FrameType::Query, None).unwrap();
        let reply = query
            .reply(FrameType::Done, Some(&serde_json::json!({})))
            .unwrap();
        assert_eq!(reply.id, "q-42");
        assert_eq!(reply.frame_type, FrameType::Done);
    }
}
