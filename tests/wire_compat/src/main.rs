fn main() {
    println!("Run `cargo test -p wire-compat` to execute wire compatibility tests.");
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use lectern_protocol::constants::FrameType;
    use lectern_protocol::envelope::Frame;
    use lectern_protocol::types::{ProgressUpdate, QueryRequest, QueueRecord, TransferTask};

    fn fixture(name: &str) -> String {
        let path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("fixtures")
            .join(name);
        fs::read_to_string(&path)
            .unwrap_or_else(|e| panic!("failed to read fixture {}: {e}", path.display()))
    }

    /// Deserializes a fixture, re-serializes it, and compares the JSON
    /// values. A mismatch means the wire format drifted: on-disk task
    /// records and frames exchanged with the backend would break.
    fn roundtrip<T>(name: &str)
    where
        T: serde::de::DeserializeOwned + serde::Serialize,
    {
        let data = fixture(name);
        let parsed: T = serde_json::from_str(&data)
            .unwrap_or_else(|e| panic!("failed to deserialize {name}: {e}"));
        let reserialized = serde_json::to_string(&parsed)
            .unwrap_or_else(|e| panic!("failed to re-serialize {name}: {e}"));

        let expected: serde_json::Value = serde_json::from_str(&data).unwrap();
        let actual: serde_json::Value = serde_json::from_str(&reserialized).unwrap();
        assert_eq!(expected, actual, "wire drift in {name}");
    }

    #[test]
    fn fixture_frame_chunk() {
        roundtrip::<Frame>("frame_chunk.json");
    }

    #[test]
    fn fixture_frame_error() {
        roundtrip::<Frame>("frame_error.json");
    }

    #[test]
    fn fixture_transfer_task() {
        roundtrip::<TransferTask>("transfer_task.json");
    }

    #[test]
    fn fixture_queue_record() {
        roundtrip::<QueueRecord>("queue_record.json");
    }

    #[test]
    fn fixture_query_request() {
        roundtrip::<QueryRequest>("query_request.json");
    }

    #[test]
    fn fixture_progress_update() {
        roundtrip::<ProgressUpdate>("progress_update.json");
    }

    #[test]
    fn frame_type_tags_are_stable() {
        for (ft, tag) in [
            (FrameType::Query, "query"),
            (FrameType::Stop, "stop"),
            (FrameType::Chunk, "chunk"),
            (FrameType::Done, "done"),
            (FrameType::Stopped, "stopped"),
            (FrameType::Error, "error"),
        ] {
            assert_eq!(serde_json::to_value(ft).unwrap(), serde_json::json!(tag));
        }
    }
}
