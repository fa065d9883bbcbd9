use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Direction of a transfer task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TransferKind {
    Upload,
    Download,
}

/// Lifecycle state of a transfer task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TaskStatus {
    Queued,
    Active,
    Complete,
    Error,
}

/// Durable record of one transfer task, keyed by course id.
///
/// Mutated only by the orchestrator. Invariant:
/// `completed_items <= total_items`, and the task is `Complete` exactly
/// when every item completed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferTask {
    pub course_id: String,
    pub kind: TransferKind,
    pub status: TaskStatus,
    pub total_items: usize,
    pub completed_items: usize,
    #[serde(default)]
    pub failed_items: usize,
    pub current_batch_index: usize,
    pub total_batches: usize,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl TransferTask {
    /// Creates a queued task for `total_items` items split into batches
    /// of `batch_size`.
    pub fn new(
        course_id: impl Into<String>,
        kind: TransferKind,
        total_items: usize,
        batch_size: usize,
    ) -> Self {
        Self {
            course_id: course_id.into(),
            kind,
            status: TaskStatus::Queued,
            total_items,
            completed_items: 0,
            failed_items: 0,
            current_batch_index: 0,
            total_batches: total_items.div_ceil(batch_size.max(1)),
            started_at: Utc::now(),
            ended_at: None,
            last_error: None,
        }
    }

    /// Returns `true` while the task may still be driven forward.
    pub fn is_active(&self) -> bool {
        matches!(self.status, TaskStatus::Queued | TaskStatus::Active)
    }
}

/// One unit of content moved from source to destination.
///
/// Immutable except for the two optional fields filled in post-transfer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferItem {
    /// Stable identifier within the source provider.
    pub source_ref: String,
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub canonical_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_hint: Option<u64>,
}

impl TransferItem {
    pub fn new(source_ref: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            source_ref: source_ref.into(),
            display_name: display_name.into(),
            content_hash: None,
            canonical_id: None,
            size_hint: None,
        }
    }
}

/// Durable ordered item list for one task. One record per course id,
/// overwritten atomically on each persist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueRecord {
    pub course_id: String,
    pub items: Vec<TransferItem>,
    pub batch_size: usize,
    pub created_at: DateTime<Utc>,
}

impl QueueRecord {
    pub fn new(course_id: impl Into<String>, items: Vec<TransferItem>, batch_size: usize) -> Self {
        Self {
            course_id: course_id.into(),
            items,
            batch_size: batch_size.max(1),
            created_at: Utc::now(),
        }
    }

    /// Number of fixed-size batches the items partition into.
    pub fn total_batches(&self) -> usize {
        self.items.len().div_ceil(self.batch_size)
    }

    /// Returns the items of batch `index` (the last batch may be short).
    pub fn batch(&self, index: usize) -> &[TransferItem] {
        let start = index * self.batch_size;
        if start >= self.items.len() {
            return &[];
        }
        let end = (start + self.batch_size).min(self.items.len());
        &self.items[start..end]
    }
}

/// Per-item result reported by the ingestion service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemStatus {
    #[serde(rename = "processed")]
    Processed,
    #[serde(rename = "skipped")]
    Skipped,
    #[serde(rename = "failed")]
    Failed,
}

/// Result of ingesting one item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemOutcome {
    pub canonical_id: String,
    pub content_hash: String,
    pub storage_location: String,
    pub status: ItemStatus,
}

/// One entry of the backend's full catalog for a course.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEntry {
    pub canonical_id: String,
    pub content_hash: String,
    pub storage_location: String,
}

/// Progress snapshot broadcast to observers. Best-effort, unpersisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressUpdate {
    pub task_id: String,
    pub status: TaskStatus,
    pub completed: usize,
    pub total: usize,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
}

/// One prior exchange carried with a query for context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub role: String,
    pub content: String,
}

/// A streaming query submitted over the channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRequest {
    pub payload: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub history: Vec<HistoryEntry>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub selected_refs: Vec<String>,
    pub session_id: String,
}

/// Payload of a `chunk` frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkPayload {
    pub text: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_new_computes_batches() {
        let task = TransferTask::new("course-1", TransferKind::Upload, 25, 10);
        assert_eq!(task.total_batches, 3);
        assert_eq!(task.status, TaskStatus::Queued);
        assert!(task.is_active());
    }

    #[test]
    fn task_zero_items_zero_batches() {
        let task = TransferTask::new("course-1", TransferKind::Download, 0, 10);
        assert_eq!(task.total_batches, 0);
    }

    #[test]
    fn queue_record_batch_slicing() {
        let items: Vec<TransferItem> = (0..25)
            .map(|i| TransferItem::new(format!("ref-{i}"), format!("Item {i}")))
            .collect();
        let record = QueueRecord::new("course-1", items, 10);
        assert_eq!(record.total_batches(), 3);
        assert_eq!(record.batch(0).len(), 10);
        assert_eq!(record.batch(1).len(), 10);
        assert_eq!(record.batch(2).len(), 5);
        assert!(record.batch(3).is_empty());
        assert_eq!(record.batch(1)[0].source_ref, "ref-10");
    }

    #[test]
    fn queue_record_clamps_batch_size() {
        let record = QueueRecord::new("c", vec![TransferItem::new("r", "n")], 0);
        assert_eq!(record.batch_size, 1);
        assert_eq!(record.total_batches(), 1);
    }

    #[test]
    fn item_status_serde_names() {
        assert_eq!(
            serde_json::to_string(&ItemStatus::Processed).unwrap(),
            "\"processed\""
        );
        assert_eq!(
            serde_json::to_string(&ItemStatus::Skipped).unwrap(),
            "\"skipped\""
        );
    }

    #[test]
    fn task_json_roundtrip() {
        let mut task = TransferTask::new("course-1", TransferKind::Upload, 5, 2);
        task.status = TaskStatus::Active;
        task.completed_items = 2;
        task.current_batch_index = 1;
        let json = serde_json::to_string(&task).unwrap();
        assert!(json.contains("courseId"));
        assert!(!json.contains("lastError"));
        let back: TransferTask = serde_json::from_str(&json).unwrap();
        assert_eq!(back, task);
    }

    #[test]
    fn query_request_omits_empty_collections() {
        let q = QueryRequest {
            payload: "what is chapter 3 about?".into(),
            history: vec![],
            selected_refs: vec![],
            session_id: "s-1".into(),
        };
        let json = serde_json::to_string(&q).unwrap();
        assert!(!json.contains("history"));
        assert!(!json.contains("selectedRefs"));
        let back: QueryRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(back, q);
    }
}
