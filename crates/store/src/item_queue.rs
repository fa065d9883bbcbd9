//! Durable ordered item lists, one file per course.

use std::path::PathBuf;

use tracing::debug;

use lectern_protocol::types::QueueRecord;

use crate::{StoreError, write_atomic};

/// Persistent store of [`QueueRecord`]s under a `queues/` directory.
///
/// Kept separate from [`crate::TaskStore`] so that per-batch counter
/// writes never rewrite the (potentially large) item lists.
pub struct ItemQueue {
    dir: PathBuf,
}

impl ItemQueue {
    /// Creates a queue store rooted at `dir`.
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    /// Persists the record for its course, overwriting any previous one.
    pub fn save(&self, record: &QueueRecord) -> Result<(), StoreError> {
        let json = serde_json::to_string(record)?;
        let path = self.record_path(&record.course_id);
        write_atomic(&path, &json)?;
        debug!(
            course = %record.course_id,
            items = record.items.len(),
            "persisted queue record"
        );
        Ok(())
    }

    /// Loads the record for a course.
    ///
    /// Returns `Ok(None)` when no record exists. An unreadable record
    /// surfaces as [`StoreError::Corrupt`] — the caller marks the task
    /// as errored rather than silently losing items.
    pub fn load(&self, course_id: &str) -> Result<Option<QueueRecord>, StoreError> {
        let path = self.record_path(course_id);
        if !path.exists() {
            return Ok(None);
        }
        let data = std::fs::read_to_string(&path)?;
        match serde_json::from_str::<QueueRecord>(&data) {
            Ok(record) => Ok(Some(record)),
            Err(e) => Err(StoreError::Corrupt {
                course_id: course_id.to_string(),
                reason: e.to_string(),
            }),
        }
    }

    /// Deletes the record for a course. Missing records are fine.
    pub fn delete(&self, course_id: &str) -> Result<(), StoreError> {
        let path = self.record_path(course_id);
        match std::fs::remove_file(&path) {
            Ok(()) => {
                debug!(course = %course_id, "deleted queue record");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn record_path(&self, course_id: &str) -> PathBuf {
        self.dir.join(sanitize(course_id)).with_extension("json")
    }
}

/// Keeps course ids usable as file names.
fn sanitize(course_id: &str) -> String {
    course_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use lectern_protocol::types::TransferItem;

    fn sample_record(course_id: &str, n: usize) -> QueueRecord {
        let items = (0..n)
            .map(|i| TransferItem::new(format!("ref-{i}"), format!("Item {i}")))
            .collect();
        QueueRecord::new(course_id, items, 10)
    }

    fn test_queue() -> (tempfile::TempDir, ItemQueue) {
        let tmp = tempfile::tempdir().unwrap();
        let queue = ItemQueue::new(tmp.path().join("queues"));
        (tmp, queue)
    }

    #[test]
    fn load_missing_returns_none() {
        let (_tmp, queue) = test_queue();
        assert!(queue.load("course-1").unwrap().is_none());
    }

    #[test]
    fn save_and_load_roundtrip() {
        let (_tmp, queue) = test_queue();
        let record = sample_record("course-1", 25);
        queue.save(&record).unwrap();

        let loaded = queue.load("course-1").unwrap().unwrap();
        assert_eq!(loaded, record);
        assert_eq!(loaded.items.len(), 25);
        assert_eq!(loaded.total_batches(), 3);
    }

    #[test]
    fn save_overwrites_previous_record() {
        let (_tmp, queue) = test_queue();
        queue.save(&sample_record("course-1", 25)).unwrap();
        queue.save(&sample_record("course-1", 5)).unwrap();

        let loaded = queue.load("course-1").unwrap().unwrap();
        assert_eq!(loaded.items.len(), 5);
    }

    #[test]
    fn delete_removes_record() {
        let (_tmp, queue) = test_queue();
        queue.save(&sample_record("course-1", 3)).unwrap();
        queue.delete("course-1").unwrap();
        assert!(queue.load("course-1").unwrap().is_none());
    }

    #[test]
    fn delete_missing_is_noop() {
        let (_tmp, queue) = test_queue();
        queue.delete("never-existed").unwrap();
    }

    #[test]
    fn corrupt_record_surfaces_error() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("queues");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("course-1.json"), "{ not valid json").unwrap();

        let queue = ItemQueue::new(dir);
        let err = queue.load("course-1").unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { .. }));
        assert!(err.to_string().contains("course-1"));
    }

    #[test]
    fn records_are_per_course() {
        let (_tmp, queue) = test_queue();
        queue.save(&sample_record("course-a", 2)).unwrap();
        queue.save(&sample_record("course-b", 7)).unwrap();

        assert_eq!(queue.load("course-a").unwrap().unwrap().items.len(), 2);
        assert_eq!(queue.load("course-b").unwrap().unwrap().items.len(), 7);
    }

    #[test]
    fn sanitize_keeps_ids_filesystem_safe() {
        let (_tmp, queue) = test_queue();
        queue.save(&sample_record("dept/101: intro", 1)).unwrap();
        assert!(queue.load("dept/101: intro").unwrap().is_some());
    }
}
