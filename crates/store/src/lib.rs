//! Durable persistence for transfer tasks.
//!
//! Two stores with deliberately separate footprints: [`TaskStore`] holds the
//! small, frequently rewritten task records, while [`ItemQueue`] holds the
//! larger ordered item lists, one file per course, so metadata writes never
//! rewrite item payloads.

mod item_queue;
mod task_store;

pub use item_queue::ItemQueue;
pub use task_store::TaskStore;

/// Errors from the durable stores.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("corrupt queue record for {course_id}: {reason}")]
    Corrupt { course_id: String, reason: String },
}

/// Writes `json` to `path` atomically via a sibling temp file and rename,
/// so a crash mid-write never leaves a half-written record behind.
pub(crate) fn write_atomic(path: &std::path::Path, json: &str) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, json)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}
