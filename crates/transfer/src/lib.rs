//! Durable transfer orchestration for course materials.
//!
//! Drives batch-by-batch upload/download against the ingestion backend,
//! persists resumption checkpoints after every batch, and resumes
//! interrupted tasks on startup.

pub mod boundary;
mod orchestrator;
mod progress;

pub use boundary::{BoundaryError, IngestionService, SourceProvider};
pub use orchestrator::{OrchestratorConfig, TransferOrchestrator};
pub use progress::ProgressBus;

use lectern_store::StoreError;

/// Task-level errors. Per-item failures never surface here; they are
/// counted inside the batch loop.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("a transfer is already active for course {0}")]
    TaskAlreadyActive(String),

    #[error("ingestion backend unreachable: {0}")]
    Ingestion(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}
