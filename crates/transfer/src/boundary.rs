//! External collaborator boundaries, excluded from the core.
//!
//! Implementations are provided by the embedding application; tests use
//! in-memory mocks.

use std::future::Future;
use std::pin::Pin;

use lectern_protocol::types::{CatalogEntry, ItemOutcome, TransferItem};

/// Errors crossing a boundary, split by blast radius.
#[derive(Debug, thiserror::Error)]
pub enum BoundaryError {
    /// Single-item failure. Counted and surfaced, never fatal to the batch.
    #[error("item failed: {0}")]
    Item(String),

    /// The backend is unreachable. Halts the task at batch granularity.
    #[error("backend unreachable: {0}")]
    Unreachable(String),
}

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Source-content provider: listings and per-item byte fetch.
pub trait SourceProvider: Send + Sync {
    /// Lists the transferable items of a course.
    fn list(&self, course_id: &str) -> BoxFuture<'_, Result<Vec<TransferItem>, BoundaryError>>;

    /// Fetches the raw bytes of one item.
    fn fetch(&self, source_ref: &str) -> BoxFuture<'_, Result<Vec<u8>, BoundaryError>>;
}

/// Remote ingestion backend.
pub trait IngestionService: Send + Sync {
    /// Ingests one item's bytes, returning the canonical assignment.
    fn ingest<'a>(
        &'a self,
        course_id: &'a str,
        item: &'a TransferItem,
        bytes: Vec<u8>,
    ) -> BoxFuture<'a, Result<ItemOutcome, BoundaryError>>;

    /// Returns everything the backend knows for a course, for
    /// reconciliation after a completed transfer.
    fn pull_catalog(&self, course_id: &str)
    -> BoxFuture<'_, Result<Vec<CatalogEntry>, BoundaryError>>;
}
