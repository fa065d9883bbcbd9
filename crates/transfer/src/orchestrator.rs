//! Batch-by-batch transfer engine with durable checkpoints.

use std::sync::Arc;

use futures_util::{StreamExt, stream};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use lectern_dedup::{DedupResolver, MaterialsUpdate};
use lectern_protocol::types::{
    ItemStatus, ProgressUpdate, QueueRecord, TaskStatus, TransferItem, TransferKind, TransferTask,
};
use lectern_store::{ItemQueue, StoreError, TaskStore};

use crate::TransferError;
use crate::boundary::{BoundaryError, IngestionService, SourceProvider};
use crate::progress::ProgressBus;

/// Tuning for the orchestrator.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Bounded fan-out within one batch. The batch boundary is always a
    /// join point regardless of this value.
    pub concurrency: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self { concurrency: 4 }
    }
}

/// How one item ended up after a batch pass.
enum ItemDisposition {
    Processed,
    Skipped,
}

/// Item-level vs task-level failure, decided inside the batch loop.
enum ItemFailure {
    Transient(String),
    Fatal(String),
}

/// Drives transfer tasks for courses: persists the task record and item
/// queue, processes fixed-size batches with bounded parallelism, and
/// checkpoints counters after every batch so a crash costs at most one
/// batch of (dedup-safe) rework.
///
/// One instance owns its state; at most one task is active per course id.
pub struct TransferOrchestrator {
    tasks: Arc<TaskStore>,
    queues: Arc<ItemQueue>,
    source: Arc<dyn SourceProvider>,
    ingestion: Arc<dyn IngestionService>,
    materials: Arc<dyn MaterialsUpdate>,
    resolver: Mutex<DedupResolver>,
    progress: ProgressBus,
    concurrency: usize,
    cancel: CancellationToken,
}

impl TransferOrchestrator {
    pub fn new(
        tasks: Arc<TaskStore>,
        queues: Arc<ItemQueue>,
        source: Arc<dyn SourceProvider>,
        ingestion: Arc<dyn IngestionService>,
        materials: Arc<dyn MaterialsUpdate>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            tasks,
            queues,
            source,
            ingestion,
            materials,
            resolver: Mutex::new(DedupResolver::new()),
            progress: ProgressBus::default(),
            concurrency: config.concurrency.max(1),
            cancel: CancellationToken::new(),
        }
    }

    /// Progress observers subscribe here.
    pub fn progress(&self) -> &ProgressBus {
        &self.progress
    }

    /// Token for cooperative cancellation. A cancelled task stays in its
    /// last persisted state until resumed or discarded.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Starts a transfer for a course and drives it to a terminal state.
    ///
    /// Rejects when a task for the same course is still active. A
    /// previous complete/errored record is superseded.
    pub async fn start(
        &self,
        course_id: &str,
        kind: TransferKind,
        items: Vec<TransferItem>,
        batch_size: usize,
    ) -> Result<TransferTask, TransferError> {
        if let Some(existing) = self.tasks.get(course_id)
            && existing.is_active()
        {
            warn!(course = %course_id, "transfer already active, rejecting");
            return Err(TransferError::TaskAlreadyActive(course_id.to_string()));
        }

        let record = QueueRecord::new(course_id, items, batch_size);
        let mut task = TransferTask::new(course_id, kind, record.items.len(), record.batch_size);

        self.queues.save(&record)?;
        task.status = TaskStatus::Active;
        self.tasks.put(task.clone())?;

        info!(
            course = %course_id,
            items = task.total_items,
            batches = task.total_batches,
            "transfer started"
        );
        self.publish(&task, String::new());

        self.run_task(task, record).await
    }

    /// Resumes interrupted tasks. Invoked once at process start.
    ///
    /// Scans the task store for active tasks, rehydrates each item
    /// queue, and continues from the persisted batch checkpoint.
    pub async fn resume(&self) -> Result<Vec<TransferTask>, TransferError> {
        let mut finished = Vec::new();
        for task in self.tasks.active_tasks() {
            let course_id = task.course_id.clone();
            let record = match self.queues.load(&course_id) {
                Ok(Some(record)) => record,
                Ok(None) => {
                    self.halt_task(task, "item queue missing on resume".into())?;
                    continue;
                }
                Err(StoreError::Corrupt { reason, .. }) => {
                    self.halt_task(task, format!("item queue unreadable: {reason}"))?;
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            info!(
                course = %course_id,
                batch = task.current_batch_index,
                of = task.total_batches,
                "resuming interrupted transfer"
            );
            match self.run_task(task, record).await {
                Ok(task) => finished.push(task),
                // run_task already marked the task errored and persisted
                // it; the remaining active tasks still get their turn.
                Err(TransferError::Ingestion(msg)) => {
                    warn!(course = %course_id, error = %msg, "task halted during resume");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(finished)
    }

    /// Processes batches from the task's checkpoint to the end.
    async fn run_task(
        &self,
        mut task: TransferTask,
        record: QueueRecord,
    ) -> Result<TransferTask, TransferError> {
        let total_batches = record.total_batches();
        let course_id = task.course_id.clone();

        while task.current_batch_index < total_batches {
            if self.cancel.is_cancelled() {
                info!(course = %task.course_id, "transfer cancelled, leaving last checkpoint");
                return Ok(task);
            }

            let index = task.current_batch_index;
            let batch = record.batch(index);
            debug!(course = %task.course_id, batch = index, items = batch.len(), "processing batch");

            // Bounded fan-out; the collect is the batch join point.
            let results: Vec<_> = stream::iter(batch)
                .map(|item| {
                    let course_id = course_id.as_str();
                    async move { (item, self.process_item(course_id, item).await) }
                })
                .buffer_unordered(self.concurrency)
                .collect()
                .await;

            for (item, result) in results {
                match result {
                    Ok(ItemDisposition::Processed) => task.completed_items += 1,
                    Ok(ItemDisposition::Skipped) => {
                        debug!(item = %item.display_name, "skipped (already ingested)");
                        task.completed_items += 1;
                    }
                    Err(ItemFailure::Transient(msg)) => {
                        warn!(item = %item.display_name, error = %msg, "item failed");
                        task.failed_items += 1;
                    }
                    Err(ItemFailure::Fatal(msg)) => {
                        // Batch not checkpointed — it reruns on restart,
                        // made safe by dedup idempotence.
                        error!(course = %task.course_id, error = %msg, "transfer halted");
                        self.halt_task(task, msg.clone())?;
                        return Err(TransferError::Ingestion(msg));
                    }
                }
            }

            // Checkpoint once per batch, not per item.
            task.current_batch_index = index + 1;
            self.tasks.put(task.clone())?;
            self.publish(
                &task,
                format!("batch {}/{}", task.current_batch_index, total_batches),
            );
        }

        self.finish_task(task).await
    }

    /// Terminal bookkeeping once every batch has run.
    async fn finish_task(&self, mut task: TransferTask) -> Result<TransferTask, TransferError> {
        task.ended_at = Some(chrono::Utc::now());
        if task.failed_items > 0 {
            task.status = TaskStatus::Error;
            task.last_error = Some(format!("{} item(s) failed", task.failed_items));
        } else {
            task.status = TaskStatus::Complete;
        }
        self.tasks.put(task.clone())?;
        self.queues.delete(&task.course_id)?;

        if task.status == TaskStatus::Complete {
            self.reconcile(&task.course_id).await;
            info!(course = %task.course_id, items = task.completed_items, "transfer complete");
        }

        let message = task.last_error.clone().unwrap_or_default();
        self.publish(&task, message);
        Ok(task)
    }

    /// Full-catalog pull patching records whose canonical id was not yet
    /// known locally (items transferred in earlier sessions).
    async fn reconcile(&self, course_id: &str) {
        match self.ingestion.pull_catalog(course_id).await {
            Ok(entries) => {
                let patched = self
                    .resolver
                    .lock()
                    .await
                    .reconcile(&entries, &*self.materials);
                debug!(course = %course_id, patched, "reconciliation pass done");
            }
            // The transfer itself already completed; reconciliation can
            // run again after the next task.
            Err(e) => warn!(course = %course_id, error = %e, "catalog pull failed"),
        }
    }

    /// Fetch → dedup consult → ingest → patch, for one item.
    async fn process_item(
        &self,
        course_id: &str,
        item: &TransferItem,
    ) -> Result<ItemDisposition, ItemFailure> {
        {
            let resolver = self.resolver.lock().await;
            if let Some(resolved) = resolver.resolve(item, &*self.materials) {
                debug!(
                    item = %item.display_name,
                    canonical = %resolved.canonical_id,
                    "dedup hit"
                );
                return Ok(ItemDisposition::Skipped);
            }
        }

        let bytes = self
            .source
            .fetch(&item.source_ref)
            .await
            .map_err(|e| ItemFailure::Transient(e.to_string()))?;

        let outcome = self
            .ingestion
            .ingest(course_id, item, bytes)
            .await
            .map_err(|e| match e {
                BoundaryError::Item(msg) => ItemFailure::Transient(msg),
                BoundaryError::Unreachable(msg) => ItemFailure::Fatal(msg),
            })?;

        if outcome.status == ItemStatus::Failed {
            return Err(ItemFailure::Transient(format!(
                "backend rejected {}",
                item.display_name
            )));
        }

        self.resolver
            .lock()
            .await
            .record(item, &outcome, &*self.materials);

        match outcome.status {
            ItemStatus::Skipped => Ok(ItemDisposition::Skipped),
            _ => Ok(ItemDisposition::Processed),
        }
    }

    /// Marks a task errored and persists it for manual restart. Queue
    /// records only exist for live tasks, so the file is dropped here.
    fn halt_task(&self, mut task: TransferTask, message: String) -> Result<(), TransferError> {
        task.status = TaskStatus::Error;
        task.last_error = Some(message.clone());
        task.ended_at = Some(chrono::Utc::now());
        self.tasks.put(task.clone())?;
        self.queues.delete(&task.course_id)?;
        self.publish(&task, message);
        Ok(())
    }

    fn publish(&self, task: &TransferTask, message: String) {
        self.progress.publish(ProgressUpdate {
            task_id: task.course_id.clone(),
            status: task.status,
            completed: task.completed_items,
            total: task.total_items,
            message,
        });
    }
}
