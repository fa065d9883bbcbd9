//! Per-query state: submission handles and completion plumbing.

use lectern_protocol::types::QueryRequest;
use tokio::sync::oneshot;

use crate::ChannelError;

/// How an in-flight query ended.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutcome {
    /// The backend finished streaming and sent a `done` frame.
    Done,
    /// The query was cancelled and the backend acknowledged it.
    Stopped,
}

/// Callback invoked for each streamed chunk of the in-flight query.
pub type ChunkCallback = Box<dyn FnMut(String) + Send>;

/// Handle for awaiting the completion of a submitted query.
///
/// Dropping the ticket does not cancel the query; use
/// [`StreamChannel::stop`](crate::StreamChannel::stop) for that.
pub struct QueryTicket {
    pub(crate) id: String,
    pub(crate) done_rx: oneshot::Receiver<Result<QueryOutcome, ChannelError>>,
}

impl QueryTicket {
    /// The frame id assigned to this query.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Waits until the query completes, is stopped, or fails.
    pub async fn wait(self) -> Result<QueryOutcome, ChannelError> {
        self.done_rx.await.unwrap_or(Err(ChannelError::Closed))
    }
}

/// A query queued inside the driver, carrying everything needed to send
/// it (possibly more than once, after a reconnect) and report back.
pub(crate) struct PendingQuery {
    pub id: String,
    pub request: QueryRequest,
    pub on_chunk: ChunkCallback,
    pub done_tx: oneshot::Sender<Result<QueryOutcome, ChannelError>>,
}

impl PendingQuery {
    pub fn fail(self, err: ChannelError) {
        let _ = self.done_tx.send(Err(err));
    }

    pub fn complete(self, outcome: QueryOutcome) {
        let _ = self.done_tx.send(Ok(outcome));
    }
}
