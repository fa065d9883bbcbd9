//! Public handle over the driver task.

use std::sync::Mutex;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use uuid::Uuid;

use lectern_protocol::types::QueryRequest;

use crate::driver::{Command, Driver};
use crate::query::{PendingQuery, QueryTicket};
use crate::types::{ChannelConfig, ChannelEvent, ConnectionState};
use crate::ChannelError;

/// Streaming query channel to the ingestion backend.
///
/// Cheap to share behind an `Arc`; all mutation happens in the driver
/// task. Dropping the channel aborts the driver and any connection.
pub struct StreamChannel {
    cmd_tx: mpsc::Sender<Command>,
    events_rx: Mutex<Option<mpsc::Receiver<ChannelEvent>>>,
    state_rx: watch::Receiver<ConnectionState>,
    driver: JoinHandle<()>,
}

impl StreamChannel {
    /// Starts the driver task and begins connecting in the background.
    pub fn connect(config: ChannelConfig) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel(32);
        let (event_tx, events_rx) = mpsc::channel(64);
        let (state_tx, state_rx) = watch::channel(ConnectionState::Connecting);
        let driver = tokio::spawn(Driver::new(config, cmd_rx, event_tx, state_tx).run());
        Self {
            cmd_tx,
            events_rx: Mutex::new(Some(events_rx)),
            state_rx,
            driver,
        }
    }

    /// Queues a query. Chunks are delivered to `on_chunk` as they
    /// stream in; the returned ticket resolves when the query ends.
    ///
    /// Queries run one at a time in submission order. A query
    /// interrupted by connection loss is replayed after reconnecting.
    pub async fn submit(
        &self,
        request: QueryRequest,
        on_chunk: impl FnMut(String) + Send + 'static,
    ) -> Result<QueryTicket, ChannelError> {
        let id = Uuid::new_v4().to_string();
        let (done_tx, done_rx) = oneshot::channel();
        let query = PendingQuery {
            id: id.clone(),
            request,
            on_chunk: Box::new(on_chunk),
            done_tx,
        };
        self.send(Command::Submit(query)).await?;
        Ok(QueryTicket { id, done_rx })
    }

    /// Asks the backend to cancel the in-flight query. The query's
    /// ticket resolves with `Stopped` once the backend acknowledges.
    pub async fn stop(&self) -> Result<(), ChannelError> {
        self.send(Command::Stop).await
    }

    /// Drops the current connection (if any) and dials again with a
    /// fresh retry budget.
    pub async fn reconnect(&self) -> Result<(), ChannelError> {
        self.send(Command::Reconnect).await
    }

    /// Shuts the channel down. Queued and in-flight queries fail with
    /// [`ChannelError::Closed`].
    pub async fn disconnect(&self) -> Result<(), ChannelError> {
        self.send(Command::Disconnect).await
    }

    async fn send(&self, cmd: Command) -> Result<(), ChannelError> {
        self.cmd_tx.send(cmd).await.map_err(|_| ChannelError::Closed)
    }

    /// Takes the connection event receiver. Can only be called once.
    pub fn take_events(&self) -> Option<mpsc::Receiver<ChannelEvent>> {
        self.events_rx.lock().ok()?.take()
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        self.state_rx.borrow().clone()
    }
}

impl Drop for StreamChannel {
    fn drop(&mut self) {
        self.driver.abort();
    }
}
