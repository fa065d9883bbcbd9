//! Connection driver: owns the websocket lifecycle and the query queue.
//!
//! A single task runs the driver, so the pending queue and the in-flight
//! slot are never touched concurrently. Callers talk to it through the
//! command channel.

use std::collections::VecDeque;

use futures_util::StreamExt;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::{connect_async, tungstenite};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use lectern_protocol::constants::FrameType;
use lectern_protocol::envelope::Frame;
use lectern_protocol::types::ChunkPayload;

use crate::pumps::heartbeat::heartbeat_pump;
use crate::pumps::write::write_pump;
use crate::query::{PendingQuery, QueryOutcome};
use crate::types::{ChannelConfig, ChannelEvent, ConnectionState};
use crate::{ChannelError, wire};

/// Requests from the public handle to the driver task.
pub(crate) enum Command {
    Submit(PendingQuery),
    Stop,
    Reconnect,
    Disconnect,
}

/// Why an open connection stopped being used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Exit {
    /// The connection dropped; reconnect with backoff.
    Lost,
    /// The caller asked for an immediate reconnect.
    Forced,
    /// The caller asked to shut down.
    Disconnect,
}

/// How a backoff wait ended.
enum Backoff {
    /// The delay elapsed; dial with the next attempt number.
    Elapsed,
    /// The caller forced an immediate dial; the attempt budget resets.
    Forced,
    /// The caller asked to shut down.
    Disconnect,
}

pub(crate) struct Driver {
    config: ChannelConfig,
    commands: mpsc::Receiver<Command>,
    events: mpsc::Sender<ChannelEvent>,
    state: watch::Sender<ConnectionState>,
    pending: VecDeque<PendingQuery>,
    inflight: Option<PendingQuery>,
}

impl Driver {
    pub(crate) fn new(
        config: ChannelConfig,
        commands: mpsc::Receiver<Command>,
        events: mpsc::Sender<ChannelEvent>,
        state: watch::Sender<ConnectionState>,
    ) -> Self {
        Self {
            config,
            commands,
            events,
            state,
            pending: VecDeque::new(),
            inflight: None,
        }
    }

    /// Connection loop: dial, serve, and on loss retry with backoff
    /// until the budget runs out or the caller disconnects.
    pub(crate) async fn run(mut self) {
        let mut attempt: u32 = 0;
        loop {
            if attempt == 0 {
                self.set_state(ConnectionState::Connecting);
            } else {
                self.set_state(ConnectionState::Reconnecting { attempt });
            }

            match connect_async(self.config.url.as_str()).await {
                Ok((ws, _)) => {
                    attempt = 0;
                    self.set_state(ConnectionState::Open);

                    let (write, read) = ws.split();
                    let (write_tx, write_rx) = mpsc::channel(32);
                    let cancel = CancellationToken::new();
                    let writer = tokio::spawn(write_pump(write, write_rx, cancel.clone()));
                    let heartbeat = tokio::spawn(heartbeat_pump(
                        self.config.heartbeat_period,
                        write_tx.clone(),
                        cancel.clone(),
                    ));

                    let exit = self.run_open(read, write_tx).await;

                    cancel.cancel();
                    let _ = writer.await;
                    let _ = heartbeat.await;

                    self.reclaim_inflight();
                    match exit {
                        Exit::Disconnect => {
                            self.shutdown();
                            return;
                        }
                        Exit::Forced => continue,
                        Exit::Lost => {}
                    }
                }
                Err(e) => {
                    warn!(url = %self.config.url, "connection failed: {e}");
                }
            }

            attempt += 1;
            if attempt > self.config.reconnect.max_attempts {
                self.set_state(ConnectionState::Closed);
                self.emit(ChannelEvent::Offline);
                if self.wait_for_restart().await {
                    attempt = 0;
                    continue;
                }
                self.shutdown();
                return;
            }

            let delay = self.config.reconnect.delay_for_attempt(attempt);
            self.emit(ChannelEvent::Reconnecting {
                attempt,
                next_retry_secs: delay.as_secs_f64(),
            });
            match self.backoff_wait(delay).await {
                Backoff::Elapsed => {}
                Backoff::Forced => attempt = 0,
                Backoff::Disconnect => {
                    self.shutdown();
                    return;
                }
            }
        }
    }

    /// Serves an established connection until it is lost or the caller
    /// intervenes. Generic over the read half so tests can feed frames
    /// from a mock stream.
    pub(crate) async fn run_open<S>(
        &mut self,
        mut read: S,
        write_tx: mpsc::Sender<tungstenite::Message>,
    ) -> Exit
    where
        S: StreamExt<Item = Result<tungstenite::Message, tungstenite::Error>> + Unpin,
    {
        self.dispatch_next(&write_tx).await;

        // Liveness is judged from the time since ANY inbound traffic,
        // because intermediaries may eat pong replies. A stale period
        // raises an event but never tears the connection down.
        let stale_timer = tokio::time::sleep(self.config.stale_after);
        tokio::pin!(stale_timer);
        let mut stale_periods: u32 = 0;

        loop {
            tokio::select! {
                () = &mut stale_timer => {
                    stale_periods += 1;
                    let silent_for = self.config.stale_after * stale_periods;
                    warn!(?silent_for, "no traffic from backend");
                    self.emit(ChannelEvent::Stale { silent_for });
                    stale_timer.as_mut().reset(
                        tokio::time::Instant::now() + self.config.stale_after,
                    );
                }

                cmd = self.commands.recv() => {
                    match cmd {
                        Some(Command::Submit(query)) => {
                            self.pending.push_back(query);
                            self.dispatch_next(&write_tx).await;
                        }
                        Some(Command::Stop) => {
                            if let Some(query) = &self.inflight {
                                match wire::stop_message(&query.id) {
                                    Ok(msg) => {
                                        let _ = write_tx.send(msg).await;
                                    }
                                    Err(err) => {
                                        warn!(error = %err, "failed to encode stop frame");
                                    }
                                }
                            }
                        }
                        Some(Command::Reconnect) => return Exit::Forced,
                        Some(Command::Disconnect) | None => return Exit::Disconnect,
                    }
                }

                msg = read.next() => {
                    match msg {
                        Some(Ok(msg)) => {
                            stale_periods = 0;
                            stale_timer.as_mut().reset(
                                tokio::time::Instant::now() + self.config.stale_after,
                            );
                            match msg {
                                tungstenite::Message::Ping(data) => {
                                    let _ = write_tx
                                        .send(tungstenite::Message::Pong(data))
                                        .await;
                                }
                                tungstenite::Message::Pong(_) => {}
                                tungstenite::Message::Close(_) => {
                                    debug!("received close frame");
                                    return Exit::Lost;
                                }
                                other => {
                                    if let Some(frame) = wire::decode(&other) {
                                        self.handle_frame(frame, &write_tx).await;
                                    }
                                }
                            }
                        }
                        Some(Err(e)) => {
                            warn!("websocket read error: {e}");
                            return Exit::Lost;
                        }
                        None => {
                            debug!("websocket stream ended");
                            return Exit::Lost;
                        }
                    }
                }
            }
        }
    }

    /// Sends the next pending query if nothing is in flight.
    async fn dispatch_next(&mut self, write_tx: &mpsc::Sender<tungstenite::Message>) {
        while self.inflight.is_none() {
            let Some(query) = self.pending.pop_front() else {
                return;
            };
            match wire::query_message(&query.id, &query.request) {
                Ok(msg) => {
                    if write_tx.send(msg).await.is_err() {
                        // Write pump is gone; the read side will
                        // notice shortly and trigger a reconnect.
                        self.pending.push_front(query);
                        return;
                    }
                    self.inflight = Some(query);
                }
                Err(err) => query.fail(ChannelError::Json(err)),
            }
        }
    }

    async fn handle_frame(
        &mut self,
        frame: Frame,
        write_tx: &mpsc::Sender<tungstenite::Message>,
    ) {
        match frame.frame_type {
            FrameType::Chunk => match &mut self.inflight {
                Some(query) if query.id == frame.id => {
                    match frame.parse_payload::<ChunkPayload>() {
                        Ok(Some(chunk)) => (query.on_chunk)(chunk.text),
                        Ok(None) => warn!(id = %frame.id, "chunk frame without payload"),
                        Err(err) => warn!(error = %err, "malformed chunk payload"),
                    }
                }
                // Leftover frames from a superseded query must not be
                // delivered twice.
                _ => debug!(id = %frame.id, "dropping chunk for unknown query"),
            },
            FrameType::Done => {
                self.finish(&frame.id, Ok(QueryOutcome::Done), write_tx).await;
            }
            FrameType::Stopped => {
                self.finish(&frame.id, Ok(QueryOutcome::Stopped), write_tx)
                    .await;
            }
            FrameType::Error => {
                let err = match frame.error {
                    Some(e) => ChannelError::Backend {
                        code: e.code,
                        message: e.message,
                    },
                    None => ChannelError::Backend {
                        code: 0,
                        message: "unspecified error".into(),
                    },
                };
                self.finish(&frame.id, Err(err), write_tx).await;
            }
            FrameType::Query | FrameType::Stop => {
                warn!(frame_type = ?frame.frame_type, "unexpected client frame from backend");
            }
        }
    }

    /// Resolves the in-flight query and dispatches the next one.
    async fn finish(
        &mut self,
        id: &str,
        result: Result<QueryOutcome, ChannelError>,
        write_tx: &mpsc::Sender<tungstenite::Message>,
    ) {
        match self.inflight.take() {
            Some(query) if query.id == id => {
                let _ = query.done_tx.send(result);
            }
            Some(other) => {
                warn!(id, inflight = %other.id, "terminal frame for unknown query");
                self.inflight = Some(other);
            }
            None => warn!(id, "terminal frame with nothing in flight"),
        }
        self.dispatch_next(write_tx).await;
    }

    /// Puts an interrupted query back at the head of the queue so it is
    /// replayed, with the same id, once the connection is reestablished.
    fn reclaim_inflight(&mut self) {
        if let Some(query) = self.inflight.take() {
            debug!(id = %query.id, "queueing interrupted query for replay");
            self.pending.push_front(query);
        }
    }

    /// Waits out the backoff delay while staying responsive to commands.
    /// Submitted queries queue up for the next connection.
    async fn backoff_wait(&mut self, delay: std::time::Duration) -> Backoff {
        let sleep = tokio::time::sleep(delay);
        tokio::pin!(sleep);
        loop {
            tokio::select! {
                () = &mut sleep => return Backoff::Elapsed,
                cmd = self.commands.recv() => {
                    match cmd {
                        Some(Command::Submit(query)) => self.pending.push_back(query),
                        Some(Command::Stop) => {}
                        Some(Command::Reconnect) => return Backoff::Forced,
                        Some(Command::Disconnect) | None => return Backoff::Disconnect,
                    }
                }
            }
        }
    }

    /// Offline: the retry budget is spent. Queries keep queueing; only
    /// an explicit reconnect (true) or disconnect (false) moves on.
    async fn wait_for_restart(&mut self) -> bool {
        loop {
            match self.commands.recv().await {
                Some(Command::Submit(query)) => self.pending.push_back(query),
                Some(Command::Stop) => {}
                Some(Command::Reconnect) => return true,
                Some(Command::Disconnect) | None => return false,
            }
        }
    }

    /// Fails everything still queued and settles into `Closed`.
    fn shutdown(&mut self) {
        if let Some(query) = self.inflight.take() {
            query.fail(ChannelError::Closed);
        }
        while let Some(query) = self.pending.pop_front() {
            query.fail(ChannelError::Closed);
        }
        self.set_state(ConnectionState::Closed);
    }

    /// Publishes a state transition. The watch already starts at
    /// `Connecting`, so re-entering the current state emits nothing.
    fn set_state(&self, state: ConnectionState) {
        if *self.state.borrow() == state {
            return;
        }
        self.state.send_replace(state.clone());
        self.emit(ChannelEvent::StateChanged(state));
    }

    fn emit(&self, event: ChannelEvent) {
        let _ = self.events.try_send(event);
    }
}
