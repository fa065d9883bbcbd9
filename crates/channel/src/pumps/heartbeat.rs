//! Keepalive heartbeat pump.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite;
use tokio_util::sync::CancellationToken;

/// Sends a ping every `period` to keep intermediaries from dropping an
/// idle connection. Liveness itself is judged by the driver from the
/// time since any inbound frame, not from pong replies.
pub(crate) async fn heartbeat_pump(
    period: Duration,
    write_tx: mpsc::Sender<tungstenite::Message>,
    cancel: CancellationToken,
) {
    let mut interval = tokio::time::interval(period);
    interval.tick().await; // Skip immediate first tick.

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = interval.tick() => {
                let ping = tungstenite::Message::Ping(vec![].into());
                if write_tx.send(ping).await.is_err() {
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn heartbeat_pump_stops_on_cancel() {
        let (tx, _rx) = mpsc::channel(16);
        let cancel = CancellationToken::new();

        let c = cancel.clone();
        let handle = tokio::spawn(async move {
            heartbeat_pump(Duration::from_secs(25), tx, c).await;
        });

        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("should stop")
            .expect("no panic");
    }

    #[tokio::test(start_paused = true)]
    async fn heartbeat_pump_pings_every_period() {
        let (tx, mut rx) = mpsc::channel(16);
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(heartbeat_pump(
            Duration::from_secs(10),
            tx,
            cancel.clone(),
        ));

        tokio::time::sleep(Duration::from_secs(25)).await;
        cancel.cancel();
        handle.await.unwrap();

        let mut pings = 0;
        while let Ok(msg) = rx.try_recv() {
            assert!(matches!(msg, tungstenite::Message::Ping(_)));
            pings += 1;
        }
        assert_eq!(pings, 2);
    }
}
