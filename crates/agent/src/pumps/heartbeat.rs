//! Heartbeat pump: periodic keep-alive text frames.

use std::time::Duration;

use mission_protocol::constants::HEARTBEAT;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

/// Queues a heartbeat every `period` until cancelled or the write pump is
/// gone.
pub(crate) async fn heartbeat_pump(
    write_tx: mpsc::Sender<Message>,
    period: Duration,
    cancel: CancellationToken,
) {
    let mut interval = tokio::time::interval(period);
    interval.tick().await; // Skip immediate first tick.

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = interval.tick() => {
                if write_tx.send(Message::Text(HEARTBEAT.into())).await.is_err() {
                    tracing::debug!("write pump gone, heartbeat stopped");
                    break;
                }
                tracing::trace!("heartbeat queued");
            }
        }
    }
}
