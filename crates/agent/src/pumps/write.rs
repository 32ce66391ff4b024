//! Write pump: owns the socket's write half.

use futures_util::{Sink, SinkExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_util::sync::CancellationToken;

/// Writes queued messages until cancelled or the queue closes.
///
/// Doubles as the session's cancellation watcher: once `cancel` fires it
/// sends a close frame and closes the sink, which ends the gateway side of
/// the connection.
pub(crate) async fn write_pump<S>(
    mut write: S,
    mut write_rx: mpsc::Receiver<Message>,
    cancel: CancellationToken,
) where
    S: Sink<Message, Error = tungstenite::Error> + Unpin,
{
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            msg = write_rx.recv() => match msg {
                Some(m) => {
                    if let Err(e) = write.send(m).await {
                        tracing::warn!("WebSocket write error: {e}");
                        break;
                    }
                }
                None => break,
            },
        }
    }

    let _ = write.send(Message::Close(None)).await;
    let _ = write.close().await;
}
