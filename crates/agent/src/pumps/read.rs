//! Read pump: feeds inbound frames to the receiver.

use futures_util::{Stream, StreamExt};
use mission_protocol::Frame;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_util::sync::CancellationToken;

use crate::SessionEnd;
use crate::receiver::UploadReceiver;

/// Reads until the connection ends or `cancel` fires.
///
/// Malformed control frames are logged and skipped; only transport
/// events end the loop.
pub(crate) async fn read_pump<S>(
    mut read: S,
    receiver: &mut UploadReceiver,
    cancel: &CancellationToken,
) -> SessionEnd
where
    S: Stream<Item = Result<Message, tungstenite::Error>> + Unpin,
{
    loop {
        let msg = tokio::select! {
            _ = cancel.cancelled() => return SessionEnd::Cancelled,
            msg = read.next() => msg,
        };

        match msg {
            Some(Ok(Message::Text(text))) => match Frame::from_text(text.as_str()) {
                Ok(frame) => {
                    receiver.handle(frame).await;
                }
                Err(violation) => tracing::warn!("dropping text frame: {violation}"),
            },
            Some(Ok(Message::Binary(data))) => {
                receiver.handle(Frame::Chunk(data.to_vec())).await;
            }
            Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_))) => {}
            Some(Ok(Message::Close(frame))) => {
                tracing::debug!(?frame, "received close frame");
                return SessionEnd::ClosedByPeer;
            }
            Some(Err(e)) => return SessionEnd::Transport(e),
            None => return SessionEnd::ClosedByPeer,
        }
    }
}
