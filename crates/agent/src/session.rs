//! One connected session: write pump, heartbeat pump and read loop.

use std::time::Duration;

use futures_util::{Sink, Stream, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_util::sync::CancellationToken;

use crate::SessionEnd;
use crate::pumps::heartbeat::heartbeat_pump;
use crate::pumps::read::read_pump;
use crate::pumps::write::write_pump;
use crate::receiver::UploadReceiver;

/// Outbound queue depth; only heartbeats are queued.
const WRITE_QUEUE: usize = 16;

/// Runs a session over `socket` until the peer goes away or `cancel`
/// fires.
///
/// Any transfer still in progress when the session ends is discarded.
pub async fn run_session<S>(
    socket: S,
    receiver: &mut UploadReceiver,
    heartbeat: Duration,
    cancel: &CancellationToken,
) -> SessionEnd
where
    S: Stream<Item = Result<Message, tungstenite::Error>>
        + Sink<Message, Error = tungstenite::Error>
        + Unpin
        + Send
        + 'static,
{
    let (write, read) = socket.split();
    let session_cancel = cancel.child_token();
    let (write_tx, write_rx) = mpsc::channel(WRITE_QUEUE);

    let write_handle = tokio::spawn(write_pump(write, write_rx, session_cancel.clone()));
    let heartbeat_handle = tokio::spawn(heartbeat_pump(
        write_tx,
        heartbeat,
        session_cancel.clone(),
    ));

    let end = read_pump(read, receiver, &session_cancel).await;

    session_cancel.cancel();
    receiver.connection_lost();
    join_pump("heartbeat", heartbeat_handle).await;
    join_pump("write", write_handle).await;
    end
}

/// Waits for a pump task, logging a panic or abort instead of dropping it.
/// Returns whether the task finished normally.
async fn join_pump(name: &str, handle: JoinHandle<()>) -> bool {
    match handle.await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(pump = name, "pump task failed: {e}");
            false
        }
    }
}
