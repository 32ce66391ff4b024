//! Turns an upload byte stream into the frame sequence for one transfer.

use std::sync::Arc;

use mission_protocol::constants::CHUNK_SIZE;
use mission_protocol::{ControlFrame, Frame, TransferMeta};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::DispatchError;
use crate::registry::ConnectionRegistry;

/// Summary of a dispatch whose frames were all written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub chunks: u64,
    pub bytes: u64,
}

/// Streams uploads to the agent, one transfer at a time.
///
/// The transfer lock is global rather than per connection: the agent can
/// only reassemble one transfer at a time, so frames of two uploads must
/// never interleave on the wire. It is held for the whole dispatch,
/// including slow source reads.
pub struct Dispatcher {
    registry: Arc<ConnectionRegistry>,
    transfer_lock: Mutex<()>,
    chunk_size: usize,
}

impl Dispatcher {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self {
            registry,
            transfer_lock: Mutex::new(()),
            chunk_size: CHUNK_SIZE,
        }
    }

    /// Overrides the chunk size (0 keeps the default).
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        if chunk_size > 0 {
            self.chunk_size = chunk_size;
        }
        self
    }

    /// Sends `begin_upload`, the source in chunks, then `end_upload`.
    ///
    /// Fails fast with [`DispatchError::AgentOffline`] when no agent is
    /// attached. Cancellation is checked before every chunk and aborts
    /// without sending `end_upload`. The first write error aborts the
    /// sequence.
    pub async fn dispatch<R>(
        &self,
        cancel: &CancellationToken,
        meta: &TransferMeta,
        mut source: R,
    ) -> Result<DispatchReport, DispatchError>
    where
        R: AsyncRead + Unpin,
    {
        let _transfer = self.transfer_lock.lock().await;

        let Some(conn) = self.registry.active().await else {
            return Err(DispatchError::AgentOffline);
        };

        conn.send(Frame::Control(ControlFrame::begin(meta))).await?;

        let mut report = DispatchReport::default();
        let mut buf = vec![0u8; self.chunk_size];
        loop {
            let n = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::info!(id = %meta.id, sent = report.bytes, "upload dispatch cancelled");
                    return Err(DispatchError::Cancelled);
                }
                read = read_chunk(&mut source, &mut buf) => read.map_err(DispatchError::Source)?,
            };
            if n == 0 {
                break;
            }

            conn.send(Frame::Chunk(buf[..n].to_vec())).await?;
            report.chunks += 1;
            report.bytes += n as u64;
            tracing::trace!(id = %meta.id, chunk = report.chunks, n, "chunk sent");
        }

        conn.send(Frame::Control(ControlFrame::end(&meta.id))).await?;

        tracing::info!(
            id = %meta.id,
            filename = %meta.filename,
            bytes = report.bytes,
            chunks = report.chunks,
            "streamed upload"
        );
        Ok(report)
    }
}

/// Fills `buf` from `src`, stopping early only at end of stream.
async fn read_chunk<R>(src: &mut R, buf: &mut [u8]) -> std::io::Result<usize>
where
    R: AsyncRead + Unpin,
{
    let mut filled = 0;
    while filled < buf.len() {
        let n = src.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}
