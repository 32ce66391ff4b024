//! Upload receiver: reassembles one transfer at a time from frames.

use std::path::{Path, PathBuf};

use mission_protocol::{ControlFrame, ControlKind, Frame, ProtocolViolation, TransferMeta};
use mission_transfer::{CommittedFile, ScratchFile, TransferError, sanitize_filename};

/// What handling one frame did.
#[derive(Debug)]
pub enum Step {
    /// Valid frame with nothing to do (heartbeat).
    Ignored,
    /// Frame not acceptable in the current state; state unchanged.
    Rejected(ProtocolViolation),
    /// A transfer began.
    Started { id: String, filename: String },
    /// Bytes were appended to the active transfer.
    Appended { bytes: u64 },
    /// The active transfer was moved into the destination directory.
    Committed(CommittedFile),
    /// The active transfer (or its start) failed and left nothing behind.
    Discarded(TransferError),
}

struct Transfer {
    meta: TransferMeta,
    filename: String,
    scratch: ScratchFile,
}

enum State {
    Idle,
    Receiving(Transfer),
}

/// State machine turning `begin_upload` / chunks / `end_upload` into files
/// under `dest_dir`.
///
/// Owned by the session read loop; every transition goes through
/// [`handle`](Self::handle) or [`connection_lost`](Self::connection_lost).
pub struct UploadReceiver {
    dest_dir: PathBuf,
    scratch_dir: PathBuf,
    state: State,
}

impl UploadReceiver {
    pub fn new(dest_dir: impl Into<PathBuf>, scratch_dir: impl Into<PathBuf>) -> Self {
        Self {
            dest_dir: dest_dir.into(),
            scratch_dir: scratch_dir.into(),
            state: State::Idle,
        }
    }

    pub fn dest_dir(&self) -> &Path {
        &self.dest_dir
    }

    /// Id of the transfer in progress, if any.
    pub fn active_transfer(&self) -> Option<&str> {
        match &self.state {
            State::Idle => None,
            State::Receiving(t) => Some(&t.meta.id),
        }
    }

    pub async fn handle(&mut self, frame: Frame) -> Step {
        let step = match frame {
            Frame::Heartbeat => Step::Ignored,
            Frame::Control(control) => self.handle_control(control).await,
            Frame::Chunk(data) => self.handle_chunk(&data).await,
        };
        log_step(&step);
        step
    }

    async fn handle_control(&mut self, control: ControlFrame) -> Step {
        match control.kind {
            ControlKind::BeginUpload => self.begin(control.meta()),
            ControlKind::EndUpload => self.end(control.id).await,
            ControlKind::Unknown => Step::Rejected(ProtocolViolation::UnknownControl),
        }
    }

    fn begin(&mut self, meta: TransferMeta) -> Step {
        if let State::Receiving(active) = &self.state {
            return Step::Rejected(ProtocolViolation::BeginWhileReceiving {
                active: active.meta.id.clone(),
            });
        }

        let scratch = match ScratchFile::create_in(&self.scratch_dir) {
            Ok(scratch) => scratch,
            Err(e) => return Step::Discarded(e),
        };
        let filename = sanitize_filename(&meta.filename);
        let step = Step::Started {
            id: meta.id.clone(),
            filename: filename.clone(),
        };
        self.state = State::Receiving(Transfer {
            meta,
            filename,
            scratch,
        });
        step
    }

    async fn handle_chunk(&mut self, data: &[u8]) -> Step {
        let State::Receiving(transfer) = &mut self.state else {
            return Step::Rejected(ProtocolViolation::ChunkWhileIdle);
        };

        match transfer.scratch.append(data).await {
            Ok(()) => Step::Appended {
                bytes: data.len() as u64,
            },
            Err(e) => {
                // A hole in the middle cannot be repaired; drop the transfer.
                self.state = State::Idle;
                Step::Discarded(e)
            }
        }
    }

    async fn end(&mut self, id: String) -> Step {
        let expected = match &self.state {
            State::Idle => return Step::Rejected(ProtocolViolation::EndWhileIdle { id }),
            State::Receiving(t) => &t.meta.id,
        };
        if !id.is_empty() && id != *expected {
            return Step::Rejected(ProtocolViolation::EndIdMismatch {
                got: id,
                expected: expected.clone(),
            });
        }

        let State::Receiving(transfer) = std::mem::replace(&mut self.state, State::Idle) else {
            return Step::Rejected(ProtocolViolation::EndWhileIdle { id });
        };
        let Transfer {
            meta,
            filename,
            scratch,
        } = transfer;

        let received = scratch.written();
        if meta.size > 0 && u64::try_from(meta.size).is_ok_and(|declared| declared != received) {
            tracing::warn!(
                id = %meta.id,
                declared = meta.size,
                received,
                "size mismatch"
            );
        }

        let dest = self.dest_dir.join(&filename);
        match scratch.commit(&dest, meta.expected_digest().as_deref()).await {
            Ok(committed) => Step::Committed(committed),
            Err(e) => Step::Discarded(e),
        }
    }

    /// Drops any transfer in progress. Called when the session ends.
    pub fn connection_lost(&mut self) {
        if let State::Receiving(transfer) = std::mem::replace(&mut self.state, State::Idle) {
            tracing::info!(
                id = %transfer.meta.id,
                filename = %transfer.filename,
                bytes = transfer.scratch.written(),
                "connection lost, discarding partial upload"
            );
            if let Err(e) = transfer.scratch.discard() {
                tracing::warn!("failed to remove scratch file: {e}");
            }
        }
    }
}

fn log_step(step: &Step) {
    match step {
        Step::Ignored => tracing::trace!("heartbeat"),
        Step::Rejected(v) => tracing::warn!("protocol violation ignored: {v}"),
        Step::Started { id, filename } => tracing::info!(%id, %filename, "receiving upload"),
        Step::Appended { bytes } => tracing::trace!(bytes, "chunk"),
        Step::Committed(file) => tracing::info!(
            path = %file.path.display(),
            bytes = file.bytes,
            sha256 = %file.sha256,
            "upload saved"
        ),
        Step::Discarded(e) => tracing::warn!("upload discarded: {e}"),
    }
}
