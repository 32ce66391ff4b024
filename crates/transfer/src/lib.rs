//! Worker-side storage primitives for a single upload.
//!
//! Bytes land in a [`ScratchFile`] next to the destination directory while
//! a transfer is in flight and are either moved into place in one rename
//! or deleted. Nothing partial is ever visible under the destination name.

mod digest;
mod scratch;
mod validation;

pub use digest::{checksum_bytes, digests_match};
pub use scratch::{CommittedFile, ScratchFile};
pub use validation::sanitize_filename;

/// Errors produced by the transfer crate.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    #[error("failed to move upload into place: {0}")]
    Persist(std::io::Error),
}
