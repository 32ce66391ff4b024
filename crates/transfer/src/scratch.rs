use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tempfile::TempPath;
use tokio::io::AsyncWriteExt;

use crate::TransferError;
use crate::digest::digests_match;

/// Prefix of scratch files inside the scratch directory.
const SCRATCH_PREFIX: &str = "mission-upload-";

/// A committed upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommittedFile {
    pub path: PathBuf,
    pub bytes: u64,
    pub sha256: String,
}

/// Temporary write target for one transfer.
///
/// Every byte appended is also fed to a running SHA-256, so the digest
/// checked at commit time covers exactly what was written. The backing file
/// is deleted when the value is dropped without a successful
/// [`commit`](Self::commit), which covers discard, cancellation and
/// connection loss alike.
pub struct ScratchFile {
    file: tokio::fs::File,
    path: TempPath,
    hasher: Sha256,
    written: u64,
}

impl ScratchFile {
    /// Creates a fresh scratch file inside `dir`.
    ///
    /// `dir` should live on the same filesystem as the destination so the
    /// final move is a single rename.
    pub fn create_in(dir: &Path) -> Result<Self, TransferError> {
        let tmp = tempfile::Builder::new()
            .prefix(SCRATCH_PREFIX)
            .tempfile_in(dir)?;
        let (file, path) = tmp.into_parts();
        Ok(Self {
            file: tokio::fs::File::from_std(file),
            path,
            hasher: Sha256::new(),
            written: 0,
        })
    }

    /// Appends bytes and feeds them to the digest.
    pub async fn append(&mut self, data: &[u8]) -> Result<(), TransferError> {
        self.file.write_all(data).await?;
        self.hasher.update(data);
        self.written += data.len() as u64;
        Ok(())
    }

    /// Bytes appended so far.
    pub fn written(&self) -> u64 {
        self.written
    }

    /// Location of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Closes the file, verifies the digest and moves it to `dest`.
    ///
    /// `dest` is overwritten if it exists. On any error the scratch file is
    /// removed and nothing appears at `dest`.
    pub async fn commit(
        mut self,
        dest: &Path,
        expected_sha256: Option<&str>,
    ) -> Result<CommittedFile, TransferError> {
        self.file.flush().await?;
        self.file.sync_all().await?;

        let Self {
            file,
            path,
            hasher,
            written,
        } = self;
        drop(file);

        let actual = hex::encode(hasher.finalize());
        if let Some(expected) = expected_sha256
            && !digests_match(expected, &actual)
        {
            // Dropping `path` deletes the scratch file.
            return Err(TransferError::ChecksumMismatch {
                expected: expected.to_string(),
                actual,
            });
        }

        path.persist(dest)
            .map_err(|e| TransferError::Persist(e.error))?;

        Ok(CommittedFile {
            path: dest.to_path_buf(),
            bytes: written,
            sha256: actual,
        })
    }

    /// Deletes the scratch file.
    pub fn discard(self) -> Result<(), TransferError> {
        let Self { file, path, .. } = self;
        drop(file);
        path.close()?;
        Ok(())
    }
}
