//! Body staging
//!
//! Drains the request body into a request-scoped file, counting bytes and
//! feeding both checksums as chunks arrive. The staging file is owned by a
//! drop guard, so it is removed on every exit path: errors, deadline expiry,
//! the request task being dropped on client disconnect, and normal release
//! once the pipeline is done with the [`StagedData`].

use crate::checksum::{ContentChecksum, StreamingChecksum};
use crate::error::StagingError;
use crate::DEFAULT_STAGING_CHUNK_SIZE;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::time::Instant;
use tracing::{debug, instrument, warn};

/// Staging area configuration
#[derive(Clone, Debug)]
pub struct StagerConfig {
    /// Directory holding in-flight uploads
    pub dir: PathBuf,
    /// Write buffer size; bounds the bytes held in memory per request
    pub chunk_size: usize,
}

impl StagerConfig {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            chunk_size: DEFAULT_STAGING_CHUNK_SIZE,
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }
}

/// Streams request bodies into the staging area
#[derive(Clone, Debug)]
pub struct Stager {
    config: StagerConfig,
}

impl Stager {
    pub fn new(config: StagerConfig) -> Self {
        Self { config }
    }

    pub fn dir(&self) -> &Path {
        &self.config.dir
    }

    /// Create the staging directory if it does not exist yet
    pub async fn prepare(&self) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.config.dir).await
    }

    /// Drain `body` into a fresh staging file
    ///
    /// Fails with [`StagingError::OversizedBody`] as soon as a chunk would
    /// push the count past `declared`, without reading further, and with
    /// [`StagingError::TruncatedBody`] if the stream ends short.
    #[instrument(skip(self, body), fields(dir = %self.config.dir.display()))]
    pub async fn stage<S, E>(
        &self,
        body: S,
        declared: u64,
        deadline: Instant,
    ) -> Result<StagedData, StagingError>
    where
        S: Stream<Item = Result<Bytes, E>>,
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        match tokio::time::timeout_at(deadline, self.drain(body, declared)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(declared, "Staging deadline elapsed, discarding partial upload");
                Err(StagingError::Timeout)
            }
        }
    }

    async fn drain<S, E>(&self, body: S, declared: u64) -> Result<StagedData, StagingError>
    where
        S: Stream<Item = Result<Bytes, E>>,
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let path = self
            .config
            .dir
            .join(format!("{}.part", uuid::Uuid::new_v4()));
        let file = File::create(&path).await?;
        let guard = StagingGuard { path };

        let mut writer = BufWriter::with_capacity(self.config.chunk_size, file);
        let mut checksum = StreamingChecksum::new();
        let mut body = std::pin::pin!(body);

        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(std::io::Error::other)?;
            let received = checksum.bytes_processed();
            if received + chunk.len() as u64 > declared {
                debug!(declared, received, chunk = chunk.len(), "Body exceeds declared length");
                return Err(StagingError::OversizedBody { expected: declared });
            }
            checksum.update(&chunk);
            writer.write_all(&chunk).await?;
        }

        let received = checksum.bytes_processed();
        if received < declared {
            return Err(StagingError::TruncatedBody {
                expected: declared,
                received,
            });
        }

        writer.flush().await?;
        writer.into_inner().sync_all().await?;

        debug!(path = %guard.path.display(), size = received, "Body staged");

        Ok(StagedData {
            size: received,
            checksum: checksum.finalize(),
            guard,
        })
    }
}

/// Removes the staging file when dropped
#[derive(Debug)]
struct StagingGuard {
    path: PathBuf,
}

impl Drop for StagingGuard {
    fn drop(&mut self) {
        // One unlink, run inline on whichever worker drops the guard.
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "Staging file released"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), error = %e, "Failed to release staging file"),
        }
    }
}

/// A fully staged body
///
/// Holds exactly the declared number of bytes. The staging file lives as
/// long as this value does.
#[derive(Debug)]
pub struct StagedData {
    size: u64,
    checksum: ContentChecksum,
    guard: StagingGuard,
}

impl StagedData {
    /// Location of the staged content
    pub fn path(&self) -> &Path {
        &self.guard.path
    }

    /// Observed byte count (equals the declared Content-Length)
    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn checksum(&self) -> &ContentChecksum {
        &self.checksum
    }

    /// Open the staged content for reading
    pub async fn open(&self) -> std::io::Result<File> {
        File::open(self.path()).await
    }

    /// Compare against the client's Content-MD5, if one was sent
    pub fn verify_content_md5(&self, expected: Option<&[u8; 16]>) -> Result<(), StagingError> {
        match expected {
            Some(md5) if md5 != self.checksum.md5() => Err(StagingError::DigestMismatch),
            _ => Ok(()),
        }
    }
}
