//! Content checksums computed while streaming
//!
//! Two digests run side by side over the staged bytes:
//! - BLAKE3 gives the content identity (and the content CID handed to the
//!   deal protocol for deduplication)
//! - MD5 gives the S3-compatible ETag and checks a client's Content-MD5

use cid::multihash::Multihash;
use cid::Cid;
use md5::{Digest, Md5};
use std::fmt;

/// Multicodec code for raw binary content
const RAW_CODEC: u64 = 0x55;

/// Multihash code for BLAKE3-256
const BLAKE3_MULTIHASH: u64 = 0x1e;

/// Final digests over exactly the staged bytes
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentChecksum {
    blake3: [u8; 32],
    md5: [u8; 16],
}

impl ContentChecksum {
    /// Compute both digests over an in-memory buffer
    pub fn of(data: &[u8]) -> Self {
        let mut hasher = StreamingChecksum::new();
        hasher.update(data);
        hasher.finalize()
    }

    pub fn blake3(&self) -> &[u8; 32] {
        &self.blake3
    }

    pub fn md5(&self) -> &[u8; 16] {
        &self.md5
    }

    pub fn blake3_hex(&self) -> String {
        hex::encode(self.blake3)
    }

    pub fn md5_hex(&self) -> String {
        hex::encode(self.md5)
    }

    /// S3 ETag value (unquoted MD5 hex)
    pub fn etag(&self) -> String {
        self.md5_hex()
    }

    /// CIDv1 (raw codec, BLAKE3 multihash) identifying the content
    pub fn content_cid(&self) -> Cid {
        let multihash =
            Multihash::<64>::wrap(BLAKE3_MULTIHASH, &self.blake3).expect("32-byte digest fits");
        Cid::new_v1(RAW_CODEC, multihash)
    }
}

impl fmt::Debug for ContentChecksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContentChecksum")
            .field("blake3", &self.blake3_hex())
            .field("md5", &self.md5_hex())
            .finish()
    }
}

/// An incremental hasher for streaming data
pub struct StreamingChecksum {
    blake3: blake3::Hasher,
    md5: Md5,
    bytes_processed: u64,
}

impl StreamingChecksum {
    pub fn new() -> Self {
        Self {
            blake3: blake3::Hasher::new(),
            md5: Md5::new(),
            bytes_processed: 0,
        }
    }

    /// Update both digests with more data
    pub fn update(&mut self, data: &[u8]) {
        self.blake3.update(data);
        self.md5.update(data);
        self.bytes_processed += data.len() as u64;
    }

    /// Get the number of bytes processed
    pub fn bytes_processed(&self) -> u64 {
        self.bytes_processed
    }

    pub fn finalize(self) -> ContentChecksum {
        ContentChecksum {
            blake3: *self.blake3.finalize().as_bytes(),
            md5: self.md5.finalize().into(),
        }
    }
}

impl Default for StreamingChecksum {
    fn default() -> Self {
        Self::new()
    }
}
