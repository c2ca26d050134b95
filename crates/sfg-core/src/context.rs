//! The unit of work handed from ingress to the commit path

use crate::checksum::ContentChecksum;
use crate::stage::StagedData;
use std::fmt;
use uuid::Uuid;

/// Per-request identifier carried across the adapter boundary
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CorrelationId(Uuid);

impl CorrelationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<Uuid> for CorrelationId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

/// A validated, fully staged PUT ready for commit
///
/// Built only by [`crate::translate`]. Owns the [`StagedData`], so the
/// staging file lives exactly as long as the context.
#[derive(Debug)]
pub struct ExecutionContext {
    correlation_id: CorrelationId,
    bucket: String,
    key: String,
    content_length: u64,
    content_type: String,
    staged: StagedData,
}

impl ExecutionContext {
    pub(crate) fn new(
        correlation_id: CorrelationId,
        bucket: String,
        key: String,
        content_length: u64,
        content_type: String,
        staged: StagedData,
    ) -> Self {
        Self {
            correlation_id,
            bucket,
            key,
            content_length,
            content_type,
            staged,
        }
    }

    /// Reuse an identifier assigned upstream (e.g. the HTTP request id)
    pub fn with_correlation_id(mut self, correlation_id: CorrelationId) -> Self {
        self.correlation_id = correlation_id;
        self
    }

    pub fn correlation_id(&self) -> CorrelationId {
        self.correlation_id
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn content_length(&self) -> u64 {
        self.content_length
    }

    /// Content-Type as sent by the client, empty when absent
    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn staged(&self) -> &StagedData {
        &self.staged
    }

    pub fn checksum(&self) -> &ContentChecksum {
        self.staged.checksum()
    }

    /// `bucket/key`, the name the object is known by on the deal side
    pub fn object_name(&self) -> String {
        format!("{}/{}", self.bucket, self.key)
    }
}
