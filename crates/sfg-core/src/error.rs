//! Error types for the sfg-core crate
//!
//! Every failure the pipeline can produce maps to exactly one [`ErrorKind`].
//! The gateway picks status codes from the kind, never from message text.

use std::time::Duration;
use thiserror::Error;

/// Closed classification of every way a PUT can fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidPath,
    MethodNotAllowed,
    ContentLengthMissing,
    ContentLengthMalformed,
    ContentLengthNegative,
    EntityTooLarge,
    InvalidDigest,
    DigestMismatch,
    TruncatedBody,
    OversizedBody,
    RequestTimeout,
    StagingIo,
    ExistenceQuery,
    CommitRetryable,
    CommitPermanent,
}

impl ErrorKind {
    /// Whether the caller caused the failure
    pub fn is_client_error(&self) -> bool {
        !matches!(
            self,
            Self::StagingIo | Self::ExistenceQuery | Self::CommitRetryable | Self::CommitPermanent
        )
    }
}

/// Rejections produced before the body is touched (extractor and validator)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// Path is not `/{bucket}/{key}` with both segments non-empty
    #[error("invalid path, expected /{{bucket}}/{{object-key}}")]
    InvalidPath,

    /// Only PUT is served
    #[error("method {0} not allowed, only PUT is supported")]
    MethodNotAllowed(String),

    /// Content-Length absent or blank
    #[error("missing Content-Length")]
    ContentLengthMissing,

    /// Content-Length is not a base-10 integer
    #[error("malformed Content-Length: {0:?}")]
    ContentLengthMalformed(String),

    /// Content-Length parsed but below zero
    #[error("negative Content-Length: {0}")]
    ContentLengthNegative(i64),

    /// Content-Length above the configured object size ceiling
    #[error("Content-Length {declared} exceeds the maximum object size of {max} bytes")]
    EntityTooLarge { declared: u64, max: u64 },

    /// Content-MD5 is not base64 of a 16-byte digest
    #[error("invalid Content-MD5")]
    InvalidDigest,
}

impl Rejection {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidPath => ErrorKind::InvalidPath,
            Self::MethodNotAllowed(_) => ErrorKind::MethodNotAllowed,
            Self::ContentLengthMissing => ErrorKind::ContentLengthMissing,
            Self::ContentLengthMalformed(_) => ErrorKind::ContentLengthMalformed,
            Self::ContentLengthNegative(_) => ErrorKind::ContentLengthNegative,
            Self::EntityTooLarge { .. } => ErrorKind::EntityTooLarge,
            Self::InvalidDigest => ErrorKind::InvalidDigest,
        }
    }
}

/// Errors raised while draining the body into the staging area
#[derive(Error, Debug)]
pub enum StagingError {
    /// Stream ended before the declared length was reached
    #[error("request body truncated: expected {expected} bytes, received {received}")]
    TruncatedBody { expected: u64, received: u64 },

    /// Stream carried more bytes than declared
    #[error("request body exceeds declared Content-Length of {expected} bytes")]
    OversizedBody { expected: u64 },

    /// Staged bytes do not match the client's Content-MD5
    #[error("the Content-MD5 you specified did not match what was received")]
    DigestMismatch,

    /// Request deadline elapsed while staging
    #[error("request body was not received within the request deadline")]
    Timeout,

    /// Reading the body or writing the staging file failed
    #[error("staging I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StagingError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::TruncatedBody { .. } => ErrorKind::TruncatedBody,
            Self::OversizedBody { .. } => ErrorKind::OversizedBody,
            Self::DigestMismatch => ErrorKind::DigestMismatch,
            Self::Timeout => ErrorKind::RequestTimeout,
            Self::Io(_) => ErrorKind::StagingIo,
        }
    }
}

/// Failures of the object-existence collaborator
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    #[error("object index unavailable: {0}")]
    Unavailable(String),

    #[error("object index query timed out")]
    Timeout,
}

impl QueryError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::ExistenceQuery
    }
}

/// Typed reason a commit attempt did not succeed
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommitFailure {
    /// Deadline elapsed before the deal protocol accepted the proposal
    #[error("deal protocol did not answer within {0:?}")]
    Timeout(Duration),

    /// Deal protocol unreachable or temporarily refusing work
    #[error("deal protocol unavailable: {0}")]
    Unavailable(String),

    /// The proposal may have been accepted remotely; outcome unknown
    #[error("commit outcome unknown: {0}")]
    Ambiguous(String),

    /// Proposal refused (bad proposal, insufficient deal terms)
    #[error("deal proposal rejected: {0}")]
    Rejected(String),

    /// Remote side refused the uploaded content
    #[error("content rejected by deal protocol: {0}")]
    MalformedContent(String),

    /// Storage quota or size limit hit on the remote side
    #[error("deal quota exceeded: {0}")]
    QuotaExceeded(String),

    /// Deal reached the FAILED state
    #[error("deal failed: {0}")]
    DealFailed(String),
}

impl CommitFailure {
    /// Whether the caller may safely resend identical content
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Timeout(_) | Self::Unavailable(_) | Self::Ambiguous(_)
        )
    }

    pub fn kind(&self) -> ErrorKind {
        if self.is_retryable() {
            ErrorKind::CommitRetryable
        } else {
            ErrorKind::CommitPermanent
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_path_message() {
        assert_eq!(
            Rejection::InvalidPath.to_string(),
            "invalid path, expected /{bucket}/{object-key}"
        );
    }

    #[test]
    fn test_commit_failure_classes() {
        assert!(CommitFailure::Timeout(Duration::from_secs(1)).is_retryable());
        assert!(CommitFailure::Unavailable("503".into()).is_retryable());
        assert!(CommitFailure::Ambiguous("lost".into()).is_retryable());
        assert!(!CommitFailure::Rejected("terms".into()).is_retryable());
        assert!(!CommitFailure::QuotaExceeded("full".into()).is_retryable());
        assert!(!CommitFailure::MalformedContent("size".into()).is_retryable());
        assert!(!CommitFailure::DealFailed("sealing".into()).is_retryable());
    }

    #[test]
    fn test_client_error_split() {
        assert!(ErrorKind::TruncatedBody.is_client_error());
        assert!(ErrorKind::MethodNotAllowed.is_client_error());
        assert!(!ErrorKind::StagingIo.is_client_error());
        assert!(!ErrorKind::CommitRetryable.is_client_error());
    }
}
