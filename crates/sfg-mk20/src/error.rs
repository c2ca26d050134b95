//! Error types for the sfg-mk20 crate

use crate::types::DealState;
use thiserror::Error;

/// Result type alias using `Mk20Error`
pub type Result<T> = std::result::Result<T, Mk20Error>;

/// Errors that can occur talking to the deal protocol
#[derive(Error, Debug)]
pub enum Mk20Error {
    /// Proposal refused (bad proposal, insufficient deal terms)
    #[error("proposal rejected: {0}")]
    Rejected(String),

    /// Storage quota or size limit hit
    #[error("quota exceeded: {0}")]
    QuotaExceeded(String),

    /// Deal or endpoint not found
    #[error("not found: {0}")]
    NotFound(String),

    /// Server overloaded, rate limited or failing
    #[error("deal protocol unavailable: {0}")]
    Unavailable(String),

    /// Unexpected HTTP status
    #[error("http error {status}: {body}")]
    Http { status: u16, body: String },

    /// Request timed out
    #[error("request timed out: {0}")]
    Timeout(String),

    /// Connection error
    #[error("connection error: {0}")]
    Connection(String),

    /// Uploaded content does not match the proposal
    #[error("content mismatch: {0}")]
    ContentMismatch(String),

    /// Deal reached FAILED
    #[error("deal failed: {0}")]
    DealFailed(String),

    /// Status moved in a way the deal state machine forbids
    #[error("illegal deal state transition: {from} -> {to}")]
    IllegalTransition { from: DealState, to: DealState },

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Response body could not be decoded
    #[error("deserialization error: {0}")]
    Deserialization(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl Mk20Error {
    /// Classify a non-success HTTP status
    pub fn from_status(status: u16, body: String) -> Self {
        match status {
            400 | 422 => Mk20Error::Rejected(body),
            402 | 413 | 507 => Mk20Error::QuotaExceeded(body),
            404 => Mk20Error::NotFound(body),
            408 => Mk20Error::Timeout(body),
            429 | 500..=599 => Mk20Error::Unavailable(format!("status {status}: {body}")),
            _ => Mk20Error::Http { status, body },
        }
    }

    /// Whether the request probably never took effect and may be resent
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Mk20Error::Unavailable(_) | Mk20Error::Timeout(_) | Mk20Error::Connection(_)
        )
    }
}

impl From<reqwest::Error> for Mk20Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Mk20Error::Timeout(err.to_string())
        } else if err.is_connect() {
            Mk20Error::Connection(err.to_string())
        } else if err.is_decode() {
            Mk20Error::Deserialization(err.to_string())
        } else if let Some(status) = err.status() {
            Mk20Error::from_status(status.as_u16(), err.to_string())
        } else {
            Mk20Error::Connection(err.to_string())
        }
    }
}

impl From<serde_json::Error> for Mk20Error {
    fn from(err: serde_json::Error) -> Self {
        Mk20Error::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(400, "rejected")]
    #[case(422, "rejected")]
    #[case(402, "quota")]
    #[case(413, "quota")]
    #[case(507, "quota")]
    #[case(404, "not_found")]
    #[case(408, "timeout")]
    #[case(429, "unavailable")]
    #[case(500, "unavailable")]
    #[case(503, "unavailable")]
    #[case(401, "http")]
    fn test_status_classification(#[case] status: u16, #[case] expected: &str) {
        let err = Mk20Error::from_status(status, "body".to_string());
        let actual = match err {
            Mk20Error::Rejected(_) => "rejected",
            Mk20Error::QuotaExceeded(_) => "quota",
            Mk20Error::NotFound(_) => "not_found",
            Mk20Error::Timeout(_) => "timeout",
            Mk20Error::Unavailable(_) => "unavailable",
            Mk20Error::Http { .. } => "http",
            other => panic!("unexpected {other:?}"),
        };
        assert_eq!(actual, expected);
    }

    #[test]
    fn test_transient_errors() {
        assert!(Mk20Error::Unavailable("503".into()).is_transient());
        assert!(Mk20Error::Connection("refused".into()).is_transient());
        assert!(!Mk20Error::Rejected("terms".into()).is_transient());
        assert!(!Mk20Error::DealFailed("sealing".into()).is_transient());
    }
}
