//! Error types and gateway error codes

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use sfg_core::{CommitFailure, ErrorKind, QueryError, Rejection, StagingError};
use thiserror::Error;

/// Machine-readable code sent in `x-sfg-error-code`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    InvalidPath,
    MethodNotAllowed,
    MissingContentLength,
    InvalidContentLength,
    EntityTooLarge,
    InvalidDigest,
    BadDigest,
    IncompleteBody,
    OversizedBody,
    RequestTimeout,
    InternalError,
    DealRejected,
    ServiceUnavailable,
}

impl ErrorCode {
    /// Get the error code string
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidPath => "InvalidPath",
            Self::MethodNotAllowed => "MethodNotAllowed",
            Self::MissingContentLength => "MissingContentLength",
            Self::InvalidContentLength => "InvalidContentLength",
            Self::EntityTooLarge => "EntityTooLarge",
            Self::InvalidDigest => "InvalidDigest",
            Self::BadDigest => "BadDigest",
            Self::IncompleteBody => "IncompleteBody",
            Self::OversizedBody => "OversizedBody",
            Self::RequestTimeout => "RequestTimeout",
            Self::InternalError => "InternalError",
            Self::DealRejected => "DealRejected",
            Self::ServiceUnavailable => "ServiceUnavailable",
        }
    }

    /// Get the HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidPath
            | Self::InvalidContentLength
            | Self::EntityTooLarge
            | Self::InvalidDigest
            | Self::BadDigest
            | Self::IncompleteBody
            | Self::OversizedBody => StatusCode::BAD_REQUEST,
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Self::MissingContentLength => StatusCode::LENGTH_REQUIRED,
            Self::RequestTimeout => StatusCode::REQUEST_TIMEOUT,
            Self::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
            Self::DealRejected => StatusCode::BAD_GATEWAY,
            Self::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl From<ErrorKind> for ErrorCode {
    fn from(kind: ErrorKind) -> Self {
        match kind {
            ErrorKind::InvalidPath => Self::InvalidPath,
            ErrorKind::MethodNotAllowed => Self::MethodNotAllowed,
            ErrorKind::ContentLengthMissing => Self::MissingContentLength,
            ErrorKind::ContentLengthMalformed | ErrorKind::ContentLengthNegative => {
                Self::InvalidContentLength
            }
            ErrorKind::EntityTooLarge => Self::EntityTooLarge,
            ErrorKind::InvalidDigest => Self::InvalidDigest,
            ErrorKind::DigestMismatch => Self::BadDigest,
            ErrorKind::TruncatedBody => Self::IncompleteBody,
            ErrorKind::OversizedBody => Self::OversizedBody,
            ErrorKind::RequestTimeout => Self::RequestTimeout,
            ErrorKind::StagingIo | ErrorKind::ExistenceQuery => Self::InternalError,
            ErrorKind::CommitPermanent => Self::DealRejected,
            ErrorKind::CommitRetryable => Self::ServiceUnavailable,
        }
    }
}

/// API error type
#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Rejected(#[from] Rejection),

    #[error(transparent)]
    Staging(#[from] StagingError),

    #[error("existence check failed: {0}")]
    Query(#[from] QueryError),

    #[error("deal commit failed: {failure}")]
    Commit {
        failure: CommitFailure,
        retry_after_secs: u64,
    },
}

impl ApiError {
    pub fn commit(failure: CommitFailure, retry_after_secs: u64) -> Self {
        Self::Commit {
            failure,
            retry_after_secs,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Rejected(e) => e.kind(),
            Self::Staging(e) => e.kind(),
            Self::Query(e) => e.kind(),
            Self::Commit { failure, .. } => failure.kind(),
        }
    }

    pub fn error_code(&self) -> ErrorCode {
        ErrorCode::from(self.kind())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let kind = self.kind();
        let code = ErrorCode::from(kind);
        let status = code.status_code();

        if kind.is_client_error() {
            tracing::debug!(code = code.as_str(), error = %self, "request rejected");
        } else {
            tracing::error!(code = code.as_str(), error = %self, "request failed");
        }

        let mut response = (
            status,
            [
                (header::CONTENT_TYPE, "text/plain; charset=utf-8"),
                (header::HeaderName::from_static("x-sfg-error-code"), code.as_str()),
            ],
            format!("{self}\n"),
        )
            .into_response();

        match &self {
            Self::Rejected(Rejection::MethodNotAllowed(_)) => {
                response
                    .headers_mut()
                    .insert(header::ALLOW, HeaderValue::from_static("PUT"));
            }
            Self::Commit {
                retry_after_secs, ..
            } if kind == ErrorKind::CommitRetryable => {
                response
                    .headers_mut()
                    .insert(header::RETRY_AFTER, HeaderValue::from(*retry_after_secs));
            }
            _ => {}
        }

        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(ErrorKind::InvalidPath, 400, "InvalidPath")]
    #[case(ErrorKind::MethodNotAllowed, 405, "MethodNotAllowed")]
    #[case(ErrorKind::ContentLengthMissing, 411, "MissingContentLength")]
    #[case(ErrorKind::ContentLengthMalformed, 400, "InvalidContentLength")]
    #[case(ErrorKind::ContentLengthNegative, 400, "InvalidContentLength")]
    #[case(ErrorKind::EntityTooLarge, 400, "EntityTooLarge")]
    #[case(ErrorKind::InvalidDigest, 400, "InvalidDigest")]
    #[case(ErrorKind::DigestMismatch, 400, "BadDigest")]
    #[case(ErrorKind::TruncatedBody, 400, "IncompleteBody")]
    #[case(ErrorKind::OversizedBody, 400, "OversizedBody")]
    #[case(ErrorKind::RequestTimeout, 408, "RequestTimeout")]
    #[case(ErrorKind::StagingIo, 500, "InternalError")]
    #[case(ErrorKind::ExistenceQuery, 500, "InternalError")]
    #[case(ErrorKind::CommitPermanent, 502, "DealRejected")]
    #[case(ErrorKind::CommitRetryable, 503, "ServiceUnavailable")]
    fn test_status_table(#[case] kind: ErrorKind, #[case] status: u16, #[case] code: &str) {
        let error_code = ErrorCode::from(kind);
        assert_eq!(error_code.status_code().as_u16(), status);
        assert_eq!(error_code.as_str(), code);
    }

    #[test]
    fn test_method_not_allowed_carries_allow() {
        let response = ApiError::from(Rejection::MethodNotAllowed("GET".into())).into_response();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(response.headers()[header::ALLOW], "PUT");
        assert_eq!(response.headers()["x-sfg-error-code"], "MethodNotAllowed");
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/plain; charset=utf-8"
        );
    }

    #[test]
    fn test_retryable_commit_carries_retry_after() {
        let response =
            ApiError::commit(CommitFailure::Unavailable("down".into()), 7).into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(response.headers()[header::RETRY_AFTER], "7");

        let response =
            ApiError::commit(CommitFailure::Rejected("bad".into()), 7).into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert!(response.headers().get(header::RETRY_AFTER).is_none());
    }
}
