//! Final disposition of a PUT

use crate::engine::EngineState;
use crate::error::{CommitFailure, ErrorKind, QueryError};

/// Disposition tag, independent of payload
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Disposition {
    Created,
    Overwritten,
    Rejected,
    Failed,
}

/// Response metadata for a committed object
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommittedObject {
    /// Unquoted MD5 hex of the staged bytes
    pub etag: String,
    pub deal_id: String,
    pub content_cid: String,
    pub version: Option<String>,
    pub size: u64,
}

/// What the decision engine concluded
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DecisionOutcome {
    /// Key was absent and the commit succeeded
    Created(CommittedObject),
    /// Key was present and the commit succeeded (last write wins)
    Overwritten(CommittedObject),
    /// The existence query failed; nothing was committed
    Rejected(QueryError),
    /// The commit did not succeed
    Failed(CommitFailure),
}

impl DecisionOutcome {
    pub fn disposition(&self) -> Disposition {
        match self {
            Self::Created(_) => Disposition::Created,
            Self::Overwritten(_) => Disposition::Overwritten,
            Self::Rejected(_) => Disposition::Rejected,
            Self::Failed(_) => Disposition::Failed,
        }
    }

    pub fn committed(&self) -> Option<&CommittedObject> {
        match self {
            Self::Created(object) | Self::Overwritten(object) => Some(object),
            _ => None,
        }
    }

    pub fn etag(&self) -> Option<&str> {
        self.committed().map(|object| object.etag.as_str())
    }

    /// Error kind for the unsuccessful dispositions
    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Rejected(e) => Some(e.kind()),
            Self::Failed(e) => Some(e.kind()),
            _ => None,
        }
    }

    /// Engine state the request stopped in
    ///
    /// A failed existence query never leaves `PendingPrecheck`; every commit
    /// result, success or not, is `Decided`.
    pub fn final_state(&self) -> EngineState {
        match self {
            Self::Rejected(_) => EngineState::PendingPrecheck,
            Self::Created(_) | Self::Overwritten(_) | Self::Failed(_) => EngineState::Decided,
        }
    }

    /// HTTP status the outcome corresponds to
    pub fn status_hint(&self) -> u16 {
        match self {
            Self::Created(_) => 201,
            Self::Overwritten(_) => 200,
            Self::Rejected(_) => 500,
            Self::Failed(e) if e.is_retryable() => 503,
            Self::Failed(_) => 502,
        }
    }
}
