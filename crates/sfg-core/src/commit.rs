//! Commit port: the narrow contract toward the deal protocol

use crate::context::ExecutionContext;
use crate::error::CommitFailure;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

/// Success payload of one commit attempt
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitReceipt {
    pub deal_id: String,
    /// Content identifier as reported by the deal protocol
    pub content_cid: String,
    /// Protocol-assigned version marker, if the protocol versions objects
    pub version: Option<String>,
}

/// Exactly one per commit attempt
pub type CommitResult = Result<CommitReceipt, CommitFailure>;

/// Commits staged content as a storage deal
///
/// Implementations execute what the context says and nothing more: they do
/// not retry, and they do not decide create versus overwrite. The deadline
/// bounds every round trip of the attempt.
#[async_trait]
pub trait DealCommitter: Send + Sync {
    /// Commit `ctx`, optionally superseding the deal `replaces`
    async fn commit(
        &self,
        ctx: &ExecutionContext,
        replaces: Option<&str>,
        deadline: Instant,
    ) -> CommitResult;
}
