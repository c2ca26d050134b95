//! Decision engine
//!
//! Drives one request through `PendingPrecheck → Committing → Decided`. The
//! returned [`DecisionOutcome`] reports the state it stopped in, see
//! [`DecisionOutcome::final_state`]:
//!
//! 1. **Precheck**: ask the [`ObjectIndex`] whether the key exists. The
//!    answer only classifies the write (create or overwrite) and supplies the
//!    prior deal as the version reference. A failed query fails closed.
//! 2. **Dispatch**: hand the context to the [`DealCommitter`], retrying
//!    transient unavailability under the [`RetryPolicy`].
//! 3. **Decide**: turn the presence and the commit result into a
//!    [`DecisionOutcome`] and record the new binding.
//!
//! Precheck and commit are not atomic. Two concurrent PUTs to one key both
//! commit, and whichever records last is what the index holds.

use crate::commit::{CommitResult, DealCommitter};
use crate::context::ExecutionContext;
use crate::error::{CommitFailure, QueryError};
use crate::index::{ObjectEntry, ObjectIndex, Presence};
use crate::outcome::{CommittedObject, DecisionOutcome};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Per-request engine state
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EngineState {
    PendingPrecheck,
    Committing,
    Decided,
}

impl EngineState {
    /// The only legal successor, if any
    pub fn next(self) -> Option<Self> {
        match self {
            Self::PendingPrecheck => Some(Self::Committing),
            Self::Committing => Some(Self::Decided),
            Self::Decided => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WriteKind {
    Create,
    Overwrite,
}

/// Tentative classification from the precheck
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WriteIntent {
    pub kind: WriteKind,
    /// Entry the key was bound to, for overwrites
    pub prior: Option<ObjectEntry>,
}

impl WriteIntent {
    pub fn from_presence(presence: Presence) -> Self {
        match presence {
            Presence::Present(entry) => Self {
                kind: WriteKind::Overwrite,
                prior: Some(entry),
            },
            Presence::Absent => Self {
                kind: WriteKind::Create,
                prior: None,
            },
        }
    }

    /// Deal the new commit supersedes
    pub fn replaces(&self) -> Option<&str> {
        self.prior.as_ref().map(|entry| entry.deal_id.as_str())
    }
}

/// Backoff for retryable commit failures
///
/// Only [`CommitFailure::Unavailable`] is retried: it means the proposal
/// never reached the deal protocol. Timeouts and ambiguous failures may have
/// been accepted remotely and go back to the caller instead.
#[derive(Clone, Debug, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first
    pub max_attempts: u32,
    /// Delay before the second attempt
    pub base_delay: Duration,
    pub multiplier: f64,
}

impl RetryPolicy {
    /// One attempt, no retries
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Delay after `attempts` failed attempts: `base_delay * multiplier^(attempts - 1)`
    pub fn next_delay(&self, attempts: u32) -> Duration {
        let exponent = attempts.saturating_sub(1) as i32;
        Duration::from_secs_f64(self.base_delay.as_secs_f64() * self.multiplier.powi(exponent))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::from_millis(500),
            multiplier: 2.0,
        }
    }
}

/// Create-vs-overwrite decisions around a deal commit
#[derive(Clone)]
pub struct DecisionEngine {
    index: Arc<dyn ObjectIndex>,
    committer: Arc<dyn DealCommitter>,
    retry: RetryPolicy,
}

impl DecisionEngine {
    pub fn new(index: Arc<dyn ObjectIndex>, committer: Arc<dyn DealCommitter>) -> Self {
        Self {
            index,
            committer,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Run the whole state machine for one request
    ///
    /// Consumes the context; the staging file is released when this returns
    /// or when the future is dropped.
    pub async fn execute(&self, ctx: ExecutionContext, deadline: Instant) -> DecisionOutcome {
        let started = Instant::now();

        let intent = match self.precheck(&ctx, deadline).await {
            Ok(intent) => intent,
            Err(e) => {
                warn!(
                    correlation_id = %ctx.correlation_id(),
                    bucket = ctx.bucket(),
                    key = ctx.key(),
                    state = ?EngineState::PendingPrecheck,
                    error = %e,
                    "Existence query failed, refusing to commit"
                );
                return DecisionOutcome::Rejected(e);
            }
        };

        debug!(
            correlation_id = %ctx.correlation_id(),
            state = ?EngineState::Committing,
            kind = ?intent.kind,
            replaces = ?intent.replaces(),
            "Dispatching commit"
        );
        let result = self.dispatch(&ctx, &intent, deadline).await;

        let outcome = Self::classify(
            intent.kind,
            ctx.checksum().etag(),
            ctx.content_length(),
            result,
        );

        if let Some(object) = outcome.committed() {
            self.remember(&ctx, object).await;
            info!(
                correlation_id = %ctx.correlation_id(),
                bucket = ctx.bucket(),
                key = ctx.key(),
                deal_id = %object.deal_id,
                size = object.size,
                disposition = ?outcome.disposition(),
                state = ?outcome.final_state(),
                duration_ms = started.elapsed().as_millis() as u64,
                "Object committed"
            );
        } else if let DecisionOutcome::Failed(failure) = &outcome {
            warn!(
                correlation_id = %ctx.correlation_id(),
                bucket = ctx.bucket(),
                key = ctx.key(),
                retryable = failure.is_retryable(),
                state = ?outcome.final_state(),
                error = %failure,
                duration_ms = started.elapsed().as_millis() as u64,
                "Commit failed"
            );
        }

        outcome
    }

    /// Query the index under the request deadline
    pub async fn precheck(
        &self,
        ctx: &ExecutionContext,
        deadline: Instant,
    ) -> Result<WriteIntent, QueryError> {
        let presence =
            tokio::time::timeout_at(deadline, self.index.exists(ctx.bucket(), ctx.key()))
                .await
                .map_err(|_| QueryError::Timeout)??;
        Ok(WriteIntent::from_presence(presence))
    }

    /// Commit through the port, retrying only what the policy allows
    pub async fn dispatch(
        &self,
        ctx: &ExecutionContext,
        intent: &WriteIntent,
        deadline: Instant,
    ) -> CommitResult {
        let mut attempts = 0u32;
        loop {
            attempts += 1;
            let result = self.commit_once(ctx, intent.replaces(), deadline).await;

            let reason = match result {
                Err(CommitFailure::Unavailable(reason)) if attempts < self.retry.max_attempts => {
                    reason
                }
                other => return other,
            };

            let delay = self.retry.next_delay(attempts);
            if Instant::now() + delay >= deadline {
                debug!(attempts, "No time left for another commit attempt");
                return Err(CommitFailure::Unavailable(reason));
            }

            warn!(
                correlation_id = %ctx.correlation_id(),
                attempts,
                delay_ms = delay.as_millis() as u64,
                reason = %reason,
                "Deal protocol unavailable, retrying commit"
            );
            tokio::time::sleep(delay).await;
        }
    }

    async fn commit_once(
        &self,
        ctx: &ExecutionContext,
        replaces: Option<&str>,
        deadline: Instant,
    ) -> CommitResult {
        match tokio::time::timeout_at(deadline, self.committer.commit(ctx, replaces, deadline)).await
        {
            Ok(result) => result,
            Err(_) => Err(CommitFailure::Ambiguous(
                "request deadline elapsed during commit".to_string(),
            )),
        }
    }

    /// Post-commit decision; pure
    pub fn classify(
        kind: WriteKind,
        etag: String,
        size: u64,
        result: CommitResult,
    ) -> DecisionOutcome {
        match result {
            Ok(receipt) => {
                let object = CommittedObject {
                    etag,
                    deal_id: receipt.deal_id,
                    content_cid: receipt.content_cid,
                    version: receipt.version,
                    size,
                };
                match kind {
                    WriteKind::Create => DecisionOutcome::Created(object),
                    WriteKind::Overwrite => DecisionOutcome::Overwritten(object),
                }
            }
            Err(failure) => DecisionOutcome::Failed(failure),
        }
    }

    async fn remember(&self, ctx: &ExecutionContext, object: &CommittedObject) {
        let entry = ObjectEntry {
            etag: object.etag.clone(),
            deal_id: object.deal_id.clone(),
            content_cid: object.content_cid.clone(),
            size: object.size,
            content_type: ctx.content_type().to_string(),
            version: object.version.clone(),
            committed_at: Utc::now(),
        };

        // The deal is durable already; a lost index write only affects the
        // next request's create/overwrite classification.
        if let Err(e) = self.index.record(ctx.bucket(), ctx.key(), entry).await {
            warn!(
                correlation_id = %ctx.correlation_id(),
                bucket = ctx.bucket(),
                key = ctx.key(),
                deal_id = %object.deal_id,
                error = %e,
                "Failed to record committed object"
            );
        }
    }
}
