//! MK20 commit adapter
//!
//! Implements `sfg_core::DealCommitter` on top of any [`Mk20Client`]:
//!
//! 1. **Proposing**: `POST /store` with the content CID, checksum and size
//! 2. **Uploading**: stream the staged file, unless the deal already has it
//! 3. **Awaiting**: poll status until the commit state or FAILED
//!
//! Every round trip is bounded by the request deadline. Failures before the
//! proposal is accepted cannot have left anything behind remotely; after
//! acceptance, anything short of a definitive answer is ambiguous.

use crate::error::Mk20Error;
use crate::types::{DealProposal, DealRecord, DealState, UploadSource};
use crate::Mk20Client;
use async_trait::async_trait;
use sfg_core::{CommitFailure, CommitReceipt, CommitResult, CorrelationId, DealCommitter, ExecutionContext};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Adapter settings
#[derive(Clone, Debug)]
pub struct Mk20AdapterConfig {
    /// Deal profile sent with every proposal
    pub profile: String,
    /// Delay between status polls
    pub poll_interval: Duration,
    /// Deal state that counts as committed
    pub commit_state: DealState,
}

impl Default for Mk20AdapterConfig {
    fn default() -> Self {
        Self {
            profile: "default".to_string(),
            poll_interval: Duration::from_secs(2),
            commit_state: DealState::Active,
        }
    }
}

impl Mk20AdapterConfig {
    pub fn validate(&self) -> crate::Result<()> {
        if self.commit_state == DealState::Failed {
            return Err(Mk20Error::Configuration(
                "FAILED cannot be the commit state".to_string(),
            ));
        }
        if self.poll_interval.is_zero() {
            return Err(Mk20Error::Configuration(
                "poll interval must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Where a commit attempt currently is
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommitPhase {
    Proposing,
    Uploading,
    Awaiting,
}

/// Commits staged content as MK20 deals
#[derive(Clone)]
pub struct Mk20Adapter {
    client: Arc<dyn Mk20Client>,
    config: Mk20AdapterConfig,
}

impl Mk20Adapter {
    pub fn new(client: Arc<dyn Mk20Client>, config: Mk20AdapterConfig) -> Self {
        Self { client, config }
    }

    pub fn config(&self) -> &Mk20AdapterConfig {
        &self.config
    }

    async fn run(
        &self,
        ctx: &ExecutionContext,
        replaces: Option<&str>,
        deadline: Instant,
        flight: &mut InFlight,
    ) -> CommitResult {
        let started = Instant::now();
        let proposal = DealProposal::from_context(ctx, &self.config.profile, replaces);

        let accepted = match tokio::time::timeout_at(deadline, self.client.propose(&proposal)).await
        {
            Ok(Ok(accepted)) => accepted,
            Ok(Err(e)) => return Err(before_acceptance(e, started.elapsed())),
            Err(_) => return Err(CommitFailure::Timeout(started.elapsed())),
        };

        let deal_id = accepted.deal_id.clone();
        flight.deal_id = Some(deal_id.clone());
        info!(
            correlation_id = %ctx.correlation_id(),
            deal_id = %deal_id,
            idempotent = accepted.idempotent,
            "Deal proposal accepted"
        );

        if accepted.uploaded {
            debug!(deal_id = %deal_id, "Deal already holds the content, skipping upload");
        } else {
            flight.phase = CommitPhase::Uploading;
            let source = UploadSource::from_context(ctx);
            match tokio::time::timeout_at(deadline, self.client.upload(&deal_id, &source)).await {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => return Err(after_acceptance(&deal_id, CommitPhase::Uploading, e)),
                Err(_) => {
                    return Err(CommitFailure::Ambiguous(format!(
                        "deal {deal_id}: request deadline elapsed while uploading"
                    )))
                }
            }
        }

        flight.phase = CommitPhase::Awaiting;
        let record = self.await_commit(&deal_id, deadline).await?;

        Ok(CommitReceipt {
            deal_id,
            content_cid: record
                .cid
                .or(accepted.cid)
                .unwrap_or(proposal.content_cid),
            version: record.version,
        })
    }

    /// Poll until the deal reaches the commit state
    async fn await_commit(
        &self,
        deal_id: &str,
        deadline: Instant,
    ) -> Result<DealRecord, CommitFailure> {
        let target = self.config.commit_state;
        let mut last: Option<DealState> = None;

        loop {
            let record = match tokio::time::timeout_at(deadline, self.client.status(deal_id)).await
            {
                Ok(Ok(record)) => record,
                Ok(Err(e)) => return Err(after_acceptance(deal_id, CommitPhase::Awaiting, e)),
                Err(_) => return Err(not_reached(deal_id, target, last)),
            };

            if let Some(previous) = last {
                if !previous.can_advance_to(record.status) {
                    let illegal = Mk20Error::IllegalTransition {
                        from: previous,
                        to: record.status,
                    };
                    return Err(CommitFailure::Ambiguous(format!("deal {deal_id}: {illegal}")));
                }
            }
            if last != Some(record.status) {
                debug!(deal_id = %deal_id, status = %record.status, "Deal status");
            }

            if record.status == DealState::Failed {
                let reason = record
                    .error
                    .unwrap_or_else(|| "no reason given".to_string());
                return Err(CommitFailure::DealFailed(format!("deal {deal_id}: {reason}")));
            }
            if record.status.has_reached(target) {
                return Ok(record);
            }

            last = Some(record.status);
            let pause = tokio::time::sleep(self.config.poll_interval);
            if tokio::time::timeout_at(deadline, pause).await.is_err() {
                return Err(not_reached(deal_id, target, last));
            }
        }
    }
}

#[async_trait]
impl DealCommitter for Mk20Adapter {
    async fn commit(
        &self,
        ctx: &ExecutionContext,
        replaces: Option<&str>,
        deadline: Instant,
    ) -> CommitResult {
        let mut flight = InFlight::new(ctx.correlation_id());
        let result = self.run(ctx, replaces, deadline, &mut flight).await;
        flight.settled = true;
        result
    }
}

/// Logs when a commit future is dropped before producing an outcome
struct InFlight {
    correlation_id: CorrelationId,
    deal_id: Option<String>,
    phase: CommitPhase,
    settled: bool,
}

impl InFlight {
    fn new(correlation_id: CorrelationId) -> Self {
        Self {
            correlation_id,
            deal_id: None,
            phase: CommitPhase::Proposing,
            settled: false,
        }
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        match &self.deal_id {
            Some(deal_id) => warn!(
                correlation_id = %self.correlation_id,
                deal_id = %deal_id,
                phase = ?self.phase,
                "Commit abandoned after the deal was accepted; it may still complete remotely"
            ),
            None => debug!(
                correlation_id = %self.correlation_id,
                "Commit abandoned before the proposal was accepted"
            ),
        }
    }
}

fn before_acceptance(err: Mk20Error, elapsed: Duration) -> CommitFailure {
    match err {
        Mk20Error::Rejected(reason)
        | Mk20Error::NotFound(reason)
        | Mk20Error::Serialization(reason)
        | Mk20Error::Configuration(reason) => CommitFailure::Rejected(reason),
        Mk20Error::Http { status, body } => {
            CommitFailure::Rejected(format!("status {status}: {body}"))
        }
        Mk20Error::QuotaExceeded(reason) => CommitFailure::QuotaExceeded(reason),
        Mk20Error::ContentMismatch(reason) => CommitFailure::MalformedContent(reason),
        Mk20Error::DealFailed(reason) => CommitFailure::DealFailed(reason),
        Mk20Error::Timeout(_) => CommitFailure::Timeout(elapsed),
        Mk20Error::Unavailable(reason) | Mk20Error::Connection(reason) => {
            CommitFailure::Unavailable(reason)
        }
        Mk20Error::Io(e) => CommitFailure::Unavailable(e.to_string()),
        // The proposal reached the server but the answer was unreadable
        e @ (Mk20Error::Deserialization(_) | Mk20Error::IllegalTransition { .. }) => {
            CommitFailure::Ambiguous(e.to_string())
        }
    }
}

fn after_acceptance(deal_id: &str, phase: CommitPhase, err: Mk20Error) -> CommitFailure {
    match (phase, err) {
        (CommitPhase::Uploading, Mk20Error::ContentMismatch(reason))
        | (CommitPhase::Uploading, Mk20Error::Rejected(reason)) => {
            CommitFailure::MalformedContent(format!("deal {deal_id}: {reason}"))
        }
        (_, Mk20Error::QuotaExceeded(reason)) => {
            CommitFailure::QuotaExceeded(format!("deal {deal_id}: {reason}"))
        }
        (_, Mk20Error::DealFailed(reason)) => {
            CommitFailure::DealFailed(format!("deal {deal_id}: {reason}"))
        }
        (phase, other) => CommitFailure::Ambiguous(format!("deal {deal_id} ({phase:?}): {other}")),
    }
}

fn not_reached(deal_id: &str, target: DealState, last: Option<DealState>) -> CommitFailure {
    let last = last.map(|s| s.to_string()).unwrap_or_else(|| "unknown".to_string());
    CommitFailure::Ambiguous(format!(
        "deal {deal_id} not {target} before the request deadline (last seen {last})"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{Fault, MemoryMk20Client};
    use bytes::Bytes;
    use futures::stream;
    use sfg_core::{validate, HeaderList, RequestFacts, Stager, StagerConfig};

    async fn context(dir: &tempfile::TempDir, body: &'static [u8]) -> ExecutionContext {
        let len = body.len().to_string();
        let headers: HeaderList = [("Content-Length", len.as_str()), ("Content-Type", "text/plain")]
            .into_iter()
            .collect();
        let facts = RequestFacts::extract("PUT", "/bucket1/docs/obj1", headers).unwrap();
        let validated = validate(&facts).unwrap();
        let staged = Stager::new(StagerConfig::new(dir.path()))
            .stage(
                stream::iter(vec![Ok::<_, std::io::Error>(Bytes::from_static(body))]),
                body.len() as u64,
                far_deadline(),
            )
            .await
            .unwrap();
        sfg_core::translate(&facts, &validated, staged)
    }

    fn far_deadline() -> Instant {
        Instant::now() + Duration::from_secs(30)
    }

    fn adapter(client: &MemoryMk20Client) -> Mk20Adapter {
        Mk20Adapter::new(
            Arc::new(client.clone()),
            Mk20AdapterConfig {
                poll_interval: Duration::from_millis(1),
                ..Default::default()
            },
        )
    }

    #[tokio::test]
    async fn test_commit_reaches_active() {
        let dir = tempfile::tempdir().unwrap();
        let client = MemoryMk20Client::retaining_content();
        let ctx = context(&dir, b"hello").await;

        let receipt = adapter(&client)
            .commit(&ctx, None, far_deadline())
            .await
            .unwrap();

        assert_eq!(receipt.content_cid, ctx.checksum().content_cid().to_string());
        let record = client.deal(&receipt.deal_id).unwrap();
        assert_eq!(record.status, DealState::Active);
        assert_eq!(client.content(&receipt.deal_id).unwrap(), Bytes::from_static(b"hello"));
        assert_eq!(client.uploads(), 1);
    }

    #[tokio::test]
    async fn test_same_content_commits_idempotently() {
        let dir = tempfile::tempdir().unwrap();
        let client = MemoryMk20Client::new();
        let adapter = adapter(&client);

        let first = adapter
            .commit(&context(&dir, b"hello").await, None, far_deadline())
            .await
            .unwrap();
        let second = adapter
            .commit(
                &context(&dir, b"hello").await,
                Some(&first.deal_id),
                far_deadline(),
            )
            .await
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(client.uploads(), 1);
        assert_eq!(client.deal_count(), 1);
    }

    #[tokio::test]
    async fn test_commit_state_is_configurable() {
        let dir = tempfile::tempdir().unwrap();
        let client = MemoryMk20Client::new();
        let adapter = Mk20Adapter::new(
            Arc::new(client.clone()),
            Mk20AdapterConfig {
                poll_interval: Duration::from_millis(1),
                commit_state: DealState::Pending,
                ..Default::default()
            },
        );

        let receipt = adapter
            .commit(&context(&dir, b"hello").await, None, far_deadline())
            .await
            .unwrap();
        assert_eq!(client.deal(&receipt.deal_id).unwrap().status, DealState::Pending);
    }

    #[tokio::test]
    async fn test_failures_before_acceptance() {
        let dir = tempfile::tempdir().unwrap();
        let client = MemoryMk20Client::new();
        let adapter = adapter(&client);
        let ctx = context(&dir, b"hello").await;

        client.inject(Fault::RejectProposal("insufficient terms".into()));
        let err = adapter.commit(&ctx, None, far_deadline()).await.unwrap_err();
        assert_eq!(err, CommitFailure::Rejected("insufficient terms".into()));
        assert!(!err.is_retryable());

        client.inject(Fault::QuotaExceeded("full".into()));
        let err = adapter.commit(&ctx, None, far_deadline()).await.unwrap_err();
        assert_eq!(err, CommitFailure::QuotaExceeded("full".into()));

        client.inject(Fault::ProposeUnavailable("overloaded".into()));
        let err = adapter.commit(&ctx, None, far_deadline()).await.unwrap_err();
        assert_eq!(err, CommitFailure::Unavailable("overloaded".into()));
        assert!(err.is_retryable());

        assert_eq!(client.deal_count(), 0);
    }

    #[tokio::test]
    async fn test_upload_rejection_is_malformed_content() {
        let dir = tempfile::tempdir().unwrap();
        let client = MemoryMk20Client::new();
        client.inject(Fault::RejectUpload("size mismatch".into()));

        let err = adapter(&client)
            .commit(&context(&dir, b"hello").await, None, far_deadline())
            .await
            .unwrap_err();
        assert!(matches!(err, CommitFailure::MalformedContent(_)));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_failed_deal_is_permanent() {
        let dir = tempfile::tempdir().unwrap();
        let client = MemoryMk20Client::new();
        client.inject(Fault::FailDeal("sector faulted".into()));

        let err = adapter(&client)
            .commit(&context(&dir, b"hello").await, None, far_deadline())
            .await
            .unwrap_err();
        assert!(matches!(err, CommitFailure::DealFailed(reason) if reason.contains("sector faulted")));
    }

    #[tokio::test]
    async fn test_status_outage_after_acceptance_is_ambiguous() {
        let dir = tempfile::tempdir().unwrap();
        let client = MemoryMk20Client::new();
        client.inject(Fault::StatusUnavailable("502".into()));

        let err = adapter(&client)
            .commit(&context(&dir, b"hello").await, None, far_deadline())
            .await
            .unwrap_err();
        assert!(matches!(err, CommitFailure::Ambiguous(_)));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_deadline_while_awaiting_is_ambiguous() {
        let dir = tempfile::tempdir().unwrap();
        let client = MemoryMk20Client::new();
        client.set_stalled(true);
        let ctx = context(&dir, b"hello").await;

        let err = adapter(&client)
            .commit(&ctx, None, Instant::now() + Duration::from_millis(100))
            .await
            .unwrap_err();
        assert!(matches!(err, CommitFailure::Ambiguous(reason) if reason.contains("UPLOADED")));
    }

    #[tokio::test]
    async fn test_dropped_commit_leaves_remote_deal() {
        let dir = tempfile::tempdir().unwrap();
        let client = MemoryMk20Client::new();
        client.set_stalled(true);
        let ctx = context(&dir, b"hello").await;
        let adapter = adapter(&client);

        let abandoned = tokio::time::timeout(
            Duration::from_millis(50),
            adapter.commit(&ctx, None, far_deadline()),
        )
        .await;
        assert!(abandoned.is_err());

        // The remote side accepted and holds the content
        assert_eq!(client.deal_count(), 1);
        assert_eq!(client.uploads(), 1);

        // A retry after the outage dedupes onto the same deal
        client.set_stalled(false);
        let receipt = adapter.commit(&ctx, None, far_deadline()).await.unwrap();
        assert_eq!(client.deal(&receipt.deal_id).unwrap().status, DealState::Active);
        assert_eq!(client.deal_count(), 1);
    }

    #[test]
    fn test_config_validation() {
        assert!(Mk20AdapterConfig::default().validate().is_ok());
        let failed = Mk20AdapterConfig {
            commit_state: DealState::Failed,
            ..Default::default()
        };
        assert!(failed.validate().is_err());
    }
}
