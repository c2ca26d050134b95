//! In-memory deal protocol for testing and local runs
//!
//! Deals dedupe on content CID, uploads are verified against the proposal,
//! and each status poll advances a deal one step along
//! `UPLOADED → DEAL_CREATING → PENDING → SEALING → ACTIVE`.
//!
//! Uploads are hashed in fixed-size chunks straight from the staging file.
//! Only the record is kept per deal; the bytes themselves are kept only by a
//! client built with [`MemoryMk20Client::retaining_content`].

use crate::error::{Mk20Error, Result};
use crate::types::{
    DealProposal, DealRecord, DealState, ProposalResponse, UploadResponse, UploadSource,
};
use crate::Mk20Client;
use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tracing::debug;

/// Read size while verifying an upload
const VERIFY_CHUNK_SIZE: usize = 64 * 1024;

/// A scripted failure, consumed by the first matching call
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Fault {
    /// Next proposal is refused
    RejectProposal(String),
    /// Next proposal hits the quota
    QuotaExceeded(String),
    /// Next proposal finds the service unavailable
    ProposeUnavailable(String),
    /// Next upload fails verification
    RejectUpload(String),
    /// Next status poll finds the service unavailable
    StatusUnavailable(String),
    /// Next status poll moves the deal to FAILED
    FailDeal(String),
}

impl Fault {
    fn operation(&self) -> Operation {
        match self {
            Fault::RejectProposal(_) | Fault::QuotaExceeded(_) | Fault::ProposeUnavailable(_) => {
                Operation::Propose
            }
            Fault::RejectUpload(_) => Operation::Upload,
            Fault::StatusUnavailable(_) | Fault::FailDeal(_) => Operation::Status,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Operation {
    Propose,
    Upload,
    Status,
}

struct MemoryDeal {
    proposal: DealProposal,
    record: DealRecord,
    uploaded: bool,
    content: Option<Bytes>,
}

struct ReceivedUpload {
    size: u64,
    checksum: String,
    content: Option<Bytes>,
}

/// An in-memory MK20 deal protocol
#[derive(Clone, Default)]
pub struct MemoryMk20Client {
    deals: Arc<DashMap<String, MemoryDeal>>,
    by_cid: Arc<DashMap<String, String>>,
    faults: Arc<Mutex<VecDeque<Fault>>>,
    stalled: Arc<AtomicBool>,
    proposals: Arc<AtomicU64>,
    uploads: Arc<AtomicU64>,
    retain_content: bool,
}

impl MemoryMk20Client {
    pub fn new() -> Self {
        Self::default()
    }

    /// A client that also keeps every uploaded body, for inspection in tests
    pub fn retaining_content() -> Self {
        Self {
            retain_content: true,
            ..Self::default()
        }
    }

    /// Queue a failure for a later call
    pub fn inject(&self, fault: Fault) {
        self.faults.lock().push_back(fault);
    }

    /// While stalled, status polls never advance a deal
    pub fn set_stalled(&self, stalled: bool) {
        self.stalled.store(stalled, Ordering::SeqCst);
    }

    /// Number of proposals received, including rejected ones
    pub fn proposals(&self) -> u64 {
        self.proposals.load(Ordering::SeqCst)
    }

    /// Number of uploads accepted
    pub fn uploads(&self) -> u64 {
        self.uploads.load(Ordering::SeqCst)
    }

    pub fn deal_count(&self) -> usize {
        self.deals.len()
    }

    /// Snapshot of a deal record
    pub fn deal(&self, deal_id: &str) -> Option<DealRecord> {
        self.deals.get(deal_id).map(|deal| deal.record.clone())
    }

    /// Bytes received for a deal; `None` unless built with [`Self::retaining_content`]
    pub fn content(&self, deal_id: &str) -> Option<Bytes> {
        self.deals.get(deal_id).and_then(|deal| deal.content.clone())
    }

    /// Hash the staged file chunk by chunk
    async fn read_upload(&self, source: &UploadSource) -> Result<ReceivedUpload> {
        let mut file = tokio::fs::File::open(&source.path).await?;
        let mut hasher = blake3::Hasher::new();
        let mut buf = vec![0u8; VERIFY_CHUNK_SIZE];
        let mut size = 0u64;
        let mut content = self.retain_content.then(Vec::new);

        loop {
            let n = file.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
            size += n as u64;
            if let Some(content) = content.as_mut() {
                content.extend_from_slice(&buf[..n]);
            }
        }

        Ok(ReceivedUpload {
            size,
            checksum: hasher.finalize().to_hex().to_string(),
            content: content.map(Bytes::from),
        })
    }

    fn take_fault(&self, operation: Operation) -> Option<Fault> {
        let mut faults = self.faults.lock();
        let position = faults.iter().position(|f| f.operation() == operation)?;
        faults.remove(position)
    }
}

#[async_trait]
impl Mk20Client for MemoryMk20Client {
    async fn propose(&self, proposal: &DealProposal) -> Result<ProposalResponse> {
        self.proposals.fetch_add(1, Ordering::SeqCst);

        match self.take_fault(Operation::Propose) {
            Some(Fault::RejectProposal(reason)) => return Err(Mk20Error::Rejected(reason)),
            Some(Fault::QuotaExceeded(reason)) => return Err(Mk20Error::QuotaExceeded(reason)),
            Some(Fault::ProposeUnavailable(reason)) => return Err(Mk20Error::Unavailable(reason)),
            _ => {}
        }

        // One live deal per content CID
        if let Some(existing) = self.by_cid.get(&proposal.content_cid) {
            let deal_id = existing.value().clone();
            drop(existing);
            if let Some(deal) = self.deals.get(&deal_id) {
                if deal.record.status != DealState::Failed {
                    debug!(deal_id = %deal_id, cid = %proposal.content_cid, "Returning existing deal");
                    return Ok(ProposalResponse {
                        deal_id,
                        cid: Some(proposal.content_cid.clone()),
                        uploaded: deal.uploaded,
                        idempotent: true,
                    });
                }
            }
        }

        let deal_id = uuid::Uuid::new_v4().to_string();
        let record = DealRecord::new(
            deal_id.clone(),
            Some(proposal.content_cid.clone()),
            DealState::Init,
        );
        self.deals.insert(
            deal_id.clone(),
            MemoryDeal {
                proposal: proposal.clone(),
                record,
                uploaded: false,
                content: None,
            },
        );
        self.by_cid
            .insert(proposal.content_cid.clone(), deal_id.clone());

        debug!(deal_id = %deal_id, name = %proposal.name, size = proposal.size, "Deal proposed");
        Ok(ProposalResponse {
            deal_id,
            cid: Some(proposal.content_cid.clone()),
            uploaded: false,
            idempotent: false,
        })
    }

    async fn upload(&self, deal_id: &str, source: &UploadSource) -> Result<UploadResponse> {
        if !self.deals.contains_key(deal_id) {
            return Err(Mk20Error::NotFound(format!("deal {deal_id}")));
        }
        if let Some(Fault::RejectUpload(reason)) = self.take_fault(Operation::Upload) {
            return Err(Mk20Error::ContentMismatch(reason));
        }

        let received = self.read_upload(source).await?;

        let mut deal = self
            .deals
            .get_mut(deal_id)
            .ok_or_else(|| Mk20Error::NotFound(format!("deal {deal_id}")))?;

        if deal.uploaded {
            return Ok(UploadResponse {
                cid: deal.record.cid.clone(),
                status: Some(deal.record.status),
            });
        }

        if received.size != deal.proposal.size || source.size != deal.proposal.size {
            return Err(Mk20Error::ContentMismatch(format!(
                "expected {} bytes, received {}",
                deal.proposal.size, received.size
            )));
        }
        let checksum = received.checksum;
        if checksum != deal.proposal.checksum {
            return Err(Mk20Error::ContentMismatch(format!(
                "checksum {checksum} does not match proposal"
            )));
        }

        deal.record.push_status(DealState::Uploading)?;
        deal.record.push_status(DealState::Uploaded)?;
        deal.uploaded = true;
        deal.content = received.content;
        self.uploads.fetch_add(1, Ordering::SeqCst);

        Ok(UploadResponse {
            cid: deal.record.cid.clone(),
            status: Some(deal.record.status),
        })
    }

    async fn status(&self, deal_id: &str) -> Result<DealRecord> {
        let fault = self.take_fault(Operation::Status);
        if let Some(Fault::StatusUnavailable(reason)) = &fault {
            return Err(Mk20Error::Unavailable(reason.clone()));
        }

        let mut deal = self
            .deals
            .get_mut(deal_id)
            .ok_or_else(|| Mk20Error::NotFound(format!("deal {deal_id}")))?;

        if let Some(Fault::FailDeal(reason)) = fault {
            if !deal.record.status.is_terminal() {
                deal.record.push_status(DealState::Failed)?;
                deal.record.error = Some(reason);
            }
        } else if !self.stalled.load(Ordering::SeqCst)
            && deal.record.status.has_reached(DealState::Uploaded)
        {
            if let Some(next) = deal.record.status.successor() {
                deal.record.push_status(next)?;
            }
        }

        Ok(deal.record.clone())
    }
}
