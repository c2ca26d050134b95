//! # SFG MK20
//!
//! Deal-protocol layer of the S3-to-Filecoin gateway.
//!
//! This crate provides:
//! - **Client trait**: the three MK20 calls (propose, upload, status)
//! - **HTTP client**: reqwest-based client for a live MK20 endpoint
//! - **Memory client**: deduplicating in-process deal protocol for tests and local runs
//! - **Adapter**: [`Mk20Adapter`], the `sfg_core::DealCommitter` that drives a deal
//!   from proposal to the committed state under the request deadline
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │     sfg_core::DecisionEngine            │
//! ├─────────────────────────────────────────┤
//! │     Mk20Adapter (DealCommitter)         │
//! │  Proposing ─▶ Uploading ─▶ Awaiting     │
//! ├─────────────────────────────────────────┤
//! │           Mk20Client Trait              │
//! ├────────────────────┬────────────────────┤
//! │   HttpMk20Client   │  MemoryMk20Client  │
//! └────────────────────┴────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use sfg_mk20::{HttpMk20Client, Mk20Adapter, Mk20AdapterConfig, Mk20Config};
//!
//! let client = HttpMk20Client::new(Mk20Config::new("https://mk20.example.net"))?;
//! let adapter = Mk20Adapter::new(Arc::new(client), Mk20AdapterConfig::default());
//! let receipt = adapter.commit(&ctx, None, deadline).await?;
//! ```

pub mod adapter;
pub mod error;
pub mod http;
pub mod memory;
pub mod types;

pub use adapter::{CommitPhase, Mk20Adapter, Mk20AdapterConfig};
pub use error::{Mk20Error, Result};
pub use http::{HttpMk20Client, Mk20Config};
pub use memory::{Fault, MemoryMk20Client};
pub use types::{
    DealProposal, DealRecord, DealState, ProposalResponse, StatusChange, UploadResponse,
    UploadSource,
};

use async_trait::async_trait;

/// Trait for deal-protocol backends
///
/// Protocol plumbing only: implementations never retry and never interpret
/// S3 semantics.
#[async_trait]
pub trait Mk20Client: Send + Sync {
    /// Declare a deal for some content
    async fn propose(&self, proposal: &DealProposal) -> Result<ProposalResponse>;

    /// Stream the staged content for an accepted deal
    async fn upload(&self, deal_id: &str, source: &UploadSource) -> Result<UploadResponse>;

    /// Current state of a deal
    async fn status(&self, deal_id: &str) -> Result<DealRecord>;
}
