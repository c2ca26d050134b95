//! # SFG Core
//!
//! The PUT pipeline of the S3-to-Filecoin gateway, free of any HTTP or
//! deal-protocol transport.
//!
//! This crate provides:
//! - **Request facts**: path-style bucket/key and header extraction
//! - **Validation**: method and Content-Length rules, typed rejections
//! - **Staging**: bounded streaming of the body to disk with running checksums
//! - **Translation**: assembly of the [`ExecutionContext`] handed to the commit path
//! - **Decisions**: create vs. overwrite, commit dispatch, final disposition
//!
//! ## Pipeline
//!
//! ```text
//! ┌──────────────┐   ┌───────────┐   ┌────────┐   ┌────────────┐
//! │ RequestFacts │──▶│ Validator │──▶│ Stager │──▶│ Translator │
//! └──────────────┘   └───────────┘   └────────┘   └─────┬──────┘
//!                                                       │ ExecutionContext
//!                    ┌────────────────────────────────── ▼ ─────┐
//!                    │              Decision Engine             │
//!                    │  precheck ─▶ DealCommitter ─▶ decide     │
//!                    └──────┬───────────────────────────────────┘
//!                           │ ObjectIndex (exists / record)
//! ```
//!
//! The two external collaborators, [`ObjectIndex`] and [`DealCommitter`], are
//! ports: the gateway hands in implementations, this crate never constructs
//! network clients itself.

pub mod checksum;
pub mod commit;
pub mod context;
pub mod engine;
pub mod error;
pub mod facts;
pub mod index;
pub mod outcome;
pub mod stage;
pub mod translate;
pub mod validate;

pub use checksum::{ContentChecksum, StreamingChecksum};
pub use commit::{CommitReceipt, CommitResult, DealCommitter};
pub use context::{CorrelationId, ExecutionContext};
pub use engine::{DecisionEngine, EngineState, RetryPolicy, WriteIntent, WriteKind};
pub use error::{CommitFailure, ErrorKind, QueryError, Rejection, StagingError};
pub use facts::{HeaderList, RequestFacts};
pub use index::{MemoryObjectIndex, ObjectEntry, ObjectIndex, Presence};
pub use outcome::{CommittedObject, DecisionOutcome, Disposition};
pub use stage::{StagedData, Stager, StagerConfig};
pub use translate::translate;
pub use validate::{validate, validate_with, ValidateResult, ValidationLimits};

/// Default staging write buffer (256 KB)
pub const DEFAULT_STAGING_CHUNK_SIZE: usize = 256 * 1024;

/// Default maximum object size (5 GB, the S3 single-PUT ceiling)
pub const DEFAULT_MAX_OBJECT_SIZE: u64 = 5 * 1024 * 1024 * 1024;
