//! # SFG Gateway
//!
//! S3-compatible PUT gateway that commits every upload as a Filecoin MK20
//! storage deal.
//!
//! This crate provides:
//! - **HTTP surface**: `PUT /{bucket}/{key}` plus a liveness check
//! - **Response synthesis**: outcome and error to status, headers and body
//! - **Wiring**: configuration, object index and deal committer selection
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                   HTTP Clients                      │
//! │           (boto3, AWS SDK, curl, etc.)              │
//! └─────────────────────────┬───────────────────────────┘
//!                           │
//! ┌─────────────────────────▼───────────────────────────┐
//! │                    SFG Gateway                      │
//! ├─────────────────────────────────────────────────────┤
//! │  Request ID │ Access Log │ Ingress (RequestFacts)   │
//! ├─────────────────────────────────────────────────────┤
//! │                    sfg-core                         │
//! │  Validate ▶ Stage ▶ Translate ▶ Decision Engine     │
//! ├─────────────────────────────────────────────────────┤
//! │                    sfg-mk20                         │
//! │        Mk20Adapter ▶ HTTP / in-memory client        │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod respond;
pub mod routes;
pub mod server;
pub mod state;

pub use config::GatewayConfig;
pub use error::{ApiError, ErrorCode};
pub use server::{run_server, run_server_with_shutdown, serve};
pub use state::AppState;
