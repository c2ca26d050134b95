//! SFG Gateway - S3 PUT to Filecoin MK20 deals

use anyhow::Context;
use clap::Parser;
use sfg_gateway::{run_server_with_shutdown, GatewayConfig};
use sfg_mk20::DealState;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "sfg")]
#[command(about = "S3-compatible PUT gateway that stores objects as Filecoin MK20 deals")]
#[command(version)]
struct Args {
    /// Host to bind to
    #[arg(short = 'H', long, default_value = "0.0.0.0", env = "SFG_HOST")]
    host: String,

    /// Port to listen on
    #[arg(short, long, default_value = "9000", env = "SFG_PORT")]
    port: u16,

    /// Directory for staged request bodies (defaults to <tmp>/sfg-staging)
    #[arg(long, env = "SFG_STAGING_DIR")]
    staging_dir: Option<PathBuf>,

    /// Staging buffer size in bytes
    #[arg(long, default_value_t = sfg_core::DEFAULT_STAGING_CHUNK_SIZE, env = "SFG_STAGING_CHUNK_SIZE")]
    staging_chunk_size: usize,

    /// Largest accepted object in bytes
    #[arg(long, default_value_t = sfg_core::DEFAULT_MAX_OBJECT_SIZE, env = "SFG_MAX_OBJECT_SIZE")]
    max_object_size: u64,

    /// End-to-end budget for one PUT in seconds
    #[arg(long, default_value = "300", env = "SFG_REQUEST_TIMEOUT_SECS")]
    request_timeout_secs: u64,

    /// Retry-After value on 503 responses
    #[arg(long, default_value = "5", env = "SFG_RETRY_AFTER_SECS")]
    retry_after_secs: u64,

    /// Commit attempts per request, including the first
    #[arg(long, default_value = "1", env = "SFG_COMMIT_ATTEMPTS")]
    commit_attempts: u32,

    /// MK20 API base URL (in-memory deal protocol when unset)
    #[arg(long, env = "MK20_BASE_URL")]
    mk20_url: Option<String>,

    /// MK20 bearer token
    #[arg(long, env = "MK20_API_KEY")]
    mk20_api_key: Option<String>,

    /// Deal profile sent with every proposal
    #[arg(long, default_value = "default", env = "MK20_PROFILE")]
    mk20_profile: String,

    /// Delay between deal status polls in milliseconds
    #[arg(long, default_value = "2000", env = "MK20_POLL_INTERVAL_MS")]
    mk20_poll_interval_ms: u64,

    /// Deal state that counts as committed (e.g. ACTIVE, UPLOADED)
    #[arg(long, default_value = "ACTIVE", env = "MK20_COMMIT_STATE")]
    commit_state: String,

    /// Enable debug logging
    #[arg(short, long, env = "SFG_DEBUG")]
    debug: bool,

    /// Emit logs as JSON lines
    #[arg(long, env = "SFG_LOG_JSON")]
    log_json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Setup logging
    let log_level = if args.debug { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("sfg_gateway={log_level},sfg_core={log_level},sfg_mk20={log_level},tower_http=debug")
            .into()
    });
    let registry = tracing_subscriber::registry().with(filter);
    if args.log_json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    let commit_state: DealState = args
        .commit_state
        .parse()
        .context("invalid MK20_COMMIT_STATE")?;

    tracing::info!("Starting SFG gateway on {}:{}", args.host, args.port);

    let defaults = GatewayConfig::default();
    let config = GatewayConfig {
        host: args.host,
        port: args.port,
        staging_dir: args.staging_dir.unwrap_or(defaults.staging_dir),
        staging_chunk_size: args.staging_chunk_size,
        max_object_size: args.max_object_size,
        request_timeout_secs: args.request_timeout_secs,
        retry_after_secs: args.retry_after_secs,
        commit_attempts: args.commit_attempts,
        mk20_url: args.mk20_url,
        mk20_api_key: args.mk20_api_key,
        mk20_profile: args.mk20_profile,
        mk20_poll_interval_ms: args.mk20_poll_interval_ms,
        commit_state,
    };

    run_server_with_shutdown(config, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for ctrl-c: {e}");
            std::future::pending::<()>().await;
        }
    })
    .await
}
