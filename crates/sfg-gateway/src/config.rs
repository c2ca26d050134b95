//! Gateway configuration

use serde::{Deserialize, Serialize};
use sfg_core::{RetryPolicy, StagerConfig, ValidationLimits};
use sfg_mk20::{DealState, Mk20AdapterConfig, Mk20Config};
use std::path::PathBuf;
use std::time::Duration;
use tokio::time::Instant;

/// Longest accepted end-to-end budget for one PUT
pub const MAX_REQUEST_TIMEOUT_SECS: u64 = 24 * 60 * 60;

/// Gateway server configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Directory for staged request bodies
    pub staging_dir: PathBuf,
    /// Read/write buffer size while staging (bytes)
    pub staging_chunk_size: usize,
    /// Largest accepted Content-Length (bytes)
    pub max_object_size: u64,
    /// End-to-end budget for one PUT, staging included
    pub request_timeout_secs: u64,
    /// Retry-After value on 503 responses
    pub retry_after_secs: u64,
    /// Commit attempts per request, including the first
    pub commit_attempts: u32,
    /// MK20 endpoint; the in-memory deal protocol is used when unset
    pub mk20_url: Option<String>,
    /// MK20 bearer token
    pub mk20_api_key: Option<String>,
    /// Deal profile sent with every proposal
    pub mk20_profile: String,
    /// Delay between deal status polls (milliseconds)
    pub mk20_poll_interval_ms: u64,
    /// Deal state that counts as committed
    pub commit_state: DealState,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 9000,
            staging_dir: std::env::temp_dir().join("sfg-staging"),
            staging_chunk_size: sfg_core::DEFAULT_STAGING_CHUNK_SIZE,
            max_object_size: sfg_core::DEFAULT_MAX_OBJECT_SIZE,
            request_timeout_secs: 300,
            retry_after_secs: 5,
            commit_attempts: 1,
            mk20_url: None,
            mk20_api_key: None,
            mk20_profile: "default".to_string(),
            mk20_poll_interval_ms: 2000,
            commit_state: DealState::Active,
        }
    }
}

impl GatewayConfig {
    /// Get the bind address
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Request budget, capped at [`MAX_REQUEST_TIMEOUT_SECS`]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.min(MAX_REQUEST_TIMEOUT_SECS))
    }

    /// Deadline for a request that starts now
    pub fn request_deadline(&self) -> Instant {
        let now = Instant::now();
        now.checked_add(self.request_timeout()).unwrap_or(now)
    }

    /// Reject settings the server cannot run with
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.request_timeout_secs == 0 || self.request_timeout_secs > MAX_REQUEST_TIMEOUT_SECS {
            anyhow::bail!(
                "request timeout must be between 1 and {MAX_REQUEST_TIMEOUT_SECS} seconds, got {}",
                self.request_timeout_secs
            );
        }
        Ok(())
    }

    pub fn validation_limits(&self) -> ValidationLimits {
        ValidationLimits {
            max_object_size: self.max_object_size,
        }
    }

    pub fn stager_config(&self) -> StagerConfig {
        StagerConfig::new(self.staging_dir.clone()).with_chunk_size(self.staging_chunk_size)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::default().with_max_attempts(self.commit_attempts)
    }

    pub fn adapter_config(&self) -> Mk20AdapterConfig {
        Mk20AdapterConfig {
            profile: self.mk20_profile.clone(),
            poll_interval: Duration::from_millis(self.mk20_poll_interval_ms),
            commit_state: self.commit_state,
        }
    }

    /// HTTP client settings, when an endpoint is configured
    pub fn mk20_client_config(&self) -> Option<Mk20Config> {
        let url = self.mk20_url.as_deref()?.trim();
        if url.is_empty() {
            return None;
        }

        let config = Mk20Config::new(url);
        Some(match &self.mk20_api_key {
            Some(key) if !key.is_empty() => config.with_api_key(key.clone()),
            _ => config,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = GatewayConfig::default();
        assert_eq!(config.bind_addr(), "0.0.0.0:9000");
        assert_eq!(config.request_timeout(), Duration::from_secs(300));
        assert_eq!(config.validation_limits().max_object_size, 5 * 1024 * 1024 * 1024);
        assert_eq!(config.retry_policy().max_attempts, 1);
        assert!(config.mk20_client_config().is_none());

        let adapter = config.adapter_config();
        assert_eq!(adapter.profile, "default");
        assert_eq!(adapter.poll_interval, Duration::from_secs(2));
        assert_eq!(adapter.commit_state, DealState::Active);
    }

    #[test]
    fn test_mk20_client_config() {
        let config = GatewayConfig {
            mk20_url: Some("https://mk20.example.net".into()),
            mk20_api_key: Some("secret".into()),
            ..Default::default()
        };
        let client = config.mk20_client_config().unwrap();
        assert_eq!(client.base_url, "https://mk20.example.net");
        assert_eq!(client.api_key.as_deref(), Some("secret"));

        let blank = GatewayConfig {
            mk20_url: Some("  ".into()),
            ..Default::default()
        };
        assert!(blank.mk20_client_config().is_none());
    }

    #[test]
    fn test_request_timeout_is_bounded() {
        let config = GatewayConfig {
            request_timeout_secs: u64::MAX,
            ..Default::default()
        };
        assert!(config.validate().is_err());
        assert_eq!(
            config.request_timeout(),
            Duration::from_secs(MAX_REQUEST_TIMEOUT_SECS)
        );
        assert!(config.request_deadline() > Instant::now());

        let zero = GatewayConfig {
            request_timeout_secs: 0,
            ..Default::default()
        };
        assert!(zero.validate().is_err());
        assert!(GatewayConfig::default().validate().is_ok());
    }

    #[test]
    fn test_commit_attempts_never_below_one() {
        let config = GatewayConfig {
            commit_attempts: 0,
            ..Default::default()
        };
        assert_eq!(config.retry_policy().max_attempts, 1);
    }
}
