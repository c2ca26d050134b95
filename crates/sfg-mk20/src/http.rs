//! MK20 HTTP client
//!
//! Three endpoints, relative to the configured base URL:
//! - `POST /store` declares a deal for some content
//! - `POST /upload` streams the content as multipart (`file`, `storeId`)
//! - `GET /status/{storeId}` reports where the deal is

use crate::error::{Mk20Error, Result};
use crate::types::{DealProposal, DealRecord, ProposalResponse, UploadResponse, UploadSource};
use crate::Mk20Client;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Response};
use std::time::Duration;
use tracing::{debug, instrument};

/// Configuration for the MK20 HTTP client
#[derive(Clone, Debug)]
pub struct Mk20Config {
    /// Deal protocol endpoint (e.g., "https://mk20.example.net/api")
    pub base_url: String,
    /// Bearer token; no Authorization header when unset
    pub api_key: Option<String>,
    /// Timeout for the JSON calls (the upload is bounded by the request deadline)
    pub timeout: Duration,
    /// TCP connect timeout
    pub connect_timeout: Duration,
}

impl Mk20Config {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: None,
            timeout: Duration::from_secs(60),
            connect_timeout: Duration::from_secs(10),
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Deal protocol client speaking HTTP
#[derive(Clone)]
pub struct HttpMk20Client {
    client: Client,
    config: Mk20Config,
}

impl HttpMk20Client {
    pub fn new(config: Mk20Config) -> Result<Self> {
        if config.base_url.trim().is_empty() {
            return Err(Mk20Error::Configuration("MK20 base URL is empty".to_string()));
        }

        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| Mk20Error::Configuration(e.to_string()))?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &Mk20Config {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.config.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let response = self.authorize(request).send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        debug!(status = status.as_u16(), body = %body, "MK20 request failed");
        Err(Mk20Error::from_status(status.as_u16(), body))
    }
}

#[async_trait]
impl Mk20Client for HttpMk20Client {
    #[instrument(skip(self, proposal), fields(name = %proposal.name, size = proposal.size))]
    async fn propose(&self, proposal: &DealProposal) -> Result<ProposalResponse> {
        let request = self
            .client
            .post(self.url("/store"))
            .timeout(self.config.timeout)
            .json(proposal);

        let response = self.send(request).await?;
        response
            .json()
            .await
            .map_err(|e| Mk20Error::Deserialization(e.to_string()))
    }

    #[instrument(skip(self, source), fields(size = source.size))]
    async fn upload(&self, deal_id: &str, source: &UploadSource) -> Result<UploadResponse> {
        let file = tokio::fs::File::open(&source.path).await?;
        let part = Part::stream_with_length(reqwest::Body::from(file), source.size)
            .file_name(source.file_name.clone())
            .mime_str("application/octet-stream")?;
        let form = Form::new()
            .part("file", part)
            .text("storeId", deal_id.to_string());

        let request = self.client.post(self.url("/upload")).multipart(form);
        let response = self.send(request).await?;

        // Some deployments answer an upload with an empty body
        let body = response.bytes().await?;
        if body.is_empty() {
            return Ok(UploadResponse::default());
        }
        serde_json::from_slice(&body).map_err(|e| Mk20Error::Deserialization(e.to_string()))
    }

    #[instrument(skip(self))]
    async fn status(&self, deal_id: &str) -> Result<DealRecord> {
        let path = format!("/status/{}", urlencoding::encode(deal_id));
        let request = self
            .client
            .get(self.url(&path))
            .timeout(self.config.timeout);

        let response = self.send(request).await?;
        response
            .json()
            .await
            .map_err(|e| Mk20Error::Deserialization(e.to_string()))
    }
}
