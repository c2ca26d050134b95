//! Object PUT handler: runs one request through the pipeline
//!
//! extract → validate → stage → translate → decide/commit → respond

use crate::middleware::RequestId;
use crate::respond;
use crate::{ApiError, AppState};
use axum::{
    extract::{Request, State},
    http::{HeaderMap, Method, Uri},
    response::Response,
};
use sfg_core::{translate, validate_with, CorrelationId, HeaderList, RequestFacts};
use std::sync::Arc;
use tracing::{debug, instrument};

/// Every request that is not a health check lands here
#[instrument(skip_all, fields(method = %request.method(), path = %request.uri().path()))]
pub async fn object_request(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Result<Response, ApiError> {
    let deadline = state.config.request_deadline();
    let (parts, body) = request.into_parts();

    let facts = request_facts(&parts.method, &parts.uri, &parts.headers)?;
    let validated = validate_with(&facts, &state.validation_limits())?;

    debug!(
        bucket = facts.bucket(),
        key = facts.key(),
        content_length = validated.content_length(),
        "staging request body"
    );
    let staged = state
        .stager
        .stage(body.into_data_stream(), validated.content_length(), deadline)
        .await?;
    staged.verify_content_md5(validated.content_md5())?;

    let mut ctx = translate(&facts, &validated, staged);
    if let Some(RequestId(id)) = parts.extensions.get::<RequestId>() {
        ctx = ctx.with_correlation_id(CorrelationId::from(*id));
    }

    let outcome = state.engine.execute(ctx, deadline).await;
    respond::outcome_response(outcome, state.config.retry_after_secs)
}

/// Ingress: reduce the HTTP request line and headers to [`RequestFacts`]
///
/// Header values that are not valid UTF-8 are kept lossily; the validator
/// rejects them if it needs them.
pub fn request_facts(
    method: &Method,
    uri: &Uri,
    headers: &HeaderMap,
) -> Result<RequestFacts, sfg_core::Rejection> {
    let headers: HeaderList = headers
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_string(),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            )
        })
        .collect();

    RequestFacts::extract(method.as_str(), uri.path(), headers)
}
