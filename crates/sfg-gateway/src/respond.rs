//! Response synthesizer: decision outcomes to HTTP responses

use crate::error::ApiError;
use axum::{
    http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use sfg_core::{CommittedObject, DecisionOutcome};
use tracing::warn;

pub const DEAL_ID_HEADER: HeaderName = HeaderName::from_static("x-sfg-deal-id");
pub const CONTENT_CID_HEADER: HeaderName = HeaderName::from_static("x-sfg-content-cid");
pub const VERSION_ID_HEADER: HeaderName = HeaderName::from_static("x-amz-version-id");

/// Map an engine outcome to a response
///
/// Created is 201 and Overwritten is 200; failures go through [`ApiError`].
pub fn outcome_response(
    outcome: DecisionOutcome,
    retry_after_secs: u64,
) -> Result<Response, ApiError> {
    match outcome {
        DecisionOutcome::Created(object) => Ok(committed(StatusCode::CREATED, &object)),
        DecisionOutcome::Overwritten(object) => Ok(committed(StatusCode::OK, &object)),
        DecisionOutcome::Rejected(error) => Err(ApiError::Query(error)),
        DecisionOutcome::Failed(failure) => Err(ApiError::commit(failure, retry_after_secs)),
    }
}

fn committed(status: StatusCode, object: &CommittedObject) -> Response {
    let mut headers = HeaderMap::new();
    insert(&mut headers, header::ETAG, &format!("\"{}\"", object.etag));
    insert(&mut headers, DEAL_ID_HEADER, &object.deal_id);
    insert(&mut headers, CONTENT_CID_HEADER, &object.content_cid);
    if let Some(version) = &object.version {
        insert(&mut headers, VERSION_ID_HEADER, version);
    }

    (status, headers).into_response()
}

fn insert(headers: &mut HeaderMap, name: HeaderName, value: &str) {
    match HeaderValue::from_str(value) {
        Ok(value) => {
            headers.insert(name, value);
        }
        Err(_) => warn!(header = %name, value, "dropping response header with invalid value"),
    }
}
