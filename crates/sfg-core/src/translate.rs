//! Translator: assemble the execution context

use crate::context::{CorrelationId, ExecutionContext};
use crate::facts::RequestFacts;
use crate::stage::StagedData;
use crate::validate::ValidateResult;

/// Combine the request facts, validation result and staged body
///
/// Pure assembly. Every input has already been checked, so this cannot fail.
pub fn translate(
    facts: &RequestFacts,
    validated: &ValidateResult,
    staged: StagedData,
) -> ExecutionContext {
    debug_assert_eq!(validated.content_length(), staged.size());

    ExecutionContext::new(
        CorrelationId::new(),
        facts.bucket().to_string(),
        facts.key().to_string(),
        validated.content_length(),
        validated.content_type().to_string(),
        staged,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facts::HeaderList;
    use crate::stage::{Stager, StagerConfig};
    use crate::validate::validate;
    use bytes::Bytes;
    use futures::stream;
    use std::time::Duration;
    use tokio::time::Instant;

    #[tokio::test]
    async fn test_translate_carries_every_field() {
        let dir = tempfile::tempdir().unwrap();
        let stager = Stager::new(StagerConfig::new(dir.path()));

        let headers: HeaderList = [("Content-Length", "5"), ("Content-Type", "text/plain")]
            .into_iter()
            .collect();
        let facts = RequestFacts::extract("PUT", "/bucket1/a/b.txt", headers).unwrap();
        let validated = validate(&facts).unwrap();

        let body = stream::iter(vec![Ok::<_, std::io::Error>(Bytes::from_static(b"hello"))]);
        let staged = stager
            .stage(body, 5, Instant::now() + Duration::from_secs(5))
            .await
            .unwrap();
        let staged_path = staged.path().to_path_buf();

        let ctx = translate(&facts, &validated, staged);
        assert_eq!(ctx.bucket(), "bucket1");
        assert_eq!(ctx.key(), "a/b.txt");
        assert_eq!(ctx.object_name(), "bucket1/a/b.txt");
        assert_eq!(ctx.content_length(), 5);
        assert_eq!(ctx.content_type(), "text/plain");
        assert_eq!(ctx.staged().path(), staged_path);
        assert_eq!(ctx.checksum().etag(), "5d41402abc4b2a76b9719d911017c592");

        // Each translation gets its own correlation id
        let other = CorrelationId::new();
        assert_ne!(ctx.correlation_id(), other);

        drop(ctx);
        assert!(!staged_path.exists());
    }
}
