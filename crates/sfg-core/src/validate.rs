//! PUT request validation
//!
//! Rules run in order and the first failure wins:
//!
//! 1. method is PUT
//! 2. Content-Length present and non-blank
//! 3. Content-Length parses as a base-10 integer
//! 4. Content-Length is not negative
//! 5. `Expect: 100-continue` is noted (informational only)
//! 6. Content-Length is within the object size ceiling
//! 7. Content-MD5, when sent, is base64 of a 16-byte digest
//!
//! Validation never reads the body.

use crate::error::Rejection;
use crate::facts::RequestFacts;
use crate::DEFAULT_MAX_OBJECT_SIZE;
use base64::{engine::general_purpose, Engine as _};

/// Limits applied on top of the protocol rules
#[derive(Clone, Copy, Debug)]
pub struct ValidationLimits {
    /// Largest Content-Length accepted
    pub max_object_size: u64,
}

impl Default for ValidationLimits {
    fn default() -> Self {
        Self {
            max_object_size: DEFAULT_MAX_OBJECT_SIZE,
        }
    }
}

/// Outcome of a request that passed every validation rule
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidateResult {
    content_length: u64,
    content_type: String,
    expect_continue: bool,
    content_md5: Option<[u8; 16]>,
}

impl ValidateResult {
    /// Declared body length in bytes
    pub fn content_length(&self) -> u64 {
        self.content_length
    }

    /// Content-Type as sent, empty when absent
    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    /// Whether the client asked for `100-continue`
    pub fn expect_continue(&self) -> bool {
        self.expect_continue
    }

    /// Decoded Content-MD5, if the client sent one
    pub fn content_md5(&self) -> Option<&[u8; 16]> {
        self.content_md5.as_ref()
    }
}

/// Validate with default limits
pub fn validate(facts: &RequestFacts) -> Result<ValidateResult, Rejection> {
    validate_with(facts, &ValidationLimits::default())
}

/// Validate a request against the PUT rules and the given limits
pub fn validate_with(
    facts: &RequestFacts,
    limits: &ValidationLimits,
) -> Result<ValidateResult, Rejection> {
    if facts.method() != "PUT" {
        return Err(Rejection::MethodNotAllowed(facts.method().to_string()));
    }

    let headers = facts.headers();
    let content_length = parse_content_length(headers.get_all("content-length"))?;

    let expect_continue = headers
        .get("expect")
        .map(|v| v.trim().eq_ignore_ascii_case("100-continue"))
        .unwrap_or(false);

    if content_length > limits.max_object_size {
        return Err(Rejection::EntityTooLarge {
            declared: content_length,
            max: limits.max_object_size,
        });
    }

    let content_md5 = headers
        .get("content-md5")
        .map(decode_content_md5)
        .transpose()?;

    let content_type = headers.get("content-type").unwrap_or_default().to_string();

    Ok(ValidateResult {
        content_length,
        content_type,
        expect_continue,
        content_md5,
    })
}

fn parse_content_length<'a>(values: impl Iterator<Item = &'a str>) -> Result<u64, Rejection> {
    let mut declared: Option<i64> = None;

    for raw in values {
        let value = raw.trim();
        if value.is_empty() {
            continue;
        }
        let parsed: i64 = value
            .parse()
            .map_err(|_| Rejection::ContentLengthMalformed(value.to_string()))?;
        match declared {
            Some(previous) if previous != parsed => {
                return Err(Rejection::ContentLengthMalformed(value.to_string()));
            }
            _ => declared = Some(parsed),
        }
    }

    let declared = declared.ok_or(Rejection::ContentLengthMissing)?;
    u64::try_from(declared).map_err(|_| Rejection::ContentLengthNegative(declared))
}

fn decode_content_md5(value: &str) -> Result<[u8; 16], Rejection> {
    let bytes = general_purpose::STANDARD
        .decode(value.trim())
        .map_err(|_| Rejection::InvalidDigest)?;
    <[u8; 16]>::try_from(bytes.as_slice()).map_err(|_| Rejection::InvalidDigest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facts::HeaderList;
    use rstest::rstest;

    fn facts(method: &str, headers: &[(&str, &str)]) -> RequestFacts {
        let headers: HeaderList = headers.iter().copied().collect();
        RequestFacts::extract(method, "/bucket1/obj1", headers).unwrap()
    }

    #[test]
    fn test_valid_put() {
        let result = validate(&facts(
            "PUT",
            &[("Content-Length", "5"), ("Content-Type", "text/plain")],
        ))
        .unwrap();

        assert_eq!(result.content_length(), 5);
        assert_eq!(result.content_type(), "text/plain");
        assert!(!result.expect_continue());
        assert!(result.content_md5().is_none());
    }

    #[test]
    fn test_zero_length_is_valid() {
        let result = validate(&facts("PUT", &[("Content-Length", "0")])).unwrap();
        assert_eq!(result.content_length(), 0);
        assert_eq!(result.content_type(), "");
    }

    #[rstest]
    #[case("GET")]
    #[case("POST")]
    #[case("DELETE")]
    #[case("HEAD")]
    #[case("put")]
    fn test_non_put_is_rejected_first(#[case] method: &str) {
        // Method wins even when Content-Length is also broken
        let err = validate(&facts(method, &[("Content-Length", "abc")])).unwrap_err();
        assert_eq!(err, Rejection::MethodNotAllowed(method.to_string()));
    }

    #[rstest]
    #[case(&[])]
    #[case(&[("Content-Length", "")])]
    #[case(&[("Content-Length", "   ")])]
    fn test_missing_content_length(#[case] headers: &[(&str, &str)]) {
        let err = validate(&facts("PUT", headers)).unwrap_err();
        assert_eq!(err, Rejection::ContentLengthMissing);
    }

    #[rstest]
    #[case("abc")]
    #[case("5.0")]
    #[case("0x10")]
    #[case("1e3")]
    #[case("99999999999999999999")]
    fn test_malformed_content_length(#[case] value: &str) {
        let err = validate(&facts("PUT", &[("Content-Length", value)])).unwrap_err();
        assert!(matches!(err, Rejection::ContentLengthMalformed(_)));
    }

    #[test]
    fn test_negative_content_length() {
        let err = validate(&facts("PUT", &[("Content-Length", "-1")])).unwrap_err();
        assert_eq!(err, Rejection::ContentLengthNegative(-1));
    }

    #[test]
    fn test_conflicting_content_lengths() {
        let err = validate(&facts(
            "PUT",
            &[("Content-Length", "5"), ("Content-Length", "6")],
        ))
        .unwrap_err();
        assert!(matches!(err, Rejection::ContentLengthMalformed(_)));

        let ok = validate(&facts(
            "PUT",
            &[("Content-Length", "5"), ("Content-Length", "5")],
        ))
        .unwrap();
        assert_eq!(ok.content_length(), 5);
    }

    #[rstest]
    #[case("100-continue", true)]
    #[case("100-Continue", true)]
    #[case(" 100-CONTINUE ", true)]
    #[case("something-else", false)]
    fn test_expect_continue(#[case] value: &str, #[case] expected: bool) {
        let result = validate(&facts(
            "PUT",
            &[("Content-Length", "5"), ("Expect", value)],
        ))
        .unwrap();
        assert_eq!(result.expect_continue(), expected);
    }

    #[test]
    fn test_entity_too_large() {
        let limits = ValidationLimits { max_object_size: 4 };
        let err = validate_with(&facts("PUT", &[("Content-Length", "5")]), &limits).unwrap_err();
        assert_eq!(err, Rejection::EntityTooLarge { declared: 5, max: 4 });
    }

    #[test]
    fn test_content_md5() {
        // md5("hello")
        let result = validate(&facts(
            "PUT",
            &[("Content-Length", "5"), ("Content-MD5", "XUFAKrxLKna5cZ2REBfFkg==")],
        ))
        .unwrap();
        assert_eq!(
            hex::encode(result.content_md5().unwrap()),
            "5d41402abc4b2a76b9719d911017c592"
        );

        let err = validate(&facts(
            "PUT",
            &[("Content-Length", "5"), ("Content-MD5", "not base64!")],
        ))
        .unwrap_err();
        assert_eq!(err, Rejection::InvalidDigest);

        let err = validate(&facts(
            "PUT",
            &[("Content-Length", "5"), ("Content-MD5", "aGVsbG8=")],
        ))
        .unwrap_err();
        assert_eq!(err, Rejection::InvalidDigest);
    }
}
