//! Request facts: method, path-style bucket/key, and headers

use crate::error::Rejection;
use std::borrow::Cow;

/// Ordered header multimap with lowercase names
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HeaderList(Vec<(String, String)>);

impl HeaderList {
    /// Create an empty list
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Append a header, keeping insertion order
    pub fn append(&mut self, name: impl AsRef<str>, value: impl Into<String>) {
        self.0.push((name.as_ref().to_ascii_lowercase(), value.into()));
    }

    /// First value for a header name (case-insensitive)
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// All values for a header name in arrival order
    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.0
            .iter()
            .filter(move |(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Whether the header is present at all
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: AsRef<str>, V: Into<String>> FromIterator<(K, V)> for HeaderList {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut list = Self::new();
        for (name, value) in iter {
            list.append(name, value);
        }
        list
    }
}

/// What the gateway knows about a request before reading its body
///
/// Immutable once extracted. The bucket and key are percent-decoded and
/// never empty.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestFacts {
    method: String,
    path: String,
    bucket: String,
    key: String,
    headers: HeaderList,
}

impl RequestFacts {
    /// Parse the request line and headers into facts
    ///
    /// The path must be `/{bucket}/{key}`. The key is everything after the
    /// bucket segment, so `/photos/2024/cat.jpg` is bucket `photos`, key
    /// `2024/cat.jpg`.
    pub fn extract(
        method: impl Into<String>,
        path: impl Into<String>,
        headers: HeaderList,
    ) -> Result<Self, Rejection> {
        let path = path.into();
        let (bucket, key) = split_path(&path)?;

        Ok(Self {
            method: method.into(),
            bucket,
            key,
            path,
            headers,
        })
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn headers(&self) -> &HeaderList {
        &self.headers
    }
}

fn split_path(path: &str) -> Result<(String, String), Rejection> {
    let rest = path.strip_prefix('/').ok_or(Rejection::InvalidPath)?;
    let (bucket, key) = rest.split_once('/').ok_or(Rejection::InvalidPath)?;
    if bucket.is_empty() || key.is_empty() {
        return Err(Rejection::InvalidPath);
    }

    let bucket = decode_segment(bucket)?;
    let key = decode_segment(key)?;
    if bucket.is_empty() || bucket.contains('/') || key.is_empty() {
        return Err(Rejection::InvalidPath);
    }

    Ok((bucket, key))
}

fn decode_segment(segment: &str) -> Result<String, Rejection> {
    urlencoding::decode(segment)
        .map(Cow::into_owned)
        .map_err(|_| Rejection::InvalidPath)
}
