//! Object-existence port and the built-in in-memory index

use crate::error::QueryError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// What the gateway remembers about a committed object
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectEntry {
    /// Unquoted MD5 hex
    pub etag: String,
    pub deal_id: String,
    pub content_cid: String,
    pub size: u64,
    pub content_type: String,
    /// Version marker assigned by the deal protocol, if any
    pub version: Option<String>,
    pub committed_at: DateTime<Utc>,
}

/// Result of an existence query
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Presence {
    /// The key is bound to a committed object
    Present(ObjectEntry),
    Absent,
}

impl Presence {
    pub fn is_present(&self) -> bool {
        matches!(self, Self::Present(_))
    }

    pub fn into_entry(self) -> Option<ObjectEntry> {
        match self {
            Self::Present(entry) => Some(entry),
            Self::Absent => None,
        }
    }
}

/// Answers "does bucket/key already exist" and remembers new commits
///
/// Shared by every request task. Implementations do their own locking.
#[async_trait]
pub trait ObjectIndex: Send + Sync {
    /// Look up a key. "Not found" is [`Presence::Absent`], never an error.
    async fn exists(&self, bucket: &str, key: &str) -> Result<Presence, QueryError>;

    /// Bind a key to a newly committed object, replacing any prior entry
    async fn record(&self, bucket: &str, key: &str, entry: ObjectEntry) -> Result<(), QueryError>;
}

/// An in-memory object index
#[derive(Clone, Default)]
pub struct MemoryObjectIndex {
    entries: Arc<DashMap<(String, String), ObjectEntry>>,
}

impl MemoryObjectIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Direct lookup without going through the port
    pub fn get(&self, bucket: &str, key: &str) -> Option<ObjectEntry> {
        self.entries
            .get(&(bucket.to_string(), key.to_string()))
            .map(|entry| entry.value().clone())
    }
}

#[async_trait]
impl ObjectIndex for MemoryObjectIndex {
    async fn exists(&self, bucket: &str, key: &str) -> Result<Presence, QueryError> {
        Ok(self
            .get(bucket, key)
            .map(Presence::Present)
            .unwrap_or(Presence::Absent))
    }

    async fn record(&self, bucket: &str, key: &str, entry: ObjectEntry) -> Result<(), QueryError> {
        self.entries
            .insert((bucket.to_string(), key.to_string()), entry);
        Ok(())
    }
}
