//! MK20 wire types and the deal state machine

use crate::error::{Mk20Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sfg_core::ExecutionContext;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Content type sent when the client gave none
pub const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

/// Deal lifecycle as reported by the deal protocol
///
/// Serialized in SCREAMING_SNAKE_CASE; parsing accepts any case.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", try_from = "String")]
pub enum DealState {
    Init,
    Uploading,
    Uploaded,
    DealCreating,
    Pending,
    Sealing,
    Active,
    Failed,
}

impl DealState {
    /// Position along the success path; FAILED sits outside it
    pub fn rank(self) -> Option<u8> {
        match self {
            Self::Init => Some(0),
            Self::Uploading => Some(1),
            Self::Uploaded => Some(2),
            Self::DealCreating => Some(3),
            Self::Pending => Some(4),
            Self::Sealing => Some(5),
            Self::Active => Some(6),
            Self::Failed => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Active | Self::Failed)
    }

    /// Single-step transition table
    pub fn can_transition_to(self, next: DealState) -> bool {
        use DealState::*;
        matches!(
            (self, next),
            (Init, Uploading)
                | (Uploading, Uploading)
                | (Uploading, Uploaded)
                | (Uploaded, DealCreating)
                | (DealCreating, Pending)
                | (Pending, Sealing)
                | (Sealing, Active)
                | (Active, Active)
                | (Failed, Failed)
        ) || (!self.is_terminal() && next == Failed)
    }

    /// Whether a poller that last saw `self` may legally see `next`
    ///
    /// Polls can miss intermediate states, so any forward move counts.
    pub fn can_advance_to(self, next: DealState) -> bool {
        match (self.rank(), next.rank()) {
            (Some(from), Some(to)) => from <= to,
            (Some(_), None) => true,
            (None, None) => true,
            (None, Some(_)) => false,
        }
    }

    /// Whether this state is at or past `target` on the success path
    pub fn has_reached(self, target: DealState) -> bool {
        match (self.rank(), target.rank()) {
            (Some(current), Some(target)) => current >= target,
            _ => false,
        }
    }

    /// The next state on the success path
    pub fn successor(self) -> Option<DealState> {
        use DealState::*;
        match self {
            Init => Some(Uploading),
            Uploading => Some(Uploaded),
            Uploaded => Some(DealCreating),
            DealCreating => Some(Pending),
            Pending => Some(Sealing),
            Sealing => Some(Active),
            Active | Failed => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Init => "INIT",
            Self::Uploading => "UPLOADING",
            Self::Uploaded => "UPLOADED",
            Self::DealCreating => "DEAL_CREATING",
            Self::Pending => "PENDING",
            Self::Sealing => "SEALING",
            Self::Active => "ACTIVE",
            Self::Failed => "FAILED",
        }
    }
}

impl fmt::Display for DealState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DealState {
    type Err = Mk20Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "INIT" => Ok(Self::Init),
            "UPLOADING" => Ok(Self::Uploading),
            "UPLOADED" => Ok(Self::Uploaded),
            "DEAL_CREATING" => Ok(Self::DealCreating),
            "PENDING" => Ok(Self::Pending),
            "SEALING" => Ok(Self::Sealing),
            "ACTIVE" => Ok(Self::Active),
            "FAILED" => Ok(Self::Failed),
            other => Err(Mk20Error::Configuration(format!("unknown deal state {other:?}"))),
        }
    }
}

impl TryFrom<String> for DealState {
    type Error = Mk20Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

/// Body of `POST /store`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DealProposal {
    /// `bucket/key`
    pub name: String,
    pub size: u64,
    pub mime_type: String,
    pub profile: String,
    /// CIDv1 of the content, used for deduplication
    pub content_cid: String,
    /// BLAKE3 hex of the content
    pub checksum: String,
    /// Deal this proposal supersedes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replaces: Option<String>,
}

impl DealProposal {
    pub fn from_context(ctx: &ExecutionContext, profile: &str, replaces: Option<&str>) -> Self {
        let mime_type = match ctx.content_type() {
            "" => DEFAULT_MIME_TYPE.to_string(),
            other => other.to_string(),
        };

        Self {
            name: ctx.object_name(),
            size: ctx.content_length(),
            mime_type,
            profile: profile.to_string(),
            content_cid: ctx.checksum().content_cid().to_string(),
            checksum: ctx.checksum().blake3_hex(),
            replaces: replaces.map(str::to_string),
        }
    }
}

/// Response of `POST /store`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposalResponse {
    #[serde(rename = "storeId", alias = "id", alias = "dealId")]
    pub deal_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cid: Option<String>,
    /// Content already present on the deal side; upload can be skipped
    #[serde(default)]
    pub uploaded: bool,
    /// An existing deal for the same content was returned
    #[serde(default)]
    pub idempotent: bool,
}

/// Staged content to stream in `POST /upload`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadSource {
    pub path: PathBuf,
    pub size: u64,
    pub file_name: String,
}

impl UploadSource {
    pub fn from_context(ctx: &ExecutionContext) -> Self {
        let file_name = ctx
            .key()
            .rsplit('/')
            .find(|segment| !segment.is_empty())
            .unwrap_or(ctx.key())
            .to_string();

        Self {
            path: ctx.staged().path().to_path_buf(),
            size: ctx.staged().size(),
            file_name,
        }
    }
}

/// Response of `POST /upload`
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<DealState>,
}

/// One entry of a deal's status history
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChange {
    pub at: DateTime<Utc>,
    pub status: DealState,
}

/// Response of `GET /status/{storeId}`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DealRecord {
    #[serde(rename = "storeId", alias = "dealId", alias = "id")]
    pub deal_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cid: Option<String>,
    pub status: DealState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub timeline: Vec<StatusChange>,
}

impl DealRecord {
    /// A fresh record in `status`
    pub fn new(deal_id: impl Into<String>, cid: Option<String>, status: DealState) -> Self {
        Self {
            deal_id: deal_id.into(),
            cid,
            status,
            version: None,
            error: None,
            timeline: vec![StatusChange {
                at: Utc::now(),
                status,
            }],
        }
    }

    /// Move to `next`, enforcing the transition table and extending the timeline
    pub fn push_status(&mut self, next: DealState) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(Mk20Error::IllegalTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        self.timeline.push(StatusChange {
            at: Utc::now(),
            status: next,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_deal_state_serialization() {
        assert_eq!(
            serde_json::to_string(&DealState::DealCreating).unwrap(),
            "\"DEAL_CREATING\""
        );
        let state: DealState = serde_json::from_str("\"SEALING\"").unwrap();
        assert_eq!(state, DealState::Sealing);
        assert_eq!("active".parse::<DealState>().unwrap(), DealState::Active);
        assert!("DONE".parse::<DealState>().is_err());
    }

    #[test]
    fn test_deal_state_deserializes_any_case() {
        let state: DealState = serde_json::from_str("\"active\"").unwrap();
        assert_eq!(state, DealState::Active);
        let state: DealState = serde_json::from_str("\"deal_creating\"").unwrap();
        assert_eq!(state, DealState::DealCreating);
        assert!(serde_json::from_str::<DealState>("\"done\"").is_err());

        let record: DealRecord =
            serde_json::from_str(r#"{"storeId":"d1","status":"Sealing"}"#).unwrap();
        assert_eq!(record.status, DealState::Sealing);
    }

    #[rstest]
    #[case(DealState::Init, DealState::Uploading, true)]
    #[case(DealState::Uploading, DealState::Uploading, true)]
    #[case(DealState::Uploaded, DealState::DealCreating, true)]
    #[case(DealState::Sealing, DealState::Active, true)]
    #[case(DealState::Pending, DealState::Failed, true)]
    #[case(DealState::Init, DealState::Active, false)]
    #[case(DealState::Pending, DealState::Uploaded, false)]
    #[case(DealState::Active, DealState::Failed, false)]
    #[case(DealState::Failed, DealState::Pending, false)]
    fn test_transition_table(
        #[case] from: DealState,
        #[case] to: DealState,
        #[case] allowed: bool,
    ) {
        assert_eq!(from.can_transition_to(to), allowed);
    }

    #[test]
    fn test_observed_progress() {
        // Polls may skip states but never go backwards
        assert!(DealState::Uploaded.can_advance_to(DealState::Active));
        assert!(DealState::Pending.can_advance_to(DealState::Failed));
        assert!(!DealState::Sealing.can_advance_to(DealState::Pending));
        assert!(!DealState::Failed.can_advance_to(DealState::Active));

        assert!(DealState::Active.has_reached(DealState::Sealing));
        assert!(!DealState::Pending.has_reached(DealState::Active));
        assert!(!DealState::Failed.has_reached(DealState::Init));
    }

    #[test]
    fn test_record_timeline() {
        let mut record = DealRecord::new("deal-1", None, DealState::Init);
        record.push_status(DealState::Uploading).unwrap();
        record.push_status(DealState::Uploaded).unwrap();
        assert!(matches!(
            record.push_status(DealState::Active),
            Err(Mk20Error::IllegalTransition { .. })
        ));

        let states: Vec<_> = record.timeline.iter().map(|c| c.status).collect();
        assert_eq!(
            states,
            vec![DealState::Init, DealState::Uploading, DealState::Uploaded]
        );
    }

    #[test]
    fn test_wire_field_names() {
        let proposal = DealProposal {
            name: "bucket1/obj1".into(),
            size: 5,
            mime_type: "text/plain".into(),
            profile: "default".into(),
            content_cid: "bafk".into(),
            checksum: "ab".into(),
            replaces: None,
        };
        let json = serde_json::to_value(&proposal).unwrap();
        assert_eq!(json["mimeType"], "text/plain");
        assert_eq!(json["contentCid"], "bafk");
        assert!(json.get("replaces").is_none());

        let a: ProposalResponse = serde_json::from_str(r#"{"storeId":"s1"}"#).unwrap();
        let b: ProposalResponse =
            serde_json::from_str(r#"{"id":"s2","cid":"bafk","idempotent":true}"#).unwrap();
        assert_eq!(a.deal_id, "s1");
        assert!(!a.uploaded);
        assert_eq!(b.deal_id, "s2");
        assert!(b.idempotent);

        let record: DealRecord =
            serde_json::from_str(r#"{"dealId":"d1","status":"PENDING","version":"3"}"#).unwrap();
        assert_eq!(record.status, DealState::Pending);
        assert_eq!(record.version.as_deref(), Some("3"));
        assert!(record.timeline.is_empty());
    }
}
