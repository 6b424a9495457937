// record.rs — One line of the activity log.
//
// Decisions are the bulk of the log, but authority lifecycle changes (a
// policy signed or cleared, the wallet identity changing) are recorded too so
// that every decision can be read against the authority in force when it was
// made.

use chrono::{DateTime, Utc};
use echo_policy::ActivityEvent;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What a record describes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    /// An agent action was authorized or rejected.
    Decision,
    /// A new signed policy became active.
    PolicySigned,
    /// The active policy was cleared by the user.
    PolicyCleared,
    /// The connected identity changed or disconnected; authority was dropped.
    IdentityChanged,
}

/// A single record in the JSONL activity log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActivityRecord {
    pub record_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub kind: RecordKind,

    /// Wallet address the authority belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signer: Option<String>,

    /// Hash of the signed policy in force.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy_hash: Option<String>,

    /// The decision, for `Decision` records.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event: Option<ActivityEvent>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,

    /// Hash of the previous raw line. `None` for the first record.
    pub previous_hash: Option<String>,
}

impl ActivityRecord {
    pub fn decision(event: ActivityEvent) -> Self {
        Self {
            record_id: Uuid::new_v4(),
            timestamp: event.timestamp,
            kind: RecordKind::Decision,
            signer: None,
            policy_hash: None,
            event: Some(event),
            detail: None,
            previous_hash: None,
        }
    }

    pub fn lifecycle(kind: RecordKind, detail: impl Into<String>) -> Self {
        Self {
            record_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            kind,
            signer: None,
            policy_hash: None,
            event: None,
            detail: Some(detail.into()),
            previous_hash: None,
        }
    }

    pub fn with_signer(mut self, signer: impl Into<String>) -> Self {
        self.signer = Some(signer.into());
        self
    }

    pub fn with_policy_hash(mut self, hash: impl Into<String>) -> Self {
        self.policy_hash = Some(hash.into());
        self
    }
}
