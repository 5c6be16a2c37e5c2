use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use stockroom_domain::asset::AssetSnapshot;

/// Audit event type written once per discrepancy.
pub const RECON_DIFF_EVENT: &str = "recon_diff";

/// One row of the authoritative expected-inventory list. Free-form: only the key fields
/// (`assetId`, then `serial`) are interpreted.
pub type ExpectedItem = Map<String, Value>;

/// Drift between the expected list and the asset store for one key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Discrepancy {
    /// Expected but absent from the store.
    MissingInStore { key: String, expected: ExpectedItem },
    /// Present in the store but not expected.
    UnexpectedInStore { key: String, current: AssetSnapshot },
}

impl Discrepancy {
    pub fn key(&self) -> &str {
        match self {
            Self::MissingInStore { key, .. } | Self::UnexpectedInStore { key, .. } => key,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::MissingInStore { .. } => "missing_in_store",
            Self::UnexpectedInStore { .. } => "unexpected_in_store",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    Ok,
    Anomalies,
}

impl ReportStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Anomalies => "anomalies",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ok" => Some(Self::Ok),
            "anomalies" => Some(Self::Anomalies),
            _ => None,
        }
    }

    pub fn from_diff(diff: &[Discrepancy]) -> Self {
        if diff.is_empty() {
            Self::Ok
        } else {
            Self::Anomalies
        }
    }
}

/// A persisted reconciliation run. Immutable once written.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconReport {
    pub id: i32,
    pub run_at: DateTime<Utc>,
    pub status: ReportStatus,
    /// The serialized discrepancy list as stored.
    pub diff: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AuditEvent {
    pub id: i32,
    pub event_type: String,
    pub payload: Option<Value>,
    pub created_at: DateTime<Utc>,
}

/// Result of one reconciliation run handed back to the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconciliationRun {
    pub report: ReconReport,
    pub discrepancies: Vec<Discrepancy>,
}
