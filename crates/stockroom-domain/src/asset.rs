//! Asset snapshot as published by the CRUD layer and read back for reconciliation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::lenient;

/// Where an asset currently sits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetStatus {
    InWarehouse,
    InField,
    InTransit,
}

impl AssetStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InWarehouse => "in_warehouse",
            Self::InField => "in_field",
            Self::InTransit => "in_transit",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "in_warehouse" => Some(Self::InWarehouse),
            "in_field" => Some(Self::InField),
            "in_transit" => Some(Self::InTransit),
            _ => None,
        }
    }
}

/// Point-in-time view of one asset row.
///
/// Every field except `name` is optional on the wire: producers send partial snapshots
/// (e.g. on delete) and template rendering tolerates missing fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AssetSnapshot {
    /// Internal numeric key.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i32>,
    /// Business key, e.g. `E123456-2024`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asset_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub serial: Option<String>,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Statuses this build does not know decode as `None`.
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "known_status")]
    pub status: Option<AssetStatus>,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient::opt_number")]
    pub location_x: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient::opt_number")]
    pub location_y: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub in_warehouse: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qr_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

fn known_status<'de, D>(deserializer: D) -> Result<Option<AssetStatus>, D::Error>
where
    D: Deserializer<'de>,
{
    lenient::opt_parsed(deserializer, AssetStatus::parse)
}

impl AssetSnapshot {
    /// Identifier used in logs and event ids: business key, then serial, then numeric key.
    pub fn display_key(&self) -> Option<String> {
        self.asset_id
            .clone()
            .filter(|s| !s.is_empty())
            .or_else(|| self.serial.clone().filter(|s| !s.is_empty()))
            .or_else(|| self.id.map(|id| id.to_string()))
    }
}
