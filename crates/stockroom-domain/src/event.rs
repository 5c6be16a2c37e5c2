//! Domain events published after a CRUD mutation commits, and their fixed routing table.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::asset::AssetSnapshot;
use crate::id::EventId;
use crate::warehouse::WarehouseSnapshot;

pub const INVENTORY_EXCHANGE: &str = "inventory";
pub const NOTIFICATIONS_EXCHANGE: &str = "notifications";

/// The five well-known occurrences. Routing is derived from the kind and is not configurable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    AssetCreated,
    AssetUpdated,
    AssetDeleted,
    WarehouseUpdated,
    NotificationRequested,
}

impl EventKind {
    pub const ALL: [EventKind; 5] = [
        EventKind::AssetCreated,
        EventKind::AssetUpdated,
        EventKind::AssetDeleted,
        EventKind::WarehouseUpdated,
        EventKind::NotificationRequested,
    ];

    /// Event-type key used for template lookup and metrics.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AssetCreated => "asset_created",
            Self::AssetUpdated => "asset_updated",
            Self::AssetDeleted => "asset_deleted",
            Self::WarehouseUpdated => "warehouse_updated",
            Self::NotificationRequested => "notification_requested",
        }
    }

    pub fn exchange(self) -> &'static str {
        match self {
            Self::NotificationRequested => NOTIFICATIONS_EXCHANGE,
            _ => INVENTORY_EXCHANGE,
        }
    }

    pub fn routing_key(self) -> &'static str {
        match self {
            Self::AssetCreated => "asset.created",
            Self::AssetUpdated => "asset.updated",
            Self::AssetDeleted => "asset.deleted",
            Self::WarehouseUpdated => "warehouse.updated",
            Self::NotificationRequested => "notification.send",
        }
    }

    /// Durable queue bound to this kind's routing key.
    pub fn queue(self) -> &'static str {
        match self {
            Self::NotificationRequested => "notifications.queue",
            other => other.routing_key(),
        }
    }

    pub fn from_routing_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.routing_key() == key)
    }
}

/// Severity bucket of a notification (success/warning/error/info).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Success,
    Warning,
    Error,
    Info,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Info => "info",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "success" => Some(Self::Success),
            "warning" => Some(Self::Warning),
            "error" => Some(Self::Error),
            "info" => Some(Self::Info),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetAction {
    Created,
    Updated,
    Deleted,
}

impl AssetAction {
    pub fn kind(self) -> EventKind {
        match self {
            Self::Created => EventKind::AssetCreated,
            Self::Updated => EventKind::AssetUpdated,
            Self::Deleted => EventKind::AssetDeleted,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarehouseAction {
    Updated,
}

impl WarehouseAction {
    pub fn kind(self) -> EventKind {
        match self {
            Self::Updated => EventKind::WarehouseUpdated,
        }
    }
}

/// Envelope for asset mutations (`inventory` / `asset.*`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetEvent {
    pub id: EventId,
    pub action: AssetAction,
    pub asset_id: String,
    #[serde(rename = "assetData", default)]
    pub asset: AssetSnapshot,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// Explicit severity; when absent the consumer derives one from the event type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,
    pub timestamp: DateTime<Utc>,
}

/// Envelope for warehouse mutations (`inventory` / `warehouse.updated`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WarehouseEvent {
    pub id: EventId,
    pub action: WarehouseAction,
    pub warehouse_id: String,
    #[serde(rename = "warehouseData", default)]
    pub warehouse: WarehouseSnapshot,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,
    pub timestamp: DateTime<Utc>,
}

/// Direct notification request (`notifications` / `notification.send`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationEvent {
    pub id: EventId,
    #[serde(rename = "type")]
    pub severity: Severity,
    pub title: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Map<String, serde_json::Value>>,
    pub timestamp: DateTime<Utc>,
}

/// Any publishable occurrence. The variant (and, for assets, the action) selects the route.
#[derive(Debug, Clone, PartialEq)]
pub enum DomainEvent {
    Asset(AssetEvent),
    Warehouse(WarehouseEvent),
    NotificationRequested(NotificationEvent),
}

impl DomainEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Asset(e) => e.action.kind(),
            Self::Warehouse(e) => e.action.kind(),
            Self::NotificationRequested(_) => EventKind::NotificationRequested,
        }
    }

    pub fn id(&self) -> &EventId {
        match self {
            Self::Asset(e) => &e.id,
            Self::Warehouse(e) => &e.id,
            Self::NotificationRequested(e) => &e.id,
        }
    }

    /// The wire payload: the inner envelope, untagged (the routing key carries the kind).
    pub fn payload(&self) -> Result<serde_json::Value, serde_json::Error> {
        match self {
            Self::Asset(e) => serde_json::to_value(e),
            Self::Warehouse(e) => serde_json::to_value(e),
            Self::NotificationRequested(e) => serde_json::to_value(e),
        }
    }
}
