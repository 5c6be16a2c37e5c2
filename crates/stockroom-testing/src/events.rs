//! Builders for snapshots and event envelopes with realistic defaults.

use chrono::Utc;
use serde_json::{Map, Value, json};

use stockroom_domain::asset::{AssetSnapshot, AssetStatus};
use stockroom_domain::event::{
    AssetAction, AssetEvent, NotificationEvent, Severity, WarehouseAction, WarehouseEvent,
};
use stockroom_domain::id::EventId;
use stockroom_domain::warehouse::WarehouseSnapshot;

pub fn asset(asset_id: &str, name: &str) -> AssetSnapshot {
    AssetSnapshot {
        id: Some(1),
        asset_id: Some(asset_id.to_owned()),
        name: name.to_owned(),
        category: Some("tools".to_owned()),
        status: Some(AssetStatus::InWarehouse),
        in_warehouse: Some(true),
        ..AssetSnapshot::default()
    }
}

pub fn warehouse(current_count: i32, max_capacity: i32) -> WarehouseSnapshot {
    WarehouseSnapshot {
        id: 1,
        name: "Main Warehouse".to_owned(),
        max_capacity,
        current_count,
        location_x: 10.0,
        location_y: 20.0,
        width: 100.0,
        height: 60.0,
    }
}

pub fn asset_event(action: AssetAction, snapshot: AssetSnapshot) -> AssetEvent {
    let asset_id = snapshot.display_key().unwrap_or_default();
    AssetEvent {
        id: EventId::new(action.kind().as_str(), &asset_id),
        action,
        asset_id,
        asset: snapshot,
        user_id: Some("42".to_owned()),
        severity: None,
        timestamp: Utc::now(),
    }
}

pub fn warehouse_event(snapshot: WarehouseSnapshot) -> WarehouseEvent {
    let warehouse_id = snapshot.id.to_string();
    WarehouseEvent {
        id: EventId::new(WarehouseAction::Updated.kind().as_str(), &warehouse_id),
        action: WarehouseAction::Updated,
        warehouse_id,
        warehouse: snapshot,
        user_id: Some("42".to_owned()),
        severity: None,
        timestamp: Utc::now(),
    }
}

pub fn notification_request(severity: Severity, title: &str, message: &str) -> NotificationEvent {
    NotificationEvent {
        id: EventId::new("notification", severity.as_str()),
        severity,
        title: title.to_owned(),
        message: message.to_owned(),
        user_id: None,
        metadata: None,
        timestamp: Utc::now(),
    }
}

/// One expected-inventory row carrying only a business key.
pub fn expected(asset_id: &str) -> Map<String, Value> {
    object(json!({ "assetId": asset_id }))
}

/// Coerce a `json!({...})` literal into an object map.
///
/// # Panics
///
/// Panics if `value` is not a JSON object.
pub fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => panic!("expected a JSON object, got {other}"),
    }
}
