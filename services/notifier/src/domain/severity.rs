//! Severity bucket for event-derived notifications.
//!
//! Known event types resolve through a fixed table. Anything else falls back to substring
//! matching on the event-type key (`deleted` → warning, `error`/`failed` → error,
//! `created`/`updated` → success, otherwise info). An explicit severity on the event wins.

use stockroom_domain::event::Severity;

const TABLE: [(&str, Severity); 5] = [
    ("asset_created", Severity::Success),
    ("asset_updated", Severity::Success),
    ("asset_deleted", Severity::Warning),
    ("warehouse_updated", Severity::Success),
    ("low_stock_alert", Severity::Warning),
];

pub fn resolve(event_type: &str, explicit: Option<Severity>) -> Severity {
    explicit.unwrap_or_else(|| for_event_type(event_type))
}

pub fn for_event_type(event_type: &str) -> Severity {
    TABLE
        .iter()
        .find(|(key, _)| *key == event_type)
        .map(|(_, severity)| *severity)
        .unwrap_or_else(|| by_substring(event_type))
}

fn by_substring(event_type: &str) -> Severity {
    if event_type.contains("deleted") {
        Severity::Warning
    } else if event_type.contains("error") || event_type.contains("failed") {
        Severity::Error
    } else if event_type.contains("created") || event_type.contains("updated") {
        Severity::Success
    } else {
        Severity::Info
    }
}
