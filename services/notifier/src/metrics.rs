//! In-process counters, logged periodically and served on the admin surface.

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use tracing::info;

#[derive(Debug, Default)]
pub struct Metrics {
    processed: AtomicU64,
    sent: AtomicU64,
    failed: AtomicU64,
    retried: AtomicU64,
    by_type: Mutex<BTreeMap<String, u64>>,
    by_kind: Mutex<BTreeMap<String, u64>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub processed: u64,
    pub sent: u64,
    pub failed: u64,
    pub retried: u64,
    pub by_type: BTreeMap<String, u64>,
    pub by_kind: BTreeMap<String, u64>,
}

fn bump(map: &Mutex<BTreeMap<String, u64>>, key: &str) {
    let mut map = map.lock().unwrap_or_else(|e| e.into_inner());
    *map.entry(key.to_owned()).or_default() += 1;
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// One inbound event or request, counted under its event type.
    pub fn record_processed(&self, event_type: &str) {
        self.processed.fetch_add(1, Ordering::Relaxed);
        bump(&self.by_type, event_type);
    }

    /// A successful delivery, counted under its delivery kind.
    pub fn record_sent(&self, kind: &str) {
        self.sent.fetch_add(1, Ordering::Relaxed);
        bump(&self.by_kind, kind);
    }

    pub fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_retried(&self) {
        self.retried.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            processed: self.processed.load(Ordering::Relaxed),
            sent: self.sent.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            retried: self.retried.load(Ordering::Relaxed),
            by_type: self
                .by_type
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .clone(),
            by_kind: self
                .by_kind
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .clone(),
        }
    }

    pub fn log(&self) {
        let snapshot = self.snapshot();
        info!(
            processed = snapshot.processed,
            sent = snapshot.sent,
            failed = snapshot.failed,
            retried = snapshot.retried,
            "notifier metrics"
        );
        for (event_type, count) in &snapshot.by_type {
            info!(event_type = %event_type, count, "notifier metrics by type");
        }
        for (kind, count) in &snapshot.by_kind {
            info!(kind = %kind, count, "notifier metrics by delivery kind");
        }
    }
}
