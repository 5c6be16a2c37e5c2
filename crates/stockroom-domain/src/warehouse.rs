//! Warehouse snapshot carried by warehouse-updated events.

use serde::{Deserialize, Serialize};

use crate::lenient;

/// Point-in-time view of the (single) warehouse row.
///
/// Geometry fields accept decimal strings as well as numbers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WarehouseSnapshot {
    pub id: i32,
    pub name: String,
    pub max_capacity: i32,
    pub current_count: i32,
    #[serde(deserialize_with = "lenient::number")]
    pub location_x: f64,
    #[serde(deserialize_with = "lenient::number")]
    pub location_y: f64,
    #[serde(deserialize_with = "lenient::number")]
    pub width: f64,
    #[serde(deserialize_with = "lenient::number")]
    pub height: f64,
}

impl WarehouseSnapshot {
    /// `current_count / max_capacity`, or `None` when capacity is not positive.
    pub fn utilization(&self) -> Option<f64> {
        if self.max_capacity <= 0 {
            return None;
        }
        Some(f64::from(self.current_count) / f64::from(self.max_capacity))
    }

    /// True when utilization is strictly above `threshold` (a ratio, e.g. `0.90`).
    pub fn exceeds(&self, threshold: f64) -> bool {
        self.utilization().is_some_and(|u| u > threshold)
    }
}
