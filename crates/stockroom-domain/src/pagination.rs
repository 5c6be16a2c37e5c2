//! Bounded read parameters for the admin list surfaces.

use serde::{Deserialize, Serialize};

/// Pagination parameters shared by every admin list read.
///
/// - `per_page`: 1–100, default 25
/// - `page`: ≥ 1, default 1
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    #[serde(default = "default_per_page", rename = "per-page")]
    pub per_page: u32,
    #[serde(default = "default_page")]
    pub page: u32,
}

fn default_per_page() -> u32 {
    25
}

fn default_page() -> u32 {
    1
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            per_page: default_per_page(),
            page: default_page(),
        }
    }
}

impl PageRequest {
    pub const MAX_PER_PAGE: u32 = 100;

    /// Clamp `per_page` to 1–100 and `page` to ≥ 1.
    pub fn clamped(self) -> Self {
        Self {
            per_page: self.per_page.clamp(1, Self::MAX_PER_PAGE),
            page: self.page.max(1),
        }
    }

    /// Row limit after clamping.
    pub fn limit(self) -> u64 {
        self.clamped().per_page as u64
    }

    /// Row offset after clamping.
    pub fn offset(self) -> u64 {
        let PageRequest { per_page, page } = self.clamped();
        ((page - 1) as u64) * per_page as u64
    }
}
