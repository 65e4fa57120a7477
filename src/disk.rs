//! Capacity of the system volume shown beside the clean page.

use serde::{Deserialize, Serialize};

/// Total, used and free bytes of one volume.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiskInfo {
    pub total: u64,
    pub used: u64,
    pub free: u64,
}

/// How full the volume is, in the bands the clean page colours by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiskUsageLevel {
    Normal,
    /// 80% or more used.
    Warning,
    /// 90% or more used.
    Critical,
}

impl DiskInfo {
    /// Build from total and free bytes; `used` is derived.
    pub fn from_total_free(total: u64, free: u64) -> Self {
        let free = free.min(total);
        Self {
            total,
            used: total - free,
            free,
        }
    }

    pub fn used_percent(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.used as f64 / self.total as f64 * 100.0
    }

    pub fn level(&self) -> DiskUsageLevel {
        let percent = self.used_percent();
        if percent >= 90.0 {
            DiskUsageLevel::Critical
        } else if percent >= 80.0 {
            DiskUsageLevel::Warning
        } else {
            DiskUsageLevel::Normal
        }
    }
}
