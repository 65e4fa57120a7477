//! Per-kind scan detail shown in a category's detail panel.

use serde::{Deserialize, Serialize};

use super::CategoryKind;
use crate::state::PathDetail;

/// A named bucket with a size, e.g. one app's cache or one error-report folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizedGroup {
    pub name: String,
    pub size_bytes: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrowserCache {
    pub name: String,
    pub cache_bytes: u64,
    #[serde(default)]
    pub cookie_bytes: u64,
}

/// Kind-specific extras returned alongside a category scan.
///
/// Each variant only carries what is meaningful for its kind; the variant
/// must match the kind of the category it is attached to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CategoryDetail {
    TempFiles {
        user_temp: PathDetail,
        system_temp: PathDetail,
    },
    BrowserCache {
        browsers: Vec<BrowserCache>,
    },
    RecycleBin {
        item_count: u64,
        folder_count: u64,
    },
    UpdateCache {
        download_bytes: u64,
        windows_old_bytes: u64,
    },
    SystemFiles {
        groups: Vec<SizedGroup>,
    },
    Downloads {
        top_files: Vec<SizedGroup>,
    },
    AppCache {
        apps: Vec<SizedGroup>,
    },
    AppLogs {
        log_files: u64,
    },
}

impl CategoryDetail {
    pub fn kind(&self) -> CategoryKind {
        match self {
            CategoryDetail::TempFiles { .. } => CategoryKind::TempFiles,
            CategoryDetail::BrowserCache { .. } => CategoryKind::BrowserCache,
            CategoryDetail::RecycleBin { .. } => CategoryKind::RecycleBin,
            CategoryDetail::UpdateCache { .. } => CategoryKind::UpdateCache,
            CategoryDetail::SystemFiles { .. } => CategoryKind::SystemFiles,
            CategoryDetail::Downloads { .. } => CategoryKind::Downloads,
            CategoryDetail::AppCache { .. } => CategoryKind::AppCache,
            CategoryDetail::AppLogs { .. } => CategoryKind::AppLogs,
        }
    }

    /// Number of sub-entries the detail panel lists (browsers, apps, groups...).
    pub fn entry_count(&self) -> usize {
        match self {
            CategoryDetail::TempFiles { .. } => 2,
            CategoryDetail::BrowserCache { browsers } => browsers.len(),
            CategoryDetail::RecycleBin { .. } | CategoryDetail::AppLogs { .. } => 1,
            CategoryDetail::UpdateCache { windows_old_bytes, .. } => {
                if *windows_old_bytes > 0 {
                    2
                } else {
                    1
                }
            }
            CategoryDetail::SystemFiles { groups } => groups.len(),
            CategoryDetail::Downloads { top_files } => top_files.len(),
            CategoryDetail::AppCache { apps } => apps.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detail_kind_matches_variant() {
        let detail = CategoryDetail::AppCache {
            apps: vec![SizedGroup {
                name: "Steam".into(),
                size_bytes: 10,
            }],
        };
        assert_eq!(detail.kind(), CategoryKind::AppCache);
        assert_eq!(detail.entry_count(), 1);
    }

    #[test]
    fn test_detail_serializes_with_kind_tag() {
        let detail = CategoryDetail::RecycleBin {
            item_count: 3,
            folder_count: 1,
        };
        let json = serde_json::to_value(&detail).unwrap();
        assert_eq!(json["kind"], "recycle_bin");
        assert_eq!(json["item_count"], 3);
    }
}
