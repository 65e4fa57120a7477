//! Mutable per-category run state.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::categories::{Category, CategoryDetail};
use crate::provider::CategoryScan;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoryStatus {
    Idle,
    Scanning,
    Scanned,
    Cleaning,
    Completed,
    Error,
}

impl CategoryStatus {
    /// `Scanning` and `Cleaning` always resolve to a terminal status.
    pub fn is_transient(self) -> bool {
        matches!(self, CategoryStatus::Scanning | CategoryStatus::Cleaning)
    }

    pub fn is_scan_terminal(self) -> bool {
        matches!(self, CategoryStatus::Scanned | CategoryStatus::Error)
    }

    pub fn is_clean_terminal(self) -> bool {
        matches!(self, CategoryStatus::Completed | CategoryStatus::Error)
    }
}

/// One scanned location inside a category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathDetail {
    pub path: PathBuf,
    pub size_bytes: u64,
    #[serde(default)]
    pub file_count: u64,
    #[serde(default)]
    pub folder_count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryRunState {
    pub id: String,
    pub status: CategoryStatus,
    pub size_bytes: u64,
    pub file_count: u64,
    /// Only ever written by the selection model.
    pub checked: bool,
    pub error_message: Option<String>,
    pub path_details: Vec<PathDetail>,
    pub detail: Option<CategoryDetail>,
}

impl CategoryRunState {
    pub fn new(category: &Category, checked: bool) -> Self {
        Self {
            id: category.id.clone(),
            status: CategoryStatus::Idle,
            size_bytes: 0,
            file_count: 0,
            checked,
            error_message: None,
            path_details: Vec::new(),
            detail: None,
        }
    }

    pub fn size_human(&self) -> String {
        bytesize::to_string(self.size_bytes, false)
    }

    /// Zero the scan fields and mark the row as scanning.
    pub(crate) fn begin_scan(&mut self) {
        self.status = CategoryStatus::Scanning;
        self.size_bytes = 0;
        self.file_count = 0;
        self.error_message = None;
        self.path_details.clear();
        self.detail = None;
    }

    pub(crate) fn apply_scan(&mut self, scan: CategoryScan) {
        self.status = CategoryStatus::Scanned;
        self.size_bytes = scan.size_bytes;
        self.file_count = scan.file_count;
        self.path_details = scan.path_details;
        self.detail = scan.detail;
        self.error_message = None;
    }

    pub(crate) fn begin_clean(&mut self) {
        self.status = CategoryStatus::Cleaning;
        self.error_message = None;
    }

    pub(crate) fn mark_cleaned(&mut self) {
        self.status = CategoryStatus::Completed;
        self.size_bytes = 0;
        self.file_count = 0;
        self.path_details.clear();
    }

    pub(crate) fn fail(&mut self, message: impl Into<String>) {
        self.status = CategoryStatus::Error;
        self.error_message = Some(message.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::categories::Registry;

    fn row() -> CategoryRunState {
        let registry = Registry::builtin();
        CategoryRunState::new(registry.lookup("1").unwrap(), true)
    }

    #[test]
    fn test_scan_then_clean_keeps_checked() {
        let mut row = row();
        row.begin_scan();
        assert!(row.status.is_transient());

        row.apply_scan(CategoryScan {
            size_bytes: 2048,
            file_count: 4,
            ..Default::default()
        });
        assert_eq!(row.status, CategoryStatus::Scanned);
        assert_eq!(row.size_bytes, 2048);

        row.begin_clean();
        row.mark_cleaned();
        assert_eq!(row.status, CategoryStatus::Completed);
        assert_eq!(row.size_bytes, 0);
        assert_eq!(row.file_count, 0);
        assert!(row.checked);
    }

    #[test]
    fn test_begin_scan_clears_previous_error() {
        let mut row = row();
        row.fail("access denied");
        assert!(row.status.is_scan_terminal());
        assert!(row.status.is_clean_terminal());

        row.begin_scan();
        assert_eq!(row.error_message, None);
        assert_eq!(row.status, CategoryStatus::Scanning);
    }
}
