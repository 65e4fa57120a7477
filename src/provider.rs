//! Collaborator boundary.
//!
//! The engine never touches the file system, the registry or process
//! tokens itself. Everything destructive or slow goes through these traits,
//! and each call into them is a point where the engine yields.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::mpsc::Receiver;

use crate::categories::CategoryDetail;
use crate::desktop::DesktopEntry;
use crate::disk::DiskInfo;
use crate::elevation::SessionTopic;
use crate::error::ProviderError;
use crate::events::ProgressSnapshot;
use crate::large_files::LargeFileScan;
use crate::optimize::{OptimizeItem, OptimizeKind};
use crate::state::PathDetail;

/// What a provider found for one category.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryScan {
    pub size_bytes: u64,
    pub file_count: u64,
    #[serde(default)]
    pub path_details: Vec<PathDetail>,
    #[serde(default)]
    pub detail: Option<CategoryDetail>,
}

/// Result of cleaning one category inside an elevated run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanOutcome {
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
    pub cleaned_size: u64,
    pub cleaned_count: u64,
}

impl CleanOutcome {
    pub fn cleaned(cleaned_size: u64, cleaned_count: u64) -> Self {
        Self {
            success: true,
            error: None,
            cleaned_size,
            cleaned_count,
        }
    }

    pub fn failed(message: &str) -> Self {
        Self {
            success: false,
            error: Some(message.to_string()),
            cleaned_size: 0,
            cleaned_count: 0,
        }
    }
}

/// Everything the executor needs to launch one elevated run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchRequest {
    pub topic: SessionTopic,
    pub category_ids: Vec<String>,
    /// False when the process already holds an elevated token.
    pub prompt: bool,
}

/// Estimates reclaimable space. Must be callable concurrently for distinct ids.
pub trait ScanProvider: Send + Sync {
    /// Checked once before a scan batch starts.
    fn ensure_available(&self) -> Result<(), ProviderError> {
        Ok(())
    }

    fn scan_category(&self, category_id: &str) -> Result<CategoryScan, ProviderError>;

    fn scan_large_files(&self) -> Result<LargeFileScan, ProviderError> {
        Err(ProviderError::Unsupported)
    }

    fn scan_desktop(&self, _path: &Path) -> Result<Vec<DesktopEntry>, ProviderError> {
        Err(ProviderError::Unsupported)
    }

    fn scan_optimizations(&self) -> Result<Vec<OptimizeItem>, ProviderError> {
        Err(ProviderError::Unsupported)
    }

    /// Capacity of the volume being cleaned.
    fn disk_info(&self) -> Result<DiskInfo, ProviderError> {
        Err(ProviderError::Unsupported)
    }
}

/// Runs destructive work under an elevated token.
pub trait ElevatedExecutor: Send + Sync {
    fn is_privileged(&self) -> bool;

    /// Obtain the elevated context for one run. A refused OS prompt must be
    /// reported as [`ProviderError::PrivilegeDenied`].
    fn launch(&self, request: &BatchRequest) -> Result<(), ProviderError>;

    /// Only called while the session for the current run is `running`.
    fn clean_category(&self, category_id: &str) -> Result<CleanOutcome, ProviderError>;

    /// Cumulative progress for the whole run, in non-decreasing order.
    fn subscribe(&self, topic: &SessionTopic) -> Receiver<ProgressSnapshot>;

    fn unsubscribe(&self, topic: &SessionTopic);

    fn optimize(&self, _kind: OptimizeKind) -> Result<(), ProviderError> {
        Err(ProviderError::Unsupported)
    }
}

/// Single-shot file actions used by the large-file and desktop flows.
pub trait FileActions: Send + Sync {
    fn delete_file(&self, path: &Path) -> Result<(), ProviderError>;

    fn open_location(&self, path: &Path) -> Result<(), ProviderError>;
}
