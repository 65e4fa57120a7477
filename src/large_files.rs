//! Large-file browser
//!
//! Holds the result of one large-file scan, keeps the per-kind stats in step
//! with deletions and filters the list for display.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::ProviderError;
use crate::provider::{FileActions, ScanProvider};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LargeFileKind {
    Download,
    Media,
    Document,
    Archive,
    Installer,
    Other,
}

impl LargeFileKind {
    pub const ALL: [LargeFileKind; 6] = [
        LargeFileKind::Download,
        LargeFileKind::Media,
        LargeFileKind::Document,
        LargeFileKind::Archive,
        LargeFileKind::Installer,
        LargeFileKind::Other,
    ];

    /// Classify by location first (anything under a Downloads folder), then
    /// by extension.
    pub fn from_path(path: &Path) -> Self {
        let in_downloads = path
            .components()
            .any(|c| c.as_os_str().to_string_lossy().eq_ignore_ascii_case("downloads"));
        if in_downloads {
            return LargeFileKind::Download;
        }

        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase());

        match ext.as_deref() {
            Some(
                "mp4" | "mkv" | "avi" | "mov" | "wmv" | "flv" | "webm" | "m4v" | "mpg" | "mpeg"
                | "ts" | "m2ts" | "mp3" | "flac" | "wav" | "jpg" | "jpeg" | "png" | "raw" | "psd",
            ) => LargeFileKind::Media,
            Some("pdf" | "doc" | "docx" | "xls" | "xlsx" | "ppt" | "pptx" | "epub") => {
                LargeFileKind::Document
            }
            Some("zip" | "rar" | "7z" | "tar" | "gz" | "bz2" | "xz" | "cab" | "iso" | "img") => {
                LargeFileKind::Archive
            }
            Some("exe" | "msi" | "msix" | "appx" | "appxbundle") => LargeFileKind::Installer,
            _ => LargeFileKind::Other,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LargeFile {
    pub path: PathBuf,
    pub size_bytes: u64,
    pub kind: LargeFileKind,
    #[serde(default)]
    pub modified: Option<DateTime<Utc>>,
}

impl LargeFile {
    pub fn name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.path.display().to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KindStats {
    pub kind: LargeFileKind,
    pub total_bytes: u64,
    pub file_count: u64,
}

/// Raw provider answer for `ScanLargeFiles`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LargeFileScan {
    pub files: Vec<LargeFile>,
    #[serde(default)]
    pub stats: Vec<KindStats>,
}

#[derive(Clone)]
pub struct LargeFiles {
    provider: Arc<dyn ScanProvider>,
    actions: Arc<dyn FileActions>,
    min_size: u64,
    files: Vec<LargeFile>,
}

impl LargeFiles {
    pub fn new(provider: Arc<dyn ScanProvider>, actions: Arc<dyn FileActions>, min_size: u64) -> Self {
        Self {
            provider,
            actions,
            min_size,
            files: Vec::new(),
        }
    }

    pub fn min_size(&self) -> u64 {
        self.min_size
    }

    /// Change the threshold; already scanned files below it are dropped.
    pub fn set_min_size(&mut self, min_size: u64) {
        self.min_size = min_size;
        self.files.retain(|f| f.size_bytes >= min_size);
    }

    /// Replace the list with a fresh scan, largest first.
    pub fn scan(&mut self) -> Result<&[LargeFile], ProviderError> {
        let scan = self.provider.scan_large_files()?;
        let min_size = self.min_size;
        let mut files: Vec<LargeFile> = scan
            .files
            .into_iter()
            .filter(|f| f.size_bytes >= min_size)
            .collect();
        files.sort_by(|a, b| b.size_bytes.cmp(&a.size_bytes));
        info!(files = files.len(), "large file scan finished");
        self.files = files;
        Ok(&self.files)
    }

    pub fn files(&self) -> &[LargeFile] {
        &self.files
    }

    pub fn filter(&self, kind: Option<LargeFileKind>) -> Vec<&LargeFile> {
        self.files
            .iter()
            .filter(|f| kind.map_or(true, |k| f.kind == k))
            .collect()
    }

    /// Per-kind totals over the current list, in `LargeFileKind::ALL` order.
    pub fn stats(&self) -> Vec<KindStats> {
        LargeFileKind::ALL
            .iter()
            .map(|&kind| {
                let (total_bytes, file_count) = self
                    .files
                    .iter()
                    .filter(|f| f.kind == kind)
                    .fold((0, 0), |(bytes, count), f| (bytes + f.size_bytes, count + 1));
                KindStats {
                    kind,
                    total_bytes,
                    file_count,
                }
            })
            .filter(|s| s.file_count > 0)
            .collect()
    }

    pub fn total_bytes(&self) -> u64 {
        self.files.iter().map(|f| f.size_bytes).sum()
    }

    /// Delete one file and drop it from the list. The list is untouched on error.
    pub fn delete(&mut self, path: &Path) -> Result<u64, ProviderError> {
        self.actions.delete_file(path)?;
        let freed = self
            .files
            .iter()
            .find(|f| f.path == path)
            .map(|f| f.size_bytes)
            .unwrap_or(0);
        self.files.retain(|f| f.path != path);
        debug!(path = %path.display(), freed, "large file deleted");
        Ok(freed)
    }

    pub fn open_location(&self, path: &Path) -> Result<(), ProviderError> {
        self.actions.open_location(path)
    }
}
