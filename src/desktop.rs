//! Desktop clutter browser.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

use crate::error::ProviderError;
use crate::provider::{FileActions, ScanProvider};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DesktopEntryKind {
    File,
    Folder,
    Shortcut,
}

impl DesktopEntryKind {
    /// `.lnk` files are shortcuts; everything else that is not a folder is a file.
    pub fn classify(path: &Path, is_dir: bool) -> Self {
        if is_dir {
            return DesktopEntryKind::Folder;
        }
        let is_link = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("lnk"));
        if is_link {
            DesktopEntryKind::Shortcut
        } else {
            DesktopEntryKind::File
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesktopEntry {
    pub name: String,
    pub path: PathBuf,
    pub kind: DesktopEntryKind,
    pub size_bytes: u64,
    #[serde(default)]
    pub modified: Option<DateTime<Utc>>,
}

#[derive(Clone)]
pub struct DesktopFiles {
    provider: Arc<dyn ScanProvider>,
    actions: Arc<dyn FileActions>,
    default_path: PathBuf,
    entries: Vec<DesktopEntry>,
}

impl DesktopFiles {
    pub fn new(
        provider: Arc<dyn ScanProvider>,
        actions: Arc<dyn FileActions>,
        default_path: PathBuf,
    ) -> Self {
        Self {
            provider,
            actions,
            default_path,
            entries: Vec::new(),
        }
    }

    /// Scan `path`, or the configured desktop when `None`.
    pub fn scan(&mut self, path: Option<&Path>) -> Result<&[DesktopEntry], ProviderError> {
        let path = path.unwrap_or(&self.default_path);
        self.entries = self.provider.scan_desktop(path)?;
        debug!(path = %path.display(), entries = self.entries.len(), "desktop scanned");
        Ok(&self.entries)
    }

    pub fn entries(&self) -> &[DesktopEntry] {
        &self.entries
    }

    pub fn of_kind(&self, kind: DesktopEntryKind) -> Vec<&DesktopEntry> {
        self.entries.iter().filter(|e| e.kind == kind).collect()
    }

    pub fn total_bytes(&self) -> u64 {
        self.entries.iter().map(|e| e.size_bytes).sum()
    }

    pub fn delete(&mut self, path: &Path) -> Result<(), ProviderError> {
        self.actions.delete_file(path)?;
        self.entries.retain(|e| e.path != path);
        Ok(())
    }

    pub fn open_location(&self, path: &Path) -> Result<(), ProviderError> {
        self.actions.open_location(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify() {
        assert_eq!(
            DesktopEntryKind::classify(Path::new("C:/Users/me/Desktop/Steam.LNK"), false),
            DesktopEntryKind::Shortcut
        );
        assert_eq!(
            DesktopEntryKind::classify(Path::new("C:/Users/me/Desktop/notes.txt"), false),
            DesktopEntryKind::File
        );
        assert_eq!(
            DesktopEntryKind::classify(Path::new("C:/Users/me/Desktop/old"), true),
            DesktopEntryKind::Folder
        );
    }
}
