//! Scripted collaborators
//!
//! A TOML fixture describes what every category scans to, which calls fail
//! and how the elevation prompt behaves. [`ScriptedProvider`] plays that
//! script back through all three collaborator traits and records every
//! call, so the same object drives the `simulate` command and the tests.
//!
//! ```toml
//! [elevation]
//! privileged = false
//! deny = false
//!
//! [[category]]
//! id = "1"
//! size = "2.3GB"
//! file_count = 1200
//! delay_ms = 150
//!
//! [[category]]
//! id = "4"
//! size = 734003200
//! clean_error = "access denied"
//! partial_clean = "120MB"
//!
//! [disk]
//! total = "300GB"
//! free = "105GB"
//! ```

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;
use tracing::debug;

use crate::categories::CategoryDetail;
use crate::desktop::{DesktopEntry, DesktopEntryKind};
use crate::disk::DiskInfo;
use crate::elevation::SessionTopic;
use crate::error::ProviderError;
use crate::events::ProgressSnapshot;
use crate::large_files::{LargeFile, LargeFileKind, LargeFileScan};
use crate::optimize::{OptimizeItem, OptimizeKind};
use crate::provider::{
    BatchRequest, CategoryScan, CleanOutcome, ElevatedExecutor, FileActions, ScanProvider,
};
use crate::state::PathDetail;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Fixture {
    /// Makes the scan provider refuse to start.
    #[serde(default)]
    pub scan_unavailable: Option<String>,
    #[serde(default)]
    pub elevation: ElevationScript,
    #[serde(default, rename = "category")]
    pub categories: Vec<CategoryScript>,
    #[serde(default, rename = "large_file")]
    pub large_files: Vec<LargeFileScript>,
    #[serde(default, rename = "desktop")]
    pub desktop: Vec<DesktopScript>,
    #[serde(default, rename = "optimization")]
    pub optimizations: Vec<OptimizeItem>,
    #[serde(default)]
    pub disk: Option<DiskScript>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ElevationScript {
    /// The process already runs elevated; no prompt is shown.
    #[serde(default)]
    pub privileged: bool,
    /// The user refuses the prompt.
    #[serde(default)]
    pub deny: bool,
    /// The helper cannot be started at all.
    #[serde(default)]
    pub unavailable: Option<String>,
    #[serde(default)]
    pub optimize_error: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CategoryScript {
    pub id: String,
    #[serde(default, deserialize_with = "crate::size::deserialize")]
    pub size: u64,
    #[serde(default)]
    pub file_count: u64,
    #[serde(default)]
    pub delay_ms: u64,
    #[serde(default)]
    pub clean_delay_ms: u64,
    #[serde(default)]
    pub scan_error: Option<String>,
    #[serde(default)]
    pub clean_error: Option<String>,
    /// Bytes reported as deleted before `clean_error` stops the category.
    #[serde(default, deserialize_with = "crate::size::deserialize")]
    pub partial_clean: u64,
    #[serde(default)]
    pub paths: Vec<PathDetail>,
    #[serde(default)]
    pub detail: Option<CategoryDetail>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LargeFileScript {
    pub path: PathBuf,
    #[serde(deserialize_with = "crate::size::deserialize")]
    pub size: u64,
    #[serde(default)]
    pub kind: Option<LargeFileKind>,
    #[serde(default)]
    pub modified: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct DiskScript {
    #[serde(deserialize_with = "crate::size::deserialize")]
    pub total: u64,
    #[serde(deserialize_with = "crate::size::deserialize")]
    pub free: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DesktopScript {
    pub name: String,
    #[serde(default, deserialize_with = "crate::size::deserialize")]
    pub size: u64,
    #[serde(default)]
    pub is_dir: bool,
}

impl Fixture {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read fixture {}", path.display()))?;
        Self::from_toml(&content).with_context(|| format!("invalid fixture {}", path.display()))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn category(&self, id: &str) -> Option<&CategoryScript> {
        self.categories.iter().find(|c| c.id == id)
    }
}

#[derive(Debug, Default)]
struct RunState {
    subscribers: HashMap<SessionTopic, Sender<ProgressSnapshot>>,
    progress: ProgressSnapshot,
}

/// Fixture-driven implementation of every collaborator trait.
#[derive(Debug, Default)]
pub struct ScriptedProvider {
    fixture: Fixture,
    scan_calls: AtomicUsize,
    run: Mutex<RunState>,
    launches: Mutex<Vec<BatchRequest>>,
    clean_calls: Mutex<Vec<String>>,
    optimize_calls: Mutex<Vec<OptimizeKind>>,
    deleted: Mutex<Vec<PathBuf>>,
    opened: Mutex<Vec<PathBuf>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ScriptedProvider {
    pub fn new(fixture: Fixture) -> Self {
        Self {
            fixture,
            ..Default::default()
        }
    }

    pub fn fixture(&self) -> &Fixture {
        &self.fixture
    }

    pub fn scan_calls(&self) -> usize {
        self.scan_calls.load(Ordering::SeqCst)
    }

    pub fn launches(&self) -> Vec<BatchRequest> {
        lock(&self.launches).clone()
    }

    /// Category ids passed to `clean_category`, in call order.
    pub fn clean_calls(&self) -> Vec<String> {
        lock(&self.clean_calls).clone()
    }

    pub fn optimize_calls(&self) -> Vec<OptimizeKind> {
        lock(&self.optimize_calls).clone()
    }

    pub fn deleted(&self) -> Vec<PathBuf> {
        lock(&self.deleted).clone()
    }

    pub fn opened(&self) -> Vec<PathBuf> {
        lock(&self.opened).clone()
    }

    /// Advance the run counters by `steps` increments and push each
    /// cumulative snapshot to every subscriber.
    fn emit(&self, id: &str, files: u64, bytes: u64, cleaned: bool) {
        let steps = files.clamp(1, 4);
        let mut run = lock(&self.run);
        let base = run.progress.clone();
        for step in 1..=steps {
            let mut snapshot = base.clone();
            snapshot.processed_paths = base.processed_paths + files * step / steps;
            if cleaned {
                snapshot.cleaned_size_bytes = base.cleaned_size_bytes + bytes * step / steps;
                snapshot.cleaned_count = base.cleaned_count + files * step / steps;
            }
            snapshot.current_path = format!("category {} ({}/{})", id, step, steps);
            run.subscribers
                .retain(|_, tx| tx.send(snapshot.clone()).is_ok());
            run.progress = snapshot;
        }
    }
}

impl ScanProvider for ScriptedProvider {
    fn ensure_available(&self) -> Result<(), ProviderError> {
        match &self.fixture.scan_unavailable {
            Some(message) => Err(ProviderError::Unavailable(message.clone())),
            None => Ok(()),
        }
    }

    fn scan_category(&self, category_id: &str) -> Result<CategoryScan, ProviderError> {
        self.scan_calls.fetch_add(1, Ordering::SeqCst);
        let Some(script) = self.fixture.category(category_id) else {
            return Ok(CategoryScan::default());
        };
        if script.delay_ms > 0 {
            thread::sleep(Duration::from_millis(script.delay_ms));
        }
        if let Some(message) = &script.scan_error {
            return Err(ProviderError::Failed(message.clone()));
        }
        Ok(CategoryScan {
            size_bytes: script.size,
            file_count: script.file_count,
            path_details: script.paths.clone(),
            detail: script.detail.clone(),
        })
    }

    fn scan_large_files(&self) -> Result<LargeFileScan, ProviderError> {
        let files = self
            .fixture
            .large_files
            .iter()
            .map(|f| LargeFile {
                path: f.path.clone(),
                size_bytes: f.size,
                kind: f.kind.unwrap_or_else(|| LargeFileKind::from_path(&f.path)),
                modified: f.modified,
            })
            .collect();
        Ok(LargeFileScan {
            files,
            stats: Vec::new(),
        })
    }

    fn scan_desktop(&self, path: &Path) -> Result<Vec<DesktopEntry>, ProviderError> {
        Ok(self
            .fixture
            .desktop
            .iter()
            .map(|d| {
                let entry_path = path.join(&d.name);
                DesktopEntry {
                    name: d.name.clone(),
                    kind: DesktopEntryKind::classify(&entry_path, d.is_dir),
                    path: entry_path,
                    size_bytes: d.size,
                    modified: None,
                }
            })
            .collect())
    }

    fn scan_optimizations(&self) -> Result<Vec<OptimizeItem>, ProviderError> {
        Ok(self.fixture.optimizations.clone())
    }

    fn disk_info(&self) -> Result<DiskInfo, ProviderError> {
        self.fixture
            .disk
            .map(|d| DiskInfo::from_total_free(d.total, d.free))
            .ok_or(ProviderError::Unsupported)
    }
}

impl ElevatedExecutor for ScriptedProvider {
    fn is_privileged(&self) -> bool {
        self.fixture.elevation.privileged
    }

    fn launch(&self, request: &BatchRequest) -> Result<(), ProviderError> {
        lock(&self.launches).push(request.clone());
        if let Some(message) = &self.fixture.elevation.unavailable {
            return Err(ProviderError::Unavailable(message.clone()));
        }
        if request.prompt && self.fixture.elevation.deny {
            return Err(ProviderError::PrivilegeDenied);
        }

        let total_paths = request
            .category_ids
            .iter()
            .filter_map(|id| self.fixture.category(id))
            .map(|c| c.file_count)
            .sum();
        lock(&self.run).progress = ProgressSnapshot {
            total_paths,
            ..Default::default()
        };
        debug!(topic = %request.topic, total_paths, "scripted elevated run launched");
        Ok(())
    }

    fn clean_category(&self, category_id: &str) -> Result<CleanOutcome, ProviderError> {
        lock(&self.clean_calls).push(category_id.to_string());
        let Some(script) = self.fixture.category(category_id) else {
            return Ok(CleanOutcome::cleaned(0, 0));
        };
        if script.clean_delay_ms > 0 {
            thread::sleep(Duration::from_millis(script.clean_delay_ms));
        }
        match &script.clean_error {
            Some(message) => {
                let partial = script.partial_clean;
                self.emit(category_id, script.file_count, partial, partial > 0);
                Ok(CleanOutcome::failed(message))
            }
            None => {
                self.emit(category_id, script.file_count, script.size, true);
                Ok(CleanOutcome::cleaned(script.size, script.file_count))
            }
        }
    }

    fn subscribe(&self, topic: &SessionTopic) -> Receiver<ProgressSnapshot> {
        let (tx, rx) = mpsc::channel();
        lock(&self.run).subscribers.insert(topic.clone(), tx);
        rx
    }

    fn unsubscribe(&self, topic: &SessionTopic) {
        lock(&self.run).subscribers.remove(topic);
    }

    fn optimize(&self, kind: OptimizeKind) -> Result<(), ProviderError> {
        lock(&self.optimize_calls).push(kind);
        match &self.fixture.elevation.optimize_error {
            Some(message) => Err(ProviderError::Failed(message.clone())),
            None => Ok(()),
        }
    }
}

impl FileActions for ScriptedProvider {
    fn delete_file(&self, path: &Path) -> Result<(), ProviderError> {
        let known = self.fixture.large_files.iter().any(|f| f.path == path)
            || self
                .fixture
                .desktop
                .iter()
                .any(|d| path.file_name().is_some_and(|n| n.to_string_lossy() == d.name));
        if !known {
            return Err(ProviderError::Failed(format!(
                "{} does not exist",
                path.display()
            )));
        }
        lock(&self.deleted).push(path.to_path_buf());
        Ok(())
    }

    fn open_location(&self, path: &Path) -> Result<(), ProviderError> {
        lock(&self.opened).push(path.to_path_buf());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIXTURE: &str = r#"
[elevation]
deny = true

[[category]]
id = "1"
size = "1KB"
file_count = 3
detail = { kind = "recycle_bin", item_count = 2, folder_count = 1 }

[[category]]
id = "2"
size = 10
scan_error = "locked"

[[large_file]]
path = "C:/Users/me/Downloads/setup.iso"
size = "4GB"
"#;

    #[test]
    fn test_fixture_parses_sizes_and_details() {
        let fixture = Fixture::from_toml(FIXTURE).unwrap();
        let first = fixture.category("1").unwrap();
        assert_eq!(first.size, 1024);
        assert!(matches!(
            first.detail,
            Some(CategoryDetail::RecycleBin { item_count: 2, .. })
        ));
        assert_eq!(fixture.large_files[0].size, 4 * 1024 * 1024 * 1024);
        assert!(fixture.elevation.deny);
    }

    #[test]
    fn test_scan_plays_back_script() {
        let provider = ScriptedProvider::new(Fixture::from_toml(FIXTURE).unwrap());
        assert_eq!(provider.scan_category("1").unwrap().size_bytes, 1024);
        assert_eq!(
            provider.scan_category("2"),
            Err(ProviderError::Failed("locked".into()))
        );
        assert_eq!(provider.scan_category("9").unwrap(), CategoryScan::default());
        assert_eq!(provider.scan_calls(), 3);
    }

    #[test]
    fn test_denied_only_when_prompting() {
        let provider = ScriptedProvider::new(Fixture::from_toml(FIXTURE).unwrap());
        let mut request = BatchRequest {
            topic: SessionTopic::for_session(1),
            category_ids: vec!["1".into()],
            prompt: true,
        };
        assert_eq!(provider.launch(&request), Err(ProviderError::PrivilegeDenied));
        request.prompt = false;
        assert_eq!(provider.launch(&request), Ok(()));
    }

    #[test]
    fn test_clean_emits_cumulative_progress() {
        let provider = ScriptedProvider::new(Fixture::from_toml(FIXTURE).unwrap());
        let topic = SessionTopic::for_session(1);
        let rx = provider.subscribe(&topic);
        provider
            .launch(&BatchRequest {
                topic: topic.clone(),
                category_ids: vec!["1".into()],
                prompt: false,
            })
            .unwrap();

        let outcome = provider.clean_category("1").unwrap();
        assert_eq!(outcome, CleanOutcome::cleaned(1024, 3));

        let snapshots: Vec<ProgressSnapshot> = rx.try_iter().collect();
        assert_eq!(snapshots.len(), 3);
        assert!(snapshots
            .windows(2)
            .all(|w| !w[1].regresses_from(&w[0])));
        let last = snapshots.last().unwrap();
        assert_eq!(last.processed_paths, 3);
        assert_eq!(last.total_paths, 3);
        assert_eq!(last.cleaned_size_bytes, 1024);

        provider.unsubscribe(&topic);
        provider.clean_category("1").unwrap();
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_failed_clean_can_report_partial_bytes() {
        let fixture = Fixture::from_toml(
            r#"
[[category]]
id = "4"
size = 500
file_count = 2
clean_error = "access denied"
partial_clean = 60
"#,
        )
        .unwrap();
        let provider = ScriptedProvider::new(fixture);
        let rx = provider.subscribe(&SessionTopic::for_session(1));

        let outcome = provider.clean_category("4").unwrap();
        assert!(!outcome.success);
        assert_eq!(outcome.cleaned_size, 0);
        let last = rx.try_iter().last().unwrap();
        assert_eq!(last.cleaned_size_bytes, 60);
    }

    #[test]
    fn test_disk_info_from_fixture() {
        let fixture = Fixture::from_toml("[disk]\ntotal = \"300GB\"\nfree = \"105GB\"\n").unwrap();
        let info = ScriptedProvider::new(fixture).disk_info().unwrap();
        assert_eq!(info.total, 300 * 1024 * 1024 * 1024);
        assert_eq!(info.used, 195 * 1024 * 1024 * 1024);

        let bare = ScriptedProvider::new(Fixture::default());
        assert_eq!(bare.disk_info(), Err(ProviderError::Unsupported));
    }
}
