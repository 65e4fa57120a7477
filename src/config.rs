use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub scan: ScanSettings,

    #[serde(default)]
    pub selection: SelectionSettings,

    #[serde(default)]
    pub large_files: LargeFileSettings,

    #[serde(default)]
    pub desktop: DesktopSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanSettings {
    #[serde(default = "default_cancel_poll_ms")]
    pub cancel_poll_ms: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionSettings {
    /// Category id -> checked, replacing the registry default.
    #[serde(default)]
    pub overrides: BTreeMap<String, bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LargeFileSettings {
    #[serde(default = "default_min_size")]
    pub min_size: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesktopSettings {
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            cancel_poll_ms: default_cancel_poll_ms(),
        }
    }
}

impl Default for LargeFileSettings {
    fn default() -> Self {
        Self {
            min_size: default_min_size(),
        }
    }
}

fn default_cancel_poll_ms() -> u64 { 100 }
fn default_min_size() -> String { "10MB".to_string() }

impl Config {
    /// `config.toml` inside the per-user config directory.
    pub fn config_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("", "", "ccooler")
            .context("could not resolve a home directory for the config file")?;
        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Load config from the default location, or defaults.
    pub fn load() -> Self {
        match Self::config_path() {
            Ok(path) => Self::load_from(&path),
            Err(e) => {
                warn!("{:#}", e);
                Self::default()
            }
        }
    }

    /// Missing files yield defaults silently; unreadable or invalid ones
    /// yield defaults with a warning.
    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }
        match Self::try_load_from(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(path = %path.display(), "ignoring config file: {:#}", e);
                Self::default()
            }
        }
    }

    pub fn try_load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let config: Config = toml::from_str(&content).context("failed to parse config file")?;
        config.min_size_bytes()?;
        Ok(config)
    }

    pub fn save(&self) -> Result<PathBuf> {
        let path = Self::config_path()?;
        self.save_to(&path)?;
        Ok(path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("failed to create config directory")?;
        }
        let toml = toml::to_string_pretty(self).context("failed to serialize config")?;
        fs::write(path, toml).context("failed to write config file")?;
        Ok(())
    }

    pub fn cancel_poll(&self) -> Duration {
        Duration::from_millis(self.scan.cancel_poll_ms.max(1))
    }

    pub fn min_size_bytes(&self) -> Result<u64> {
        crate::size::parse_size(&self.large_files.min_size)
            .with_context(|| format!("invalid large_files.min_size '{}'", self.large_files.min_size))
    }

    /// Configured desktop, or the user's desktop directory.
    pub fn desktop_path(&self) -> Option<PathBuf> {
        self.desktop.path.clone().or_else(|| {
            directories::UserDirs::new().and_then(|dirs| dirs.desktop_dir().map(Path::to_path_buf))
        })
    }
}
