//! ccooler library crate
//!
//! Cleanup orchestration for a disk-cleanup app: concurrent category scans,
//! the selection model, the elevation gate and the sequential elevated
//! clean. All file-system and privilege work is delegated to the
//! collaborator traits in [`provider`]; the `ccooler` binary drives the
//! engine against [`simulate::ScriptedProvider`].

pub mod categories;
pub mod cleaner;
pub mod cli;
pub mod config;
pub mod desktop;
pub mod disk;
pub mod elevation;
pub mod engine;
pub mod error;
pub mod events;
pub mod large_files;
pub mod ledger;
pub mod logging;
pub mod optimize;
pub mod output;
pub mod page;
pub mod progress;
pub mod provider;
pub mod scanner;
pub mod selection;
pub mod simulate;
pub mod size;
pub mod state;
pub mod theme;

pub use categories::{Category, CategoryKind, Registry, SafetyTier};
pub use engine::{Engine, EngineOptions, EngineSnapshot};
pub use error::{EngineError, ErrorKind, ProviderError};
pub use page::PageState;
pub use scanner::{CancelToken, ScanStream, ScanSummary};
