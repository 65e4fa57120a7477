//! Page lifecycle
//!
//! `initial -> scanning -> scan-complete -> cleaning -> clean-complete`, with
//! `error` reachable only when a whole batch could not be started. Single
//! category failures never move the page.

use serde::Serialize;
use std::fmt;
use tracing::info;

use crate::error::EngineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PageState {
    Initial,
    Scanning,
    ScanComplete,
    Cleaning,
    CleanComplete,
    Error,
}

impl PageState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PageState::Initial => "initial",
            PageState::Scanning => "scanning",
            PageState::ScanComplete => "scan-complete",
            PageState::Cleaning => "cleaning",
            PageState::CleanComplete => "clean-complete",
            PageState::Error => "error",
        }
    }

    /// A coordinator owns the category rows in this state.
    pub fn is_busy(&self) -> bool {
        matches!(self, PageState::Scanning | PageState::Cleaning)
    }
}

impl fmt::Display for PageState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageEvent {
    StartScan,
    ScanFinished,
    StartClean { selected: usize },
    CleanFinished,
    /// The elevation prompt was refused before any category was touched.
    PrivilegeRefused,
    BatchFailed(String),
    Acknowledge,
}

impl PageEvent {
    fn action(&self) -> &'static str {
        match self {
            PageEvent::StartScan => "start a scan",
            PageEvent::ScanFinished => "finish a scan",
            PageEvent::StartClean { .. } => "start cleaning",
            PageEvent::CleanFinished => "finish cleaning",
            PageEvent::PrivilegeRefused => "roll back a refused clean",
            PageEvent::BatchFailed(_) => "fail a batch",
            PageEvent::Acknowledge => "acknowledge",
        }
    }
}

#[derive(Debug, Clone)]
pub struct PageMachine {
    state: PageState,
    last_error: Option<String>,
}

impl Default for PageMachine {
    fn default() -> Self {
        Self {
            state: PageState::Initial,
            last_error: None,
        }
    }
}

impl PageMachine {
    pub fn state(&self) -> PageState {
        self.state
    }

    /// Message of the batch failure that put the page into `error`.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Compute the next state without applying it.
    pub fn next(&self, event: &PageEvent) -> Result<PageState, EngineError> {
        use PageState::*;

        let next = match (self.state, event) {
            // A scan may supersede one in flight; `error` retries through here.
            (Initial | Scanning | ScanComplete | Error, PageEvent::StartScan) => Scanning,
            (Scanning, PageEvent::ScanFinished) => ScanComplete,
            (ScanComplete, PageEvent::StartClean { selected: 0 }) => {
                return Err(EngineError::NothingSelected)
            }
            (ScanComplete, PageEvent::StartClean { .. }) => Cleaning,
            (Cleaning, PageEvent::CleanFinished) => CleanComplete,
            (Cleaning, PageEvent::PrivilegeRefused) => ScanComplete,
            (Scanning | Cleaning, PageEvent::BatchFailed(_)) => Error,
            (CleanComplete, PageEvent::Acknowledge) => Initial,
            (from, event) => {
                return Err(EngineError::InvalidTransition {
                    from,
                    action: event.action(),
                })
            }
        };
        Ok(next)
    }

    pub fn apply(&mut self, event: PageEvent) -> Result<PageState, EngineError> {
        let next = self.next(&event)?;
        if next != self.state {
            info!(from = %self.state, to = %next, "page transition");
        }
        self.last_error = match event {
            PageEvent::BatchFailed(message) => Some(message),
            _ => None,
        };
        self.state = next;
        Ok(next)
    }
}
