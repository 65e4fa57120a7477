//! System optimization items
//!
//! Hibernation file, pagefile and restore points. Each is switched off by a
//! single elevated action rather than by deleting files, so they run through
//! the same confirmation gate and privilege slot as a clean batch but never
//! touch the category rows or the ledger.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use crate::elevation::ElevatedExecutionSession;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimizeKind {
    Hibernation,
    Pagefile,
    RestorePoints,
}

impl OptimizeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OptimizeKind::Hibernation => "hibernation",
            OptimizeKind::Pagefile => "pagefile",
            OptimizeKind::RestorePoints => "restore_points",
        }
    }

    /// Disabling this item can hurt stability; the UI asks twice.
    pub fn is_risky(&self) -> bool {
        matches!(self, OptimizeKind::Pagefile)
    }
}

impl fmt::Display for OptimizeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptimizeItem {
    pub kind: OptimizeKind,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub path: PathBuf,
    pub size_bytes: u64,
    pub enabled: bool,
    pub can_disable: bool,
}

/// Space that disabling every eligible item would give back.
pub fn total_reclaimable(items: &[OptimizeItem]) -> u64 {
    items
        .iter()
        .filter(|i| i.enabled && i.can_disable)
        .map(|i| i.size_bytes)
        .sum()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OptimizeResult {
    pub kind: OptimizeKind,
    pub success: bool,
    pub message: String,
}

impl OptimizeResult {
    pub(crate) fn success(kind: OptimizeKind, message: &str) -> Self {
        Self {
            kind,
            success: true,
            message: message.to_string(),
        }
    }

    pub(crate) fn failure(kind: OptimizeKind, message: &str) -> Self {
        Self {
            kind,
            success: false,
            message: message.to_string(),
        }
    }
}

/// What `Engine::optimize` produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptimizeOutcome {
    /// Nothing ran; call again once the user has confirmed.
    PendingConfirmation(ElevatedExecutionSession),
    Finished(OptimizeResult),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(kind: OptimizeKind, size: u64, enabled: bool, can_disable: bool) -> OptimizeItem {
        OptimizeItem {
            kind,
            name: kind.to_string(),
            description: String::new(),
            path: PathBuf::from("C:\\"),
            size_bytes: size,
            enabled,
            can_disable,
        }
    }

    #[test]
    fn test_total_reclaimable_skips_disabled_items() {
        let items = vec![
            item(OptimizeKind::Hibernation, 6_000, true, true),
            item(OptimizeKind::Pagefile, 4_000, false, false),
            item(OptimizeKind::RestorePoints, 1_000, true, true),
        ];
        assert_eq!(total_reclaimable(&items), 7_000);
    }

    #[test]
    fn test_result_constructors() {
        let ok = OptimizeResult::success(OptimizeKind::Hibernation, "hibernation disabled");
        let err = OptimizeResult::failure(OptimizeKind::Pagefile, "registry write failed");
        assert!(ok.success);
        assert!(!err.success);
        assert_eq!(err.kind, OptimizeKind::Pagefile);
    }

    #[test]
    fn test_only_pagefile_is_risky() {
        assert!(OptimizeKind::Pagefile.is_risky());
        assert!(!OptimizeKind::Hibernation.is_risky());
        assert!(!OptimizeKind::RestorePoints.is_risky());
    }
}
