//! Cleanup ledger: one entry per category per clean phase.

use serde::Serialize;

use crate::error::ErrorKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The category was not checked when the batch ran.
    Unchecked,
    /// Checked, but left out of a narrower request such as a single-row retry.
    NotRequested,
    /// An abort was requested before this category's turn.
    Aborted,
}

impl SkipReason {
    pub fn label(&self) -> &'static str {
        match self {
            SkipReason::Unchecked => "unchecked",
            SkipReason::NotRequested => "not requested",
            SkipReason::Aborted => "aborted",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerOutcome {
    Cleaned,
    Failed,
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CleanupLedgerEntry {
    pub category_id: String,
    pub outcome: LedgerOutcome,
    pub skip_reason: Option<SkipReason>,
    pub bytes_freed: u64,
    pub paths_affected: u64,
    pub error_message: Option<String>,
}

impl CleanupLedgerEntry {
    pub fn cleaned(category_id: &str, bytes_freed: u64, paths_affected: u64) -> Self {
        Self {
            category_id: category_id.to_string(),
            outcome: LedgerOutcome::Cleaned,
            skip_reason: None,
            bytes_freed,
            paths_affected,
            error_message: None,
        }
    }

    /// Failed categories never report freed bytes, even after partial deletion.
    pub fn failed(category_id: &str, message: &str) -> Self {
        Self {
            category_id: category_id.to_string(),
            outcome: LedgerOutcome::Failed,
            skip_reason: None,
            bytes_freed: 0,
            paths_affected: 0,
            error_message: Some(message.to_string()),
        }
    }

    pub fn skipped(category_id: &str, reason: SkipReason) -> Self {
        Self {
            category_id: category_id.to_string(),
            outcome: LedgerOutcome::Skipped,
            skip_reason: Some(reason),
            bytes_freed: 0,
            paths_affected: 0,
            error_message: None,
        }
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self.outcome {
            LedgerOutcome::Failed => Some(ErrorKind::CleanFailure),
            _ => None,
        }
    }
}

/// Totals over a ledger.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CleanSummary {
    pub bytes_freed: u64,
    pub paths_affected: u64,
    pub cleaned: usize,
    pub failed: usize,
    pub skipped: usize,
}

/// Append-only for one clean phase; cleared when the next scan starts.
#[derive(Debug, Clone, Default)]
pub struct Ledger {
    entries: Vec<CleanupLedgerEntry>,
}

impl Ledger {
    /// Record an outcome. A category already in the ledger is left as is.
    pub fn record(&mut self, entry: CleanupLedgerEntry) -> bool {
        if self.contains(&entry.category_id) {
            return false;
        }
        self.entries.push(entry);
        true
    }

    pub fn contains(&self, category_id: &str) -> bool {
        self.entries.iter().any(|e| e.category_id == category_id)
    }

    pub fn entries(&self) -> &[CleanupLedgerEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn summary(&self) -> CleanSummary {
        let mut summary = CleanSummary::default();
        for entry in &self.entries {
            summary.bytes_freed += entry.bytes_freed;
            summary.paths_affected += entry.paths_affected;
            match entry.outcome {
                LedgerOutcome::Cleaned => summary.cleaned += 1,
                LedgerOutcome::Failed => summary.failed += 1,
                LedgerOutcome::Skipped => summary.skipped += 1,
            }
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_counts_only_cleaned_bytes() {
        let mut ledger = Ledger::default();
        ledger.record(CleanupLedgerEntry::cleaned("1", 500, 5));
        ledger.record(CleanupLedgerEntry::failed("2", "in use"));
        ledger.record(CleanupLedgerEntry::cleaned("3", 250, 1));
        ledger.record(CleanupLedgerEntry::skipped("6", SkipReason::Unchecked));

        let summary = ledger.summary();
        assert_eq!(summary.bytes_freed, 750);
        assert_eq!(summary.paths_affected, 6);
        assert_eq!((summary.cleaned, summary.failed, summary.skipped), (2, 1, 1));
    }

    #[test]
    fn test_one_entry_per_category() {
        let mut ledger = Ledger::default();
        assert!(ledger.record(CleanupLedgerEntry::cleaned("1", 1, 1)));
        assert!(!ledger.record(CleanupLedgerEntry::failed("1", "again")));
        assert_eq!(ledger.entries().len(), 1);
        assert_eq!(ledger.entries()[0].outcome, LedgerOutcome::Cleaned);
    }

    #[test]
    fn test_failed_entry_reports_zero_bytes() {
        let entry = CleanupLedgerEntry::failed("4", "access denied");
        assert_eq!(entry.bytes_freed, 0);
        assert_eq!(entry.error_kind(), Some(ErrorKind::CleanFailure));
    }

    #[test]
    fn test_entry_json_shape() {
        let json =
            serde_json::to_value(CleanupLedgerEntry::skipped("7", SkipReason::Aborted)).unwrap();
        assert_eq!(json["outcome"], "skipped");
        assert_eq!(json["skip_reason"], "aborted");
        assert_eq!(json["bytes_freed"], 0);
    }
}
