//! Terminal styling for the CLI harness.

use colored::Colorize;

use crate::categories::SafetyTier;
use crate::disk::DiskUsageLevel;
use crate::ledger::LedgerOutcome;
use crate::page::PageState;
use crate::state::CategoryStatus;

pub struct Theme;

impl Theme {
    pub fn header(text: &str) -> String {
        text.bold().to_string()
    }

    pub fn muted(text: &str) -> String {
        text.dimmed().to_string()
    }

    pub fn size(text: &str) -> String {
        text.cyan().to_string()
    }

    pub fn success(text: &str) -> String {
        text.green().to_string()
    }

    pub fn warning(text: &str) -> String {
        text.yellow().to_string()
    }

    pub fn error(text: &str) -> String {
        text.red().to_string()
    }

    pub fn divider(width: usize) -> String {
        "-".repeat(width)
    }

    pub fn divider_bold(width: usize) -> String {
        "=".repeat(width)
    }

    pub fn tier(tier: SafetyTier) -> String {
        match tier {
            SafetyTier::Safe => Self::success("safe"),
            SafetyTier::Caution => Self::warning("caution"),
            SafetyTier::Destructive => Self::error("destructive"),
        }
    }

    pub fn status(status: CategoryStatus) -> String {
        let label = match status {
            CategoryStatus::Idle => "idle",
            CategoryStatus::Scanning => "scanning",
            CategoryStatus::Scanned => "scanned",
            CategoryStatus::Cleaning => "cleaning",
            CategoryStatus::Completed => "completed",
            CategoryStatus::Error => "error",
        };
        match status {
            CategoryStatus::Scanned | CategoryStatus::Completed => Self::success(label),
            CategoryStatus::Error => Self::error(label),
            CategoryStatus::Scanning | CategoryStatus::Cleaning => Self::warning(label),
            CategoryStatus::Idle => Self::muted(label),
        }
    }

    pub fn outcome(outcome: LedgerOutcome) -> String {
        match outcome {
            LedgerOutcome::Cleaned => Self::success("cleaned"),
            LedgerOutcome::Failed => Self::error("failed"),
            LedgerOutcome::Skipped => Self::muted("skipped"),
        }
    }

    pub fn disk(level: DiskUsageLevel, text: &str) -> String {
        match level {
            DiskUsageLevel::Critical => Self::error(text),
            DiskUsageLevel::Warning => Self::warning(text),
            DiskUsageLevel::Normal => Self::size(text),
        }
    }

    pub fn page(page: PageState) -> String {
        match page {
            PageState::Error => Self::error(page.as_str()),
            PageState::ScanComplete | PageState::CleanComplete => Self::success(page.as_str()),
            _ => Self::header(page.as_str()),
        }
    }
}
