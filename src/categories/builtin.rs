//! Default clean-page catalog.

use super::{Category, CategoryKind, SafetyTier};

pub(super) fn categories() -> Vec<Category> {
    vec![
        Category::new("1", "System temp files", CategoryKind::TempFiles, SafetyTier::Safe),
        Category::new("2", "Browser cache", CategoryKind::BrowserCache, SafetyTier::Safe),
        // Emptying the bin cannot be undone.
        Category::new("3", "Recycle bin", CategoryKind::RecycleBin, SafetyTier::Caution)
            .checked_by_default(true),
        Category::new(
            "4",
            "Windows Update cache",
            CategoryKind::UpdateCache,
            SafetyTier::Caution,
        )
        .checked_by_default(true)
        .elevated(),
        Category::new("5", "System files", CategoryKind::SystemFiles, SafetyTier::Safe).elevated(),
        Category::new("6", "App cache", CategoryKind::AppCache, SafetyTier::Caution),
        Category::new("7", "App log files", CategoryKind::AppLogs, SafetyTier::Caution),
    ]
}
