//! Category registry
//!
//! Static catalog of cleanable categories. Entries are immutable once the
//! registry is built and are always iterated in display order.

mod builtin;
pub mod detail;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

pub use detail::{BrowserCache, CategoryDetail, SizedGroup};

/// How much care a category needs before it is cleaned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SafetyTier {
    Safe,
    Caution,
    Destructive,
}

/// Closed set of category kinds; selects the shape of [`CategoryDetail`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoryKind {
    TempFiles,
    BrowserCache,
    RecycleBin,
    UpdateCache,
    SystemFiles,
    Downloads,
    AppCache,
    AppLogs,
}

impl CategoryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CategoryKind::TempFiles => "temp_files",
            CategoryKind::BrowserCache => "browser_cache",
            CategoryKind::RecycleBin => "recycle_bin",
            CategoryKind::UpdateCache => "update_cache",
            CategoryKind::SystemFiles => "system_files",
            CategoryKind::Downloads => "downloads",
            CategoryKind::AppCache => "app_cache",
            CategoryKind::AppLogs => "app_logs",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub name: String,
    pub kind: CategoryKind,
    pub safety_tier: SafetyTier,
    pub default_checked: bool,
    /// Deleting this category touches machine-wide locations.
    pub requires_elevation: bool,
}

impl Category {
    pub fn new(id: &str, name: &str, kind: CategoryKind, safety_tier: SafetyTier) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            kind,
            safety_tier,
            default_checked: safety_tier == SafetyTier::Safe,
            requires_elevation: false,
        }
    }

    pub fn checked_by_default(mut self, checked: bool) -> Self {
        self.default_checked = checked;
        self
    }

    pub fn elevated(mut self) -> Self {
        self.requires_elevation = true;
        self
    }
}

#[derive(Debug, Clone)]
pub struct Registry {
    categories: Vec<Category>,
}

impl Registry {
    /// Build a registry; ids must be unique.
    pub fn new(categories: Vec<Category>) -> Result<Self, EngineError> {
        for (i, category) in categories.iter().enumerate() {
            if categories[..i].iter().any(|c| c.id == category.id) {
                return Err(EngineError::DuplicateCategory(category.id.clone()));
            }
        }
        Ok(Self { categories })
    }

    /// The seven clean-page categories shipped with the app.
    pub fn builtin() -> Self {
        Self {
            categories: builtin::categories(),
        }
    }

    pub fn lookup(&self, id: &str) -> Option<&Category> {
        self.categories.iter().find(|c| c.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.lookup(id).is_some()
    }

    pub fn position(&self, id: &str) -> Option<usize> {
        self.categories.iter().position(|c| c.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Category> {
        self.categories.iter()
    }

    pub fn ids(&self) -> Vec<String> {
        self.categories.iter().map(|c| c.id.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    /// Fail with `UnknownCategory` on the first id the registry does not know.
    pub fn ensure_known<'a, I>(&self, ids: I) -> Result<(), EngineError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        for id in ids {
            if !self.contains(id) {
                return Err(EngineError::UnknownCategory(id.to_string()));
            }
        }
        Ok(())
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_order_and_defaults() {
        let registry = Registry::builtin();
        assert_eq!(registry.ids(), vec!["1", "2", "3", "4", "5", "6", "7"]);

        let checked: Vec<&str> = registry
            .iter()
            .filter(|c| c.default_checked)
            .map(|c| c.id.as_str())
            .collect();
        assert_eq!(checked, vec!["1", "2", "3", "4", "5"]);
    }

    #[test]
    fn test_builtin_elevated_categories() {
        let registry = Registry::builtin();
        let elevated: Vec<&str> = registry
            .iter()
            .filter(|c| c.requires_elevation)
            .map(|c| c.id.as_str())
            .collect();
        assert_eq!(elevated, vec!["4", "5"]);
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let result = Registry::new(vec![
            Category::new("a", "A", CategoryKind::TempFiles, SafetyTier::Safe),
            Category::new("a", "A again", CategoryKind::AppLogs, SafetyTier::Caution),
        ]);
        assert_eq!(
            result.unwrap_err(),
            EngineError::DuplicateCategory("a".to_string())
        );
    }

    #[test]
    fn test_ensure_known() {
        let registry = Registry::builtin();
        assert!(registry.ensure_known(["1", "7"]).is_ok());
        assert_eq!(
            registry.ensure_known(["1", "42"]).unwrap_err(),
            EngineError::UnknownCategory("42".to_string())
        );
    }

    #[test]
    fn test_default_checked_follows_tier() {
        let safe = Category::new("x", "X", CategoryKind::TempFiles, SafetyTier::Safe);
        let risky = Category::new("y", "Y", CategoryKind::Downloads, SafetyTier::Destructive);
        assert!(safe.default_checked);
        assert!(!risky.default_checked);
        assert!(risky.checked_by_default(true).default_checked);
    }
}
