//! Selection model: the category rows plus which of them are checked.

use std::collections::BTreeMap;
use tracing::debug;

use crate::categories::Registry;
use crate::error::EngineError;
use crate::page::PageState;
use crate::state::CategoryRunState;

/// Category rows in registry order.
///
/// `checked` is written here and nowhere else; the reclaimable total is
/// derived from the rows on every call so it cannot drift.
#[derive(Debug, Clone)]
pub struct SelectionModel {
    rows: Vec<CategoryRunState>,
}

impl SelectionModel {
    /// One idle row per category, checked per registry default unless overridden.
    pub fn seed(registry: &Registry, overrides: &BTreeMap<String, bool>) -> Self {
        let rows = registry
            .iter()
            .map(|category| {
                let checked = overrides
                    .get(&category.id)
                    .copied()
                    .unwrap_or(category.default_checked);
                CategoryRunState::new(category, checked)
            })
            .collect();
        Self { rows }
    }

    pub fn rows(&self) -> &[CategoryRunState] {
        &self.rows
    }

    pub fn get(&self, id: &str) -> Option<&CategoryRunState> {
        self.rows.iter().find(|r| r.id == id)
    }

    pub(crate) fn row_mut(&mut self, id: &str) -> Option<&mut CategoryRunState> {
        self.rows.iter_mut().find(|r| r.id == id)
    }

    pub(crate) fn rows_mut(&mut self) -> impl Iterator<Item = &mut CategoryRunState> {
        self.rows.iter_mut()
    }

    /// Flip `checked`; returns the new value.
    pub fn toggle(&mut self, id: &str, page: PageState) -> Result<bool, EngineError> {
        let current = self.lookup_unlocked(id, page)?.checked;
        self.set_checked(id, !current, page)?;
        Ok(!current)
    }

    pub fn set_checked(
        &mut self,
        id: &str,
        checked: bool,
        page: PageState,
    ) -> Result<(), EngineError> {
        self.lookup_unlocked(id, page)?;
        if let Some(row) = self.row_mut(id) {
            row.checked = checked;
            debug!(category = id, checked, "selection changed");
        }
        Ok(())
    }

    fn lookup_unlocked(&self, id: &str, page: PageState) -> Result<&CategoryRunState, EngineError> {
        let row = self
            .get(id)
            .ok_or_else(|| EngineError::UnknownCategory(id.to_string()))?;
        if page.is_busy() {
            return Err(EngineError::PhaseLocked(page));
        }
        Ok(row)
    }

    pub fn total_selected_size(&self) -> u64 {
        self.rows
            .iter()
            .filter(|r| r.checked)
            .map(|r| r.size_bytes)
            .sum()
    }

    pub fn selected_count(&self) -> usize {
        self.rows.iter().filter(|r| r.checked).count()
    }

    /// Checked ids in display order.
    pub fn selected_ids(&self) -> Vec<String> {
        self.rows
            .iter()
            .filter(|r| r.checked)
            .map(|r| r.id.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::CategoryScan;

    fn model() -> SelectionModel {
        SelectionModel::seed(&Registry::builtin(), &BTreeMap::new())
    }

    fn scan(model: &mut SelectionModel, id: &str, size: u64) {
        let row = model.row_mut(id).unwrap();
        row.begin_scan();
        row.apply_scan(CategoryScan {
            size_bytes: size,
            ..Default::default()
        });
    }

    #[test]
    fn test_seed_uses_defaults_and_overrides() {
        let mut overrides = BTreeMap::new();
        overrides.insert("1".to_string(), false);
        overrides.insert("6".to_string(), true);
        let model = SelectionModel::seed(&Registry::builtin(), &overrides);

        assert!(!model.get("1").unwrap().checked);
        assert!(model.get("6").unwrap().checked);
        assert!(!model.get("7").unwrap().checked);
        assert_eq!(model.selected_count(), 5);
    }

    #[test]
    fn test_total_tracks_toggles_and_scans() {
        let mut model = model();
        scan(&mut model, "1", 2_469_606_195);
        scan(&mut model, "2", 1_932_735_283);
        scan(&mut model, "6", 1_000);
        assert_eq!(model.total_selected_size(), 4_402_341_478);

        model.toggle("2", PageState::ScanComplete).unwrap();
        assert_eq!(model.total_selected_size(), 2_469_606_195);

        model.toggle("6", PageState::ScanComplete).unwrap();
        assert_eq!(model.total_selected_size(), 2_469_607_195);
    }

    #[test]
    fn test_toggle_rejected_while_busy() {
        let mut model = model();
        let before = model.get("1").unwrap().checked;

        for page in [PageState::Scanning, PageState::Cleaning] {
            assert_eq!(
                model.toggle("1", page),
                Err(EngineError::PhaseLocked(page))
            );
        }
        assert_eq!(model.get("1").unwrap().checked, before);
    }

    #[test]
    fn test_toggle_unknown_is_error_and_noop() {
        let mut model = model();
        let before = model.selected_ids();
        assert_eq!(
            model.toggle("99", PageState::Initial),
            Err(EngineError::UnknownCategory("99".to_string()))
        );
        assert_eq!(model.selected_ids(), before);
    }

    #[test]
    fn test_selected_ids_in_display_order() {
        let mut model = model();
        model.set_checked("7", true, PageState::Initial).unwrap();
        model.set_checked("2", false, PageState::Initial).unwrap();
        assert_eq!(model.selected_ids(), vec!["1", "3", "4", "5", "7"]);
    }
}
