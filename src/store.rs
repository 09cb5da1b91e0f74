use tracing::{debug, warn};

use crate::domain::CTVError;
use crate::record::{Dataset, Record};

/// Owns the loaded dataset.
#[derive(Debug, Default)]
pub struct RowStore {
    dataset: Dataset,
}

impl RowStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the dataset. Zero rows leave the current dataset untouched.
    pub fn load(&mut self, rows: Vec<Record>) -> Result<(), CTVError> {
        if rows.is_empty() {
            warn!("Refusing to load an empty dataset");
            return Err(CTVError::EmptyDataset);
        }
        self.dataset = Dataset::from_rows(rows);
        debug!(
            "Row store holds {} rows, columns {:?}",
            self.dataset.len(),
            self.dataset.columns
        );
        Ok(())
    }

    pub fn replace(&mut self, dataset: Dataset) {
        self.dataset = dataset;
    }

    pub fn clear(&mut self) {
        self.dataset = Dataset::default();
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    pub fn is_empty(&self) -> bool {
        self.dataset.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(name: &str) -> Record {
        [("name", name), ("profession", "Wizard")].into_iter().collect()
    }

    #[test]
    fn load_sets_rows_and_columns() {
        let mut store = RowStore::new();
        store.load(vec![row("A"), row("B")]).unwrap();
        assert_eq!(store.dataset().len(), 2);
        assert_eq!(store.dataset().columns, vec!["name", "profession"]);
    }

    #[test]
    fn empty_load_is_rejected_and_keeps_data() {
        let mut store = RowStore::new();
        store.load(vec![row("A")]).unwrap();
        assert!(matches!(store.load(Vec::new()), Err(CTVError::EmptyDataset)));
        assert_eq!(store.dataset().len(), 1);
    }

    #[test]
    fn clear_empties_everything() {
        let mut store = RowStore::new();
        store.load(vec![row("A")]).unwrap();
        store.clear();
        assert!(store.is_empty());
        assert!(store.dataset().columns.is_empty());
    }
}
