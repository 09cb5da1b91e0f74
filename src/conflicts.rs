use std::collections::HashMap;

use tracing::debug;

use crate::record::{Dataset, NAME_COLUMN, PROFESSION_COLUMN};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conflict {
    pub key: String,
    pub values: Vec<String>,
}

impl Conflict {
    pub fn joined_values(&self) -> String {
        self.values.join(", ")
    }
}

pub type ConflictReport = Vec<Conflict>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConflictOutcome {
    /// At least one name maps to more than one profession.
    Found(ConflictReport),
    /// Every name maps to a single profession.
    NoConflicts,
    /// There was nothing to check.
    NoData,
}

/// Groups records by `name` and reports names carrying more than one distinct
/// `profession`. Entries and their values keep first-seen order.
pub fn detect_conflicts(dataset: &Dataset) -> ConflictOutcome {
    if dataset.is_empty() {
        return ConflictOutcome::NoData;
    }

    let mut groups: Vec<Conflict> = Vec::new();
    let mut positions: HashMap<&str, usize> = HashMap::new();
    for row in dataset.rows.iter() {
        let name = row.value(NAME_COLUMN);
        if name.is_empty() {
            continue;
        }
        let profession = row.value(PROFESSION_COLUMN);
        let idx = *positions.entry(name).or_insert_with(|| {
            groups.push(Conflict {
                key: name.to_string(),
                values: Vec::new(),
            });
            groups.len() - 1
        });
        let values = &mut groups[idx].values;
        if !values.iter().any(|v| v == profession) {
            values.push(profession.to_string());
        }
    }

    let report: ConflictReport = groups.into_iter().filter(|c| c.values.len() > 1).collect();
    debug!("Conflict scan over {} rows found {} conflicts", dataset.len(), report.len());
    if report.is_empty() {
        ConflictOutcome::NoConflicts
    } else {
        ConflictOutcome::Found(report)
    }
}
