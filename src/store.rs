//! Persistence contract for daily form snapshots

use std::collections::BTreeMap;
use std::ops::RangeInclusive;

use chrono::NaiveDate;

use crate::error::{FormcastError, Result};
use crate::models::FormSnapshot;

/// Storage for one athlete's snapshot history, ordered by date
pub trait SnapshotStore {
    /// Store snapshots; a date that is already stored is rejected
    fn append(&mut self, snapshots: &[FormSnapshot]) -> Result<()>;

    /// Snapshots with dates inside `dates`, oldest first
    fn range(&self, dates: RangeInclusive<NaiveDate>) -> Result<Vec<FormSnapshot>>;

    /// Most recent snapshot, if any
    fn latest(&self) -> Result<Option<FormSnapshot>>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Default, Clone)]
pub struct InMemorySnapshotStore {
    snapshots: BTreeMap<NaiveDate, FormSnapshot>,
}

impl InMemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serialize the full history as a JSON array, oldest first
    pub fn to_json(&self) -> Result<String> {
        let snapshots: Vec<&FormSnapshot> = self.snapshots.values().collect();
        Ok(serde_json::to_string(&snapshots)?)
    }

    /// Rebuild a store from [`InMemorySnapshotStore::to_json`] output
    pub fn from_json(json: &str) -> Result<Self> {
        let snapshots: Vec<FormSnapshot> = serde_json::from_str(json)?;
        let mut store = Self::new();
        store.append(&snapshots)?;
        Ok(store)
    }
}

impl SnapshotStore for InMemorySnapshotStore {
    fn append(&mut self, snapshots: &[FormSnapshot]) -> Result<()> {
        // Validate the whole batch before inserting so a rejected batch leaves no trace
        let mut seen = std::collections::BTreeSet::new();
        for snapshot in snapshots {
            let date = snapshot.date();
            if self.snapshots.contains_key(&date) || !seen.insert(date) {
                return Err(FormcastError::Storage(format!("snapshot for {} already stored", date)));
            }
        }

        for snapshot in snapshots {
            self.snapshots.insert(snapshot.date(), snapshot.clone());
        }
        tracing::debug!(added = snapshots.len(), total = self.snapshots.len(), "Stored snapshots");
        Ok(())
    }

    fn range(&self, dates: RangeInclusive<NaiveDate>) -> Result<Vec<FormSnapshot>> {
        if dates.start() > dates.end() {
            return Ok(Vec::new());
        }
        Ok(self.snapshots.range(dates).map(|(_, s)| s.clone()).collect())
    }

    fn latest(&self) -> Result<Option<FormSnapshot>> {
        Ok(self.snapshots.values().next_back().cloned())
    }

    fn len(&self) -> usize {
        self.snapshots.len()
    }
}
