use crate::error::Result;
use crate::schema::{DateRange, InventorySnapshot, OperationRecord};
use chrono::NaiveDate;
use std::collections::BTreeMap;

/// Read access to submitted reception/dispatch records.
///
/// Implementations filter by operation date, inclusive of both boundaries.
/// Storage failures are returned as-is (see [`crate::WarehouseError::source_error`]).
pub trait OperationSource {
    fn operations(&self, range: DateRange, client: Option<&str>) -> Result<Vec<OperationRecord>>;
}

/// Read access to uploaded daily inventory files, keyed by date.
pub trait SnapshotSource {
    fn snapshots(&self, range: DateRange) -> Result<Vec<InventorySnapshot>>;

    /// Most recent snapshot strictly before `date`.
    fn latest_before(&self, date: NaiveDate) -> Result<Option<InventorySnapshot>>;
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryOperations {
    records: Vec<OperationRecord>,
}

impl InMemoryOperations {
    pub fn new(records: Vec<OperationRecord>) -> Self {
        Self { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl OperationSource for InMemoryOperations {
    fn operations(&self, range: DateRange, client: Option<&str>) -> Result<Vec<OperationRecord>> {
        Ok(self
            .records
            .iter()
            .filter(|r| range.contains(r.date))
            .filter(|r| client.map_or(true, |c| r.client_name == c))
            .cloned()
            .collect())
    }
}

#[derive(Debug, Clone, Default)]
pub struct InMemorySnapshots {
    by_date: BTreeMap<NaiveDate, InventorySnapshot>,
}

impl InMemorySnapshots {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a snapshot under its date, merging into any file already uploaded for that day.
    pub fn upsert(&mut self, snapshot: InventorySnapshot) {
        match self.by_date.get_mut(&snapshot.date) {
            Some(existing) => existing.merge(snapshot),
            None => {
                self.by_date.insert(snapshot.date, snapshot);
            }
        }
    }

    pub fn get(&self, date: NaiveDate) -> Option<&InventorySnapshot> {
        self.by_date.get(&date)
    }

    pub fn len(&self) -> usize {
        self.by_date.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_date.is_empty()
    }
}

impl FromIterator<InventorySnapshot> for InMemorySnapshots {
    fn from_iter<I: IntoIterator<Item = InventorySnapshot>>(iter: I) -> Self {
        let mut store = Self::new();
        for snapshot in iter {
            store.upsert(snapshot);
        }
        store
    }
}

impl SnapshotSource for InMemorySnapshots {
    fn snapshots(&self, range: DateRange) -> Result<Vec<InventorySnapshot>> {
        if range.is_empty() {
            return Ok(Vec::new());
        }
        Ok(self
            .by_date
            .range(range.start..=range.end)
            .map(|(_, s)| s.clone())
            .collect())
    }

    fn latest_before(&self, date: NaiveDate) -> Result<Option<InventorySnapshot>> {
        Ok(self
            .by_date
            .range(..date)
            .next_back()
            .map(|(_, s)| s.clone()))
    }
}
