use crate::schema::{
    PayrollRecord, SalesActualRecord, SalesForecastRecord, StaffId, StoreId,
    WorkHoursActualRecord, YearMonth,
};
use chrono::NaiveDate;
use log::debug;
use std::collections::BTreeMap;

/// Composite identity of one logical record within an import.
pub trait DedupKey {
    type Key: Ord + Clone + std::fmt::Debug;

    fn dedup_key(&self) -> Self::Key;
}

impl DedupKey for WorkHoursActualRecord {
    type Key = (StoreId, StaffId, NaiveDate);

    fn dedup_key(&self) -> Self::Key {
        (self.store_id, self.staff_id, self.shift_date)
    }
}

impl DedupKey for PayrollRecord {
    type Key = (StoreId, StaffId, YearMonth);

    fn dedup_key(&self) -> Self::Key {
        (self.store_id, self.staff_id, YearMonth { year: self.year, month: self.month })
    }
}

impl DedupKey for SalesActualRecord {
    type Key = (StoreId, YearMonth);

    fn dedup_key(&self) -> Self::Key {
        (self.store_id, YearMonth { year: self.year, month: self.month })
    }
}

impl DedupKey for SalesForecastRecord {
    type Key = (StoreId, YearMonth);

    fn dedup_key(&self) -> Self::Key {
        (self.store_id, YearMonth { year: self.year, month: self.month })
    }
}

#[derive(Debug, Clone)]
pub struct Deduplicated<T> {
    /// One record per key, ordered by the position where each key first appeared.
    pub records: Vec<T>,
    pub duplicates_removed: usize,
}

/// Collapses records sharing a key; the last one in import order wins.
pub fn deduplicate<T: DedupKey>(records: Vec<T>) -> Deduplicated<T> {
    let total = records.len();
    // key -> (first position, latest record)
    let mut latest: BTreeMap<T::Key, (usize, T)> = BTreeMap::new();

    for (position, record) in records.into_iter().enumerate() {
        let key = record.dedup_key();
        match latest.get_mut(&key) {
            Some(slot) => slot.1 = record,
            None => {
                latest.insert(key, (position, record));
            }
        }
    }

    let mut kept: Vec<(usize, T)> = latest.into_values().collect();
    kept.sort_by_key(|(position, _)| *position);

    let records: Vec<T> = kept.into_iter().map(|(_, record)| record).collect();
    let duplicates_removed = total - records.len();

    if duplicates_removed > 0 {
        debug!(
            "Collapsed {} duplicate record(s); {} remain",
            duplicates_removed,
            records.len()
        );
    }

    Deduplicated {
        records,
        duplicates_removed,
    }
}
