use crate::error::{CodeKind, ReconciliationError, Result};
use crate::ingestion::{FromRawRow, Staged};
use crate::schema::{StaffId, StoreId};
use log::{debug, warn};
use std::collections::HashMap;

/// Pre-fetched master data: external store/staff codes to internal identifiers.
#[derive(Debug, Clone, Default)]
pub struct IdentifierMap {
    stores: HashMap<String, StoreId>,
    staff: HashMap<String, StaffId>,
}

impl IdentifierMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_store(mut self, code: impl Into<String>, id: StoreId) -> Self {
        self.insert_store(code, id);
        self
    }

    pub fn with_staff(mut self, code: impl Into<String>, id: StaffId) -> Self {
        self.insert_staff(code, id);
        self
    }

    pub fn insert_store(&mut self, code: impl Into<String>, id: StoreId) {
        self.stores.insert(code.into().trim().to_string(), id);
    }

    pub fn insert_staff(&mut self, code: impl Into<String>, id: StaffId) {
        self.staff.insert(code.into().trim().to_string(), id);
    }

    pub fn store(&self, code: &str) -> Option<StoreId> {
        self.stores.get(code.trim()).copied()
    }

    pub fn staff(&self, code: &str) -> Option<StaffId> {
        self.staff.get(code.trim()).copied()
    }

    pub fn store_count(&self) -> usize {
        self.stores.len()
    }

    pub fn staff_count(&self) -> usize {
        self.staff.len()
    }

    /// Rewrites every staged record with internal identifiers.
    ///
    /// The first unknown code aborts the whole import; nothing is dropped silently.
    pub fn resolve<T: FromRawRow>(&self, staged: Vec<Staged<T>>) -> Result<Vec<T>> {
        let mut resolved = Vec::with_capacity(staged.len());

        for item in staged {
            let codes = item.codes();
            let store_id = self.store(&codes.store).ok_or_else(|| {
                warn!("Row {}: unknown store code '{}'", item.row(), codes.store);
                ReconciliationError::Resolution {
                    row: item.row(),
                    kind: CodeKind::Store,
                    code: codes.store.clone(),
                }
            })?;

            let staff_id = match &codes.staff {
                Some(code) => Some(self.staff(code).ok_or_else(|| {
                    warn!("Row {}: unknown staff code '{}'", item.row(), code);
                    ReconciliationError::Resolution {
                        row: item.row(),
                        kind: CodeKind::Staff,
                        code: code.clone(),
                    }
                })?),
                None => None,
            };

            let mut record = item.record;
            record.assign_ids(store_id, staff_id);
            resolved.push(record);
        }

        debug!(
            "Resolved identifiers for {} {} record(s) against {} store and {} staff code(s)",
            resolved.len(),
            T::KIND,
            self.store_count(),
            self.staff_count()
        );
        Ok(resolved)
    }
}
