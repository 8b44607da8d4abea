//! Pending clearing store.
//!
//! Records are keyed by (partition, holder, clearing id). A per-type index
//! lists the ids of each (partition, holder, operation type) for paging;
//! removal swaps the last id into the vacated slot, so enumeration order is
//! not preserved across removals.
//!
//! Clearing ids come from one counter per (partition, holder) shared by all
//! operation types. Counters only ever grow, so ids are never reused.

use std::collections::HashMap;

use tokenclear_types::{
    AccountId, ClearingError, ClearingId, ClearingIdentifier, ClearingOperationType,
    ClearingRecord, Partition, Result,
};

type RecordKey = (Partition, AccountId, ClearingId);
type TypeKey = (Partition, AccountId, ClearingOperationType);

/// Pending clearings plus their per-type enumeration index.
#[derive(Debug, Default)]
pub struct ClearingStore {
    records: HashMap<RecordKey, ClearingRecord>,
    /// Ids per (partition, holder, type), unordered.
    by_type: HashMap<TypeKey, Vec<ClearingId>>,
    /// Slot of each id inside its `by_type` vector.
    positions: HashMap<RecordKey, usize>,
    /// Last id handed out per (partition, holder).
    counters: HashMap<(Partition, AccountId), ClearingId>,
}

impl ClearingStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the next clearing id for (partition, holder). Starts at 1.
    pub fn next_id(&mut self, partition: Partition, holder: AccountId) -> ClearingId {
        let counter = self
            .counters
            .entry((partition, holder))
            .or_insert(ClearingId(0));
        *counter = counter.next();
        *counter
    }

    /// Last id allocated for (partition, holder), `ClearingId(0)` if none.
    #[must_use]
    pub fn last_id(&self, partition: Partition, holder: AccountId) -> ClearingId {
        self.counters
            .get(&(partition, holder))
            .copied()
            .unwrap_or(ClearingId(0))
    }

    /// Insert a pending record.
    ///
    /// # Errors
    /// Returns [`ClearingError::DuplicateClearingId`] if the key is taken.
    pub fn put(&mut self, record: ClearingRecord) -> Result<()> {
        let header = &record.header;
        let key = (header.partition, header.token_holder, header.clearing_id);
        if self.records.contains_key(&key) {
            return Err(ClearingError::DuplicateClearingId(header.clearing_id));
        }

        let ids = self
            .by_type
            .entry((header.partition, header.token_holder, record.operation_type()))
            .or_default();
        self.positions.insert(key, ids.len());
        ids.push(header.clearing_id);

        tracing::debug!(clearing = %record.identifier(), "Clearing stored");
        self.records.insert(key, record);
        Ok(())
    }

    /// Look up a pending record; the operation type must match.
    ///
    /// # Errors
    /// Returns [`ClearingError::WrongClearingId`] if absent or stored under
    /// another operation type.
    pub fn get(&self, id: &ClearingIdentifier) -> Result<&ClearingRecord> {
        self.records
            .get(&(id.partition, id.token_holder, id.clearing_id))
            .filter(|record| record.operation_type() == id.operation_type)
            .ok_or(ClearingError::WrongClearingId {
                holder: id.token_holder,
                clearing_id: id.clearing_id,
                operation_type: id.operation_type,
            })
    }

    /// Delete a pending record and its index entry (swap-and-pop).
    pub fn remove(&mut self, id: &ClearingIdentifier) -> Result<ClearingRecord> {
        self.get(id)?;
        let key = (id.partition, id.token_holder, id.clearing_id);
        let record = self
            .records
            .remove(&key)
            .ok_or_else(|| ClearingError::Internal(format!("record {id} vanished")))?;

        let type_key = (id.partition, id.token_holder, id.operation_type);
        let slot = self.positions.remove(&key);
        if let (Some(slot), Some(ids)) = (slot, self.by_type.get_mut(&type_key)) {
            ids.swap_remove(slot);
            if let Some(moved) = ids.get(slot) {
                self.positions
                    .insert((id.partition, id.token_holder, *moved), slot);
            }
            if ids.is_empty() {
                self.by_type.remove(&type_key);
            }
        }

        tracing::debug!(clearing = %id, "Clearing removed");
        Ok(record)
    }

    /// Number of pending clearings of one type for (partition, holder).
    #[must_use]
    pub fn count_by_type(
        &self,
        partition: Partition,
        holder: AccountId,
        operation_type: ClearingOperationType,
    ) -> usize {
        self.by_type
            .get(&(partition, holder, operation_type))
            .map_or(0, Vec::len)
    }

    /// One page of pending ids of one type. Order is unspecified.
    #[must_use]
    pub fn list_by_type(
        &self,
        partition: Partition,
        holder: AccountId,
        operation_type: ClearingOperationType,
        offset: usize,
        limit: usize,
    ) -> Vec<ClearingId> {
        self.by_type
            .get(&(partition, holder, operation_type))
            .map(|ids| ids.iter().skip(offset).take(limit).copied().collect())
            .unwrap_or_default()
    }

    /// Total pending clearings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
