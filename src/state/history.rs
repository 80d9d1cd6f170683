/// Bounded, newest-first history of processing records
///
/// Every public operation loads, mutates and persists within one call. The
/// in-memory collection always mirrors what was last written durably: when
/// storage rejects a write, the collection is truncated to whatever the
/// storage finally accepted.

use std::mem;
use tracing::{debug, error, warn};

use super::data::{AccountTier, ProcessingRecord};
use super::quota::{evict_oldest, total_size, QuotaPolicy, StorageUsage};
use super::storage::KeyValueStore;
use crate::error::{HistoryError, StorageError};

/// Records kept on the first fallback step after a rejected write
pub const FALLBACK_KEEP: usize = 5;

/// Storage key holding an account's history
pub fn storage_key(account_id: &str) -> String {
    format!("history:{account_id}")
}

/// Next, strictly smaller length on the truncation ladder
fn shrink_len(len: usize) -> usize {
    if len > FALLBACK_KEEP {
        FALLBACK_KEEP
    } else {
        len / 2
    }
}

pub struct HistoryStore<P> {
    port: P,
    key: String,
    policy: QuotaPolicy,
    records: Vec<ProcessingRecord>,
}

impl<P: KeyValueStore> HistoryStore<P> {
    /// Bind to `account_id`'s slot in `port` and load what is stored there
    pub fn open(port: P, account_id: &str, policy: QuotaPolicy) -> Self {
        let mut store = Self {
            port,
            key: storage_key(account_id),
            policy,
            records: Vec::new(),
        };
        store.records = store.load();
        store
    }

    /// Read the persisted collection.
    ///
    /// A missing slot, an unreadable slot or a blob that does not parse all
    /// yield an empty collection.
    pub fn load(&self) -> Vec<ProcessingRecord> {
        let blob = match self.port.read(&self.key) {
            Ok(Some(blob)) => blob,
            Ok(None) => return Vec::new(),
            Err(err) => {
                warn!(key = %self.key, "failed to read history, starting empty: {err}");
                return Vec::new();
            }
        };

        match serde_json::from_str(&blob) {
            Ok(records) => records,
            Err(err) => {
                warn!(key = %self.key, "discarding corrupt history blob: {err}");
                Vec::new()
            }
        }
    }

    /// Newest first
    pub fn list(&self) -> &[ProcessingRecord] {
        &self.records
    }

    pub fn select(&self, id: &str) -> Option<&ProcessingRecord> {
        self.records.iter().find(|record| record.id() == id)
    }

    /// Prepend `record`, evict the oldest records until the total fits the
    /// tier's budget, then persist.
    ///
    /// Calling this twice with equal records stores two entries.
    /// Fails with `RecordNotArchived` when storage would not accept even the
    /// new record on its own; the previously stored history is then left
    /// untouched, in storage and in memory.
    pub fn insert(
        &mut self,
        mut record: ProcessingRecord,
        tier: AccountTier,
    ) -> Result<&[ProcessingRecord], HistoryError> {
        debug_assert!(!record.id().is_empty(), "record without id");

        // newest first, strictly
        if let Some(newest) = self.records.first() {
            if record.created_at() <= newest.created_at() {
                record = record.created_after(newest.created_at());
            }
        }

        let id = record.id().to_string();
        let budget = self.policy.budget_for(tier);

        let mut records = mem::take(&mut self.records);
        records.insert(0, record);
        evict_oldest(&mut records, budget);

        match self.persist_records(records, 1) {
            Ok(()) => Ok(&self.records),
            Err(HistoryError::Storage(StorageError::QuotaExceeded)) => {
                error!(%id, "history cannot hold the new record");
                Err(HistoryError::RecordNotArchived { id })
            }
            Err(err) => Err(err),
        }
    }

    /// Write the current collection to storage
    pub fn persist(&mut self) -> Result<(), HistoryError> {
        let records = mem::take(&mut self.records);
        self.persist_records(records, 0)
    }

    /// Remove the record with `id`. Absent ids are a no-op.
    pub fn delete_one(&mut self, id: &str) -> Result<&[ProcessingRecord], HistoryError> {
        if self.select(id).is_none() {
            return Ok(&self.records);
        }

        let mut records = mem::take(&mut self.records);
        records.retain(|record| record.id() != id);
        self.persist_records(records, 0)?;

        Ok(&self.records)
    }

    /// Drop every record and the storage slot with them
    pub fn clear(&mut self) -> Result<(), HistoryError> {
        self.persist_records(Vec::new(), 0)
    }

    pub fn used_bytes(&self) -> u64 {
        total_size(&self.records)
    }

    pub fn budget_bytes(&self, tier: AccountTier) -> u64 {
        self.policy.budget_for(tier)
    }

    pub fn usage(&self, tier: AccountTier) -> StorageUsage {
        StorageUsage::new(&self.records, self.budget_bytes(tier))
    }

    pub fn policy(&self) -> &QuotaPolicy {
        &self.policy
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn port(&self) -> &P {
        &self.port
    }

    pub fn into_port(self) -> P {
        self.port
    }

    /// Persist `records`, walking down the truncation ladder while storage
    /// reports `QuotaExceeded`. On return, `self.records` is what storage holds.
    ///
    /// The ladder never goes below `floor` records. When a write of `floor`
    /// records is rejected too, nothing was written: the stored history is
    /// reloaded and `Storage(QuotaExceeded)` returned. With a floor of zero
    /// the last rung removes the slot.
    fn persist_records(
        &mut self,
        mut records: Vec<ProcessingRecord>,
        floor: usize,
    ) -> Result<(), HistoryError> {
        loop {
            if records.is_empty() {
                return match self.port.remove(&self.key) {
                    Ok(()) => {
                        self.records = records;
                        Ok(())
                    }
                    Err(err) => {
                        error!(key = %self.key, "cannot persist any history: {err}");
                        self.records = self.load();
                        Err(HistoryError::CannotPersist(err))
                    }
                };
            }

            let blob = match serde_json::to_string(&records) {
                Ok(blob) => blob,
                Err(err) => {
                    self.records = self.load();
                    return Err(err.into());
                }
            };

            match self.port.write(&self.key, &blob) {
                Ok(()) => {
                    debug!(
                        key = %self.key,
                        records = records.len(),
                        bytes = blob.len(),
                        used = total_size(&records),
                        "history persisted"
                    );
                    self.records = records;
                    return Ok(());
                }
                Err(StorageError::QuotaExceeded) if records.len() <= floor => {
                    warn!(
                        key = %self.key,
                        rejected_bytes = blob.len(),
                        "storage full, keeping previous history"
                    );
                    self.records = self.load();
                    return Err(StorageError::QuotaExceeded.into());
                }
                Err(StorageError::QuotaExceeded) => {
                    let keep = shrink_len(records.len()).max(floor);
                    warn!(
                        key = %self.key,
                        rejected_bytes = blob.len(),
                        from = records.len(),
                        to = keep,
                        "storage full, truncating history"
                    );
                    records.truncate(keep);
                }
                Err(err) => {
                    error!(key = %self.key, "failed to persist history: {err}");
                    self.records = self.load();
                    return Err(err.into());
                }
            }
        }
    }
}

impl<P> std::fmt::Debug for HistoryStore<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HistoryStore")
            .field("key", &self.key)
            .field("records", &self.records.len())
            .field("used_bytes", &total_size(&self.records))
            .finish()
    }
}
