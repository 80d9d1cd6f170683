use std::collections::HashMap;

use crate::error::StorageError;

/// Narrow interface to durable key-value storage
///
/// Everything the history store persists goes through this trait, so the
/// backing technology (SQLite catalog, in-memory fake, ...) is swappable.
pub trait KeyValueStore {
    /// Read the value stored under `key`, `None` if absent
    fn read(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Replace the value stored under `key`
    fn write(&mut self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Remove `key`; removing an absent key is not an error
    fn remove(&mut self, key: &str) -> Result<(), StorageError>;
}

/// In-memory key-value store
///
/// With a value cap it behaves like a browser storage slot: any write of
/// `max_value_bytes` or more is rejected with `QuotaExceeded`.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    slots: HashMap<String, String>,
    max_value_bytes: Option<usize>,
    rejected_writes: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject every value whose length is `max_value_bytes` or more
    pub fn with_max_value_bytes(max_value_bytes: usize) -> Self {
        Self {
            max_value_bytes: Some(max_value_bytes),
            ..Self::default()
        }
    }

    /// Seed a raw value, bypassing the cap
    pub fn insert_raw(&mut self, key: &str, value: &str) {
        self.slots.insert(key.to_string(), value.to_string());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.slots.get(key).map(String::as_str)
    }

    /// Number of writes refused because of the cap
    pub fn rejected_writes(&self) -> usize {
        self.rejected_writes
    }
}

impl KeyValueStore for MemoryStore {
    fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.slots.get(key).cloned())
    }

    fn write(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        if self.max_value_bytes.is_some_and(|max| value.len() >= max) {
            self.rejected_writes += 1;
            return Err(StorageError::QuotaExceeded);
        }
        self.slots.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        self.slots.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_write_remove() {
        let mut store = MemoryStore::new();
        assert_eq!(store.read("k").unwrap(), None);

        store.write("k", "v").unwrap();
        assert_eq!(store.read("k").unwrap().as_deref(), Some("v"));

        store.remove("k").unwrap();
        assert_eq!(store.read("k").unwrap(), None);

        // absent key
        store.remove("k").unwrap();
    }

    #[test]
    fn test_cap_rejects_large_values() {
        let mut store = MemoryStore::with_max_value_bytes(4);
        store.write("k", "abc").unwrap();

        let err = store.write("k", "abcd").unwrap_err();
        assert!(err.is_quota_exceeded());
        assert_eq!(store.rejected_writes(), 1);
        // previous value survives the rejected write
        assert_eq!(store.get("k"), Some("abc"));
    }
}
