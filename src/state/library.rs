use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use tracing::info;

use super::storage::KeyValueStore;
use crate::error::StorageError;

/// SQLite-backed key-value slots.
///
/// The catalog database holds one `kv` table; each account's history is a
/// single JSON value under its own key.
pub struct SqliteStore {
    conn: Connection,
    db_path: Option<PathBuf>,
    max_value_bytes: Option<usize>,
}

impl SqliteStore {
    /// Open (or create) the catalog at `db_path` and initialize the schema.
    pub fn open(db_path: &Path) -> Result<Self, StorageError> {
        // Ensure the parent directory exists
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(db_path)?;
        info!("📁 History catalog opened at: {}", db_path.display());

        let store = SqliteStore {
            conn,
            db_path: Some(db_path.to_path_buf()),
            max_value_bytes: None,
        };
        store.init_schema()?;

        Ok(store)
    }

    /// Catalog that lives only as long as this value
    pub fn open_in_memory() -> Result<Self, StorageError> {
        let store = SqliteStore {
            conn: Connection::open_in_memory()?,
            db_path: None,
            max_value_bytes: None,
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Hard cap on a single stored value, independent of any history budget.
    /// Values of `max` bytes or more are rejected with `QuotaExceeded`.
    pub fn with_max_value_bytes(mut self, max: Option<usize>) -> Self {
        self.max_value_bytes = max;
        self
    }

    /// Where the catalog lives by default:
    /// - Linux: ~/.local/share/style-extract/style_extract.db
    /// - macOS: ~/Library/Application Support/style-extract/style_extract.db
    /// - Windows: %APPDATA%\style-extract\style_extract.db
    ///
    /// Falls back to the working directory when no home can be determined.
    pub fn default_db_path() -> PathBuf {
        let mut path = dirs::data_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."));

        path.push("style-extract");
        path.push("style_extract.db");
        path
    }

    fn init_schema(&self) -> Result<(), StorageError> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS kv (
                key             TEXT PRIMARY KEY,
                value           TEXT NOT NULL,
                updated_at      INTEGER NOT NULL
            )",
            [],
        )?;
        Ok(())
    }

    /// Path to the database file, `None` for in-memory catalogs
    pub fn path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    /// Number of occupied slots
    pub fn slot_count(&self) -> Result<i64, StorageError> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM kv", [], |row| row.get(0))?;
        Ok(count)
    }
}

impl KeyValueStore for SqliteStore {
    fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        let value = self
            .conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(value)
    }

    fn write(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        if self.max_value_bytes.is_some_and(|max| value.len() >= max) {
            return Err(StorageError::QuotaExceeded);
        }

        self.conn.execute(
            "INSERT INTO kv (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, value, Utc::now().timestamp()],
        )?;
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        self.conn
            .execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(())
    }
}

// Implement Debug for better error messages
impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore")
            .field("db_path", &self.db_path)
            .field("max_value_bytes", &self.max_value_bytes)
            .finish()
    }
}
