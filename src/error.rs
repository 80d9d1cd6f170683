/// Error types shared across the history vault
///
/// Each layer gets its own enum:
/// - StorageError: the key-value persistence port
/// - HistoryError: the bounded history store
/// - GenerationError: the remote image generator (consumed, never retried here)
/// - MediaError: reading image files from disk

use rusqlite::ErrorCode;
use thiserror::Error;

/// Failures reported by a key-value persistence port
#[derive(Debug, Error)]
pub enum StorageError {
    /// The backend refused the value because the slot cannot hold it
    #[error("storage quota exceeded")]
    QuotaExceeded,
    /// Anything else the backend reports (I/O, locking, schema)
    #[error("storage backend failure: {0}")]
    Backend(String),
}

impl StorageError {
    pub fn is_quota_exceeded(&self) -> bool {
        matches!(self, StorageError::QuotaExceeded)
    }
}

impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::SqliteFailure(ref failure, _)
                if failure.code == ErrorCode::TooBig || failure.code == ErrorCode::DiskFull =>
            {
                StorageError::QuotaExceeded
            }
            other => StorageError::Backend(other.to_string()),
        }
    }
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::Backend(err.to_string())
    }
}

/// Failures surfaced by the history store
///
/// Degraded conditions (corrupt blob, over-quota writes that succeed after
/// truncation) never produce one of these.
#[derive(Debug, Error)]
pub enum HistoryError {
    /// Storage rejected every rung of the truncation ladder, down to the record itself
    #[error("record {id} could not be saved to history")]
    RecordNotArchived { id: String },
    /// Not even an empty history could be written
    #[error("cannot persist any history: {0}")]
    CannotPersist(#[source] StorageError),
    /// Non-quota backend failure; durable state is unchanged
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("failed to serialize history: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Classified failures of the remote image generator
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerationError {
    #[error("generator rejected the credentials")]
    Auth,
    #[error("generator quota exceeded")]
    QuotaExceeded,
    #[error("generator rate limited")]
    RateLimited,
    #[error("generation failed: {0}")]
    Unknown(String),
}

impl GenerationError {
    /// Triage a raw error message from the generator into a class
    pub fn classify(message: &str) -> Self {
        let lower = message.to_lowercase();

        if lower.contains("api key") || lower.contains("403") || lower.contains("permission_denied") {
            GenerationError::Auth
        } else if lower.contains("quota")
            || lower.contains("429")
            || lower.contains("resource_exhausted")
        {
            GenerationError::QuotaExceeded
        } else if lower.contains("rate limit") || lower.contains("503") || lower.contains("overloaded") {
            GenerationError::RateLimited
        } else {
            GenerationError::Unknown(message.to_string())
        }
    }
}

/// Failures while turning files into embedded images
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("failed to read image {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("image file is empty: {0}")]
    Empty(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_generation_errors() {
        assert_eq!(GenerationError::classify("API Key not valid"), GenerationError::Auth);
        assert_eq!(GenerationError::classify("HTTP 403 Forbidden"), GenerationError::Auth);
        assert_eq!(
            GenerationError::classify("429 RESOURCE_EXHAUSTED: Quota exceeded"),
            GenerationError::QuotaExceeded
        );
        assert_eq!(
            GenerationError::classify("503 the model is overloaded"),
            GenerationError::RateLimited
        );
        assert_eq!(
            GenerationError::classify("no image in response"),
            GenerationError::Unknown("no image in response".to_string())
        );
    }

    #[test]
    fn test_sqlite_too_big_is_quota() {
        let err = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_TOOBIG),
            None,
        );
        assert!(StorageError::from(err).is_quota_exceeded());

        let err = rusqlite::Error::QueryReturnedNoRows;
        assert!(!StorageError::from(err).is_quota_exceeded());
    }
}
