/// Local history vault for generated image edits.
///
/// Each completed transformation (input image, output image, prompt,
/// resolution) is kept as a [`ProcessingRecord`] in a newest-first history,
/// persisted as one JSON value per account and bounded by a byte budget
/// that depends on the account's tier.

pub mod config;
pub mod error;
pub mod media;
pub mod session;
pub mod state;

pub use config::Config;
pub use error::{GenerationError, HistoryError, MediaError, StorageError};
pub use session::{
    Account, ArchiveStatus, GeneratedImage, GenerationOutcome, GenerationRequest, ImageGenerator,
    Session,
};
pub use state::data::{AccountTier, EmbeddedImage, ProcessingRecord, ResolutionTier};
pub use state::history::HistoryStore;
pub use state::library::SqliteStore;
pub use state::quota::{QuotaPolicy, StorageUsage, UsageLevel};
pub use state::storage::{KeyValueStore, MemoryStore};
