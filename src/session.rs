/// The caller side of the history vault.
///
/// A [`Session`] binds one account (id + tier) to its history slot and owns
/// the only boundary that suspends: awaiting the remote image generator.
/// Once a generation succeeds the result is archived synchronously; an
/// archive failure never hides the generated image from the caller.

use async_trait::async_trait;
use tracing::{info, warn};

use crate::error::{GenerationError, HistoryError};
use crate::state::data::{AccountTier, EmbeddedImage, ProcessingRecord, ResolutionTier};
use crate::state::history::HistoryStore;
use crate::state::quota::{QuotaPolicy, StorageUsage};
use crate::state::storage::KeyValueStore;

/// Session context: who is signed in and at which tier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub id: String,
    pub tier: AccountTier,
}

impl Account {
    pub fn new(id: impl Into<String>, tier: AccountTier) -> Self {
        Self { id: id.into(), tier }
    }
}

/// Everything the generator needs for one transformation
#[derive(Debug, Clone, Copy)]
pub struct GenerationRequest<'a> {
    pub input: &'a EmbeddedImage,
    pub prompt: &'a str,
    pub resolution: ResolutionTier,
}

/// Encoded output of a successful generation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedImage {
    /// Base64-encoded pixel data
    pub base64: String,
    pub mime_type: String,
}

impl GeneratedImage {
    /// Self-describing form stored in history
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.base64)
    }
}

/// Remote image generation, opaque to the vault
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    async fn generate(
        &self,
        request: GenerationRequest<'_>,
    ) -> Result<GeneratedImage, GenerationError>;
}

/// Whether a generated result made it into history
#[derive(Debug)]
pub enum ArchiveStatus {
    Archived { id: String },
    NotArchived(HistoryError),
}

#[derive(Debug)]
pub struct GenerationOutcome {
    pub image: GeneratedImage,
    pub archive: ArchiveStatus,
}

impl GenerationOutcome {
    pub fn is_archived(&self) -> bool {
        matches!(self.archive, ArchiveStatus::Archived { .. })
    }
}

pub struct Session<P> {
    account: Account,
    history: HistoryStore<P>,
}

impl<P: KeyValueStore> Session<P> {
    /// Load `account`'s history from `port`
    pub fn open(port: P, account: Account, policy: QuotaPolicy) -> Self {
        let history = HistoryStore::open(port, &account.id, policy);
        info!(
            account = %account.id,
            tier = %account.tier,
            records = history.list().len(),
            "session opened"
        );
        Self { account, history }
    }

    pub fn account(&self) -> &Account {
        &self.account
    }

    /// Tier changed (upgrade, expiry). Applies from the next insert on.
    pub fn set_tier(&mut self, tier: AccountTier) {
        self.account.tier = tier;
    }

    pub fn history(&self) -> &HistoryStore<P> {
        &self.history
    }

    /// Run one generation and archive its result.
    ///
    /// Generator failures are returned as-is and leave history untouched.
    pub async fn generate_and_record<G>(
        &mut self,
        generator: &G,
        input: EmbeddedImage,
        prompt: &str,
        resolution: ResolutionTier,
    ) -> Result<GenerationOutcome, GenerationError>
    where
        G: ImageGenerator + ?Sized,
    {
        let request = GenerationRequest {
            input: &input,
            prompt,
            resolution,
        };
        let image = generator.generate(request).await?;

        let record = ProcessingRecord::new(input, image.data_url(), prompt, resolution);
        let id = record.id().to_string();

        let archive = match self.record(record) {
            Ok(_) => ArchiveStatus::Archived { id },
            Err(err) => {
                warn!(account = %self.account.id, "generated image not saved to history: {err}");
                ArchiveStatus::NotArchived(err)
            }
        };

        Ok(GenerationOutcome { image, archive })
    }

    /// Archive an already-built record at the account's current tier
    pub fn record(&mut self, record: ProcessingRecord) -> Result<&[ProcessingRecord], HistoryError> {
        self.history.insert(record, self.account.tier)
    }

    pub fn list(&self) -> &[ProcessingRecord] {
        self.history.list()
    }

    pub fn select(&self, id: &str) -> Option<&ProcessingRecord> {
        self.history.select(id)
    }

    pub fn delete_one(&mut self, id: &str) -> Result<&[ProcessingRecord], HistoryError> {
        self.history.delete_one(id)
    }

    pub fn clear(&mut self) -> Result<(), HistoryError> {
        self.history.clear()
    }

    pub fn used_bytes(&self) -> u64 {
        self.history.used_bytes()
    }

    pub fn budget_bytes(&self) -> u64 {
        self.history.budget_bytes(self.account.tier)
    }

    pub fn usage(&self) -> StorageUsage {
        self.history.usage(self.account.tier)
    }

    pub fn into_port(self) -> P {
        self.history.into_port()
    }
}
