/// Shared data structures for the history vault
///
/// These structs represent the data model that flows between
/// the persistence layer, the history store and the session layer.
/// The JSON layout (camelCase fields, millisecond timestamps) matches
/// the blobs written by the browser front-end, so old history loads as-is.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// Fixed bookkeeping cost charged to every record on top of its payloads
/// (field names, id, timestamp, JSON punctuation)
pub const RECORD_OVERHEAD_BYTES: u64 = 256;

/// Account subscription level, used here only to look up a byte budget
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccountTier {
    None,
    Vip,
    Ssvip,
    UltraInfinity,
    Lifetime,
    Moderator,
}

impl AccountTier {
    pub const ALL: [AccountTier; 6] = [
        AccountTier::None,
        AccountTier::Vip,
        AccountTier::Ssvip,
        AccountTier::UltraInfinity,
        AccountTier::Lifetime,
        AccountTier::Moderator,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AccountTier::None => "NONE",
            AccountTier::Vip => "VIP",
            AccountTier::Ssvip => "SSVIP",
            AccountTier::UltraInfinity => "ULTRA_INFINITY",
            AccountTier::Lifetime => "LIFETIME",
            AccountTier::Moderator => "MODERATOR",
        }
    }
}

impl Default for AccountTier {
    fn default() -> Self {
        AccountTier::None
    }
}

impl fmt::Display for AccountTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind}: {value}")]
pub struct ParseTierError {
    kind: &'static str,
    value: String,
}

impl FromStr for AccountTier {
    type Err = ParseTierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_uppercase().replace('-', "_");
        AccountTier::ALL
            .into_iter()
            .find(|tier| tier.as_str() == wanted)
            .ok_or_else(|| ParseTierError {
                kind: "account tier",
                value: s.to_string(),
            })
    }
}

/// Requested output size, ordered by cost and size
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ResolutionTier {
    #[serde(rename = "480p")]
    P480,
    #[serde(rename = "720p")]
    P720,
    #[serde(rename = "1040p")]
    P1040,
    #[serde(rename = "1240p")]
    P1240,
    #[serde(rename = "1440p")]
    P1440,
    #[serde(rename = "2K")]
    K2,
    #[serde(rename = "4K")]
    K4,
    #[serde(rename = "8K")]
    K8,
}

impl ResolutionTier {
    pub const ALL: [ResolutionTier; 8] = [
        ResolutionTier::P480,
        ResolutionTier::P720,
        ResolutionTier::P1040,
        ResolutionTier::P1240,
        ResolutionTier::P1440,
        ResolutionTier::K2,
        ResolutionTier::K4,
        ResolutionTier::K8,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            ResolutionTier::P480 => "480p",
            ResolutionTier::P720 => "720p",
            ResolutionTier::P1040 => "1040p",
            ResolutionTier::P1240 => "1240p",
            ResolutionTier::P1440 => "1440p",
            ResolutionTier::K2 => "2K",
            ResolutionTier::K4 => "4K",
            ResolutionTier::K8 => "8K",
        }
    }
}

impl Default for ResolutionTier {
    fn default() -> Self {
        ResolutionTier::P1040
    }
}

impl fmt::Display for ResolutionTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ResolutionTier {
    type Err = ParseTierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        ResolutionTier::ALL
            .into_iter()
            .find(|res| res.label().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| ParseTierError {
                kind: "resolution",
                value: s.to_string(),
            })
    }
}

/// Embedded copy of an input image
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EmbeddedImage {
    /// Short reference used for previews (file URL, object URL, ...)
    pub preview_url: String,
    /// Base64-encoded pixel data
    pub base64: String,
    /// Content type, e.g. "image/png"
    pub mime_type: String,
}

/// One completed image transformation
///
/// Fields are private and there are no setters: records are append/delete
/// only, which keeps the cached `size_bytes` valid for the record's lifetime.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingRecord {
    id: String,
    #[serde(rename = "timestamp", with = "chrono::serde::ts_milliseconds")]
    created_at: DateTime<Utc>,
    original_image: EmbeddedImage,
    result_image: String,
    prompt: String,
    resolution: ResolutionTier,
    size_bytes: u64,
}

impl ProcessingRecord {
    /// Create a record for a freshly generated result
    ///
    /// Assigns a new id and the current time, and computes the byte footprint once.
    pub fn new(
        original_image: EmbeddedImage,
        result_image: String,
        prompt: impl Into<String>,
        resolution: ResolutionTier,
    ) -> Self {
        let prompt = prompt.into();
        let size_bytes = footprint(&original_image, &result_image, &prompt);

        // Persisted with millisecond precision; truncate now so load(persist(x)) == x
        let now = Utc::now();
        let created_at = DateTime::from_timestamp_millis(now.timestamp_millis()).unwrap_or(now);

        Self {
            id: Uuid::new_v4().to_string(),
            created_at,
            original_image,
            result_image,
            prompt,
            resolution,
            size_bytes,
        }
    }

    /// Move the timestamp to one millisecond after `at`.
    /// Only used before the record enters a history.
    pub(crate) fn created_after(mut self, at: DateTime<Utc>) -> Self {
        self.created_at = at + chrono::Duration::milliseconds(1);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn original_image(&self) -> &EmbeddedImage {
        &self.original_image
    }

    pub fn result_image(&self) -> &str {
        &self.result_image
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn resolution(&self) -> ResolutionTier {
        self.resolution
    }

    /// Byte footprint computed at creation
    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }
}

/// Sum of encoded payload lengths plus the fixed per-record overhead
pub fn footprint(original: &EmbeddedImage, result_image: &str, prompt: &str) -> u64 {
    let payload = original.base64.len()
        + original.preview_url.len()
        + original.mime_type.len()
        + result_image.len()
        + prompt.len();
    payload as u64 + RECORD_OVERHEAD_BYTES
}


#[cfg(test)]
mod tests {
    use super::*;

    fn sample_image() -> EmbeddedImage {
        EmbeddedImage {
            preview_url: "file:///tmp/in.png".to_string(),
            base64: "iVBORw0KGgo=".to_string(),
            mime_type: "image/png".to_string(),
        }
    }

    #[test]
    fn test_size_is_payload_plus_overhead() {
        let original = sample_image();
        let record = ProcessingRecord::new(
            original.clone(),
            "data:image/png;base64,AAAA".to_string(),
            "ghost mannequin",
            ResolutionTier::P720,
        );

        let expected = original.base64.len()
            + original.preview_url.len()
            + original.mime_type.len()
            + "data:image/png;base64,AAAA".len()
            + "ghost mannequin".len();
        assert_eq!(record.size_bytes(), expected as u64 + RECORD_OVERHEAD_BYTES);
    }

    #[test]
    fn test_new_records_get_distinct_ids() {
        let a = ProcessingRecord::new(sample_image(), String::new(), "a", ResolutionTier::P480);
        let b = ProcessingRecord::new(sample_image(), String::new(), "a", ResolutionTier::P480);
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_serialization_matches_browser_layout() {
        let record = ProcessingRecord::new(sample_image(), "out".to_string(), "p", ResolutionTier::K2);
        let value = serde_json::to_value(&record).unwrap();

        assert_eq!(value["resolution"], "2K");
        assert_eq!(value["originalImage"]["mimeType"], "image/png");
        assert_eq!(value["resultImage"], "out");
        assert_eq!(value["timestamp"], record.created_at().timestamp_millis());
        assert_eq!(value["sizeBytes"], record.size_bytes());

        let restored: ProcessingRecord = serde_json::from_value(value).unwrap();
        assert_eq!(restored, record);
    }

    #[test]
    fn test_loads_browser_blob() {
        let blob = r#"{
            "id": "1718000000000",
            "timestamp": 1718000000000,
            "originalImage": {"previewUrl": "blob:x", "base64": "AAAA", "mimeType": "image/jpeg"},
            "resultImage": "BBBB",
            "prompt": "Ghost mannequin effect",
            "resolution": "1040p",
            "sizeBytes": 8
        }"#;
        let record: ProcessingRecord = serde_json::from_str(blob).unwrap();

        assert_eq!(record.id(), "1718000000000");
        assert_eq!(record.resolution(), ResolutionTier::P1040);
        assert_eq!(record.size_bytes(), 8);
        assert_eq!(record.created_at().timestamp_millis(), 1_718_000_000_000);
    }

    #[test]
    fn test_tier_parsing() {
        assert_eq!("vip".parse::<AccountTier>().unwrap(), AccountTier::Vip);
        assert_eq!("ultra-infinity".parse::<AccountTier>().unwrap(), AccountTier::UltraInfinity);
        assert!("gold".parse::<AccountTier>().is_err());

        assert_eq!("4k".parse::<ResolutionTier>().unwrap(), ResolutionTier::K4);
        assert_eq!("1440p".parse::<ResolutionTier>().unwrap(), ResolutionTier::P1440);
        assert!("360p".parse::<ResolutionTier>().is_err());
    }

    #[test]
    fn test_resolution_order() {
        assert!(ResolutionTier::P480 < ResolutionTier::P1040);
        assert!(ResolutionTier::K2 < ResolutionTier::K8);
        assert_eq!(ResolutionTier::default(), ResolutionTier::P1040);
    }

    #[test]
    fn test_tier_serializes_screaming_snake() {
        let json = serde_json::to_string(&AccountTier::UltraInfinity).unwrap();
        assert_eq!(json, "\"ULTRA_INFINITY\"");
    }
}
