/// Turning image files on disk into embedded payloads
///
/// Content types are sniffed from the file's magic bytes, not its extension.
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::path::{Path, PathBuf};

use crate::error::{GenerationError, MediaError};
use crate::session::{GeneratedImage, GenerationRequest, ImageGenerator};
use crate::state::data::EmbeddedImage;

/// Content type used when the bytes are not a known image format
const FALLBACK_MIME: &str = "application/octet-stream";

/// Guess the content type of encoded image bytes
pub fn sniff_mime(bytes: &[u8]) -> &'static str {
    image::guess_format(bytes)
        .map(|format| format.to_mime_type())
        .unwrap_or(FALLBACK_MIME)
}

/// Embed raw image bytes with the given preview reference
pub fn embed_bytes(bytes: &[u8], preview_url: impl Into<String>) -> EmbeddedImage {
    EmbeddedImage {
        preview_url: preview_url.into(),
        base64: STANDARD.encode(bytes),
        mime_type: sniff_mime(bytes).to_string(),
    }
}

/// Read and embed an image file; the preview reference is its file URL
pub async fn embed_file(path: &Path) -> Result<EmbeddedImage, MediaError> {
    let bytes = read_image(path).await?;
    Ok(embed_bytes(&bytes, file_url(path)))
}

/// Decode the pixel payload of an embedded image or a stored data URL
pub fn decode_payload(payload: &str) -> Result<Vec<u8>, base64::DecodeError> {
    let encoded = match payload.split_once(";base64,") {
        Some((prefix, data)) if prefix.starts_with("data:") => data,
        _ => payload,
    };
    STANDARD.decode(encoded)
}

fn file_url(path: &Path) -> String {
    let absolute = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
    format!("file://{}", absolute.display())
}

async fn read_image(path: &Path) -> Result<Vec<u8>, MediaError> {
    let bytes = tokio::fs::read(path).await.map_err(|source| MediaError::Read {
        path: path.display().to_string(),
        source,
    })?;

    if bytes.is_empty() {
        return Err(MediaError::Empty(path.display().to_string()));
    }
    Ok(bytes)
}

/// Generator that replays a result rendered elsewhere
///
/// Lets results produced outside this process (another client, a batch
/// job) be archived through the same path as live generations.
#[derive(Debug, Clone)]
pub struct FileReplayGenerator {
    result_path: PathBuf,
}

impl FileReplayGenerator {
    pub fn new(result_path: impl Into<PathBuf>) -> Self {
        Self {
            result_path: result_path.into(),
        }
    }
}

#[async_trait]
impl ImageGenerator for FileReplayGenerator {
    async fn generate(
        &self,
        _request: GenerationRequest<'_>,
    ) -> Result<GeneratedImage, GenerationError> {
        let bytes = read_image(&self.result_path)
            .await
            .map_err(|err| GenerationError::Unknown(err.to_string()))?;

        let mime_type = sniff_mime(&bytes);
        if mime_type == FALLBACK_MIME {
            return Err(GenerationError::Unknown(format!(
                "{} is not a recognized image",
                self.result_path.display()
            )));
        }

        Ok(GeneratedImage {
            base64: STANDARD.encode(&bytes),
            mime_type: mime_type.to_string(),
        })
    }
}
