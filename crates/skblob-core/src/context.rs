use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Deserialize;

use crate::error::{BlobError, Result};

/// Key material for one story. Supplied by the session layer; the resolver
/// only needs the raw key and IV bytes.
pub trait MediaContext {
    fn media_key(&self) -> &[u8];
    fn media_iv(&self) -> &[u8];
}

impl<C: MediaContext + ?Sized> MediaContext for &C {
    fn media_key(&self) -> &[u8] {
        (**self).media_key()
    }

    fn media_iv(&self) -> &[u8] {
        (**self).media_iv()
    }
}

/// Owned story key material.
#[derive(Clone, PartialEq, Eq)]
pub struct StoryContext {
    media_key: Vec<u8>,
    media_iv: Vec<u8>,
}

impl StoryContext {
    pub fn new(media_key: impl Into<Vec<u8>>, media_iv: impl Into<Vec<u8>>) -> Self {
        Self {
            media_key: media_key.into(),
            media_iv: media_iv.into(),
        }
    }

    /// Decode the base64 strings the story API hands out.
    pub fn from_base64(media_key: &str, media_iv: &str) -> Result<Self> {
        let key = STANDARD
            .decode(media_key.trim())
            .map_err(|e| BlobError::InvalidContext(format!("media_key: {}", e)))?;
        let iv = STANDARD
            .decode(media_iv.trim())
            .map_err(|e| BlobError::InvalidContext(format!("media_iv: {}", e)))?;
        Ok(Self::new(key, iv))
    }

    /// Parse a JSON story record: `{"media_key": "<b64>", "media_iv": "<b64>"}`.
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        let record: EncodedStoryContext = serde_json::from_slice(bytes)
            .map_err(|e| BlobError::InvalidContext(e.to_string()))?;
        Self::from_base64(&record.media_key, &record.media_iv)
    }
}

impl MediaContext for StoryContext {
    fn media_key(&self) -> &[u8] {
        &self.media_key
    }

    fn media_iv(&self) -> &[u8] {
        &self.media_iv
    }
}

// Key material stays out of logs.
impl std::fmt::Debug for StoryContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoryContext")
            .field("media_key", &format_args!("<{} bytes>", self.media_key.len()))
            .field("media_iv", &format_args!("<{} bytes>", self.media_iv.len()))
            .finish()
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "snake_case")]
struct EncodedStoryContext {
    #[serde(alias = "mediaKey")]
    media_key: String,
    #[serde(alias = "mediaIv", alias = "mediaIV")]
    media_iv: String,
}
