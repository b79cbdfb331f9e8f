use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::crypto::{CipherSuite, MEDIA_CIPHER};
use crate::error::{BlobError, Result};

pub const DEFAULT_MAX_DEPTH: u32 = 4;
pub const DEFAULT_MAX_ENTRIES: u64 = 4096;
pub const DEFAULT_MAX_TOTAL_SIZE: u64 = 512 * 1024 * 1024; // 512 MiB

fn default_cipher() -> CipherSuite {
    MEDIA_CIPHER
}

fn default_max_depth() -> u32 {
    DEFAULT_MAX_DEPTH
}

fn default_max_entries() -> u64 {
    DEFAULT_MAX_ENTRIES
}

fn default_max_total_size() -> u64 {
    DEFAULT_MAX_TOTAL_SIZE
}

/// Tunables for a [`crate::Resolver`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolveOptions {
    #[serde(default = "default_cipher")]
    pub cipher: CipherSuite,
    /// Archive nesting levels allowed below the top-level blob.
    #[serde(default = "default_max_depth")]
    pub max_depth: u32,
    /// File entries allowed across all nesting levels of one call.
    #[serde(default = "default_max_entries")]
    pub max_entries: u64,
    /// Decompressed bytes allowed across all entries of one call.
    #[serde(default = "default_max_total_size")]
    pub max_total_size: u64,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            cipher: default_cipher(),
            max_depth: default_max_depth(),
            max_entries: default_max_entries(),
            max_total_size: default_max_total_size(),
        }
    }
}

impl ResolveOptions {
    pub fn with_cipher(mut self, cipher: CipherSuite) -> Self {
        self.cipher = cipher;
        self
    }

    pub fn with_max_depth(mut self, max_depth: u32) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_max_entries(mut self, max_entries: u64) -> Self {
        self.max_entries = max_entries;
        self
    }

    pub fn with_max_total_size(mut self, max_total_size: u64) -> Self {
        self.max_total_size = max_total_size;
        self
    }

    /// Load options from a JSON file. Missing fields take their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        serde_json::from_slice(&bytes)
            .map_err(|e| BlobError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn test_partial_json_uses_defaults() {
        let options: ResolveOptions = serde_json::from_str(r#"{"max_depth": 1}"#).unwrap();
        assert_eq!(options.max_depth, 1);
        assert_eq!(options.max_entries, DEFAULT_MAX_ENTRIES);
        assert_eq!(options.cipher, MEDIA_CIPHER);
    }

    #[test]
    fn test_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("options.json");
        std::fs::File::create(&path)
            .unwrap()
            .write_all(br#"{"cipher": "aes128-cbc-pkcs7", "max_total_size": 1024}"#)
            .unwrap();

        let options = ResolveOptions::load(&path).unwrap();
        assert_eq!(options.cipher, CipherSuite::Aes128CbcPkcs7);
        assert_eq!(options.max_total_size, 1024);
        assert_eq!(options.max_depth, DEFAULT_MAX_DEPTH);
    }

    #[test]
    fn test_load_invalid() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("options.json");
        std::fs::write(&path, b"{ not json").unwrap();
        assert!(matches!(ResolveOptions::load(&path), Err(BlobError::Io(_))));
    }
}
