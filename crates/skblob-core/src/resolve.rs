use tracing::{debug, warn};

use crate::archive::{self, Budget};
use crate::classify::{classify, BlobKind};
use crate::context::MediaContext;
use crate::crypto::{CipherSuite, MediaDecrypter};
use crate::error::{BlobError, Result};
use crate::options::ResolveOptions;
use crate::unit::{ArchiveEntry, MediaUnit, Resolved};

/// Borrowed key material for the single decryption a call may perform.
#[derive(Clone, Copy)]
struct Keys<'a> {
    key: &'a [u8],
    iv: &'a [u8],
}

impl<'a> Keys<'a> {
    fn from_context<C: MediaContext + ?Sized>(context: &'a C) -> Self {
        Self {
            key: context.media_key(),
            iv: context.media_iv(),
        }
    }
}

/// Turns blobs into media units.
///
/// Every call walks the same decision tree: classify, then expand an archive,
/// accept known media, or decrypt presumed ciphertext once and classify the
/// plaintext again. Plaintext is never decrypted a second time, and archive
/// members of a decrypted archive are not decrypted either.
///
/// A `Resolver` holds no mutable state and can be shared across threads.
#[derive(Debug, Clone)]
pub struct Resolver<D = CipherSuite> {
    decrypter: D,
    options: ResolveOptions,
}

impl Resolver<CipherSuite> {
    pub fn new(options: ResolveOptions) -> Self {
        Self {
            decrypter: options.cipher,
            options,
        }
    }
}

impl Default for Resolver<CipherSuite> {
    fn default() -> Self {
        Self::new(ResolveOptions::default())
    }
}

impl<D: MediaDecrypter> Resolver<D> {
    /// Use a custom decryption step. `options.cipher` is ignored.
    pub fn with_decrypter(decrypter: D, options: ResolveOptions) -> Self {
        Self { decrypter, options }
    }

    pub fn options(&self) -> &ResolveOptions {
        &self.options
    }

    /// Resolve a blob without key material. Archives are expanded; anything
    /// else must already be media.
    pub fn resolve_plain(&self, data: impl Into<Vec<u8>>) -> Result<Resolved> {
        let data = data.into();
        if data.is_empty() {
            return Err(BlobError::EmptyInput);
        }
        let mut budget = Budget::new(&self.options);
        self.resolve_blob(data, None, 0, &mut budget)
    }

    /// Resolve a blob that may be story ciphertext. Archives and known media
    /// are used as-is; everything else is decrypted with the context's key.
    pub fn resolve_with_context<C>(&self, data: impl Into<Vec<u8>>, context: &C) -> Result<Resolved>
    where
        C: MediaContext + ?Sized,
    {
        let data = data.into();
        if data.is_empty() {
            return Err(BlobError::EmptyInput);
        }
        let mut budget = Budget::new(&self.options);
        self.resolve_blob(data, Some(Keys::from_context(context)), 0, &mut budget)
    }

    /// Decrypt a blob the caller already holds as ciphertext. Classification
    /// still picks the branch: archives are expanded and known media is
    /// returned untouched, so a payload is never decrypted twice.
    pub fn decrypt<C>(&self, data: impl Into<Vec<u8>>, context: &C) -> Result<Resolved>
    where
        C: MediaContext + ?Sized,
    {
        let data = data.into();
        if data.is_empty() {
            return Err(BlobError::Decryption("empty ciphertext".to_string()));
        }
        let class = classify(&data)?;
        let mut budget = Budget::new(&self.options);
        match class.kind() {
            BlobKind::Archive => {
                debug!("blob is a plain archive, not decrypting");
                self.expand_archive(&data, None, 0, &mut budget)
                    .map(Resolved::Entries)
            }
            BlobKind::Media => {
                debug!(detected = %class.detected_type, "blob is already media, not decrypting");
                Ok(Resolved::Unit(MediaUnit::with_classification(data, class)))
            }
            BlobKind::Opaque => {
                let plaintext = self.decrypt_bytes(&data, Keys::from_context(context))?;
                self.resolve_blob(plaintext, None, 0, &mut budget)
            }
        }
    }

    /// Expand a blob the caller already knows to be an archive.
    pub fn expand(&self, data: &[u8]) -> Result<Vec<ArchiveEntry>> {
        let class = classify(data)?;
        if !class.is_archive() {
            return Err(BlobError::CorruptArchive(format!(
                "not an archive ({})",
                class.detected_type
            )));
        }
        let mut budget = Budget::new(&self.options);
        self.expand_archive(data, None, 0, &mut budget)
    }

    fn resolve_blob(
        &self,
        data: Vec<u8>,
        keys: Option<Keys<'_>>,
        depth: u32,
        budget: &mut Budget,
    ) -> Result<Resolved> {
        let class = classify(&data)?;
        debug!(detected = %class.detected_type, depth, len = data.len(), "classified blob");

        match (class.kind(), keys) {
            (BlobKind::Archive, _) => self
                .expand_archive(&data, keys, depth, budget)
                .map(Resolved::Entries),
            (BlobKind::Media, _) => Ok(Resolved::Unit(MediaUnit::with_classification(data, class))),
            (BlobKind::Opaque, Some(keys)) => {
                let plaintext = self.decrypt_bytes(&data, keys)?;
                self.resolve_blob(plaintext, None, depth, budget)
            }
            (BlobKind::Opaque, None) => Err(BlobError::UnrecognizedFormat {
                unit: Box::new(MediaUnit::with_classification(data, class)),
            }),
        }
    }

    /// Like [`Self::resolve_blob`], but a member that fails to decrypt is
    /// reported as unrecognized so the archive keeps it as a non-media unit.
    fn resolve_member(
        &self,
        data: Vec<u8>,
        keys: Option<Keys<'_>>,
        depth: u32,
        budget: &mut Budget,
    ) -> Result<Resolved> {
        let class = classify(&data)?;
        let Some(member_keys) = keys.filter(|_| class.kind() == BlobKind::Opaque) else {
            return self.resolve_blob(data, keys, depth, budget);
        };

        match self.decrypt_bytes(&data, member_keys) {
            Ok(plaintext) => self.resolve_blob(plaintext, None, depth, budget),
            Err(BlobError::Decryption(reason)) => {
                warn!(%reason, "archive member is not story ciphertext");
                Err(BlobError::UnrecognizedFormat {
                    unit: Box::new(MediaUnit::with_classification(data, class)),
                })
            }
            Err(e) => Err(e),
        }
    }

    fn decrypt_bytes(&self, data: &[u8], keys: Keys<'_>) -> Result<Vec<u8>> {
        let plaintext = self.decrypter.decrypt(data, keys.key, keys.iv)?;
        if plaintext.is_empty() {
            return Err(BlobError::Decryption("decrypted payload is empty".to_string()));
        }
        debug!(ciphertext = data.len(), plaintext = plaintext.len(), "decrypted blob");
        Ok(plaintext)
    }

    fn expand_archive(
        &self,
        data: &[u8],
        keys: Option<Keys<'_>>,
        depth: u32,
        budget: &mut Budget,
    ) -> Result<Vec<ArchiveEntry>> {
        let entries = archive::expand(data, depth, budget, |member, child_depth, budget| {
            self.resolve_member(member, keys, child_depth, budget)
        })?;
        debug!(depth, entries = entries.len(), "expanded archive");
        Ok(entries)
    }
}
