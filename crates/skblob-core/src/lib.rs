//! Resolve story blobs into classified, decrypted media units.
//!
//! A blob is either a zip archive, a directly readable image/video, or
//! ciphertext. [`Resolver`] classifies it by signature, decrypts it with the
//! story's key material when needed, and expands archives recursively.

pub mod archive;
pub mod classify;
pub mod context;
pub mod crypto;
pub mod error;
pub mod options;
pub mod resolve;
pub mod unit;
pub mod writer;

#[cfg(test)]
pub(crate) mod fixtures;

pub use classify::{classify, BlobKind, Classification, MediaType};
pub use context::{MediaContext, StoryContext};
pub use crypto::{CipherSuite, MediaDecrypter, MEDIA_CIPHER};
pub use error::{BlobError, Result};
pub use options::ResolveOptions;
pub use resolve::Resolver;
pub use unit::{ArchiveEntry, MediaUnit, Resolved};
pub use writer::{OutputWriter, WrittenUnit};

/// [`Resolver::resolve_plain`] with default options.
pub fn resolve_plain(data: impl Into<Vec<u8>>) -> Result<Resolved> {
    Resolver::new(ResolveOptions::default()).resolve_plain(data)
}

/// [`Resolver::resolve_with_context`] with default options.
pub fn resolve_with_context<C: MediaContext + ?Sized>(
    data: impl Into<Vec<u8>>,
    context: &C,
) -> Result<Resolved> {
    Resolver::new(ResolveOptions::default()).resolve_with_context(data, context)
}

/// [`Resolver::decrypt`] with default options.
pub fn decrypt<C: MediaContext + ?Sized>(data: impl Into<Vec<u8>>, context: &C) -> Result<Resolved> {
    Resolver::new(ResolveOptions::default()).decrypt(data, context)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_top_level_functions() {
        let png = fixtures::png();
        assert!(resolve_plain(png.clone()).unwrap().as_unit().unwrap().is_image());

        let story = fixtures::story();
        let ciphertext = fixtures::encrypt(&png);
        let resolved = resolve_with_context(ciphertext.clone(), &story).unwrap();
        assert_eq!(resolved.as_unit().unwrap().data(), png.as_slice());

        let resolved = decrypt(ciphertext, &story).unwrap();
        assert_eq!(resolved.as_unit().unwrap().data(), png.as_slice());
    }

    #[test]
    fn test_context_as_trait_object() {
        let story = fixtures::story();
        let context: &dyn MediaContext = &story;
        let resolved = resolve_with_context(fixtures::encrypt(&fixtures::jpeg()), context).unwrap();
        assert!(resolved.as_unit().unwrap().is_image());
    }
}
