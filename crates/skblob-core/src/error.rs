use thiserror::Error;

use crate::unit::MediaUnit;

/// Errors produced while resolving a blob.
///
/// Every variant is terminal for the call that produced it: the conditions
/// depend only on the input bytes and key material, so retrying cannot help.
#[derive(Debug, Error)]
pub enum BlobError {
    /// No bytes were supplied.
    #[error("empty blob")]
    EmptyInput,

    /// The cipher rejected the input (bad key/IV length, ragged ciphertext,
    /// or invalid padding after decryption).
    #[error("decryption failed: {0}")]
    Decryption(String),

    /// The container could not be opened or one of its members could not be read.
    #[error("corrupt archive: {0}")]
    CorruptArchive(String),

    /// After every applicable transformation the bytes match no supported
    /// media signature. The unit is returned so the caller can inspect it.
    #[error("unknown blob format ({})", .unit.detected_type())]
    UnrecognizedFormat { unit: Box<MediaUnit> },

    /// Archive expansion hit one of the configured resource limits.
    #[error("archive limit exceeded: {limit} (max {max})")]
    ArchiveLimit { limit: &'static str, max: u64 },

    /// The caller-supplied key material could not be decoded.
    #[error("invalid media context: {0}")]
    InvalidContext(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl BlobError {
    /// The unit attached to an [`BlobError::UnrecognizedFormat`] error, if any.
    pub fn unit(&self) -> Option<&MediaUnit> {
        match self {
            BlobError::UnrecognizedFormat { unit } => Some(unit),
            _ => None,
        }
    }

    /// Consume the error, recovering the unit of an unrecognized blob.
    pub fn into_unit(self) -> Option<MediaUnit> {
        match self {
            BlobError::UnrecognizedFormat { unit } => Some(*unit),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, BlobError>;
