use sha2::{Digest, Sha256};

use crate::classify::{classify, Classification, MediaType};
use crate::error::Result;

/// A classified, decrypted blob. Classification is computed once from the
/// bytes at construction; the bytes cannot be mutated afterwards.
#[derive(Clone, PartialEq, Eq)]
pub struct MediaUnit {
    data: Vec<u8>,
    classification: Classification,
    /// Reserved for video overlays. Never populated yet.
    overlay: Option<Box<MediaUnit>>,
}

impl MediaUnit {
    /// Classify `data` and wrap it. Fails only on empty input.
    pub fn new(data: impl Into<Vec<u8>>) -> Result<Self> {
        let data = data.into();
        let classification = classify(&data)?;
        Ok(Self::with_classification(data, classification))
    }

    /// Wrap bytes that were already classified by the caller.
    pub(crate) fn with_classification(data: Vec<u8>, classification: Classification) -> Self {
        Self {
            data,
            classification,
            overlay: None,
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn classification(&self) -> Classification {
        self.classification
    }

    pub fn detected_type(&self) -> MediaType {
        self.classification.detected_type
    }

    /// PNG or JPEG.
    pub fn is_image(&self) -> bool {
        self.classification.is_image
    }

    /// MPEG4 is the only video container the protocol carries.
    pub fn is_video(&self) -> bool {
        self.classification.is_video
    }

    pub fn is_mpeg4(&self) -> bool {
        self.classification.is_mpeg4
    }

    /// Image or video; usable without further transformation.
    pub fn is_media(&self) -> bool {
        self.classification.is_media()
    }

    pub fn overlay(&self) -> Option<&MediaUnit> {
        self.overlay.as_deref()
    }

    pub fn mime(&self) -> Option<&'static str> {
        self.detected_type().mime()
    }

    pub fn extension(&self) -> &'static str {
        self.detected_type().extension()
    }

    /// Hex SHA-256 of the payload.
    pub fn sha256(&self) -> String {
        hex::encode(Sha256::digest(&self.data))
    }
}

impl std::fmt::Debug for MediaUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaUnit")
            .field("detected_type", &self.detected_type())
            .field("len", &self.data.len())
            .field("is_media", &self.is_media())
            .field("overlay", &self.overlay.is_some())
            .finish()
    }
}

/// One named member of an archive, resolved into a unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// Path within the container. Members of nested archives are prefixed
    /// with the path of the archive that held them.
    pub name: String,
    pub unit: MediaUnit,
}

impl ArchiveEntry {
    pub fn new(name: impl Into<String>, unit: MediaUnit) -> Self {
        Self {
            name: name.into(),
            unit,
        }
    }
}

/// Outcome of a resolution call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolved {
    Unit(MediaUnit),
    Entries(Vec<ArchiveEntry>),
}

impl Resolved {
    pub fn as_unit(&self) -> Option<&MediaUnit> {
        match self {
            Resolved::Unit(unit) => Some(unit),
            Resolved::Entries(_) => None,
        }
    }

    pub fn as_entries(&self) -> Option<&[ArchiveEntry]> {
        match self {
            Resolved::Unit(_) => None,
            Resolved::Entries(entries) => Some(entries),
        }
    }

    /// Iterate every produced unit with its entry name (`None` for a bare unit).
    pub fn units(&self) -> Box<dyn Iterator<Item = (Option<&str>, &MediaUnit)> + '_> {
        match self {
            Resolved::Unit(unit) => Box::new(std::iter::once((None, unit))),
            Resolved::Entries(entries) => {
                Box::new(entries.iter().map(|e| (Some(e.name.as_str()), &e.unit)))
            }
        }
    }
}
