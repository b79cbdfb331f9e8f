use serde::Serialize;

use crate::error::{BlobError, Result};

/// Format detected from a blob's leading bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Zip,
    Png,
    Jpeg,
    Mp4,
    Gif,
    Webp,
    Unknown,
}

impl MediaType {
    pub const fn mime(self) -> Option<&'static str> {
        match self {
            Self::Zip => Some("application/zip"),
            Self::Png => Some("image/png"),
            Self::Jpeg => Some("image/jpeg"),
            Self::Mp4 => Some("video/mp4"),
            Self::Gif => Some("image/gif"),
            Self::Webp => Some("image/webp"),
            Self::Unknown => None,
        }
    }

    pub const fn extension(self) -> &'static str {
        match self {
            Self::Zip => "zip",
            Self::Png => "png",
            Self::Jpeg => "jpg",
            Self::Mp4 => "mp4",
            Self::Gif => "gif",
            Self::Webp => "webp",
            Self::Unknown => "bin",
        }
    }

    pub const fn is_image(self) -> bool {
        matches!(self, Self::Png | Self::Jpeg)
    }

    pub const fn is_mpeg4(self) -> bool {
        matches!(self, Self::Mp4)
    }

    /// Directly usable without further transformation.
    pub const fn is_media(self) -> bool {
        self.is_image() || self.is_mpeg4()
    }
}

impl std::fmt::Display for MediaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.mime().unwrap_or("unknown"))
    }
}

/// A fixed byte pattern expected at `offset`.
struct Signature {
    offset: usize,
    magic: &'static [u8],
}

const fn sig(offset: usize, magic: &'static [u8]) -> Signature {
    Signature { offset, magic }
}

/// Signature rules in priority order. The first rule with any matching
/// signature wins. WebP needs two separated magics and is checked last.
const SIGNATURES: &[(MediaType, &[Signature])] = &[
    (
        MediaType::Zip,
        &[
            sig(0, b"PK\x03\x04"),
            sig(0, b"PK\x05\x06"),
            sig(0, b"PK\x07\x08"),
        ],
    ),
    (MediaType::Png, &[sig(0, b"\x89PNG\r\n\x1a\n")]),
    (MediaType::Jpeg, &[sig(0, &[0xFF, 0xD8, 0xFF])]),
    (MediaType::Mp4, &[sig(4, b"ftyp")]),
    (MediaType::Gif, &[sig(0, b"GIF87a"), sig(0, b"GIF89a")]),
];

impl Signature {
    fn matches(&self, data: &[u8]) -> bool {
        data.get(self.offset..self.offset + self.magic.len()) == Some(self.magic)
    }
}

fn is_webp(data: &[u8]) -> bool {
    data.len() >= 12 && &data[0..4] == b"RIFF" && &data[8..12] == b"WEBP"
}

/// Match `data` against the signature table. Never fails; unmatched data is
/// [`MediaType::Unknown`].
pub fn sniff(data: &[u8]) -> MediaType {
    for (media_type, signatures) in SIGNATURES {
        if signatures.iter().any(|s| s.matches(data)) {
            return *media_type;
        }
    }
    if is_webp(data) {
        return MediaType::Webp;
    }
    MediaType::Unknown
}

pub fn is_compressed(data: &[u8]) -> bool {
    sniff(data) == MediaType::Zip
}

pub fn is_media(data: &[u8]) -> bool {
    sniff(data).is_media()
}

/// Branch taken by the resolver for a classified blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlobKind {
    Archive,
    Media,
    /// Neither an archive nor usable media; presumed ciphertext when key
    /// material is available.
    Opaque,
}

/// Result of classifying a blob. Every field derives from `detected_type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Classification {
    pub detected_type: MediaType,
    pub is_image: bool,
    pub is_video: bool,
    pub is_mpeg4: bool,
}

impl Classification {
    fn from_type(detected_type: MediaType) -> Self {
        Self {
            detected_type,
            is_image: detected_type.is_image(),
            is_video: detected_type.is_mpeg4(),
            is_mpeg4: detected_type.is_mpeg4(),
        }
    }

    pub fn is_media(&self) -> bool {
        self.is_image || self.is_video
    }

    pub fn is_archive(&self) -> bool {
        self.detected_type == MediaType::Zip
    }

    pub fn kind(&self) -> BlobKind {
        if self.is_archive() {
            BlobKind::Archive
        } else if self.is_media() {
            BlobKind::Media
        } else {
            BlobKind::Opaque
        }
    }
}

/// Classify a non-empty blob by its signature.
pub fn classify(data: &[u8]) -> Result<Classification> {
    if data.is_empty() {
        return Err(BlobError::EmptyInput);
    }
    Ok(Classification::from_type(sniff(data)))
}
