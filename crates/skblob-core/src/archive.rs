use std::io::{Cursor, Read};

use encoding_rs::SHIFT_JIS;
use tracing::{trace, warn};
use unicode_normalization::UnicodeNormalization;

use crate::error::{BlobError, Result};
use crate::options::ResolveOptions;
use crate::unit::{ArchiveEntry, Resolved};

/// Resource accounting shared by every archive expanded during one
/// resolution call, nested ones included.
#[derive(Debug)]
pub(crate) struct Budget {
    max_depth: u32,
    max_entries: u64,
    max_total_size: u64,
    entries: u64,
    bytes: u64,
}

impl Budget {
    pub(crate) fn new(options: &ResolveOptions) -> Self {
        Self {
            max_depth: options.max_depth,
            max_entries: options.max_entries,
            max_total_size: options.max_total_size,
            entries: 0,
            bytes: 0,
        }
    }

    fn enter(&self, depth: u32) -> Result<()> {
        if depth > self.max_depth {
            return Err(BlobError::ArchiveLimit {
                limit: "nesting depth",
                max: self.max_depth as u64,
            });
        }
        Ok(())
    }

    fn take_entry(&mut self) -> Result<()> {
        if self.entries >= self.max_entries {
            return Err(BlobError::ArchiveLimit {
                limit: "entry count",
                max: self.max_entries,
            });
        }
        self.entries += 1;
        Ok(())
    }

    fn remaining_bytes(&self) -> u64 {
        self.max_total_size.saturating_sub(self.bytes)
    }

    fn consume(&mut self, len: u64) -> Result<()> {
        if len > self.remaining_bytes() {
            return Err(BlobError::ArchiveLimit {
                limit: "decompressed size",
                max: self.max_total_size,
            });
        }
        self.bytes += len;
        Ok(())
    }
}

/// Decode a raw entry name: UTF-8 first, then Shift_JIS, then lossy UTF-8.
/// The result is NFC-normalized so equal names compare equal.
pub fn decode_entry_name(raw: &[u8]) -> String {
    let decoded = match std::str::from_utf8(raw) {
        Ok(s) => s.to_string(),
        Err(_) => {
            let (decoded, _, had_errors) = SHIFT_JIS.decode(raw);
            if had_errors {
                String::from_utf8_lossy(raw).into_owned()
            } else {
                decoded.into_owned()
            }
        }
    };
    decoded.nfc().collect()
}

/// A decompressed archive member, not yet resolved.
struct Member {
    name: String,
    data: Vec<u8>,
}

fn corrupt(e: impl std::fmt::Display) -> BlobError {
    BlobError::CorruptArchive(e.to_string())
}

/// Decompress every file entry of the zip in `data`, in the container's
/// index order. Directories and zero-length entries are skipped. Any failure
/// aborts the whole read.
fn read_members(data: &[u8], budget: &mut Budget) -> Result<Vec<Member>> {
    let mut archive = zip::ZipArchive::new(Cursor::new(data)).map_err(corrupt)?;
    let mut members = Vec::with_capacity(archive.len());

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).map_err(corrupt)?;
        if entry.is_dir() {
            continue;
        }
        let name = decode_entry_name(entry.name_raw());

        budget.take_entry()?;

        // Declared sizes are attacker-controlled; bound the read by what is
        // left of the budget and detect overruns by reading one byte past it.
        let remaining = budget.remaining_bytes();
        let mut bytes = Vec::with_capacity(entry.size().min(remaining).min(1 << 20) as usize);
        (&mut entry)
            .take(remaining.saturating_add(1))
            .read_to_end(&mut bytes)
            .map_err(|e| corrupt(format!("{}: {}", name, e)))?;
        budget.consume(bytes.len() as u64)?;

        if bytes.is_empty() {
            trace!(entry = %name, "skipping empty archive entry");
            continue;
        }

        trace!(entry = %name, size = bytes.len(), "read archive entry");
        members.push(Member { name, data: bytes });
    }

    Ok(members)
}

/// Expand the zip in `data` at nesting level `depth`, resolving each member
/// through `resolve`. The callback receives the member bytes, the depth any
/// archive inside it would sit at, and the shared budget.
///
/// Nested archives are flattened: their entries are named `outer/inner`.
/// Members that resolve to unrecognized bytes (including members that fail
/// to decrypt) are kept as non-media units; every other error aborts the
/// expansion.
pub(crate) fn expand<F>(
    data: &[u8],
    depth: u32,
    budget: &mut Budget,
    mut resolve: F,
) -> Result<Vec<ArchiveEntry>>
where
    F: FnMut(Vec<u8>, u32, &mut Budget) -> Result<Resolved>,
{
    budget.enter(depth)?;
    let members = read_members(data, budget)?;
    let mut entries = Vec::with_capacity(members.len());

    for Member { name, data } in members {
        match resolve(data, depth + 1, budget) {
            Ok(Resolved::Unit(unit)) => entries.push(ArchiveEntry::new(name, unit)),
            Ok(Resolved::Entries(nested)) => {
                entries.extend(nested.into_iter().map(|child| {
                    ArchiveEntry::new(format!("{}/{}", name, child.name), child.unit)
                }));
            }
            Err(BlobError::UnrecognizedFormat { unit }) => {
                warn!(entry = %name, detected = %unit.detected_type(), "archive entry is not media");
                entries.push(ArchiveEntry::new(name, *unit));
            }
            Err(e) => return Err(e),
        }
    }

    Ok(entries)
}
