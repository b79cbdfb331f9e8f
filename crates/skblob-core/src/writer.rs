use std::collections::{HashMap, HashSet};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::classify::MediaType;
use crate::error::Result;
use crate::unit::{MediaUnit, Resolved};

/// One unit persisted (or found already persisted) by [`OutputWriter`].
#[derive(Debug, Clone, Serialize)]
pub struct WrittenUnit {
    /// Archive entry name, `None` for a bare unit.
    pub entry: Option<String>,
    pub path: PathBuf,
    pub detected_type: MediaType,
    pub is_media: bool,
    pub size: u64,
    pub sha256: String,
    /// An identical file already existed at `path`.
    pub skipped: bool,
}

/// Writes resolved units under an output directory.
///
/// A bare unit becomes `<stem>.<ext>`; archive entries land in `<stem>/`
/// keeping their (sanitized) entry paths. Name collisions within a run or
/// with existing files get a `name(n).ext` suffix, except when the existing
/// file has identical contents, in which case nothing is rewritten.
pub struct OutputWriter {
    output_dir: PathBuf,
    force: bool,
    used_paths: HashSet<PathBuf>,
    name_counters: HashMap<PathBuf, u32>,
    created_dirs: HashSet<PathBuf>,
}

impl OutputWriter {
    /// `force` overwrites existing files instead of renaming around them.
    pub fn new(output_dir: impl Into<PathBuf>, force: bool) -> Result<Self> {
        let output_dir = output_dir.into();
        fs::create_dir_all(&output_dir)?;
        Ok(Self {
            output_dir,
            force,
            used_paths: HashSet::new(),
            name_counters: HashMap::new(),
            created_dirs: HashSet::new(),
        })
    }

    pub fn write(&mut self, stem: &str, resolved: &Resolved) -> Result<Vec<WrittenUnit>> {
        let stem = sanitize_component(stem).unwrap_or_else(|| "blob".to_string());

        // Phase 1: assign destinations (sequential, collision tracking)
        let mut assigned: Vec<(Option<&str>, &MediaUnit, PathBuf, String, bool)> = Vec::new();
        for (entry, unit) in resolved.units() {
            let relative = match entry {
                None => PathBuf::from(with_extension(&stem, unit)),
                Some(name) => entry_path(&stem, name, unit),
            };
            let sha256 = hex::encode(Sha256::digest(unit.data()));
            let (dest, skipped) = self.assign(&self.output_dir.join(relative), &sha256)?;
            assigned.push((entry, unit, dest, sha256, skipped));
        }

        // Phase 2: write in parallel
        assigned
            .par_iter()
            .filter(|(_, _, _, _, skipped)| !skipped)
            .try_for_each(|(_, unit, dest, _, _)| -> Result<()> {
                let mut file = fs::File::create(dest)?;
                file.write_all(unit.data())?;
                Ok(())
            })?;

        Ok(assigned
            .into_iter()
            .map(|(entry, unit, path, sha256, skipped)| {
                debug!(path = %path.display(), skipped, "output assigned");
                WrittenUnit {
                    entry: entry.map(str::to_string),
                    path,
                    detected_type: unit.detected_type(),
                    is_media: unit.is_media(),
                    size: unit.len() as u64,
                    sha256,
                    skipped,
                }
            })
            .collect())
    }

    /// Pick a free path for `base_dest`. Returns `(path, skipped)`.
    fn assign(&mut self, base_dest: &Path, sha256: &str) -> Result<(PathBuf, bool)> {
        let dir = base_dest.parent().unwrap_or(&self.output_dir).to_path_buf();
        if !self.created_dirs.contains(&dir) {
            fs::create_dir_all(&dir)?;
            self.created_dirs.insert(dir.clone());
        }

        if !self.used_paths.contains(base_dest) {
            let reuse = self.force || !base_dest.exists() || same_contents(base_dest, sha256);
            if reuse {
                let skipped = !self.force && base_dest.exists();
                self.used_paths.insert(base_dest.to_path_buf());
                return Ok((base_dest.to_path_buf(), skipped));
            }
        }

        let file_name = base_dest
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("file");
        let path = Path::new(file_name);
        let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("file");
        let ext = path.extension().and_then(|s| s.to_str()).unwrap_or("");

        let counter = self.name_counters.entry(base_dest.to_path_buf()).or_insert(0);
        let dest = loop {
            *counter += 1;
            let new_name = if ext.is_empty() {
                format!("{}({})", stem, counter)
            } else {
                format!("{}({}).{}", stem, counter, ext)
            };
            let candidate = dir.join(&new_name);
            if !self.used_paths.contains(&candidate) && (self.force || !candidate.exists()) {
                break candidate;
            }
        };
        self.used_paths.insert(dest.clone());
        Ok((dest, false))
    }
}

fn same_contents(path: &Path, sha256: &str) -> bool {
    fs::read(path)
        .map(|bytes| hex::encode(Sha256::digest(&bytes)) == sha256)
        .unwrap_or(false)
}

/// Make one path component safe to create on any platform. Returns `None`
/// for components that must be dropped (`""`, `.`, `..`).
pub fn sanitize_component(component: &str) -> Option<String> {
    let cleaned: String = component
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let cleaned = cleaned.trim().to_string();
    match cleaned.as_str() {
        "" | "." | ".." => None,
        _ => Some(cleaned),
    }
}

fn with_extension(name: &str, unit: &MediaUnit) -> String {
    if Path::new(name).extension().is_some() {
        name.to_string()
    } else {
        format!("{}.{}", name, unit.extension())
    }
}

fn entry_path(stem: &str, entry: &str, unit: &MediaUnit) -> PathBuf {
    let mut parts: Vec<String> = entry.split(['/', '\\']).filter_map(sanitize_component).collect();
    let file_name = match parts.pop() {
        Some(name) => with_extension(&name, unit),
        None => format!("entry.{}", unit.extension()),
    };

    let mut path = PathBuf::from(stem);
    path.extend(parts);
    path.push(file_name);
    path
}
