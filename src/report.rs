use std::fs::{self, File};
use std::io::BufWriter;
use std::path::Path;

use serde::Serialize;
use skblob_core::{BlobError, MediaType, Resolved, WrittenUnit};

/// Classification of one produced unit, independent of whether it was written.
#[derive(Debug, Serialize)]
pub struct UnitSummary {
    pub entry: Option<String>,
    pub detected_type: MediaType,
    pub is_image: bool,
    pub is_video: bool,
    pub is_media: bool,
    pub size: u64,
}

#[derive(Debug, Serialize)]
pub struct InputReport {
    pub input: String,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub units: Vec<UnitSummary>,
    pub outputs: Vec<WrittenUnit>,
}

impl InputReport {
    pub fn resolved(input: String, resolved: &Resolved, outputs: Vec<WrittenUnit>) -> Self {
        let units = resolved
            .units()
            .map(|(entry, unit)| UnitSummary {
                entry: entry.map(str::to_string),
                detected_type: unit.detected_type(),
                is_image: unit.is_image(),
                is_video: unit.is_video(),
                is_media: unit.is_media(),
                size: unit.len() as u64,
            })
            .collect();
        Self {
            input,
            status: "ok",
            error: None,
            units,
            outputs,
        }
    }

    /// An unrecognized blob still reports the unit that was built from it.
    pub fn failed(input: String, error: &BlobError) -> Self {
        let units = error
            .unit()
            .map(|unit| UnitSummary {
                entry: None,
                detected_type: unit.detected_type(),
                is_image: unit.is_image(),
                is_video: unit.is_video(),
                is_media: unit.is_media(),
                size: unit.len() as u64,
            })
            .into_iter()
            .collect();
        Self {
            input,
            status: "failed",
            error: Some(error.to_string()),
            units,
            outputs: Vec::new(),
        }
    }
}

#[derive(Debug, Default, Serialize)]
pub struct Report {
    pub inputs: Vec<InputReport>,
}

impl Report {
    pub fn failed(&self) -> usize {
        self.inputs.iter().filter(|i| i.error.is_some()).count()
    }

    pub fn unit_count(&self) -> usize {
        self.inputs
            .iter()
            .filter(|i| i.error.is_none())
            .map(|i| i.units.len())
            .sum()
    }

    /// Write to a temp file first, then rename into place.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let temp_path = path.with_extension("tmp");
        let file = File::create(&temp_path)?;
        serde_json::to_writer_pretty(BufWriter::new(file), self)?;
        fs::rename(&temp_path, path)?;
        Ok(())
    }
}
