//! Record of one export run, written next to the figures.

use crate::figure::PlotMode;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

pub const MANIFEST_FILE: &str = "render_manifest.json";

/// A figure that was written successfully
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderedFigure {
    pub variable: String,
    pub mode: PlotMode,
    pub path: PathBuf,
    /// Legend labels in drawing order
    pub labels: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderFailure {
    pub variable: String,
    pub mode: PlotMode,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderManifest {
    pub generated_at: DateTime<Utc>,
    pub inputs: Vec<PathBuf>,
    pub figures: Vec<RenderedFigure>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<RenderFailure>,
}

impl RenderManifest {
    pub fn new(inputs: Vec<PathBuf>) -> Self {
        Self {
            generated_at: Utc::now(),
            inputs,
            figures: Vec::new(),
            failures: Vec::new(),
        }
    }

    /// Keep entries in a stable order regardless of job completion order
    pub fn sort(&mut self) {
        self.figures
            .sort_by(|a, b| (&a.variable, a.mode.to_string()).cmp(&(&b.variable, b.mode.to_string())));
        self.failures
            .sort_by(|a, b| (&a.variable, a.mode.to_string()).cmp(&(&b.variable, b.mode.to_string())));
    }

    /// Write as pretty JSON into `dir`, returning the manifest path
    pub fn write<P: AsRef<Path>>(&self, dir: P) -> Result<PathBuf> {
        let path = dir.as_ref().join(MANIFEST_FILE);
        let file = File::create(&path)
            .with_context(|| format!("Failed to create manifest: {}", path.display()))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, self)?;
        writeln!(writer)?;
        writer.flush()?;
        Ok(path)
    }
}
