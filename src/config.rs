use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::path::Path;

pub const DEFAULT_COLUMN_WIDTH: u32 = 90;

/// Persisted column widths, keyed by column label.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct DimensionsConfig {
    pub default_width: u32,
    pub column_widths: BTreeMap<String, u32>,
}

impl Default for DimensionsConfig {
    fn default() -> Self {
        Self {
            default_width: DEFAULT_COLUMN_WIDTH,
            column_widths: BTreeMap::new(),
        }
    }
}

impl DimensionsConfig {
    pub fn column_width(&self, label: &str) -> u32 {
        self.column_widths
            .get(label)
            .copied()
            .unwrap_or(self.default_width)
    }

    pub fn set_column_width(&mut self, label: &str, width: u32) {
        self.column_widths.insert(label.to_string(), width);
    }

    /// Load from a JSON file. Errors if the file cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read dimensions config: {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("invalid dimensions config: {}", path.display()))
    }

    /// Load from `path`, falling back to defaults when it is missing or broken.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        match Self::load(&path) {
            Ok(cfg) => cfg,
            Err(e) => {
                tracing::debug!("using default column widths: {e:#}");
                Self::default()
            }
        }
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let file = File::create(path)
            .with_context(|| format!("failed to create dimensions config: {}", path.display()))?;
        serde_json::to_writer_pretty(file, self)?;
        Ok(())
    }
}
