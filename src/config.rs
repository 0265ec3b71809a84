// ⚙️ Configuration - Where assets come from and where batches go

use crate::mapping::MappingTables;
use crate::summary::DEFAULT_REGRESSION_THRESHOLD;
use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarmonizerConfig {
    /// Directory overriding the embedded mapping assets
    pub mapping_dir: Option<PathBuf>,

    pub output_dir: PathBuf,

    /// Defaults to today (UTC)
    pub processing_date: Option<NaiveDate>,

    pub regression_threshold: f64,
}

impl Default for HarmonizerConfig {
    fn default() -> Self {
        HarmonizerConfig {
            mapping_dir: None,
            output_dir: PathBuf::from("output"),
            processing_date: None,
            regression_threshold: DEFAULT_REGRESSION_THRESHOLD,
        }
    }
}

impl HarmonizerConfig {
    /// Load from a JSON file; absent keys keep their defaults
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        let config: HarmonizerConfig = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config JSON: {:?}", path))?;

        if !(0.0..=1.0).contains(&config.regression_threshold) {
            anyhow::bail!(
                "regression_threshold must be between 0 and 1, got {}",
                config.regression_threshold
            );
        }
        Ok(config)
    }

    pub fn processing_date(&self) -> NaiveDate {
        self.processing_date.unwrap_or_else(|| Utc::now().date_naive())
    }

    /// Mapping tables for this configuration
    ///
    /// Without an override directory the process-wide embedded tables are
    /// shared; with one, a private copy is loaded.
    pub fn mapping_tables(&self) -> Result<TablesRef> {
        match &self.mapping_dir {
            Some(dir) => Ok(TablesRef::Owned(Box::new(MappingTables::from_dir(dir)?))),
            None => Ok(TablesRef::Global(MappingTables::global()?)),
        }
    }
}

/// Either the shared embedded tables or a directory-loaded copy
pub enum TablesRef {
    Global(&'static MappingTables),
    Owned(Box<MappingTables>),
}

impl std::ops::Deref for TablesRef {
    type Target = MappingTables;

    fn deref(&self) -> &MappingTables {
        match self {
            TablesRef::Global(tables) => tables,
            TablesRef::Owned(tables) => tables,
        }
    }
}
