// 🗂️ Mapping Tables - The static vocabulary every batch is harmonized against
// Loaded once per process, immutable afterwards, shared read-only across batches
//
// Assets are embedded at compile time and can be overridden from a directory
// holding files with the same names.

pub mod columns;
pub mod countries;
pub mod overrides;
pub mod protocols;
pub mod status;

pub use columns::{CanonicalMap, ColumnMappings};
pub use countries::CountryAliases;
pub use overrides::{SubcategoryOverride, SubcategoryOverrides};
pub use protocols::{normalize_key, ProtocolEntry, ProtocolMapping, Resolution, UNKNOWN_PROTOCOL};
pub use status::{StatusLookup, StatusMapping};

use crate::error::{HarmonizeError, Result};
use anyhow::Context;
use sha2::{Digest, Sha256};
use std::path::Path;
use std::sync::OnceLock;
use tracing::{debug, info};

// ============================================================================
// ASSETS
// ============================================================================

pub const PROJECTS_COLUMNS_ASSET: &str = "projects-raw-columns-mapping.json";
pub const CREDITS_COLUMNS_ASSET: &str = "credits-raw-columns-mapping.json";
pub const PROTOCOL_ASSET: &str = "protocol-mapping.json";
pub const STATUS_ASSET: &str = "status-mapping.json";
pub const COUNTRY_ASSET: &str = "country-aliases.json";
pub const OVERRIDES_ASSET: &str = "project-subcategory-overrides.json";

/// Embedded asset contents, in fingerprint order
const EMBEDDED: [(&str, &str); 6] = [
    (
        PROJECTS_COLUMNS_ASSET,
        include_str!("../../configs/projects-raw-columns-mapping.json"),
    ),
    (
        CREDITS_COLUMNS_ASSET,
        include_str!("../../configs/credits-raw-columns-mapping.json"),
    ),
    (PROTOCOL_ASSET, include_str!("../../configs/protocol-mapping.json")),
    (STATUS_ASSET, include_str!("../../configs/status-mapping.json")),
    (COUNTRY_ASSET, include_str!("../../configs/country-aliases.json")),
    (
        OVERRIDES_ASSET,
        include_str!("../../configs/project-subcategory-overrides.json"),
    ),
];

static GLOBAL: OnceLock<MappingTables> = OnceLock::new();

// ============================================================================
// MAPPING TABLES
// ============================================================================

/// MappingTables - Every lookup table a batch needs
#[derive(Debug, Clone)]
pub struct MappingTables {
    pub columns: ColumnMappings,
    pub protocols: ProtocolMapping,
    pub statuses: StatusMapping,
    pub countries: CountryAliases,
    pub overrides: SubcategoryOverrides,

    /// SHA-256 over every asset, recorded in batch reports
    fingerprint: String,
}

impl MappingTables {
    /// Process-wide tables built from the embedded assets on first use
    pub fn global() -> Result<&'static MappingTables> {
        if let Some(tables) = GLOBAL.get() {
            return Ok(tables);
        }
        let tables = MappingTables::embedded()?;
        Ok(GLOBAL.get_or_init(|| tables))
    }

    /// Fresh copy of the embedded tables
    pub fn embedded() -> Result<Self> {
        let assets: Vec<(&str, String)> = EMBEDDED
            .iter()
            .map(|(name, content)| (*name, content.to_string()))
            .collect();
        Self::from_assets(&assets)
    }

    /// Load tables from a directory; assets missing there fall back to the embedded copy
    pub fn from_dir(dir: &Path) -> anyhow::Result<Self> {
        let mut assets = Vec::with_capacity(EMBEDDED.len());
        for (name, embedded) in EMBEDDED {
            let path = dir.join(name);
            if path.exists() {
                let content = std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read mapping asset: {:?}", path))?;
                debug!(asset = name, path = %path.display(), "using mapping asset override");
                assets.push((name, content));
            } else {
                assets.push((name, embedded.to_string()));
            }
        }
        let tables = Self::from_assets(&assets)
            .with_context(|| format!("Invalid mapping assets in {:?}", dir))?;
        Ok(tables)
    }

    fn from_assets(assets: &[(&str, String)]) -> Result<Self> {
        let content = |wanted: &str| -> &str {
            assets
                .iter()
                .find(|(name, _)| *name == wanted)
                .map(|(_, c)| c.as_str())
                .unwrap_or("{}")
        };

        let tables = MappingTables {
            columns: ColumnMappings::from_json(
                content(PROJECTS_COLUMNS_ASSET),
                content(CREDITS_COLUMNS_ASSET),
            )?,
            protocols: ProtocolMapping::from_json(content(PROTOCOL_ASSET))?,
            statuses: StatusMapping::from_json(content(STATUS_ASSET))?,
            countries: CountryAliases::from_json(content(COUNTRY_ASSET))?,
            overrides: SubcategoryOverrides::from_json(content(OVERRIDES_ASSET))?,
            fingerprint: fingerprint(assets),
        };

        info!(
            protocols = tables.protocols.len(),
            fingerprint = %&tables.fingerprint[..12],
            "mapping tables loaded"
        );
        Ok(tables)
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }
}

/// Parse one JSON asset, tagging failures with the asset name
pub(crate) fn parse_asset<T: serde::de::DeserializeOwned>(asset: &str, json: &str) -> Result<T> {
    serde_json::from_str(json).map_err(|source| HarmonizeError::MappingTableLoad {
        asset: asset.to_string(),
        source,
    })
}

fn fingerprint(assets: &[(&str, String)]) -> String {
    let mut hasher = Sha256::new();
    for (name, content) in assets {
        hasher.update(name.as_bytes());
        hasher.update([0u8]);
        hasher.update(content.as_bytes());
        hasher.update([0u8]);
    }
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Registry;

    #[test]
    fn test_embedded_assets_load() {
        let tables = MappingTables::embedded().unwrap();
        assert!(tables.protocols.len() > 20);
        assert_eq!(tables.fingerprint().len(), 64);
        for registry in Registry::ALL {
            assert!(tables.columns.projects(registry).is_ok());
        }
    }

    #[test]
    fn test_global_is_shared() {
        let a = MappingTables::global().unwrap();
        let b = MappingTables::global().unwrap();
        assert!(std::ptr::eq(a, b));
        assert_eq!(a.fingerprint(), MappingTables::embedded().unwrap().fingerprint());
    }

    #[test]
    fn test_directory_override_changes_fingerprint() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(OVERRIDES_ASSET),
            r#"{"VCS75": {"subcategory": "wind"}}"#,
        )
        .unwrap();

        let tables = MappingTables::from_dir(dir.path()).unwrap();
        assert_eq!(tables.overrides.get("VCS75").map(|o| o.subcategory.as_str()), Some("wind"));
        assert_ne!(tables.fingerprint(), MappingTables::embedded().unwrap().fingerprint());
    }

    #[test]
    fn test_malformed_override_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(PROTOCOL_ASSET), "{ not json").unwrap();
        assert!(MappingTables::from_dir(dir.path()).is_err());
    }
}
