// Column-name tables: canonical field → raw export column, per registry

use super::{parse_asset, CREDITS_COLUMNS_ASSET, PROJECTS_COLUMNS_ASSET};
use crate::error::{HarmonizeError, Result};
use crate::registry::{DownloadKind, Registry};
use std::collections::BTreeMap;

/// canonical name → raw name; `None` means "no raw column, derived later"
pub type CanonicalMap = BTreeMap<String, Option<String>>;

#[derive(Debug, Clone, Default)]
pub struct ColumnMappings {
    projects: BTreeMap<String, CanonicalMap>,
    credits: BTreeMap<String, BTreeMap<String, CanonicalMap>>,
}

impl ColumnMappings {
    pub fn from_json(projects_json: &str, credits_json: &str) -> Result<Self> {
        Ok(ColumnMappings {
            projects: parse_asset(PROJECTS_COLUMNS_ASSET, projects_json)?,
            credits: parse_asset(CREDITS_COLUMNS_ASSET, credits_json)?,
        })
    }

    /// Project column mapping for a registry
    pub fn projects(&self, registry: Registry) -> Result<&CanonicalMap> {
        self.projects
            .get(registry.name())
            .ok_or_else(|| HarmonizeError::MappingGap {
                table: PROJECTS_COLUMNS_ASSET.to_string(),
                registry: registry.name().to_string(),
                key: "projects".to_string(),
            })
    }

    /// Credit column mapping for one download partition
    ///
    /// A registry with no credit table at all is a mapping gap; a registry that
    /// exists but does not publish `kind` is an unsupported download.
    pub fn credits(&self, registry: Registry, kind: DownloadKind) -> Result<&CanonicalMap> {
        let per_kind = self
            .credits
            .get(registry.name())
            .ok_or_else(|| HarmonizeError::MappingGap {
                table: CREDITS_COLUMNS_ASSET.to_string(),
                registry: registry.name().to_string(),
                key: kind.name().to_string(),
            })?;

        per_kind
            .get(kind.name())
            .ok_or_else(|| HarmonizeError::UnsupportedDownload {
                registry: registry.name().to_string(),
                kind: kind.name().to_string(),
            })
    }
}
