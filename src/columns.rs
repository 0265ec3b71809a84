// 🔀 Column Mapper - Raw export headers → canonical field names
//
// The per-registry mapping is stored canonical → raw; the mapper inverts it,
// renames incoming columns, and pads missing canonical fields with null.
// Raw columns with no mapping entry pass through for the reconcilers.

use crate::error::{HarmonizeError, Result};
use crate::mapping::{CanonicalMap, MappingTables, CREDITS_COLUMNS_ASSET, PROJECTS_COLUMNS_ASSET};
use crate::record::Record;
use crate::registry::{DownloadKind, Registry};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Canonical fields every project column mapping must declare
pub const PROJECT_COLUMNS: [&str; 18] = [
    "project_id",
    "name",
    "proponent",
    "original_protocol",
    "status",
    "country",
    "listed_at",
    "project_url",
    "registry",
    "is_compliance",
    "protocol",
    "protocol_version",
    "category",
    "project_subcategory",
    "issued",
    "retired",
    "first_issuance_at",
    "first_retirement_at",
];

/// Canonical fields every credit column mapping must declare
pub const CREDIT_COLUMNS: [&str; 6] = [
    "project_id",
    "registry",
    "quantity",
    "vintage",
    "transaction_date",
    "transaction_type",
];

// ============================================================================
// COLUMN MAPPER
// ============================================================================

#[derive(Debug, Clone)]
pub struct ColumnMapper {
    registry: Registry,

    /// raw name → canonical names (one raw column may feed several fields)
    inverted: BTreeMap<String, Vec<String>>,

    canonical: BTreeSet<String>,
}

impl ColumnMapper {
    pub fn for_projects(tables: &MappingTables, registry: Registry) -> Result<Self> {
        let mapping = tables.columns.projects(registry)?;
        Self::build(registry, mapping, &PROJECT_COLUMNS, PROJECTS_COLUMNS_ASSET)
    }

    pub fn for_credits(tables: &MappingTables, registry: Registry, kind: DownloadKind) -> Result<Self> {
        let mapping = tables.columns.credits(registry, kind)?;
        Self::build(registry, mapping, &CREDIT_COLUMNS, CREDITS_COLUMNS_ASSET)
    }

    /// Build from an explicit mapping, checking every required canonical field is declared
    pub fn build(
        registry: Registry,
        mapping: &CanonicalMap,
        required: &[&str],
        table: &str,
    ) -> Result<Self> {
        if let Some(missing) = required.iter().find(|field| !mapping.contains_key(**field)) {
            return Err(HarmonizeError::MappingGap {
                table: table.to_string(),
                registry: registry.name().to_string(),
                key: missing.to_string(),
            });
        }

        let mut inverted: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (canonical, raw) in mapping {
            if let Some(raw) = raw {
                inverted.entry(raw.clone()).or_default().push(canonical.clone());
            }
        }

        Ok(ColumnMapper {
            registry,
            inverted,
            canonical: mapping.keys().cloned().collect(),
        })
    }

    pub fn registry(&self) -> Registry {
        self.registry
    }

    /// Rename one record's columns
    pub fn apply(&self, record: &Record) -> Record {
        let mut out = record.clone();

        for (raw, canonicals) in &self.inverted {
            let value = record.get_owned(raw);
            if !self.canonical.contains(raw) {
                out.remove(raw);
            }
            for canonical in canonicals {
                out.set(canonical, value.clone());
            }
        }

        for canonical in &self.canonical {
            if !out.has_column(canonical) {
                out.set(canonical, None);
            }
        }

        out
    }

    pub fn apply_all(&self, records: &[Record]) -> Vec<Record> {
        debug!(registry = %self.registry, rows = records.len(), "renaming columns");
        records.iter().map(|r| self.apply(r)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tables() -> MappingTables {
        MappingTables::embedded().unwrap()
    }

    #[test]
    fn test_renames_and_pads_with_null() {
        let mapper = ColumnMapper::for_projects(&tables(), Registry::Verra).unwrap();
        let raw = Record::from_pairs(
            2,
            &[("ID", "75"), ("Name", "Wind Farm"), ("Methodology", "AMS-I.D."), ("Extra", "x")],
        );

        let mapped = mapper.apply(&raw);
        assert_eq!(mapped.get("project_id"), Some("75"));
        assert_eq!(mapped.get("original_protocol"), Some("AMS-I.D."));
        assert!(!mapped.has_column("ID"));
        // unmapped raw columns pass through
        assert_eq!(mapped.get("Extra"), Some("x"));
        // canonical fields without a raw column exist as null
        assert!(mapped.has_column("proponent"));
        assert_eq!(mapped.get("proponent"), None);
        assert!(mapped.has_column("protocol"));
    }

    #[test]
    fn test_identical_raw_and_canonical_names() {
        let mapper = ColumnMapper::for_projects(&tables(), Registry::GlobalCarbonCouncil).unwrap();
        let raw = Record::from_pairs(2, &[("project_submission_number", "S00123"), ("country", "India")]);
        let mapped = mapper.apply(&raw);
        assert_eq!(mapped.get("country"), Some("India"));
        assert_eq!(mapped.get("project_id"), Some("S00123"));
    }

    #[test]
    fn test_forgotten_canonical_field_is_a_gap() {
        let mut mapping = CanonicalMap::new();
        mapping.insert("project_id".to_string(), Some("ID".to_string()));

        let err = ColumnMapper::build(Registry::Verra, &mapping, &CREDIT_COLUMNS, "test").unwrap_err();
        match err {
            HarmonizeError::MappingGap { key, registry, .. } => {
                assert_eq!(key, "registry");
                assert_eq!(registry, "verra");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_unpublished_partition_rejected() {
        let err = ColumnMapper::for_credits(&tables(), Registry::GlobalCarbonCouncil, DownloadKind::Cancellations)
            .unwrap_err();
        assert!(matches!(err, HarmonizeError::UnsupportedDownload { .. }));
    }
}
