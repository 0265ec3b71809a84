// Status harmonization tables: raw registry status → listed / registered / completed

use super::{parse_asset, STATUS_ASSET};
use crate::entities::ProjectStatus;
use crate::error::Result;
use crate::registry::Registry;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Deserialize)]
struct StatusAsset {
    voluntary: BTreeMap<String, BTreeMap<String, Option<ProjectStatus>>>,
    #[serde(rename = "compliance-program")]
    compliance_program: BTreeMap<String, Option<ProjectStatus>>,
}

/// Outcome of a status lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusLookup {
    Mapped(ProjectStatus),
    /// Known raw value that deliberately has no canonical equivalent
    NoEquivalent,
    /// Raw value absent from the table
    Missing,
}

impl StatusLookup {
    pub fn status(&self) -> Option<ProjectStatus> {
        match self {
            StatusLookup::Mapped(status) => Some(*status),
            _ => None,
        }
    }
}

type Table = HashMap<String, Option<ProjectStatus>>;

#[derive(Debug, Clone, Default)]
pub struct StatusMapping {
    voluntary: HashMap<String, Table>,
    compliance: Table,
}

impl StatusMapping {
    pub fn from_json(json: &str) -> Result<Self> {
        let asset: StatusAsset = parse_asset(STATUS_ASSET, json)?;
        Ok(StatusMapping {
            voluntary: asset
                .voluntary
                .into_iter()
                .map(|(registry, table)| (registry, lowercase_keys(table)))
                .collect(),
            compliance: lowercase_keys(asset.compliance_program),
        })
    }

    /// Registry's own (voluntary-market) status vocabulary
    pub fn voluntary(&self, registry: Registry, raw: &str) -> StatusLookup {
        match self.voluntary.get(registry.name()) {
            Some(table) => lookup(table, raw),
            None => StatusLookup::Missing,
        }
    }

    /// Compliance-program vocabulary (ARB / Ecology states reported by ACR)
    pub fn compliance(&self, raw: &str) -> StatusLookup {
        lookup(&self.compliance, raw)
    }
}

fn lowercase_keys(table: BTreeMap<String, Option<ProjectStatus>>) -> Table {
    table
        .into_iter()
        .map(|(raw, status)| (raw.trim().to_lowercase(), status))
        .collect()
}

fn lookup(table: &Table, raw: &str) -> StatusLookup {
    match table.get(&raw.trim().to_lowercase()) {
        Some(Some(status)) => StatusLookup::Mapped(*status),
        Some(None) => StatusLookup::NoEquivalent,
        None => StatusLookup::Missing,
    }
}
