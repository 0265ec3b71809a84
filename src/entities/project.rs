// 🌳 Project Entity - One offset project as the registries describe it
//
// Identity: (registry, project_id), e.g. (verra, "VCS75")
// Values: name, protocol list, status, country, totals... all harmonized
//
// A reconciler emits a ProjectDraft (registry rules applied, vocabulary still raw);
// harmonization turns drafts into Projects.

use crate::registry::Registry;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// PROJECT STATUS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectStatus {
    /// Submitted / under validation, not yet issuing
    Listed,

    /// Registered and eligible to issue
    Registered,

    /// Crediting finished, withdrawn, or terminated
    Completed,
}

impl ProjectStatus {
    pub const ALL: [ProjectStatus; 3] = [
        ProjectStatus::Listed,
        ProjectStatus::Registered,
        ProjectStatus::Completed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectStatus::Listed => "listed",
            ProjectStatus::Registered => "registered",
            ProjectStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// PROJECT DRAFT
// ============================================================================

/// Status as a reconciler leaves it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DraftStatus {
    /// Raw value to harmonize through the registry's voluntary table
    Raw(String),

    /// Already decided by a registry rule (ACR compliance projects, GCC, ...)
    Resolved(Option<ProjectStatus>),
}

/// ProjectDraft - Reconciled but not yet harmonized
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectDraft {
    pub project_id: String,
    pub registry: Registry,
    pub name: Option<String>,
    pub proponent: Option<String>,

    /// Raw protocol field, normalized later
    pub original_protocol: Option<String>,

    /// Registries with a single fixed protocol skip normalization
    pub protocol_override: Option<Vec<String>>,

    pub status: DraftStatus,
    pub country: Option<String>,
    pub listed_at: Option<NaiveDate>,

    /// Compliance flag as the reconciler determined it
    pub is_compliance: bool,

    pub project_url: Option<String>,

    /// Source row, for error and audit context
    pub line_number: usize,
}

impl ProjectDraft {
    pub fn new(project_id: impl Into<String>, registry: Registry) -> Self {
        ProjectDraft {
            project_id: project_id.into(),
            registry,
            name: None,
            proponent: None,
            original_protocol: None,
            protocol_override: None,
            status: DraftStatus::Resolved(None),
            country: None,
            listed_at: None,
            is_compliance: false,
            project_url: None,
            line_number: 0,
        }
    }

    /// Builder: set the raw protocol field
    pub fn with_protocol(mut self, raw: impl Into<String>) -> Self {
        self.original_protocol = Some(raw.into());
        self
    }

    /// Builder: set a raw status to harmonize later
    pub fn with_raw_status(mut self, raw: impl Into<String>) -> Self {
        self.status = DraftStatus::Raw(raw.into());
        self
    }

    pub fn with_country(mut self, country: impl Into<String>) -> Self {
        self.country = Some(country.into());
        self
    }

    pub fn with_line(mut self, line_number: usize) -> Self {
        self.line_number = line_number;
        self
    }

    /// (registry, project_id)
    pub fn natural_key(&self) -> (Registry, &str) {
        (self.registry, self.project_id.as_str())
    }
}

// ============================================================================
// PROJECT
// ============================================================================

/// Project - Canonical output row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    /// Surrogate id, assigned once the batch is complete
    pub id: Option<u64>,

    pub project_id: String,
    pub name: Option<String>,
    pub registry: Registry,
    pub proponent: Option<String>,

    /// Canonical protocol ids, order of first appearance
    pub protocol: Vec<String>,

    /// Parallel to `protocol`; `None` where no version was found
    pub protocol_version: Vec<Option<String>>,

    pub category: Vec<String>,
    pub project_subcategory: Vec<String>,
    pub status: Option<ProjectStatus>,
    pub country: Option<String>,
    pub listed_at: Option<NaiveDate>,
    pub first_issuance_at: Option<NaiveDate>,
    pub first_retirement_at: Option<NaiveDate>,
    pub is_compliance: bool,
    pub issued: i64,
    pub retired: i64,
    pub project_url: Option<String>,
}

impl Project {
    /// (registry, project_id)
    pub fn natural_key(&self) -> (Registry, &str) {
        (self.registry, self.project_id.as_str())
    }

    pub fn has_arb_protocol(&self) -> bool {
        self.protocol.iter().any(|p| p.starts_with("arb-"))
    }
}
