// 🚨 Error Taxonomy
// Every failure a batch can hit, from lookup gaps to schema violations

use crate::schema::ValidationReport;
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors raised by the harmonization core.
///
/// Lookup gaps on protocol, category, status, and country never reach this
/// type: they degrade to `unknown`/null and land in the quality log. What
/// remains here aborts the batch.
#[derive(Debug, Error)]
pub enum HarmonizeError {
    /// A mapping table has no entry where one is mandatory (column mapping).
    #[error("mapping gap in {table} for {registry}: {key}")]
    MappingGap {
        table: String,
        registry: String,
        key: String,
    },

    /// The reconciled record set failed schema validation.
    #[error("schema violation: {0}")]
    SchemaViolation(ValidationReport),

    /// A registry rule met a row it cannot classify against its own vocabulary.
    #[error("ambiguous event in {registry} row {row}: {reason}")]
    AmbiguousEvent {
        registry: String,
        row: usize,
        reason: String,
        context: BTreeMap<String, String>,
    },

    #[error("unsupported registry: {0}")]
    UnsupportedRegistry(String),

    /// The registry does not publish this kind of credit file.
    #[error("{registry} does not publish {kind} files")]
    UnsupportedDownload { registry: String, kind: String },

    #[error("failed to load mapping table {asset}: {source}")]
    MappingTableLoad {
        asset: String,
        #[source]
        source: serde_json::Error,
    },

    /// New output shrank below the accepted fraction of a previous run.
    #[error(
        "{dataset} regression: new {metric} {new} is below {pct:.0}% of previous {previous}",
        pct = .threshold * 100.0
    )]
    Regression {
        dataset: String,
        metric: String,
        new: i64,
        previous: i64,
        threshold: f64,
    },
}

impl HarmonizeError {
    pub fn is_ambiguous_event(&self) -> bool {
        matches!(self, HarmonizeError::AmbiguousEvent { .. })
    }

    pub fn is_schema_violation(&self) -> bool {
        matches!(self, HarmonizeError::SchemaViolation(_))
    }
}

pub type Result<T> = std::result::Result<T, HarmonizeError>;
