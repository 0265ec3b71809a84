// Registry Harmonizer - Core Library
// Carbon-offset registry exports → canonical projects and credits datasets

pub mod attributes;
pub mod columns;
pub mod config;
pub mod data_quality;
pub mod dates;
pub mod deduplication;
pub mod entities;
pub mod error;
pub mod harmonize;
pub mod mapping;
pub mod output;
pub mod pipeline;
pub mod protocol;
pub mod reconciliation;
pub mod record;
pub mod registry;
pub mod schema;
pub mod summary;

// Re-export commonly used types
pub use attributes::{credit_schema, project_schema, FieldDefinition, FieldRule, FieldType, Schema};
pub use columns::ColumnMapper;
pub use config::HarmonizerConfig;
pub use data_quality::{QualityIssue, QualityLog, Severity};
pub use deduplication::{dedup_projects, DuplicateMatch};
pub use entities::{Credit, DraftStatus, Project, ProjectDraft, ProjectStatus, TransactionType};
pub use error::{HarmonizeError, Result};
pub use harmonize::{apply_credit_totals, Harmonizer};
pub use mapping::MappingTables;
pub use pipeline::{run_batch, BatchInput, BatchOutput, BatchReport};
pub use protocol::{NormalizedProtocol, ProtocolNormalizer};
pub use reconciliation::{reconciler_for, ReconcileContext, Reconciler};
pub use record::{load_csv, Record};
pub use registry::{DownloadKind, Registry};
pub use schema::{validate_batch, SchemaValidator, ValidationReport, Violation};
pub use summary::{check_regression, Summary};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
