// Entity Models - The two canonical datasets
//
// Each entity has:
// - A natural key that identifies it across batches ((registry, project_id))
// - A surrogate id assigned only once its batch is complete
// - Plain serde values, so the validator and writers see exactly what is emitted

pub mod credit;
pub mod project;

pub use credit::{Credit, TransactionType};
pub use project::{DraftStatus, Project, ProjectDraft, ProjectStatus};
