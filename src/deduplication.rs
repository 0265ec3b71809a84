// 🔍 Deduplication - One project per natural key
// (registry, project_id) identifies a project; the first row seen wins

use crate::data_quality::{QualityIssue, QualityLog};
use crate::entities::ProjectDraft;
use crate::registry::Registry;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// A project row dropped because an earlier row had the same natural key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateMatch {
    pub registry: Registry,
    pub project_id: String,

    /// Row of the record that was kept
    pub kept_row: usize,

    /// Row of the record that was dropped
    pub dropped_row: usize,
}

/// Keep the first draft per natural key, audit the rest
pub fn dedup_projects(
    drafts: Vec<ProjectDraft>,
    quality: &mut QualityLog,
) -> (Vec<ProjectDraft>, Vec<DuplicateMatch>) {
    let mut first_row: HashMap<(Registry, String), usize> = HashMap::new();
    let mut kept = Vec::with_capacity(drafts.len());
    let mut duplicates = Vec::new();

    for draft in drafts {
        let key = (draft.registry, draft.project_id.clone());
        match first_row.get(&key) {
            Some(&kept_row) => {
                quality.record(
                    QualityIssue::warning(draft.registry, "project_id", "duplicate project dropped")
                        .with_row(draft.line_number)
                        .with_project(draft.project_id.clone()),
                );
                duplicates.push(DuplicateMatch {
                    registry: draft.registry,
                    project_id: draft.project_id,
                    kept_row,
                    dropped_row: draft.line_number,
                });
            }
            None => {
                first_row.insert(key, draft.line_number);
                kept.push(draft);
            }
        }
    }

    debug!(kept = kept.len(), dropped = duplicates.len(), "deduplicated projects");
    (kept, duplicates)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(id: &str, registry: Registry, line: usize) -> ProjectDraft {
        ProjectDraft::new(id, registry).with_line(line)
    }

    #[test]
    fn test_first_row_wins() {
        let mut quality = QualityLog::new();
        let drafts = vec![
            draft("VCS75", Registry::Verra, 2).with_country("India"),
            draft("VCS76", Registry::Verra, 3),
            draft("VCS75", Registry::Verra, 4).with_country("Nepal"),
        ];

        let (kept, duplicates) = dedup_projects(drafts, &mut quality);

        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].country.as_deref(), Some("India"));
        assert_eq!(duplicates.len(), 1);
        assert_eq!(duplicates[0].kept_row, 2);
        assert_eq!(duplicates[0].dropped_row, 4);
        assert_eq!(quality.len(), 1);
    }

    #[test]
    fn test_same_id_different_registry_is_not_duplicate() {
        let mut quality = QualityLog::new();
        let drafts = vec![
            draft("X1", Registry::Verra, 2),
            draft("X1", Registry::GoldStandard, 2),
        ];
        let (kept, duplicates) = dedup_projects(drafts, &mut quality);
        assert_eq!(kept.len(), 2);
        assert!(duplicates.is_empty());
        assert!(quality.is_empty());
    }
}
