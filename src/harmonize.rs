// 🧭 Harmonization - Drafts → canonical projects
//
// Everything table-driven happens here: protocol normalization, category and
// subcategory inference, status and country vocabularies. A lookup miss
// degrades to `unknown`/null and is recorded in the quality log.

use crate::data_quality::{QualityIssue, QualityLog};
use crate::entities::{Credit, DraftStatus, Project, ProjectDraft, ProjectStatus, TransactionType};
use crate::mapping::{MappingTables, StatusLookup, UNKNOWN_PROTOCOL};
use crate::protocol::{NormalizedProtocol, ProtocolNormalizer};
use crate::registry::Registry;
use chrono::NaiveDate;
use std::collections::HashMap;
use tracing::debug;

pub struct Harmonizer<'a> {
    tables: &'a MappingTables,
    normalizer: ProtocolNormalizer<'a>,
}

impl<'a> Harmonizer<'a> {
    pub fn new(tables: &'a MappingTables) -> Self {
        Harmonizer {
            tables,
            normalizer: ProtocolNormalizer::new(&tables.protocols),
        }
    }

    pub fn harmonize_projects(&self, drafts: Vec<ProjectDraft>, quality: &mut QualityLog) -> Vec<Project> {
        let projects: Vec<Project> = drafts
            .into_iter()
            .map(|draft| self.harmonize_project(draft, quality))
            .collect();
        debug!(projects = projects.len(), "harmonized projects");
        projects
    }

    pub fn harmonize_project(&self, draft: ProjectDraft, quality: &mut QualityLog) -> Project {
        let normalized = match &draft.protocol_override {
            Some(ids) => NormalizedProtocol::fixed(ids),
            None => self.normalizer.normalize(draft.original_protocol.as_deref()),
        };
        for unresolved in &normalized.unresolved {
            let issue = if unresolved.candidates.is_empty() {
                "protocol segment matched no known string".to_string()
            } else {
                format!("protocol segment ambiguous between {}", unresolved.candidates.join(", "))
            };
            quality.record(
                QualityIssue::warning(draft.registry, "protocol", issue)
                    .with_row(draft.line_number)
                    .with_project(draft.project_id.clone())
                    .with_value(unresolved.segment.clone()),
            );
        }

        let (mut category, mut project_subcategory) = self.categories(&normalized.protocol);
        if let Some(over) = self.tables.overrides.get(&draft.project_id) {
            project_subcategory = vec![over.subcategory.clone()];
            if let Some(c) = &over.category {
                category = vec![c.clone()];
            }
        }

        let status = self.status(&draft, quality);
        let country = self.country(&draft, quality);
        let is_compliance = draft.is_compliance || normalized.protocol.iter().any(|p| p.starts_with("arb-"));

        Project {
            id: None,
            project_id: draft.project_id,
            name: draft.name,
            registry: draft.registry,
            proponent: draft.proponent,
            protocol: normalized.protocol,
            protocol_version: normalized.protocol_version,
            category,
            project_subcategory,
            status,
            country,
            listed_at: draft.listed_at,
            first_issuance_at: None,
            first_retirement_at: None,
            is_compliance,
            issued: 0,
            retired: 0,
            project_url: draft.project_url,
        }
    }

    /// Category and subcategory lists, first appearance, deduplicated
    ///
    /// A project without protocols still gets `unknown` in both lists.
    pub fn categories(&self, protocol: &[String]) -> (Vec<String>, Vec<String>) {
        let mut category = Vec::new();
        let mut subcategory = Vec::new();

        for id in protocol {
            let c = self.tables.protocols.category(id).unwrap_or(UNKNOWN_PROTOCOL);
            let s = self.tables.protocols.subcategory(id).unwrap_or(UNKNOWN_PROTOCOL);
            push_unique(&mut category, c);
            push_unique(&mut subcategory, s);
        }
        if category.is_empty() {
            category.push(UNKNOWN_PROTOCOL.to_string());
            subcategory.push(UNKNOWN_PROTOCOL.to_string());
        }
        (category, subcategory)
    }

    fn status(&self, draft: &ProjectDraft, quality: &mut QualityLog) -> Option<ProjectStatus> {
        let raw = match &draft.status {
            DraftStatus::Resolved(status) => return *status,
            DraftStatus::Raw(raw) => raw,
        };

        match self.tables.statuses.voluntary(draft.registry, raw) {
            StatusLookup::Mapped(status) => Some(status),
            StatusLookup::NoEquivalent => {
                quality.record(
                    QualityIssue::info(draft.registry, "status", "status has no canonical equivalent")
                        .with_row(draft.line_number)
                        .with_project(draft.project_id.clone())
                        .with_value(raw.clone()),
                );
                None
            }
            StatusLookup::Missing => {
                quality.record(
                    QualityIssue::warning(draft.registry, "status", "status not in mapping table")
                        .with_row(draft.line_number)
                        .with_project(draft.project_id.clone())
                        .with_value(raw.clone()),
                );
                None
            }
        }
    }

    fn country(&self, draft: &ProjectDraft, quality: &mut QualityLog) -> Option<String> {
        let raw = draft.country.as_deref()?;
        match self.tables.countries.resolve(raw) {
            Some(canonical) => Some(canonical.to_string()),
            None => {
                quality.record(
                    QualityIssue::info(draft.registry, "country", "country not in alias table, kept as reported")
                        .with_project(draft.project_id.clone())
                        .with_value(raw),
                );
                Some(raw.to_string())
            }
        }
    }
}

fn push_unique(list: &mut Vec<String>, value: &str) {
    if !list.iter().any(|v| v == value) {
        list.push(value.to_string());
    }
}

// ============================================================================
// CREDIT TOTALS
// ============================================================================

#[derive(Debug, Default)]
struct Totals {
    issued: i64,
    retired: i64,
    first_issuance_at: Option<NaiveDate>,
    first_retirement_at: Option<NaiveDate>,
}

fn earliest(current: Option<NaiveDate>, candidate: Option<NaiveDate>) -> Option<NaiveDate> {
    match (current, candidate) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

/// Fill `issued`, `retired` and the first issuance / retirement dates from credits
pub fn apply_credit_totals(projects: &mut [Project], credits: &[Credit]) {
    let mut totals: HashMap<(Registry, &str), Totals> = HashMap::new();

    for credit in credits {
        let entry = totals
            .entry((credit.registry, credit.project_id.as_str()))
            .or_default();
        if credit.transaction_type == TransactionType::Issuance {
            entry.issued += credit.quantity;
            entry.first_issuance_at = earliest(entry.first_issuance_at, credit.transaction_date);
        } else if credit.transaction_type.is_retirement() {
            entry.retired += credit.quantity;
            entry.first_retirement_at = earliest(entry.first_retirement_at, credit.transaction_date);
        }
    }

    for project in projects.iter_mut() {
        let Some(t) = totals.get(&(project.registry, project.project_id.as_str())) else {
            continue;
        };
        project.issued = t.issued;
        project.retired = t.retired;
        project.first_issuance_at = t.first_issuance_at;
        project.first_retirement_at = t.first_retirement_at;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_quality::Severity;

    fn tables() -> MappingTables {
        MappingTables::embedded().unwrap()
    }

    #[test]
    fn test_protocol_category_and_status() {
        let tables = tables();
        let mut quality = QualityLog::new();
        let draft = ProjectDraft::new("VCS75", Registry::Verra)
            .with_protocol("ACM0001 v19.0 and ACM0022")
            .with_raw_status("Under validation")
            .with_country("Viet Nam");

        let project = Harmonizer::new(&tables).harmonize_project(draft, &mut quality);

        assert_eq!(project.protocol, vec!["acm0001", "acm0022"]);
        assert_eq!(project.protocol_version, vec![Some("19.0".to_string()), None]);
        assert_eq!(project.category, vec!["ghg-management"]);
        assert_eq!(project.project_subcategory, vec!["landfill", "waste-management"]);
        assert_eq!(project.status, Some(ProjectStatus::Listed));
        assert_eq!(project.country.as_deref(), Some("Vietnam"));
        assert!(quality.is_empty());
    }

    #[test]
    fn test_gaps_degrade_and_are_audited() {
        let tables = tables();
        let mut quality = QualityLog::new();
        let draft = ProjectDraft::new("GCC9", Registry::GlobalCarbonCouncil)
            .with_protocol("Some Home-Grown Method")
            .with_raw_status("FROZEN")
            .with_country("Atlantis");

        let project = Harmonizer::new(&tables).harmonize_project(draft, &mut quality);

        assert_eq!(project.protocol, vec!["unknown"]);
        assert_eq!(project.protocol_version, vec![None]);
        assert_eq!(project.category, vec!["unknown"]);
        assert_eq!(project.status, None);
        assert_eq!(project.country.as_deref(), Some("Atlantis"));
        assert_eq!(quality.count(Severity::Warning), 2);
        assert_eq!(quality.count(Severity::Info), 1);
    }

    #[test]
    fn test_subcategory_override_and_arb_compliance() {
        let tables = tables();
        let mut quality = QualityLog::new();
        let mut draft = ProjectDraft::new("ACR255", Registry::AmericanCarbonRegistry);
        draft.protocol_override = Some(vec!["arb-forest".to_string()]);

        let project = Harmonizer::new(&tables).harmonize_project(draft, &mut quality);

        assert_eq!(project.project_subcategory, vec!["avoided-grassland-conversion"]);
        assert_eq!(project.category, vec!["agriculture"]);
        assert!(project.is_compliance);
    }

    #[test]
    fn test_empty_protocol_is_unknown_category() {
        let tables = tables();
        let (category, subcategory) = Harmonizer::new(&tables).categories(&[]);
        assert_eq!(category, vec!["unknown"]);
        assert_eq!(subcategory, vec!["unknown"]);
    }

    #[test]
    fn test_credit_totals() {
        let tables = tables();
        let mut quality = QualityLog::new();
        let mut projects = vec![
            Harmonizer::new(&tables).harmonize_project(ProjectDraft::new("VCS1", Registry::Verra), &mut quality),
        ];
        let d = |m| NaiveDate::from_ymd_opt(2021, m, 1);
        let credits = vec![
            Credit::new("VCS1", Registry::Verra, TransactionType::Issuance, 100).with_date(d(5)),
            Credit::new("VCS1", Registry::Verra, TransactionType::Issuance, 50).with_date(d(2)),
            Credit::new("VCS1", Registry::Verra, TransactionType::RetirementCancellation, 30).with_date(d(7)),
            Credit::new("VCS1", Registry::Verra, TransactionType::Cancellation, 5).with_date(d(1)),
            Credit::new("VCS2", Registry::Verra, TransactionType::Issuance, 999),
        ];

        apply_credit_totals(&mut projects, &credits);

        assert_eq!(projects[0].issued, 150);
        assert_eq!(projects[0].retired, 30);
        assert_eq!(projects[0].first_issuance_at, d(2));
        assert_eq!(projects[0].first_retirement_at, d(7));
    }
}
