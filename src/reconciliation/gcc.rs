// 🕌 Global Carbon Council
//
// Project names and internal ids live inside an HTML anchor in the project
// export; credit rows only carry the project name, so credits are joined to
// projects by that name.

use super::{ambiguous, partition_type, required_quantity, ReconcileContext, Reconciler};
use crate::dates::{parse_last_year, parse_unix_millis};
use crate::entities::{Credit, DraftStatus, ProjectDraft, TransactionType};
use crate::error::Result;
use crate::record::Record;
use crate::registry::{DownloadKind, Registry};
use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;
use tracing::info;

const REGISTRY: Registry = Registry::GlobalCarbonCouncil;
const PROJECT_URL_BASE: &str = "https://projects.globalcarboncouncil.com/project/";

/// Raw project column holding `<a href=".../project/123">Name</a>`
pub const PROJECT_LINK: &str = "project_link";
/// Raw credit column naming the project
pub const PROJECT_NAME: &str = "project_name";
/// Raw retirement column, Unix epoch milliseconds
pub const RETIREMENT_DATE: &str = "retirement_date";

static ANCHOR_TEXT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r">(.*)<").unwrap());
static INTERNAL_ID_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"/(\d+)").unwrap());

pub struct GccReconciler;

impl Reconciler for GccReconciler {
    fn registry(&self) -> Registry {
        REGISTRY
    }

    fn reconcile_projects(
        &self,
        rows: &[Record],
        _ctx: &mut ReconcileContext<'_>,
    ) -> Result<Vec<ProjectDraft>> {
        let mut drafts = Vec::with_capacity(rows.len());

        for record in rows {
            let submission = record
                .get("project_id")
                .ok_or_else(|| ambiguous(REGISTRY, record, "project row without submission number"))?;

            let mut draft = ProjectDraft::new(project_id(submission), REGISTRY).with_line(record.line_number);
            draft.name = record.get_owned("name").or_else(|| anchor_name(record));
            draft.proponent = record.get_owned("proponent");
            draft.original_protocol = record.get_owned("original_protocol");
            if let Some(status) = record.get("status") {
                draft.status = DraftStatus::Raw(status.to_string());
            }
            draft.country = record.get_owned("country");
            draft.project_url = record
                .get(PROJECT_LINK)
                .and_then(|link| INTERNAL_ID_RE.captures(link))
                .and_then(|c| c.get(1))
                .map(|id| format!("{}{}", PROJECT_URL_BASE, id.as_str()));
            drafts.push(draft);
        }

        info!(projects = drafts.len(), "reconciled gcc projects");
        Ok(drafts)
    }

    fn reconcile_credits(
        &self,
        kind: DownloadKind,
        rows: &[Record],
        ctx: &mut ReconcileContext<'_>,
    ) -> Result<Vec<Credit>> {
        let transaction_type = partition_type(REGISTRY, kind)?;
        let ids_by_name = project_ids_by_name(ctx.raw_projects);
        let mut credits = Vec::with_capacity(rows.len());

        for record in rows {
            let name = record
                .get(PROJECT_NAME)
                .ok_or_else(|| ambiguous(REGISTRY, record, "credit row without project name"))?;
            let project_id = ids_by_name
                .get(name)
                .cloned()
                .ok_or_else(|| ambiguous(REGISTRY, record, format!("no project named {:?}", name)))?;

            let Some(quantity) = required_quantity(REGISTRY, record, "quantity", &mut ctx.quality)? else {
                continue;
            };

            // issuance rows carry no date
            let date = match transaction_type {
                TransactionType::Retirement => record.get(RETIREMENT_DATE).and_then(parse_unix_millis),
                _ => None,
            };

            credits.push(
                Credit::new(project_id, REGISTRY, transaction_type, quantity)
                    .with_vintage(record.get("vintage").and_then(parse_last_year))
                    .with_date(date),
            );
        }

        Ok(credits)
    }
}

/// `S00123` → `GCC00123`
fn project_id(submission: &str) -> String {
    let submission = submission.trim();
    if submission.to_uppercase().starts_with(REGISTRY.prefix()) {
        return submission.to_string();
    }
    match submission.strip_prefix('S') {
        Some(rest) => format!("{}{}", REGISTRY.prefix(), rest),
        None => format!("{}{}", REGISTRY.prefix(), submission),
    }
}

fn anchor_name(record: &Record) -> Option<String> {
    let link = record.get(PROJECT_LINK)?;
    let text = ANCHOR_TEXT_RE.captures(link)?.get(1)?.as_str().trim();
    Some(text.to_string()).filter(|t| !t.is_empty())
}

/// Project name (from the anchor text) → canonical project id
fn project_ids_by_name(projects: &[Record]) -> HashMap<String, String> {
    projects
        .iter()
        .filter_map(|record| {
            let name = record.get_owned("name").or_else(|| anchor_name(record))?;
            let submission = record.get("project_id")?;
            Some((name, project_id(submission)))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::MappingTables;
    use chrono::NaiveDate;

    fn project_row() -> Record {
        Record::from_pairs(
            2,
            &[
                ("project_id", "S00123"),
                (
                    PROJECT_LINK,
                    r#"<a href="https://projects.globalcarboncouncil.com/project/456">Solar Park Qatar</a>"#,
                ),
                ("status", "REGISTERED"),
            ],
        )
    }

    #[test]
    fn test_project_fields_from_anchor() {
        let tables = MappingTables::embedded().unwrap();
        let mut ctx = ReconcileContext::new(&tables);
        let drafts = GccReconciler.reconcile_projects(&[project_row()], &mut ctx).unwrap();

        assert_eq!(drafts[0].project_id, "GCC00123");
        assert_eq!(drafts[0].name.as_deref(), Some("Solar Park Qatar"));
        assert_eq!(
            drafts[0].project_url.as_deref(),
            Some("https://projects.globalcarboncouncil.com/project/456")
        );
    }

    #[test]
    fn test_credits_join_by_name() {
        let tables = MappingTables::embedded().unwrap();
        let projects = vec![project_row()];
        let mut ctx = ReconcileContext::new(&tables).with_raw_projects(&projects);

        let issuances = vec![Record::from_pairs(
            2,
            &[(PROJECT_NAME, "Solar Park Qatar"), ("quantity", "500"), ("vintage", "2019 - 2020")],
        )];
        let credits = GccReconciler
            .reconcile_credits(DownloadKind::Issuances, &issuances, &mut ctx)
            .unwrap();
        assert_eq!(credits[0].project_id, "GCC00123");
        assert_eq!(credits[0].vintage, Some(2020));
        assert_eq!(credits[0].transaction_date, None);

        let retirements = vec![Record::from_pairs(
            2,
            &[
                (PROJECT_NAME, "Solar Park Qatar"),
                ("quantity", "20"),
                ("vintage", "2020"),
                (RETIREMENT_DATE, "1672531200000"),
            ],
        )];
        let credits = GccReconciler
            .reconcile_credits(DownloadKind::Retirements, &retirements, &mut ctx)
            .unwrap();
        assert_eq!(credits[0].transaction_type, TransactionType::Retirement);
        assert_eq!(credits[0].transaction_date, NaiveDate::from_ymd_opt(2023, 1, 1));
    }

    #[test]
    fn test_unknown_project_name_is_ambiguous() {
        let tables = MappingTables::embedded().unwrap();
        let mut ctx = ReconcileContext::new(&tables);
        let rows = vec![Record::from_pairs(2, &[(PROJECT_NAME, "Nowhere"), ("quantity", "1")])];
        let err = GccReconciler
            .reconcile_credits(DownloadKind::Issuances, &rows, &mut ctx)
            .unwrap_err();
        assert!(err.is_ambiguous_event());
    }

    #[test]
    fn test_submission_number_prefix() {
        assert_eq!(project_id("S00123"), "GCC00123");
        assert_eq!(project_id("GCC7"), "GCC7");
        assert_eq!(project_id("42"), "GCC42");
    }
}
