// 🥇 Gold Standard - Separate issuance and retirement exports
// Credit rows identify their project through an embedded project literal

use super::{aggregate_issuances, ambiguous, partition_type, required_quantity, ReconcileContext, Reconciler};
use crate::dates::{parse_date, parse_year, DateOrder};
use crate::entities::{Credit, DraftStatus, ProjectDraft, TransactionType};
use crate::error::Result;
use crate::record::Record;
use crate::registry::{DownloadKind, Registry};
use regex::Regex;
use std::sync::LazyLock;
use tracing::info;

const REGISTRY: Registry = Registry::GoldStandard;
const ORDER: DateOrder = DateOrder::DayFirst;
const PROJECT_URL_BASE: &str = "https://registry.goldstandard.org/projects/details/";

/// `{'sustaincert_id': 1234, 'name': ...}` or the JSON equivalent
static SUSTAINCERT_ID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"['"]sustaincert_id['"]\s*:\s*['"]?([A-Za-z0-9]+)"#).unwrap()
});

pub struct GoldStandardReconciler;

impl Reconciler for GoldStandardReconciler {
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
            let gsid = record
                .get("project_id")
                .ok_or_else(|| ambiguous(REGISTRY, record, "project row without GSID"))?;

            let mut draft = ProjectDraft::new(prefixed_id(gsid), REGISTRY).with_line(record.line_number);
            draft.name = record.get_owned("name");
            draft.proponent = record.get_owned("proponent");
            draft.original_protocol = record.get_owned("original_protocol");
            if let Some(status) = record.get("status") {
                draft.status = DraftStatus::Raw(status.to_string());
            }
            draft.country = record.get_owned("country");
            draft.listed_at = record.get("listed_at").and_then(|d| parse_date(d, ORDER));
            // the public URL uses the internal id, not the GSID
            draft.project_url = record.get("id").map(|id| format!("{}{}", PROJECT_URL_BASE, id));
            drafts.push(draft);
        }

        info!(projects = drafts.len(), "reconciled gold standard projects");
        Ok(drafts)
    }

    fn reconcile_credits(
        &self,
        kind: DownloadKind,
        rows: &[Record],
        ctx: &mut ReconcileContext<'_>,
    ) -> Result<Vec<Credit>> {
        let transaction_type = partition_type(REGISTRY, kind)?;
        let mut credits = Vec::with_capacity(rows.len());

        for record in rows {
            let project_id = credit_project_id(record)
                .ok_or_else(|| ambiguous(REGISTRY, record, "credit row without sustaincert_id"))?;

            let Some(quantity) = required_quantity(REGISTRY, record, "quantity", &mut ctx.quality)? else {
                continue;
            };

            credits.push(
                Credit::new(project_id, REGISTRY, transaction_type, quantity)
                    .with_vintage(record.get("vintage").and_then(parse_year))
                    .with_date(record.get("transaction_date").and_then(|d| parse_date(d, ORDER))),
            );
        }

        if transaction_type == TransactionType::Issuance {
            credits = aggregate_issuances(credits);
        }
        Ok(credits)
    }
}

/// Project id from the embedded `project` literal
fn credit_project_id(record: &Record) -> Option<String> {
    let literal = record.get("project")?;
    let id = SUSTAINCERT_ID_RE.captures(literal)?.get(1)?;
    Some(prefixed_id(id.as_str()))
}

fn prefixed_id(raw: &str) -> String {
    let raw = raw.trim();
    if raw.to_uppercase().starts_with(REGISTRY.prefix()) {
        raw.to_string()
    } else {
        format!("{}{}", REGISTRY.prefix(), raw)
    }
}
