// 🌍 Verra - Combined transactions file with rolling issuances
//
// Verra publishes one transactions file. Each row is either an issuance event
// (no retirement date) or a retirement/cancellation (retirement date set), and
// every row repeats the vintage's running `Total Vintage Quantity`. Issuances
// are inferred from how that total grows within each (project, vintage).

use super::{aggregate_issuances, ambiguous, quantity, ReconcileContext, Reconciler};
use crate::data_quality::QualityIssue;
use crate::dates::{parse_date, year_of, DateOrder};
use crate::entities::{Credit, DraftStatus, ProjectDraft, ProjectStatus, TransactionType};
use crate::error::{HarmonizeError, Result};
use crate::record::Record;
use crate::registry::{DownloadKind, Registry};
use chrono::NaiveDate;
use std::collections::BTreeMap;
use tracing::{debug, info};

const REGISTRY: Registry = Registry::Verra;
const ORDER: DateOrder = DateOrder::DayFirst;

// Raw transaction columns
const ID: &str = "ID";
const ISSUANCE_DATE: &str = "Issuance Date";
const RETIREMENT_DATE: &str = "Retirement/Cancellation Date";
const VINTAGE_START: &str = "Vintage Start";
const VINTAGE_END: &str = "Vintage End";
const TOTAL_VINTAGE_QUANTITY: &str = "Total Vintage Quantity";
const QUANTITY_ISSUED: &str = "Quantity Issued";

pub struct VerraReconciler;

impl Reconciler for VerraReconciler {
    fn registry(&self) -> Registry {
        REGISTRY
    }

    fn reconcile_projects(
        &self,
        rows: &[Record],
        _ctx: &mut ReconcileContext<'_>,
    ) -> Result<Vec<ProjectDraft>> {
        let mut drafts = Vec::with_capacity(rows.len() + 2);

        for record in rows {
            let raw_id = record
                .get("project_id")
                .ok_or_else(|| ambiguous(REGISTRY, record, "project row without ID"))?;
            let project_id = prefixed_id(raw_id);

            let mut draft = ProjectDraft::new(project_id.clone(), REGISTRY).with_line(record.line_number);
            draft.name = record.get_owned("name");
            draft.proponent = record.get_owned("proponent");
            draft.original_protocol = record.get_owned("original_protocol");
            if let Some(status) = record.get("status") {
                draft.status = DraftStatus::Raw(status.to_string());
            }
            draft.country = record.get_owned("country");
            draft.listed_at = record.get("listed_at").and_then(|d| parse_date(d, ORDER));
            draft.project_url = REGISTRY.project_url(&project_id);
            drafts.push(draft);
        }

        for compliance in compliance_projects() {
            if drafts.iter().any(|d| d.project_id == compliance.project_id) {
                continue;
            }
            drafts.push(compliance);
        }

        info!(projects = drafts.len(), "reconciled verra projects");
        Ok(drafts)
    }

    fn reconcile_credits(
        &self,
        kind: DownloadKind,
        rows: &[Record],
        ctx: &mut ReconcileContext<'_>,
    ) -> Result<Vec<Credit>> {
        if kind != DownloadKind::Transactions {
            return Err(HarmonizeError::UnsupportedDownload {
                registry: REGISTRY.name().to_string(),
                kind: kind.name().to_string(),
            });
        }

        let events = rows
            .iter()
            .map(VintageEvent::from_record)
            .collect::<Result<Vec<_>>>()?;

        let mut credits = Vec::new();
        for event in &events {
            if let Some(retired) = event.retired {
                match retired {
                    Some(q) => credits.push(
                        Credit::new(&event.project_id, REGISTRY, TransactionType::RetirementCancellation, q)
                            .with_vintage(event.vintage)
                            .with_date(Some(event.date)),
                    ),
                    None => ctx.quality.record(
                        QualityIssue::info(REGISTRY, "quantity", "retirement without quantity skipped")
                            .with_row(event.line_number)
                            .with_project(event.project_id.clone()),
                    ),
                }
            }
        }

        let issuances = rolling_issuances(&events)?;
        debug!(
            issuances = issuances.len(),
            retirements = credits.len(),
            "inferred verra issuances"
        );
        credits.extend(issuances);
        Ok(aggregate_issuances(credits))
    }
}

// ============================================================================
// ROLLING ISSUANCE
// ============================================================================

/// One crediting event of a (project, vintage)
#[derive(Debug, Clone)]
struct VintageEvent<'r> {
    record: &'r Record,
    line_number: usize,
    project_id: String,
    vintage: Option<i32>,
    date: NaiveDate,

    /// Running total reported on this row
    total_vintage_quantity: Option<i64>,

    /// `Some(quantity)` for retirement/cancellation rows
    retired: Option<Option<i64>>,
}

impl<'r> VintageEvent<'r> {
    fn from_record(record: &'r Record) -> Result<Self> {
        let raw_id = record
            .get(ID)
            .or_else(|| record.get("project_id"))
            .ok_or_else(|| ambiguous(REGISTRY, record, "transaction without project ID"))?;

        let retirement_date = record.get(RETIREMENT_DATE).and_then(|d| parse_date(d, ORDER));
        let issuance_date = record.get(ISSUANCE_DATE).and_then(|d| parse_date(d, ORDER));
        let date = retirement_date.or(issuance_date).ok_or_else(|| {
            ambiguous(REGISTRY, record, "neither retirement nor issuance date is set")
        })?;

        let retired = match retirement_date {
            Some(_) => Some(quantity(REGISTRY, record, QUANTITY_ISSUED)?),
            None => None,
        };

        Ok(VintageEvent {
            record,
            line_number: record.line_number,
            project_id: prefixed_id(raw_id),
            vintage: earliest_vintage(record),
            date,
            total_vintage_quantity: quantity(REGISTRY, record, TOTAL_VINTAGE_QUANTITY)?,
            retired,
        })
    }
}

/// A vintage period spanning several years is attributed to its earliest year
fn earliest_vintage(record: &Record) -> Option<i32> {
    let start = record.get(VINTAGE_START).and_then(|d| year_of(d, ORDER));
    let end = record.get(VINTAGE_END).and_then(|d| year_of(d, ORDER));
    match (start, end) {
        (Some(s), Some(e)) => Some(s.min(e)),
        (s, e) => s.or(e),
    }
}

/// Within each (project, vintage), ordered by date: the first event implies an
/// issuance of the first reported total, dated at that first event even when
/// its own total is blank; every later increase of the total is an incremental
/// issuance dated when it is first observed.
fn rolling_issuances(events: &[VintageEvent<'_>]) -> Result<Vec<Credit>> {
    let mut groups: BTreeMap<(&str, Option<i32>), Vec<&VintageEvent<'_>>> = BTreeMap::new();
    for event in events {
        groups
            .entry((event.project_id.as_str(), event.vintage))
            .or_default()
            .push(event);
    }

    let mut issuances = Vec::new();
    for ((project_id, vintage), mut group) in groups {
        group.sort_by_key(|e| (e.date, e.line_number));

        let first = group[0];
        let opening = group
            .iter()
            .find_map(|e| e.total_vintage_quantity)
            .ok_or_else(|| ambiguous(REGISTRY, first.record, "no Total Vintage Quantity reported for vintage"))?;
        issuances.push(
            Credit::new(project_id, REGISTRY, TransactionType::Issuance, opening)
                .with_vintage(vintage)
                .with_date(Some(first.date)),
        );

        let mut issued_so_far = opening;
        for event in group {
            let Some(total) = event.total_vintage_quantity else {
                continue;
            };
            if total > issued_so_far {
                issuances.push(
                    Credit::new(project_id, REGISTRY, TransactionType::Issuance, total - issued_so_far)
                        .with_vintage(vintage)
                        .with_date(Some(event.date)),
                );
                issued_so_far = total;
            }
        }
    }
    Ok(issuances)
}

/// `75` → `VCS75`
fn prefixed_id(raw: &str) -> String {
    let raw = raw.trim();
    if raw.to_uppercase().starts_with(REGISTRY.prefix()) {
        raw.to_string()
    } else {
        format!("{}{}", REGISTRY.prefix(), raw)
    }
}

// ============================================================================
// COMPLIANCE PORTAL PROJECTS
// ============================================================================

/// Two projects listed only on Verra's compliance registry portal
fn compliance_projects() -> Vec<ProjectDraft> {
    let project = |id: &str, name: &str, protocol: &str, proponent: &str, url_id: u32| {
        let mut draft = ProjectDraft::new(id, REGISTRY).with_country("United States");
        draft.name = Some(name.to_string());
        draft.proponent = Some(proponent.to_string());
        draft.protocol_override = Some(vec![protocol.to_string()]);
        draft.status = DraftStatus::Resolved(Some(ProjectStatus::Registered));
        draft.is_compliance = true;
        draft.project_url = Some(format!("https://registry.verra.org/app/projectDetail/VCS/{}", url_id));
        draft
    };

    vec![
        project(
            "VCSOPR2",
            "Corinth Abandoned Mine Methane Recovery Project",
            "arb-mine-methane",
            "Keyrock Energy LLC",
            2265,
        ),
        project(
            "VCSOPR10",
            "Blue Source-Alford Improved Forest Management Project",
            "arb-forest",
            "Ozark Regional Land Trust",
            2271,
        ),
    ]
}
