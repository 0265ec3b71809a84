// 🐻 ARB Issuance Table - California Air Resources Board compliance offsets
//
// One wide row per issuance: the issued quantity plus retirement columns for
// voluntary use, four California compliance periods and Quebec. Rows become
// long credit rows; for projects under an ARB protocol these replace the
// registry's own credits.

use crate::data_quality::{QualityIssue, QualityLog};
use crate::dates::{parse_date, parse_integer, parse_year, DateOrder};
use crate::entities::{Credit, Project, TransactionType};
use crate::error::{HarmonizeError, Result};
use crate::record::Record;
use crate::registry::Registry;
use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

pub const OPR_PROJECT_ID: &str = "OPR Project ID";
pub const CREDITS_ISSUED: &str = "ARB Offset Credits Issued";
pub const PROJECT_TYPE: &str = "Project Type";
pub const ISSUANCE_DATE: &str = "Issuance Date";
pub const VINTAGE: &str = "Vintage";
pub const RETIRED_VOLUNTARILY: &str = "Retired Voluntarily";
pub const RETIRED_QUEBEC: &str = "Retired for Compliance in Quebec";

/// California compliance-period retirement columns and the date each period closed
const CA_COMPLIANCE_PERIODS: [(&str, (i32, u32, u32)); 4] = [
    ("Retired 1st Compliance Period (CA)", (2016, 3, 21)),
    ("Retired 2nd Compliance Period (CA)", (2018, 11, 1)),
    ("Retired 3rd Compliance Period (CA)", (2021, 11, 1)),
    ("Retired 4th Compliance Period (CA)", (2022, 11, 1)),
];

/// Placeholder the table uses for deferred reforestation credits
const REFOREST_DEFER: &str = "reforest defer";

/// Registries that appear in the table with their own prefix
const PREFIXED: [Registry; 4] = [
    Registry::ClimateActionReserve,
    Registry::AmericanCarbonRegistry,
    Registry::Verra,
    Registry::ArtTrees,
];

/// One ARB credit row and the ARB protocol of its project
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArbCredit {
    pub credit: Credit,
    pub protocol: String,
}

// ============================================================================
// TABLE PROCESSING
// ============================================================================

/// Wide ARB rows (table order) → long credit rows
pub fn process_arb(rows: &[Record]) -> Result<Vec<ArbCredit>> {
    let vintages = interpolate_vintages(rows)?;
    let mut out = Vec::new();

    for (record, vintage) in rows.iter().zip(vintages) {
        let opr_id = cell(record, OPR_PROJECT_ID)
            .ok_or_else(|| arb_ambiguous(record, "row without OPR project id"))?;
        let project_id = prefixed_id(opr_id);
        let registry = Registry::from_project_id(&project_id)
            .ok_or_else(|| arb_ambiguous(record, format!("no registry for project id {}", project_id)))?;

        let project_type = cell(record, PROJECT_TYPE)
            .ok_or_else(|| arb_ambiguous(record, "row without project type"))?;
        let protocol = protocol_for_type(project_type)
            .ok_or_else(|| arb_ambiguous(record, format!("unrecognized project type: {}", project_type)))?;

        let issued_at = cell(record, ISSUANCE_DATE).and_then(|d| parse_date(d, DateOrder::MonthFirst));
        let mut push = |tx: TransactionType, quantity: i64, date: Option<NaiveDate>| {
            out.push(ArbCredit {
                credit: Credit::new(project_id.clone(), registry, tx, quantity)
                    .with_vintage(Some(vintage))
                    .with_date(date),
                protocol: protocol.to_string(),
            });
        };

        // issuance rows stay even at zero: they mark reporting periods
        push(TransactionType::Issuance, quantity(record, CREDITS_ISSUED)?, issued_at);

        let retirements = std::iter::once((RETIRED_VOLUNTARILY, None))
            .chain(CA_COMPLIANCE_PERIODS.iter().map(|(column, (y, m, d))| {
                (*column, NaiveDate::from_ymd_opt(*y, *m, *d))
            }))
            .chain(std::iter::once((RETIRED_QUEBEC, None)));

        for (column, date) in retirements {
            let retired = quantity(record, column)?;
            if retired > 0 {
                push(TransactionType::Retirement, retired, date);
            }
        }
    }

    info!(rows = rows.len(), credits = out.len(), "processed arb issuance table");
    Ok(out)
}

/// Lowercased project type → ARB protocol id
fn protocol_for_type(project_type: &str) -> Option<&'static str> {
    let t = project_type.to_lowercase();
    let protocol = if t.contains("urban") {
        "arb-urban-forest"
    } else if t.contains("forest") {
        "arb-forest"
    } else if t.contains("livestock") {
        "arb-livestock"
    } else if t.contains("ozone") || t.contains("ods") {
        "arb-ods"
    } else if t.contains("mine methane") || t.contains("mmc") {
        "arb-mine-methane"
    } else if t.contains("rice") {
        "arb-rice"
    } else {
        return None;
    };
    Some(protocol)
}

fn prefixed_id(opr_id: &str) -> String {
    let upper = opr_id.to_uppercase();
    if PREFIXED.iter().any(|r| upper.starts_with(r.prefix())) {
        opr_id.to_string()
    } else {
        format!("{}{}", Registry::Verra.prefix(), opr_id)
    }
}

/// Non-blank cell, treating the deferral placeholder as blank
fn cell<'r>(record: &'r Record, column: &str) -> Option<&'r str> {
    record
        .get(column)
        .filter(|v| !v.eq_ignore_ascii_case(REFOREST_DEFER))
}

/// Blank quantities count as zero
fn quantity(record: &Record, column: &str) -> Result<i64> {
    match cell(record, column) {
        None => Ok(0),
        Some(raw) => match parse_integer(raw) {
            Some(q) if q >= 0 => Ok(q),
            _ => Err(arb_ambiguous(record, format!("{} is not a non-negative whole number: {}", column, raw))),
        },
    }
}

/// Fill missing vintages by linear interpolation over table order
///
/// Gaps after the last known vintage repeat it; a gap before the first known
/// vintage cannot be filled.
fn interpolate_vintages(rows: &[Record]) -> Result<Vec<i32>> {
    let known: Vec<Option<i32>> = rows
        .iter()
        .map(|r| cell(r, VINTAGE).and_then(parse_year))
        .collect();

    let mut filled = Vec::with_capacity(rows.len());
    let mut previous: Option<(usize, i32)> = None;

    for (i, vintage) in known.iter().enumerate() {
        if let Some(v) = vintage {
            filled.push(*v);
            previous = Some((i, *v));
            continue;
        }

        let Some((start, from)) = previous else {
            return Err(arb_ambiguous(&rows[i], "vintage missing before any known vintage"));
        };
        let next = known[i..]
            .iter()
            .enumerate()
            .find_map(|(offset, v)| v.map(|v| (i + offset, v)));

        let value = match next {
            Some((end, to)) => {
                let step = (i - start) as f64 * (to - from) as f64 / (end - start) as f64;
                (from as f64 + step) as i32
            }
            None => from,
        };
        filled.push(value);
    }

    Ok(filled)
}

fn arb_ambiguous(record: &Record, reason: impl Into<String>) -> HarmonizeError {
    HarmonizeError::AmbiguousEvent {
        registry: "arb".to_string(),
        row: record.line_number,
        reason: reason.into(),
        context: record.context(),
    }
}

// ============================================================================
// OVERLAY
// ============================================================================

/// Replace a batch's registry credits with ARB credits where ARB is authoritative
///
/// A project joins when the batch carries it under the ARB protocol of its
/// ARB rows. Projects the batch does not carry join on project id alone, and
/// only when the registry reported credits for them.
pub fn overlay_arb(
    registry: Registry,
    credits: Vec<Credit>,
    arb: &[ArbCredit],
    projects: &[Project],
    quality: &mut QualityLog,
) -> Vec<Credit> {
    let mut arb_by_project: BTreeMap<&str, Vec<&ArbCredit>> = BTreeMap::new();
    for arb_credit in arb.iter().filter(|a| a.credit.registry == registry) {
        arb_by_project
            .entry(arb_credit.credit.project_id.as_str())
            .or_default()
            .push(arb_credit);
    }

    let with_registry_credits: BTreeSet<&str> = credits.iter().map(|c| c.project_id.as_str()).collect();
    let mut matched: BTreeSet<String> = BTreeSet::new();

    for (project_id, rows) in &arb_by_project {
        let arb_protocols: BTreeSet<&str> = rows.iter().map(|a| a.protocol.as_str()).collect();

        match projects.iter().find(|p| p.project_id == *project_id) {
            Some(project) => {
                if project.protocol.iter().any(|p| arb_protocols.contains(p.as_str())) {
                    matched.insert(project_id.to_string());
                } else {
                    quality.record(
                        QualityIssue::info(registry, "protocol", "arb credits not applied, protocol differs")
                            .with_project(*project_id)
                            .with_value(arb_protocols.into_iter().collect::<Vec<_>>().join(",")),
                    );
                }
            }
            None if with_registry_credits.contains(project_id) => {
                matched.insert(project_id.to_string());
            }
            None => debug!(project_id, "arb project outside this batch"),
        }
    }

    let mut merged: Vec<Credit> = credits
        .into_iter()
        .filter(|c| !matched.contains(&c.project_id))
        .collect();
    merged.extend(
        arb_by_project
            .iter()
            .filter(|(id, _)| matched.contains(**id))
            .flat_map(|(_, rows)| rows.iter().map(|a| a.credit.clone())),
    );

    info!(registry = %registry, projects = matched.len(), "applied arb overlay");
    merged
}
