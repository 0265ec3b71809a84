// 🏢 APX Registries - American Carbon Registry, Climate Action Reserve, ART TREES
//
// All three publish from the APX platform with the same export layout:
// month-first dates with a time part, prefixed project ids, and one file per
// transaction type. ACR adds a second status column for compliance programs.

use super::{aggregate_issuances, ambiguous, partition_type, required_quantity, ReconcileContext, Reconciler};
use crate::dates::{parse_date, parse_year, DateOrder};
use crate::entities::{Credit, DraftStatus, ProjectDraft, TransactionType};
use crate::error::Result;
use crate::mapping::StatusLookup;
use crate::record::Record;
use crate::registry::{DownloadKind, Registry};
use tracing::info;

const ORDER: DateOrder = DateOrder::MonthFirst;

/// ACR compliance-program status column
pub const COMPLIANCE_STATUS: &str = "Compliance Program Status (ARB or Ecology)";
/// ACR voluntary-market status column
pub const VOLUNTARY_STATUS: &str = "Voluntary Status";
/// Compliance-status value meaning "not a compliance project"
pub const NOT_COMPLIANCE_ELIGIBLE: &str = "Not ARB or Ecology Eligible";

pub struct ApxReconciler {
    registry: Registry,
}

impl ApxReconciler {
    pub fn new(registry: Registry) -> Self {
        debug_assert!(registry.is_apx(), "{} is not an APX registry", registry);
        ApxReconciler { registry }
    }

    fn prefixed_id(&self, raw: &str) -> String {
        let raw = raw.trim();
        if raw.to_uppercase().starts_with(self.registry.prefix()) {
            raw.to_string()
        } else {
            format!("{}{}", self.registry.prefix(), raw)
        }
    }

    /// ACR: compliance projects take status from the compliance vocabulary only,
    /// everything else from `Voluntary Status`; the two are never blended
    fn acr_status(&self, record: &Record, ctx: &ReconcileContext<'_>) -> Result<(bool, DraftStatus)> {
        let compliance = record
            .get(COMPLIANCE_STATUS)
            .filter(|s| !s.eq_ignore_ascii_case(NOT_COMPLIANCE_ELIGIBLE));

        match compliance {
            Some(raw) => match ctx.tables.statuses.compliance(raw) {
                StatusLookup::Mapped(status) => Ok((true, DraftStatus::Resolved(Some(status)))),
                StatusLookup::NoEquivalent => Ok((true, DraftStatus::Resolved(None))),
                StatusLookup::Missing => Err(ambiguous(
                    self.registry,
                    record,
                    format!("compliance status outside the compliance vocabulary: {}", raw),
                )),
            },
            None => {
                let status = match record.get(VOLUNTARY_STATUS) {
                    Some(raw) => DraftStatus::Raw(raw.to_string()),
                    None => DraftStatus::Resolved(None),
                };
                Ok((false, status))
            }
        }
    }
}

impl Reconciler for ApxReconciler {
    fn registry(&self) -> Registry {
        self.registry
    }

    fn reconcile_projects(
        &self,
        rows: &[Record],
        ctx: &mut ReconcileContext<'_>,
    ) -> Result<Vec<ProjectDraft>> {
        let mut drafts = Vec::with_capacity(rows.len());

        for record in rows {
            let raw_id = record
                .get("project_id")
                .ok_or_else(|| ambiguous(self.registry, record, "project row without project ID"))?;
            let project_id = self.prefixed_id(raw_id);

            let mut draft = ProjectDraft::new(project_id.clone(), self.registry).with_line(record.line_number);
            draft.name = record.get_owned("name");
            draft.proponent = record.get_owned("proponent");
            draft.original_protocol = record.get_owned("original_protocol");
            draft.country = record.get_owned("country");
            draft.listed_at = record.get("listed_at").and_then(|d| parse_date(d, ORDER));
            draft.project_url = self.registry.project_url(&project_id);

            match self.registry {
                Registry::AmericanCarbonRegistry => {
                    let (is_compliance, status) = self.acr_status(record, ctx)?;
                    draft.is_compliance = is_compliance;
                    draft.status = status;
                }
                Registry::ArtTrees => {
                    draft.protocol_override = Some(vec!["art-trees".to_string()]);
                    if let Some(status) = record.get("status") {
                        draft.status = DraftStatus::Raw(status.to_string());
                    }
                }
                _ => {
                    if let Some(status) = record.get("status") {
                        draft.status = DraftStatus::Raw(status.to_string());
                    }
                }
            }

            drafts.push(draft);
        }

        info!(registry = %self.registry, projects = drafts.len(), "reconciled apx projects");
        Ok(drafts)
    }

    fn reconcile_credits(
        &self,
        kind: DownloadKind,
        rows: &[Record],
        ctx: &mut ReconcileContext<'_>,
    ) -> Result<Vec<Credit>> {
        let transaction_type = partition_type(self.registry, kind)?;
        let mut credits = Vec::with_capacity(rows.len());

        for record in rows {
            let raw_id = record
                .get("project_id")
                .ok_or_else(|| ambiguous(self.registry, record, "credit row without project ID"))?;

            let Some(quantity) = required_quantity(self.registry, record, "quantity", &mut ctx.quality)? else {
                continue;
            };

            credits.push(
                Credit::new(self.prefixed_id(raw_id), self.registry, transaction_type, quantity)
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::ProjectStatus;
    use crate::mapping::MappingTables;
    use chrono::NaiveDate;

    fn acr_row(compliance: &str, voluntary: &str) -> Record {
        Record::from_pairs(
            5,
            &[
                ("project_id", "ACR255"),
                ("name", "Grassland"),
                (COMPLIANCE_STATUS, compliance),
                (VOLUNTARY_STATUS, voluntary),
            ],
        )
    }

    fn reconcile_acr(rows: &[Record]) -> Result<Vec<ProjectDraft>> {
        let tables = MappingTables::embedded().unwrap();
        let mut ctx = ReconcileContext::new(&tables);
        ApxReconciler::new(Registry::AmericanCarbonRegistry).reconcile_projects(rows, &mut ctx)
    }

    #[test]
    fn test_acr_voluntary_project() {
        let drafts = reconcile_acr(&[acr_row(NOT_COMPLIANCE_ELIGIBLE, "Listed")]).unwrap();
        assert!(!drafts[0].is_compliance);
        assert_eq!(drafts[0].status, DraftStatus::Raw("Listed".to_string()));
    }

    #[test]
    fn test_acr_blank_compliance_column_is_voluntary() {
        let drafts = reconcile_acr(&[acr_row("", "Completed")]).unwrap();
        assert!(!drafts[0].is_compliance);
        assert_eq!(drafts[0].status, DraftStatus::Raw("Completed".to_string()));
    }

    #[test]
    fn test_acr_compliance_project_ignores_voluntary_status() {
        let drafts = reconcile_acr(&[acr_row("ARB Completed", "Listed")]).unwrap();
        assert!(drafts[0].is_compliance);
        assert_eq!(drafts[0].status, DraftStatus::Resolved(Some(ProjectStatus::Completed)));
    }

    #[test]
    fn test_acr_unknown_compliance_status_is_ambiguous() {
        let err = reconcile_acr(&[acr_row("Pending Review", "Listed")]).unwrap_err();
        assert!(err.is_ambiguous_event());
    }

    #[test]
    fn test_art_has_fixed_protocol() {
        let tables = MappingTables::embedded().unwrap();
        let mut ctx = ReconcileContext::new(&tables);
        let rows = vec![Record::from_pairs(2, &[("project_id", "ART101"), ("status", "Registered")])];
        let drafts = ApxReconciler::new(Registry::ArtTrees)
            .reconcile_projects(&rows, &mut ctx)
            .unwrap();
        assert_eq!(drafts[0].protocol_override, Some(vec!["art-trees".to_string()]));
        assert_eq!(
            drafts[0].project_url.as_deref(),
            Some("https://art.apx.com/mymodule/reg/prjView.asp?id1=101")
        );
    }

    #[test]
    fn test_credit_dates_are_month_first_without_time() {
        let tables = MappingTables::embedded().unwrap();
        let mut ctx = ReconcileContext::new(&tables);
        let rows = vec![Record::from_pairs(
            2,
            &[
                ("project_id", "CAR1102"),
                ("quantity", "1,000"),
                ("vintage", "2019"),
                ("transaction_date", "03/04/2020 12:00:00 AM"),
            ],
        )];

        let credits = ApxReconciler::new(Registry::ClimateActionReserve)
            .reconcile_credits(DownloadKind::Cancellations, &rows, &mut ctx)
            .unwrap();

        assert_eq!(credits[0].transaction_type, TransactionType::Cancellation);
        assert_eq!(credits[0].quantity, 1000);
        assert_eq!(credits[0].transaction_date, NaiveDate::from_ymd_opt(2020, 3, 4));
        assert_eq!(credits[0].vintage, Some(2019));
    }
}
