// 🧩 Record Reconciler - Registry-specific business rules
//
// Architecture:
// - One Reconciler per registry, chosen by a closed match on Registry
// - Input rows are already column-mapped (canonical names + raw passthrough)
// - Output: ProjectDrafts (vocabulary still raw) and Credits (final shape)
//
// A row a reconciler cannot classify is an AmbiguousEvent carrying the
// registry, row number and row context.

pub mod apx;
pub mod arb;
pub mod gcc;
pub mod gold_standard;
pub mod verra;

pub use apx::ApxReconciler;
pub use arb::{overlay_arb, process_arb, ArbCredit};
pub use gcc::GccReconciler;
pub use gold_standard::GoldStandardReconciler;
pub use verra::VerraReconciler;

use crate::data_quality::{QualityIssue, QualityLog};
use crate::dates::parse_integer;
use crate::entities::{Credit, ProjectDraft, TransactionType};
use crate::error::{HarmonizeError, Result};
use crate::mapping::MappingTables;
use crate::record::Record;
use crate::registry::{DownloadKind, Registry};
use std::collections::BTreeMap;

// ============================================================================
// CONTEXT
// ============================================================================

/// What a reconciler can see besides its own rows
pub struct ReconcileContext<'a> {
    pub tables: &'a MappingTables,

    /// Column-mapped project rows of the same batch
    /// (GCC credits resolve project ids by project name)
    pub raw_projects: &'a [Record],

    pub quality: QualityLog,
}

impl<'a> ReconcileContext<'a> {
    pub fn new(tables: &'a MappingTables) -> Self {
        ReconcileContext {
            tables,
            raw_projects: &[],
            quality: QualityLog::new(),
        }
    }

    /// Builder: attach the batch's project rows
    pub fn with_raw_projects(mut self, rows: &'a [Record]) -> Self {
        self.raw_projects = rows;
        self
    }
}

// ============================================================================
// RECONCILER TRAIT
// ============================================================================

pub trait Reconciler {
    fn registry(&self) -> Registry;

    /// Project rows → drafts
    fn reconcile_projects(
        &self,
        rows: &[Record],
        ctx: &mut ReconcileContext<'_>,
    ) -> Result<Vec<ProjectDraft>>;

    /// Credit rows from one download partition → credits
    fn reconcile_credits(
        &self,
        kind: DownloadKind,
        rows: &[Record],
        ctx: &mut ReconcileContext<'_>,
    ) -> Result<Vec<Credit>>;
}

/// Get the reconciler for a registry
pub fn reconciler_for(registry: Registry) -> Box<dyn Reconciler> {
    match registry {
        Registry::Verra => Box::new(VerraReconciler),
        Registry::GoldStandard => Box::new(GoldStandardReconciler),
        Registry::AmericanCarbonRegistry
        | Registry::ClimateActionReserve
        | Registry::ArtTrees => Box::new(ApxReconciler::new(registry)),
        Registry::GlobalCarbonCouncil => Box::new(GccReconciler),
    }
}

// ============================================================================
// SHARED RULES
// ============================================================================

/// Build an AmbiguousEvent for one row
pub fn ambiguous(registry: Registry, record: &Record, reason: impl Into<String>) -> HarmonizeError {
    HarmonizeError::AmbiguousEvent {
        registry: registry.name().to_string(),
        row: record.line_number,
        reason: reason.into(),
        context: record.context(),
    }
}

/// Transaction type implied by a partition, rejecting partitions the registry does not publish
pub fn partition_type(registry: Registry, kind: DownloadKind) -> Result<TransactionType> {
    let unsupported = || HarmonizeError::UnsupportedDownload {
        registry: registry.name().to_string(),
        kind: kind.name().to_string(),
    };

    if !DownloadKind::published_by(registry).contains(&kind) {
        return Err(unsupported());
    }
    TransactionType::for_partition(kind).ok_or_else(unsupported)
}

/// Quantity cell: blank is `None`; negative or fractional values are unclassifiable
pub fn quantity(registry: Registry, record: &Record, field: &str) -> Result<Option<i64>> {
    match record.get(field) {
        None => Ok(None),
        Some(raw) => match parse_integer(raw) {
            Some(q) if q >= 0 => Ok(Some(q)),
            _ => Err(ambiguous(
                registry,
                record,
                format!("{} is not a non-negative whole number: {}", field, raw),
            )),
        },
    }
}

/// Quantity cell that must be present; a blank cell skips the row with an audit entry
pub fn required_quantity(
    registry: Registry,
    record: &Record,
    field: &str,
    quality: &mut QualityLog,
) -> Result<Option<i64>> {
    let value = quantity(registry, record, field)?;
    if value.is_none() {
        quality.record(
            QualityIssue::info(registry, "quantity", "row without quantity skipped")
                .with_row(record.line_number),
        );
    }
    Ok(value)
}

/// Sum issuances per (project_id, transaction_date, vintage) and drop non-positive totals
///
/// Non-issuance credits pass through in their original order, after the issuances.
pub fn aggregate_issuances(credits: Vec<Credit>) -> Vec<Credit> {
    let mut groups: BTreeMap<(String, Option<chrono::NaiveDate>, Option<i32>), Credit> = BTreeMap::new();
    let mut others = Vec::new();

    for credit in credits {
        if credit.transaction_type != TransactionType::Issuance {
            others.push(credit);
            continue;
        }
        let key = (credit.project_id.clone(), credit.transaction_date, credit.vintage);
        groups
            .entry(key)
            .and_modify(|existing| existing.quantity += credit.quantity)
            .or_insert(credit);
    }

    groups
        .into_values()
        .filter(|c| c.quantity > 0)
        .chain(others)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn issuance(id: &str, day: u32, vintage: i32, quantity: i64) -> Credit {
        Credit::new(id, Registry::GoldStandard, TransactionType::Issuance, quantity)
            .with_vintage(Some(vintage))
            .with_date(NaiveDate::from_ymd_opt(2022, 1, day))
    }

    #[test]
    fn test_aggregate_issuances_sums_groups() {
        let retirement = Credit::new("GLD1", Registry::GoldStandard, TransactionType::Retirement, 5);
        let credits = vec![
            issuance("GLD1", 1, 2020, 100),
            retirement.clone(),
            issuance("GLD1", 1, 2020, 50),
            issuance("GLD1", 2, 2020, 10),
            issuance("GLD2", 1, 2020, 0),
        ];

        let aggregated = aggregate_issuances(credits);

        assert_eq!(aggregated.len(), 3);
        assert_eq!(aggregated[0].quantity, 150);
        assert_eq!(aggregated[1].quantity, 10);
        assert_eq!(aggregated[2], retirement);
    }

    #[test]
    fn test_partition_type() {
        assert_eq!(
            partition_type(Registry::ArtTrees, DownloadKind::Cancellations).unwrap(),
            TransactionType::Cancellation
        );
        assert!(matches!(
            partition_type(Registry::GoldStandard, DownloadKind::Cancellations),
            Err(HarmonizeError::UnsupportedDownload { .. })
        ));
        assert!(partition_type(Registry::Verra, DownloadKind::Issuances).is_err());
    }

    #[test]
    fn test_quantity_parsing() {
        let record = Record::from_pairs(3, &[("q", "1,500"), ("bad", "-2"), ("blank", "")]);
        assert_eq!(quantity(Registry::Verra, &record, "q").unwrap(), Some(1500));
        assert_eq!(quantity(Registry::Verra, &record, "blank").unwrap(), None);

        let err = quantity(Registry::Verra, &record, "bad").unwrap_err();
        assert!(err.is_ambiguous_event());
    }

    #[test]
    fn test_dispatch_covers_every_registry() {
        for registry in Registry::ALL {
            assert_eq!(reconciler_for(registry).registry(), registry);
        }
    }
}
