// 🏭 Batch Pipeline - One (registry, processing date) batch end to end
//
// Flow:
// 1. Column mapping (projects, then each credit partition)
// 2. Registry reconciliation
// 3. Natural-key deduplication
// 4. Harmonization (protocol, category, status, country)
// 5. ARB overlay, credit totals, surrogate ids
// 6. Schema validation; any violation discards the batch

use crate::columns::ColumnMapper;
use crate::data_quality::QualityLog;
use crate::deduplication::{dedup_projects, DuplicateMatch};
use crate::entities::{Credit, Project};
use crate::error::{HarmonizeError, Result};
use crate::harmonize::{apply_credit_totals, Harmonizer};
use crate::mapping::MappingTables;
use crate::reconciliation::{overlay_arb, process_arb, reconciler_for, ReconcileContext};
use crate::record::{load_csv, Record};
use crate::registry::{DownloadKind, Registry};
use crate::schema::validate_batch;
use anyhow::Context;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{info, info_span};
use uuid::Uuid;

// ============================================================================
// INPUT
// ============================================================================

/// Raw rows of one batch
#[derive(Debug, Clone)]
pub struct BatchInput {
    pub registry: Registry,
    pub processing_date: NaiveDate,
    pub projects: Vec<Record>,
    pub credits: Vec<(DownloadKind, Vec<Record>)>,

    /// ARB issuance table, applied when present
    pub arb: Option<Vec<Record>>,
}

impl BatchInput {
    pub fn new(registry: Registry, processing_date: NaiveDate) -> Self {
        BatchInput {
            registry,
            processing_date,
            projects: Vec::new(),
            credits: Vec::new(),
            arb: None,
        }
    }

    /// Builder: project rows
    pub fn with_projects(mut self, rows: Vec<Record>) -> Self {
        self.projects = rows;
        self
    }

    /// Builder: one credit partition
    pub fn with_credits(mut self, kind: DownloadKind, rows: Vec<Record>) -> Self {
        self.credits.push((kind, rows));
        self
    }

    /// Builder: ARB issuance table
    pub fn with_arb(mut self, rows: Vec<Record>) -> Self {
        self.arb = Some(rows);
        self
    }

    /// Load every input file of a batch
    pub fn from_files(
        registry: Registry,
        processing_date: NaiveDate,
        projects: &Path,
        credits: &[(DownloadKind, &Path)],
        arb: Option<&Path>,
    ) -> anyhow::Result<Self> {
        let mut input = BatchInput::new(registry, processing_date)
            .with_projects(load_csv(projects).context("Failed to load project export")?);

        for (kind, path) in credits {
            let rows = load_csv(path).with_context(|| format!("Failed to load {} export", kind.name()))?;
            input = input.with_credits(*kind, rows);
        }
        if let Some(path) = arb {
            input = input.with_arb(load_csv(path).context("Failed to load ARB issuance table")?);
        }
        Ok(input)
    }

    fn credit_rows(&self) -> usize {
        self.credits.iter().map(|(_, rows)| rows.len()).sum()
    }
}

// ============================================================================
// OUTPUT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    pub batch_id: Uuid,
    pub registry: Registry,
    pub processing_date: NaiveDate,
    pub created_at: DateTime<Utc>,

    pub project_rows_in: usize,
    pub credit_rows_in: usize,
    pub projects_out: usize,
    pub credits_out: usize,
    pub duplicates_dropped: usize,

    /// SHA-256 of the mapping assets the batch ran against
    pub mapping_fingerprint: String,

    pub quality_by_severity: BTreeMap<String, usize>,
    pub quality_by_field: BTreeMap<String, usize>,
}

#[derive(Debug, Clone)]
pub struct BatchOutput {
    pub projects: Vec<Project>,
    pub credits: Vec<Credit>,
    pub duplicates: Vec<DuplicateMatch>,
    pub quality: QualityLog,
    pub report: BatchReport,
}

// ============================================================================
// RUN
// ============================================================================

/// Run one batch; the result is either fully validated output or an error
pub fn run_batch(tables: &MappingTables, input: BatchInput) -> Result<BatchOutput> {
    let registry = input.registry;
    let span = info_span!("batch", registry = %registry, date = %input.processing_date);
    let _guard = span.enter();

    let reconciler = reconciler_for(registry);

    let project_rows = ColumnMapper::for_projects(tables, registry)?.apply_all(&input.projects);
    let mut ctx = ReconcileContext::new(tables).with_raw_projects(&project_rows);

    let drafts = reconciler.reconcile_projects(&project_rows, &mut ctx)?;
    let (drafts, duplicates) = dedup_projects(drafts, &mut ctx.quality);
    let mut projects = Harmonizer::new(tables).harmonize_projects(drafts, &mut ctx.quality);

    let mut credits = Vec::new();
    for (kind, rows) in &input.credits {
        let mapped = ColumnMapper::for_credits(tables, registry, *kind)?.apply_all(rows);
        let reconciled = reconciler.reconcile_credits(*kind, &mapped, &mut ctx)?;
        info!(kind = kind.name(), rows = rows.len(), credits = reconciled.len(), "reconciled credits");
        credits.extend(reconciled);
    }

    if let Some(arb_rows) = &input.arb {
        let arb = process_arb(arb_rows)?;
        credits = overlay_arb(registry, credits, &arb, &projects, &mut ctx.quality);
    }

    apply_credit_totals(&mut projects, &credits);
    assign_ids(&mut projects, &mut credits);

    validate_batch(&projects, &credits).map_err(HarmonizeError::SchemaViolation)?;

    let quality = ctx.quality;
    let report = BatchReport {
        batch_id: Uuid::new_v4(),
        registry,
        processing_date: input.processing_date,
        created_at: Utc::now(),
        project_rows_in: input.projects.len(),
        credit_rows_in: input.credit_rows(),
        projects_out: projects.len(),
        credits_out: credits.len(),
        duplicates_dropped: duplicates.len(),
        mapping_fingerprint: tables.fingerprint().to_string(),
        quality_by_severity: quality.counts_by_severity(),
        quality_by_field: quality.counts_by_field(),
    };

    info!(
        projects = report.projects_out,
        credits = report.credits_out,
        issues = quality.len(),
        "batch complete"
    );

    Ok(BatchOutput {
        projects,
        credits,
        duplicates,
        quality,
        report,
    })
}

/// Surrogate ids in output order, once the batch is final
fn assign_ids(projects: &mut [Project], credits: &mut [Credit]) {
    for (i, project) in projects.iter_mut().enumerate() {
        project.id = Some(i as u64);
    }
    for (i, credit) in credits.iter_mut().enumerate() {
        credit.id = Some(i as u64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{ProjectStatus, TransactionType};

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 2, 1).unwrap()
    }

    fn gold_standard_input() -> BatchInput {
        let projects = vec![
            Record::from_pairs(
                2,
                &[
                    ("GSID", "1234"),
                    ("id", "77"),
                    ("Name", "Clean Cookstoves"),
                    ("Methodology", "TPDDTEC v3.1"),
                    ("Status", "GOLD_STANDARD_CERTIFIED_PROJECT"),
                    ("Country", "Kenya"),
                ],
            ),
            Record::from_pairs(3, &[("GSID", "1234"), ("Name", "Clean Cookstoves (dup)")]),
        ];
        let issuances = vec![
            Record::from_pairs(
                2,
                &[
                    ("project", "{'sustaincert_id': 1234}"),
                    ("Quantity", "1,000"),
                    ("Vintage", "2020"),
                    ("Issuance Date", "2021-03-01"),
                ],
            ),
            Record::from_pairs(
                3,
                &[
                    ("project", "{'sustaincert_id': 1234}"),
                    ("Quantity", "500"),
                    ("Vintage", "2020"),
                    ("Issuance Date", "2021-03-01"),
                ],
            ),
        ];
        let retirements = vec![Record::from_pairs(
            2,
            &[
                ("project", "{'sustaincert_id': 1234}"),
                ("Quantity", "200"),
                ("Vintage", "2020"),
                ("Retirement Date", "2022-06-15"),
            ],
        )];

        BatchInput::new(Registry::GoldStandard, date())
            .with_projects(projects)
            .with_credits(DownloadKind::Issuances, issuances)
            .with_credits(DownloadKind::Retirements, retirements)
    }

    #[test]
    fn test_gold_standard_batch() {
        let tables = MappingTables::embedded().unwrap();
        let output = run_batch(&tables, gold_standard_input()).unwrap();

        assert_eq!(output.projects.len(), 1);
        assert_eq!(output.duplicates.len(), 1);
        let project = &output.projects[0];
        assert_eq!(project.project_id, "GLD1234");
        assert_eq!(project.protocol, vec!["gs-tpddtec"]);
        assert_eq!(project.protocol_version, vec![Some("3.1".to_string())]);
        assert_eq!(project.status, Some(ProjectStatus::Registered));
        assert_eq!(project.issued, 1500);
        assert_eq!(project.retired, 200);
        assert_eq!(project.first_retirement_at, NaiveDate::from_ymd_opt(2022, 6, 15));
        assert_eq!(project.id, Some(0));

        assert_eq!(output.credits.len(), 2);
        assert!(output.credits.iter().all(|c| c.id.is_some() && c.registry == Registry::GoldStandard));
        assert_eq!(output.credits[1].transaction_type, TransactionType::Retirement);

        assert_eq!(output.report.project_rows_in, 2);
        assert_eq!(output.report.credit_rows_in, 3);
        assert_eq!(output.report.duplicates_dropped, 1);
        assert_eq!(output.report.mapping_fingerprint, tables.fingerprint());
    }

    #[test]
    fn test_unpublished_partition_fails_batch() {
        let tables = MappingTables::embedded().unwrap();
        let input = gold_standard_input().with_credits(DownloadKind::Cancellations, Vec::new());
        let err = run_batch(&tables, input).unwrap_err();
        assert!(matches!(err, HarmonizeError::MappingGap { .. } | HarmonizeError::UnsupportedDownload { .. }));
    }

    #[test]
    fn test_ambiguous_row_fails_batch() {
        let tables = MappingTables::embedded().unwrap();
        let bad = vec![Record::from_pairs(2, &[("project", "{}"), ("Quantity", "5")])];
        let input = gold_standard_input().with_credits(DownloadKind::Retirements, bad);
        assert!(run_batch(&tables, input).unwrap_err().is_ambiguous_event());
    }
}
