// 💾 Output Writer - Canonical datasets on disk
//
// Layout: <out>/<processing-date>/<registry>/{projects.csv, credits.csv, report.json}
// List columns (protocol, protocol_version, category, project_subcategory) are
// JSON-encoded inside their CSV cell.

use crate::entities::{Credit, Project};
use crate::pipeline::{BatchOutput, BatchReport};
use crate::summary::Summary;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

pub const PROJECTS_FILE: &str = "projects.csv";
pub const CREDITS_FILE: &str = "credits.csv";
pub const REPORT_FILE: &str = "report.json";
pub const SUMMARY_FILE: &str = "summary.json";

/// Flat CSV shape of a project
#[derive(Debug, Serialize, Deserialize)]
struct ProjectRow {
    id: Option<u64>,
    project_id: String,
    name: Option<String>,
    registry: String,
    proponent: Option<String>,
    protocol: String,
    protocol_version: String,
    category: String,
    project_subcategory: String,
    status: Option<String>,
    country: Option<String>,
    listed_at: Option<String>,
    first_issuance_at: Option<String>,
    first_retirement_at: Option<String>,
    is_compliance: bool,
    issued: i64,
    retired: i64,
    project_url: Option<String>,
}

impl ProjectRow {
    fn from_project(project: &Project) -> Result<Self> {
        Ok(ProjectRow {
            id: project.id,
            project_id: project.project_id.clone(),
            name: project.name.clone(),
            registry: project.registry.name().to_string(),
            proponent: project.proponent.clone(),
            protocol: serde_json::to_string(&project.protocol)?,
            protocol_version: serde_json::to_string(&project.protocol_version)?,
            category: serde_json::to_string(&project.category)?,
            project_subcategory: serde_json::to_string(&project.project_subcategory)?,
            status: project.status.map(|s| s.as_str().to_string()),
            country: project.country.clone(),
            listed_at: project.listed_at.map(|d| d.to_string()),
            first_issuance_at: project.first_issuance_at.map(|d| d.to_string()),
            first_retirement_at: project.first_retirement_at.map(|d| d.to_string()),
            is_compliance: project.is_compliance,
            issued: project.issued,
            retired: project.retired,
            project_url: project.project_url.clone(),
        })
    }
}

/// Directory a batch is written to
pub fn batch_dir(out: &Path, report: &BatchReport) -> PathBuf {
    out.join(report.processing_date.to_string())
        .join(report.registry.name())
}

/// Write one validated batch; returns the batch directory
pub fn write_batch(out: &Path, batch: &BatchOutput) -> Result<PathBuf> {
    let dir = batch_dir(out, &batch.report);
    fs::create_dir_all(&dir).with_context(|| format!("Failed to create output directory: {:?}", dir))?;

    write_projects(&dir.join(PROJECTS_FILE), &batch.projects)?;
    write_credits(&dir.join(CREDITS_FILE), &batch.credits)?;
    write_json(&dir.join(REPORT_FILE), &batch.report)?;

    info!(
        dir = %dir.display(),
        projects = batch.projects.len(),
        credits = batch.credits.len(),
        "batch written"
    );
    Ok(dir)
}

pub fn write_projects(path: &Path, projects: &[Project]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create CSV file: {:?}", path))?;
    for project in projects {
        let row = ProjectRow::from_project(project)
            .with_context(|| format!("Failed to encode project {}", project.project_id))?;
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_credits(path: &Path, credits: &[Credit]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create CSV file: {:?}", path))?;
    for credit in credits {
        writer.serialize(credit)?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json).with_context(|| format!("Failed to write {:?}", path))?;
    Ok(())
}

pub fn load_summary(path: &Path) -> Result<Summary> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read summary: {:?}", path))?;
    let summary = serde_json::from_str(&content)
        .with_context(|| format!("Invalid summary JSON: {:?}", path))?;
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{ProjectStatus, TransactionType};
    use crate::record::load_csv;
    use crate::registry::Registry;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn project() -> Project {
        Project {
            id: Some(0),
            project_id: "VCS75".to_string(),
            name: Some("Wind, Phase 2".to_string()),
            registry: Registry::Verra,
            proponent: None,
            protocol: vec!["acm0001".to_string(), "acm0022".to_string()],
            protocol_version: vec![Some("19.0".to_string()), None],
            category: vec!["ghg-management".to_string()],
            project_subcategory: vec!["landfill".to_string()],
            status: Some(ProjectStatus::Registered),
            country: None,
            listed_at: NaiveDate::from_ymd_opt(2012, 5, 4),
            first_issuance_at: None,
            first_retirement_at: None,
            is_compliance: false,
            issued: 100,
            retired: 0,
            project_url: None,
        }
    }

    #[test]
    fn test_project_list_columns_are_json() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(PROJECTS_FILE);
        write_projects(&path, &[project()]).unwrap();

        let rows = load_csv(&path).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("protocol"), Some(r#"["acm0001","acm0022"]"#));
        assert_eq!(rows[0].get("protocol_version"), Some(r#"["19.0",null]"#));
        assert_eq!(rows[0].get("name"), Some("Wind, Phase 2"));
        assert_eq!(rows[0].get("status"), Some("registered"));
        assert_eq!(rows[0].get("listed_at"), Some("2012-05-04"));
        assert_eq!(rows[0].get("country"), None);
    }

    #[test]
    fn test_credit_rows_use_canonical_names() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CREDITS_FILE);
        let credit = Credit::new("VCS75", Registry::Verra, TransactionType::RetirementCancellation, 7)
            .with_vintage(Some(2019))
            .with_date(NaiveDate::from_ymd_opt(2021, 1, 9));
        write_credits(&path, &[credit]).unwrap();

        let rows = load_csv(&path).unwrap();
        assert_eq!(rows[0].get("registry"), Some("verra"));
        assert_eq!(rows[0].get("transaction_type"), Some("retirement/cancellation"));
        assert_eq!(rows[0].get("transaction_date"), Some("2021-01-09"));
        assert_eq!(rows[0].get("id"), None);
    }

    #[test]
    fn test_summary_round_trip_through_disk() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(SUMMARY_FILE);
        let summary = Summary::from_datasets(&[project()], &[]);
        write_json(&path, &summary).unwrap();
        assert_eq!(load_summary(&path).unwrap(), summary);
    }
}
