// 📊 Summary - Dataset totals and the regression gate between runs

use crate::entities::{Credit, Project, TransactionType};
use crate::error::{HarmonizeError, Result};
use crate::registry::Registry;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::info;

/// Accepted fraction of a previous run's totals
pub const DEFAULT_REGRESSION_THRESHOLD: f64 = 0.99;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionTotal {
    pub registry: Registry,
    pub transaction_type: TransactionType,
    pub rows: usize,
    pub quantity: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplianceTotal {
    pub registry: Registry,
    pub is_compliance: bool,
    pub projects: usize,
    pub issued: i64,
    pub retired: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub credits: Vec<TransactionTotal>,
    pub projects: Vec<ComplianceTotal>,
    pub unique_projects: usize,
}

impl Summary {
    pub fn from_datasets(projects: &[Project], credits: &[Credit]) -> Self {
        let mut by_type: BTreeMap<(Registry, TransactionType), (usize, i64)> = BTreeMap::new();
        for credit in credits {
            let entry = by_type.entry((credit.registry, credit.transaction_type)).or_default();
            entry.0 += 1;
            entry.1 += credit.quantity;
        }

        let mut by_compliance: BTreeMap<(Registry, bool), (usize, i64, i64)> = BTreeMap::new();
        for project in projects {
            let entry = by_compliance.entry((project.registry, project.is_compliance)).or_default();
            entry.0 += 1;
            entry.1 += project.issued;
            entry.2 += project.retired;
        }

        let unique: BTreeSet<(Registry, &str)> = projects.iter().map(|p| p.natural_key()).collect();

        Summary {
            credits: by_type
                .into_iter()
                .map(|((registry, transaction_type), (rows, quantity))| TransactionTotal {
                    registry,
                    transaction_type,
                    rows,
                    quantity,
                })
                .collect(),
            projects: by_compliance
                .into_iter()
                .map(|((registry, is_compliance), (projects, issued, retired))| ComplianceTotal {
                    registry,
                    is_compliance,
                    projects,
                    issued,
                    retired,
                })
                .collect(),
            unique_projects: unique.len(),
        }
    }

    pub fn total_quantity(&self) -> i64 {
        self.credits.iter().map(|t| t.quantity).sum()
    }

    /// Fold another batch's summary into this one
    pub fn merge(&mut self, other: Summary) {
        self.credits.extend(other.credits);
        self.projects.extend(other.projects);
        self.unique_projects += other.unique_projects;
    }
}

/// Fail when the new run shrank below `threshold` of the previous one
pub fn check_regression(new: &Summary, previous: &Summary, threshold: f64) -> Result<()> {
    let checks = [
        ("credits", "quantity", new.total_quantity(), previous.total_quantity()),
        (
            "projects",
            "unique project count",
            new.unique_projects as i64,
            previous.unique_projects as i64,
        ),
    ];

    for (dataset, metric, new_value, previous_value) in checks {
        if (new_value as f64) < previous_value as f64 * threshold {
            return Err(HarmonizeError::Regression {
                dataset: dataset.to_string(),
                metric: metric.to_string(),
                new: new_value,
                previous: previous_value,
                threshold,
            });
        }
    }

    info!(
        quantity = new.total_quantity(),
        projects = new.unique_projects,
        "no regression against previous summary"
    );
    Ok(())
}
