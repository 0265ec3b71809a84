// 💳 Credit Entity - One issuance, retirement or cancellation transaction

use crate::registry::{DownloadKind, Registry};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// TRANSACTION TYPE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TransactionType {
    #[serde(rename = "issuance")]
    Issuance,

    #[serde(rename = "retirement")]
    Retirement,

    /// Verra reports retirements and cancellations together
    #[serde(rename = "retirement/cancellation")]
    RetirementCancellation,

    #[serde(rename = "cancellation")]
    Cancellation,
}

impl TransactionType {
    pub const ALL: [TransactionType; 4] = [
        TransactionType::Issuance,
        TransactionType::Retirement,
        TransactionType::RetirementCancellation,
        TransactionType::Cancellation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Issuance => "issuance",
            TransactionType::Retirement => "retirement",
            TransactionType::RetirementCancellation => "retirement/cancellation",
            TransactionType::Cancellation => "cancellation",
        }
    }

    /// Counts toward a project's `retired` total
    pub fn is_retirement(&self) -> bool {
        matches!(
            self,
            TransactionType::Retirement | TransactionType::RetirementCancellation
        )
    }

    /// Transaction type implied by a file partition (`None` for Verra's combined file)
    pub fn for_partition(kind: DownloadKind) -> Option<TransactionType> {
        match kind {
            DownloadKind::Issuances => Some(TransactionType::Issuance),
            DownloadKind::Retirements => Some(TransactionType::Retirement),
            DownloadKind::Cancellations => Some(TransactionType::Cancellation),
            DownloadKind::Transactions => None,
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// CREDIT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credit {
    /// Surrogate id, assigned once the batch is complete
    pub id: Option<u64>,

    pub project_id: String,
    pub registry: Registry,
    pub quantity: i64,
    pub vintage: Option<i32>,
    pub transaction_date: Option<NaiveDate>,
    pub transaction_type: TransactionType,
}

impl Credit {
    pub fn new(
        project_id: impl Into<String>,
        registry: Registry,
        transaction_type: TransactionType,
        quantity: i64,
    ) -> Self {
        Credit {
            id: None,
            project_id: project_id.into(),
            registry,
            quantity,
            vintage: None,
            transaction_date: None,
            transaction_type,
        }
    }

    /// Builder: set vintage year
    pub fn with_vintage(mut self, vintage: Option<i32>) -> Self {
        self.vintage = vintage;
        self
    }

    /// Builder: set transaction date
    pub fn with_date(mut self, date: Option<NaiveDate>) -> Self {
        self.transaction_date = date;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transaction_type_names() {
        let json = serde_json::to_string(&TransactionType::RetirementCancellation).unwrap();
        assert_eq!(json, "\"retirement/cancellation\"");
        for tx in TransactionType::ALL {
            let parsed: TransactionType = serde_json::from_str(&format!("\"{}\"", tx)).unwrap();
            assert_eq!(parsed, tx);
        }
    }

    #[test]
    fn test_partition_types() {
        assert_eq!(
            TransactionType::for_partition(DownloadKind::Cancellations),
            Some(TransactionType::Cancellation)
        );
        assert_eq!(TransactionType::for_partition(DownloadKind::Transactions), None);
        assert!(TransactionType::RetirementCancellation.is_retirement());
        assert!(!TransactionType::Cancellation.is_retirement());
    }

    #[test]
    fn test_credit_builder() {
        let credit = Credit::new("ACR570", Registry::AmericanCarbonRegistry, TransactionType::Issuance, 500)
            .with_vintage(Some(2021))
            .with_date(NaiveDate::from_ymd_opt(2022, 3, 1));
        assert_eq!(credit.vintage, Some(2021));
        assert_eq!(credit.id, None);
        assert_eq!(credit.transaction_date, NaiveDate::from_ymd_opt(2022, 3, 1));
    }
}
