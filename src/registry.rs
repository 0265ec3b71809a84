// 🏛️ Registry Identity
// The six offset registries this crate knows how to harmonize

use crate::error::{HarmonizeError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// REGISTRY
// ============================================================================

/// Registry - Identifies which organization published a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Registry {
    Verra,
    GoldStandard,
    AmericanCarbonRegistry,
    ClimateActionReserve,
    ArtTrees,
    GlobalCarbonCouncil,
}

impl Registry {
    pub const ALL: [Registry; 6] = [
        Registry::Verra,
        Registry::GoldStandard,
        Registry::AmericanCarbonRegistry,
        Registry::ClimateActionReserve,
        Registry::ArtTrees,
        Registry::GlobalCarbonCouncil,
    ];

    /// Canonical name, as written to the `registry` column
    pub fn name(&self) -> &'static str {
        match self {
            Registry::Verra => "verra",
            Registry::GoldStandard => "gold-standard",
            Registry::AmericanCarbonRegistry => "american-carbon-registry",
            Registry::ClimateActionReserve => "climate-action-reserve",
            Registry::ArtTrees => "art-trees",
            Registry::GlobalCarbonCouncil => "global-carbon-council",
        }
    }

    /// Human-readable name for logs and reports
    pub fn display_name(&self) -> &'static str {
        match self {
            Registry::Verra => "Verra",
            Registry::GoldStandard => "Gold Standard",
            Registry::AmericanCarbonRegistry => "American Carbon Registry",
            Registry::ClimateActionReserve => "Climate Action Reserve",
            Registry::ArtTrees => "ART TREES",
            Registry::GlobalCarbonCouncil => "Global Carbon Council",
        }
    }

    /// Project id prefix
    pub fn prefix(&self) -> &'static str {
        match self {
            Registry::Verra => "VCS",
            Registry::GoldStandard => "GLD",
            Registry::AmericanCarbonRegistry => "ACR",
            Registry::ClimateActionReserve => "CAR",
            Registry::ArtTrees => "ART",
            Registry::GlobalCarbonCouncil => "GCC",
        }
    }

    /// Resolve the registry from a prefixed project id (`VCS75` → Verra)
    pub fn from_project_id(project_id: &str) -> Option<Registry> {
        let head: String = project_id.chars().take(3).collect::<String>().to_uppercase();
        Registry::ALL.into_iter().find(|r| r.prefix() == head)
    }

    /// Public detail page for a project, when the registry exposes one keyed by project id
    ///
    /// Gold Standard and GCC use internal ids that only the raw export carries,
    /// so their URLs are built by the reconcilers.
    pub fn project_url(&self, project_id: &str) -> Option<String> {
        let suffix = project_id.get(3..)?;
        let base = match self {
            Registry::Verra => "https://registry.verra.org/app/projectDetail/VCS/",
            Registry::AmericanCarbonRegistry => "https://acr2.apx.com/mymodule/reg/prjView.asp?id1=",
            Registry::ClimateActionReserve => {
                "https://thereserve2.apx.com/mymodule/reg/prjView.asp?id1="
            }
            Registry::ArtTrees => "https://art.apx.com/mymodule/reg/prjView.asp?id1=",
            Registry::GoldStandard | Registry::GlobalCarbonCouncil => return None,
        };
        Some(format!("{}{}", base, suffix))
    }

    /// Registries hosted on the APX platform share one export layout
    pub fn is_apx(&self) -> bool {
        matches!(
            self,
            Registry::AmericanCarbonRegistry | Registry::ClimateActionReserve | Registry::ArtTrees
        )
    }
}

impl fmt::Display for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Registry {
    type Err = HarmonizeError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_lowercase();
        Registry::ALL
            .into_iter()
            .find(|r| r.name() == wanted || r.prefix().eq_ignore_ascii_case(&wanted))
            .ok_or_else(|| HarmonizeError::UnsupportedRegistry(s.to_string()))
    }
}

// ============================================================================
// DOWNLOAD KIND
// ============================================================================

/// The file partition a credit export arrived in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DownloadKind {
    /// Verra publishes one combined transactions file
    Transactions,
    Issuances,
    Retirements,
    Cancellations,
}

impl DownloadKind {
    pub fn name(&self) -> &'static str {
        match self {
            DownloadKind::Transactions => "transactions",
            DownloadKind::Issuances => "issuances",
            DownloadKind::Retirements => "retirements",
            DownloadKind::Cancellations => "cancellations",
        }
    }

    /// Partitions each registry publishes
    pub fn published_by(registry: Registry) -> &'static [DownloadKind] {
        match registry {
            Registry::Verra => &[DownloadKind::Transactions],
            Registry::GoldStandard | Registry::GlobalCarbonCouncil => {
                &[DownloadKind::Issuances, DownloadKind::Retirements]
            }
            Registry::AmericanCarbonRegistry
            | Registry::ClimateActionReserve
            | Registry::ArtTrees => &[
                DownloadKind::Issuances,
                DownloadKind::Retirements,
                DownloadKind::Cancellations,
            ],
        }
    }
}

impl fmt::Display for DownloadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DownloadKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "transactions" => Ok(DownloadKind::Transactions),
            "issuances" => Ok(DownloadKind::Issuances),
            "retirements" => Ok(DownloadKind::Retirements),
            "cancellations" => Ok(DownloadKind::Cancellations),
            other => Err(format!("unknown download kind: {}", other)),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
