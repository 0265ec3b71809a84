// Per-project subcategory overrides, keyed by canonical project id

use super::{parse_asset, OVERRIDES_ASSET};
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubcategoryOverride {
    pub subcategory: String,
    /// Replaces the derived category too when present
    #[serde(default)]
    pub category: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct SubcategoryOverrides(BTreeMap<String, SubcategoryOverride>);

impl SubcategoryOverrides {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(SubcategoryOverrides(parse_asset(OVERRIDES_ASSET, json)?))
    }

    pub fn get(&self, project_id: &str) -> Option<&SubcategoryOverride> {
        self.0.get(project_id)
    }
}

#[cfg(test)]
mod tests {
    use crate::mapping::MappingTables;

    #[test]
    fn test_embedded_overrides() {
        let tables = MappingTables::embedded().unwrap();
        let acr = tables.overrides.get("ACR255").unwrap();
        assert_eq!(acr.subcategory, "avoided-grassland-conversion");
        assert_eq!(acr.category.as_deref(), Some("agriculture"));

        let car = tables.overrides.get("CAR1102").unwrap();
        assert_eq!(car.category, None);
        assert!(tables.overrides.get("VCS1").is_none());
    }
}
