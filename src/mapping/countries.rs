// Country alias table

use super::{parse_asset, COUNTRY_ASSET};
use crate::error::Result;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Deserialize)]
struct CountryAsset {
    canonical: Vec<String>,
    aliases: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default)]
pub struct CountryAliases {
    /// lowercase spelling → canonical name
    lookup: HashMap<String, String>,
}

impl CountryAliases {
    pub fn from_json(json: &str) -> Result<Self> {
        let asset: CountryAsset = parse_asset(COUNTRY_ASSET, json)?;
        let mut lookup = HashMap::new();
        for name in asset.canonical {
            lookup.insert(name.to_lowercase(), name);
        }
        for (alias, name) in asset.aliases {
            lookup.insert(alias.trim().to_lowercase(), name);
        }
        Ok(CountryAliases { lookup })
    }

    /// Canonical country name, `None` when the spelling is not in the table
    pub fn resolve(&self, raw: &str) -> Option<&str> {
        self.lookup.get(&raw.trim().to_lowercase()).map(String::as_str)
    }
}
