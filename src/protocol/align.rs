// 🔗 Version Alignment - canonical ids ↔ raw versions, position by position
//
// Each canonical id consumes at most one raw entry and each raw entry is used
// at most once, so the output always has exactly one slot per id.

use super::version::VersionMap;
use crate::mapping::{normalize_key, ProtocolMapping};

/// Versions parallel to `ids`; `None` where no raw entry matches
pub fn align(ids: &[String], versions: &VersionMap, protocols: &ProtocolMapping) -> Vec<Option<String>> {
    let entries = versions.entries();
    let mut used = vec![false; entries.len()];

    ids.iter()
        .map(|id| {
            let hit = entries
                .iter()
                .enumerate()
                .find(|(i, entry)| !used[*i] && name_matches(&entry.name, id, protocols))
                .map(|(i, _)| i);

            hit.and_then(|i| {
                used[i] = true;
                entries[i].version.clone()
            })
        })
        .collect()
}

/// Raw name belongs to canonical id: normalized containment either way, or
/// resolution through the mapping
fn name_matches(name: &str, id: &str, protocols: &ProtocolMapping) -> bool {
    let name_key = normalize_key(name);
    let id_key = normalize_key(id);
    if name_key.is_empty() || id_key.is_empty() {
        return false;
    }

    name_key == id_key
        || name_key.contains(&id_key)
        || id_key.contains(&name_key)
        || protocols.resolve(name).id() == id
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::MappingTables;

    fn ids(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_aligns_by_name() {
        let tables = MappingTables::embedded().unwrap();
        let mut map = VersionMap::default();
        map.push("ACM0022", Some("3.0".to_string()));
        map.push("ACM0001", Some("19.0".to_string()));

        let aligned = align(&ids(&["acm0001", "acm0022"]), &map, &tables.protocols);
        assert_eq!(aligned, vec![Some("19.0".to_string()), Some("3.0".to_string())]);
    }

    #[test]
    fn test_resolves_descriptive_names_through_mapping() {
        let tables = MappingTables::embedded().unwrap();
        let mut map = VersionMap::default();
        map.push("Grid-connected electricity generation from renewable sources", Some("20.0".to_string()));

        let aligned = align(&ids(&["acm0002"]), &map, &tables.protocols);
        assert_eq!(aligned, vec![Some("20.0".to_string())]);
    }

    #[test]
    fn test_each_entry_used_once() {
        let tables = MappingTables::embedded().unwrap();
        let mut map = VersionMap::default();
        map.push("ACM0002", Some("19.0".to_string()));
        map.push("ACM0002", Some("20.0".to_string()));

        let aligned = align(&ids(&["acm0002", "acm0002", "acm0002"]), &map, &tables.protocols);
        assert_eq!(
            aligned,
            vec![Some("19.0".to_string()), Some("20.0".to_string()), None]
        );
    }

    #[test]
    fn test_unmatched_id_gets_null() {
        let tables = MappingTables::embedded().unwrap();
        let map = VersionMap::default();
        assert_eq!(align(&ids(&["vm0007"]), &map, &tables.protocols), vec![None]);
        assert!(align(&[], &map, &tables.protocols).is_empty());
    }
}
