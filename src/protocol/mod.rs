// 🧪 Protocol Normalizer - Raw methodology text → canonical ids + parallel versions
//
// Pipeline:
// 1. segment: split the raw field into (name, version) occurrences
// 2. resolve: each name → canonical id (exact, then longest substring)
// 3. dedup: repeats of an id survive only with a version not yet seen for it
// 4. align: one version slot per surviving id, drawn only from the
//    occurrences that survived dedup
//
// Invariant: protocol.len() == protocol_version.len(), for every input, and
// protocol_version[i] is the version written next to the occurrence that
// produced protocol[i].

pub mod align;
pub mod segment;
pub mod version;

pub use align::align;
pub use segment::{split_occurrences, Occurrence};
pub use version::{find_version, normalize_version, VersionEntry, VersionMap};

use crate::mapping::{ProtocolMapping, Resolution};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

// ============================================================================
// RESULT TYPES
// ============================================================================

/// A segment that resolved to `unknown`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnresolvedProtocol {
    pub segment: String,

    /// Ids that tied for the longest match; empty when nothing matched
    pub candidates: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedProtocol {
    pub protocol: Vec<String>,
    pub protocol_version: Vec<Option<String>>,
    pub unresolved: Vec<UnresolvedProtocol>,
}

impl NormalizedProtocol {
    /// A registry whose projects all follow one fixed protocol
    pub fn fixed(ids: &[String]) -> Self {
        NormalizedProtocol {
            protocol: ids.to_vec(),
            protocol_version: vec![None; ids.len()],
            unresolved: Vec::new(),
        }
    }
}

// ============================================================================
// NORMALIZER
// ============================================================================

pub struct ProtocolNormalizer<'a> {
    protocols: &'a ProtocolMapping,
}

impl<'a> ProtocolNormalizer<'a> {
    pub fn new(protocols: &'a ProtocolMapping) -> Self {
        ProtocolNormalizer { protocols }
    }

    /// Normalize one raw protocol field
    ///
    /// # Examples:
    /// ```
    /// use registry_harmonizer::mapping::MappingTables;
    /// use registry_harmonizer::protocol::ProtocolNormalizer;
    ///
    /// let tables = MappingTables::embedded().unwrap();
    /// let normalized = ProtocolNormalizer::new(&tables.protocols)
    ///     .normalize(Some("ACM0001 v19.0 and ACM0022"));
    /// assert_eq!(normalized.protocol, vec!["acm0001", "acm0022"]);
    /// assert_eq!(normalized.protocol_version, vec![Some("19.0".to_string()), None]);
    /// ```
    pub fn normalize(&self, raw: Option<&str>) -> NormalizedProtocol {
        let raw = match raw {
            Some(raw) if !raw.trim().is_empty() => raw,
            _ => return NormalizedProtocol::default(),
        };

        let occurrences = split_occurrences(raw, self.protocols);
        let mut unresolved = Vec::new();
        let mut seen: HashMap<String, HashSet<Option<String>>> = HashMap::new();
        let mut protocol = Vec::new();
        let mut kept = Vec::new();

        for occurrence in occurrences {
            let resolution = self.protocols.resolve(&occurrence.name);
            match &resolution {
                Resolution::Ambiguous(candidates) => unresolved.push(UnresolvedProtocol {
                    segment: occurrence.name.clone(),
                    candidates: candidates.clone(),
                }),
                Resolution::Unknown => unresolved.push(UnresolvedProtocol {
                    segment: occurrence.name.clone(),
                    candidates: Vec::new(),
                }),
                Resolution::Exact(_) | Resolution::Substring(_) => {}
            }

            let id = resolution.id().to_string();
            let keep = match seen.get_mut(&id) {
                None => {
                    seen.insert(id.clone(), HashSet::from([occurrence.version.clone()]));
                    true
                }
                Some(versions) => occurrence.version.is_some() && versions.insert(occurrence.version.clone()),
            };
            if keep {
                protocol.push(id);
                kept.push(occurrence);
            }
        }

        let versions = VersionMap::from_occurrences(&kept);
        let protocol_version = align(&protocol, &versions, self.protocols);

        NormalizedProtocol {
            protocol,
            protocol_version,
            unresolved,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::MappingTables;
    use proptest::prelude::*;

    fn normalize(raw: &str) -> (Vec<String>, Vec<Option<String>>) {
        let tables = MappingTables::embedded().unwrap();
        let normalized = ProtocolNormalizer::new(&tables.protocols).normalize(Some(raw));
        (normalized.protocol, normalized.protocol_version)
    }

    fn v(list: &[Option<&str>]) -> Vec<Option<String>> {
        list.iter().map(|o| o.map(str::to_string)).collect()
    }

    #[test]
    fn test_single_protocol_version() {
        assert_eq!(
            normalize("ACM0001 Version 19.0"),
            (vec!["acm0001".to_string()], v(&[Some("19.0")]))
        );
    }

    #[test]
    fn test_semicolon_separated_with_versions() {
        assert_eq!(
            normalize("ACM0001: Version 19.0; ACM0022: Version 3.0"),
            (
                vec!["acm0001".to_string(), "acm0022".to_string()],
                v(&[Some("19.0"), Some("3.0")])
            )
        );
    }

    #[test]
    fn test_descriptive_suffix_has_no_version() {
        assert_eq!(normalize("VM0007 REDD+ Framework"), (vec!["vm0007".to_string()], v(&[None])));
    }

    #[test]
    fn test_and_separator_with_partial_versions() {
        assert_eq!(
            normalize("ACM0001 v19.0 and ACM0022"),
            (
                vec!["acm0001".to_string(), "acm0022".to_string()],
                v(&[Some("19.0"), None])
            )
        );
    }

    #[test]
    fn test_integer_versions_get_one_decimal() {
        assert_eq!(
            normalize("AMS-I.D. version 18 & ACM0002, version 20.0"),
            (
                vec!["ams-i.d".to_string(), "acm0002".to_string()],
                v(&[Some("18.0"), Some("20.0")])
            )
        );
    }

    #[test]
    fn test_continuation_adds_second_occurrence() {
        assert_eq!(
            normalize("ACM0002 version 19.0 &20.0"),
            (
                vec!["acm0002".to_string(), "acm0002".to_string()],
                v(&[Some("19.0"), Some("20.0")])
            )
        );
    }

    #[test]
    fn test_repeat_without_new_version_is_dropped() {
        assert_eq!(
            normalize("ACM0002 v20.0; ACM0002; ACM0002 v20.0"),
            (vec!["acm0002".to_string()], v(&[Some("20.0")]))
        );
    }

    #[test]
    fn test_dropped_repeat_does_not_shift_versions() {
        assert_eq!(
            normalize("ACM0002 v19.0; ACM0002; ACM0002 v20.0"),
            (
                vec!["acm0002".to_string(), "acm0002".to_string()],
                v(&[Some("19.0"), Some("20.0")])
            )
        );
    }

    #[test]
    fn test_known_string_with_separators_next_to_other_protocol() {
        assert_eq!(
            normalize("Afforestation, Reforestation and Revegetation; ACM0001"),
            (vec!["vm0047".to_string(), "acm0001".to_string()], v(&[None, None]))
        );
    }

    #[test]
    fn test_known_string_with_separators_after_code() {
        assert_eq!(
            normalize("VM0047 Afforestation, Reforestation and Revegetation v1.0"),
            (vec!["vm0047".to_string()], v(&[Some("1.0")]))
        );
    }

    #[test]
    fn test_generic_word_does_not_override_code() {
        let tables = MappingTables::embedded().unwrap();
        let normalized = ProtocolNormalizer::new(&tables.protocols)
            .normalize(Some("VM0010 Improved Forest Management v1.3"));
        assert_eq!(normalized.protocol, vec!["unknown".to_string()]);
        assert_eq!(normalized.protocol_version, v(&[Some("1.3")]));
        assert_eq!(normalized.unresolved.len(), 1);

        assert_eq!(
            normalize("VM0047 Afforestation v1.0"),
            (vec!["vm0047".to_string()], v(&[Some("1.0")]))
        );
    }

    #[test]
    fn test_punctuation_insensitive_resolution() {
        assert_eq!(normalize("AMSIIID"), (vec!["ams-iii.d".to_string()], v(&[None])));
    }

    #[test]
    fn test_unknown_is_recorded() {
        let tables = MappingTables::embedded().unwrap();
        let normalized = ProtocolNormalizer::new(&tables.protocols).normalize(Some("Bespoke method v2"));
        assert_eq!(normalized.protocol, vec!["unknown".to_string()]);
        assert_eq!(normalized.protocol_version, v(&[Some("2.0")]));
        assert_eq!(normalized.unresolved.len(), 1);
        assert_eq!(normalized.unresolved[0].segment, "Bespoke method");
    }

    #[test]
    fn test_empty_field() {
        let tables = MappingTables::embedded().unwrap();
        let normalizer = ProtocolNormalizer::new(&tables.protocols);
        assert_eq!(normalizer.normalize(None), NormalizedProtocol::default());
        assert_eq!(normalizer.normalize(Some("  ")), NormalizedProtocol::default());
    }

    #[test]
    fn test_fixed_protocol() {
        let fixed = NormalizedProtocol::fixed(&["art-trees".to_string()]);
        assert_eq!(fixed.protocol_version, vec![None]);
    }

    proptest! {
        #[test]
        fn prop_protocol_and_versions_stay_parallel(raw in ".{0,80}") {
            let (protocol, versions) = normalize(&raw);
            prop_assert_eq!(protocol.len(), versions.len());
        }

        #[test]
        fn prop_structured_fields_stay_parallel(
            parts in prop::collection::vec(
                (prop::sample::select(vec!["ACM0001", "ACM0022", "VM0007", "AMS-I.D.", "Forest", "mystery"]),
                 prop::option::of(1u32..30)),
                0..5,
            ),
            sep in prop::sample::select(vec!["; ", " & ", ", ", " and "]),
        ) {
            let raw = parts
                .iter()
                .map(|(name, version)| match version {
                    Some(v) => format!("{} v{}", name, v),
                    None => name.to_string(),
                })
                .collect::<Vec<_>>()
                .join(sep);
            let (protocol, versions) = normalize(&raw);
            prop_assert_eq!(protocol.len(), versions.len());
            for version in versions.iter().flatten() {
                prop_assert!(version.contains('.'));
            }
        }

        #[test]
        fn prop_versions_follow_kept_occurrences(
            parts in prop::collection::vec(
                (prop::sample::select(vec![
                    ("ACM0002", "acm0002"),
                    ("ACM0001", "acm0001"),
                    ("VM0047", "vm0047"),
                    ("Afforestation, Reforestation and Revegetation", "vm0047"),
                    ("Electricity and heat generation from biomass", "acm0006"),
                    ("Landfill Gas Destruction and Beneficial Use Projects", "acr-landfill"),
                ]),
                 prop::option::of(1u32..6)),
                1..6,
            ),
            sep in prop::sample::select(vec!["; ", " & "]),
        ) {
            let raw = parts
                .iter()
                .map(|((name, _), version)| match version {
                    Some(v) => format!("{} v{}", name, v),
                    None => name.to_string(),
                })
                .collect::<Vec<_>>()
                .join(sep);

            // first occurrence of an id is kept; repeats only with an unseen version
            let mut seen: HashMap<&str, HashSet<Option<String>>> = HashMap::new();
            let mut expected = Vec::new();
            for ((_, id), version) in &parts {
                let version = version.map(|v| format!("{}.0", v));
                let keep = match seen.get_mut(id) {
                    None => {
                        seen.insert(*id, HashSet::from([version.clone()]));
                        true
                    }
                    Some(versions) => version.is_some() && versions.insert(version.clone()),
                };
                if keep {
                    expected.push((id.to_string(), version));
                }
            }

            let (protocol, versions) = normalize(&raw);
            let actual: Vec<_> = protocol.into_iter().zip(versions).collect();
            prop_assert_eq!(actual, expected, "raw: {}", raw);
        }

        #[test]
        fn prop_normalization_is_deterministic(raw in "[A-Za-z0-9 .,;&:+-]{0,60}") {
            prop_assert_eq!(normalize(&raw), normalize(&raw));
        }
    }
}
