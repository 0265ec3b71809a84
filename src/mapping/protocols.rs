// 🧬 Protocol Mapping - Many known strings, one canonical id
// Matching is case- and punctuation-insensitive
//
// Resolution order:
// 1. the whole name is a known string or id
// 2. methodology codes in the name (`VM0010`, `AR-ACM0003`) decide alone
// 3. longest contained known string; plain-word known strings only match whole words

use super::{parse_asset, PROTOCOL_ASSET};
use crate::error::Result;
use crate::protocol::segment::SEPARATOR_RE;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::ops::Range;
use std::sync::LazyLock;

static METHODOLOGY_CODE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[A-Z]{2,4}(?:-[A-Z]{2,4})?-?\d{3,}").unwrap());

pub const UNKNOWN_PROTOCOL: &str = "unknown";

/// ProtocolEntry - Category, subcategory and aliases of one canonical protocol
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolEntry {
    pub category: String,
    pub subcategory: String,
    #[serde(rename = "known-strings")]
    pub known_strings: Vec<String>,
}

/// How a raw protocol name resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Exact(String),
    /// Longest known string contained in the name
    Substring(String),
    /// Several ids tie for the longest contained string
    Ambiguous(Vec<String>),
    Unknown,
}

impl Resolution {
    /// Canonical id, `unknown` when unresolved or ambiguous
    pub fn id(&self) -> &str {
        match self {
            Resolution::Exact(id) | Resolution::Substring(id) => id,
            Resolution::Ambiguous(_) | Resolution::Unknown => UNKNOWN_PROTOCOL,
        }
    }
}

/// Lowercase, alphanumerics only: `AMS-III.D.` → `amsiiid`
pub fn normalize_key(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(|c| c.to_lowercase())
        .collect()
}

/// Lowercase words padded with spaces: `Improved Forest-Management` → ` improved forest management `
fn word_form(raw: &str) -> String {
    let words: Vec<String> = raw
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect();
    format!(" {} ", words.join(" "))
}

/// Case-insensitive pattern for a known string, tolerant of spacing around its separators
fn known_string_pattern(known: &str) -> Option<Regex> {
    let body = known
        .split_whitespace()
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(r"\s*");
    let edge = |c: Option<char>| if c.is_some_and(char::is_alphanumeric) { r"\b" } else { "" };
    let pattern = format!(
        "(?i){}{}{}",
        edge(known.chars().next()),
        body,
        edge(known.chars().last())
    );
    Regex::new(&pattern).ok()
}

/// A substring candidate: normalized key, its id, and the word form for plain-word known strings
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct Candidate {
    key: String,
    id: String,
    words: Option<String>,
}

impl Candidate {
    fn new(known: &str, id: &str) -> Self {
        // codes and dotted abbreviations keep punctuation-insensitive matching
        let plain = !known.chars().any(|c| c.is_ascii_digit() || c == '.');
        Candidate {
            key: normalize_key(known),
            id: id.to_string(),
            words: plain.then(|| word_form(known)),
        }
    }

    fn found_in(&self, key: &str, words: &str) -> bool {
        match &self.words {
            Some(w) => words.contains(w.as_str()),
            None => key.contains(self.key.as_str()),
        }
    }
}

// ============================================================================
// PROTOCOL MAPPING
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct ProtocolMapping {
    entries: BTreeMap<String, ProtocolEntry>,

    /// normalized known string (or id) → id
    exact: HashMap<String, String>,

    /// Longest key first
    substrings: Vec<Candidate>,

    /// Known strings containing separators, longest first
    multi_part: Vec<Regex>,
}

impl ProtocolMapping {
    pub fn from_json(json: &str) -> Result<Self> {
        let entries: BTreeMap<String, ProtocolEntry> = parse_asset(PROTOCOL_ASSET, json)?;
        Ok(Self::from_entries(entries))
    }

    pub fn from_entries(entries: BTreeMap<String, ProtocolEntry>) -> Self {
        let mut exact = HashMap::new();
        let mut substrings = Vec::new();
        let mut multi_part = Vec::new();

        for (id, entry) in &entries {
            let knowns = std::iter::once(id.as_str()).chain(entry.known_strings.iter().map(String::as_str));
            for known in knowns {
                let candidate = Candidate::new(known, id);
                if candidate.key.is_empty() {
                    continue;
                }
                // first id wins when two entries normalize to the same key
                exact.entry(candidate.key.clone()).or_insert_with(|| id.clone());
                if SEPARATOR_RE.is_match(known) {
                    multi_part.push((candidate.key.len(), known.to_string()));
                }
                substrings.push(candidate);
            }
        }

        substrings.sort_by(|a, b| b.key.len().cmp(&a.key.len()).then_with(|| a.cmp(b)));
        substrings.dedup();

        multi_part.sort_by(|a, b| b.cmp(a));
        multi_part.dedup();
        let multi_part = multi_part
            .iter()
            .filter_map(|(_, known)| known_string_pattern(known))
            .collect();

        ProtocolMapping {
            entries,
            exact,
            substrings,
            multi_part,
        }
    }

    /// Resolve a raw protocol name to a canonical id
    ///
    /// # Examples:
    /// ```
    /// use registry_harmonizer::mapping::{MappingTables, Resolution};
    ///
    /// let tables = MappingTables::embedded().unwrap();
    /// assert_eq!(tables.protocols.resolve("AMS-III.D."), Resolution::Exact("ams-iii.d".into()));
    /// assert_eq!(tables.protocols.resolve("VM0007 REDD+ Framework").id(), "vm0007");
    /// ```
    pub fn resolve(&self, raw: &str) -> Resolution {
        let key = normalize_key(raw);
        if key.is_empty() {
            return Resolution::Unknown;
        }

        if let Some(id) = self.exact.get(&key) {
            return Resolution::Exact(id.clone());
        }

        let codes: Vec<String> = METHODOLOGY_CODE_RE
            .find_iter(raw)
            .map(|m| normalize_key(m.as_str()))
            .collect();
        if !codes.is_empty() {
            // an unmapped code is not rescued by the words around it
            let ids: BTreeSet<String> = codes.iter().filter_map(|c| self.exact.get(c).cloned()).collect();
            return Self::from_candidates(ids);
        }

        let words = word_form(raw);
        let mut best_len = 0;
        let mut candidates = BTreeSet::new();
        for candidate in &self.substrings {
            if candidate.key.len() < best_len {
                break;
            }
            if candidate.found_in(&key, &words) {
                best_len = candidate.key.len();
                candidates.insert(candidate.id.clone());
            }
        }
        Self::from_candidates(candidates)
    }

    fn from_candidates(ids: BTreeSet<String>) -> Resolution {
        let mut ids = ids.into_iter();
        match (ids.next(), ids.next()) {
            (None, _) => Resolution::Unknown,
            (Some(id), None) => Resolution::Substring(id),
            (Some(first), Some(second)) => {
                let mut all = vec![first, second];
                all.extend(ids);
                Resolution::Ambiguous(all)
            }
        }
    }

    /// Byte ranges in `raw` covered by known strings that contain separators
    ///
    /// Longer known strings claim their span first; spans never overlap.
    pub fn multi_part_spans(&self, raw: &str) -> Vec<Range<usize>> {
        let mut spans: Vec<Range<usize>> = Vec::new();
        for pattern in &self.multi_part {
            for found in pattern.find_iter(raw) {
                if spans.iter().all(|s| found.end() <= s.start || found.start() >= s.end) {
                    spans.push(found.range());
                }
            }
        }
        spans
    }

    /// Whether the whole string is one of the known strings
    pub fn is_known_string(&self, raw: &str) -> bool {
        self.exact.contains_key(&normalize_key(raw))
    }

    pub fn get(&self, id: &str) -> Option<&ProtocolEntry> {
        self.entries.get(id)
    }

    pub fn category(&self, id: &str) -> Option<&str> {
        self.entries.get(id).map(|e| e.category.as_str())
    }

    pub fn subcategory(&self, id: &str) -> Option<&str> {
        self.entries.get(id).map(|e| e.subcategory.as_str())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
