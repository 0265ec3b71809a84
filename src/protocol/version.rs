// 🔢 Protocol Versions - `v1.6`, `Version 19.0`, `version21.0`, `ver 21`, `&20.0`

use super::segment::Occurrence;
use regex::Regex;
use std::sync::LazyLock;

static VERSION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?:version|ver|v)\.?\s*(\d+(?:\.\d+)?)").unwrap());

static BARE_VERSION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(\d+(?:\.\d+)?)\s*$").unwrap());

/// Integer versions get one decimal: `18` → `18.0`
pub fn normalize_version(digits: &str) -> String {
    if digits.contains('.') {
        digits.to_string()
    } else {
        format!("{}.0", digits)
    }
}

/// First version token in `text`: (byte offset where the token starts, normalized version)
pub fn find_version(text: &str) -> Option<(usize, String)> {
    let caps = VERSION_RE.captures(text)?;
    let whole = caps.get(0)?;
    let digits = caps.get(1)?;
    Some((whole.start(), normalize_version(digits.as_str())))
}

/// A fragment that is nothing but a number (`20.0` after `&`)
pub fn bare_version(text: &str) -> Option<String> {
    BARE_VERSION_RE
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| normalize_version(m.as_str()))
}

/// Text with every version token removed
pub fn strip_versions(text: &str) -> String {
    VERSION_RE.replace_all(text, " ").into_owned()
}

// ============================================================================
// VERSION MAP
// ============================================================================

/// One raw protocol occurrence and the version it carried
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionEntry {
    pub name: String,
    pub version: Option<String>,
}

/// Ordered multimap raw protocol name → version
///
/// Keyed by occurrence rather than by name: the same protocol can appear
/// several times with different versions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VersionMap {
    entries: Vec<VersionEntry>,
}

impl VersionMap {
    pub fn from_occurrences(occurrences: &[Occurrence]) -> Self {
        VersionMap {
            entries: occurrences
                .iter()
                .map(|o| VersionEntry {
                    name: o.name.clone(),
                    version: o.version.clone(),
                })
                .collect(),
        }
    }

    pub fn push(&mut self, name: impl Into<String>, version: Option<String>) {
        self.entries.push(VersionEntry {
            name: name.into(),
            version,
        });
    }

    pub fn entries(&self) -> &[VersionEntry] {
        &self.entries
    }

    /// Every version recorded under `name`, in order
    pub fn versions_of<'a>(&'a self, name: &'a str) -> impl Iterator<Item = Option<&'a str>> + 'a {
        self.entries
            .iter()
            .filter(move |e| e.name == name)
            .map(|e| e.version.as_deref())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
