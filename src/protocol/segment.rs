// ✂️ Protocol Segmentation - One raw field → ordered protocol occurrences
//
// "AMS-I.D. version 18 & ACM0002, version 20.0"
//   → [("AMS-I.D.", 18.0), ("ACM0002", 20.0)]

use super::version::{bare_version, find_version, strip_versions};
use crate::mapping::{normalize_key, ProtocolMapping};
use regex::Regex;
use std::ops::Range;
use std::sync::LazyLock;

pub(crate) static SEPARATOR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\s*(?:[;&,]|\band\b)\s*").unwrap());

/// A raw protocol name as it appeared, with the version written next to it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Occurrence {
    pub name: String,
    pub version: Option<String>,
}

impl Occurrence {
    fn new(name: impl Into<String>, version: Option<String>) -> Self {
        Occurrence {
            name: name.into(),
            version,
        }
    }
}

/// Split a raw protocol field into occurrences
///
/// Known strings that contain separators themselves ("Afforestation,
/// Reforestation and Revegetation") are never split.
///
/// Version-only fragments (`v1.1`, `version 20.0`, `&20.0`) never become a
/// protocol of their own: they fill in the preceding occurrence's version, or,
/// if that one already has a version, add another occurrence of it.
pub fn split_occurrences(raw: &str, protocols: &ProtocolMapping) -> Vec<Occurrence> {
    if raw.trim().is_empty() {
        return Vec::new();
    }

    let without_versions = clean_name(&strip_versions(raw));
    if protocols.is_known_string(&without_versions) {
        let version = find_version(raw).map(|(_, v)| v);
        return vec![Occurrence::new(without_versions, version)];
    }

    let mut occurrences: Vec<Occurrence> = Vec::new();
    let guarded = protocols.multi_part_spans(raw);
    for fragment in fragments(raw, &guarded) {
        if fragment.trim().is_empty() {
            continue;
        }

        if let Some((start, version)) = find_version(fragment) {
            let name = clean_name(&fragment[..start]);
            if has_protocol_text(&name) {
                occurrences.push(Occurrence::new(name, Some(version)));
            } else {
                attach_version(&mut occurrences, version);
            }
        } else if let Some(version) = bare_version(fragment) {
            attach_version(&mut occurrences, version);
        } else {
            let name = clean_name(fragment);
            if has_protocol_text(&name) {
                occurrences.push(Occurrence::new(name, None));
            }
        }
    }

    occurrences
}

/// Split at every separator that does not fall inside a guarded span
fn fragments<'r>(raw: &'r str, guarded: &[Range<usize>]) -> Vec<&'r str> {
    let mut pieces = Vec::new();
    let mut start = 0;
    for separator in SEPARATOR_RE.find_iter(raw) {
        if guarded
            .iter()
            .any(|span| separator.start() < span.end && separator.end() > span.start)
        {
            continue;
        }
        pieces.push(&raw[start..separator.start()]);
        start = separator.end();
    }
    pieces.push(&raw[start..]);
    pieces
}

fn attach_version(occurrences: &mut Vec<Occurrence>, version: String) {
    match occurrences.last_mut() {
        Some(last) if last.version.is_none() => last.version = Some(version),
        Some(last) => {
            let name = last.name.clone();
            occurrences.push(Occurrence::new(name, Some(version)));
        }
        // a version with nothing before it has no protocol to belong to
        None => {}
    }
}

/// Trim separators and label punctuation: `" ACM0001: "` → `"ACM0001"`
fn clean_name(text: &str) -> String {
    text.trim_matches(|c: char| {
        c.is_whitespace() || matches!(c, ':' | ',' | ';' | '-' | '–' | '&' | '/' | '(')
    })
    .to_string()
}

/// Has alphanumeric content beyond a dangling version keyword
fn has_protocol_text(name: &str) -> bool {
    let key = normalize_key(name);
    !key.is_empty() && !matches!(key.as_str(), "version" | "ver" | "v")
}
