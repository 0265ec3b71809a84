// 📄 Raw Records - What a registry export row looks like before harmonization
// Loaded from CSV, renamed by the column mapper, consumed by the reconcilers

use anyhow::{Context, Result};
use csv::{ReaderBuilder, Trim};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

// ============================================================================
// RECORD
// ============================================================================

/// Record - One row of a registry export
///
/// Values are kept as text; blank cells are stored as `None` so "absent"
/// and "empty" mean the same thing to every downstream stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Line in the original file (header is line 1)
    pub line_number: usize,

    /// Original filename, for provenance in error reports
    pub source_file: String,

    fields: BTreeMap<String, Option<String>>,
}

impl Record {
    pub fn new(line_number: usize, source_file: impl Into<String>) -> Self {
        Record {
            line_number,
            source_file: source_file.into(),
            fields: BTreeMap::new(),
        }
    }

    /// Builder: add a field (blank values become `None`)
    pub fn with_field(mut self, name: &str, value: &str) -> Self {
        self.set(name, Some(value.to_string()));
        self
    }

    /// Build a record from literal pairs, mostly useful in tests and fixtures
    pub fn from_pairs(line_number: usize, pairs: &[(&str, &str)]) -> Self {
        pairs
            .iter()
            .fold(Record::new(line_number, "inline"), |record, (k, v)| {
                record.with_field(k, v)
            })
    }

    /// Trimmed, non-blank value of a field
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .and_then(|v| v.as_deref())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    }

    pub fn get_owned(&self, name: &str) -> Option<String> {
        self.get(name).map(str::to_string)
    }

    pub fn set(&mut self, name: &str, value: Option<String>) {
        let value = value.filter(|v| !v.trim().is_empty());
        self.fields.insert(name.to_string(), value);
    }

    /// Whether the column exists at all (even if blank)
    pub fn has_column(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.fields.remove(name).flatten()
    }

    /// Move a column to a new name, replacing whatever was there
    pub fn rename(&mut self, from: &str, to: &str) {
        if from == to {
            return;
        }
        if let Some(value) = self.fields.remove(from) {
            self.fields.insert(to.to_string(), value);
        }
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Non-blank fields as plain strings, used as context in error reports
    pub fn context(&self) -> BTreeMap<String, String> {
        let mut context: BTreeMap<String, String> = self
            .fields
            .iter()
            .filter_map(|(k, v)| v.as_ref().map(|v| (k.clone(), v.clone())))
            .collect();
        context.insert("source_file".to_string(), self.source_file.clone());
        context
    }
}

// ============================================================================
// CSV LOADING
// ============================================================================

/// Load every row of a registry CSV export
pub fn load_csv(path: &Path) -> Result<Vec<Record>> {
    let file = File::open(path).with_context(|| format!("Failed to open CSV file: {:?}", path))?;
    let source = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    read_records(file, &source).with_context(|| format!("Failed to parse CSV file: {:?}", path))
}

/// Parse CSV text from any reader; headers become column names
pub fn read_records<R: Read>(reader: R, source: &str) -> Result<Vec<Record>> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .trim(Trim::All)
        .from_reader(reader);

    let headers = rdr.headers().context("Missing CSV header row")?.clone();
    let mut records = Vec::new();

    for (idx, row) in rdr.records().enumerate() {
        let row = row.with_context(|| format!("Malformed CSV row {}", idx + 2))?;
        let line_number = row
            .position()
            .map(|p| p.line() as usize)
            .unwrap_or(idx + 2);

        let mut record = Record::new(line_number, source);
        for (header, value) in headers.iter().zip(row.iter()) {
            record.set(header, Some(value.to_string()));
        }
        records.push(record);
    }

    Ok(records)
}

// ============================================================================
// TESTS
// ============================================================================
