// 📐 Shape Layer - Schema Validation
// Validates finished datasets against the field catalog; a batch passes whole
// or fails with every violation listed.

use crate::attributes::{credit_schema, project_schema, FieldDefinition, FieldRule, FieldType, Schema};
use crate::entities::{Credit, Project};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

// ============================================================================
// VALIDATION REPORT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    /// Index in the validated dataset
    pub row: usize,

    /// `registry/project_id` when the row has one
    pub key: Option<String>,

    pub field: String,
    pub message: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.key {
            Some(key) => write!(f, "row {} ({}) {}: {}", self.row, key, self.field, self.message),
            None => write!(f, "row {} {}: {}", self.row, self.field, self.message),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub dataset: String,
    pub rows_checked: usize,
    pub violations: Vec<Violation>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }

    /// Violations touching one field
    pub fn for_field<'a>(&'a self, field: &'a str) -> impl Iterator<Item = &'a Violation> + 'a {
        self.violations.iter().filter(move |v| v.field == field)
    }

    pub fn merge(&mut self, other: ValidationReport) {
        if self.dataset.is_empty() {
            self.dataset = other.dataset;
        } else if !other.dataset.is_empty() && other.dataset != self.dataset {
            self.dataset = format!("{}+{}", self.dataset, other.dataset);
        }
        self.rows_checked += other.rows_checked;
        self.violations.extend(other.violations);
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} violation(s) in {} ({} rows checked)",
            self.violations.len(),
            self.dataset,
            self.rows_checked
        )?;
        for violation in &self.violations {
            write!(f, "\n  {}", violation)?;
        }
        Ok(())
    }
}

// ============================================================================
// SCHEMA VALIDATOR
// ============================================================================

pub struct SchemaValidator {
    schema: Schema,
}

impl SchemaValidator {
    pub fn new(schema: Schema) -> Self {
        SchemaValidator { schema }
    }

    pub fn projects() -> Self {
        Self::new(project_schema())
    }

    pub fn credits() -> Self {
        Self::new(credit_schema())
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Validate serialized rows; `Ok` only when every row passes
    pub fn validate_rows(&self, rows: &[Value]) -> Result<(), ValidationReport> {
        let mut report = ValidationReport {
            dataset: self.schema.name.clone(),
            rows_checked: rows.len(),
            violations: Vec::new(),
        };

        for (index, row) in rows.iter().enumerate() {
            let Some(object) = row.as_object() else {
                report.violations.push(Violation {
                    row: index,
                    key: None,
                    field: "*".to_string(),
                    message: "row is not an object".to_string(),
                });
                continue;
            };
            let key = natural_key(object);
            for definition in &self.schema.fields {
                for message in check_field(definition, object) {
                    report.violations.push(Violation {
                        row: index,
                        key: key.clone(),
                        field: definition.name.clone(),
                        message,
                    });
                }
            }
        }

        if report.is_valid() {
            Ok(())
        } else {
            Err(report)
        }
    }

    /// Validate any serializable rows
    pub fn validate<T: Serialize>(&self, rows: &[T]) -> Result<(), ValidationReport> {
        let mut values = Vec::with_capacity(rows.len());
        for (index, row) in rows.iter().enumerate() {
            match serde_json::to_value(row) {
                Ok(value) => values.push(value),
                Err(e) => {
                    return Err(ValidationReport {
                        dataset: self.schema.name.clone(),
                        rows_checked: index,
                        violations: vec![Violation {
                            row: index,
                            key: None,
                            field: "*".to_string(),
                            message: format!("row does not serialize: {}", e),
                        }],
                    })
                }
            }
        }
        self.validate_rows(&values)
    }
}

/// Validate both datasets of a batch, collecting every violation
pub fn validate_batch(projects: &[Project], credits: &[Credit]) -> Result<(), ValidationReport> {
    let mut report = ValidationReport::default();
    for result in [
        SchemaValidator::projects().validate(projects),
        SchemaValidator::credits().validate(credits),
    ] {
        if let Err(r) = result {
            report.merge(r);
        }
    }
    if report.is_valid() {
        Ok(())
    } else {
        Err(report)
    }
}

fn natural_key(object: &Map<String, Value>) -> Option<String> {
    let project_id = object.get("project_id")?.as_str()?;
    match object.get("registry").and_then(Value::as_str) {
        Some(registry) => Some(format!("{}/{}", registry, project_id)),
        None => Some(project_id.to_string()),
    }
}

/// All problems with one field of one row
fn check_field(definition: &FieldDefinition, object: &Map<String, Value>) -> Vec<String> {
    let mut messages = Vec::new();
    let value = object.get(&definition.name).unwrap_or(&Value::Null);

    if value.is_null() {
        if definition.is_required() {
            messages.push("required field is missing".to_string());
        } else if !definition.nullable {
            messages.push("null not allowed".to_string());
        }
        return messages;
    }

    if !has_type(value, &definition.type_) {
        messages.push(format!("expected {}, got {}", definition.type_.name(), value));
        return messages;
    }

    for rule in &definition.rules {
        match rule {
            FieldRule::Required => {
                if value.as_str().is_some_and(|s| s.trim().is_empty()) {
                    messages.push("required field is empty".to_string());
                }
            }
            FieldRule::OneOf(allowed) => {
                if let Some(s) = value.as_str() {
                    if !allowed.iter().any(|a| a == s) {
                        messages.push(format!("{:?} is not one of {}", s, allowed.join(", ")));
                    }
                }
            }
            FieldRule::Min(min) => {
                if let Some(n) = value.as_i64() {
                    if n < *min {
                        messages.push(format!("{} is below minimum {}", n, min));
                    }
                }
            }
            FieldRule::SameLengthAs(other) => {
                let len = value.as_array().map(Vec::len);
                let other_len = object.get(other).and_then(Value::as_array).map(Vec::len);
                if len != other_len {
                    messages.push(format!(
                        "length {} differs from {} length {}",
                        len.unwrap_or(0),
                        other,
                        other_len.unwrap_or(0)
                    ));
                }
            }
        }
    }

    messages
}

fn has_type(value: &Value, type_: &FieldType) -> bool {
    match type_ {
        FieldType::String => value.is_string(),
        FieldType::Integer => value.is_i64() || value.is_u64(),
        FieldType::Boolean => value.is_boolean(),
        FieldType::Date => value
            .as_str()
            .is_some_and(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok()),
        FieldType::StringList => value
            .as_array()
            .is_some_and(|items| items.iter().all(Value::is_string)),
        FieldType::NullableStringList => value
            .as_array()
            .is_some_and(|items| items.iter().all(|v| v.is_string() || v.is_null())),
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{ProjectStatus, TransactionType};
    use crate::registry::Registry;
    use serde_json::json;

    fn project() -> Project {
        Project {
            id: Some(0),
            project_id: "VCS75".to_string(),
            name: Some("Wind".to_string()),
            registry: Registry::Verra,
            proponent: None,
            protocol: vec!["acm0002".to_string()],
            protocol_version: vec![Some("19.0".to_string())],
            category: vec!["renewable-energy".to_string()],
            project_subcategory: vec!["wind".to_string()],
            status: Some(ProjectStatus::Registered),
            country: Some("India".to_string()),
            listed_at: NaiveDate::from_ymd_opt(2010, 1, 2),
            first_issuance_at: None,
            first_retirement_at: None,
            is_compliance: false,
            issued: 10,
            retired: 0,
            project_url: None,
        }
    }

    #[test]
    fn test_valid_batch_passes() {
        let credit = Credit {
            id: Some(0),
            ..Credit::new("VCS75", Registry::Verra, TransactionType::Issuance, 10)
        };
        assert!(validate_batch(&[project()], &[credit]).is_ok());
    }

    #[test]
    fn test_missing_required_field_rejected() {
        let mut row = serde_json::to_value(project()).unwrap();
        row.as_object_mut().unwrap().remove("project_id");

        let report = SchemaValidator::projects().validate_rows(&[row]).unwrap_err();
        assert_eq!(report.for_field("project_id").count(), 1);
        assert_eq!(report.violations[0].message, "required field is missing");
    }

    #[test]
    fn test_out_of_enum_status_rejected() {
        let mut row = serde_json::to_value(project()).unwrap();
        row["status"] = json!("active");

        let report = SchemaValidator::projects().validate_rows(&[row]).unwrap_err();
        let violation = report.for_field("status").next().unwrap();
        assert_eq!(violation.key.as_deref(), Some("verra/VCS75"));
    }

    #[test]
    fn test_parallel_arrays_and_minimums() {
        let mut bad = project();
        bad.protocol_version.push(None);
        bad.issued = -5;

        let report = SchemaValidator::projects().validate(&[bad]).unwrap_err();
        assert_eq!(report.for_field("protocol_version").count(), 1);
        assert_eq!(report.for_field("issued").count(), 1);
    }

    #[test]
    fn test_unassigned_surrogate_id_rejected() {
        let credit = Credit::new("GLD1", Registry::GoldStandard, TransactionType::Retirement, 3);
        let report = SchemaValidator::credits().validate(&[credit]).unwrap_err();
        assert_eq!(report.for_field("id").count(), 1);
        assert!(report.to_string().contains("credits"));
    }
}
