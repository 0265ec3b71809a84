// 🏛️ Field Catalog - Declared shape of the output datasets
// Each field states its type and the rules a row must satisfy; the validator
// reads these definitions instead of hard-coding checks per dataset.

use crate::entities::{ProjectStatus, TransactionType};
use crate::registry::Registry;
use serde::{Deserialize, Serialize};

// ============================================================================
// FIELD TYPES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldType {
    String,
    Integer,
    /// `YYYY-MM-DD`
    Date,
    Boolean,
    /// List of strings, no null elements
    StringList,
    /// List whose elements may be null
    NullableStringList,
}

impl FieldType {
    pub fn name(&self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Integer => "integer",
            FieldType::Date => "date",
            FieldType::Boolean => "boolean",
            FieldType::StringList => "list of strings",
            FieldType::NullableStringList => "list of nullable strings",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldRule {
    /// Present, not null, not empty
    Required,
    /// Value must be one of these
    OneOf(Vec<String>),
    /// Integer lower bound
    Min(i64),
    /// List must be as long as the named list field
    SameLengthAs(String),
}

// ============================================================================
// FIELD DEFINITION
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldDefinition {
    pub name: String,
    pub type_: FieldType,
    pub nullable: bool,
    pub description: String,
    pub rules: Vec<FieldRule>,
}

impl FieldDefinition {
    /// Nullable field without rules
    pub fn new(name: impl Into<String>, type_: FieldType) -> Self {
        FieldDefinition {
            name: name.into(),
            type_,
            nullable: true,
            description: String::new(),
            rules: Vec::new(),
        }
    }

    /// Builder: add description
    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = desc.into();
        self
    }

    /// Builder: add rule (`Required` also makes the field non-nullable)
    pub fn with_rule(mut self, rule: FieldRule) -> Self {
        if rule == FieldRule::Required {
            self.nullable = false;
        }
        self.rules.push(rule);
        self
    }

    /// Builder: null not allowed, but empty values are
    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn is_required(&self) -> bool {
        self.rules.contains(&FieldRule::Required)
    }
}

// ============================================================================
// DATASET SCHEMAS
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schema {
    pub name: String,
    pub fields: Vec<FieldDefinition>,
}

impl Schema {
    pub fn new(name: impl Into<String>) -> Self {
        Schema {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    pub fn field(mut self, definition: FieldDefinition) -> Self {
        self.fields.push(definition);
        self
    }

    pub fn get(&self, name: &str) -> Option<&FieldDefinition> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }
}

fn registry_names() -> FieldRule {
    FieldRule::OneOf(Registry::ALL.iter().map(|r| r.name().to_string()).collect())
}

/// The `projects` dataset
pub fn project_schema() -> Schema {
    use FieldType::*;

    Schema::new("projects")
        .field(FieldDefinition::new("id", Integer).with_rule(FieldRule::Required).with_rule(FieldRule::Min(0)))
        .field(
            FieldDefinition::new("project_id", String)
                .with_description("Registry-scoped project id, prefixed (VCS75, GLD1234)")
                .with_rule(FieldRule::Required),
        )
        .field(FieldDefinition::new("name", String))
        .field(
            FieldDefinition::new("registry", String)
                .with_rule(FieldRule::Required)
                .with_rule(registry_names()),
        )
        .field(FieldDefinition::new("proponent", String))
        .field(
            FieldDefinition::new("protocol", StringList)
                .with_description("Canonical protocol ids, order of first appearance")
                .not_null(),
        )
        .field(
            FieldDefinition::new("protocol_version", NullableStringList)
                .with_description("Parallel to protocol")
                .not_null()
                .with_rule(FieldRule::SameLengthAs("protocol".to_string())),
        )
        .field(FieldDefinition::new("category", StringList).not_null())
        .field(FieldDefinition::new("project_subcategory", StringList).not_null())
        .field(
            FieldDefinition::new("status", String).with_rule(FieldRule::OneOf(
                ProjectStatus::ALL.iter().map(|s| s.as_str().to_string()).collect(),
            )),
        )
        .field(FieldDefinition::new("country", String))
        .field(FieldDefinition::new("listed_at", Date))
        .field(FieldDefinition::new("first_issuance_at", Date))
        .field(FieldDefinition::new("first_retirement_at", Date))
        .field(FieldDefinition::new("is_compliance", Boolean).not_null())
        .field(FieldDefinition::new("issued", Integer).not_null().with_rule(FieldRule::Min(0)))
        .field(FieldDefinition::new("retired", Integer).not_null().with_rule(FieldRule::Min(0)))
        .field(FieldDefinition::new("project_url", String))
}

/// The `credits` dataset
pub fn credit_schema() -> Schema {
    use FieldType::*;

    Schema::new("credits")
        .field(FieldDefinition::new("id", Integer).with_rule(FieldRule::Required).with_rule(FieldRule::Min(0)))
        .field(FieldDefinition::new("project_id", String).with_rule(FieldRule::Required))
        .field(
            FieldDefinition::new("registry", String)
                .with_rule(FieldRule::Required)
                .with_rule(registry_names()),
        )
        .field(
            FieldDefinition::new("quantity", Integer)
                .not_null()
                .with_rule(FieldRule::Min(0)),
        )
        .field(FieldDefinition::new("vintage", Integer).with_description("Vintage year, when reported"))
        .field(FieldDefinition::new("transaction_date", Date))
        .field(
            FieldDefinition::new("transaction_type", String)
                .with_rule(FieldRule::Required)
                .with_rule(FieldRule::OneOf(
                    TransactionType::ALL.iter().map(|t| t.as_str().to_string()).collect(),
                )),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_implies_not_nullable() {
        let field = FieldDefinition::new("project_id", FieldType::String).with_rule(FieldRule::Required);
        assert!(field.is_required());
        assert!(!field.nullable);
    }

    #[test]
    fn test_schemas_cover_entity_fields() {
        let projects = project_schema();
        assert_eq!(projects.fields.len(), 18);
        assert!(projects.get("protocol_version").is_some());

        let credits = credit_schema();
        let names: Vec<&str> = credits.field_names().collect();
        assert_eq!(
            names,
            vec!["id", "project_id", "registry", "quantity", "vintage", "transaction_date", "transaction_type"]
        );
    }

    #[test]
    fn test_status_enum_is_canonical() {
        let schema = project_schema();
        let status = schema.get("status").unwrap();
        assert!(status.nullable);
        assert!(status.rules.contains(&FieldRule::OneOf(vec![
            "listed".to_string(),
            "registered".to_string(),
            "completed".to_string(),
        ])));
    }
}
