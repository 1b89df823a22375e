//! Raw model definition types matching the JSON model schema.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ModelConfig {
    pub entities: Vec<EntityConfig>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EntityConfig {
    /// Entity name; doubles as the default table name and path segment
    /// (lowercased) when those are not given explicitly.
    pub name: String,
    #[serde(default)]
    pub table: Option<String>,
    #[serde(default)]
    pub path_segment: Option<String>,
    #[serde(default = "default_primary_key")]
    pub primary_key: String,
    /// HTTP methods exposed for this entity. Defaults to a read-only API.
    #[serde(default = "default_methods")]
    pub methods: Vec<String>,
    pub columns: Vec<ColumnConfig>,
    #[serde(default)]
    pub relations: Vec<RelationConfig>,
    #[serde(default)]
    pub validation: HashMap<String, ValidationRule>,
}

fn default_primary_key() -> String {
    "id".into()
}

fn default_methods() -> Vec<String> {
    vec!["GET".into()]
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ColumnConfig {
    pub name: String,
    /// PostgreSQL type name, e.g. "text", "integer", "timestamptz".
    #[serde(rename = "type")]
    pub type_: String,
    #[serde(default = "default_true")]
    pub nullable: bool,
    /// Whether the column has a DB-side default (serial, gen_random_uuid(), NOW()).
    #[serde(default)]
    pub has_default: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationKindConfig {
    /// Related rows carry a foreign key to us; the relation is a collection.
    #[default]
    ToMany,
    /// We carry a foreign key to a single related row.
    ToOne,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RelationConfig {
    pub name: String,
    /// Name of the related entity.
    pub target: String,
    #[serde(default)]
    pub kind: RelationKindConfig,
    /// Our side of the join. Defaults to our primary key for to_many;
    /// required for to_one (the FK column on this entity).
    #[serde(default)]
    pub our_key: Option<String>,
    /// Their side of the join. Required for to_many (the FK column on the
    /// target); defaults to the target's primary key for to_one.
    #[serde(default)]
    pub their_key: Option<String>,
}

/// Per-column request validation, applied to create and update payloads.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ValidationRule {
    #[serde(default)]
    pub required: Option<bool>,
    #[serde(default)]
    pub max_length: Option<u32>,
    #[serde(default)]
    pub min_length: Option<u32>,
    #[serde(default)]
    pub pattern: Option<String>,
    #[serde(default)]
    pub allowed: Option<Vec<serde_json::Value>>,
    #[serde(default)]
    pub minimum: Option<f64>,
    #[serde(default)]
    pub maximum: Option<f64>,
}
