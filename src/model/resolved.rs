//! Resolved entity model: definitions validated and flattened for runtime use.

use crate::model::types::ValidationRule;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

/// Primary key type for parsing path and body ids.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PkType {
    Uuid,
    BigInt,
    Int,
    Text,
}

#[derive(Clone, Debug)]
pub struct ColumnInfo {
    pub name: String,
    /// PostgreSQL type name, used for SQL casts when binding JSON values.
    pub pg_type: String,
    pub nullable: bool,
    pub has_default: bool,
    pub is_pk: bool,
}

impl ColumnInfo {
    /// Date and timestamp columns get string payloads coerced through chrono.
    pub fn is_temporal(&self) -> bool {
        matches!(self.pg_type.as_str(), "date" | "timestamp" | "timestamptz")
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RelationKind {
    ToMany,
    ToOne,
}

/// One-level association to another entity, expressed as a key-column pair.
#[derive(Clone, Debug)]
pub struct RelationSpec {
    pub name: String,
    /// Name of the related entity in the model.
    pub target: String,
    pub kind: RelationKind,
    /// Join column on this entity (pk for to_many, FK for to_one).
    pub our_key: String,
    /// Join column on the target (FK for to_many, pk for to_one).
    pub their_key: String,
}

#[derive(Clone, Debug)]
pub struct EntityDescriptor {
    pub name: String,
    pub table: String,
    pub path_segment: String,
    pub pk: String,
    pub pk_type: PkType,
    pub columns: Vec<ColumnInfo>,
    /// BTreeMap so relation expansion order is deterministic.
    pub relations: BTreeMap<String, RelationSpec>,
    /// Uppercased HTTP methods this entity exposes.
    pub methods: HashSet<String>,
    pub validation: HashMap<String, ValidationRule>,
}

impl EntityDescriptor {
    pub fn column(&self, name: &str) -> Option<&ColumnInfo> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    pub fn relation(&self, name: &str) -> Option<&RelationSpec> {
        self.relations.get(name)
    }

    pub fn allows(&self, method: &str) -> bool {
        self.methods.contains(method)
    }
}

#[derive(Clone, Debug, Default)]
pub struct ResolvedModel {
    pub entities: Vec<Arc<EntityDescriptor>>,
    by_path: HashMap<String, usize>,
    by_name: HashMap<String, usize>,
}

impl ResolvedModel {
    pub fn new(entities: Vec<Arc<EntityDescriptor>>) -> Self {
        let by_path = entities
            .iter()
            .enumerate()
            .map(|(i, e)| (e.path_segment.clone(), i))
            .collect();
        let by_name = entities
            .iter()
            .enumerate()
            .map(|(i, e)| (e.name.clone(), i))
            .collect();
        ResolvedModel {
            entities,
            by_path,
            by_name,
        }
    }

    pub fn entity_by_path(&self, path: &str) -> Option<&Arc<EntityDescriptor>> {
        self.by_path.get(path).map(|&i| &self.entities[i])
    }

    pub fn entity_by_name(&self, name: &str) -> Option<&Arc<EntityDescriptor>> {
        self.by_name.get(name).map(|&i| &self.entities[i])
    }
}
