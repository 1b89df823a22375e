//! Build the resolved model from a raw definition (call once at startup).

use crate::error::ModelError;
use crate::model::resolved::{
    ColumnInfo, EntityDescriptor, PkType, RelationKind, RelationSpec, ResolvedModel,
};
use crate::model::types::{ModelConfig, RelationKindConfig};
use crate::model::validator::validate;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

fn infer_pk_type(pg_type: &str) -> PkType {
    match pg_type.to_lowercase().as_str() {
        "uuid" => PkType::Uuid,
        "bigint" | "bigserial" | "int8" => PkType::BigInt,
        "integer" | "int" | "int4" | "serial" | "smallint" => PkType::Int,
        _ => PkType::Text,
    }
}

/// Resolve a validated model definition into runtime descriptors.
pub fn resolve(config: &ModelConfig) -> Result<ResolvedModel, ModelError> {
    validate(config)?;

    let mut entities = Vec::with_capacity(config.entities.len());
    for e in &config.entities {
        let table = e.table.clone().unwrap_or_else(|| e.name.to_lowercase());
        let path_segment = e
            .path_segment
            .clone()
            .unwrap_or_else(|| e.name.to_lowercase());

        let columns: Vec<ColumnInfo> = e
            .columns
            .iter()
            .map(|c| ColumnInfo {
                name: c.name.clone(),
                pg_type: c.type_.to_lowercase(),
                nullable: c.nullable,
                has_default: c.has_default,
                is_pk: c.name == e.primary_key,
            })
            .collect();
        let pk_col = columns
            .iter()
            .find(|c| c.is_pk)
            .ok_or(ModelError::InvalidPrimaryKey {
                entity: e.name.clone(),
                column: e.primary_key.clone(),
            })?;
        let pk_type = infer_pk_type(&pk_col.pg_type);

        let mut relations = BTreeMap::new();
        for r in &e.relations {
            let target = config
                .entities
                .iter()
                .find(|t| t.name == r.target)
                .ok_or_else(|| ModelError::UnknownEntity(r.target.clone()))?;
            let (kind, our_key, their_key) = match r.kind {
                RelationKindConfig::ToMany => (
                    RelationKind::ToMany,
                    r.our_key.clone().unwrap_or_else(|| e.primary_key.clone()),
                    // validate() guarantees their_key is present for to_many
                    r.their_key.clone().unwrap_or_default(),
                ),
                RelationKindConfig::ToOne => (
                    RelationKind::ToOne,
                    r.our_key.clone().unwrap_or_default(),
                    r.their_key
                        .clone()
                        .unwrap_or_else(|| target.primary_key.clone()),
                ),
            };
            relations.insert(
                r.name.clone(),
                RelationSpec {
                    name: r.name.clone(),
                    target: r.target.clone(),
                    kind,
                    our_key,
                    their_key,
                },
            );
        }

        entities.push(Arc::new(EntityDescriptor {
            name: e.name.clone(),
            table,
            path_segment,
            pk: e.primary_key.clone(),
            pk_type,
            columns,
            relations,
            methods: e.methods.iter().map(|m| m.to_uppercase()).collect(),
            validation: e.validation.clone(),
        }));
    }

    Ok(ResolvedModel::new(entities))
}

/// Load a model definition from a JSON file and resolve it.
pub fn load_from_file(path: impl AsRef<Path>) -> Result<ResolvedModel, ModelError> {
    let raw = std::fs::read_to_string(path.as_ref())
        .map_err(|e| ModelError::Load(format!("{}: {}", path.as_ref().display(), e)))?;
    let config: ModelConfig =
        serde_json::from_str(&raw).map_err(|e| ModelError::Load(e.to_string()))?;
    resolve(&config)
}
