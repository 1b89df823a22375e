//! Model validation: referential integrity and API consistency.

use crate::error::ModelError;
use crate::model::types::{ModelConfig, RelationKindConfig};
use std::collections::HashSet;

pub fn validate(config: &ModelConfig) -> Result<(), ModelError> {
    let entity_names: HashSet<&str> = config.entities.iter().map(|e| e.name.as_str()).collect();
    if entity_names.len() != config.entities.len() {
        return Err(ModelError::Load("duplicate entity name".into()));
    }

    let mut path_segments = HashSet::new();
    for e in &config.entities {
        let segment = e
            .path_segment
            .clone()
            .unwrap_or_else(|| e.name.to_lowercase());
        if !path_segments.insert(segment.clone()) {
            return Err(ModelError::DuplicatePathSegment(segment));
        }

        let columns: HashSet<&str> = e.columns.iter().map(|c| c.name.as_str()).collect();
        if !columns.contains(e.primary_key.as_str()) {
            return Err(ModelError::InvalidPrimaryKey {
                entity: e.name.clone(),
                column: e.primary_key.clone(),
            });
        }

        for r in &e.relations {
            let target = config.entities.iter().find(|t| t.name == r.target).ok_or(
                ModelError::InvalidRelation {
                    entity: e.name.clone(),
                    relation: r.name.clone(),
                    what: "entity",
                    name: r.target.clone(),
                },
            )?;
            let target_columns: HashSet<&str> =
                target.columns.iter().map(|c| c.name.as_str()).collect();
            match r.kind {
                RelationKindConfig::ToMany => {
                    // their_key is the FK column on the target table.
                    let their = r.their_key.as_deref().ok_or(ModelError::InvalidRelation {
                        entity: e.name.clone(),
                        relation: r.name.clone(),
                        what: "column",
                        name: "their_key (required for to_many)".into(),
                    })?;
                    if !target_columns.contains(their) {
                        return Err(ModelError::InvalidRelation {
                            entity: e.name.clone(),
                            relation: r.name.clone(),
                            what: "column",
                            name: their.to_string(),
                        });
                    }
                    if let Some(our) = r.our_key.as_deref() {
                        if !columns.contains(our) {
                            return Err(ModelError::InvalidRelation {
                                entity: e.name.clone(),
                                relation: r.name.clone(),
                                what: "column",
                                name: our.to_string(),
                            });
                        }
                    }
                }
                RelationKindConfig::ToOne => {
                    // our_key is the FK column on this table.
                    let our = r.our_key.as_deref().ok_or(ModelError::InvalidRelation {
                        entity: e.name.clone(),
                        relation: r.name.clone(),
                        what: "column",
                        name: "our_key (required for to_one)".into(),
                    })?;
                    if !columns.contains(our) {
                        return Err(ModelError::InvalidRelation {
                            entity: e.name.clone(),
                            relation: r.name.clone(),
                            what: "column",
                            name: our.to_string(),
                        });
                    }
                    if let Some(their) = r.their_key.as_deref() {
                        if !target_columns.contains(their) {
                            return Err(ModelError::InvalidRelation {
                                entity: e.name.clone(),
                                relation: r.name.clone(),
                                what: "column",
                                name: their.to_string(),
                            });
                        }
                    }
                }
            }
        }
    }
    Ok(())
}
