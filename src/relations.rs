//! Relation updates: add/remove entries applied to a one-level relationship
//! for a set of target rows, with optional cascading delete of removed rows.
//!
//! Collections are foreign-key backed: attaching to a to_many relation points
//! the related row's FK at the target; attaching to a to_one relation points
//! the target's FK at the related row.

use crate::error::ApiError;
use crate::model::{EntityDescriptor, RelationKind, RelationSpec, ResolvedModel};
use crate::service::CrudService;
use crate::sql::{attach_fk, delete_by_id, detach_fk, insert, select_by_fields, QueryBuf};
use serde_json::{Map, Value};
use sqlx::PgConnection;
use std::collections::{HashMap, HashSet};

/// The `{add: [...], remove: [...]}` shape of a relation patch entry.
#[derive(Debug, Default)]
pub struct RelationPayload {
    pub add: Vec<Map<String, Value>>,
    pub remove: Vec<Map<String, Value>>,
}

/// Marker key on a remove entry requesting deletion of the related row.
const DELETE_MARKER: &str = "__delete__";

pub fn parse_payload(v: &Value) -> Result<RelationPayload, ApiError> {
    let obj = v.as_object().ok_or_else(|| {
        ApiError::MalformedQuery("relation update must be an object with add/remove".into())
    })?;
    let mut payload = RelationPayload::default();
    for (key, target) in [("add", &mut payload.add), ("remove", &mut payload.remove)] {
        match obj.get(key) {
            None => {}
            Some(Value::Array(items)) => {
                for item in items {
                    let entry = item.as_object().ok_or_else(|| {
                        ApiError::MalformedQuery(format!(
                            "relation '{}' entries must be objects",
                            key
                        ))
                    })?;
                    target.push(entry.clone());
                }
            }
            Some(_) => {
                return Err(ApiError::MalformedQuery(format!(
                    "relation '{}' must be an array",
                    key
                )))
            }
        }
    }
    Ok(payload)
}

fn pk_of(entity: &EntityDescriptor, row: &Value) -> Result<Value, ApiError> {
    row.get(&entity.pk)
        .cloned()
        .ok_or(ApiError::Db(sqlx::Error::RowNotFound))
}

/// Fetch an existing row matching all fields exactly, or insert one.
/// Returns the primary key either way.
async fn get_or_create(
    conn: &mut PgConnection,
    entity: &EntityDescriptor,
    fields: &Map<String, Value>,
) -> Result<Value, ApiError> {
    let probe = select_by_fields(entity, fields)?;
    let rows = CrudService::fetch_all(&mut *conn, &probe).await?;
    if let Some(row) = rows.first() {
        return pk_of(entity, row);
    }
    let body: HashMap<String, Value> = fields
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    let q = insert(entity, &body);
    let row = CrudService::fetch_optional(conn, &q)
        .await?
        .ok_or(ApiError::Db(sqlx::Error::RowNotFound))?;
    pk_of(entity, &row)
}

/// Probe statement for resolving an existing related row: by primary key
/// when the entry carries one, else by exact match on every field.
fn existing_probe(
    entity: &EntityDescriptor,
    entry: &Map<String, Value>,
) -> Result<QueryBuf, ApiError> {
    if let Some(id) = entry.get(&entity.pk) {
        let mut by_pk = Map::new();
        by_pk.insert(entity.pk.clone(), id.clone());
        return select_by_fields(entity, &by_pk);
    }
    select_by_fields(entity, entry)
}

/// Resolve a related row from an add/remove entry. The row must exist; a
/// primary key pointing at nothing is a miss, not a value to take on faith.
async fn resolve_existing(
    conn: &mut PgConnection,
    entity: &EntityDescriptor,
    entry: &Map<String, Value>,
) -> Result<Value, ApiError> {
    let probe = existing_probe(entity, entry)?;
    let rows = CrudService::fetch_all(conn, &probe).await?;
    rows.first()
        .map(|row| pk_of(entity, row))
        .transpose()?
        .ok_or(ApiError::NotFound)
}

/// Value of the relation's join column on a target row. Usually the target
/// id itself; looked up only when the relation joins on a non-pk column.
async fn our_key_value(
    conn: &mut PgConnection,
    entity: &EntityDescriptor,
    rel: &RelationSpec,
    target_id: &Value,
) -> Result<Value, ApiError> {
    if rel.our_key == entity.pk {
        return Ok(target_id.clone());
    }
    let mut probe_fields = Map::new();
    probe_fields.insert(entity.pk.clone(), target_id.clone());
    let probe = select_by_fields(entity, &probe_fields)?;
    let rows = CrudService::fetch_all(conn, &probe).await?;
    let row = rows.first().ok_or(ApiError::NotFound)?;
    row.get(&rel.our_key)
        .cloned()
        .ok_or_else(|| ApiError::UnknownField(rel.our_key.clone()))
}

async fn attach(
    conn: &mut PgConnection,
    entity: &EntityDescriptor,
    related: &EntityDescriptor,
    rel: &RelationSpec,
    target_id: &Value,
    related_pk: &Value,
) -> Result<(), ApiError> {
    let q = match rel.kind {
        RelationKind::ToMany => {
            let owner = our_key_value(conn, entity, rel, target_id).await?;
            attach_fk(related, &rel.their_key, &owner, related_pk)
        }
        RelationKind::ToOne => attach_fk(entity, &rel.our_key, related_pk, target_id),
    };
    CrudService::execute(conn, &q).await?;
    Ok(())
}

async fn detach(
    conn: &mut PgConnection,
    entity: &EntityDescriptor,
    related: &EntityDescriptor,
    rel: &RelationSpec,
    target_id: &Value,
    related_pk: &Value,
) -> Result<(), ApiError> {
    let q = match rel.kind {
        RelationKind::ToMany => {
            let owner = our_key_value(conn, entity, rel, target_id).await?;
            detach_fk(related, &rel.their_key, &owner, related_pk)
        }
        RelationKind::ToOne => detach_fk(entity, &rel.our_key, related_pk, target_id),
    };
    CrudService::execute(conn, &q).await?;
    Ok(())
}

/// Apply add/remove relation updates from a patch body to every target row.
/// Returns the relation names actually processed so the caller can exclude
/// them from plain-field assignment. The caller owns the transaction.
pub async fn apply(
    conn: &mut PgConnection,
    model: &ResolvedModel,
    entity: &EntityDescriptor,
    target_ids: &[Value],
    body: &Map<String, Value>,
) -> Result<HashSet<String>, ApiError> {
    let mut touched = HashSet::new();
    for (key, value) in body {
        let Some(rel) = entity.relation(key) else {
            continue;
        };
        let related = model
            .entity_by_name(&rel.target)
            .ok_or_else(|| ApiError::UnknownField(rel.target.clone()))?;
        let payload = parse_payload(value)?;

        for entry in &payload.add {
            let related_pk = if entry.contains_key(&related.pk) {
                resolve_existing(conn, related, entry).await?
            } else {
                get_or_create(conn, related, entry).await?
            };
            for target_id in target_ids {
                attach(conn, entity, related, rel, target_id, &related_pk).await?;
            }
        }

        for entry in &payload.remove {
            let mut entry = entry.clone();
            let delete_related = entry
                .remove(DELETE_MARKER)
                .map(|v| v.as_bool().unwrap_or(false))
                .unwrap_or(false);
            let related_pk = resolve_existing(conn, related, &entry).await?;
            for target_id in target_ids {
                detach(conn, entity, related, rel, target_id, &related_pk).await?;
            }
            if delete_related {
                let q = delete_by_id(related, &related_pk);
                CrudService::execute(&mut *conn, &q).await?;
            }
        }

        touched.insert(key.clone());
    }
    Ok(touched)
}

/// Attach one level of related rows to a freshly created instance: each item
/// is resolved by get-or-create and appended to the named relation.
pub async fn attach_collection(
    conn: &mut PgConnection,
    model: &ResolvedModel,
    entity: &EntityDescriptor,
    rel_name: &str,
    target_id: &Value,
    items: &[Value],
) -> Result<(), ApiError> {
    let rel = entity
        .relation(rel_name)
        .ok_or_else(|| ApiError::UnknownField(rel_name.to_string()))?;
    let related = model
        .entity_by_name(&rel.target)
        .ok_or_else(|| ApiError::UnknownField(rel.target.clone()))?;
    for item in items {
        let entry = item.as_object().ok_or_else(|| {
            ApiError::MalformedQuery(format!("relation '{}' entries must be objects", rel_name))
        })?;
        let related_pk = get_or_create(conn, related, entry).await?;
        attach(conn, entity, related, rel, target_id, &related_pk).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_add_and_remove_lists() {
        let payload = parse_payload(&json!({
            "add": [{"name": "lixeiro"}, {"id": 4}],
            "remove": [{"id": 7, "__delete__": true}]
        }))
        .unwrap();
        assert_eq!(payload.add.len(), 2);
        assert_eq!(payload.remove.len(), 1);
        assert_eq!(payload.remove[0].get(DELETE_MARKER), Some(&json!(true)));
    }

    #[test]
    fn missing_sides_default_to_empty() {
        let payload = parse_payload(&json!({"add": [{"id": 1}]})).unwrap();
        assert_eq!(payload.add.len(), 1);
        assert!(payload.remove.is_empty());
    }

    #[test]
    fn rejects_non_object_payloads() {
        assert!(parse_payload(&json!([1, 2])).is_err());
        assert!(parse_payload(&json!({"add": {"id": 1}})).is_err());
        assert!(parse_payload(&json!({"add": [3]})).is_err());
    }

    #[test]
    fn entries_with_a_pk_are_resolved_against_storage() {
        let model = crate::model::test_model();
        let computer = model.entity_by_path("computer").unwrap();
        // Extra fields do not widen the probe; the pk alone identifies the row.
        let entry = json!({"id": 999, "vendor": "lemote"});
        let q = existing_probe(computer, entry.as_object().unwrap()).unwrap();
        assert!(q.sql.contains(r#"WHERE "id" = $1::bigint"#), "{}", q.sql);
        assert_eq!(q.params, vec![json!(999)]);
    }

    #[test]
    fn entries_without_a_pk_probe_by_exact_field_match() {
        let model = crate::model::test_model();
        let computer = model.entity_by_path("computer").unwrap();
        let entry = json!({"name": "lixeiro", "vendor": "lemote"});
        let q = existing_probe(computer, entry.as_object().unwrap()).unwrap();
        assert!(q.sql.contains(r#""name" = "#), "{}", q.sql);
        assert!(q.sql.contains(r#""vendor" = "#), "{}", q.sql);
        assert_eq!(q.params.len(), 2);
    }
}
