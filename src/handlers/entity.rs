//! Entity handlers: search/list, read, create, patch one, patch many, delete.
//!
//! Bodies arrive as raw strings so undecodable JSON maps to a 400 with a
//! stable message instead of the extractor's default rejection.

use crate::coerce::coerce_fields;
use crate::error::ApiError;
use crate::model::{EntityDescriptor, PkType};
use crate::relations;
use crate::search::{Cardinality, SearchSpec};
use crate::service::{expect_single, functions, CrudService, RequestValidator};
use crate::sql;
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Map, Value};
use std::collections::HashMap;

fn parse_id(id_str: &str, pk_type: &PkType) -> Result<Value, ApiError> {
    Ok(match pk_type {
        PkType::Uuid => {
            let u = uuid::Uuid::parse_str(id_str).map_err(|_| ApiError::NotFound)?;
            Value::String(u.to_string())
        }
        PkType::BigInt | PkType::Int => {
            let n: i64 = id_str.parse().map_err(|_| ApiError::NotFound)?;
            Value::Number(n.into())
        }
        PkType::Text => Value::String(id_str.to_string()),
    })
}

fn parse_body(raw: &str) -> Result<Map<String, Value>, ApiError> {
    let value: Value = serde_json::from_str(raw).map_err(|_| ApiError::malformed())?;
    match value {
        Value::Object(m) => Ok(m),
        _ => Err(ApiError::malformed()),
    }
}

/// Split a body into scalar column assignments and relation payloads.
/// Keys matching neither namespace are rejected up front.
fn split_body(
    entity: &EntityDescriptor,
    map: Map<String, Value>,
) -> Result<(HashMap<String, Value>, Map<String, Value>), ApiError> {
    let mut scalars = HashMap::new();
    let mut rels = Map::new();
    for (k, v) in map {
        if entity.relation(&k).is_some() {
            rels.insert(k, v);
        } else if entity.has_column(&k) {
            scalars.insert(k, v);
        } else {
            return Err(ApiError::UnknownField(k));
        }
    }
    Ok((scalars, rels))
}

fn pk_from_row(entity: &EntityDescriptor, row: &Value) -> Result<Value, ApiError> {
    row.get(&entity.pk)
        .cloned()
        .ok_or(ApiError::Db(sqlx::Error::RowNotFound))
}

/// GET /<segment>: list the collection, or evaluate the `q` search
/// descriptor. Aggregate-function queries return one flat result object;
/// `type=one` queries return the bare instance.
pub async fn list_or_search(
    State(state): State<AppState>,
    Path(path_segment): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Response, ApiError> {
    let entity = state
        .model
        .entity_by_path(&path_segment)
        .ok_or(ApiError::NotFound)?;
    if !entity.allows("GET") {
        return Err(ApiError::MethodNotAllowed);
    }
    let spec = SearchSpec::from_query_param(params.get("q").map(|s| s.as_str()))?;

    if !spec.functions.is_empty() {
        let result = functions::evaluate(&state.pool, entity, &spec.functions).await?;
        return Ok(Json(result).into_response());
    }

    let q = sql::select_search(&state.model, entity, &spec)?;
    let rows = CrudService::fetch_all(&state.pool, &q).await?;
    match spec.cardinality {
        Cardinality::Many => Ok(Json(json!({ "objects": rows })).into_response()),
        Cardinality::One => Ok(Json(expect_single(rows)?).into_response()),
    }
}

/// GET /<segment>/<id>: one instance with relations expanded one level.
pub async fn read(
    State(state): State<AppState>,
    Path((path_segment, id_str)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    let entity = state
        .model
        .entity_by_path(&path_segment)
        .ok_or(ApiError::NotFound)?;
    if !entity.allows("GET") {
        return Err(ApiError::MethodNotAllowed);
    }
    let id = parse_id(&id_str, &entity.pk_type)?;
    let q = sql::select_by_id(&state.model, entity, &id);
    let row = CrudService::fetch_optional(&state.pool, &q)
        .await?
        .ok_or(ApiError::NotFound)?;
    Ok(Json(row).into_response())
}

/// POST /<segment>: create an instance, attaching any related rows given as
/// arrays under relation keys. Responds 201 with the new primary key.
pub async fn create(
    State(state): State<AppState>,
    Path(path_segment): Path<String>,
    body: String,
) -> Result<Response, ApiError> {
    let entity = state
        .model
        .entity_by_path(&path_segment)
        .ok_or(ApiError::NotFound)?;
    if !entity.allows("POST") {
        return Err(ApiError::MethodNotAllowed);
    }
    let map = parse_body(&body)?;
    let (scalars, rels) = split_body(entity, map)?;
    RequestValidator::validate(&scalars, &entity.validation)?;
    let scalars = coerce_fields(entity, scalars)?;

    let mut tx = state.pool.begin().await?;
    let q = sql::insert(entity, &scalars);
    let row = CrudService::fetch_optional(&mut *tx, &q)
        .await?
        .ok_or(ApiError::Db(sqlx::Error::RowNotFound))?;
    let pk = pk_from_row(entity, &row)?;

    for (rel_name, value) in &rels {
        let items = value.as_array().ok_or_else(|| {
            ApiError::MalformedQuery(format!("relation '{}' must be an array", rel_name))
        })?;
        relations::attach_collection(&mut tx, &state.model, entity, rel_name, &pk, items).await?;
    }
    tx.commit().await?;

    Ok((StatusCode::CREATED, Json(json!({ "id": pk }))).into_response())
}

/// PATCH /<segment>/<id>: update fields and apply relation add/remove
/// payloads, then respond with a fresh expanded read. An empty body is a
/// no-op 204 before the instance is even looked up; non-empty bodies 404
/// on a missing instance before any write.
pub async fn patch_one(
    State(state): State<AppState>,
    Path((path_segment, id_str)): Path<(String, String)>,
    body: String,
) -> Result<Response, ApiError> {
    let entity = state
        .model
        .entity_by_path(&path_segment)
        .ok_or(ApiError::NotFound)?;
    if !entity.allows("PATCH") {
        return Err(ApiError::MethodNotAllowed);
    }
    let id = parse_id(&id_str, &entity.pk_type)?;
    let map = parse_body(&body)?;
    if map.is_empty() {
        return Ok(StatusCode::NO_CONTENT.into_response());
    }

    let read_q = sql::select_by_id(&state.model, entity, &id);
    CrudService::fetch_optional(&state.pool, &read_q)
        .await?
        .ok_or(ApiError::NotFound)?;

    let (scalars, rels) = split_body(entity, map)?;
    RequestValidator::validate_partial(&scalars, &entity.validation)?;
    let scalars = coerce_fields(entity, scalars)?;

    let mut tx = state.pool.begin().await?;
    relations::apply(&mut tx, &state.model, entity, &[id.clone()], &rels).await?;
    if !scalars.is_empty() {
        let q = sql::update_by_ids(entity, &[id.clone()], &scalars);
        CrudService::execute(&mut *tx, &q).await?;
    }
    tx.commit().await?;

    let row = CrudService::fetch_optional(&state.pool, &read_q)
        .await?
        .ok_or(ApiError::NotFound)?;
    Ok(Json(row).into_response())
}

/// PATCH /<segment>: patch every instance matched by the body's `query`
/// descriptor (all instances when absent). Responds with the modified count.
pub async fn patch_many(
    State(state): State<AppState>,
    Path(path_segment): Path<String>,
    body: String,
) -> Result<Response, ApiError> {
    let entity = state
        .model
        .entity_by_path(&path_segment)
        .ok_or(ApiError::NotFound)?;
    if !entity.allows("PATCH") {
        return Err(ApiError::MethodNotAllowed);
    }
    let mut map = parse_body(&body)?;
    if map.is_empty() {
        return Ok(StatusCode::NO_CONTENT.into_response());
    }
    let spec = match map.remove("query") {
        Some(qv) => SearchSpec::from_value(&qv)?,
        None => SearchSpec::default(),
    };

    let pks_q = sql::select_pks(&state.model, entity, &spec)?;
    let pk_rows = CrudService::fetch_all(&state.pool, &pks_q).await?;
    let ids = pk_rows
        .iter()
        .map(|row| pk_from_row(entity, row))
        .collect::<Result<Vec<_>, _>>()?;

    let (scalars, rels) = split_body(entity, map)?;
    RequestValidator::validate_partial(&scalars, &entity.validation)?;
    let scalars = coerce_fields(entity, scalars)?;

    let mut tx = state.pool.begin().await?;
    relations::apply(&mut tx, &state.model, entity, &ids, &rels).await?;
    let num_modified = if !scalars.is_empty() && !ids.is_empty() {
        let q = sql::update_by_ids(entity, &ids, &scalars);
        CrudService::execute(&mut *tx, &q).await?
    } else {
        0
    };
    tx.commit().await?;

    Ok(Json(json!({ "num_modified": num_modified })).into_response())
}

/// DELETE /<segment>/<id>: idempotent delete; 204 whether or not the row
/// existed.
pub async fn delete_one(
    State(state): State<AppState>,
    Path((path_segment, id_str)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    let entity = state
        .model
        .entity_by_path(&path_segment)
        .ok_or(ApiError::NotFound)?;
    if !entity.allows("DELETE") {
        return Err(ApiError::MethodNotAllowed);
    }
    let id = parse_id(&id_str, &entity.pk_type)?;
    let q = sql::delete_by_id(entity, &id);
    CrudService::execute(&state.pool, &q).await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}
