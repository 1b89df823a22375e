//! Builds parameterized SQL from resolved entities and search specs.
//! Identifiers come only from the registered model; client-supplied values
//! are always bound as parameters, never spliced into the statement text.

use crate::error::ApiError;
use crate::model::{ColumnInfo, EntityDescriptor, RelationKind, RelationSpec, ResolvedModel};
use crate::ops::Operator;
use crate::search::{Filter, FilterArg, FunctionCall, SearchSpec};
use serde_json::Value;
use std::collections::HashMap;

/// Alias for the primary table in search statements; EXISTS sub-predicates
/// and include subqueries correlate against it.
pub const MAIN: &str = "main";
const REL: &str = "rel";

/// Quote an identifier for PostgreSQL.
fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

#[derive(Debug)]
pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<Value>,
}

impl QueryBuf {
    fn new() -> Self {
        QueryBuf {
            sql: String::new(),
            params: Vec::new(),
        }
    }

    /// Bind a value and return its placeholder with a cast to the column's
    /// SQL type, so JSON strings land correctly in date/uuid/numeric columns.
    fn push_cast(&mut self, v: Value, pg_type: &str) -> String {
        self.params.push(v);
        format!("${}::{}", self.params.len(), pg_type)
    }

    fn push_plain(&mut self, v: Value) -> String {
        self.params.push(v);
        format!("${}", self.params.len())
    }
}

/// Column expression for the SELECT list. Numeric columns surface as text
/// so sqlx decodes them without arbitrary-precision support.
fn column_expr(alias: Option<&str>, c: &ColumnInfo) -> String {
    let q = quoted(&c.name);
    let base = match alias {
        Some(a) => format!("{}.{}", a, q),
        None => q,
    };
    if c.pg_type == "numeric" {
        format!("{}::text", base)
    } else {
        base
    }
}

fn select_column_list(entity: &EntityDescriptor, alias: Option<&str>) -> String {
    entity
        .columns
        .iter()
        .map(|c| match alias {
            Some(_) => format!("{} AS {}", column_expr(alias, c), quoted(&c.name)),
            None => column_expr(None, c),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// One scalar subquery per declared relation, expanding it a single level:
/// json_agg for to_many collections, row_to_json for to_one references.
fn include_subqueries(model: &ResolvedModel, entity: &EntityDescriptor) -> Vec<String> {
    entity
        .relations
        .values()
        .filter_map(|rel| {
            let related = model.entity_by_name(&rel.target)?;
            let rel_cols = select_column_list(related, None);
            let rel_table = quoted(&related.table);
            let sub = match rel.kind {
                RelationKind::ToMany => format!(
                    "(SELECT COALESCE(json_agg(row_to_json(sub)), '[]'::json) FROM (SELECT {} FROM {} WHERE {} = {}.{}) sub)",
                    rel_cols,
                    rel_table,
                    quoted(&rel.their_key),
                    MAIN,
                    quoted(&rel.our_key)
                ),
                RelationKind::ToOne => format!(
                    "(SELECT row_to_json(sub) FROM (SELECT {} FROM {} WHERE {} = {}.{}) sub)",
                    rel_cols,
                    rel_table,
                    quoted(&rel.their_key),
                    MAIN,
                    quoted(&rel.our_key)
                ),
            };
            Some(format!("{} AS {}", sub, quoted(&rel.name)))
        })
        .collect()
}

/// Render one filter into a parameterized predicate over the aliased main
/// table. A `relation__leaf` field resolves the leaf against the related
/// entity and scopes the comparison through a correlated EXISTS.
fn render_filter(
    q: &mut QueryBuf,
    model: &ResolvedModel,
    entity: &EntityDescriptor,
    filter: &Filter,
) -> Result<String, ApiError> {
    let op = Operator::lookup(&filter.op)?;
    if op.is_ordering_marker() {
        return Err(ApiError::MalformedQuery(format!(
            "operator '{}' is not a filter predicate",
            filter.op
        )));
    }

    if let Some((rel_name, leaf)) = filter.relation_split() {
        let rel = entity
            .relation(rel_name)
            .ok_or_else(|| ApiError::UnknownField(filter.field.clone()))?;
        let related = model
            .entity_by_name(&rel.target)
            .ok_or_else(|| ApiError::UnknownField(rel.target.clone()))?;
        let leaf_col = related
            .column(leaf)
            .ok_or_else(|| ApiError::UnknownField(leaf.to_string()))?;
        let lhs = format!("{}.{}", REL, quoted(leaf));
        let inner = render_comparison(q, entity, &lhs, op, &filter.arg, &leaf_col.pg_type)?;
        return Ok(exists_predicate(related, rel, Some(&inner)));
    }

    // `has`/`any` without a relation prefix is a bare existence test on the
    // named relation; the argument is ignored.
    if op.is_existential() {
        let rel = entity
            .relation(&filter.field)
            .ok_or_else(|| ApiError::UnknownField(filter.field.clone()))?;
        let related = model
            .entity_by_name(&rel.target)
            .ok_or_else(|| ApiError::UnknownField(rel.target.clone()))?;
        return Ok(exists_predicate(related, rel, None));
    }

    let col = entity
        .column(&filter.field)
        .ok_or_else(|| ApiError::UnknownField(filter.field.clone()))?;
    let lhs = format!("{}.{}", MAIN, quoted(&filter.field));
    render_comparison(q, entity, &lhs, op, &filter.arg, &col.pg_type)
}

fn exists_predicate(
    related: &EntityDescriptor,
    rel: &RelationSpec,
    inner: Option<&str>,
) -> String {
    let join = format!(
        "{}.{} = {}.{}",
        REL,
        quoted(&rel.their_key),
        MAIN,
        quoted(&rel.our_key)
    );
    match inner {
        Some(pred) => format!(
            "EXISTS (SELECT 1 FROM {} AS {} WHERE {} AND {})",
            quoted(&related.table),
            REL,
            join,
            pred
        ),
        None => format!(
            "EXISTS (SELECT 1 FROM {} AS {} WHERE {})",
            quoted(&related.table),
            REL,
            join
        ),
    }
}

fn render_comparison(
    q: &mut QueryBuf,
    base: &EntityDescriptor,
    lhs: &str,
    op: Operator,
    arg: &FilterArg,
    pg_type: &str,
) -> Result<String, ApiError> {
    if let Some(test) = op.null_test_sql() {
        return Ok(format!("{} {}", lhs, test));
    }

    match arg {
        FilterArg::Field(other) => {
            // Field-to-field comparison always resolves against the primary
            // entity, also inside a relation-scoped predicate.
            if base.column(other).is_none() {
                return Err(ApiError::UnknownField(other.clone()));
            }
            let cmp = op.comparator().ok_or_else(|| {
                ApiError::MalformedQuery("operator does not accept a field argument".into())
            })?;
            Ok(format!("{} {} {}.{}", lhs, cmp, MAIN, quoted(other)))
        }
        FilterArg::Literal(val) => {
            if op.is_membership() {
                let items = val.as_array().ok_or_else(|| {
                    ApiError::MalformedQuery("membership operator requires an array".into())
                })?;
                if items.is_empty() {
                    // IN () is invalid SQL; empty membership is vacuously
                    // false, its negation vacuously true.
                    return Ok(match op {
                        Operator::In => "1 = 0".into(),
                        _ => "1 = 1".into(),
                    });
                }
                let placeholders: Vec<String> = items
                    .iter()
                    .map(|item| q.push_cast(item.clone(), pg_type))
                    .collect();
                let keyword = match op {
                    Operator::In => "IN",
                    _ => "NOT IN",
                };
                return Ok(format!("{} {} ({})", lhs, keyword, placeholders.join(", ")));
            }
            let cmp = op
                .comparator()
                .ok_or_else(|| ApiError::UnknownOperator(format!("{:?}", op)))?;
            let ph = q.push_cast(val.clone(), pg_type);
            Ok(format!("{} {} {}", lhs, cmp, ph))
        }
    }
}

fn where_clause(
    q: &mut QueryBuf,
    model: &ResolvedModel,
    entity: &EntityDescriptor,
    filters: &[Filter],
) -> Result<String, ApiError> {
    let mut parts = Vec::with_capacity(filters.len());
    for f in filters {
        parts.push(render_filter(q, model, entity, f)?);
    }
    Ok(if parts.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", parts.join(" AND "))
    })
}

fn order_clause(entity: &EntityDescriptor, spec: &SearchSpec) -> Result<String, ApiError> {
    if spec.order_by.is_empty() {
        // Deterministic default so paging is stable.
        return Ok(format!(" ORDER BY {}.{}", MAIN, quoted(&entity.pk)));
    }
    let mut parts = Vec::with_capacity(spec.order_by.len());
    for o in &spec.order_by {
        if !entity.has_column(&o.field) {
            return Err(ApiError::UnknownField(o.field.clone()));
        }
        parts.push(format!(
            "{}.{} {}",
            MAIN,
            quoted(&o.field),
            o.direction.sql()
        ));
    }
    Ok(format!(" ORDER BY {}", parts.join(", ")))
}

fn paging_clause(spec: &SearchSpec) -> String {
    let mut out = String::new();
    if let Some(limit) = spec.limit {
        out.push_str(&format!(" LIMIT {}", limit));
    }
    // Offset zero is meaningful and applied, not skipped.
    if let Some(offset) = spec.offset {
        out.push_str(&format!(" OFFSET {}", offset));
    }
    out
}

/// Search SELECT with every declared relation expanded one level.
pub fn select_search(
    model: &ResolvedModel,
    entity: &EntityDescriptor,
    spec: &SearchSpec,
) -> Result<QueryBuf, ApiError> {
    let mut q = QueryBuf::new();
    let mut select_parts = vec![select_column_list(entity, Some(MAIN))];
    select_parts.extend(include_subqueries(model, entity));
    let where_sql = where_clause(&mut q, model, entity, &spec.filters)?;
    let order_sql = order_clause(entity, spec)?;
    q.sql = format!(
        "SELECT {} FROM {} AS {}{}{}{}",
        select_parts.join(", "),
        quoted(&entity.table),
        MAIN,
        where_sql,
        order_sql,
        paging_clause(spec)
    );
    Ok(q)
}

/// Primary keys of the rows a search matches; used to pin the target set of
/// a bulk update before mutating.
pub fn select_pks(
    model: &ResolvedModel,
    entity: &EntityDescriptor,
    spec: &SearchSpec,
) -> Result<QueryBuf, ApiError> {
    let mut q = QueryBuf::new();
    let where_sql = where_clause(&mut q, model, entity, &spec.filters)?;
    let order_sql = order_clause(entity, spec)?;
    q.sql = format!(
        "SELECT {}.{} AS {} FROM {} AS {}{}{}{}",
        MAIN,
        quoted(&entity.pk),
        quoted(&entity.pk),
        quoted(&entity.table),
        MAIN,
        where_sql,
        order_sql,
        paging_clause(spec)
    );
    Ok(q)
}

/// SELECT one row by primary key, relations expanded one level.
pub fn select_by_id(model: &ResolvedModel, entity: &EntityDescriptor, id: &Value) -> QueryBuf {
    let mut q = QueryBuf::new();
    let mut select_parts = vec![select_column_list(entity, Some(MAIN))];
    select_parts.extend(include_subqueries(model, entity));
    let pk_type = entity
        .column(&entity.pk)
        .map(|c| c.pg_type.clone())
        .unwrap_or_else(|| "text".into());
    let ph = q.push_cast(id.clone(), &pk_type);
    q.sql = format!(
        "SELECT {} FROM {} AS {} WHERE {}.{} = {}",
        select_parts.join(", "),
        quoted(&entity.table),
        MAIN,
        MAIN,
        quoted(&entity.pk),
        ph
    );
    q
}

/// SELECT rows matching all the given fields exactly (get-or-create probe,
/// remove-by-field-match resolution). Unknown keys fail.
pub fn select_by_fields(
    entity: &EntityDescriptor,
    fields: &serde_json::Map<String, Value>,
) -> Result<QueryBuf, ApiError> {
    let mut q = QueryBuf::new();
    let mut parts = Vec::with_capacity(fields.len());
    for (k, v) in fields {
        let col = entity
            .column(k)
            .ok_or_else(|| ApiError::UnknownField(k.clone()))?;
        let ph = q.push_cast(v.clone(), &col.pg_type);
        parts.push(format!("{} = {}", quoted(k), ph));
    }
    let where_sql = if parts.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", parts.join(" AND "))
    };
    q.sql = format!(
        "SELECT {} FROM {}{} ORDER BY {}",
        select_column_list(entity, None),
        quoted(&entity.table),
        where_sql,
        quoted(&entity.pk)
    );
    Ok(q)
}

/// INSERT from a pre-classified scalar body, RETURNING the primary key.
/// The primary key participates only when the body supplies it; columns
/// with database defaults are omitted when absent so the default applies.
pub fn insert(entity: &EntityDescriptor, body: &HashMap<String, Value>) -> QueryBuf {
    let mut q = QueryBuf::new();
    let mut cols = Vec::new();
    let mut placeholders = Vec::new();
    for c in &entity.columns {
        let val = body.get(&c.name).cloned();
        if c.is_pk && val.is_none() {
            continue;
        }
        if val.is_none() && c.has_default {
            continue;
        }
        let ph = q.push_cast(val.unwrap_or(Value::Null), &c.pg_type);
        cols.push(quoted(&c.name));
        placeholders.push(ph);
    }
    q.sql = format!(
        "INSERT INTO {} ({}) VALUES ({}) RETURNING {}",
        quoted(&entity.table),
        cols.join(", "),
        placeholders.join(", "),
        quoted(&entity.pk)
    );
    q
}

/// UPDATE the given columns on every row whose primary key is in `ids`.
/// Fields are bound in entity column order so statements are reproducible.
pub fn update_by_ids(
    entity: &EntityDescriptor,
    ids: &[Value],
    fields: &HashMap<String, Value>,
) -> QueryBuf {
    let mut q = QueryBuf::new();
    let mut sets = Vec::new();
    for c in &entity.columns {
        if c.is_pk {
            continue;
        }
        if let Some(v) = fields.get(&c.name) {
            let ph = q.push_cast(v.clone(), &c.pg_type);
            sets.push(format!("{} = {}", quoted(&c.name), ph));
        }
    }
    let pk_type = entity
        .column(&entity.pk)
        .map(|c| c.pg_type.clone())
        .unwrap_or_else(|| "text".into());
    let id_phs: Vec<String> = ids
        .iter()
        .map(|id| q.push_cast(id.clone(), &pk_type))
        .collect();
    q.sql = format!(
        "UPDATE {} SET {} WHERE {} IN ({})",
        quoted(&entity.table),
        sets.join(", "),
        quoted(&entity.pk),
        id_phs.join(", ")
    );
    q
}

/// DELETE one row by primary key.
pub fn delete_by_id(entity: &EntityDescriptor, id: &Value) -> QueryBuf {
    let mut q = QueryBuf::new();
    let pk_type = entity
        .column(&entity.pk)
        .map(|c| c.pg_type.clone())
        .unwrap_or_else(|| "text".into());
    let ph = q.push_cast(id.clone(), &pk_type);
    q.sql = format!(
        "DELETE FROM {} WHERE {} = {}",
        quoted(&entity.table),
        quoted(&entity.pk),
        ph
    );
    q
}

/// Aggregate functions whose SQL result type is numeric regardless of the
/// column type; cast to float8 so results decode as JSON numbers.
fn needs_float_cast(name: &str) -> bool {
    matches!(name, "sum" | "avg" | "stddev" | "variance")
}

/// One batched SELECT evaluating every aggregate call, each aliased by its
/// `name__field` result key. Function names are validated by the caller.
pub fn select_aggregates(
    entity: &EntityDescriptor,
    calls: &[FunctionCall],
) -> Result<QueryBuf, ApiError> {
    let mut q = QueryBuf::new();
    let mut parts = Vec::with_capacity(calls.len());
    for call in calls {
        if !entity.has_column(&call.field) {
            return Err(ApiError::UnknownField(call.field.clone()));
        }
        let expr = if needs_float_cast(&call.name) {
            format!("{}({})::float8", call.name, quoted(&call.field))
        } else {
            format!("{}({})", call.name, quoted(&call.field))
        };
        parts.push(format!("{} AS {}", expr, quoted(&call.key())));
    }
    q.sql = format!(
        "SELECT {} FROM {}",
        parts.join(", "),
        quoted(&entity.table)
    );
    Ok(q)
}

/// Point a foreign key column at a new owner (relation attach).
pub fn attach_fk(
    entity: &EntityDescriptor,
    fk_column: &str,
    fk_value: &Value,
    row_pk: &Value,
) -> QueryBuf {
    let mut q = QueryBuf::new();
    let fk_type = entity
        .column(fk_column)
        .map(|c| c.pg_type.clone())
        .unwrap_or_else(|| "text".into());
    let pk_type = entity
        .column(&entity.pk)
        .map(|c| c.pg_type.clone())
        .unwrap_or_else(|| "text".into());
    let fk_ph = q.push_cast(fk_value.clone(), &fk_type);
    let pk_ph = q.push_cast(row_pk.clone(), &pk_type);
    q.sql = format!(
        "UPDATE {} SET {} = {} WHERE {} = {}",
        quoted(&entity.table),
        quoted(fk_column),
        fk_ph,
        quoted(&entity.pk),
        pk_ph
    );
    q
}

/// Null out a foreign key column, but only when it currently points at the
/// expected owner (relation detach).
pub fn detach_fk(
    entity: &EntityDescriptor,
    fk_column: &str,
    expected_fk: &Value,
    row_pk: &Value,
) -> QueryBuf {
    let mut q = QueryBuf::new();
    let fk_type = entity
        .column(fk_column)
        .map(|c| c.pg_type.clone())
        .unwrap_or_else(|| "text".into());
    let pk_type = entity
        .column(&entity.pk)
        .map(|c| c.pg_type.clone())
        .unwrap_or_else(|| "text".into());
    let pk_ph = q.push_cast(row_pk.clone(), &pk_type);
    let fk_ph = q.push_cast(expected_fk.clone(), &fk_type);
    q.sql = format!(
        "UPDATE {} SET {} = NULL WHERE {} = {} AND {} = {}",
        quoted(&entity.table),
        quoted(fk_column),
        quoted(&entity.pk),
        pk_ph,
        quoted(fk_column),
        fk_ph
    );
    q
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::test_model;
    use serde_json::json;

    fn spec_from(v: serde_json::Value) -> SearchSpec {
        SearchSpec::from_value(&v).unwrap()
    }

    #[test]
    fn gt_filter_renders_comparison() {
        let model = test_model();
        let person = model.entity_by_path("person").unwrap();
        let spec = spec_from(json!({"filters": [{"name": "age", "op": "gt", "val": 18}]}));
        let q = select_search(&model, person, &spec).unwrap();
        assert!(q.sql.contains(r#"WHERE main."age" > $1::integer"#), "{}", q.sql);
        assert_eq!(q.params, vec![json!(18)]);
    }

    #[test]
    fn in_filter_renders_membership() {
        let model = test_model();
        let person = model.entity_by_path("person").unwrap();
        let spec =
            spec_from(json!({"filters": [{"name": "age", "op": "in", "val": [18, 19, 20]}]}));
        let q = select_search(&model, person, &spec).unwrap();
        assert!(
            q.sql
                .contains(r#"main."age" IN ($1::integer, $2::integer, $3::integer)"#),
            "{}",
            q.sql
        );
        assert_eq!(q.params, vec![json!(18), json!(19), json!(20)]);
    }

    #[test]
    fn empty_membership_is_vacuous() {
        let model = test_model();
        let person = model.entity_by_path("person").unwrap();
        let q = select_search(
            &model,
            person,
            &spec_from(json!({"filters": [{"name": "age", "op": "in", "val": []}]})),
        )
        .unwrap();
        assert!(q.sql.contains("WHERE 1 = 0"));
        let q = select_search(
            &model,
            person,
            &spec_from(json!({"filters": [{"name": "age", "op": "not_in", "val": []}]})),
        )
        .unwrap();
        assert!(q.sql.contains("WHERE 1 = 1"));
    }

    #[test]
    fn filters_conjoin_in_order() {
        let model = test_model();
        let person = model.entity_by_path("person").unwrap();
        let spec = spec_from(json!({"filters": [
            {"name": "name", "op": "like", "val": "%y%"},
            {"name": "age", "op": "gte", "val": 18}
        ]}));
        let q = select_search(&model, person, &spec).unwrap();
        let like_at = q.sql.find(r#"main."name" LIKE $1::text"#).unwrap();
        let gte_at = q.sql.find(r#"main."age" >= $2::integer"#).unwrap();
        assert!(like_at < gte_at);
        assert!(q.sql.contains(" AND "));
    }

    #[test]
    fn field_argument_compares_two_columns() {
        let model = test_model();
        let person = model.entity_by_path("person").unwrap();
        let spec =
            spec_from(json!({"filters": [{"name": "age", "op": "gt", "field": "height"}]}));
        let q = select_search(&model, person, &spec).unwrap();
        assert!(q.sql.contains(r#"main."age" > main."height""#), "{}", q.sql);
        assert!(q.params.is_empty());
    }

    #[test]
    fn null_test_ignores_argument() {
        let model = test_model();
        let person = model.entity_by_path("person").unwrap();
        let spec =
            spec_from(json!({"filters": [{"name": "name", "op": "is_null", "val": null}]}));
        let q = select_search(&model, person, &spec).unwrap();
        assert!(q.sql.contains(r#"main."name" IS NULL"#));
        assert!(q.params.is_empty());
    }

    #[test]
    fn relation_prefixed_filter_scopes_through_exists() {
        let model = test_model();
        let person = model.entity_by_path("person").unwrap();
        let spec = spec_from(
            json!({"filters": [{"name": "computers__name", "op": "any", "val": "lixeiro"}]}),
        );
        let q = select_search(&model, person, &spec).unwrap();
        assert!(
            q.sql.contains(
                r#"EXISTS (SELECT 1 FROM "computer" AS rel WHERE rel."owner_id" = main."id" AND rel."name" = $1::text)"#
            ),
            "{}",
            q.sql
        );
        assert_eq!(q.params, vec![json!("lixeiro")]);
    }

    #[test]
    fn bare_existential_tests_relation_presence() {
        let model = test_model();
        let person = model.entity_by_path("person").unwrap();
        let spec = spec_from(json!({"filters": [{"name": "computers", "op": "has", "val": null}]}));
        let q = select_search(&model, person, &spec).unwrap();
        assert!(
            q.sql.contains(
                r#"EXISTS (SELECT 1 FROM "computer" AS rel WHERE rel."owner_id" = main."id")"#
            ),
            "{}",
            q.sql
        );
    }

    #[test]
    fn ordering_limit_and_offset_zero() {
        let model = test_model();
        let person = model.entity_by_path("person").unwrap();
        let spec = spec_from(json!({
            "order_by": [{"field": "age", "direction": "desc"}, {"field": "name"}],
            "limit": 2,
            "offset": 0
        }));
        let q = select_search(&model, person, &spec).unwrap();
        assert!(
            q.sql
                .contains(r#"ORDER BY main."age" DESC, main."name" ASC LIMIT 2 OFFSET 0"#),
            "{}",
            q.sql
        );
    }

    #[test]
    fn default_order_is_primary_key() {
        let model = test_model();
        let person = model.entity_by_path("person").unwrap();
        let q = select_search(&model, person, &spec_from(json!({}))).unwrap();
        assert!(q.sql.contains(r#"ORDER BY main."id""#));
        assert!(!q.sql.contains("LIMIT"));
        assert!(!q.sql.contains("OFFSET"));
    }

    #[test]
    fn includes_expand_one_level() {
        let model = test_model();
        let person = model.entity_by_path("person").unwrap();
        let q = select_search(&model, person, &spec_from(json!({}))).unwrap();
        assert!(q.sql.contains("json_agg(row_to_json(sub))"), "{}", q.sql);
        assert!(q.sql.contains(r#"AS "computers""#));
        let computer = model.entity_by_path("computer").unwrap();
        let q = select_by_id(&model, computer, &json!(1));
        assert!(q.sql.contains("row_to_json(sub)"));
        assert!(q.sql.contains(r#"AS "owner""#));
    }

    #[test]
    fn unknown_names_are_rejected() {
        let model = test_model();
        let person = model.entity_by_path("person").unwrap();
        let unknown_col =
            spec_from(json!({"filters": [{"name": "shoe_size", "op": "eq", "val": 42}]}));
        assert!(matches!(
            select_search(&model, person, &unknown_col).unwrap_err(),
            ApiError::UnknownField(f) if f == "shoe_size"
        ));
        let unknown_op =
            spec_from(json!({"filters": [{"name": "age", "op": "frobnicate", "val": 1}]}));
        assert!(matches!(
            select_search(&model, person, &unknown_op).unwrap_err(),
            ApiError::UnknownOperator(t) if t == "frobnicate"
        ));
        let bad_order = spec_from(json!({"order_by": [{"field": "shoe_size"}]}));
        assert!(matches!(
            select_search(&model, person, &bad_order).unwrap_err(),
            ApiError::UnknownField(f) if f == "shoe_size"
        ));
    }

    #[test]
    fn ordering_marker_is_not_a_predicate() {
        let model = test_model();
        let person = model.entity_by_path("person").unwrap();
        let spec = spec_from(json!({"filters": [{"name": "age", "op": "desc", "val": 1}]}));
        assert!(matches!(
            select_search(&model, person, &spec).unwrap_err(),
            ApiError::MalformedQuery(_)
        ));
    }

    #[test]
    fn insert_skips_absent_defaults_and_returns_pk() {
        let model = test_model();
        let person = model.entity_by_path("person").unwrap();
        let body = HashMap::from([("name".to_string(), json!("Mary"))]);
        let q = insert(person, &body);
        assert_eq!(
            q.sql,
            r#"INSERT INTO "person" ("name", "age", "height", "birth_date") VALUES ($1::text, $2::integer, $3::integer, $4::date) RETURNING "id""#
        );
        assert_eq!(
            q.params,
            vec![json!("Mary"), Value::Null, Value::Null, Value::Null]
        );
    }

    #[test]
    fn update_by_ids_binds_fields_then_ids() {
        let model = test_model();
        let person = model.entity_by_path("person").unwrap();
        let fields = HashMap::from([("age".to_string(), json!(21))]);
        let q = update_by_ids(person, &[json!(1), json!(2)], &fields);
        assert_eq!(
            q.sql,
            r#"UPDATE "person" SET "age" = $1::integer WHERE "id" IN ($2::bigint, $3::bigint)"#
        );
        assert_eq!(q.params, vec![json!(21), json!(1), json!(2)]);
    }

    #[test]
    fn delete_by_id_sql() {
        let model = test_model();
        let person = model.entity_by_path("person").unwrap();
        let q = delete_by_id(person, &json!(7));
        assert_eq!(q.sql, r#"DELETE FROM "person" WHERE "id" = $1::bigint"#);
        assert_eq!(q.params, vec![json!(7)]);
    }

    #[test]
    fn aggregates_batch_into_one_select() {
        let model = test_model();
        let person = model.entity_by_path("person").unwrap();
        let calls = vec![
            FunctionCall {
                name: "sum".into(),
                field: "age".into(),
            },
            FunctionCall {
                name: "count".into(),
                field: "id".into(),
            },
        ];
        let q = select_aggregates(person, &calls).unwrap();
        assert_eq!(
            q.sql,
            r#"SELECT sum("age")::float8 AS "sum__age", count("id") AS "count__id" FROM "person""#
        );
    }

    #[test]
    fn aggregate_unknown_field_is_rejected() {
        let model = test_model();
        let person = model.entity_by_path("person").unwrap();
        let calls = vec![FunctionCall {
            name: "sum".into(),
            field: "shoe_size".into(),
        }];
        assert!(matches!(
            select_aggregates(person, &calls).unwrap_err(),
            ApiError::UnknownField(f) if f == "shoe_size"
        ));
    }

    #[test]
    fn attach_and_detach_fk() {
        let model = test_model();
        let computer = model.entity_by_path("computer").unwrap();
        let q = attach_fk(computer, "owner_id", &json!(1), &json!(9));
        assert_eq!(
            q.sql,
            r#"UPDATE "computer" SET "owner_id" = $1::bigint WHERE "id" = $2::bigint"#
        );
        let q = detach_fk(computer, "owner_id", &json!(1), &json!(9));
        assert_eq!(
            q.sql,
            r#"UPDATE "computer" SET "owner_id" = NULL WHERE "id" = $1::bigint AND "owner_id" = $2::bigint"#
        );
    }

    #[test]
    fn select_by_fields_probe() {
        let model = test_model();
        let computer = model.entity_by_path("computer").unwrap();
        let mut fields = serde_json::Map::new();
        fields.insert("name".into(), json!("lixeiro"));
        let q = select_by_fields(computer, &fields).unwrap();
        assert!(q.sql.contains(r#"WHERE "name" = $1::text ORDER BY "id""#), "{}", q.sql);
    }
}
