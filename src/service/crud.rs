//! Query execution against PostgreSQL: binds built statements and decodes
//! rows into JSON objects.

use crate::error::ApiError;
use crate::sql::{QueryBuf, SqlParam};
use serde_json::Value;
use sqlx::postgres::PgRow;
use sqlx::{Executor, Postgres};

pub struct CrudService;

impl CrudService {
    pub async fn fetch_all<'e, E>(executor: E, q: &QueryBuf) -> Result<Vec<Value>, ApiError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let mut query = sqlx::query(&q.sql);
        for p in &q.params {
            query = query.bind(SqlParam::from_json(p));
        }
        let rows = query.fetch_all(executor).await?;
        Ok(rows.iter().map(row_to_json).collect())
    }

    pub async fn fetch_optional<'e, E>(executor: E, q: &QueryBuf) -> Result<Option<Value>, ApiError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let mut query = sqlx::query(&q.sql);
        for p in &q.params {
            query = query.bind(SqlParam::from_json(p));
        }
        let row = query.fetch_optional(executor).await?;
        Ok(row.as_ref().map(row_to_json))
    }

    /// Run a mutating statement; returns the affected row count.
    pub async fn execute<'e, E>(executor: E, q: &QueryBuf) -> Result<u64, ApiError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        tracing::debug!(sql = %q.sql, params = ?q.params, "execute");
        let mut query = sqlx::query(&q.sql);
        for p in &q.params {
            query = query.bind(SqlParam::from_json(p));
        }
        let result = query.execute(executor).await?;
        Ok(result.rows_affected())
    }
}

/// Map a result set that must contain exactly one row onto that row. Zero
/// and several rows are distinct user-visible outcomes, not one generic
/// failure.
pub fn expect_single(mut rows: Vec<Value>) -> Result<Value, ApiError> {
    match rows.len() {
        0 => Err(ApiError::NoResult),
        1 => Ok(rows.remove(0)),
        _ => Err(ApiError::MultipleResults),
    }
}

pub fn row_to_json(row: &PgRow) -> Value {
    use sqlx::{Column, Row};
    let mut map = serde_json::Map::new();
    for col in row.columns() {
        let name = col.name();
        map.insert(name.to_string(), cell_to_value(row, name));
    }
    Value::Object(map)
}

fn cell_to_value(row: &PgRow, name: &str) -> Value {
    use sqlx::Row;
    if let Ok(Some(n)) = row.try_get::<Option<i16>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<i32>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<i64>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<f32>, _>(name) {
        if let Some(n) = serde_json::Number::from_f64(n as f64) {
            return Value::Number(n);
        }
    }
    if let Ok(Some(n)) = row.try_get::<Option<f64>, _>(name) {
        if let Some(n) = serde_json::Number::from_f64(n) {
            return Value::Number(n);
        }
    }
    if let Ok(Some(b)) = row.try_get::<Option<bool>, _>(name) {
        return Value::Bool(b);
    }
    if let Ok(Some(u)) = row.try_get::<Option<uuid::Uuid>, _>(name) {
        return Value::String(u.to_string());
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(name) {
        return Value::String(d.to_rfc3339());
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::NaiveDateTime>, _>(name) {
        return Value::String(d.format("%Y-%m-%dT%H:%M:%S%.f").to_string());
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::NaiveDate>, _>(name) {
        return Value::String(d.format("%Y-%m-%d").to_string());
    }
    if let Ok(Some(s)) = row.try_get::<Option<String>, _>(name) {
        return Value::String(s);
    }
    if let Ok(Some(j)) = row.try_get::<Option<Value>, _>(name) {
        return j;
    }
    Value::Null
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn exactly_one_row_passes_through() {
        let row = json!({"id": 1, "name": "Lincoln"});
        assert_eq!(expect_single(vec![row.clone()]).unwrap(), row);
    }

    #[test]
    fn zero_and_many_rows_are_distinct_errors() {
        assert!(matches!(
            expect_single(Vec::new()).unwrap_err(),
            ApiError::NoResult
        ));
        assert!(matches!(
            expect_single(vec![json!({"id": 1}), json!({"id": 2})]).unwrap_err(),
            ApiError::MultipleResults
        ));
    }
}
