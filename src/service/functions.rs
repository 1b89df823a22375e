//! Batched aggregate evaluation: named functions over entity columns,
//! executed as one round trip and keyed `<function>__<field>`.

use crate::error::ApiError;
use crate::model::EntityDescriptor;
use crate::search::FunctionCall;
use crate::service::{expect_single, CrudService};
use crate::sql::select_aggregates;
use serde_json::Value;
use sqlx::PgPool;

/// Aggregate functions the evaluator recognizes.
pub const AGGREGATES: &[&str] = &["sum", "avg", "min", "max", "count", "stddev", "variance"];

/// Check every call against the aggregate namespace and the entity columns.
pub fn validate_calls(entity: &EntityDescriptor, calls: &[FunctionCall]) -> Result<(), ApiError> {
    for call in calls {
        if !AGGREGATES.contains(&call.name.as_str()) {
            return Err(ApiError::UnknownFunction(call.name.clone()));
        }
        if !entity.has_column(&call.field) {
            return Err(ApiError::UnknownField(call.field.clone()));
        }
    }
    Ok(())
}

/// Evaluate all calls in a single SELECT. The statement aggregates over the
/// whole table, so anything other than exactly one result row is an error.
pub async fn evaluate(
    pool: &PgPool,
    entity: &EntityDescriptor,
    calls: &[FunctionCall],
) -> Result<Value, ApiError> {
    validate_calls(entity, calls)?;
    let q = select_aggregates(entity, calls)?;
    let rows = CrudService::fetch_all(pool, &q).await?;
    expect_single(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::test_model;

    fn call(name: &str, field: &str) -> FunctionCall {
        FunctionCall {
            name: name.into(),
            field: field.into(),
        }
    }

    #[test]
    fn recognized_aggregates_validate() {
        let model = test_model();
        let person = model.entity_by_path("person").unwrap();
        let calls = vec![call("sum", "age"), call("avg", "age"), call("count", "id")];
        assert!(validate_calls(person, &calls).is_ok());
    }

    #[test]
    fn unknown_function_is_named() {
        let model = test_model();
        let person = model.entity_by_path("person").unwrap();
        let err = validate_calls(person, &[call("explode", "age")]).unwrap_err();
        assert!(matches!(err, ApiError::UnknownFunction(f) if f == "explode"));
    }

    #[test]
    fn unknown_field_is_named() {
        let model = test_model();
        let person = model.entity_by_path("person").unwrap();
        let err = validate_calls(person, &[call("sum", "shoe_size")]).unwrap_err();
        assert!(matches!(err, ApiError::UnknownField(f) if f == "shoe_size"));
    }
}
