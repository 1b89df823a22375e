//! Payload type coercion: date and timestamp columns accept string values,
//! parsed through chrono and normalized before binding.

use crate::error::ApiError;
use crate::model::EntityDescriptor;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::Value;
use std::collections::HashMap;

fn parse_date(s: &str) -> Option<String> {
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(d.format("%Y-%m-%d").to_string());
    }
    // Full timestamps collapse to their date part.
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.date_naive().format("%Y-%m-%d").to_string())
}

fn parse_timestamp(s: &str) -> Option<String> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.to_rfc3339());
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.format("%Y-%m-%dT%H:%M:%S%.f").to_string());
        }
    }
    // A bare date is midnight of that day.
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .map(|d| format!("{}T00:00:00", d.format("%Y-%m-%d")))
}

/// Coerce a pre-classified scalar field map against the entity's columns.
/// Non-temporal values pass through untouched.
pub fn coerce_fields(
    entity: &EntityDescriptor,
    fields: HashMap<String, Value>,
) -> Result<HashMap<String, Value>, ApiError> {
    let mut out = HashMap::with_capacity(fields.len());
    for (name, value) in fields {
        let col = entity
            .column(&name)
            .ok_or_else(|| ApiError::UnknownField(name.clone()))?;
        if !col.is_temporal() || value.is_null() {
            out.insert(name, value);
            continue;
        }
        let s = value.as_str().ok_or_else(|| {
            ApiError::MalformedQuery(format!("field '{}' expects a date string", name))
        })?;
        let parsed = if col.pg_type == "date" {
            parse_date(s)
        } else {
            parse_timestamp(s)
        };
        let normalized = parsed.ok_or_else(|| {
            ApiError::MalformedQuery(format!("invalid date value for field '{}': {}", name, s))
        })?;
        out.insert(name, Value::String(normalized));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::test_model;
    use serde_json::json;

    fn person_fields(pairs: &[(&str, Value)]) -> HashMap<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn plain_fields_pass_through() {
        let model = test_model();
        let person = model.entity_by_path("person").unwrap();
        let out = coerce_fields(
            person,
            person_fields(&[("name", json!("Mary")), ("age", json!(19))]),
        )
        .unwrap();
        assert_eq!(out["name"], json!("Mary"));
        assert_eq!(out["age"], json!(19));
    }

    #[test]
    fn date_column_accepts_iso_date_and_timestamp() {
        let model = test_model();
        let person = model.entity_by_path("person").unwrap();
        let out = coerce_fields(
            person,
            person_fields(&[("birth_date", json!("1986-09-15"))]),
        )
        .unwrap();
        assert_eq!(out["birth_date"], json!("1986-09-15"));
        let out = coerce_fields(
            person,
            person_fields(&[("birth_date", json!("1986-09-15T12:30:00Z"))]),
        )
        .unwrap();
        assert_eq!(out["birth_date"], json!("1986-09-15"));
    }

    #[test]
    fn timestamp_column_accepts_rfc3339_and_naive() {
        let model = test_model();
        let person = model.entity_by_path("person").unwrap();
        let out = coerce_fields(
            person,
            person_fields(&[("created_at", json!("2012-01-03T08:00:00+00:00"))]),
        )
        .unwrap();
        assert!(out["created_at"].as_str().unwrap().starts_with("2012-01-03T08:00:00"));
        let out = coerce_fields(
            person,
            person_fields(&[("created_at", json!("2012-01-03 08:00:00"))]),
        )
        .unwrap();
        assert!(out["created_at"].as_str().unwrap().starts_with("2012-01-03T08:00:00"));
    }

    #[test]
    fn garbage_dates_are_rejected() {
        let model = test_model();
        let person = model.entity_by_path("person").unwrap();
        let err = coerce_fields(
            person,
            person_fields(&[("birth_date", json!("not a date"))]),
        )
        .unwrap_err();
        assert!(matches!(err, ApiError::MalformedQuery(_)));
        let err = coerce_fields(person, person_fields(&[("birth_date", json!(12))])).unwrap_err();
        assert!(matches!(err, ApiError::MalformedQuery(_)));
    }

    #[test]
    fn null_is_allowed_for_temporal_columns() {
        let model = test_model();
        let person = model.entity_by_path("person").unwrap();
        let out =
            coerce_fields(person, person_fields(&[("birth_date", Value::Null)])).unwrap();
        assert_eq!(out["birth_date"], Value::Null);
    }

    #[test]
    fn unknown_field_is_rejected() {
        let model = test_model();
        let person = model.entity_by_path("person").unwrap();
        let err =
            coerce_fields(person, person_fields(&[("shoe_size", json!(42))])).unwrap_err();
        assert!(matches!(err, ApiError::UnknownField(f) if f == "shoe_size"));
    }
}
