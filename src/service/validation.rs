//! Request validation from per-column model rules.

use crate::error::ApiError;
use crate::model::ValidationRule;
use regex::Regex;
use serde_json::Value;
use std::collections::HashMap;

pub struct RequestValidator;

impl RequestValidator {
    /// Validate a create body. All required fields must be present.
    pub fn validate(
        body: &HashMap<String, Value>,
        rules: &HashMap<String, ValidationRule>,
    ) -> Result<(), ApiError> {
        for (col, rule) in rules {
            let val = body.get(col);
            if rule.required == Some(true) && (val.is_none() || val == Some(&Value::Null)) {
                return Err(ApiError::Validation(format!("{} is required", col)));
            }
            if let Some(v) = val {
                validate_field(col, v, rule)?;
            }
        }
        Ok(())
    }

    /// Validate only fields present in a patch body; required is not
    /// enforced for missing fields.
    pub fn validate_partial(
        body: &HashMap<String, Value>,
        rules: &HashMap<String, ValidationRule>,
    ) -> Result<(), ApiError> {
        for (col, v) in body {
            if let Some(rule) = rules.get(col) {
                validate_field(col, v, rule)?;
            }
        }
        Ok(())
    }
}

fn validate_field(col: &str, v: &Value, rule: &ValidationRule) -> Result<(), ApiError> {
    if v.is_null() {
        return Ok(());
    }
    if let Some(max) = rule.max_length {
        if let Some(s) = v.as_str() {
            if s.len() > max as usize {
                return Err(ApiError::Validation(format!(
                    "{} must be at most {} characters",
                    col, max
                )));
            }
        }
    }
    if let Some(min) = rule.min_length {
        if let Some(s) = v.as_str() {
            if s.len() < min as usize {
                return Err(ApiError::Validation(format!(
                    "{} must be at least {} characters",
                    col, min
                )));
            }
        }
    }
    if let Some(ref pattern) = rule.pattern {
        let re = Regex::new(pattern)
            .map_err(|_| ApiError::Validation(format!("invalid pattern for {}", col)))?;
        if let Some(s) = v.as_str() {
            if !re.is_match(s) {
                return Err(ApiError::Validation(format!(
                    "{} does not match required pattern",
                    col
                )));
            }
        }
    }
    if let Some(ref allowed) = rule.allowed {
        if !allowed.iter().any(|a| a == v) {
            return Err(ApiError::Validation(format!(
                "{} must be one of: {:?}",
                col,
                allowed.iter().take(5).collect::<Vec<_>>()
            )));
        }
    }
    if let Some(min) = rule.minimum {
        if let Some(n) = v.as_f64() {
            if n < min {
                return Err(ApiError::Validation(format!(
                    "{} must be at least {}",
                    col, min
                )));
            }
        }
    }
    if let Some(max) = rule.maximum {
        if let Some(n) = v.as_f64() {
            if n > max {
                return Err(ApiError::Validation(format!(
                    "{} must be at most {}",
                    col, max
                )));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rules(col: &str, rule: ValidationRule) -> HashMap<String, ValidationRule> {
        HashMap::from([(col.to_string(), rule)])
    }

    fn body(col: &str, v: Value) -> HashMap<String, Value> {
        HashMap::from([(col.to_string(), v)])
    }

    #[test]
    fn required_field_must_be_present() {
        let r = rules(
            "name",
            ValidationRule {
                required: Some(true),
                ..Default::default()
            },
        );
        assert!(RequestValidator::validate(&HashMap::new(), &r).is_err());
        assert!(RequestValidator::validate(&body("name", json!("Mary")), &r).is_ok());
        // Patch bodies may omit required fields.
        assert!(RequestValidator::validate_partial(&HashMap::new(), &r).is_ok());
    }

    #[test]
    fn length_bounds() {
        let r = rules(
            "name",
            ValidationRule {
                min_length: Some(2),
                max_length: Some(4),
                ..Default::default()
            },
        );
        assert!(RequestValidator::validate(&body("name", json!("Mo")), &r).is_ok());
        assert!(RequestValidator::validate(&body("name", json!("M")), &r).is_err());
        assert!(RequestValidator::validate(&body("name", json!("Marianne")), &r).is_err());
    }

    #[test]
    fn allowed_values() {
        let r = rules(
            "vendor",
            ValidationRule {
                allowed: Some(vec![json!("lemote"), json!("old-lemote")]),
                ..Default::default()
            },
        );
        assert!(RequestValidator::validate(&body("vendor", json!("lemote")), &r).is_ok());
        assert!(RequestValidator::validate(&body("vendor", json!("ibm")), &r).is_err());
    }

    #[test]
    fn numeric_range() {
        let r = rules(
            "age",
            ValidationRule {
                minimum: Some(0.0),
                maximum: Some(150.0),
                ..Default::default()
            },
        );
        assert!(RequestValidator::validate(&body("age", json!(19)), &r).is_ok());
        assert!(RequestValidator::validate(&body("age", json!(-1)), &r).is_err());
        assert!(RequestValidator::validate(&body("age", json!(200)), &r).is_err());
    }
}
