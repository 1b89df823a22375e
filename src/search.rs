//! Search descriptor parsing: untyped client JSON into a validated spec.

use crate::error::ApiError;
use serde_json::Value;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Cardinality {
    #[default]
    Many,
    One,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

impl Direction {
    pub fn sql(self) -> &'static str {
        match self {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        }
    }
}

/// The argument side of a filter: a literal JSON value or the name of
/// another column on the primary entity. Exactly one, by construction.
#[derive(Clone, Debug, PartialEq)]
pub enum FilterArg {
    Literal(Value),
    Field(String),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Filter {
    /// Column name, optionally prefixed `relation__leaf`.
    pub field: String,
    /// Operator token, resolved against the registry at build time.
    pub op: String,
    pub arg: FilterArg,
}

impl Filter {
    fn from_value(v: &Value) -> Result<Filter, ApiError> {
        let obj = v
            .as_object()
            .ok_or_else(|| ApiError::MalformedQuery("filter must be an object".into()))?;
        let field = obj
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| ApiError::MalformedQuery("filter is missing 'name'".into()))?;
        let op = obj
            .get("op")
            .and_then(Value::as_str)
            .ok_or_else(|| ApiError::MalformedQuery("filter is missing 'op'".into()))?;
        // Key presence decides: an explicit `"val": null` counts as the
        // literal argument (needed for is_null-style probes).
        let arg = match (obj.get("val"), obj.get("field")) {
            (Some(val), None) => FilterArg::Literal(val.clone()),
            (None, Some(other)) => {
                let name = other.as_str().ok_or_else(|| {
                    ApiError::MalformedQuery("filter 'field' must be a string".into())
                })?;
                FilterArg::Field(name.to_string())
            }
            _ => {
                return Err(ApiError::MalformedQuery(
                    "filter must specify exactly one of 'val' and 'field'".into(),
                ))
            }
        };
        Ok(Filter {
            field: field.to_string(),
            op: op.to_string(),
            arg,
        })
    }

    /// Split a `relation__leaf` field name, if the relation convention is used.
    pub fn relation_split(&self) -> Option<(&str, &str)> {
        self.field.split_once("__")
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct FunctionCall {
    pub name: String,
    pub field: String,
}

impl FunctionCall {
    fn from_value(v: &Value) -> Result<FunctionCall, ApiError> {
        let obj = v
            .as_object()
            .ok_or_else(|| ApiError::MalformedQuery("function must be an object".into()))?;
        let name = obj
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| ApiError::MalformedQuery("function is missing 'name'".into()))?;
        let field = obj
            .get("field")
            .and_then(Value::as_str)
            .ok_or_else(|| ApiError::MalformedQuery("function is missing 'field'".into()))?;
        Ok(FunctionCall {
            name: name.to_string(),
            field: field.to_string(),
        })
    }

    /// Result-mapping key, `<name>__<field>`.
    pub fn key(&self) -> String {
        format!("{}__{}", self.name, self.field)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct OrderClause {
    pub field: String,
    pub direction: Direction,
}

impl OrderClause {
    fn from_value(v: &Value) -> Result<OrderClause, ApiError> {
        let obj = v
            .as_object()
            .ok_or_else(|| ApiError::MalformedQuery("order_by entry must be an object".into()))?;
        let field = obj
            .get("field")
            .and_then(Value::as_str)
            .ok_or_else(|| ApiError::MalformedQuery("order_by entry is missing 'field'".into()))?;
        let direction = match obj.get("direction") {
            None => Direction::Asc,
            Some(Value::String(s)) if s == "asc" => Direction::Asc,
            Some(Value::String(s)) if s == "desc" => Direction::Desc,
            Some(other) => {
                return Err(ApiError::MalformedQuery(format!(
                    "invalid order direction: {}",
                    other
                )))
            }
        };
        Ok(OrderClause {
            field: field.to_string(),
            direction,
        })
    }
}

/// A validated search specification. Filter order is preserved so the
/// WHERE conjunction is deterministic.
#[derive(Clone, Debug, Default)]
pub struct SearchSpec {
    pub filters: Vec<Filter>,
    pub functions: Vec<FunctionCall>,
    pub order_by: Vec<OrderClause>,
    pub cardinality: Cardinality,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl SearchSpec {
    pub fn new(
        filters: Vec<Filter>,
        functions: Vec<FunctionCall>,
        order_by: Vec<OrderClause>,
        cardinality: Cardinality,
        limit: Option<u32>,
        offset: Option<u32>,
    ) -> Result<SearchSpec, ApiError> {
        if !filters.is_empty() && !functions.is_empty() {
            return Err(ApiError::MalformedQuery(
                "must specify at most one of filters and functions".into(),
            ));
        }
        Ok(SearchSpec {
            filters,
            functions,
            order_by,
            cardinality,
            limit,
            offset,
        })
    }

    pub fn from_value(raw: &Value) -> Result<SearchSpec, ApiError> {
        let obj = raw.as_object().ok_or_else(ApiError::malformed)?;

        let filters = match obj.get("filters") {
            None => Vec::new(),
            Some(Value::Array(items)) => items
                .iter()
                .map(Filter::from_value)
                .collect::<Result<_, _>>()?,
            Some(_) => {
                return Err(ApiError::MalformedQuery("'filters' must be an array".into()))
            }
        };
        let functions = match obj.get("functions") {
            None => Vec::new(),
            Some(Value::Array(items)) => items
                .iter()
                .map(FunctionCall::from_value)
                .collect::<Result<_, _>>()?,
            Some(_) => {
                return Err(ApiError::MalformedQuery(
                    "'functions' must be an array".into(),
                ))
            }
        };
        let order_by = match obj.get("order_by") {
            None => Vec::new(),
            Some(Value::Array(items)) => items
                .iter()
                .map(OrderClause::from_value)
                .collect::<Result<_, _>>()?,
            Some(_) => {
                return Err(ApiError::MalformedQuery(
                    "'order_by' must be an array".into(),
                ))
            }
        };
        let cardinality = match obj.get("type") {
            None => Cardinality::Many,
            Some(Value::String(s)) if s == "one" => Cardinality::One,
            Some(other) => {
                return Err(ApiError::MalformedQuery(format!(
                    "invalid search type: {}",
                    other
                )))
            }
        };
        let limit = match obj.get("limit") {
            None => None,
            Some(v) => match v.as_u64() {
                Some(n) if n >= 1 && n <= u32::MAX as u64 => Some(n as u32),
                _ => {
                    return Err(ApiError::MalformedQuery(
                        "'limit' must be a positive integer".into(),
                    ))
                }
            },
        };
        let offset = match obj.get("offset") {
            None => None,
            Some(v) => match v.as_u64() {
                Some(n) if n <= u32::MAX as u64 => Some(n as u32),
                _ => {
                    return Err(ApiError::MalformedQuery(
                        "'offset' must be a non-negative integer".into(),
                    ))
                }
            },
        };

        SearchSpec::new(filters, functions, order_by, cardinality, limit, offset)
    }

    /// Parse the `q` query-string parameter; absent maps to `{}`.
    pub fn from_query_param(q: Option<&str>) -> Result<SearchSpec, ApiError> {
        match q {
            None => Ok(SearchSpec::default()),
            Some(raw) => {
                let value: Value =
                    serde_json::from_str(raw).map_err(|_| ApiError::malformed())?;
                SearchSpec::from_value(&value)
            }
        }
    }
}
