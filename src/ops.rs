//! Operator registry: a fixed table from operator token to predicate rule,
//! shared by the query builder. New operators are added here, not in the
//! builder.

use crate::error::ApiError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operator {
    Eq,
    Neq,
    Gt,
    Lt,
    Gte,
    Lte,
    Like,
    In,
    NotIn,
    IsNull,
    IsNotNull,
    /// Ordering markers; valid only inside order_by resolution.
    Asc,
    Desc,
    /// Relation existential tests (to_one / to_many).
    Has,
    Any,
}

/// Token table. Several tokens may share one operator (`==`, `eq`, `equals`).
pub const OPERATORS: &[(&str, Operator)] = &[
    ("==", Operator::Eq),
    ("eq", Operator::Eq),
    ("equals", Operator::Eq),
    ("equal_to", Operator::Eq),
    ("!=", Operator::Neq),
    ("neq", Operator::Neq),
    ("not_equal_to", Operator::Neq),
    ("does_not_equal", Operator::Neq),
    (">", Operator::Gt),
    ("gt", Operator::Gt),
    ("<", Operator::Lt),
    ("lt", Operator::Lt),
    (">=", Operator::Gte),
    ("gte", Operator::Gte),
    ("<=", Operator::Lte),
    ("lte", Operator::Lte),
    ("like", Operator::Like),
    ("in", Operator::In),
    ("not_in", Operator::NotIn),
    ("is_null", Operator::IsNull),
    ("is_not_null", Operator::IsNotNull),
    ("desc", Operator::Desc),
    ("asc", Operator::Asc),
    ("has", Operator::Has),
    ("any", Operator::Any),
];

impl Operator {
    pub fn lookup(token: &str) -> Result<Operator, ApiError> {
        OPERATORS
            .iter()
            .find(|(t, _)| *t == token)
            .map(|&(_, op)| op)
            .ok_or_else(|| ApiError::UnknownOperator(token.to_string()))
    }

    pub fn is_ordering_marker(self) -> bool {
        matches!(self, Operator::Asc | Operator::Desc)
    }

    pub fn is_existential(self) -> bool {
        matches!(self, Operator::Has | Operator::Any)
    }

    pub fn is_null_test(self) -> bool {
        matches!(self, Operator::IsNull | Operator::IsNotNull)
    }

    pub fn is_membership(self) -> bool {
        matches!(self, Operator::In | Operator::NotIn)
    }

    /// SQL comparator for binary operators. Existential operators compare
    /// with equality inside their EXISTS sub-predicate.
    pub fn comparator(self) -> Option<&'static str> {
        Some(match self {
            Operator::Eq | Operator::Has | Operator::Any => "=",
            Operator::Neq => "<>",
            Operator::Gt => ">",
            Operator::Lt => "<",
            Operator::Gte => ">=",
            Operator::Lte => "<=",
            Operator::Like => "LIKE",
            _ => return None,
        })
    }

    /// SQL fragment for null tests.
    pub fn null_test_sql(self) -> Option<&'static str> {
        match self {
            Operator::IsNull => Some("IS NULL"),
            Operator::IsNotNull => Some("IS NOT NULL"),
            _ => None,
        }
    }
}
