//! Typed errors and HTTP mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Errors raised while validating or resolving a model definition.
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("unknown entity: {0}")]
    UnknownEntity(String),
    #[error("duplicate path segment: {0}")]
    DuplicatePathSegment(String),
    #[error("entity {entity}: primary key column '{column}' not declared")]
    InvalidPrimaryKey { entity: String, column: String },
    #[error("entity {entity}: relation '{relation}' references missing {what} '{name}'")]
    InvalidRelation {
        entity: String,
        relation: String,
        what: &'static str,
        name: String,
    },
    #[error("model load: {0}")]
    Load(String),
}

/// Request-level error taxonomy. Each variant maps onto one HTTP outcome.
#[derive(Error, Debug)]
pub enum ApiError {
    /// Body or query string was not decodable as the expected JSON shape.
    #[error("{0}")]
    MalformedQuery(String),
    #[error("unknown operator: {0}")]
    UnknownOperator(String),
    #[error("unknown field: {0}")]
    UnknownField(String),
    #[error("unknown function: {0}")]
    UnknownFunction(String),
    /// Single-instance lookup miss; rendered as 404 with an empty body.
    #[error("not found")]
    NotFound,
    /// Search with type=one matched zero rows.
    #[error("No result found")]
    NoResult,
    /// Search with type=one matched several rows, or a batched aggregate
    /// evaluation produced an unexpected row count.
    #[error("Multiple results found")]
    MultipleResults,
    #[error("method not allowed")]
    MethodNotAllowed,
    #[error("{0}")]
    Validation(String),
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error("database: {0}")]
    Db(#[from] sqlx::Error),
}

impl ApiError {
    pub fn malformed() -> Self {
        ApiError::MalformedQuery("Unable to decode data".into())
    }
}

#[derive(Serialize)]
struct MessageBody {
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::MalformedQuery(_)
            | ApiError::UnknownOperator(_)
            | ApiError::UnknownField(_)
            | ApiError::UnknownFunction(_)
            | ApiError::MultipleResults => StatusCode::BAD_REQUEST,
            ApiError::NotFound => return StatusCode::NOT_FOUND.into_response(),
            ApiError::NoResult => StatusCode::NOT_FOUND,
            ApiError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Model(_) | ApiError::Db(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        let body = MessageBody {
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_result_misses_have_fixed_messages() {
        assert_eq!(ApiError::NoResult.to_string(), "No result found");
        assert_eq!(ApiError::MultipleResults.to_string(), "Multiple results found");
        assert_eq!(ApiError::malformed().to_string(), "Unable to decode data");
    }

    #[test]
    fn variants_map_to_their_status_codes() {
        let cases = [
            (ApiError::malformed(), StatusCode::BAD_REQUEST),
            (
                ApiError::UnknownOperator("frobnicate".into()),
                StatusCode::BAD_REQUEST,
            ),
            (ApiError::MultipleResults, StatusCode::BAD_REQUEST),
            (ApiError::NotFound, StatusCode::NOT_FOUND),
            (ApiError::NoResult, StatusCode::NOT_FOUND),
            (ApiError::MethodNotAllowed, StatusCode::METHOD_NOT_ALLOWED),
            (
                ApiError::Validation("name is required".into()),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(err.into_response().status(), status);
        }
    }
}
