//! Model-driven REST API engine over PostgreSQL.
//!
//! A JSON model file declares entities, columns, relations, and validation
//! rules; the library resolves it and serves search, read, create, patch,
//! and delete endpoints for every entity, including a JSON search language
//! compiled to parameterized SQL.

pub mod coerce;
pub mod error;
pub mod handlers;
pub mod model;
pub mod ops;
pub mod relations;
pub mod routes;
pub mod search;
pub mod service;
pub mod sql;
pub mod state;

pub use error::{ApiError, ModelError};
pub use model::{load_from_file, resolve, ModelConfig, ResolvedModel};
pub use routes::{api_router, common_routes, common_routes_with_ready, entity_routes};
pub use search::SearchSpec;
pub use service::CrudService;
pub use state::AppState;
