//! Query execution, aggregate evaluation, and request validation.

mod crud;
pub mod functions;
mod validation;
pub use crud::{expect_single, row_to_json, CrudService};
pub use validation::RequestValidator;
