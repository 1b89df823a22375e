//! HTTP handlers for entity search and CRUD.

pub mod entity;
pub use entity::*;
