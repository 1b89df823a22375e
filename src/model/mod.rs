//! Declarative data model: raw serde types, validation, and one-time
//! resolution into runtime entity descriptors.

pub mod loader;
pub mod resolved;
pub mod types;
pub mod validator;

pub use loader::*;
pub use resolved::*;
pub use types::*;
pub use validator::*;

#[cfg(test)]
pub(crate) fn test_model_config() -> ModelConfig {
    serde_json::from_value(serde_json::json!({
        "entities": [
            {
                "name": "Person",
                "path_segment": "person",
                "primary_key": "id",
                "methods": ["GET", "POST", "PATCH", "DELETE"],
                "columns": [
                    {"name": "id", "type": "bigint", "nullable": false, "has_default": true},
                    {"name": "name", "type": "text"},
                    {"name": "age", "type": "integer"},
                    {"name": "height", "type": "integer"},
                    {"name": "birth_date", "type": "date"},
                    {"name": "created_at", "type": "timestamptz", "has_default": true}
                ],
                "relations": [
                    {"name": "computers", "target": "Computer", "kind": "to_many", "their_key": "owner_id"}
                ],
                "validation": {
                    "name": {"max_length": 80}
                }
            },
            {
                "name": "Computer",
                "path_segment": "computer",
                "primary_key": "id",
                "methods": ["GET", "POST", "PATCH", "DELETE"],
                "columns": [
                    {"name": "id", "type": "bigint", "nullable": false, "has_default": true},
                    {"name": "name", "type": "text"},
                    {"name": "vendor", "type": "text"},
                    {"name": "owner_id", "type": "bigint"}
                ],
                "relations": [
                    {"name": "owner", "target": "Person", "kind": "to_one", "our_key": "owner_id"}
                ]
            }
        ]
    }))
    .expect("test model config")
}

#[cfg(test)]
pub(crate) fn test_model() -> ResolvedModel {
    resolve(&test_model_config()).expect("test model resolves")
}
