//! Entity routes built over parameterized paths. Handlers resolve the
//! entity from the first segment, so one route table serves every entity
//! in the model; per-entity method gating happens in the handlers.

use crate::handlers::entity::{create, delete_one, list_or_search, patch_many, patch_one, read};
use crate::state::AppState;
use axum::{routing::get, Router};
use tower_http::trace::TraceLayer;

pub fn entity_routes(state: AppState) -> Router {
    Router::new()
        .route(
            "/:path_segment",
            get(list_or_search).post(create).patch(patch_many),
        )
        .route(
            "/:path_segment/:id",
            get(read).patch(patch_one).delete(delete_one),
        )
        .with_state(state)
}

/// Entity routes nested under a URL prefix, with request tracing.
pub fn api_router(state: AppState, prefix: &str) -> Router {
    let prefix = if prefix.is_empty() { "/api" } else { prefix };
    Router::new()
        .nest(prefix, entity_routes(state))
        .layer(TraceLayer::new_for_http())
}
