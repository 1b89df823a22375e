//! Demo server: loads a JSON model file and serves its entities under /api.
//!
//! Environment: DATABASE_URL (required), MODEL_PATH (default model.json),
//! BIND_ADDR (default 0.0.0.0:8080).

use restmod::{api_router, common_routes_with_ready, load_from_file, AppState};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "restmod=debug,tower_http=info".into()),
        )
        .init();

    let database_url = std::env::var("DATABASE_URL")?;
    let model_path = std::env::var("MODEL_PATH").unwrap_or_else(|_| "model.json".into());

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await?;
    let model = Arc::new(load_from_file(&model_path)?);
    for entity in &model.entities {
        tracing::info!(entity = %entity.name, path = %entity.path_segment, "registered");
    }

    let state = AppState { pool, model };
    let app = api_router(state.clone(), "/api").merge(common_routes_with_ready(state));

    let addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".into());
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "listening");
    axum::serve(listener, app).await?;
    Ok(())
}
