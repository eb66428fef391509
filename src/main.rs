mod auth;
mod config;
mod middleware;

mod db;
mod error;
mod models;
mod routes;

use crate::{config::Config, models::AppState};

use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use anyhow::Context;
use axum::http::header;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let cfg = Config::from_env()?;
    let store = db::build_store(&cfg)
        .await
        .context("failed to open record store")?;

    if cfg.seed_on_start && db::seed_if_empty(store.as_ref()).await? {
        tracing::info!("Seeded starter doctors and slots");
    }

    let state = AppState {
        store,
        session_ttl_hours: cfg.session_ttl_hours,
    };

    let app = routes::router(state)
        .layer(dashboard_cors())
        .layer(TraceLayer::new_for_http());

    tracing::info!(backend = ?cfg.store_backend, "Listening on http://{}", cfg.bind_addr);
    let listener = tokio::net::TcpListener::bind(&cfg.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", cfg.bind_addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

/// The role dashboards are static pages opened from another origin.
fn dashboard_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT])
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
