use crate::models::AppState;
use axum::{Json, Router, routing::get};

pub mod admin_routes;
pub mod appointment_routes;
pub mod doctor_routes;
pub mod session_routes;
pub mod slot_routes;
pub mod view_routes;


pub fn router(state: AppState) -> Router {
    Router::new()
        .nest("/api/session", session_routes::router())
        .nest("/api", doctor_routes::router())
        .nest("/api", slot_routes::router())
        .nest("/api", appointment_routes::router())
        .nest("/api", admin_routes::router())
        .nest("/api", view_routes::router())
        .route("/health", get(health))
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}
