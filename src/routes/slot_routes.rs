// src/routes/slot_routes.rs

use axum::{
    extract::{Path, State},
    routing::{get, put},
    Json, Router,
};

use crate::{
    error::ApiError,
    models::{AppState, NewSlot, Slot, SlotPatch},
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/slots", get(list_slots).post(create_slot))
        .route("/slots/{slot_id}", put(update_slot))
}

pub async fn list_slots(State(state): State<AppState>) -> Result<Json<Vec<Slot>>, ApiError> {
    Ok(Json(state.store.list_slots().await?))
}

pub async fn create_slot(
    State(state): State<AppState>,
    Json(req): Json<NewSlot>,
) -> Result<Json<Slot>, ApiError> {
    Ok(Json(state.store.insert_slot(req).await?))
}

/// Only `isBooked` is writable; no appointment is created or removed here.
pub async fn update_slot(
    State(state): State<AppState>,
    Path(slot_id): Path<i64>,
    Json(req): Json<SlotPatch>,
) -> Result<Json<Slot>, ApiError> {
    Ok(Json(state.store.set_slot_booked(slot_id, req.is_booked).await?))
}
