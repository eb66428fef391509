// src/routes/doctor_routes.rs

use axum::{
    extract::{Path, State},
    routing::{get, post, put},
    Json, Router,
};
use chrono::NaiveDateTime;
use serde::Deserialize;

use crate::{
    auth::ensure_role,
    error::ApiError,
    middleware::auth_context::AuthContext,
    models::{ApiOk, AppState, Doctor, DoctorPatch, MessageResponse, NewDoctor, NewSlot, Role, Slot},
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/doctors", get(list_doctors).post(create_doctor))
        .route("/doctors/{doctor_id}", put(update_doctor).delete(delete_doctor))
        .route("/doctors/{doctor_id}/slots", post(add_slot))
}

pub async fn list_doctors(State(state): State<AppState>) -> Result<Json<Vec<Doctor>>, ApiError> {
    Ok(Json(state.store.list_doctors().await?))
}

pub async fn create_doctor(
    State(state): State<AppState>,
    Json(req): Json<NewDoctor>,
) -> Result<Json<Doctor>, ApiError> {
    let doctor = state.store.insert_doctor(req).await?;
    tracing::info!(doctor_id = doctor.id, "doctor created");
    Ok(Json(doctor))
}

pub async fn update_doctor(
    State(state): State<AppState>,
    Path(doctor_id): Path<i64>,
    Json(req): Json<DoctorPatch>,
) -> Result<Json<Doctor>, ApiError> {
    Ok(Json(state.store.update_doctor(doctor_id, req).await?))
}

/// Slots and appointments that reference the doctor are left untouched.
pub async fn delete_doctor(
    State(state): State<AppState>,
    Path(doctor_id): Path<i64>,
) -> Result<Json<MessageResponse>, ApiError> {
    state.store.delete_doctor(doctor_id).await?;
    tracing::info!(doctor_id, "doctor deleted");
    Ok(Json(MessageResponse::deleted()))
}

/* ============================================================
   POST /doctors/{id}/slots
   ============================================================ */

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddSlotRequest {
    #[serde(default)]
    pub date_time: String,
}

/// Accepts the `datetime-local` shapes `YYYY-MM-DDTHH:MM` and `YYYY-MM-DDTHH:MM:SS`.
fn validate_date_time(raw: &str) -> Result<String, ApiError> {
    let value = raw.trim();
    if value.is_empty() {
        return Err(ApiError::validation("dateTime is required"));
    }

    let parsed = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M")
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S"));
    if parsed.is_err() {
        return Err(ApiError::validation("dateTime must be YYYY-MM-DDTHH:MM"));
    }
    Ok(value.to_string())
}

pub async fn add_slot(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(doctor_id): Path<i64>,
    Json(req): Json<AddSlotRequest>,
) -> Result<Json<ApiOk<Slot>>, ApiError> {
    ensure_role(auth.role, &[Role::Doctor], "add slots")?;
    let date_time = validate_date_time(&req.date_time)?;

    if state.store.get_doctor(doctor_id).await?.is_none() {
        return Err(ApiError::NotFound(
            "DOCTOR_NOT_FOUND",
            format!("doctor {doctor_id} not found"),
        ));
    }

    let slot = state
        .store
        .insert_slot(NewSlot {
            id: None,
            doctor_id,
            date_time,
            is_booked: false,
        })
        .await?;

    tracing::info!(doctor_id, slot_id = slot.id, by = %auth.username, "slot added");
    Ok(Json(ApiOk { data: slot }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_date_time() {
        assert_eq!(validate_date_time(" 2025-12-20T10:00 ").unwrap(), "2025-12-20T10:00");
        assert!(validate_date_time("2025-12-20T10:00:30").is_ok());
        assert!(validate_date_time("").is_err());
        assert!(validate_date_time("2025-12-20").is_err());
        assert!(validate_date_time("2025-13-40T10:00").is_err());
    }
}
