// src/routes/appointment_routes.rs

use axum::{
    extract::{Path, State},
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;

use crate::{
    auth::ensure_role,
    db::StatusChange,
    error::ApiError,
    middleware::auth_context::AuthContext,
    models::{
        ApiOk, AppState, Appointment, AppointmentPatch, MessageResponse, NewAppointment, Role,
    },
};

/*
Lifecycle:
  Unpaid -> Paid -> Prescribed -> Dispensed
  Unpaid | Paid -> cancelled (record deleted, slot freed)

The plain record endpoints below do not enforce it; the workflow
endpoints do.
*/

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/appointments", get(list_appointments).post(create_appointment))
        .route(
            "/appointments/{appointment_id}",
            put(update_appointment).delete(delete_appointment),
        )
        .route("/bookings", post(book_appointment))
        .route("/appointments/{appointment_id}/cancel", post(cancel_appointment))
        .route("/appointments/{appointment_id}/pay", post(pay_appointment))
        .route("/appointments/{appointment_id}/prescribe", post(prescribe))
        .route("/appointments/{appointment_id}/dispense", post(dispense))
}

/* ============================================================
   Record endpoints
   ============================================================ */

pub async fn list_appointments(
    State(state): State<AppState>,
) -> Result<Json<Vec<Appointment>>, ApiError> {
    Ok(Json(state.store.list_appointments().await?))
}

pub async fn create_appointment(
    State(state): State<AppState>,
    Json(req): Json<NewAppointment>,
) -> Result<Json<Appointment>, ApiError> {
    Ok(Json(state.store.insert_appointment(req).await?))
}

pub async fn update_appointment(
    State(state): State<AppState>,
    Path(appointment_id): Path<i64>,
    Json(req): Json<AppointmentPatch>,
) -> Result<Json<Appointment>, ApiError> {
    Ok(Json(state.store.update_appointment(appointment_id, req).await?))
}

pub async fn delete_appointment(
    State(state): State<AppState>,
    Path(appointment_id): Path<i64>,
) -> Result<Json<MessageResponse>, ApiError> {
    state.store.delete_appointment(appointment_id).await?;
    Ok(Json(MessageResponse::deleted()))
}

/* ============================================================
   POST /bookings
   ============================================================ */

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingRequest {
    pub slot_id: i64,
    pub patient: Option<String>,
}

pub async fn book_appointment(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<BookingRequest>,
) -> Result<Json<ApiOk<Appointment>>, ApiError> {
    ensure_role(auth.role, &[Role::Patient], "book appointments")?;

    let requested = req.patient.as_deref().map(str::trim).filter(|s| !s.is_empty());
    // Only admin books on behalf of someone else.
    if auth.role == Role::Patient && requested.is_some_and(|name| name != auth.username) {
        return Err(ApiError::Forbidden(
            "FORBIDDEN",
            "Patients can only book under their own name".into(),
        ));
    }
    let patient = requested.unwrap_or(auth.username.trim());
    if patient.is_empty() {
        return Err(ApiError::validation("patient name is required"));
    }

    let appointment = state.store.book_slot(req.slot_id, patient).await?;

    tracing::info!(
        appointment_id = appointment.id,
        slot_id = appointment.slot_id,
        doctor_id = appointment.doctor_id,
        "appointment booked"
    );
    Ok(Json(ApiOk { data: appointment }))
}

/* ============================================================
   Status transitions
   ============================================================ */

async fn load_appointment(state: &AppState, appointment_id: i64) -> Result<Appointment, ApiError> {
    state
        .store
        .get_appointment(appointment_id)
        .await?
        .ok_or_else(|| {
            ApiError::NotFound(
                "APPOINTMENT_NOT_FOUND",
                format!("appointment {appointment_id} not found"),
            )
        })
}

/// Patients may only act on appointments booked under their own name.
fn ensure_owner(auth: &AuthContext, appointment: &Appointment) -> Result<(), ApiError> {
    if auth.role == Role::Patient && appointment.patient != auth.username {
        return Err(ApiError::Forbidden(
            "FORBIDDEN",
            "Patients can only manage their own appointments".into(),
        ));
    }
    Ok(())
}

pub async fn cancel_appointment(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(appointment_id): Path<i64>,
) -> Result<Json<ApiOk<Appointment>>, ApiError> {
    ensure_role(auth.role, &[Role::Patient], "cancel appointments")?;
    let existing = load_appointment(&state, appointment_id).await?;
    ensure_owner(&auth, &existing)?;

    let removed = state.store.cancel_appointment(appointment_id).await?;

    tracing::info!(appointment_id, slot_id = removed.slot_id, "appointment cancelled");
    Ok(Json(ApiOk { data: removed }))
}

pub async fn pay_appointment(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(appointment_id): Path<i64>,
) -> Result<Json<ApiOk<Appointment>>, ApiError> {
    ensure_role(auth.role, &[Role::Patient], "pay for appointments")?;
    let existing = load_appointment(&state, appointment_id).await?;
    ensure_owner(&auth, &existing)?;

    let updated = state
        .store
        .transition_appointment(appointment_id, StatusChange::pay())
        .await?;

    tracing::info!(appointment_id, "appointment paid");
    Ok(Json(ApiOk { data: updated }))
}

#[derive(Debug, Deserialize)]
pub struct PrescribeRequest {
    #[serde(default)]
    pub prescription: String,
}

pub async fn prescribe(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(appointment_id): Path<i64>,
    Json(req): Json<PrescribeRequest>,
) -> Result<Json<ApiOk<Appointment>>, ApiError> {
    ensure_role(auth.role, &[Role::Doctor], "prescribe")?;

    let text = req.prescription.trim();
    if text.is_empty() {
        return Err(ApiError::validation("prescription is required"));
    }

    let updated = state
        .store
        .transition_appointment(appointment_id, StatusChange::prescribe(text.to_string()))
        .await?;

    tracing::info!(appointment_id, by = %auth.username, "prescription issued");
    Ok(Json(ApiOk { data: updated }))
}

pub async fn dispense(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(appointment_id): Path<i64>,
) -> Result<Json<ApiOk<Appointment>>, ApiError> {
    ensure_role(auth.role, &[Role::Pharmacist], "dispense")?;

    let updated = state
        .store
        .transition_appointment(appointment_id, StatusChange::dispense())
        .await?;

    tracing::info!(appointment_id, by = %auth.username, "medicine dispensed");
    Ok(Json(ApiOk { data: updated }))
}
