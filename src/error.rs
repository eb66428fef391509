use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::db::StoreError;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorObject,
}

#[derive(Debug, Serialize)]
pub struct ErrorObject {
    pub code: String,
    pub message: String,
}

#[derive(Debug)]
pub enum ApiError {
    Unauthorized(&'static str, String),
    Forbidden(&'static str, String),
    BadRequest(&'static str, String),
    NotFound(&'static str, String),
    Conflict(&'static str, String),
    Internal(String),
}

impl ApiError {
    pub fn session_expired() -> Self {
        ApiError::Unauthorized("SESSION_EXPIRED", "Session expired".into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::BadRequest("VALIDATION_ERROR", message.into())
    }

    fn to_error_response(code: &str, message: &str) -> Json<ErrorResponse> {
        Json(ErrorResponse {
            error: ErrorObject {
                code: code.to_string(),
                message: message.to_string(),
            },
        })
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        let msg = e.to_string();
        match e {
            StoreError::DuplicateId { .. } => ApiError::Conflict("DUPLICATE_ID", msg),
            StoreError::IdExhausted { .. } => ApiError::Conflict("ID_EXHAUSTED", msg),
            StoreError::DoctorNotFound(_) => ApiError::NotFound("DOCTOR_NOT_FOUND", msg),
            StoreError::SlotNotFound(_) => ApiError::NotFound("SLOT_NOT_FOUND", msg),
            StoreError::AppointmentNotFound(_) => ApiError::NotFound("APPOINTMENT_NOT_FOUND", msg),
            StoreError::SlotAlreadyBooked(_) => ApiError::Conflict("SLOT_ALREADY_BOOKED", msg),
            StoreError::InvalidTransition { .. } => ApiError::Conflict("INVALID_TRANSITION", msg),
            StoreError::Database(_) | StoreError::Decode(_) => {
                tracing::error!(error = %msg, "store failure");
                ApiError::Internal(msg)
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Unauthorized(code, msg) => {
                (StatusCode::UNAUTHORIZED, ApiError::to_error_response(code, &msg)).into_response()
            }
            ApiError::Forbidden(code, msg) => {
                (StatusCode::FORBIDDEN, ApiError::to_error_response(code, &msg)).into_response()
            }
            ApiError::BadRequest(code, msg) => {
                (StatusCode::BAD_REQUEST, ApiError::to_error_response(code, &msg)).into_response()
            }
            ApiError::NotFound(code, msg) => {
                (StatusCode::NOT_FOUND, ApiError::to_error_response(code, &msg)).into_response()
            }
            ApiError::Conflict(code, msg) => {
                (StatusCode::CONFLICT, ApiError::to_error_response(code, &msg)).into_response()
            }
            ApiError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ApiError::to_error_response("INTERNAL", &msg),
            )
                .into_response(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AppointmentStatus;

    #[test]
    fn test_store_errors_map_to_status_codes() {
        let cases = [
            (StoreError::SlotAlreadyBooked(101), StatusCode::CONFLICT),
            (StoreError::SlotNotFound(9), StatusCode::NOT_FOUND),
            (StoreError::DuplicateId { collection: "slot", id: 1 }, StatusCode::CONFLICT),
            (StoreError::IdExhausted { collection: "doctor" }, StatusCode::CONFLICT),
            (
                StoreError::InvalidTransition {
                    id: 1,
                    current: AppointmentStatus::Unpaid,
                    target: "Prescribed",
                },
                StatusCode::CONFLICT,
            ),
            (StoreError::Decode("bad".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (err, status) in cases {
            let resp = ApiError::from(err).into_response();
            assert_eq!(resp.status(), status);
        }
    }
}
