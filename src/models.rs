use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::ClinicStore;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ClinicStore>,
    pub session_ttl_hours: i64,
}

/* -------------------------
   Records
--------------------------*/

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Doctor {
    pub id: i64,
    pub name: String,
    pub spec: String,
    pub rating: Option<f64>,
    pub reviews: Option<i32>,
    pub success_rate: Option<i32>,
    pub experience: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Slot {
    pub id: i64,
    pub doctor_id: i64,
    pub date_time: String,
    pub is_booked: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Appointment {
    pub id: i64,
    pub patient: String,
    pub doctor_id: i64,
    pub slot_id: i64,
    pub date_time: String,
    pub status: AppointmentStatus,
    pub prescription: String,
}

/// Unpaid -> Paid -> Prescribed -> Dispensed.
/// Cancellation deletes the record, so there is no Cancelled variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AppointmentStatus {
    #[default]
    Unpaid,
    Paid,
    Prescribed,
    Dispensed,
}

impl AppointmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Unpaid => "Unpaid",
            AppointmentStatus::Paid => "Paid",
            AppointmentStatus::Prescribed => "Prescribed",
            AppointmentStatus::Dispensed => "Dispensed",
        }
    }

    /// Statuses that count towards revenue in the admin stats.
    pub fn is_billable(&self) -> bool {
        !matches!(self, AppointmentStatus::Unpaid)
    }

    pub fn is_cancellable(&self) -> bool {
        matches!(self, AppointmentStatus::Unpaid | AppointmentStatus::Paid)
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AppointmentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Unpaid" => Ok(AppointmentStatus::Unpaid),
            "Paid" => Ok(AppointmentStatus::Paid),
            "Prescribed" => Ok(AppointmentStatus::Prescribed),
            "Dispensed" => Ok(AppointmentStatus::Dispensed),
            other => Err(format!("unknown appointment status: {other}")),
        }
    }
}

/* -------------------------
   Record Service DTOs
   Absent fields fall back to zero values, the same way the
   document store coerced them.
--------------------------*/

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NewDoctor {
    pub id: Option<i64>,
    pub name: String,
    pub spec: String,
    pub rating: Option<f64>,
    pub reviews: Option<i32>,
    pub success_rate: Option<i32>,
    pub experience: Option<i32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DoctorPatch {
    pub name: Option<String>,
    pub spec: Option<String>,
    pub rating: Option<f64>,
    pub reviews: Option<i32>,
    pub success_rate: Option<i32>,
    pub experience: Option<i32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NewSlot {
    pub id: Option<i64>,
    pub doctor_id: i64,
    pub date_time: String,
    pub is_booked: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SlotPatch {
    pub is_booked: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NewAppointment {
    pub id: Option<i64>,
    pub patient: String,
    pub doctor_id: i64,
    pub slot_id: i64,
    pub date_time: String,
    pub status: AppointmentStatus,
    pub prescription: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AppointmentPatch {
    pub patient: Option<String>,
    pub doctor_id: Option<i64>,
    pub slot_id: Option<i64>,
    pub date_time: Option<String>,
    pub status: Option<AppointmentStatus>,
    pub prescription: Option<String>,
}

/* -------------------------
   Sessions
--------------------------*/

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Patient,
    Doctor,
    Pharmacist,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Patient => "patient",
            Role::Doctor => "doctor",
            Role::Pharmacist => "pharmacist",
            Role::Admin => "admin",
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "patient" => Ok(Role::Patient),
            "doctor" => Ok(Role::Doctor),
            "pharmacist" => Ok(Role::Pharmacist),
            "admin" => Ok(Role::Admin),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewSession {
    pub token_hash: String,
    pub username: String,
    pub role: Role,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct Session {
    pub session_id: Uuid,
    pub username: String,
    pub role: Role,
    pub expires_at: DateTime<Utc>,
}

/* -------------------------
   API envelopes
--------------------------*/

#[derive(Debug, Serialize)]
pub struct ApiOk<T> {
    pub data: T,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn deleted() -> Self {
        Self {
            message: "Deleted".into(),
        }
    }
}
