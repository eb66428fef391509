// src/routes/admin_routes.rs

use std::collections::{HashMap, HashSet};

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::{
    auth::ensure_role,
    error::ApiError,
    middleware::auth_context::AuthContext,
    models::{ApiOk, AppState, Appointment, Doctor, Slot},
};

/// Flat fee counted per appointment that has been paid for.
pub const FEE_PER_APPOINTMENT: i64 = 50;

// Placeholder dashboard figures; nothing in the system measures these yet.
const MOCK_REVIEWS: i64 = 428;
const MOCK_UPTIME: &str = "99.98%";
const MOCK_DOWNTIME: &str = "2m 14s";
const MOCK_ISSUES: i64 = 0;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/admin/stats", get(get_stats))
        .route("/admin/consistency", get(get_consistency))
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AdminStats {
    pub revenue: i64,
    pub docs_count: i64,
    pub reviews: i64,
    pub uptime: String,
    pub downtime: String,
    pub issues: i64,
}

pub fn revenue(appointments: &[Appointment]) -> i64 {
    let billable = appointments.iter().filter(|a| a.status.is_billable()).count() as i64;
    billable * FEE_PER_APPOINTMENT
}

pub async fn get_stats(State(state): State<AppState>) -> Result<Json<AdminStats>, ApiError> {
    let docs_count = state.store.count_doctors().await?;
    let appointments = state.store.list_appointments().await?;

    Ok(Json(AdminStats {
        revenue: revenue(&appointments),
        docs_count,
        reviews: MOCK_REVIEWS,
        uptime: MOCK_UPTIME.to_string(),
        downtime: MOCK_DOWNTIME.to_string(),
        issues: MOCK_ISSUES,
    }))
}

/* ============================================================
   GET /admin/consistency
   ============================================================ */

#[derive(Debug, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConsistencyReport {
    pub is_consistent: bool,
    /// Booked slots that no appointment references.
    pub orphaned_booked_slots: Vec<i64>,
    /// Slots referenced by more than one appointment.
    pub double_booked_slots: Vec<i64>,
    /// Appointments whose slot does not exist.
    pub appointments_missing_slot: Vec<i64>,
    /// Appointments whose slot exists but is marked free.
    pub appointments_on_free_slot: Vec<i64>,
    pub slots_missing_doctor: Vec<i64>,
    pub appointments_missing_doctor: Vec<i64>,
}

pub fn check_consistency(
    doctors: &[Doctor],
    slots: &[Slot],
    appointments: &[Appointment],
) -> ConsistencyReport {
    let doctor_ids: HashSet<i64> = doctors.iter().map(|d| d.id).collect();
    let mut references: HashMap<i64, usize> = HashMap::new();
    for appt in appointments {
        *references.entry(appt.slot_id).or_default() += 1;
    }

    let mut report = ConsistencyReport::default();

    for slot in slots {
        let count = references.get(&slot.id).copied().unwrap_or(0);
        if slot.is_booked && count == 0 {
            report.orphaned_booked_slots.push(slot.id);
        }
        if count > 1 {
            report.double_booked_slots.push(slot.id);
        }
        if !doctor_ids.contains(&slot.doctor_id) {
            report.slots_missing_doctor.push(slot.id);
        }
    }

    for appt in appointments {
        match slots.iter().find(|s| s.id == appt.slot_id) {
            None => report.appointments_missing_slot.push(appt.id),
            Some(slot) if !slot.is_booked => report.appointments_on_free_slot.push(appt.id),
            Some(_) => {}
        }
        if !doctor_ids.contains(&appt.doctor_id) {
            report.appointments_missing_doctor.push(appt.id);
        }
    }

    report.is_consistent = report.orphaned_booked_slots.is_empty()
        && report.double_booked_slots.is_empty()
        && report.appointments_missing_slot.is_empty()
        && report.appointments_on_free_slot.is_empty()
        && report.slots_missing_doctor.is_empty()
        && report.appointments_missing_doctor.is_empty();
    report
}

pub async fn get_consistency(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<ApiOk<ConsistencyReport>>, ApiError> {
    ensure_role(auth.role, &[], "view the consistency report")?;

    let doctors = state.store.list_doctors().await?;
    let slots = state.store.list_slots().await?;
    let appointments = state.store.list_appointments().await?;

    let report = check_consistency(&doctors, &slots, &appointments);
    if !report.is_consistent {
        tracing::warn!(?report, "record store is inconsistent");
    }
    Ok(Json(ApiOk { data: report }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AppointmentStatus;

    fn appt(id: i64, slot_id: i64, doctor_id: i64, status: AppointmentStatus) -> Appointment {
        Appointment {
            id,
            patient: "Alice".into(),
            doctor_id,
            slot_id,
            date_time: "2025-12-20T10:00".into(),
            status,
            prescription: String::new(),
        }
    }

    fn slot(id: i64, doctor_id: i64, is_booked: bool) -> Slot {
        Slot {
            id,
            doctor_id,
            date_time: "2025-12-20T10:00".into(),
            is_booked,
        }
    }

    fn doctor(id: i64) -> Doctor {
        Doctor {
            id,
            name: format!("Dr. {id}"),
            spec: "Cardiology".into(),
            rating: None,
            reviews: None,
            success_rate: None,
            experience: None,
        }
    }

    #[test]
    fn test_revenue_counts_paid_prescribed_dispensed() {
        let fixture = vec![
            appt(1, 101, 1, AppointmentStatus::Unpaid),
            appt(2, 102, 1, AppointmentStatus::Paid),
            appt(3, 103, 2, AppointmentStatus::Prescribed),
            appt(4, 104, 2, AppointmentStatus::Dispensed),
            appt(5, 105, 3, AppointmentStatus::Unpaid),
            appt(6, 106, 3, AppointmentStatus::Paid),
        ];
        assert_eq!(revenue(&fixture), 4 * 50);
        assert_eq!(revenue(&[]), 0);
    }

    #[test]
    fn test_consistent_store() {
        let report = check_consistency(
            &[doctor(1)],
            &[slot(101, 1, true), slot(102, 1, false)],
            &[appt(1, 101, 1, AppointmentStatus::Paid)],
        );
        assert!(report.is_consistent);
    }

    #[test]
    fn test_detects_each_kind_of_drift() {
        let report = check_consistency(
            &[doctor(1)],
            &[slot(101, 1, true), slot(102, 1, false), slot(103, 9, false)],
            &[
                appt(1, 102, 1, AppointmentStatus::Unpaid),
                appt(2, 555, 9, AppointmentStatus::Paid),
            ],
        );
        assert!(!report.is_consistent);
        assert_eq!(report.orphaned_booked_slots, vec![101]);
        assert_eq!(report.appointments_on_free_slot, vec![1]);
        assert_eq!(report.appointments_missing_slot, vec![2]);
        assert_eq!(report.slots_missing_doctor, vec![103]);
        assert_eq!(report.appointments_missing_doctor, vec![2]);
        assert!(report.double_booked_slots.is_empty());
    }

    #[test]
    fn test_detects_slot_shared_by_two_appointments() {
        let report = check_consistency(
            &[doctor(1)],
            &[slot(101, 1, true), slot(102, 1, true)],
            &[
                appt(1, 101, 1, AppointmentStatus::Unpaid),
                appt(2, 101, 1, AppointmentStatus::Paid),
                appt(3, 102, 1, AppointmentStatus::Paid),
            ],
        );
        assert!(!report.is_consistent);
        assert_eq!(report.double_booked_slots, vec![101]);
        assert!(report.orphaned_booked_slots.is_empty());
        assert!(report.appointments_on_free_slot.is_empty());
    }
}
