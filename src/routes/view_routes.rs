// src/routes/view_routes.rs
//
// Table rows for each role's dashboard. Every view loads the full
// collections and joins them in memory with linear lookups.

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::{
    auth::ensure_role,
    error::ApiError,
    middleware::auth_context::AuthContext,
    models::{ApiOk, AppState, Appointment, AppointmentStatus, Doctor, Role, Slot},
};

const UNKNOWN_DOCTOR: &str = "Unknown";
const NOT_AVAILABLE: &str = "N/A";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/views/booking", get(booking_view))
        .route("/views/patient", get(patient_view))
        .route("/views/doctor", get(doctor_view))
        .route("/views/pharmacist", get(pharmacist_view))
        .route("/views/admin", get(admin_view))
}

fn find_doctor(doctors: &[Doctor], id: i64) -> Option<&Doctor> {
    doctors.iter().find(|d| d.id == id)
}

fn doctor_name(doctors: &[Doctor], id: i64) -> String {
    find_doctor(doctors, id)
        .map(|d| d.name.clone())
        .unwrap_or_else(|| UNKNOWN_DOCTOR.to_string())
}

/// Splits `2025-12-20T10:00` into date and time parts.
fn split_date_time(value: &str) -> Option<(&str, &str)> {
    if value.is_empty() {
        return None;
    }
    Some(value.split_once('T').unwrap_or((value, "")))
}

/* ============================================================
   GET /views/booking
   ============================================================ */

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BookingQuery {
    pub doctor_id: Option<i64>,
    pub spec: Option<String>,
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SlotOption {
    pub slot_id: i64,
    pub label: String,
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DoctorCard {
    pub name: String,
    pub spec: String,
    pub rating: String,
    pub reviews: String,
    pub success_rate: String,
    pub experience: String,
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BookingView {
    pub slots: Vec<SlotOption>,
    pub doctor: Option<DoctorCard>,
}

impl From<&Doctor> for DoctorCard {
    fn from(d: &Doctor) -> Self {
        DoctorCard {
            name: d.name.clone(),
            spec: d.spec.clone(),
            rating: d
                .rating
                .filter(|r| *r != 0.0)
                .map(|r| r.to_string())
                .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
            reviews: d.reviews.unwrap_or(0).to_string(),
            success_rate: format!("{}%", d.success_rate.unwrap_or(0)),
            experience: format!("{} Yrs", d.experience.unwrap_or(0)),
        }
    }
}

pub fn render_booking(doctors: &[Doctor], slots: &[Slot], q: &BookingQuery) -> BookingView {
    let spec = q.spec.as_deref().map(str::trim).filter(|s| !s.is_empty());

    let options = slots
        .iter()
        .filter(|slot| !slot.is_booked)
        .filter_map(|slot| {
            let doc = find_doctor(doctors, slot.doctor_id)?;
            let matches_doc = q.doctor_id.is_none_or(|id| doc.id == id);
            let matches_spec = spec.is_none_or(|s| doc.spec == s);
            if !(matches_doc && matches_spec) {
                return None;
            }
            let (date, time) = split_date_time(&slot.date_time).unwrap_or((NOT_AVAILABLE, ""));
            Some(SlotOption {
                slot_id: slot.id,
                label: format!("{date} @ {time} - {} ({})", doc.name, doc.spec),
            })
        })
        .collect();

    BookingView {
        slots: options,
        doctor: q
            .doctor_id
            .and_then(|id| find_doctor(doctors, id))
            .map(DoctorCard::from),
    }
}

pub async fn booking_view(
    State(state): State<AppState>,
    _auth: AuthContext,
    Query(q): Query<BookingQuery>,
) -> Result<Json<ApiOk<BookingView>>, ApiError> {
    let doctors = state.store.list_doctors().await?;
    let slots = state.store.list_slots().await?;
    Ok(Json(ApiOk {
        data: render_booking(&doctors, &slots, &q),
    }))
}

/* ============================================================
   GET /views/patient
   ============================================================ */

#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RowAction {
    Pay,
    Cancel,
    Prescribe,
    Dispense,
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PatientRow {
    pub appointment_id: i64,
    pub slot_id: i64,
    pub doctor: String,
    pub date_time: String,
    pub status: AppointmentStatus,
    pub status_text: String,
    pub prescription: String,
    pub actions: Vec<RowAction>,
}

pub fn render_patient_rows(doctors: &[Doctor], appointments: &[Appointment]) -> Vec<PatientRow> {
    appointments
        .iter()
        .map(|a| {
            let (status_text, actions) = match a.status {
                AppointmentStatus::Unpaid => ("Unpaid", vec![RowAction::Pay, RowAction::Cancel]),
                AppointmentStatus::Paid => ("Paid", vec![RowAction::Cancel]),
                AppointmentStatus::Prescribed => ("Awaiting Dispense", vec![]),
                AppointmentStatus::Dispensed => ("Completed", vec![]),
            };
            let date_time = if a.date_time.is_empty() {
                NOT_AVAILABLE.to_string()
            } else {
                a.date_time.replacen('T', " at ", 1)
            };
            PatientRow {
                appointment_id: a.id,
                slot_id: a.slot_id,
                doctor: doctor_name(doctors, a.doctor_id),
                date_time,
                status: a.status,
                status_text: status_text.to_string(),
                prescription: if a.prescription.is_empty() {
                    NOT_AVAILABLE.to_string()
                } else {
                    a.prescription.clone()
                },
                actions,
            }
        })
        .collect()
}

pub async fn patient_view(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<ApiOk<Vec<PatientRow>>>, ApiError> {
    ensure_role(auth.role, &[Role::Patient], "view patient appointments")?;

    let doctors = state.store.list_doctors().await?;
    let mut appointments = state.store.list_appointments().await?;
    if auth.role == Role::Patient {
        appointments.retain(|a| a.patient == auth.username);
    }

    Ok(Json(ApiOk {
        data: render_patient_rows(&doctors, &appointments),
    }))
}

/* ============================================================
   GET /views/doctor
   ============================================================ */

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DoctorQuery {
    pub doctor_id: Option<i64>,
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DoctorRow {
    pub appointment_id: i64,
    pub patient: String,
    pub time: String,
    pub status: AppointmentStatus,
    pub actions: Vec<RowAction>,
}

pub fn render_doctor_rows(appointments: &[Appointment], doctor_id: Option<i64>) -> Vec<DoctorRow> {
    appointments
        .iter()
        .filter(|a| matches!(a.status, AppointmentStatus::Paid | AppointmentStatus::Prescribed))
        .filter(|a| doctor_id.is_none_or(|id| a.doctor_id == id))
        .map(|a| DoctorRow {
            appointment_id: a.id,
            patient: a.patient.clone(),
            time: split_date_time(&a.date_time)
                .map(|(_, time)| time.to_string())
                .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
            status: a.status,
            actions: if a.status == AppointmentStatus::Paid {
                vec![RowAction::Prescribe]
            } else {
                vec![]
            },
        })
        .collect()
}

pub async fn doctor_view(
    State(state): State<AppState>,
    auth: AuthContext,
    Query(q): Query<DoctorQuery>,
) -> Result<Json<ApiOk<Vec<DoctorRow>>>, ApiError> {
    ensure_role(auth.role, &[Role::Doctor], "view the doctor queue")?;
    let appointments = state.store.list_appointments().await?;
    Ok(Json(ApiOk {
        data: render_doctor_rows(&appointments, q.doctor_id),
    }))
}

/* ============================================================
   GET /views/pharmacist
   ============================================================ */

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PharmacistRow {
    pub appointment_id: i64,
    pub patient: String,
    pub doctor: String,
    pub prescription: String,
    pub status: AppointmentStatus,
    pub actions: Vec<RowAction>,
}

pub fn render_pharmacist_rows(
    doctors: &[Doctor],
    appointments: &[Appointment],
) -> Vec<PharmacistRow> {
    appointments
        .iter()
        .filter(|a| matches!(a.status, AppointmentStatus::Prescribed | AppointmentStatus::Dispensed))
        .map(|a| PharmacistRow {
            appointment_id: a.id,
            patient: a.patient.clone(),
            doctor: doctor_name(doctors, a.doctor_id),
            prescription: a.prescription.clone(),
            status: a.status,
            actions: if a.status == AppointmentStatus::Prescribed {
                vec![RowAction::Dispense]
            } else {
                vec![]
            },
        })
        .collect()
}

pub async fn pharmacist_view(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<ApiOk<Vec<PharmacistRow>>>, ApiError> {
    ensure_role(auth.role, &[Role::Pharmacist], "view the dispensing queue")?;
    let doctors = state.store.list_doctors().await?;
    let appointments = state.store.list_appointments().await?;
    Ok(Json(ApiOk {
        data: render_pharmacist_rows(&doctors, &appointments),
    }))
}

/* ============================================================
   GET /views/admin
   ============================================================ */

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AdminDoctorRow {
    pub doctor_id: i64,
    pub name: String,
    pub spec: String,
    pub experience: String,
    pub rating: String,
}

pub fn render_admin_rows(doctors: &[Doctor]) -> Vec<AdminDoctorRow> {
    doctors
        .iter()
        .map(|d| AdminDoctorRow {
            doctor_id: d.id,
            name: d.name.clone(),
            spec: d.spec.clone(),
            experience: format!(
                "{} Yrs",
                d.experience.filter(|e| *e != 0).map_or("-".to_string(), |e| e.to_string())
            ),
            rating: d
                .rating
                .filter(|r| *r != 0.0)
                .map_or("-".to_string(), |r| r.to_string()),
        })
        .collect()
}

pub async fn admin_view(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<ApiOk<Vec<AdminDoctorRow>>>, ApiError> {
    ensure_role(auth.role, &[], "view the admin dashboard")?;
    let doctors = state.store.list_doctors().await?;
    Ok(Json(ApiOk {
        data: render_admin_rows(&doctors),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doctors() -> Vec<Doctor> {
        vec![
            Doctor {
                id: 1,
                name: "Dr. Vaibhav Anand".into(),
                spec: "Cardiology".into(),
                rating: Some(4.9),
                reviews: Some(120),
                success_rate: Some(98),
                experience: Some(12),
            },
            Doctor {
                id: 2,
                name: "Dr. Riyan Akbar".into(),
                spec: "Neurologist".into(),
                rating: None,
                reviews: None,
                success_rate: None,
                experience: None,
            },
        ]
    }

    fn slots() -> Vec<Slot> {
        vec![
            Slot { id: 101, doctor_id: 1, date_time: "2025-12-20T10:00".into(), is_booked: false },
            Slot { id: 102, doctor_id: 1, date_time: "2025-12-20T11:00".into(), is_booked: true },
            Slot { id: 103, doctor_id: 2, date_time: "2025-12-21T09:00".into(), is_booked: false },
            Slot { id: 104, doctor_id: 7, date_time: "2025-12-22T09:00".into(), is_booked: false },
        ]
    }

    fn appt(id: i64, doctor_id: i64, status: AppointmentStatus, rx: &str) -> Appointment {
        Appointment {
            id,
            patient: "Alice".into(),
            doctor_id,
            slot_id: 100 + id,
            date_time: "2025-12-20T10:00".into(),
            status,
            prescription: rx.into(),
        }
    }

    #[test]
    fn test_booking_lists_free_slots_with_known_doctors() {
        let view = render_booking(&doctors(), &slots(), &BookingQuery::default());
        let ids: Vec<i64> = view.slots.iter().map(|s| s.slot_id).collect();
        assert_eq!(ids, vec![101, 103]);
        assert_eq!(view.slots[0].label, "2025-12-20 @ 10:00 - Dr. Vaibhav Anand (Cardiology)");
        assert!(view.doctor.is_none());
    }

    #[test]
    fn test_booking_filters_and_doctor_card_defaults() {
        let q = BookingQuery { doctor_id: Some(2), spec: None };
        let view = render_booking(&doctors(), &slots(), &q);
        assert_eq!(view.slots.len(), 1);
        let card = view.doctor.unwrap();
        assert_eq!(card.rating, "N/A");
        assert_eq!(card.reviews, "0");
        assert_eq!(card.success_rate, "0%");
        assert_eq!(card.experience, "0 Yrs");

        let q = BookingQuery { doctor_id: None, spec: Some("Neurologist".into()) };
        let view = render_booking(&doctors(), &slots(), &q);
        assert_eq!(view.slots.iter().map(|s| s.slot_id).collect::<Vec<_>>(), vec![103]);
    }

    #[test]
    fn test_patient_rows_status_text_and_actions() {
        let rows = render_patient_rows(
            &doctors(),
            &[
                appt(1, 1, AppointmentStatus::Unpaid, ""),
                appt(2, 1, AppointmentStatus::Paid, ""),
                appt(3, 2, AppointmentStatus::Prescribed, "Aspirin 500mg"),
                appt(4, 9, AppointmentStatus::Dispensed, "Aspirin 500mg"),
            ],
        );

        assert_eq!(rows[0].actions, vec![RowAction::Pay, RowAction::Cancel]);
        assert_eq!(rows[0].prescription, "N/A");
        assert_eq!(rows[0].date_time, "2025-12-20 at 10:00");
        assert_eq!(rows[1].actions, vec![RowAction::Cancel]);
        assert_eq!(rows[2].status_text, "Awaiting Dispense");
        assert!(rows[2].actions.is_empty());
        assert_eq!(rows[3].status_text, "Completed");
        assert_eq!(rows[3].doctor, "Unknown");
    }

    #[test]
    fn test_patient_row_date_without_time_is_kept() {
        let mut undated = appt(1, 1, AppointmentStatus::Unpaid, "");
        undated.date_time = "2025-12-20".into();
        let mut missing = appt(2, 1, AppointmentStatus::Unpaid, "");
        missing.date_time = String::new();

        let rows = render_patient_rows(&doctors(), &[undated, missing]);
        assert_eq!(rows[0].date_time, "2025-12-20");
        assert_eq!(rows[1].date_time, "N/A");
    }

    #[test]
    fn test_doctor_card_zero_rating_is_not_available() {
        let mut docs = doctors();
        docs[0].rating = Some(0.0);
        let q = BookingQuery { doctor_id: Some(1), spec: None };
        let card = render_booking(&docs, &slots(), &q).doctor.unwrap();
        assert_eq!(card.rating, "N/A");
        assert_eq!(card.experience, "12 Yrs");
    }

    #[test]
    fn test_doctor_rows_only_paid_and_prescribed() {
        let all = [
            appt(1, 1, AppointmentStatus::Unpaid, ""),
            appt(2, 1, AppointmentStatus::Paid, ""),
            appt(3, 2, AppointmentStatus::Prescribed, "x"),
            appt(4, 1, AppointmentStatus::Dispensed, "x"),
        ];
        let rows = render_doctor_rows(&all, None);
        assert_eq!(rows.iter().map(|r| r.appointment_id).collect::<Vec<_>>(), vec![2, 3]);
        assert_eq!(rows[0].time, "10:00");
        assert_eq!(rows[0].actions, vec![RowAction::Prescribe]);

        let mine = render_doctor_rows(&all, Some(2));
        assert_eq!(mine.len(), 1);
        assert!(mine[0].actions.is_empty());
    }

    #[test]
    fn test_pharmacist_rows() {
        let rows = render_pharmacist_rows(
            &doctors(),
            &[
                appt(1, 1, AppointmentStatus::Paid, ""),
                appt(2, 1, AppointmentStatus::Prescribed, "Aspirin 500mg"),
                appt(3, 2, AppointmentStatus::Dispensed, "Ibuprofen"),
            ],
        );
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].actions, vec![RowAction::Dispense]);
        assert_eq!(rows[0].doctor, "Dr. Vaibhav Anand");
        assert!(rows[1].actions.is_empty());
    }

    #[test]
    fn test_admin_rows_placeholders() {
        let rows = render_admin_rows(&doctors());
        assert_eq!(rows[0].experience, "12 Yrs");
        assert_eq!(rows[0].rating, "4.9");
        assert_eq!(rows[1].experience, "- Yrs");
        assert_eq!(rows[1].rating, "-");
    }
}
