use std::sync::Arc;

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use uuid::Uuid;

use crate::config::{Config, StoreBackend};
use crate::models::{
    Appointment, AppointmentPatch, AppointmentStatus, Doctor, DoctorPatch, NewAppointment,
    NewDoctor, NewSession, NewSlot, Session, Slot,
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// First identifier handed out when a create request omits `id`.
/// Seed records use ids below this.
pub const FIRST_ASSIGNED_ID: i64 = 1000;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("db error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("{collection} with id {id} already exists")]
    DuplicateId { collection: &'static str, id: i64 },

    #[error("no {collection} ids left to assign")]
    IdExhausted { collection: &'static str },

    #[error("doctor {0} not found")]
    DoctorNotFound(i64),

    #[error("slot {0} not found")]
    SlotNotFound(i64),

    #[error("slot {0} is already booked")]
    SlotAlreadyBooked(i64),

    #[error("appointment {0} not found")]
    AppointmentNotFound(i64),

    #[error("appointment {id} is {current}, cannot move to {target}")]
    InvalidTransition {
        id: i64,
        current: AppointmentStatus,
        target: &'static str,
    },

    #[error("row decode error: {0}")]
    Decode(String),
}

/// A guarded status change: applied only when the stored status is one of `from`.
#[derive(Debug, Clone)]
pub struct StatusChange {
    pub from: &'static [AppointmentStatus],
    pub to: AppointmentStatus,
    pub prescription: Option<String>,
}

impl StatusChange {
    pub fn pay() -> Self {
        Self {
            from: &[AppointmentStatus::Unpaid],
            to: AppointmentStatus::Paid,
            prescription: None,
        }
    }

    pub fn prescribe(text: String) -> Self {
        Self {
            from: &[AppointmentStatus::Paid],
            to: AppointmentStatus::Prescribed,
            prescription: Some(text),
        }
    }

    pub fn dispense() -> Self {
        Self {
            from: &[AppointmentStatus::Prescribed],
            to: AppointmentStatus::Dispensed,
            prescription: None,
        }
    }

    fn check(&self, id: i64, current: AppointmentStatus) -> StoreResult<()> {
        if self.from.contains(&current) {
            Ok(())
        } else {
            Err(StoreError::InvalidTransition {
                id,
                current,
                target: self.to.as_str(),
            })
        }
    }
}

/// Persistence seam for doctors, slots, appointments and sessions.
///
/// Plain record operations are independent writes with last-write-wins
/// semantics. `book_slot`, `cancel_appointment` and `transition_appointment`
/// each run as one atomic unit.
#[async_trait]
pub trait ClinicStore: Send + Sync {
    async fn list_doctors(&self) -> StoreResult<Vec<Doctor>>;
    async fn get_doctor(&self, id: i64) -> StoreResult<Option<Doctor>>;
    async fn insert_doctor(&self, new: NewDoctor) -> StoreResult<Doctor>;
    async fn update_doctor(&self, id: i64, patch: DoctorPatch) -> StoreResult<Doctor>;
    async fn delete_doctor(&self, id: i64) -> StoreResult<()>;
    async fn count_doctors(&self) -> StoreResult<i64>;

    async fn list_slots(&self) -> StoreResult<Vec<Slot>>;
    async fn insert_slot(&self, new: NewSlot) -> StoreResult<Slot>;
    async fn set_slot_booked(&self, id: i64, is_booked: bool) -> StoreResult<Slot>;

    async fn list_appointments(&self) -> StoreResult<Vec<Appointment>>;
    async fn get_appointment(&self, id: i64) -> StoreResult<Option<Appointment>>;
    async fn insert_appointment(&self, new: NewAppointment) -> StoreResult<Appointment>;
    async fn update_appointment(&self, id: i64, patch: AppointmentPatch)
        -> StoreResult<Appointment>;
    async fn delete_appointment(&self, id: i64) -> StoreResult<()>;

    /// Marks the slot booked (only if it is free) and creates an Unpaid
    /// appointment copying the slot's doctor and date-time.
    async fn book_slot(&self, slot_id: i64, patient: &str) -> StoreResult<Appointment>;

    /// Deletes a cancellable appointment and frees its slot. Returns the
    /// deleted record.
    async fn cancel_appointment(&self, id: i64) -> StoreResult<Appointment>;

    async fn transition_appointment(&self, id: i64, change: StatusChange)
        -> StoreResult<Appointment>;

    async fn insert_session(&self, new: NewSession) -> StoreResult<Session>;
    /// Looks up a session that is neither revoked nor expired.
    async fn find_active_session(&self, token_hash: &str) -> StoreResult<Option<Session>>;
    async fn touch_session(&self, session_id: Uuid) -> StoreResult<()>;
    /// Returns false when the session was already revoked.
    async fn revoke_session(&self, session_id: Uuid) -> StoreResult<bool>;
}

pub async fn connect_pg(database_url: &str) -> anyhow::Result<sqlx::PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;
    Ok(pool)
}

pub async fn build_store(cfg: &Config) -> anyhow::Result<Arc<dyn ClinicStore>> {
    match cfg.store_backend {
        StoreBackend::Postgres => {
            let database_url = cfg
                .database_url
                .as_deref()
                .ok_or_else(|| anyhow::anyhow!("DATABASE_URL is required for the postgres backend"))?;
            let pool = connect_pg(database_url).await?;
            Ok(Arc::new(PgStore::new(pool)))
        }
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory store; data is lost on restart");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

/// Inserts the starter doctors and slots when the doctor collection is empty.
/// Returns whether anything was written.
pub async fn seed_if_empty(store: &dyn ClinicStore) -> StoreResult<bool> {
    if store.count_doctors().await? > 0 {
        return Ok(false);
    }

    tracing::info!("Seeding initial doctors and slots");
    for doctor in seed_doctors() {
        store.insert_doctor(doctor).await?;
    }
    for slot in seed_slots() {
        store.insert_slot(slot).await?;
    }
    Ok(true)
}

pub fn seed_doctors() -> Vec<NewDoctor> {
    let doctor = |id: i64, name: &str, spec: &str, rating: f64, reviews: i32, success: i32, exp: i32| {
        NewDoctor {
            id: Some(id),
            name: name.to_string(),
            spec: spec.to_string(),
            rating: Some(rating),
            reviews: Some(reviews),
            success_rate: Some(success),
            experience: Some(exp),
        }
    };

    vec![
        doctor(1, "Dr. Vaibhav Anand", "Cardiology", 4.9, 120, 98, 12),
        doctor(2, "Dr. Riyan Akbar", "Neurologist", 4.8, 85, 95, 8),
        doctor(3, "Dr. Tanay Sinha", "General Physician", 4.7, 200, 99, 15),
    ]
}

pub fn seed_slots() -> Vec<NewSlot> {
    let slot = |id: i64, doctor_id: i64, date_time: &str| NewSlot {
        id: Some(id),
        doctor_id,
        date_time: date_time.to_string(),
        is_booked: false,
    };

    vec![
        slot(101, 1, "2025-12-20T10:00"),
        slot(102, 1, "2025-12-20T11:00"),
        slot(103, 2, "2025-12-21T09:00"),
    ]
}
