use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{ClinicStore, FIRST_ASSIGNED_ID, StatusChange, StoreError, StoreResult};
use crate::models::{
    Appointment, AppointmentPatch, AppointmentStatus, Doctor, DoctorPatch, NewAppointment,
    NewDoctor, NewSession, NewSlot, Session, Slot,
};

/// Monotonic id source that also steps past client-supplied ids.
#[derive(Debug)]
struct IdSequence {
    next: i64,
    collection: &'static str,
}

impl IdSequence {
    fn new(collection: &'static str) -> Self {
        IdSequence {
            next: FIRST_ASSIGNED_ID,
            collection,
        }
    }

    /// Never mutates the sequence when it returns an error.
    fn assign(&mut self, requested: Option<i64>) -> StoreResult<i64> {
        let id = requested.unwrap_or(self.next);
        if id >= self.next {
            self.next = id.checked_add(1).ok_or(StoreError::IdExhausted {
                collection: self.collection,
            })?;
        }
        Ok(id)
    }
}

#[derive(Debug)]
struct SessionEntry {
    session: Session,
    token_hash: String,
    revoked: bool,
}

#[derive(Debug)]
struct Tables {
    doctors: Vec<Doctor>,
    slots: Vec<Slot>,
    appointments: Vec<Appointment>,
    sessions: Vec<SessionEntry>,
    doctor_ids: IdSequence,
    slot_ids: IdSequence,
    appointment_ids: IdSequence,
}

/// In-process store. Every workflow operation holds the single write lock
/// for its whole duration, which makes it atomic with respect to other
/// requests.
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(Tables {
                doctors: Vec::new(),
                slots: Vec::new(),
                appointments: Vec::new(),
                sessions: Vec::new(),
                doctor_ids: IdSequence::new("doctor"),
                slot_ids: IdSequence::new("slot"),
                appointment_ids: IdSequence::new("appointment"),
            }),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ClinicStore for MemoryStore {
    async fn list_doctors(&self) -> StoreResult<Vec<Doctor>> {
        Ok(self.tables.read().await.doctors.clone())
    }

    async fn get_doctor(&self, id: i64) -> StoreResult<Option<Doctor>> {
        let t = self.tables.read().await;
        Ok(t.doctors.iter().find(|d| d.id == id).cloned())
    }

    async fn insert_doctor(&self, new: NewDoctor) -> StoreResult<Doctor> {
        let mut t = self.tables.write().await;
        if let Some(id) = new.id {
            if t.doctors.iter().any(|d| d.id == id) {
                return Err(StoreError::DuplicateId { collection: "doctor", id });
            }
        }
        let doctor = Doctor {
            id: t.doctor_ids.assign(new.id)?,
            name: new.name,
            spec: new.spec,
            rating: new.rating,
            reviews: new.reviews,
            success_rate: new.success_rate,
            experience: new.experience,
        };
        t.doctors.push(doctor.clone());
        Ok(doctor)
    }

    async fn update_doctor(&self, id: i64, patch: DoctorPatch) -> StoreResult<Doctor> {
        let mut t = self.tables.write().await;
        let doctor = t
            .doctors
            .iter_mut()
            .find(|d| d.id == id)
            .ok_or(StoreError::DoctorNotFound(id))?;

        if let Some(name) = patch.name {
            doctor.name = name;
        }
        if let Some(spec) = patch.spec {
            doctor.spec = spec;
        }
        if patch.rating.is_some() {
            doctor.rating = patch.rating;
        }
        if patch.reviews.is_some() {
            doctor.reviews = patch.reviews;
        }
        if patch.success_rate.is_some() {
            doctor.success_rate = patch.success_rate;
        }
        if patch.experience.is_some() {
            doctor.experience = patch.experience;
        }
        Ok(doctor.clone())
    }

    async fn delete_doctor(&self, id: i64) -> StoreResult<()> {
        let mut t = self.tables.write().await;
        let before = t.doctors.len();
        t.doctors.retain(|d| d.id != id);
        if t.doctors.len() == before {
            return Err(StoreError::DoctorNotFound(id));
        }
        Ok(())
    }

    async fn count_doctors(&self) -> StoreResult<i64> {
        Ok(self.tables.read().await.doctors.len() as i64)
    }

    async fn list_slots(&self) -> StoreResult<Vec<Slot>> {
        Ok(self.tables.read().await.slots.clone())
    }

    async fn insert_slot(&self, new: NewSlot) -> StoreResult<Slot> {
        let mut t = self.tables.write().await;
        if let Some(id) = new.id {
            if t.slots.iter().any(|s| s.id == id) {
                return Err(StoreError::DuplicateId { collection: "slot", id });
            }
        }
        let slot = Slot {
            id: t.slot_ids.assign(new.id)?,
            doctor_id: new.doctor_id,
            date_time: new.date_time,
            is_booked: new.is_booked,
        };
        t.slots.push(slot.clone());
        Ok(slot)
    }

    async fn set_slot_booked(&self, id: i64, is_booked: bool) -> StoreResult<Slot> {
        let mut t = self.tables.write().await;
        let slot = t
            .slots
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or(StoreError::SlotNotFound(id))?;
        slot.is_booked = is_booked;
        Ok(slot.clone())
    }

    async fn list_appointments(&self) -> StoreResult<Vec<Appointment>> {
        Ok(self.tables.read().await.appointments.clone())
    }

    async fn get_appointment(&self, id: i64) -> StoreResult<Option<Appointment>> {
        let t = self.tables.read().await;
        Ok(t.appointments.iter().find(|a| a.id == id).cloned())
    }

    async fn insert_appointment(&self, new: NewAppointment) -> StoreResult<Appointment> {
        let mut t = self.tables.write().await;
        if let Some(id) = new.id {
            if t.appointments.iter().any(|a| a.id == id) {
                return Err(StoreError::DuplicateId { collection: "appointment", id });
            }
        }
        let appointment = Appointment {
            id: t.appointment_ids.assign(new.id)?,
            patient: new.patient,
            doctor_id: new.doctor_id,
            slot_id: new.slot_id,
            date_time: new.date_time,
            status: new.status,
            prescription: new.prescription,
        };
        t.appointments.push(appointment.clone());
        Ok(appointment)
    }

    async fn update_appointment(
        &self,
        id: i64,
        patch: AppointmentPatch,
    ) -> StoreResult<Appointment> {
        let mut t = self.tables.write().await;
        let appt = t
            .appointments
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or(StoreError::AppointmentNotFound(id))?;

        if let Some(patient) = patch.patient {
            appt.patient = patient;
        }
        if let Some(doctor_id) = patch.doctor_id {
            appt.doctor_id = doctor_id;
        }
        if let Some(slot_id) = patch.slot_id {
            appt.slot_id = slot_id;
        }
        if let Some(date_time) = patch.date_time {
            appt.date_time = date_time;
        }
        if let Some(status) = patch.status {
            appt.status = status;
        }
        if let Some(prescription) = patch.prescription {
            appt.prescription = prescription;
        }
        Ok(appt.clone())
    }

    async fn delete_appointment(&self, id: i64) -> StoreResult<()> {
        let mut t = self.tables.write().await;
        let before = t.appointments.len();
        t.appointments.retain(|a| a.id != id);
        if t.appointments.len() == before {
            return Err(StoreError::AppointmentNotFound(id));
        }
        Ok(())
    }

    async fn book_slot(&self, slot_id: i64, patient: &str) -> StoreResult<Appointment> {
        let mut t = self.tables.write().await;
        let idx = t
            .slots
            .iter()
            .position(|s| s.id == slot_id)
            .ok_or(StoreError::SlotNotFound(slot_id))?;
        if t.slots[idx].is_booked {
            return Err(StoreError::SlotAlreadyBooked(slot_id));
        }

        // Reserve the id first so a failure leaves the slot free.
        let id = t.appointment_ids.assign(None)?;
        let slot = &mut t.slots[idx];
        slot.is_booked = true;
        let (doctor_id, date_time) = (slot.doctor_id, slot.date_time.clone());

        let appointment = Appointment {
            id,
            patient: patient.to_string(),
            doctor_id,
            slot_id,
            date_time,
            status: AppointmentStatus::Unpaid,
            prescription: String::new(),
        };
        t.appointments.push(appointment.clone());
        Ok(appointment)
    }

    async fn cancel_appointment(&self, id: i64) -> StoreResult<Appointment> {
        let mut t = self.tables.write().await;
        let idx = t
            .appointments
            .iter()
            .position(|a| a.id == id)
            .ok_or(StoreError::AppointmentNotFound(id))?;

        let current = t.appointments[idx].status;
        if !current.is_cancellable() {
            return Err(StoreError::InvalidTransition {
                id,
                current,
                target: "Cancelled",
            });
        }

        let removed = t.appointments.remove(idx);
        match t.slots.iter_mut().find(|s| s.id == removed.slot_id) {
            Some(slot) => slot.is_booked = false,
            None => tracing::warn!(
                appointment_id = id,
                slot_id = removed.slot_id,
                "cancelled appointment references a missing slot"
            ),
        }
        Ok(removed)
    }

    async fn transition_appointment(
        &self,
        id: i64,
        change: StatusChange,
    ) -> StoreResult<Appointment> {
        let mut t = self.tables.write().await;
        let appt = t
            .appointments
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or(StoreError::AppointmentNotFound(id))?;

        change.check(id, appt.status)?;
        appt.status = change.to;
        if let Some(text) = change.prescription {
            appt.prescription = text;
        }
        Ok(appt.clone())
    }

    async fn insert_session(&self, new: NewSession) -> StoreResult<Session> {
        let now = Utc::now();
        let mut t = self.tables.write().await;
        t.sessions.retain(|e| !e.revoked && e.session.expires_at > now);

        let session = Session {
            session_id: Uuid::new_v4(),
            username: new.username,
            role: new.role,
            expires_at: new.expires_at,
        };
        t.sessions.push(SessionEntry {
            session: session.clone(),
            token_hash: new.token_hash,
            revoked: false,
        });
        Ok(session)
    }

    async fn find_active_session(&self, token_hash: &str) -> StoreResult<Option<Session>> {
        let now = Utc::now();
        let t = self.tables.read().await;
        Ok(t.sessions
            .iter()
            .find(|e| e.token_hash == token_hash && !e.revoked && e.session.expires_at > now)
            .map(|e| e.session.clone()))
    }

    async fn touch_session(&self, _session_id: Uuid) -> StoreResult<()> {
        Ok(())
    }

    async fn revoke_session(&self, session_id: Uuid) -> StoreResult<bool> {
        let mut t = self.tables.write().await;
        match t
            .sessions
            .iter_mut()
            .find(|e| e.session.session_id == session_id && !e.revoked)
        {
            Some(entry) => {
                entry.revoked = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Duration;

    use super::*;
    use crate::db::seed_if_empty;
    use crate::models::Role;

    async fn seeded() -> MemoryStore {
        let store = MemoryStore::new();
        seed_if_empty(&store).await.unwrap();
        store
    }

    #[tokio::test]
    async fn test_book_free_slot() {
        let store = seeded().await;
        let appt = store.book_slot(101, "Alice").await.unwrap();

        assert_eq!(appt.status, AppointmentStatus::Unpaid);
        assert_eq!(appt.doctor_id, 1);
        assert_eq!(appt.slot_id, 101);
        assert_eq!(appt.date_time, "2025-12-20T10:00");
        assert_eq!(appt.prescription, "");

        let slots = store.list_slots().await.unwrap();
        assert!(slots.iter().find(|s| s.id == 101).unwrap().is_booked);
    }

    #[tokio::test]
    async fn test_book_rejects_booked_and_missing_slots() {
        let store = seeded().await;
        store.book_slot(102, "Alice").await.unwrap();

        assert!(matches!(
            store.book_slot(102, "Bob").await,
            Err(StoreError::SlotAlreadyBooked(102))
        ));
        assert!(matches!(
            store.book_slot(999, "Bob").await,
            Err(StoreError::SlotNotFound(999))
        ));
        assert_eq!(store.list_appointments().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_bookings_only_one_wins() {
        let store = Arc::new(seeded().await);
        let a = {
            let store = store.clone();
            tokio::spawn(async move { store.book_slot(103, "Alice").await })
        };
        let b = {
            let store = store.clone();
            tokio::spawn(async move { store.book_slot(103, "Bob").await })
        };

        let results = [a.await.unwrap(), b.await.unwrap()];
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert_eq!(store.list_appointments().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_cancel_frees_slot_and_slot_is_reusable() {
        let store = seeded().await;
        let appt = store.book_slot(101, "Alice").await.unwrap();

        let removed = store.cancel_appointment(appt.id).await.unwrap();
        assert_eq!(removed.id, appt.id);
        assert!(store.get_appointment(appt.id).await.unwrap().is_none());
        let slots = store.list_slots().await.unwrap();
        assert!(!slots.iter().find(|s| s.id == 101).unwrap().is_booked);

        let again = store.book_slot(101, "Bob").await.unwrap();
        assert_ne!(again.id, appt.id);
    }

    #[tokio::test]
    async fn test_cancel_after_prescription_is_rejected() {
        let store = seeded().await;
        let appt = store.book_slot(101, "Alice").await.unwrap();
        store.transition_appointment(appt.id, StatusChange::pay()).await.unwrap();
        store
            .transition_appointment(appt.id, StatusChange::prescribe("Aspirin 500mg".into()))
            .await
            .unwrap();

        let err = store.cancel_appointment(appt.id).await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidTransition { current: AppointmentStatus::Prescribed, .. }));
        assert!(store.get_appointment(appt.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_transition_chain() {
        let store = seeded().await;
        let appt = store.book_slot(101, "Alice").await.unwrap();

        let paid = store.transition_appointment(appt.id, StatusChange::pay()).await.unwrap();
        assert_eq!(paid.status, AppointmentStatus::Paid);

        let rx = store
            .transition_appointment(appt.id, StatusChange::prescribe("Aspirin 500mg".into()))
            .await
            .unwrap();
        assert_eq!(rx.status, AppointmentStatus::Prescribed);
        assert_eq!(rx.prescription, "Aspirin 500mg");

        let done = store.transition_appointment(appt.id, StatusChange::dispense()).await.unwrap();
        assert_eq!(done.status, AppointmentStatus::Dispensed);
        assert_eq!(done.prescription, "Aspirin 500mg");

        assert!(store.transition_appointment(appt.id, StatusChange::dispense()).await.is_err());
    }

    #[tokio::test]
    async fn test_server_assigned_ids_skip_client_ids() {
        let store = MemoryStore::new();
        let first = store.insert_doctor(NewDoctor::default()).await.unwrap();
        assert_eq!(first.id, FIRST_ASSIGNED_ID);

        let explicit = NewDoctor {
            id: Some(5000),
            ..Default::default()
        };
        store.insert_doctor(explicit.clone()).await.unwrap();
        let next = store.insert_doctor(NewDoctor::default()).await.unwrap();
        assert_eq!(next.id, 5001);

        assert!(matches!(
            store.insert_doctor(explicit).await,
            Err(StoreError::DuplicateId { collection: "doctor", id: 5000 })
        ));
    }

    #[tokio::test]
    async fn test_partial_doctor_update_keeps_other_fields() {
        let store = seeded().await;
        let patch = DoctorPatch {
            name: Some("Dr. V. Anand".into()),
            experience: Some(13),
            ..Default::default()
        };
        let doc = store.update_doctor(1, patch).await.unwrap();
        assert_eq!(doc.name, "Dr. V. Anand");
        assert_eq!(doc.experience, Some(13));
        assert_eq!(doc.reviews, Some(120));
        assert_eq!(doc.success_rate, Some(98));
    }

    #[tokio::test]
    async fn test_sessions_expire_and_revoke() {
        let store = MemoryStore::new();
        let live = store
            .insert_session(NewSession {
                token_hash: "live".into(),
                username: "alice".into(),
                role: Role::Patient,
                expires_at: Utc::now() + Duration::hours(1),
            })
            .await
            .unwrap();
        store
            .insert_session(NewSession {
                token_hash: "stale".into(),
                username: "bob".into(),
                role: Role::Doctor,
                expires_at: Utc::now() - Duration::hours(1),
            })
            .await
            .unwrap();

        assert!(store.find_active_session("stale").await.unwrap().is_none());
        assert_eq!(
            store.find_active_session("live").await.unwrap().unwrap().session_id,
            live.session_id
        );

        assert!(store.revoke_session(live.session_id).await.unwrap());
        assert!(!store.revoke_session(live.session_id).await.unwrap());
        assert!(store.find_active_session("live").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_max_client_id_is_rejected_without_breaking_sequence() {
        let store = MemoryStore::new();
        let at_max = NewDoctor {
            id: Some(i64::MAX),
            ..Default::default()
        };
        assert!(matches!(
            store.insert_doctor(at_max).await,
            Err(StoreError::IdExhausted { collection: "doctor" })
        ));
        assert_eq!(store.count_doctors().await.unwrap(), 0);

        let next = store.insert_doctor(NewDoctor::default()).await.unwrap();
        assert_eq!(next.id, FIRST_ASSIGNED_ID);
    }

    #[test]
    fn test_id_sequence_stops_before_overflow() {
        let mut ids = IdSequence::new("slot");
        assert_eq!(ids.assign(Some(i64::MAX - 1)).unwrap(), i64::MAX - 1);
        assert!(matches!(
            ids.assign(None),
            Err(StoreError::IdExhausted { collection: "slot" })
        ));
        assert_eq!(ids.assign(Some(7)).unwrap(), 7);
    }

    #[tokio::test]
    async fn test_exhausted_ids_leave_slot_free() {
        let store = seeded().await;
        store
            .insert_appointment(NewAppointment {
                id: Some(i64::MAX - 1),
                ..Default::default()
            })
            .await
            .unwrap();

        assert!(matches!(
            store.book_slot(101, "Alice").await,
            Err(StoreError::IdExhausted { collection: "appointment" })
        ));
        let slots = store.list_slots().await.unwrap();
        assert!(!slots.iter().find(|s| s.id == 101).unwrap().is_booked);
    }

    #[tokio::test]
    async fn test_new_session_prunes_dead_entries() {
        let store = MemoryStore::new();
        let session = |hash: &str, expires_at| NewSession {
            token_hash: hash.into(),
            username: "alice".into(),
            role: Role::Patient,
            expires_at,
        };

        store
            .insert_session(session("stale", Utc::now() - Duration::hours(1)))
            .await
            .unwrap();
        let revoked = store
            .insert_session(session("revoked", Utc::now() + Duration::hours(1)))
            .await
            .unwrap();
        store.revoke_session(revoked.session_id).await.unwrap();
        store
            .insert_session(session("live", Utc::now() + Duration::hours(1)))
            .await
            .unwrap();

        let t = store.tables.read().await;
        let hashes: Vec<&str> = t.sessions.iter().map(|e| e.token_hash.as_str()).collect();
        assert_eq!(hashes, vec!["live"]);
    }
}
