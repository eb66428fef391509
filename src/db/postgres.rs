use async_trait::async_trait;
use sqlx::{PgConnection, PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use super::{ClinicStore, StatusChange, StoreError, StoreResult};
use crate::models::{
    Appointment, AppointmentPatch, AppointmentStatus, Doctor, DoctorPatch, NewAppointment, NewDoctor, NewSession,
    NewSlot, Role, Session, Slot,
};

const DOCTOR_COLUMNS: &str = "id, name, spec, rating, reviews, success_rate, experience";
const SLOT_COLUMNS: &str = "id, doctor_id, date_time, is_booked";
const APPOINTMENT_COLUMNS: &str = "id, patient, doctor_id, slot_id, date_time, status, prescription";

/// SQLSTATE raised by nextval/setval past the sequence bound.
const SEQUENCE_LIMIT_EXCEEDED: &str = "2200H";

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Picks the id for a new row. A client-supplied id pushes the sequence
/// past it so later server-assigned ids cannot collide with it.
async fn reserve_id(
    conn: &mut PgConnection,
    sequence: &str,
    collection: &'static str,
    requested: Option<i64>,
) -> StoreResult<i64> {
    let exhausted = |e: sqlx::Error| {
        if let sqlx::Error::Database(db) = &e {
            if db.code().as_deref() == Some(SEQUENCE_LIMIT_EXCEEDED) {
                return StoreError::IdExhausted { collection };
            }
        }
        StoreError::Database(e)
    };

    match requested {
        Some(i64::MAX) => Err(StoreError::IdExhausted { collection }),
        Some(id) => {
            sqlx::query(&format!(
                "SELECT setval('{sequence}', $1) FROM {sequence} WHERE $1 >= last_value"
            ))
            .bind(id)
            .execute(&mut *conn)
            .await?;
            Ok(id)
        }
        None => sqlx::query_scalar(&format!("SELECT nextval('{sequence}')"))
            .fetch_one(&mut *conn)
            .await
            .map_err(exhausted),
    }
}

fn insert_error(e: sqlx::Error, collection: &'static str, id: i64) -> StoreError {
    if let sqlx::Error::Database(db) = &e {
        if db.is_unique_violation() {
            return StoreError::DuplicateId { collection, id };
        }
    }
    StoreError::Database(e)
}

fn appointment_from_row(r: &PgRow) -> StoreResult<Appointment> {
    let status: String = r.try_get("status")?;
    Ok(Appointment {
        id: r.try_get("id")?,
        patient: r.try_get("patient")?,
        doctor_id: r.try_get("doctor_id")?,
        slot_id: r.try_get("slot_id")?,
        date_time: r.try_get("date_time")?,
        status: status.parse().map_err(StoreError::Decode)?,
        prescription: r.try_get("prescription")?,
    })
}

fn session_from_row(r: &PgRow) -> StoreResult<Session> {
    let role: String = r.try_get("role")?;
    Ok(Session {
        session_id: r.try_get("session_id")?,
        username: r.try_get("username")?,
        role: role.parse::<Role>().map_err(StoreError::Decode)?,
        expires_at: r.try_get("expires_at")?,
    })
}

#[async_trait]
impl ClinicStore for PgStore {
    async fn list_doctors(&self) -> StoreResult<Vec<Doctor>> {
        let rows = sqlx::query_as::<_, Doctor>(&format!(
            "SELECT {DOCTOR_COLUMNS} FROM doctor ORDER BY seq ASC"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn get_doctor(&self, id: i64) -> StoreResult<Option<Doctor>> {
        let row = sqlx::query_as::<_, Doctor>(&format!(
            "SELECT {DOCTOR_COLUMNS} FROM doctor WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn insert_doctor(&self, new: NewDoctor) -> StoreResult<Doctor> {
        let mut tx = self.pool.begin().await?;
        let id = reserve_id(&mut tx, "doctor_id_seq", "doctor", new.id).await?;

        let doctor = sqlx::query_as::<_, Doctor>(&format!(
            r#"
            INSERT INTO doctor (id, name, spec, rating, reviews, success_rate, experience)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {DOCTOR_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&new.name)
        .bind(&new.spec)
        .bind(new.rating)
        .bind(new.reviews)
        .bind(new.success_rate)
        .bind(new.experience)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| insert_error(e, "doctor", id))?;

        tx.commit().await?;
        Ok(doctor)
    }

    async fn update_doctor(&self, id: i64, patch: DoctorPatch) -> StoreResult<Doctor> {
        sqlx::query_as::<_, Doctor>(&format!(
            r#"
            UPDATE doctor
            SET
              name         = COALESCE($2, name),
              spec         = COALESCE($3, spec),
              rating       = COALESCE($4, rating),
              reviews      = COALESCE($5, reviews),
              success_rate = COALESCE($6, success_rate),
              experience   = COALESCE($7, experience)
            WHERE id = $1
            RETURNING {DOCTOR_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(patch.name)
        .bind(patch.spec)
        .bind(patch.rating)
        .bind(patch.reviews)
        .bind(patch.success_rate)
        .bind(patch.experience)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::DoctorNotFound(id))
    }

    async fn delete_doctor(&self, id: i64) -> StoreResult<()> {
        let res = sqlx::query("DELETE FROM doctor WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if res.rows_affected() == 0 {
            return Err(StoreError::DoctorNotFound(id));
        }
        Ok(())
    }

    async fn count_doctors(&self) -> StoreResult<i64> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM doctor")
            .fetch_one(&self.pool)
            .await?;
        Ok(n)
    }

    async fn list_slots(&self) -> StoreResult<Vec<Slot>> {
        let rows = sqlx::query_as::<_, Slot>(&format!(
            "SELECT {SLOT_COLUMNS} FROM slot ORDER BY seq ASC"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn insert_slot(&self, new: NewSlot) -> StoreResult<Slot> {
        let mut tx = self.pool.begin().await?;
        let id = reserve_id(&mut tx, "slot_id_seq", "slot", new.id).await?;

        let slot = sqlx::query_as::<_, Slot>(&format!(
            r#"
            INSERT INTO slot (id, doctor_id, date_time, is_booked)
            VALUES ($1, $2, $3, $4)
            RETURNING {SLOT_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(new.doctor_id)
        .bind(&new.date_time)
        .bind(new.is_booked)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| insert_error(e, "slot", id))?;

        tx.commit().await?;
        Ok(slot)
    }

    async fn set_slot_booked(&self, id: i64, is_booked: bool) -> StoreResult<Slot> {
        sqlx::query_as::<_, Slot>(&format!(
            "UPDATE slot SET is_booked = $2 WHERE id = $1 RETURNING {SLOT_COLUMNS}"
        ))
        .bind(id)
        .bind(is_booked)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::SlotNotFound(id))
    }

    async fn list_appointments(&self) -> StoreResult<Vec<Appointment>> {
        let rows = sqlx::query(&format!(
            "SELECT {APPOINTMENT_COLUMNS} FROM appointment ORDER BY seq ASC"
        ))
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(appointment_from_row).collect()
    }

    async fn get_appointment(&self, id: i64) -> StoreResult<Option<Appointment>> {
        let row = sqlx::query(&format!(
            "SELECT {APPOINTMENT_COLUMNS} FROM appointment WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(appointment_from_row).transpose()
    }

    async fn insert_appointment(&self, new: NewAppointment) -> StoreResult<Appointment> {
        let mut tx = self.pool.begin().await?;
        let id = reserve_id(&mut tx, "appointment_id_seq", "appointment", new.id).await?;

        let row = sqlx::query(&format!(
            r#"
            INSERT INTO appointment (id, patient, doctor_id, slot_id, date_time, status, prescription)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {APPOINTMENT_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&new.patient)
        .bind(new.doctor_id)
        .bind(new.slot_id)
        .bind(&new.date_time)
        .bind(new.status.as_str())
        .bind(&new.prescription)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| insert_error(e, "appointment", id))?;

        tx.commit().await?;
        appointment_from_row(&row)
    }

    async fn update_appointment(
        &self,
        id: i64,
        patch: AppointmentPatch,
    ) -> StoreResult<Appointment> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE appointment
            SET
              patient      = COALESCE($2, patient),
              doctor_id    = COALESCE($3, doctor_id),
              slot_id      = COALESCE($4, slot_id),
              date_time    = COALESCE($5, date_time),
              status       = COALESCE($6, status),
              prescription = COALESCE($7, prescription)
            WHERE id = $1
            RETURNING {APPOINTMENT_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(patch.patient)
        .bind(patch.doctor_id)
        .bind(patch.slot_id)
        .bind(patch.date_time)
        .bind(patch.status.map(|s| s.as_str()))
        .bind(patch.prescription)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::AppointmentNotFound(id))?;

        appointment_from_row(&row)
    }

    async fn delete_appointment(&self, id: i64) -> StoreResult<()> {
        let res = sqlx::query("DELETE FROM appointment WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if res.rows_affected() == 0 {
            return Err(StoreError::AppointmentNotFound(id));
        }
        Ok(())
    }

    async fn book_slot(&self, slot_id: i64, patient: &str) -> StoreResult<Appointment> {
        let mut tx = self.pool.begin().await?;

        // Conditional update: a concurrent booking blocks on the row lock and
        // then sees is_booked = true.
        let slot = sqlx::query_as::<_, Slot>(&format!(
            r#"
            UPDATE slot
            SET is_booked = true
            WHERE id = $1 AND is_booked = false
            RETURNING {SLOT_COLUMNS}
            "#
        ))
        .bind(slot_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(slot) = slot else {
            let exists: Option<i64> = sqlx::query_scalar("SELECT id FROM slot WHERE id = $1")
                .bind(slot_id)
                .fetch_optional(&mut *tx)
                .await?;
            return Err(match exists {
                Some(_) => StoreError::SlotAlreadyBooked(slot_id),
                None => StoreError::SlotNotFound(slot_id),
            });
        };

        let id = reserve_id(&mut tx, "appointment_id_seq", "appointment", None).await?;
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO appointment (id, patient, doctor_id, slot_id, date_time, status, prescription)
            VALUES ($1, $2, $3, $4, $5, 'Unpaid', '')
            RETURNING {APPOINTMENT_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(patient)
        .bind(slot.doctor_id)
        .bind(slot.id)
        .bind(&slot.date_time)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| insert_error(e, "appointment", id))?;
        let appointment = appointment_from_row(&row)?;

        tx.commit().await?;
        Ok(appointment)
    }

    async fn cancel_appointment(&self, id: i64) -> StoreResult<Appointment> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(&format!(
            "SELECT {APPOINTMENT_COLUMNS} FROM appointment WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(StoreError::AppointmentNotFound(id))?;
        let appointment = appointment_from_row(&row)?;

        if !appointment.status.is_cancellable() {
            return Err(StoreError::InvalidTransition {
                id,
                current: appointment.status,
                target: "Cancelled",
            });
        }

        sqlx::query("DELETE FROM appointment WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let freed = sqlx::query("UPDATE slot SET is_booked = false WHERE id = $1")
            .bind(appointment.slot_id)
            .execute(&mut *tx)
            .await?;
        if freed.rows_affected() == 0 {
            tracing::warn!(
                appointment_id = id,
                slot_id = appointment.slot_id,
                "cancelled appointment references a missing slot"
            );
        }

        tx.commit().await?;
        Ok(appointment)
    }

    async fn transition_appointment(
        &self,
        id: i64,
        change: StatusChange,
    ) -> StoreResult<Appointment> {
        let mut tx = self.pool.begin().await?;

        let current: Option<String> =
            sqlx::query_scalar("SELECT status FROM appointment WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
        let current: AppointmentStatus = current
            .ok_or(StoreError::AppointmentNotFound(id))?
            .parse()
            .map_err(StoreError::Decode)?;
        change.check(id, current)?;

        let row = sqlx::query(&format!(
            r#"
            UPDATE appointment
            SET status = $2,
                prescription = COALESCE($3, prescription)
            WHERE id = $1
            RETURNING {APPOINTMENT_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(change.to.as_str())
        .bind(change.prescription)
        .fetch_one(&mut *tx)
        .await?;
        let appointment = appointment_from_row(&row)?;

        tx.commit().await?;
        Ok(appointment)
    }

    async fn insert_session(&self, new: NewSession) -> StoreResult<Session> {
        let row = sqlx::query(
            r#"
            INSERT INTO session_token (session_token_hash, username, role, expires_at)
            VALUES ($1, $2, $3, $4)
            RETURNING session_id, username, role, expires_at
            "#,
        )
        .bind(&new.token_hash)
        .bind(&new.username)
        .bind(new.role.as_str())
        .bind(new.expires_at)
        .fetch_one(&self.pool)
        .await?;
        session_from_row(&row)
    }

    async fn find_active_session(&self, token_hash: &str) -> StoreResult<Option<Session>> {
        let row = sqlx::query(
            r#"
            SELECT session_id, username, role, expires_at
            FROM session_token
            WHERE session_token_hash = $1
              AND revoked_at IS NULL
              AND expires_at > now()
            "#,
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(session_from_row).transpose()
    }

    async fn touch_session(&self, session_id: Uuid) -> StoreResult<()> {
        sqlx::query("UPDATE session_token SET last_seen_at = now() WHERE session_id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn revoke_session(&self, session_id: Uuid) -> StoreResult<bool> {
        let res = sqlx::query(
            r#"
            UPDATE session_token
            SET revoked_at = now()
            WHERE session_id = $1
              AND revoked_at IS NULL
            "#,
        )
        .bind(session_id)
        .execute(&self.pool)
        .await?;
        Ok(res.rows_affected() > 0)
    }
}
