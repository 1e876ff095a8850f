//! Appointment record queries

use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::engine::lifecycle::AppointmentStatus;
use crate::engine::models::{Appointment, AppointmentDetails, AppointmentId, UserId};
use crate::engine::rbac::AppointmentScope;

const DETAILS_FROM: &str = "FROM appointments a
     JOIN users d ON d.id = a.doctor_id
     JOIN users p ON p.id = a.patient_id";

#[derive(Debug, Clone)]
pub struct NewAppointment<'a> {
    pub patient_id: UserId,
    pub doctor_id: UserId,
    pub appointment_date: NaiveDateTime,
    pub reason: Option<&'a str>,
    pub created_at: DateTime<Utc>,
}

/// Per-doctor appointment counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct StatusCounts {
    pub total: i64,
    pub pending: i64,
    pub confirmed: i64,
    pub completed: i64,
    pub cancelled: i64,
}

pub fn insert(conn: &Connection, appt: &NewAppointment<'_>) -> rusqlite::Result<AppointmentId> {
    conn.execute(
        "INSERT INTO appointments (patient_id, doctor_id, appointment_date, reason, status, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            appt.patient_id,
            appt.doctor_id,
            appt.appointment_date,
            appt.reason,
            AppointmentStatus::Pending,
            appt.created_at
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn find_by_id(conn: &Connection, id: AppointmentId) -> rusqlite::Result<Option<Appointment>> {
    conn.query_row(
        &format!("SELECT {} FROM appointments a WHERE a.id = ?1", Appointment::COLUMNS),
        params![id],
        Appointment::from_row,
    )
    .optional()
}

pub fn find_details(conn: &Connection, id: AppointmentId) -> rusqlite::Result<Option<AppointmentDetails>> {
    conn.query_row(
        &format!(
            "SELECT {} {} WHERE a.id = ?1",
            AppointmentDetails::COLUMNS,
            DETAILS_FROM
        ),
        params![id],
        AppointmentDetails::from_row,
    )
    .optional()
}

/// Appointments visible under `scope`, latest appointment date first.
pub fn list(conn: &Connection, scope: AppointmentScope) -> rusqlite::Result<Vec<AppointmentDetails>> {
    let (filter, owner) = match scope {
        AppointmentScope::All => ("", None),
        AppointmentScope::AsPatient(id) => ("WHERE a.patient_id = ?1", Some(id)),
        AppointmentScope::AsDoctor(id) => ("WHERE a.doctor_id = ?1", Some(id)),
    };
    let sql = format!(
        "SELECT {} {} {} ORDER BY a.appointment_date DESC, a.id DESC",
        AppointmentDetails::COLUMNS,
        DETAILS_FROM,
        filter
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = match owner {
        Some(id) => stmt.query_map(params![id], AppointmentDetails::from_row)?,
        None => stmt.query_map([], AppointmentDetails::from_row)?,
    };
    rows.collect()
}

/// Move `id` from `from` to `to` only if it still holds `from`.
/// Returns false when another writer changed the status first.
pub fn update_status(
    conn: &Connection,
    id: AppointmentId,
    from: AppointmentStatus,
    to: AppointmentStatus,
) -> rusqlite::Result<bool> {
    let changed = conn.execute(
        "UPDATE appointments SET status = ?1 WHERE id = ?2 AND status = ?3",
        params![to, id, from],
    )?;
    Ok(changed == 1)
}

pub fn delete(conn: &Connection, id: AppointmentId) -> rusqlite::Result<usize> {
    conn.execute("DELETE FROM appointments WHERE id = ?1", params![id])
}

pub fn counts_for_doctor(conn: &Connection, doctor_id: UserId) -> rusqlite::Result<StatusCounts> {
    let mut stmt = conn.prepare(
        "SELECT status, COUNT(*) FROM appointments WHERE doctor_id = ?1 GROUP BY status",
    )?;
    let rows = stmt.query_map(params![doctor_id], |row| {
        Ok((row.get::<_, AppointmentStatus>(0)?, row.get::<_, i64>(1)?))
    })?;

    let mut counts = StatusCounts::default();
    for row in rows {
        let (status, n) = row?;
        counts.total += n;
        match status {
            AppointmentStatus::Pending => counts.pending = n,
            AppointmentStatus::Confirmed => counts.confirmed = n,
            AppointmentStatus::Completed => counts.completed = n,
            AppointmentStatus::Cancelled => counts.cancelled = n,
        }
    }
    Ok(counts)
}

/// Non-cancelled appointments of `doctor_id` scheduled at or after `now`.
pub fn count_upcoming_for_doctor(
    conn: &Connection,
    doctor_id: UserId,
    now: NaiveDateTime,
) -> rusqlite::Result<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM appointments
         WHERE doctor_id = ?1 AND appointment_date >= ?2 AND status != 'cancelled'",
        params![doctor_id, now],
        |row| row.get(0),
    )
}

pub fn count_by_status(conn: &Connection) -> rusqlite::Result<Vec<(AppointmentStatus, i64)>> {
    let mut stmt =
        conn.prepare("SELECT status, COUNT(*) FROM appointments GROUP BY status ORDER BY status")?;
    let counts = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(counts)
}

pub fn count_total(conn: &Connection) -> rusqlite::Result<i64> {
    conn.query_row("SELECT COUNT(*) FROM appointments", [], |row| row.get(0))
}

/// Appointments created within `window` before `now`.
pub fn count_created_since(conn: &Connection, now: DateTime<Utc>, window: Duration) -> rusqlite::Result<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM appointments WHERE created_at >= ?1",
        params![now - window],
        |row| row.get(0),
    )
}
