//! Medbook record types shared by the store, services and API

use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::Row;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::engine::lifecycle::AppointmentStatus;
use crate::engine::rbac::{Caller, Role};

pub type UserId = i64;
pub type AppointmentId = i64;

/// A stored account, including the password hash. Never serialized.
#[derive(Debug, Clone)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub username: String,
    pub password_hash: String,
    pub full_name: String,
    pub role: Role,
    pub phone: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub const COLUMNS: &'static str =
        "id, email, username, password, full_name, role, phone, created_at";

    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            email: row.get(1)?,
            username: row.get(2)?,
            password_hash: row.get(3)?,
            full_name: row.get(4)?,
            role: row.get(5)?,
            phone: row.get(6)?,
            created_at: row.get(7)?,
        })
    }

    pub fn caller(&self) -> Caller {
        Caller::new(self.id, self.role)
    }

    pub fn summary(&self) -> UserSummary {
        UserSummary {
            id: self.id,
            email: self.email.clone(),
            username: self.username.clone(),
            full_name: self.full_name.clone(),
            role: self.role,
            phone: self.phone.clone(),
            created_at: self.created_at,
        }
    }
}

/// Public view of an account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct UserSummary {
    pub id: UserId,
    pub email: String,
    pub username: String,
    pub full_name: String,
    pub role: Role,
    pub phone: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Doctor entry of the public directory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct DoctorSummary {
    pub id: UserId,
    pub username: String,
    pub full_name: String,
    pub email: String,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Appointment {
    pub id: AppointmentId,
    pub patient_id: UserId,
    pub doctor_id: UserId,
    #[schema(value_type = String, example = "2025-06-01T10:00:00")]
    pub appointment_date: NaiveDateTime,
    pub reason: Option<String>,
    pub status: AppointmentStatus,
    pub created_at: DateTime<Utc>,
}

impl Appointment {
    pub const COLUMNS: &'static str =
        "a.id, a.patient_id, a.doctor_id, a.appointment_date, a.reason, a.status, a.created_at";

    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            patient_id: row.get(1)?,
            doctor_id: row.get(2)?,
            appointment_date: row.get(3)?,
            reason: row.get(4)?,
            status: row.get(5)?,
            created_at: row.get(6)?,
        })
    }
}

/// Appointment joined with both parties' contact details
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct AppointmentDetails {
    #[serde(flatten)]
    pub appointment: Appointment,
    pub doctor_name: String,
    pub doctor_email: String,
    pub doctor_phone: Option<String>,
    pub patient_name: String,
    pub patient_email: String,
    pub patient_phone: Option<String>,
}

impl AppointmentDetails {
    pub const COLUMNS: &'static str = "a.id, a.patient_id, a.doctor_id, a.appointment_date, a.reason, a.status, a.created_at, \
         d.full_name, d.email, d.phone, p.full_name, p.email, p.phone";

    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            appointment: Appointment::from_row(row)?,
            doctor_name: row.get(7)?,
            doctor_email: row.get(8)?,
            doctor_phone: row.get(9)?,
            patient_name: row.get(10)?,
            patient_email: row.get(11)?,
            patient_phone: row.get(12)?,
        })
    }
}

impl ToSql for Role {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for Role {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|_| FromSqlError::InvalidType)
    }
}

impl ToSql for AppointmentStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for AppointmentStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|_| FromSqlError::InvalidType)
    }
}
