//! Appointment records service

use chrono::Utc;
use rusqlite::TransactionBehavior;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::engine::database::Database;
use crate::engine::error::{AppError, AppResult};
use crate::engine::lifecycle::{self, AppointmentStatus, Relation};
use crate::engine::models::{Appointment, AppointmentDetails, AppointmentId, UserId};
use crate::engine::rbac::{Action, AppointmentScope, Caller, Enforcer, Resource, Role};
use crate::engine::store::appointments::{self as appointment_store, NewAppointment};
use crate::engine::store::users as user_store;
use crate::engine::validate;

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct CreateAppointmentRequest {
    pub doctor_id: Option<UserId>,
    /// `YYYY-MM-DDTHH:MM[:SS]` or RFC 3339
    pub appointment_date: Option<String>,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct UpdateStatusRequest {
    pub status: Option<String>,
}

struct Booking<'a> {
    doctor_id: UserId,
    appointment_date: chrono::NaiveDateTime,
    reason: Option<&'a str>,
}

impl CreateAppointmentRequest {
    fn validate(&self) -> AppResult<Booking<'_>> {
        let (doctor_id, date) = match (self.doctor_id, validate::optional(self.appointment_date.as_deref())) {
            (Some(doctor_id), Some(date)) => (doctor_id, date),
            _ => return Err(AppError::validation("Doctor and date are required")),
        };
        Ok(Booking {
            doctor_id,
            appointment_date: validate::appointment_date(date)?,
            reason: validate::optional(self.reason.as_deref()),
        })
    }
}

impl UpdateStatusRequest {
    fn target(&self) -> AppResult<AppointmentStatus> {
        validate::required(self.status.as_deref(), "status")?.parse()
    }
}

#[derive(Clone)]
pub struct AppointmentsService {
    db: Database,
}

impl AppointmentsService {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Book an appointment; the caller becomes the patient and the
    /// appointment starts `pending`.
    pub fn create(&self, caller: &Caller, request: &CreateAppointmentRequest) -> AppResult<Appointment> {
        Enforcer::authorize(caller, Action::Create, &Resource::Appointments)?;
        let booking = request.validate()?;

        let mut conn = self.db.get_connection()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let doctor = user_store::find_by_id(&tx, booking.doctor_id)?
            .ok_or_else(|| AppError::not_found("Doctor not found"))?;
        if doctor.role != Role::Doctor {
            return Err(AppError::validation("Selected user is not a doctor"));
        }

        let id = appointment_store::insert(
            &tx,
            &NewAppointment {
                patient_id: caller.id,
                doctor_id: doctor.id,
                appointment_date: booking.appointment_date,
                reason: booking.reason,
                created_at: Utc::now(),
            },
        )?;
        let appointment = appointment_store::find_by_id(&tx, id)?
            .ok_or_else(|| AppError::Internal(format!("appointment {} vanished after insert", id)))?;
        tx.commit()?;

        tracing::info!(appointment_id = id, patient = caller.id, doctor = doctor.id, "appointment booked");
        Ok(appointment)
    }

    /// Appointments visible to the caller, latest date first.
    pub fn list(&self, caller: &Caller) -> AppResult<Vec<AppointmentDetails>> {
        Enforcer::authorize(caller, Action::List, &Resource::Appointments)?;
        let conn = self.db.get_connection()?;
        Ok(appointment_store::list(&conn, AppointmentScope::for_caller(caller))?)
    }

    /// Every appointment in the system.
    pub fn list_all(&self, caller: &Caller) -> AppResult<Vec<AppointmentDetails>> {
        Enforcer::authorize(caller, Action::Read, &Resource::Appointments)?;
        let conn = self.db.get_connection()?;
        Ok(appointment_store::list(&conn, AppointmentScope::All)?)
    }

    pub fn get(&self, caller: &Caller, id: AppointmentId) -> AppResult<AppointmentDetails> {
        let conn = self.db.get_connection()?;
        let details = appointment_store::find_details(&conn, id)?
            .ok_or_else(|| AppError::not_found("Appointment not found"))?;
        let appt = &details.appointment;
        Enforcer::authorize(
            caller,
            Action::Read,
            &Resource::Appointment {
                patient_id: appt.patient_id,
                doctor_id: appt.doctor_id,
            },
        )?;
        Ok(details)
    }

    /// Drive the status state machine. The read, checks and conditional
    /// write share one IMMEDIATE transaction.
    pub fn update_status(
        &self,
        caller: &Caller,
        id: AppointmentId,
        request: &UpdateStatusRequest,
    ) -> AppResult<Appointment> {
        let target = request.target()?;

        let mut conn = self.db.get_connection()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let mut appointment = appointment_store::find_by_id(&tx, id)?
            .ok_or_else(|| AppError::not_found("Appointment not found"))?;
        Enforcer::authorize(
            caller,
            Action::UpdateStatus,
            &Resource::Appointment {
                patient_id: appointment.patient_id,
                doctor_id: appointment.doctor_id,
            },
        )?;

        let relation = Relation::of(caller, appointment.patient_id, appointment.doctor_id);
        let from = appointment.status;
        let to = lifecycle::transition(from, target, relation)?;

        if !appointment_store::update_status(&tx, id, from, to)? {
            return Err(AppError::InvalidTransition {
                from: from.to_string(),
                to: to.to_string(),
            });
        }
        tx.commit()?;

        tracing::info!(appointment_id = id, caller = caller.id, %from, %to, "appointment status changed");
        appointment.status = to;
        Ok(appointment)
    }

    pub fn delete(&self, caller: &Caller, id: AppointmentId) -> AppResult<()> {
        let conn = self.db.get_connection()?;
        let appointment = appointment_store::find_by_id(&conn, id)?
            .ok_or_else(|| AppError::not_found("Appointment not found"))?;
        Enforcer::authorize(
            caller,
            Action::Delete,
            &Resource::Appointment {
                patient_id: appointment.patient_id,
                doctor_id: appointment.doctor_id,
            },
        )?;
        appointment_store::delete(&conn, id)?;
        tracing::info!(appointment_id = id, caller = caller.id, "appointment deleted");
        Ok(())
    }
}
