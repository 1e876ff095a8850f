//! Authorization Policy
//!
//! The single decision table for who may do what to users and appointments.
//! Pure: no store access, no logging.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;

/// Account role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Patient,
    Doctor,
    Admin,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Patient, Role::Doctor, Role::Admin];

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Patient => "patient",
            Role::Doctor => "doctor",
            Role::Admin => "admin",
        }
    }

    /// Roles open to unauthenticated self-registration.
    pub fn self_assignable(self) -> bool {
        matches!(self, Role::Patient | Role::Doctor)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "patient" => Ok(Role::Patient),
            "doctor" => Ok(Role::Doctor),
            "admin" => Ok(Role::Admin),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

/// The authenticated party making a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller {
    pub id: i64,
    pub role: Role,
}

impl Caller {
    pub fn new(id: i64, role: Role) -> Self {
        Self { id, role }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Operations subject to authorization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Read,
    List,
    Create,
    /// Self-service edit of name and phone
    UpdateProfile,
    /// Administrative edit of any field except the password
    UpdateAny,
    UpdateStatus,
    Delete,
}

/// What an action targets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    /// A single user record
    User { id: i64 },
    /// The user collection (listing, search, admin creation)
    Users,
    /// A single appointment and its parties
    Appointment { patient_id: i64, doctor_id: i64 },
    /// The appointment collection (booking, scoped listing)
    Appointments,
    /// Appointment statistics of one doctor
    DoctorStats { doctor_id: i64 },
    /// System-wide statistics
    SystemStats,
}

/// Decide whether `caller` may perform `action` on `resource`.
pub fn allowed(caller: &Caller, action: Action, resource: &Resource) -> bool {
    let admin = caller.is_admin();

    match (action, resource) {
        (Action::Read, Resource::User { id }) => admin || caller.id == *id,
        (Action::List, Resource::Users) => admin,
        (Action::Create, Resource::Users) => admin,
        (Action::UpdateProfile, Resource::User { id }) => caller.id == *id,
        (Action::UpdateAny, Resource::User { .. }) => admin,
        (Action::Delete, Resource::User { id }) => admin && caller.id != *id,

        (Action::Create, Resource::Appointments) => caller.role == Role::Patient,
        // Listing is open to every role; what each one sees is `AppointmentScope`.
        (Action::List, Resource::Appointments) => true,
        // Unscoped read of the whole collection
        (Action::Read, Resource::Appointments) => admin,
        (Action::Read, Resource::Appointment { patient_id, doctor_id })
        | (Action::UpdateStatus, Resource::Appointment { patient_id, doctor_id }) => {
            admin || caller.id == *patient_id || caller.id == *doctor_id
        }
        (Action::Delete, Resource::Appointment { patient_id, .. }) => {
            admin || caller.id == *patient_id
        }

        (Action::Read, Resource::DoctorStats { doctor_id }) => admin || caller.id == *doctor_id,
        (Action::Read, Resource::SystemStats) => admin,

        _ => false,
    }
}

/// Which appointments a listing returns for a caller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppointmentScope {
    All,
    AsPatient(i64),
    AsDoctor(i64),
}

impl AppointmentScope {
    pub fn for_caller(caller: &Caller) -> Self {
        match caller.role {
            Role::Admin => AppointmentScope::All,
            Role::Doctor => AppointmentScope::AsDoctor(caller.id),
            Role::Patient => AppointmentScope::AsPatient(caller.id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PATIENT: Caller = Caller { id: 1, role: Role::Patient };
    const DOCTOR: Caller = Caller { id: 7, role: Role::Doctor };
    const OTHER_DOCTOR: Caller = Caller { id: 8, role: Role::Doctor };
    const ADMIN: Caller = Caller { id: 99, role: Role::Admin };
    const STRANGER: Caller = Caller { id: 2, role: Role::Patient };

    fn appointment() -> Resource {
        Resource::Appointment { patient_id: 1, doctor_id: 7 }
    }

    #[test]
    fn test_role_parsing() {
        assert_eq!("doctor".parse::<Role>(), Ok(Role::Doctor));
        assert!("Doctor".parse::<Role>().is_err());
        assert!("nurse".parse::<Role>().is_err());
        assert!(!Role::Admin.self_assignable());
        assert!(Role::Patient.self_assignable());
    }

    #[test]
    fn test_user_profile_rules() {
        let own = Resource::User { id: PATIENT.id };
        assert!(allowed(&PATIENT, Action::Read, &own));
        assert!(allowed(&ADMIN, Action::Read, &own));
        assert!(!allowed(&STRANGER, Action::Read, &own));

        assert!(allowed(&PATIENT, Action::UpdateProfile, &own));
        assert!(!allowed(&ADMIN, Action::UpdateProfile, &own));
        assert!(!allowed(&PATIENT, Action::UpdateAny, &own));
        assert!(allowed(&ADMIN, Action::UpdateAny, &own));
    }

    #[test]
    fn test_user_collection_is_admin_only() {
        for caller in [PATIENT, DOCTOR] {
            assert!(!allowed(&caller, Action::List, &Resource::Users));
            assert!(!allowed(&caller, Action::Create, &Resource::Users));
        }
        assert!(allowed(&ADMIN, Action::List, &Resource::Users));
        assert!(allowed(&ADMIN, Action::Create, &Resource::Users));
    }

    #[test]
    fn test_admin_cannot_delete_self() {
        assert!(allowed(&ADMIN, Action::Delete, &Resource::User { id: 1 }));
        assert!(!allowed(&ADMIN, Action::Delete, &Resource::User { id: ADMIN.id }));
        assert!(!allowed(&PATIENT, Action::Delete, &Resource::User { id: PATIENT.id }));
    }

    #[test]
    fn test_appointment_read_and_status() {
        for action in [Action::Read, Action::UpdateStatus] {
            assert!(allowed(&PATIENT, action, &appointment()));
            assert!(allowed(&DOCTOR, action, &appointment()));
            assert!(allowed(&ADMIN, action, &appointment()));
            assert!(!allowed(&STRANGER, action, &appointment()));
            assert!(!allowed(&OTHER_DOCTOR, action, &appointment()));
        }
    }

    #[test]
    fn test_appointment_delete_excludes_doctor() {
        assert!(allowed(&PATIENT, Action::Delete, &appointment()));
        assert!(allowed(&ADMIN, Action::Delete, &appointment()));
        assert!(!allowed(&DOCTOR, Action::Delete, &appointment()));
        assert!(!allowed(&STRANGER, Action::Delete, &appointment()));
    }

    #[test]
    fn test_booking_is_for_patients() {
        assert!(allowed(&PATIENT, Action::Create, &Resource::Appointments));
        assert!(!allowed(&DOCTOR, Action::Create, &Resource::Appointments));
        assert!(!allowed(&ADMIN, Action::Create, &Resource::Appointments));
    }

    #[test]
    fn test_unscoped_appointment_read_is_admin_only() {
        assert!(allowed(&ADMIN, Action::Read, &Resource::Appointments));
        assert!(!allowed(&DOCTOR, Action::Read, &Resource::Appointments));
        assert!(!allowed(&PATIENT, Action::Read, &Resource::Appointments));
        for caller in [PATIENT, DOCTOR, ADMIN] {
            assert!(allowed(&caller, Action::List, &Resource::Appointments));
        }
    }

    #[test]
    fn test_stats() {
        let stats = Resource::DoctorStats { doctor_id: DOCTOR.id };
        assert!(allowed(&DOCTOR, Action::Read, &stats));
        assert!(allowed(&ADMIN, Action::Read, &stats));
        assert!(!allowed(&OTHER_DOCTOR, Action::Read, &stats));
        assert!(!allowed(&PATIENT, Action::Read, &stats));

        assert!(allowed(&ADMIN, Action::Read, &Resource::SystemStats));
        assert!(!allowed(&DOCTOR, Action::Read, &Resource::SystemStats));
    }

    #[test]
    fn test_unlisted_pairs_are_denied() {
        assert!(!allowed(&ADMIN, Action::UpdateStatus, &Resource::Users));
        assert!(!allowed(&ADMIN, Action::Delete, &Resource::SystemStats));
        assert!(!allowed(&ADMIN, Action::UpdateProfile, &appointment()));
    }

    #[test]
    fn test_scope() {
        assert_eq!(AppointmentScope::for_caller(&ADMIN), AppointmentScope::All);
        assert_eq!(AppointmentScope::for_caller(&DOCTOR), AppointmentScope::AsDoctor(7));
        assert_eq!(AppointmentScope::for_caller(&PATIENT), AppointmentScope::AsPatient(1));
    }
}
