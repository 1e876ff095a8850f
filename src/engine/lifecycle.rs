//! Appointment Lifecycle
//!
//! Status state machine and the caller relationships allowed to drive each edge:
//!
//! ```text
//! pending ──► confirmed ──► completed
//!    │            │
//!    └──► cancelled ◄┘
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;

use crate::engine::error::{AppError, AppResult};
use crate::engine::rbac::Caller;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum AppointmentStatus {
    Pending,
    Confirmed,
    Cancelled,
    Completed,
}

impl AppointmentStatus {
    pub const ALL: [AppointmentStatus; 4] = [
        AppointmentStatus::Pending,
        AppointmentStatus::Confirmed,
        AppointmentStatus::Cancelled,
        AppointmentStatus::Completed,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AppointmentStatus::Pending => "pending",
            AppointmentStatus::Confirmed => "confirmed",
            AppointmentStatus::Cancelled => "cancelled",
            AppointmentStatus::Completed => "completed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, AppointmentStatus::Cancelled | AppointmentStatus::Completed)
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AppointmentStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(AppointmentStatus::Pending),
            "confirmed" => Ok(AppointmentStatus::Confirmed),
            "cancelled" => Ok(AppointmentStatus::Cancelled),
            "completed" => Ok(AppointmentStatus::Completed),
            other => Err(AppError::validation(format!("Invalid status: {}", other))),
        }
    }
}

/// How a caller stands with respect to one appointment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    Admin,
    AssignedDoctor,
    OwningPatient,
    Unrelated,
}

impl Relation {
    pub fn of(caller: &Caller, patient_id: i64, doctor_id: i64) -> Self {
        if caller.is_admin() {
            Relation::Admin
        } else if caller.id == doctor_id {
            Relation::AssignedDoctor
        } else if caller.id == patient_id {
            Relation::OwningPatient
        } else {
            Relation::Unrelated
        }
    }
}

/// Whether `relation` may move an appointment from `from` to `to`.
pub fn can_transition(from: AppointmentStatus, to: AppointmentStatus, relation: Relation) -> bool {
    use AppointmentStatus::*;
    use Relation::*;

    match (from, to) {
        (Pending, Confirmed) => matches!(relation, AssignedDoctor | Admin),
        (Pending, Cancelled) => matches!(relation, AssignedDoctor | OwningPatient | Admin),
        (Confirmed, Completed) => matches!(relation, AssignedDoctor | Admin),
        (Confirmed, Cancelled) => matches!(relation, AssignedDoctor | Admin),
        _ => false,
    }
}

/// Validate a transition, yielding the new status.
pub fn transition(
    from: AppointmentStatus,
    to: AppointmentStatus,
    relation: Relation,
) -> AppResult<AppointmentStatus> {
    if can_transition(from, to, relation) {
        Ok(to)
    } else {
        Err(AppError::InvalidTransition {
            from: from.to_string(),
            to: to.to_string(),
        })
    }
}

/// Targets reachable from `from` for `relation`, used to offer actions in the client.
pub fn available_transitions(from: AppointmentStatus, relation: Relation) -> Vec<AppointmentStatus> {
    AppointmentStatus::ALL
        .into_iter()
        .filter(|to| can_transition(from, *to, relation))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::rbac::Role;
    use AppointmentStatus::*;

    const RELATIONS: [Relation; 4] = [
        Relation::Admin,
        Relation::AssignedDoctor,
        Relation::OwningPatient,
        Relation::Unrelated,
    ];

    #[test]
    fn test_parse_status() {
        assert_eq!("confirmed".parse::<AppointmentStatus>().unwrap(), Confirmed);
        assert!(matches!(
            "archived".parse::<AppointmentStatus>(),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_relation() {
        let admin = Caller::new(1, Role::Admin);
        let doctor = Caller::new(7, Role::Doctor);
        let patient = Caller::new(3, Role::Patient);
        let other = Caller::new(4, Role::Patient);

        assert_eq!(Relation::of(&admin, 3, 7), Relation::Admin);
        assert_eq!(Relation::of(&doctor, 3, 7), Relation::AssignedDoctor);
        assert_eq!(Relation::of(&patient, 3, 7), Relation::OwningPatient);
        assert_eq!(Relation::of(&other, 3, 7), Relation::Unrelated);
    }

    #[test]
    fn test_transition_table() {
        let allowed = [
            (Pending, Confirmed, Relation::AssignedDoctor),
            (Pending, Confirmed, Relation::Admin),
            (Pending, Cancelled, Relation::AssignedDoctor),
            (Pending, Cancelled, Relation::OwningPatient),
            (Pending, Cancelled, Relation::Admin),
            (Confirmed, Completed, Relation::AssignedDoctor),
            (Confirmed, Completed, Relation::Admin),
            (Confirmed, Cancelled, Relation::AssignedDoctor),
            (Confirmed, Cancelled, Relation::Admin),
        ];

        for from in AppointmentStatus::ALL {
            for to in AppointmentStatus::ALL {
                for relation in RELATIONS {
                    let expected = allowed.contains(&(from, to, relation));
                    assert_eq!(
                        can_transition(from, to, relation),
                        expected,
                        "{} -> {} by {:?}",
                        from,
                        to,
                        relation
                    );
                }
            }
        }
    }

    #[test]
    fn test_terminal_states_are_final_even_for_admin() {
        for from in [Cancelled, Completed] {
            assert!(from.is_terminal());
            assert!(available_transitions(from, Relation::Admin).is_empty());
        }
    }

    #[test]
    fn test_patient_cannot_cancel_confirmed() {
        let err = transition(Confirmed, Cancelled, Relation::OwningPatient).unwrap_err();
        assert_eq!(err.to_string(), "Cannot change status from confirmed to cancelled");
    }

    #[test]
    fn test_available_transitions() {
        assert_eq!(
            available_transitions(Pending, Relation::OwningPatient),
            vec![Cancelled]
        );
        assert_eq!(
            available_transitions(Confirmed, Relation::AssignedDoctor),
            vec![Cancelled, Completed]
        );
    }
}
