//! Role-specific dashboards for the terminal client

use serde::Serialize;

use super::formatter::{format_appointment_date, format_timestamp, or_dash, role_badge, status_badge, CliFormatter};
use crate::engine::client::{ClientError, MedbookClient};
use crate::engine::lifecycle::{available_transitions, AppointmentStatus, Relation};
use crate::engine::models::{AppointmentDetails, UserSummary};
use crate::engine::rbac::{Caller, Role};
use crate::engine::users::{DoctorStats, SystemStats};

/// Everything one dashboard shows, fetched up front
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum Dashboard {
    Patient {
        user: UserSummary,
        appointments: Vec<AppointmentDetails>,
    },
    Doctor {
        user: UserSummary,
        stats: DoctorStats,
        appointments: Vec<AppointmentDetails>,
    },
    Admin {
        user: UserSummary,
        stats: SystemStats,
        recent_users: Vec<UserSummary>,
    },
}

const RECENT_USERS: usize = 5;

impl Dashboard {
    pub fn fetch(client: &MedbookClient) -> Result<Self, ClientError> {
        let user = client.profile()?;
        Ok(match user.role {
            Role::Patient => Dashboard::Patient {
                appointments: client.appointments()?,
                user,
            },
            Role::Doctor => Dashboard::Doctor {
                stats: client.doctor_stats(user.id)?,
                appointments: client.appointments()?,
                user,
            },
            Role::Admin => {
                let mut recent_users = client.admin_users()?;
                recent_users.truncate(RECENT_USERS);
                Dashboard::Admin {
                    stats: client.admin_stats()?,
                    recent_users,
                    user,
                }
            }
        })
    }

    pub fn render(&self) {
        match self {
            Dashboard::Patient { user, appointments } => {
                greet(user);
                CliFormatter::header("My appointments");
                let counts = AppointmentStatus::ALL
                    .into_iter()
                    .map(|s| format!("{} {}", count_status(appointments, s), status_badge(s)))
                    .collect::<Vec<_>>()
                    .join("  ");
                CliFormatter::item(&counts);
                CliFormatter::blank();
                render_appointments(user, appointments);
            }
            Dashboard::Doctor { user, stats, appointments } => {
                greet(user);
                CliFormatter::header("Practice");
                CliFormatter::kv("Total", &stats.appointments.total.to_string());
                CliFormatter::kv("Pending", &stats.appointments.pending.to_string());
                CliFormatter::kv("Confirmed", &stats.appointments.confirmed.to_string());
                CliFormatter::kv("Completed", &stats.appointments.completed.to_string());
                CliFormatter::kv("Cancelled", &stats.appointments.cancelled.to_string());
                CliFormatter::kv("Upcoming", &stats.upcoming.to_string());
                CliFormatter::header("Appointments");
                render_appointments(user, appointments);
            }
            Dashboard::Admin { user, stats, recent_users } => {
                greet(user);
                CliFormatter::header("Users");
                for count in &stats.users {
                    CliFormatter::kv(&role_badge(count.role).to_string(), &count.count.to_string());
                }
                CliFormatter::header("Appointments");
                for count in &stats.appointments {
                    CliFormatter::kv(&status_badge(count.status).to_string(), &count.count.to_string());
                }
                CliFormatter::kv("Created in the last 7 days", &stats.recent_appointments.to_string());
                CliFormatter::header("Newest users");
                render_users(recent_users);
            }
        }
    }
}

fn greet(user: &UserSummary) {
    CliFormatter::info(&format!("Signed in as {} ({})", user.full_name, role_badge(user.role)));
}

fn count_status(appointments: &[AppointmentDetails], status: AppointmentStatus) -> usize {
    appointments
        .iter()
        .filter(|a| a.appointment.status == status)
        .count()
}

pub fn render_appointments(viewer: &UserSummary, appointments: &[AppointmentDetails]) {
    if appointments.is_empty() {
        CliFormatter::info("No appointments");
        return;
    }
    CliFormatter::table(
        &["ID", "Date", "With", "Reason", "Status", "Actions"],
        &appointment_rows(viewer, appointments),
    );
}

/// Plain-text rows; the counter-party column depends on who is looking.
pub fn appointment_rows(viewer: &UserSummary, appointments: &[AppointmentDetails]) -> Vec<Vec<String>> {
    let caller = Caller::new(viewer.id, viewer.role);
    appointments
        .iter()
        .map(|a| {
            let appt = &a.appointment;
            let with = match viewer.role {
                Role::Patient => a.doctor_name.clone(),
                Role::Doctor => a.patient_name.clone(),
                Role::Admin => format!("{} / {}", a.patient_name, a.doctor_name),
            };
            let relation = Relation::of(&caller, appt.patient_id, appt.doctor_id);
            let actions = available_transitions(appt.status, relation)
                .iter()
                .map(|s| s.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            vec![
                appt.id.to_string(),
                format_appointment_date(&appt.appointment_date),
                with,
                or_dash(appt.reason.as_deref()),
                appt.status.to_string(),
                if actions.is_empty() { "-".to_string() } else { actions },
            ]
        })
        .collect()
}

pub fn render_users(users: &[UserSummary]) {
    if users.is_empty() {
        CliFormatter::info("No users");
        return;
    }
    CliFormatter::table(&["ID", "Name", "Email", "Username", "Role", "Phone", "Created"], &user_rows(users));
}

pub fn user_rows(users: &[UserSummary]) -> Vec<Vec<String>> {
    users
        .iter()
        .map(|u| {
            vec![
                u.id.to_string(),
                u.full_name.clone(),
                u.email.clone(),
                u.username.clone(),
                u.role.to_string(),
                or_dash(u.phone.as_deref()),
                format_timestamp(&u.created_at),
            ]
        })
        .collect()
}
