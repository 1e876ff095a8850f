//! User records service
//!
//! Directory, profile and administrative operations over user accounts.
//! Every operation takes the authenticated caller and consults the policy
//! table before touching the store.

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::engine::auth::{AuthService, NewAccount};
use crate::engine::database::Database;
use crate::engine::error::{AppError, AppResult};
use crate::engine::lifecycle::AppointmentStatus;
use crate::engine::models::{DoctorSummary, UserId, UserSummary};
use crate::engine::rbac::{Action, Caller, Enforcer, Resource, Role};
use crate::engine::store::appointments::{self as appointment_store, StatusCounts};
use crate::engine::store::users::{self as user_store, UserChanges};
use crate::engine::validate;

/// Self-service profile edit
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
    /// Empty string clears the phone number
    pub phone: Option<String>,
}

/// Administrative account creation
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct CreateUserRequest {
    pub email: Option<String>,
    pub password: Option<String>,
    pub name: Option<String>,
    /// Defaults to `patient`
    pub role: Option<String>,
    pub phone: Option<String>,
}

/// Administrative edit; the password is never changed here
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct AdminUpdateRequest {
    pub email: Option<String>,
    pub name: Option<String>,
    pub role: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchQuery {
    pub query: Option<String>,
    pub role: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct DoctorStats {
    pub appointments: StatusCounts,
    /// Non-cancelled appointments scheduled from now on
    pub upcoming: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct RoleCount {
    pub role: Role,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct StatusCount {
    pub status: AppointmentStatus,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SystemStats {
    pub users: Vec<RoleCount>,
    pub appointments: Vec<StatusCount>,
    /// Appointments created in the last seven days
    pub recent_appointments: i64,
}

fn parse_role(raw: &str) -> AppResult<Role> {
    raw.parse()
        .map_err(|_| AppError::validation(format!("Invalid role: {}", raw)))
}

impl UpdateProfileRequest {
    fn changes(&self) -> AppResult<UserChanges> {
        let mut changes = UserChanges::default();
        if let Some(name) = &self.name {
            changes.full_name = Some(validate::required(Some(name.as_str()), "name")?.to_string());
        }
        if let Some(phone) = &self.phone {
            changes.phone = Some(validate::optional(Some(phone.as_str())).map(str::to_string));
        }
        if changes.is_empty() {
            return Err(AppError::validation("No fields to update"));
        }
        Ok(changes)
    }
}

impl AdminUpdateRequest {
    fn changes(&self) -> AppResult<UserChanges> {
        let mut changes = UserChanges::default();
        if let Some(email) = validate::optional(self.email.as_deref()) {
            changes.email = Some(validate::email(email)?.to_string());
        }
        if let Some(name) = validate::optional(self.name.as_deref()) {
            changes.full_name = Some(name.to_string());
        }
        if let Some(role) = validate::optional(self.role.as_deref()) {
            changes.role = Some(parse_role(role)?);
        }
        if let Some(phone) = &self.phone {
            changes.phone = Some(validate::optional(Some(phone.as_str())).map(str::to_string));
        }
        if changes.is_empty() {
            return Err(AppError::validation("No fields to update"));
        }
        Ok(changes)
    }
}

impl CreateUserRequest {
    pub fn validate(&self) -> AppResult<NewAccount> {
        let role = match validate::optional(self.role.as_deref()) {
            Some(raw) => parse_role(raw)?,
            None => Role::Patient,
        };
        NewAccount::parse(
            self.email.as_deref(),
            self.password.as_deref(),
            self.name.as_deref(),
            role,
            self.phone.as_deref(),
        )
    }
}

#[derive(Clone)]
pub struct UsersService {
    db: Database,
    accounts: AuthService,
}

impl UsersService {
    pub fn new(accounts: AuthService) -> Self {
        Self {
            db: accounts.database().clone(),
            accounts,
        }
    }

    /// Public doctor directory, ordered by name.
    pub fn list_doctors(&self) -> AppResult<Vec<DoctorSummary>> {
        let conn = self.db.get_connection()?;
        Ok(user_store::list_doctors(&conn)?)
    }

    pub fn get(&self, caller: &Caller, id: UserId) -> AppResult<UserSummary> {
        let conn = self.db.get_connection()?;
        let user = user_store::find_by_id(&conn, id)?
            .ok_or_else(|| AppError::not_found("User not found"))?;
        Enforcer::authorize(caller, Action::Read, &Resource::User { id })?;
        Ok(user.summary())
    }

    pub fn update_profile(&self, caller: &Caller, request: &UpdateProfileRequest) -> AppResult<UserSummary> {
        Enforcer::authorize(caller, Action::UpdateProfile, &Resource::User { id: caller.id })?;
        let changes = request.changes()?;

        let conn = self.db.get_connection()?;
        if user_store::update(&conn, caller.id, &changes)? == 0 {
            return Err(AppError::not_found("User not found"));
        }
        let user = user_store::find_by_id(&conn, caller.id)?
            .ok_or_else(|| AppError::not_found("User not found"))?;
        Ok(user.summary())
    }

    /// Admin search: case-insensitive substring over name, e-mail and
    /// username, optional exact role, newest first, capped.
    pub fn search(&self, caller: &Caller, query: &SearchQuery) -> AppResult<Vec<UserSummary>> {
        Enforcer::authorize(caller, Action::List, &Resource::Users)?;
        let role = validate::optional(query.role.as_deref())
            .map(parse_role)
            .transpose()?;
        let text = validate::optional(query.query.as_deref());

        let conn = self.db.get_connection()?;
        let users = user_store::search(&conn, text, role)?;
        Ok(users.iter().map(|u| u.summary()).collect())
    }

    pub fn doctor_stats(&self, caller: &Caller, doctor_id: UserId) -> AppResult<DoctorStats> {
        let conn = self.db.get_connection()?;
        match user_store::find_by_id(&conn, doctor_id)? {
            Some(user) if user.role == Role::Doctor => {}
            _ => return Err(AppError::not_found("Doctor not found")),
        }
        Enforcer::authorize(caller, Action::Read, &Resource::DoctorStats { doctor_id })?;

        Ok(DoctorStats {
            appointments: appointment_store::counts_for_doctor(&conn, doctor_id)?,
            upcoming: appointment_store::count_upcoming_for_doctor(
                &conn,
                doctor_id,
                Utc::now().naive_utc(),
            )?,
        })
    }

    pub fn list_all(&self, caller: &Caller) -> AppResult<Vec<UserSummary>> {
        Enforcer::authorize(caller, Action::List, &Resource::Users)?;
        let conn = self.db.get_connection()?;
        let users = user_store::list_all(&conn)?;
        Ok(users.iter().map(|u| u.summary()).collect())
    }

    pub fn list_by_role(&self, caller: &Caller, role: Role) -> AppResult<Vec<UserSummary>> {
        Enforcer::authorize(caller, Action::List, &Resource::Users)?;
        let conn = self.db.get_connection()?;
        let users = user_store::list_by_role(&conn, role)?;
        Ok(users.iter().map(|u| u.summary()).collect())
    }

    pub fn create(&self, caller: &Caller, request: &CreateUserRequest) -> AppResult<UserId> {
        Enforcer::authorize(caller, Action::Create, &Resource::Users)?;
        let account = request.validate()?;
        let id = self.accounts.create_account(&account)?;
        tracing::info!(admin = caller.id, user_id = id, role = %account.role, "user created");
        Ok(id)
    }

    pub fn update(&self, caller: &Caller, id: UserId, request: &AdminUpdateRequest) -> AppResult<()> {
        let conn = self.db.get_connection()?;
        if user_store::find_by_id(&conn, id)?.is_none() {
            return Err(AppError::not_found("User not found"));
        }
        Enforcer::authorize(caller, Action::UpdateAny, &Resource::User { id })?;
        let changes = request.changes()?;

        user_store::update(&conn, id, &changes)?;
        tracing::info!(admin = caller.id, user_id = id, "user updated");
        Ok(())
    }

    /// Remove an account; its appointments go with it.
    pub fn delete(&self, caller: &Caller, id: UserId) -> AppResult<()> {
        let conn = self.db.get_connection()?;
        if user_store::find_by_id(&conn, id)?.is_none() {
            return Err(AppError::not_found("User not found"));
        }
        Enforcer::authorize(caller, Action::Delete, &Resource::User { id })?;

        user_store::delete(&conn, id)?;
        tracing::info!(admin = caller.id, user_id = id, "user deleted");
        Ok(())
    }

    pub fn stats(&self, caller: &Caller) -> AppResult<SystemStats> {
        Enforcer::authorize(caller, Action::Read, &Resource::SystemStats)?;
        let conn = self.db.get_connection()?;

        let users = user_store::count_by_role(&conn)?
            .into_iter()
            .map(|(role, count)| RoleCount { role, count })
            .collect();
        let appointments = appointment_store::count_by_status(&conn)?
            .into_iter()
            .map(|(status, count)| StatusCount { status, count })
            .collect();
        let recent_appointments =
            appointment_store::count_created_since(&conn, Utc::now(), Duration::days(7))?;

        Ok(SystemStats {
            users,
            appointments,
            recent_appointments,
        })
    }
}
