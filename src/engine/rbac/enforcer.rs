//! RBAC Enforcement Layer
//!
//! Turns policy decisions into request outcomes

use serde::{Deserialize, Serialize};

use super::policy::{allowed, Action, Caller, Resource};
use crate::engine::error::{AppError, AppResult};

/// Authorization result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthResult {
    pub allowed: bool,
    pub reason: Option<String>,
}

impl AuthResult {
    pub fn allow() -> Self {
        Self {
            allowed: true,
            reason: None,
        }
    }

    pub fn deny(reason: &str) -> Self {
        Self {
            allowed: false,
            reason: Some(reason.to_string()),
        }
    }

    pub fn into_result(self) -> AppResult<()> {
        if self.allowed {
            Ok(())
        } else {
            Err(AppError::Forbidden(
                self.reason.unwrap_or_else(|| "Access denied".to_string()),
            ))
        }
    }
}

/// The enforcement engine
pub struct Enforcer;

impl Enforcer {
    /// Check a request against the policy table
    pub fn check(caller: &Caller, action: Action, resource: &Resource) -> AuthResult {
        if allowed(caller, action, resource) {
            return AuthResult::allow();
        }

        tracing::debug!(
            caller = caller.id,
            role = %caller.role,
            ?action,
            ?resource,
            "authorization denied"
        );
        AuthResult::deny(denial_reason(caller, action, resource))
    }

    /// Check and convert a denial into `AppError::Forbidden`
    pub fn authorize(caller: &Caller, action: Action, resource: &Resource) -> AppResult<()> {
        Self::check(caller, action, resource).into_result()
    }
}

fn denial_reason(caller: &Caller, action: Action, resource: &Resource) -> &'static str {
    match (action, resource) {
        (Action::Delete, Resource::User { id }) if caller.is_admin() && *id == caller.id => {
            "You cannot delete your own account"
        }
        (Action::Create, Resource::Appointments) => "Only patients can book appointments",
        (_, Resource::Users)
        | (_, Resource::SystemStats)
        | (Action::Read, Resource::Appointments)
        | (Action::UpdateAny, _) => {
            "Access reserved for administrators"
        }
        _ => "Access denied",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::rbac::policy::Role;

    #[test]
    fn test_authorize() {
        let admin = Caller::new(1, Role::Admin);
        let patient = Caller::new(2, Role::Patient);

        assert!(Enforcer::authorize(&admin, Action::List, &Resource::Users).is_ok());
        let err = Enforcer::authorize(&patient, Action::List, &Resource::Users).unwrap_err();
        assert!(matches!(err, AppError::Forbidden(ref m) if m.contains("administrators")));
    }

    #[test]
    fn test_self_delete_reason() {
        let admin = Caller::new(1, Role::Admin);
        let result = Enforcer::check(&admin, Action::Delete, &Resource::User { id: 1 });
        assert!(!result.allowed);
        assert_eq!(result.reason.as_deref(), Some("You cannot delete your own account"));
    }
}
