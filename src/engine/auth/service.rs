//! Auth Service
//!
//! Registration, credential checks and token verification on top of the
//! user store. Stateless between calls: every request re-derives the caller
//! from the token and the current user record.

use chrono::{Duration, Utc};
use rusqlite::{Connection, TransactionBehavior};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::password::PasswordHasher;
use super::token::TokenService;
use crate::engine::config::Config;
use crate::engine::database::Database;
use crate::engine::error::{AppError, AppResult};
use crate::engine::models::{User, UserId, UserSummary};
use crate::engine::rbac::Role;
use crate::engine::store::users::{self, NewUser};
use crate::engine::validate;

const BAD_CREDENTIALS: &str = "Invalid email or password";

/// Public self-registration body
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct RegisterRequest {
    pub email: Option<String>,
    pub password: Option<String>,
    pub name: Option<String>,
    /// `patient` (default) or `doctor`
    pub role: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RegisterResponse {
    pub message: String,
    pub user_id: UserId,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LoginResponse {
    pub message: String,
    pub token: String,
    pub user: UserSummary,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct VerifyResponse {
    pub valid: bool,
    pub user: UserSummary,
}

/// A validated account about to be stored
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAccount {
    pub email: String,
    pub password: String,
    pub full_name: String,
    pub role: Role,
    pub phone: Option<String>,
}

impl NewAccount {
    /// Validate the shared account fields; `role` is decided by the caller.
    pub fn parse(
        email: Option<&str>,
        password: Option<&str>,
        name: Option<&str>,
        role: Role,
        phone: Option<&str>,
    ) -> AppResult<Self> {
        let email = validate::required(email, "email")?;
        let password = password
            .filter(|p| !p.is_empty())
            .ok_or_else(|| AppError::validation("password is required"))?;
        let full_name = validate::required(name, "name")?;

        Ok(Self {
            email: validate::email(email)?.to_string(),
            password: validate::password(password)?.to_string(),
            full_name: full_name.to_string(),
            role,
            phone: validate::optional(phone).map(str::to_string),
        })
    }
}

impl RegisterRequest {
    pub fn validate(&self) -> AppResult<NewAccount> {
        let role = match validate::optional(self.role.as_deref()) {
            None => Role::Patient,
            Some(raw) => {
                let role: Role = raw
                    .parse()
                    .map_err(|_| AppError::validation(format!("Invalid role: {}", raw)))?;
                if !role.self_assignable() {
                    return Err(AppError::validation("Registration is open to patients and doctors only"));
                }
                role
            }
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
pub struct AuthService {
    db: Database,
    hasher: PasswordHasher,
    tokens: TokenService,
}

impl AuthService {
    pub fn new(db: Database, hasher: PasswordHasher, tokens: TokenService) -> Self {
        Self { db, hasher, tokens }
    }

    /// Build from a validated configuration.
    pub fn from_config(db: Database, config: &Config) -> Self {
        Self::new(
            db,
            PasswordHasher::new(config.auth.bcrypt_cost),
            TokenService::new(config.jwt_secret(), Duration::hours(config.auth.token_ttl_hours)),
        )
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn register(&self, request: &RegisterRequest) -> AppResult<UserId> {
        let account = request.validate()?;
        let id = self.create_account(&account)?;
        tracing::info!(user_id = id, role = %account.role, "user registered");
        Ok(id)
    }

    /// Hash and store an account. The e-mail check, username choice and
    /// insert share one write transaction; the store's unique index backs
    /// both up against concurrent writers.
    pub fn create_account(&self, account: &NewAccount) -> AppResult<UserId> {
        let password_hash = self.hasher.hash(&account.password)?;

        let mut conn = self.db.get_connection()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        if users::email_exists(&tx, &account.email)? {
            return Err(AppError::Duplicate("This email is already in use".to_string()));
        }
        let username = available_username(&tx, &account.email)?;
        let id = users::insert(
            &tx,
            &NewUser {
                email: &account.email,
                username: &username,
                password_hash: &password_hash,
                full_name: &account.full_name,
                role: account.role,
                phone: account.phone.as_deref(),
                created_at: Utc::now(),
            },
        )?;
        tx.commit()?;
        Ok(id)
    }

    /// Operator bootstrap of an administrator account.
    pub fn create_admin(
        &self,
        email: &str,
        password: &str,
        name: &str,
        phone: Option<&str>,
    ) -> AppResult<UserId> {
        let account = NewAccount::parse(Some(email), Some(password), Some(name), Role::Admin, phone)?;
        let id = self.create_account(&account)?;
        tracing::info!(user_id = id, "admin account created");
        Ok(id)
    }

    /// Operator password reset, looked up by e-mail.
    pub fn reset_password(&self, email: &str, new_password: &str) -> AppResult<UserId> {
        let password_hash = self.hasher.hash(validate::password(new_password)?)?;
        let conn = self.db.get_connection()?;
        let user = users::find_by_email(&conn, email.trim())?
            .ok_or_else(|| AppError::not_found("User not found"))?;
        users::update_password(&conn, user.id, &password_hash)?;
        tracing::info!(user_id = user.id, "password reset");
        Ok(user.id)
    }

    pub fn login(&self, request: &LoginRequest) -> AppResult<LoginResponse> {
        let (email, password) = match (
            validate::optional(request.email.as_deref()),
            request.password.as_deref().filter(|p| !p.is_empty()),
        ) {
            (Some(email), Some(password)) => (email, password),
            _ => return Err(AppError::validation("Email and password are required")),
        };

        let user = {
            let conn = self.db.get_connection()?;
            users::find_by_email(&conn, email)?
        };

        let user = match user {
            Some(user) if self.hasher.verify(password, &user.password_hash) => user,
            Some(user) => {
                tracing::warn!(user_id = user.id, "login failed: wrong password");
                return Err(AppError::Auth(BAD_CREDENTIALS.to_string()));
            }
            None => {
                self.hasher.verify_dummy(password);
                tracing::warn!("login failed: unknown account");
                return Err(AppError::Auth(BAD_CREDENTIALS.to_string()));
            }
        };

        let token = self.tokens.issue(user.id, &user.email, user.role)?;
        tracing::info!(user_id = user.id, role = %user.role, "login succeeded");

        Ok(LoginResponse {
            message: "Login successful".to_string(),
            token,
            user: user.summary(),
        })
    }

    /// Resolve a bearer token to the current user record.
    pub fn verify(&self, token: &str) -> AppResult<User> {
        let claims = self.tokens.verify(token)?;
        let conn = self.db.get_connection()?;
        users::find_by_id(&conn, claims.id)?
            .ok_or_else(|| AppError::Auth("Invalid token".to_string()))
    }

    pub fn profile(&self, user_id: UserId) -> AppResult<UserSummary> {
        let conn = self.db.get_connection()?;
        users::find_by_id(&conn, user_id)?
            .map(|u| u.summary())
            .ok_or_else(|| AppError::not_found("User not found"))
    }

    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }
}

/// Local part of the e-mail, suffixed `2`, `3`, ... until unused.
fn available_username(conn: &Connection, email: &str) -> AppResult<String> {
    let base = email.split('@').next().unwrap_or(email);
    if !users::username_exists(conn, base)? {
        return Ok(base.to_string());
    }
    let mut n = 2u32;
    loop {
        let candidate = format!("{}{}", base, n);
        if !users::username_exists(conn, &candidate)? {
            return Ok(candidate);
        }
        n += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn service() -> AuthService {
        let db = Database::in_memory().unwrap();
        AuthService::new(
            db,
            PasswordHasher::new(4),
            TokenService::new("unit-test-secret-unit", Duration::hours(24)),
        )
    }

    fn register(svc: &AuthService, email: &str, role: Option<&str>) -> AppResult<UserId> {
        svc.register(&RegisterRequest {
            email: Some(email.to_string()),
            password: Some("secret1".to_string()),
            name: Some("Test User".to_string()),
            role: role.map(str::to_string),
            phone: None,
        })
    }

    fn login(svc: &AuthService, email: &str, password: &str) -> AppResult<LoginResponse> {
        svc.login(&LoginRequest {
            email: Some(email.to_string()),
            password: Some(password.to_string()),
        })
    }

    #[test]
    fn test_register_defaults_to_patient() {
        let svc = service();
        let id = register(&svc, "patient@x.com", None).unwrap();
        let profile = svc.profile(id).unwrap();
        assert_eq!(profile.role, Role::Patient);
        assert_eq!(profile.username, "patient");
    }

    #[test]
    fn test_register_validation() {
        let svc = service();
        for email in ["not-an-email", "a@b", ""] {
            assert!(matches!(register(&svc, email, None), Err(AppError::Validation(_))));
        }
        let short = svc.register(&RegisterRequest {
            email: Some("a@x.com".into()),
            password: Some("12345".into()),
            name: Some("A".into()),
            ..Default::default()
        });
        assert!(matches!(short, Err(AppError::Validation(_))));
        let nameless = svc.register(&RegisterRequest {
            email: Some("a@x.com".into()),
            password: Some("123456".into()),
            ..Default::default()
        });
        assert!(matches!(nameless, Err(AppError::Validation(_))));
    }

    #[test]
    fn test_register_rejects_admin_and_unknown_roles() {
        let svc = service();
        assert!(matches!(register(&svc, "a@x.com", Some("admin")), Err(AppError::Validation(_))));
        assert!(matches!(register(&svc, "a@x.com", Some("nurse")), Err(AppError::Validation(_))));
        assert!(register(&svc, "a@x.com", Some("doctor")).is_ok());
    }

    #[test]
    fn test_duplicate_email_creates_nothing() {
        let svc = service();
        register(&svc, "dup@x.com", None).unwrap();
        assert!(matches!(register(&svc, "dup@x.com", None), Err(AppError::Duplicate(_))));
        assert!(matches!(register(&svc, "DUP@x.com", None), Err(AppError::Duplicate(_))));

        let conn = svc.database().get_connection().unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM users", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_username_collision_gets_suffix() {
        let svc = service();
        let a = register(&svc, "sam@one.com", None).unwrap();
        let b = register(&svc, "sam@two.com", None).unwrap();
        let c = register(&svc, "sam@three.com", None).unwrap();
        assert_eq!(svc.profile(a).unwrap().username, "sam");
        assert_eq!(svc.profile(b).unwrap().username, "sam2");
        assert_eq!(svc.profile(c).unwrap().username, "sam3");
    }

    #[test]
    fn test_login_errors_are_undifferentiated() {
        let svc = service();
        register(&svc, "patient@x.com", None).unwrap();

        let unknown = login(&svc, "nobody@x.com", "secret1").unwrap_err();
        let wrong = login(&svc, "patient@x.com", "wrong-password").unwrap_err();
        assert!(matches!(unknown, AppError::Auth(_)));
        assert_eq!(unknown.to_string(), wrong.to_string());

        assert!(matches!(login(&svc, "", "x"), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_login_then_verify() {
        let svc = service();
        let id = register(&svc, "patient@x.com", None).unwrap();
        let response = login(&svc, "patient@x.com", "secret1").unwrap();
        assert_eq!(response.user.id, id);

        let user = svc.verify(&response.token).unwrap();
        assert_eq!(user.id, id);
        assert!(matches!(svc.verify("garbage"), Err(AppError::Auth(_))));
    }

    #[test]
    fn test_token_for_deleted_user_is_rejected() {
        let svc = service();
        let id = register(&svc, "gone@x.com", None).unwrap();
        let token = login(&svc, "gone@x.com", "secret1").unwrap().token;
        {
            let conn = svc.database().get_connection().unwrap();
            users::delete(&conn, id).unwrap();
        }
        assert!(matches!(svc.verify(&token), Err(AppError::Auth(_))));
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let svc = service();
        let id = register(&svc, "p@x.com", None).unwrap();
        let issued = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        let token = svc.tokens().issue_at(id, "p@x.com", Role::Patient, issued).unwrap();
        assert!(matches!(svc.verify(&token), Err(AppError::Auth(_))));
    }

    #[test]
    fn test_create_admin_and_reset_password() {
        let svc = service();
        let id = svc.create_admin("root@x.com", "adminpw", "Root", None).unwrap();
        assert_eq!(svc.profile(id).unwrap().role, Role::Admin);

        svc.reset_password("root@x.com", "newpassword").unwrap();
        assert!(login(&svc, "root@x.com", "adminpw").is_err());
        assert!(login(&svc, "root@x.com", "newpassword").is_ok());

        assert!(matches!(
            svc.reset_password("missing@x.com", "newpassword"),
            Err(AppError::NotFound(_))
        ));
    }
}
