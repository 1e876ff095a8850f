//! Medbook HTTP Client
//! Typed blocking client for the REST API plus the on-disk login session

use reqwest::blocking::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::engine::api::admin::CreateUserResponse;
use crate::engine::api::appointments::AppointmentResponse;
use crate::engine::api::users::UpdateProfileResponse;
use crate::engine::api::MessageResponse;
use crate::engine::appointments::{CreateAppointmentRequest, UpdateStatusRequest};
use crate::engine::auth::service::{LoginResponse, RegisterResponse, VerifyResponse};
use crate::engine::auth::{LoginRequest, RegisterRequest};
use crate::engine::models::{AppointmentDetails, AppointmentId, DoctorSummary, UserId, UserSummary};
use crate::engine::users::{
    AdminUpdateRequest, CreateUserRequest, DoctorStats, SearchQuery, SystemStats, UpdateProfileRequest,
};

pub const DEFAULT_SERVER: &str = "http://127.0.0.1:5000";
const SESSION_FILE: &str = "session.json";

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),
    #[error("{message} (HTTP {status})")]
    ApiError { status: u16, message: String },
    #[error("Not logged in. Run `medbook login` first")]
    NotAuthenticated,
    #[error("Session file error: {0}")]
    SessionIo(#[from] std::io::Error),
    #[error("Session file is corrupt: {0}")]
    SessionFormat(#[from] serde_json::Error),
    #[error("Could not locate a config directory for the session file")]
    NoSessionDir,
}

impl ClientError {
    /// HTTP status of an API rejection, if this is one.
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::ApiError { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[derive(Deserialize)]
struct ErrorPayload {
    error: String,
}

/// A logged-in session as persisted between CLI invocations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub server: String,
    pub token: String,
    pub user: UserSummary,
}

/// Where the session lives on disk
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// `<config dir>/medbook/session.json`
    pub fn default_location() -> Result<Self, ClientError> {
        let dir = dirs::config_dir().ok_or(ClientError::NoSessionDir)?;
        Ok(Self::new(dir.join("medbook").join(SESSION_FILE)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<Option<Session>, ClientError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&self.path)?;
        Ok(Some(serde_json::from_str(&content)?))
    }

    pub fn save(&self, session: &Session) -> Result<(), ClientError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        write_private(&self.path, serde_json::to_string_pretty(session)?.as_bytes())?;
        Ok(())
    }

    /// Forget the session; returns whether one existed.
    pub fn clear(&self) -> Result<bool, ClientError> {
        if self.path.exists() {
            std::fs::remove_file(&self.path)?;
            Ok(true)
        } else {
            Ok(false)
        }
    }
}

/// The session holds a bearer token, so only the owner may read it.
#[cfg(unix)]
fn write_private(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    use std::io::Write;
    use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    // mode() only applies on creation
    file.set_permissions(std::fs::Permissions::from_mode(0o600))?;
    file.write_all(contents)
}

#[cfg(not(unix))]
fn write_private(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    std::fs::write(path, contents)
}

pub struct MedbookClient {
    base_url: String,
    token: Option<String>,
    http: Client,
}

impl MedbookClient {
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        let http = Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token: None,
            http,
        })
    }

    pub fn from_session(session: &Session) -> Result<Self, ClientError> {
        Ok(Self::new(&session.server)?.with_token(session.token.clone()))
    }

    pub fn with_token(mut self, token: String) -> Self {
        self.token = Some(token);
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api{}", self.base_url, path)
    }

    fn authorized(&self, request: RequestBuilder) -> Result<RequestBuilder, ClientError> {
        let token = self.token.as_deref().ok_or(ClientError::NotAuthenticated)?;
        Ok(request.bearer_auth(token))
    }

    fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ClientError> {
        let response = request.send()?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().unwrap_or_default();
            let message = serde_json::from_str::<ErrorPayload>(&text)
                .map(|p| p.error)
                .unwrap_or(text);
            return Err(ClientError::ApiError {
                status: status.as_u16(),
                message,
            });
        }
        Ok(response.json()?)
    }

    // Auth

    pub fn register(&self, request: &RegisterRequest) -> Result<RegisterResponse, ClientError> {
        self.send(self.http.post(self.url("/auth/register")).json(request))
    }

    /// Log in and keep the token on this client.
    pub fn login(&mut self, email: &str, password: &str) -> Result<LoginResponse, ClientError> {
        let request = LoginRequest {
            email: Some(email.to_string()),
            password: Some(password.to_string()),
        };
        let response: LoginResponse = self.send(self.http.post(self.url("/auth/login")).json(&request))?;
        self.token = Some(response.token.clone());
        Ok(response)
    }

    pub fn verify(&self) -> Result<VerifyResponse, ClientError> {
        self.send(self.authorized(self.http.get(self.url("/auth/verify")))?)
    }

    pub fn profile(&self) -> Result<UserSummary, ClientError> {
        self.send(self.authorized(self.http.get(self.url("/auth/profile")))?)
    }

    // Users

    pub fn doctors(&self) -> Result<Vec<DoctorSummary>, ClientError> {
        self.send(self.http.get(self.url("/users/doctors")))
    }

    pub fn update_profile(&self, request: &UpdateProfileRequest) -> Result<UpdateProfileResponse, ClientError> {
        self.send(self.authorized(self.http.put(self.url("/users/profile")))?.json(request))
    }

    pub fn search_users(&self, query: &SearchQuery) -> Result<Vec<UserSummary>, ClientError> {
        self.send(self.authorized(self.http.get(self.url("/users/search")))?.query(query))
    }

    pub fn user(&self, id: UserId) -> Result<UserSummary, ClientError> {
        self.send(self.authorized(self.http.get(self.url(&format!("/users/{}", id))))?)
    }

    pub fn doctor_stats(&self, doctor_id: UserId) -> Result<DoctorStats, ClientError> {
        let url = self.url(&format!("/users/doctors/{}/stats", doctor_id));
        self.send(self.authorized(self.http.get(url))?)
    }

    // Appointments

    pub fn appointments(&self) -> Result<Vec<AppointmentDetails>, ClientError> {
        self.send(self.authorized(self.http.get(self.url("/appointments")))?)
    }

    pub fn appointment(&self, id: AppointmentId) -> Result<AppointmentDetails, ClientError> {
        self.send(self.authorized(self.http.get(self.url(&format!("/appointments/{}", id))))?)
    }

    pub fn book(&self, request: &CreateAppointmentRequest) -> Result<AppointmentResponse, ClientError> {
        self.send(self.authorized(self.http.post(self.url("/appointments")))?.json(request))
    }

    pub fn update_status(&self, id: AppointmentId, status: &str) -> Result<AppointmentResponse, ClientError> {
        let request = UpdateStatusRequest {
            status: Some(status.to_string()),
        };
        let url = self.url(&format!("/appointments/{}/status", id));
        self.send(self.authorized(self.http.patch(url))?.json(&request))
    }

    pub fn delete_appointment(&self, id: AppointmentId) -> Result<MessageResponse, ClientError> {
        self.send(self.authorized(self.http.delete(self.url(&format!("/appointments/{}", id))))?)
    }

    // Admin

    pub fn admin_users(&self) -> Result<Vec<UserSummary>, ClientError> {
        self.send(self.authorized(self.http.get(self.url("/admin/users")))?)
    }

    pub fn admin_create_user(&self, request: &CreateUserRequest) -> Result<CreateUserResponse, ClientError> {
        self.send(self.authorized(self.http.post(self.url("/admin/users")))?.json(request))
    }

    pub fn admin_update_user(&self, id: UserId, request: &AdminUpdateRequest) -> Result<MessageResponse, ClientError> {
        let url = self.url(&format!("/admin/users/{}", id));
        self.send(self.authorized(self.http.put(url))?.json(request))
    }

    pub fn admin_delete_user(&self, id: UserId) -> Result<MessageResponse, ClientError> {
        self.send(self.authorized(self.http.delete(self.url(&format!("/admin/users/{}", id))))?)
    }

    pub fn admin_stats(&self) -> Result<SystemStats, ClientError> {
        self.send(self.authorized(self.http.get(self.url("/admin/stats")))?)
    }

    pub fn admin_appointments(&self) -> Result<Vec<AppointmentDetails>, ClientError> {
        self.send(self.authorized(self.http.get(self.url("/admin/appointments")))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::rbac::Role;
    use chrono::Utc;
    use tempfile::TempDir;

    fn session() -> Session {
        Session {
            server: DEFAULT_SERVER.to_string(),
            token: "abc.def.ghi".to_string(),
            user: UserSummary {
                id: 1,
                email: "p@x.com".to_string(),
                username: "p".to_string(),
                full_name: "Pat".to_string(),
                role: Role::Patient,
                phone: None,
                created_at: Utc::now(),
            },
        }
    }

    #[test]
    fn test_session_store_lifecycle() {
        let dir = TempDir::new().unwrap();
        let store = SessionStore::new(dir.path().join("nested").join(SESSION_FILE));

        assert_eq!(store.load().unwrap(), None);
        let saved = session();
        store.save(&saved).unwrap();
        assert_eq!(store.load().unwrap(), Some(saved));
        assert!(store.clear().unwrap());
        assert!(!store.clear().unwrap());
        assert_eq!(store.load().unwrap(), None);
    }

    #[test]
    #[cfg(unix)]
    fn test_session_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(SESSION_FILE);
        std::fs::write(&path, "stale").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o644)).unwrap();

        SessionStore::new(path.clone()).save(&session()).unwrap();
        let mode = std::fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600, "session file mode {:o}", mode);
    }

    #[test]
    fn test_corrupt_session_is_reported() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(SESSION_FILE);
        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(
            SessionStore::new(path).load(),
            Err(ClientError::SessionFormat(_))
        ));
    }

    #[test]
    fn test_requests_without_token_fail_locally() {
        let client = MedbookClient::new("http://127.0.0.1:9/").unwrap();
        assert_eq!(client.base_url(), "http://127.0.0.1:9");
        assert!(matches!(client.appointments(), Err(ClientError::NotAuthenticated)));
    }
}
