//! Administrator endpoints. Access is decided per operation by the policy
//! table, so a non-admin token gets 403 rather than a missing route.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::extract::{ApiJson, ApiPath, CurrentUser};
use super::{ApiState, ErrorBody, MessageResponse};
use crate::engine::error::AppResult;
use crate::engine::models::{AppointmentDetails, UserId, UserSummary};
use crate::engine::users::{AdminUpdateRequest, CreateUserRequest, SystemStats};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateUserResponse {
    pub message: String,
    pub user_id: UserId,
}

#[utoipa::path(
    get,
    path = "/api/admin/users",
    responses(
        (status = 200, description = "All users, newest first", body = Vec<UserSummary>),
        (status = 403, description = "Not an administrator", body = ErrorBody)
    ),
    security(("bearer_auth" = [])),
    tag = "admin"
)]
pub async fn list_users(State(state): State<ApiState>, user: CurrentUser) -> AppResult<Json<Vec<UserSummary>>> {
    state.users.list_all(&user.caller()).map(Json)
}

#[utoipa::path(
    post,
    path = "/api/admin/users",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "User created", body = CreateUserResponse),
        (status = 400, description = "Invalid input or e-mail already registered", body = ErrorBody),
        (status = 403, description = "Not an administrator", body = ErrorBody)
    ),
    security(("bearer_auth" = [])),
    tag = "admin"
)]
pub async fn create_user(
    State(state): State<ApiState>,
    user: CurrentUser,
    ApiJson(request): ApiJson<CreateUserRequest>,
) -> AppResult<(StatusCode, Json<CreateUserResponse>)> {
    let caller = user.caller();
    let users = state.users.clone();
    let user_id = tokio::task::spawn_blocking(move || users.create(&caller, &request)).await??;
    Ok((
        StatusCode::CREATED,
        Json(CreateUserResponse {
            message: "User created".to_string(),
            user_id,
        }),
    ))
}

#[utoipa::path(
    put,
    path = "/api/admin/users/{id}",
    params(("id" = i64, Path, description = "User id")),
    request_body = AdminUpdateRequest,
    responses(
        (status = 200, description = "User updated", body = MessageResponse),
        (status = 400, description = "Nothing to update or invalid field", body = ErrorBody),
        (status = 404, description = "No such user", body = ErrorBody)
    ),
    security(("bearer_auth" = [])),
    tag = "admin"
)]
pub async fn update_user(
    State(state): State<ApiState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<UserId>,
    ApiJson(request): ApiJson<AdminUpdateRequest>,
) -> AppResult<Json<MessageResponse>> {
    state.users.update(&user.caller(), id, &request)?;
    Ok(MessageResponse::new("User updated"))
}

#[utoipa::path(
    delete,
    path = "/api/admin/users/{id}",
    params(("id" = i64, Path, description = "User id")),
    responses(
        (status = 200, description = "User and their appointments deleted", body = MessageResponse),
        (status = 403, description = "Not an administrator, or own account", body = ErrorBody),
        (status = 404, description = "No such user", body = ErrorBody)
    ),
    security(("bearer_auth" = [])),
    tag = "admin"
)]
pub async fn delete_user(
    State(state): State<ApiState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<UserId>,
) -> AppResult<Json<MessageResponse>> {
    state.users.delete(&user.caller(), id)?;
    Ok(MessageResponse::new("User deleted"))
}

#[utoipa::path(
    get,
    path = "/api/admin/stats",
    responses(
        (status = 200, description = "System counters", body = SystemStats),
        (status = 403, description = "Not an administrator", body = ErrorBody)
    ),
    security(("bearer_auth" = [])),
    tag = "admin"
)]
pub async fn stats(State(state): State<ApiState>, user: CurrentUser) -> AppResult<Json<SystemStats>> {
    state.users.stats(&user.caller()).map(Json)
}

#[utoipa::path(
    get,
    path = "/api/admin/appointments",
    responses(
        (status = 200, description = "Every appointment", body = Vec<AppointmentDetails>),
        (status = 403, description = "Not an administrator", body = ErrorBody)
    ),
    security(("bearer_auth" = [])),
    tag = "admin"
)]
pub async fn list_appointments(
    State(state): State<ApiState>,
    user: CurrentUser,
) -> AppResult<Json<Vec<AppointmentDetails>>> {
    state.appointments.list_all(&user.caller()).map(Json)
}
