use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::extract::{ApiJson, ApiPath, CurrentUser};
use super::{ApiState, ErrorBody};
use crate::engine::error::AppResult;
use crate::engine::models::{DoctorSummary, UserId, UserSummary};
use crate::engine::users::{DoctorStats, SearchQuery, UpdateProfileRequest};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UpdateProfileResponse {
    pub message: String,
    pub user: UserSummary,
}

#[utoipa::path(
    get,
    path = "/api/users/doctors",
    responses((status = 200, description = "Doctor directory, by name", body = Vec<DoctorSummary>)),
    tag = "users"
)]
pub async fn list_doctors(State(state): State<ApiState>) -> AppResult<Json<Vec<DoctorSummary>>> {
    state.users.list_doctors().map(Json)
}

#[utoipa::path(
    get,
    path = "/api/users/search",
    params(
        ("query" = Option<String>, Query, description = "Substring of name, e-mail or username"),
        ("role" = Option<String>, Query, description = "patient, doctor or admin"),
    ),
    responses(
        (status = 200, description = "At most 50 users, newest first", body = Vec<UserSummary>),
        (status = 403, description = "Not an administrator", body = ErrorBody)
    ),
    security(("bearer_auth" = [])),
    tag = "users"
)]
pub async fn search_users(
    State(state): State<ApiState>,
    user: CurrentUser,
    Query(query): Query<SearchQuery>,
) -> AppResult<Json<Vec<UserSummary>>> {
    state.users.search(&user.caller(), &query).map(Json)
}

#[utoipa::path(
    put,
    path = "/api/users/profile",
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Profile updated", body = UpdateProfileResponse),
        (status = 400, description = "Nothing to update", body = ErrorBody)
    ),
    security(("bearer_auth" = [])),
    tag = "users"
)]
pub async fn update_profile(
    State(state): State<ApiState>,
    user: CurrentUser,
    ApiJson(request): ApiJson<UpdateProfileRequest>,
) -> AppResult<Json<UpdateProfileResponse>> {
    let updated = state.users.update_profile(&user.caller(), &request)?;
    Ok(Json(UpdateProfileResponse {
        message: "Profile updated".to_string(),
        user: updated,
    }))
}

#[utoipa::path(
    get,
    path = "/api/users/{id}",
    params(("id" = i64, Path, description = "User id")),
    responses(
        (status = 200, description = "User", body = UserSummary),
        (status = 403, description = "Neither the user nor an administrator", body = ErrorBody),
        (status = 404, description = "No such user", body = ErrorBody)
    ),
    security(("bearer_auth" = [])),
    tag = "users"
)]
pub async fn get_user(
    State(state): State<ApiState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<UserId>,
) -> AppResult<Json<UserSummary>> {
    state.users.get(&user.caller(), id).map(Json)
}

#[utoipa::path(
    get,
    path = "/api/users/doctors/{id}/stats",
    params(("id" = i64, Path, description = "Doctor id")),
    responses(
        (status = 200, description = "Appointment counters", body = DoctorStats),
        (status = 404, description = "No such doctor", body = ErrorBody)
    ),
    security(("bearer_auth" = [])),
    tag = "users"
)]
pub async fn doctor_stats(
    State(state): State<ApiState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<UserId>,
) -> AppResult<Json<DoctorStats>> {
    state.users.doctor_stats(&user.caller(), id).map(Json)
}
