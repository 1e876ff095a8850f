use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;

use super::extract::{ApiJson, CurrentUser};
use super::{ApiState, ErrorBody};
use crate::engine::auth::service::{LoginResponse, RegisterResponse, VerifyResponse};
use crate::engine::auth::{LoginRequest, RegisterRequest};
use crate::engine::error::AppResult;
use crate::engine::models::UserSummary;

#[utoipa::path(
    post,
    path = "/api/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created", body = RegisterResponse),
        (status = 400, description = "Invalid input or e-mail already registered", body = ErrorBody)
    ),
    tag = "auth"
)]
pub async fn register(
    State(state): State<ApiState>,
    ApiJson(request): ApiJson<RegisterRequest>,
) -> AppResult<(StatusCode, Json<RegisterResponse>)> {
    // bcrypt runs off the async workers
    let auth = state.auth.clone();
    let user_id = tokio::task::spawn_blocking(move || auth.register(&request)).await??;
    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            message: "Registration successful".to_string(),
            user_id,
        }),
    ))
}

#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Session token issued", body = LoginResponse),
        (status = 401, description = "Invalid email or password", body = ErrorBody)
    ),
    tag = "auth"
)]
pub async fn login(
    State(state): State<ApiState>,
    ApiJson(request): ApiJson<LoginRequest>,
) -> AppResult<Json<LoginResponse>> {
    let auth = state.auth.clone();
    let response = tokio::task::spawn_blocking(move || auth.login(&request)).await??;
    Ok(Json(response))
}

#[utoipa::path(
    get,
    path = "/api/auth/verify",
    responses(
        (status = 200, description = "Token is valid", body = VerifyResponse),
        (status = 401, description = "Missing, invalid or expired token", body = ErrorBody)
    ),
    security(("bearer_auth" = [])),
    tag = "auth"
)]
pub async fn verify(user: CurrentUser) -> Json<VerifyResponse> {
    Json(VerifyResponse {
        valid: true,
        user: user.0.summary(),
    })
}

#[utoipa::path(
    get,
    path = "/api/auth/profile",
    responses(
        (status = 200, description = "Current user's profile", body = UserSummary),
        (status = 401, description = "Missing, invalid or expired token", body = ErrorBody)
    ),
    security(("bearer_auth" = [])),
    tag = "auth"
)]
pub async fn profile(State(state): State<ApiState>, user: CurrentUser) -> AppResult<Json<UserSummary>> {
    state.auth.profile(user.0.id).map(Json)
}
