use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::extract::{ApiJson, ApiPath, CurrentUser};
use super::{ApiState, ErrorBody, MessageResponse};
use crate::engine::appointments::{CreateAppointmentRequest, UpdateStatusRequest};
use crate::engine::error::AppResult;
use crate::engine::models::{Appointment, AppointmentDetails, AppointmentId};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AppointmentResponse {
    pub message: String,
    pub appointment: Appointment,
}

#[utoipa::path(
    post,
    path = "/api/appointments",
    request_body = CreateAppointmentRequest,
    responses(
        (status = 201, description = "Appointment booked as pending", body = AppointmentResponse),
        (status = 400, description = "Missing doctor or date, or target is not a doctor", body = ErrorBody),
        (status = 403, description = "Caller is not a patient", body = ErrorBody),
        (status = 404, description = "No such doctor", body = ErrorBody)
    ),
    security(("bearer_auth" = [])),
    tag = "appointments"
)]
pub async fn create_appointment(
    State(state): State<ApiState>,
    user: CurrentUser,
    ApiJson(request): ApiJson<CreateAppointmentRequest>,
) -> AppResult<(StatusCode, Json<AppointmentResponse>)> {
    let appointment = state.appointments.create(&user.caller(), &request)?;
    Ok((
        StatusCode::CREATED,
        Json(AppointmentResponse {
            message: "Appointment created".to_string(),
            appointment,
        }),
    ))
}

#[utoipa::path(
    get,
    path = "/api/appointments",
    responses((status = 200, description = "Appointments visible to the caller", body = Vec<AppointmentDetails>)),
    security(("bearer_auth" = [])),
    tag = "appointments"
)]
pub async fn list_appointments(
    State(state): State<ApiState>,
    user: CurrentUser,
) -> AppResult<Json<Vec<AppointmentDetails>>> {
    state.appointments.list(&user.caller()).map(Json)
}

#[utoipa::path(
    get,
    path = "/api/appointments/{id}",
    params(("id" = i64, Path, description = "Appointment id")),
    responses(
        (status = 200, description = "Appointment with both parties", body = AppointmentDetails),
        (status = 403, description = "Caller is not a party", body = ErrorBody),
        (status = 404, description = "No such appointment", body = ErrorBody)
    ),
    security(("bearer_auth" = [])),
    tag = "appointments"
)]
pub async fn get_appointment(
    State(state): State<ApiState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<AppointmentId>,
) -> AppResult<Json<AppointmentDetails>> {
    state.appointments.get(&user.caller(), id).map(Json)
}

#[utoipa::path(
    patch,
    path = "/api/appointments/{id}/status",
    params(("id" = i64, Path, description = "Appointment id")),
    request_body = UpdateStatusRequest,
    responses(
        (status = 200, description = "Status changed", body = AppointmentResponse),
        (status = 400, description = "Unknown status or transition not allowed", body = ErrorBody),
        (status = 403, description = "Caller is not a party", body = ErrorBody),
        (status = 404, description = "No such appointment", body = ErrorBody)
    ),
    security(("bearer_auth" = [])),
    tag = "appointments"
)]
pub async fn update_status(
    State(state): State<ApiState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<AppointmentId>,
    ApiJson(request): ApiJson<UpdateStatusRequest>,
) -> AppResult<Json<AppointmentResponse>> {
    let appointment = state.appointments.update_status(&user.caller(), id, &request)?;
    Ok(Json(AppointmentResponse {
        message: "Status updated".to_string(),
        appointment,
    }))
}

#[utoipa::path(
    delete,
    path = "/api/appointments/{id}",
    params(("id" = i64, Path, description = "Appointment id")),
    responses(
        (status = 200, description = "Appointment deleted", body = MessageResponse),
        (status = 403, description = "Only the patient or an administrator may delete", body = ErrorBody),
        (status = 404, description = "No such appointment", body = ErrorBody)
    ),
    security(("bearer_auth" = [])),
    tag = "appointments"
)]
pub async fn delete_appointment(
    State(state): State<ApiState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<AppointmentId>,
) -> AppResult<Json<MessageResponse>> {
    state.appointments.delete(&user.caller(), id)?;
    Ok(MessageResponse::new("Appointment deleted"))
}
