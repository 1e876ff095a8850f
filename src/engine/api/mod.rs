//! Medbook API Module
//! REST endpoints with OpenAPI documentation

use axum::{
    extract::Request,
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Json, Response},
    routing::{get, patch, post, put},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi, ToSchema};
use utoipa_swagger_ui::SwaggerUi;

use crate::engine::appointments::AppointmentsService;
use crate::engine::auth::AuthService;
use crate::engine::config::{Config, RunMode};
use crate::engine::database::Database;
use crate::engine::error::InternalDetail;
use crate::engine::users::UsersService;

pub mod admin;
pub mod appointments;
pub mod auth;
pub mod extract;
pub mod users;

#[derive(Clone)]
pub struct ApiState {
    pub auth: AuthService,
    pub users: UsersService,
    pub appointments: AppointmentsService,
    pub mode: RunMode,
}

impl ApiState {
    /// Wire every service onto one store. `config` must already be validated.
    pub fn new(db: Database, config: &Config) -> Self {
        let auth = AuthService::from_config(db.clone(), config);
        Self {
            users: UsersService::new(auth.clone()),
            appointments: AppointmentsService::new(db),
            auth,
            mode: config.mode,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: &str) -> Json<Self> {
        Json(Self {
            message: message.to_string(),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    pub error: String,
}

#[derive(OpenApi)]
#[openapi(
    paths(
        auth::register,
        auth::login,
        auth::verify,
        auth::profile,
        users::list_doctors,
        users::search_users,
        users::update_profile,
        users::get_user,
        users::doctor_stats,
        appointments::create_appointment,
        appointments::list_appointments,
        appointments::get_appointment,
        appointments::update_status,
        appointments::delete_appointment,
        admin::list_users,
        admin::create_user,
        admin::update_user,
        admin::delete_user,
        admin::stats,
        admin::list_appointments,
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "auth", description = "Registration, login and session tokens"),
        (name = "users", description = "Profiles and the doctor directory"),
        (name = "appointments", description = "Booking and status lifecycle"),
        (name = "admin", description = "Administrator-only management"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

pub fn create_router(state: ApiState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);
    let development = state.mode.is_development();

    let api = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/verify", get(auth::verify))
        .route("/auth/profile", get(auth::profile))
        .route("/users/doctors", get(users::list_doctors))
        .route("/users/doctors/{id}/stats", get(users::doctor_stats))
        .route("/users/search", get(users::search_users))
        .route("/users/profile", put(users::update_profile))
        .route("/users/{id}", get(users::get_user))
        .route(
            "/appointments",
            post(appointments::create_appointment).get(appointments::list_appointments),
        )
        .route(
            "/appointments/{id}",
            get(appointments::get_appointment).delete(appointments::delete_appointment),
        )
        .route("/appointments/{id}/status", patch(appointments::update_status))
        .route("/admin/users", get(admin::list_users).post(admin::create_user))
        .route("/admin/users/{id}", put(admin::update_user).delete(admin::delete_user))
        .route("/admin/stats", get(admin::stats))
        .route("/admin/appointments", get(admin::list_appointments))
        .route("/health", get(health_check));

    let mut router = Router::new()
        .route("/", get(root))
        .nest("/api", api)
        .merge(SwaggerUi::new("/api/docs").url("/api/openapi.json", ApiDoc::openapi()))
        .fallback(not_found)
        .with_state(state);

    if development {
        router = router.layer(middleware::from_fn(expose_internal_detail));
    }

    router.layer(cors).layer(TraceLayer::new_for_http())
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn root() -> Json<serde_json::Value> {
    Json(json!({
        "name": "Medbook API",
        "version": env!("CARGO_PKG_VERSION"),
        "docs": "/api/docs",
    }))
}

async fn not_found() -> (StatusCode, Json<ErrorBody>) {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorBody {
            error: "Route not found".to_string(),
        }),
    )
}

/// Development mode: put the withheld detail of a 500 back into the body.
async fn expose_internal_detail(request: Request, next: Next) -> Response {
    let response = next.run(request).await;
    let Some(InternalDetail(detail)) = response.extensions().get::<InternalDetail>().cloned() else {
        return response;
    };
    (
        response.status(),
        Json(json!({ "error": "Internal server error", "details": detail })),
    )
        .into_response()
}
