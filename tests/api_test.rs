//! End-to-end checks of the HTTP surface, driven in-process through the router.

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use medbook_lib::engine::api::{create_router, ApiState};
use medbook_lib::engine::config::{Config, RunMode};
use medbook_lib::engine::database::Database;
use serde_json::{json, Value};
use tower::ServiceExt;

const PASSWORD: &str = "secret123";

fn test_config(mode: RunMode) -> Config {
    let mut config = Config::default();
    config.mode = mode;
    config.auth.bcrypt_cost = 4;
    config.auth.jwt_secret = Some("integration-test-secret-0123456789".to_string());
    config
}

struct TestApp {
    router: Router,
    state: ApiState,
}

impl TestApp {
    fn new() -> Self {
        Self::with_mode(RunMode::Development)
    }

    fn with_mode(mode: RunMode) -> Self {
        let db = Database::in_memory().expect("in-memory database");
        let state = ApiState::new(db, &test_config(mode));
        Self {
            router: create_router(state.clone()),
            state,
        }
    }

    async fn call(&self, method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    async fn register(&self, email: &str, name: &str, role: &str) -> i64 {
        let (status, body) = self
            .call(
                "POST",
                "/api/auth/register",
                None,
                Some(json!({ "email": email, "password": PASSWORD, "name": name, "role": role })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        body["user_id"].as_i64().unwrap()
    }

    async fn login(&self, email: &str) -> String {
        let (status, body) = self
            .call(
                "POST",
                "/api/auth/login",
                None,
                Some(json!({ "email": email, "password": PASSWORD })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        body["token"].as_str().unwrap().to_string()
    }

    async fn admin(&self, email: &str) -> (i64, String) {
        let id = self.state.auth.create_admin(email, PASSWORD, "Site Admin", None).unwrap();
        (id, self.login(email).await)
    }

    async fn book(&self, token: &str, doctor_id: i64) -> (StatusCode, Value) {
        self.call(
            "POST",
            "/api/appointments",
            Some(token),
            Some(json!({ "doctor_id": doctor_id, "appointment_date": "2030-06-01T10:00", "reason": "Checkup" })),
        )
        .await
    }

    async fn set_status(&self, token: &str, id: i64, status: &str) -> (StatusCode, Value) {
        self.call(
            "PATCH",
            &format!("/api/appointments/{}/status", id),
            Some(token),
            Some(json!({ "status": status })),
        )
        .await
    }
}

#[tokio::test]
async fn test_booking_lifecycle_walkthrough() {
    let app = TestApp::new();
    let doctor_id = app.register("house@clinic.test", "Greg House", "doctor").await;
    app.register("pat@mail.test", "Pat Smith", "patient").await;
    let doctor = app.login("house@clinic.test").await;
    let patient = app.login("pat@mail.test").await;

    let (status, body) = app.book(&patient, doctor_id).await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["appointment"]["status"], "pending");
    let id = body["appointment"]["id"].as_i64().unwrap();

    let (status, list) = app.call("GET", "/api/appointments", Some(&patient), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list.as_array().unwrap().len(), 1);
    assert_eq!(list[0]["doctor_name"], "Greg House");

    let (status, list) = app.call("GET", "/api/appointments", Some(&doctor), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list[0]["patient_name"], "Pat Smith");

    let (status, body) = app.set_status(&doctor, id, "confirmed").await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["appointment"]["status"], "confirmed");

    // Once confirmed, only the doctor or an admin may cancel.
    let (status, body) = app.set_status(&patient, id, "cancelled").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Cannot change status from confirmed to cancelled");

    let (status, body) = app.set_status(&doctor, id, "completed").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["appointment"]["status"], "completed");

    for next in ["cancelled", "confirmed", "pending", "completed"] {
        let (status, _) = app.set_status(&doctor, id, next).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "completed -> {}", next);
    }

    let (status, _) = app.set_status(&doctor, id, "archived").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, stats) = app
        .call("GET", &format!("/api/users/doctors/{}/stats", doctor_id), Some(&doctor), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["appointments"]["total"], 1);
    assert_eq!(stats["appointments"]["completed"], 1);
    assert_eq!(stats["upcoming"], 1);

    let (status, _) = app
        .call("GET", &format!("/api/users/doctors/{}/stats", doctor_id), Some(&patient), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_patient_may_cancel_pending() {
    let app = TestApp::new();
    let doctor_id = app.register("doc@clinic.test", "Doc", "doctor").await;
    app.register("pat@mail.test", "Pat", "patient").await;
    let patient = app.login("pat@mail.test").await;

    let (_, body) = app.book(&patient, doctor_id).await;
    let id = body["appointment"]["id"].as_i64().unwrap();

    let (status, _) = app.set_status(&patient, id, "confirmed").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app.set_status(&patient, id, "cancelled").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["appointment"]["status"], "cancelled");
}

#[tokio::test]
async fn test_booking_rules() {
    let app = TestApp::new();
    let doctor_id = app.register("doc@clinic.test", "Doc", "doctor").await;
    let patient_id = app.register("pat@mail.test", "Pat", "patient").await;
    let doctor = app.login("doc@clinic.test").await;
    let patient = app.login("pat@mail.test").await;

    let (status, body) = app.book(&doctor, doctor_id).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "Only patients can book appointments");

    let (status, body) = app.book(&patient, patient_id).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Selected user is not a doctor");

    let (status, _) = app.book(&patient, 9999).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .call("POST", "/api/appointments", Some(&patient), Some(json!({ "doctor_id": doctor_id })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .call(
            "POST",
            "/api/appointments",
            Some(&patient),
            Some(json!({ "doctor_id": doctor_id, "appointment_date": "next tuesday" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unrelated_users_are_kept_out() {
    let app = TestApp::new();
    let doctor_id = app.register("doc@clinic.test", "Doc", "doctor").await;
    app.register("pat@mail.test", "Pat", "patient").await;
    app.register("other@mail.test", "Other", "patient").await;
    let patient = app.login("pat@mail.test").await;
    let other = app.login("other@mail.test").await;

    let (_, body) = app.book(&patient, doctor_id).await;
    let id = body["appointment"]["id"].as_i64().unwrap();
    let uri = format!("/api/appointments/{}", id);

    let (status, _) = app.call("GET", &uri, Some(&other), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app.set_status(&other, id, "cancelled").await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app.call("DELETE", &uri, Some(&other), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, list) = app.call("GET", "/api/appointments", Some(&other), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(list.as_array().unwrap().is_empty());

    let (status, _) = app.call("GET", "/api/appointments/9999", Some(&other), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = app.call("GET", &uri, Some(&patient), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["doctor_name"], "Doc");

    let (status, _) = app.call("DELETE", &uri, Some(&patient), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.call("GET", &uri, Some(&patient), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_registration_validation() {
    let app = TestApp::new();
    app.register("dup@mail.test", "First", "patient").await;

    let (status, body) = app
        .call(
            "POST",
            "/api/auth/register",
            None,
            Some(json!({ "email": "dup@mail.test", "password": PASSWORD, "name": "Second" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "This email is already in use");

    let (status, _) = app
        .call(
            "POST",
            "/api/auth/register",
            None,
            Some(json!({ "email": "boss@mail.test", "password": PASSWORD, "name": "Boss", "role": "admin" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .call(
            "POST",
            "/api/auth/register",
            None,
            Some(json!({ "email": "short@mail.test", "password": "123", "name": "Short" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .call(
            "POST",
            "/api/auth/register",
            None,
            Some(json!({ "email": "not-an-email", "password": PASSWORD, "name": "Nobody" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .call("POST", "/api/auth/register", None, Some(json!({ "email": "x@mail.test" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_login_failures_look_alike() {
    let app = TestApp::new();
    app.register("pat@mail.test", "Pat", "patient").await;

    let (wrong_status, wrong_body) = app
        .call(
            "POST",
            "/api/auth/login",
            None,
            Some(json!({ "email": "pat@mail.test", "password": "wrong-password" })),
        )
        .await;
    let (unknown_status, unknown_body) = app
        .call(
            "POST",
            "/api/auth/login",
            None,
            Some(json!({ "email": "nobody@mail.test", "password": PASSWORD })),
        )
        .await;

    assert_eq!(wrong_status, StatusCode::UNAUTHORIZED);
    assert_eq!(unknown_status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong_body, unknown_body);
    assert_eq!(wrong_body["error"], "Invalid email or password");
}

#[tokio::test]
async fn test_token_handling() {
    let app = TestApp::new();
    app.register("pat@mail.test", "Pat", "patient").await;
    let token = app.login("pat@mail.test").await;

    let (status, body) = app.call("GET", "/api/appointments", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Missing token");

    let (status, _) = app.call("GET", "/api/auth/verify", Some("not.a.token"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = app.call("GET", "/api/auth/verify", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["valid"], true);
    assert_eq!(body["user"]["email"], "pat@mail.test");
    assert_eq!(body["user"]["username"], "pat");
    assert!(body["user"].get("password").is_none());

    let (status, body) = app.call("GET", "/api/auth/profile", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["role"], "patient");
}

#[tokio::test]
async fn test_profile_update_and_public_directory() {
    let app = TestApp::new();
    app.register("b@clinic.test", "Beta Doctor", "doctor").await;
    app.register("a@clinic.test", "Alpha Doctor", "doctor").await;
    app.register("pat@mail.test", "Pat", "patient").await;
    let patient = app.login("pat@mail.test").await;

    let (status, doctors) = app.call("GET", "/api/users/doctors", None, None).await;
    assert_eq!(status, StatusCode::OK);
    let names: Vec<&str> = doctors
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d["full_name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["Alpha Doctor", "Beta Doctor"]);

    let (status, body) = app
        .call(
            "PUT",
            "/api/users/profile",
            Some(&patient),
            Some(json!({ "name": "Patricia", "phone": "555-0100" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["full_name"], "Patricia");
    assert_eq!(body["user"]["phone"], "555-0100");

    let (status, _) = app
        .call("PUT", "/api/users/profile", Some(&patient), Some(json!({})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_admin_search_by_role() {
    let app = TestApp::new();
    app.register("dupont@clinic.test", "Anne Dupont", "doctor").await;
    app.register("dupuis@mail.test", "Marc Dupuis", "patient").await;
    app.register("smith@clinic.test", "John Smith", "doctor").await;
    let (_, admin) = app.admin("root@clinic.test").await;
    let patient = app.login("dupuis@mail.test").await;

    let (status, found) = app
        .call("GET", "/api/users/search?query=dup&role=doctor", Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let found = found.as_array().unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0]["full_name"], "Anne Dupont");

    let (status, found) = app.call("GET", "/api/users/search?query=dup", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(found.as_array().unwrap().len(), 2);

    let (status, _) = app
        .call("GET", "/api/users/search?role=surgeon", Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app.call("GET", "/api/users/search?query=dup", Some(&patient), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_admin_user_management() {
    let app = TestApp::new();
    let (admin_id, admin) = app.admin("root@clinic.test").await;
    app.register("pat@mail.test", "Pat", "patient").await;
    let patient = app.login("pat@mail.test").await;

    let (status, body) = app
        .call(
            "POST",
            "/api/admin/users",
            Some(&admin),
            Some(json!({ "email": "new@clinic.test", "password": PASSWORD, "name": "New Doc", "role": "doctor" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    let new_id = body["user_id"].as_i64().unwrap();

    let (status, _) = app
        .call(
            "PUT",
            &format!("/api/admin/users/{}", new_id),
            Some(&admin),
            Some(json!({ "name": "Renamed Doc", "phone": "555-0199" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, user) = app.call("GET", &format!("/api/users/{}", new_id), Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(user["full_name"], "Renamed Doc");
    assert_eq!(user["role"], "doctor");

    let (status, users) = app.call("GET", "/api/admin/users", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(users.as_array().unwrap().len(), 3);

    let (status, _) = app.call("GET", "/api/admin/users", Some(&patient), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app.call("GET", "/api/admin/stats", Some(&patient), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .call("DELETE", &format!("/api/admin/users/{}", admin_id), Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "You cannot delete your own account");

    let (status, _) = app.call("DELETE", "/api/admin/users/9999", Some(&admin), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_deleting_user_cascades() {
    let app = TestApp::new();
    let doctor_id = app.register("doc@clinic.test", "Doc", "doctor").await;
    app.register("pat@mail.test", "Pat", "patient").await;
    let doctor = app.login("doc@clinic.test").await;
    let patient = app.login("pat@mail.test").await;
    let (_, admin) = app.admin("root@clinic.test").await;

    let (status, _) = app.book(&patient, doctor_id).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, stats) = app.call("GET", "/api/admin/stats", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["recent_appointments"], 1);

    let (status, _) = app
        .call("DELETE", &format!("/api/admin/users/{}", doctor_id), Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, all) = app.call("GET", "/api/admin/appointments", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(all.as_array().unwrap().is_empty());

    let (_, mine) = app.call("GET", "/api/appointments", Some(&patient), None).await;
    assert!(mine.as_array().unwrap().is_empty());

    // The deleted doctor's token no longer resolves to an account.
    let (status, _) = app.call("GET", "/api/auth/verify", Some(&doctor), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_router_edges() {
    let app = TestApp::with_mode(RunMode::Production);

    let (status, body) = app.call("GET", "/api/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let (status, body) = app.call("GET", "/api/nowhere", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Route not found");

    let request = Request::builder()
        .method("POST")
        .uri("/api/auth/login")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let (status, doc) = app.call("GET", "/api/openapi.json", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(doc["paths"].get("/api/appointments/{id}/status").is_some());
}

#[tokio::test]
async fn test_non_numeric_ids_are_json_errors() {
    let app = TestApp::new();
    app.register("pat@mail.test", "Pat", "patient").await;
    let patient = app.login("pat@mail.test").await;
    let (_, admin) = app.admin("root@clinic.test").await;

    let (status, body) = app.call("GET", "/api/appointments/abc", Some(&patient), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("abc"), "{}", body);

    let (status, body) = app.call("GET", "/api/users/1.5", Some(&patient), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    let (status, body) = app.call("DELETE", "/api/admin/users/me", Some(&admin), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}

async fn internal_failure(mode: RunMode) -> (StatusCode, Value) {
    let app = TestApp::with_mode(mode);
    app.register("pat@mail.test", "Pat", "patient").await;
    let patient = app.login("pat@mail.test").await;

    app.state
        .auth
        .database()
        .get_connection()
        .unwrap()
        .execute_batch("DROP TABLE appointments")
        .unwrap();

    app.call("GET", "/api/appointments", Some(&patient), None).await
}

#[tokio::test]
async fn test_internal_errors_only_detailed_in_development() {
    let (status, body) = internal_failure(RunMode::Development).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Internal server error");
    assert!(body["details"].as_str().unwrap().contains("appointments"), "{}", body);

    let (status, body) = internal_failure(RunMode::Production).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Internal server error");
    assert!(body.get("details").is_none(), "{}", body);
}
