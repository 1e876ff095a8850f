// Medbook Engine - Core module structure
pub mod config;
pub mod database;
pub mod migrations;
pub mod error;
pub mod models;
pub mod rbac;
pub mod lifecycle;
pub mod validate;
pub mod store;
pub mod auth;
pub mod users;
pub mod appointments;
pub mod api;
pub mod client;
pub mod cli;

pub use config::Config;
pub use database::Database;
pub use error::{AppError, AppResult};
