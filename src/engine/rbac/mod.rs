//! RBAC Module
//!
//! Role-based and ownership-based access control for users and appointments

pub mod policy;
pub mod enforcer;

pub use policy::{allowed, Action, AppointmentScope, Caller, Resource, Role};
pub use enforcer::{AuthResult, Enforcer};
