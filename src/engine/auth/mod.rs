pub mod password;
pub mod service;
pub mod token;

pub use password::PasswordHasher;
pub use service::{AuthService, LoginRequest, NewAccount, RegisterRequest};
pub use token::{Claims, TokenService};
