//! Password hashing
//!
//! Salted bcrypt hashes; plaintext never leaves this module.

use crate::engine::error::AppResult;

/// A valid bcrypt hash of a random string, used when the login e-mail is
/// unknown so the response time matches a wrong-password attempt.
const DUMMY_HASH: &str = "$2b$10$N9qo8uLOickgx2ZMRZoMyeIjZAgcfl7p92ldGxad68LJZdL17lhWy";

#[derive(Debug, Clone, Copy)]
pub struct PasswordHasher {
    cost: u32,
}

impl PasswordHasher {
    pub fn new(cost: u32) -> Self {
        Self { cost }
    }

    pub fn hash(&self, password: &str) -> AppResult<String> {
        Ok(bcrypt::hash(password, self.cost)?)
    }

    /// Compare against a stored hash. A malformed hash counts as a mismatch.
    pub fn verify(&self, password: &str, hash: &str) -> bool {
        bcrypt::verify(password, hash).unwrap_or(false)
    }

    /// Burn one verification for an unknown account.
    pub fn verify_dummy(&self, password: &str) {
        let _ = bcrypt::verify(password, DUMMY_HASH);
    }
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self::new(10)
    }
}
