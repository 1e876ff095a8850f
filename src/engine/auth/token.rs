//! Session tokens: issue and verify signed JWTs.
//!
//! Tokens carry the user id, e-mail and role and expire a fixed time after
//! issue. Nothing is kept server-side; every request re-checks signature and
//! expiry.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::engine::error::{AppError, AppResult};
use crate::engine::rbac::Role;

/// JWT claims carried by every session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// User id.
    pub id: i64,
    pub email: String,
    pub role: Role,
    /// Issued at (unix timestamp).
    pub iat: i64,
    /// Expiration (unix timestamp).
    pub exp: i64,
}

#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl TokenService {
    pub fn new(secret: &str, ttl: Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is checked against an explicit clock in `verify_at`.
        validation.validate_exp = false;
        validation.leeway = 0;

        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn issue(&self, id: i64, email: &str, role: Role) -> AppResult<String> {
        self.issue_at(id, email, role, Utc::now())
    }

    pub fn issue_at(&self, id: i64, email: &str, role: Role, now: DateTime<Utc>) -> AppResult<String> {
        let claims = Claims {
            id,
            email: email.to_string(),
            role,
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };
        Ok(jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &self.encoding_key,
        )?)
    }

    pub fn verify(&self, token: &str) -> AppResult<Claims> {
        self.verify_at(token, Utc::now())
    }

    /// Verify signature and expiry as of `now`.
    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> AppResult<Claims> {
        let claims = jsonwebtoken::decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!(error = %e, "token rejected");
                AppError::Auth("Invalid token".to_string())
            })?;

        if now.timestamp() >= claims.exp {
            return Err(AppError::Auth("Token expired".to_string()));
        }
        Ok(claims)
    }
}
