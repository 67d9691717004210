use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    error::ApiError,
    models::{Account, Role},
};

/// Fixed lifetime of a session token.
pub const SESSION_TTL_HOURS: i64 = 12;

/// Claims
///
/// The payload signed into every session token. Approval is deliberately absent:
/// it is re-read from the store on every protected request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (sub): the account id.
    pub sub: Uuid,
    pub email: String,
    pub role: Role,
    /// Issued At (iat), unix seconds.
    pub iat: i64,
    /// Expiration Time (exp), unix seconds.
    pub exp: i64,
}

/// SessionIssuer
///
/// Signs and verifies stateless HS256 session tokens. The secret is handed in at
/// construction; nothing is read from global state, and no I/O happens here.
#[derive(Clone)]
pub struct SessionIssuer {
    encoding: Arc<EncodingKey>,
    decoding: Arc<DecodingKey>,
    ttl: Duration,
}

impl SessionIssuer {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding: Arc::new(EncodingKey::from_secret(secret.as_bytes())),
            decoding: Arc::new(DecodingKey::from_secret(secret.as_bytes())),
            ttl: Duration::hours(SESSION_TTL_HOURS),
        }
    }

    /// Issue a token for `account` using the wall clock.
    pub fn issue(&self, account: &Account) -> Result<String, ApiError> {
        self.issue_at(account, Utc::now())
    }

    pub fn issue_at(&self, account: &Account, now: DateTime<Utc>) -> Result<String, ApiError> {
        let claims = Claims {
            sub: account.id,
            email: account.email.clone(),
            role: account.role,
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| ApiError::Unexpected(format!("failed to sign session token: {e}")))
    }

    /// Verify a token against the wall clock.
    pub fn verify(&self, token: &str) -> Result<Claims, ApiError> {
        self.verify_at(token, Utc::now())
    }

    /// verify_at
    ///
    /// Checks signature and structure with `jsonwebtoken`, then expiry against
    /// `now` with zero leeway: a token is valid strictly before its `exp`.
    /// Every failure collapses into the same `Unauthenticated` error.
    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<Claims, ApiError> {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is checked below against the caller's clock.
        validation.validate_exp = false;
        validation.leeway = 0;

        let claims = decode::<Claims>(token, &self.decoding, &validation)
            .map_err(|e| {
                tracing::debug!(error = ?e.kind(), "session token rejected");
                ApiError::Unauthenticated("Invalid token")
            })?
            .claims;

        if now.timestamp() >= claims.exp {
            tracing::debug!(sub = %claims.sub, "session token expired");
            return Err(ApiError::Unauthenticated("Invalid token"));
        }

        Ok(claims)
    }
}
