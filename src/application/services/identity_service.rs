//! Signed user identity tokens.
//!
//! Tokens are HS256 JWTs carrying the user id and a mandatory expiry.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::error::AppError;

/// Upper bound for token lifetime (ten years).
pub const MAX_TOKEN_TTL_SECONDS: u64 = 10 * 365 * 24 * 60 * 60;

/// Identity token claims.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: Uuid,
    pub exp: i64,
}

/// Issues and verifies user identity tokens.
///
/// The core never derives the owner itself; this service is the only place a
/// `Uuid` owner id comes from.
#[derive(Clone)]
pub struct IdentityService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl IdentityService {
    pub fn new(secret: &str, ttl_seconds: u64) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp"]);

        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            ttl: Duration::seconds(ttl_seconds.min(MAX_TOKEN_TTL_SECONDS) as i64),
        }
    }

    /// Issues a token for `user_id` valid for the configured lifetime.
    pub fn issue(&self, user_id: Uuid) -> Result<String, AppError> {
        self.issue_at(user_id, Utc::now())
    }

    pub fn issue_at(&self, user_id: Uuid, now: DateTime<Utc>) -> Result<String, AppError> {
        let claims = Claims {
            user_id,
            exp: (now + self.ttl).timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key).map_err(|e| {
            AppError::internal("Token signing unavailable", json!({ "reason": e.to_string() }))
        })
    }

    /// Returns the user id carried by a valid, unexpired token.
    ///
    /// # Errors
    ///
    /// [`AppError::Unauthorized`] for malformed, forged or expired tokens.
    pub fn verify(&self, token: &str) -> Result<Uuid, AppError> {
        let data = decode::<Claims>(token, &self.decoding_key, &self.validation).map_err(|e| {
            let reason = match e.kind() {
                ErrorKind::ExpiredSignature => "token expired",
                ErrorKind::InvalidSignature => "signature mismatch",
                _ => "malformed token",
            };
            AppError::unauthorized("Invalid user token", json!({ "reason": reason }))
        })?;

        Ok(data.claims.user_id)
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}
