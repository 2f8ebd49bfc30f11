//! services/api/src/adapters/jwt.rs
//!
//! HS256 bearer tokens carrying `{userId, username}` with a fixed lifetime.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use notatnik_core::domain::{AuthUser, User, TOKEN_TTL_DAYS};
use notatnik_core::ports::{PortError, PortResult, TokenService};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// JWT claims payload
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claims {
    pub user_id: i64,
    pub username: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration (Unix timestamp)
    pub exp: i64,
}

#[derive(Clone)]
pub struct JwtTokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl: Duration,
}

impl JwtTokenService {
    pub fn new(secret: &str) -> Self {
        Self::with_ttl(secret, Duration::days(TOKEN_TTL_DAYS))
    }

    pub fn with_ttl(secret: &str, ttl: Duration) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            ttl,
        }
    }
}

impl TokenService for JwtTokenService {
    fn issue(&self, user: &User) -> PortResult<String> {
        let now = Utc::now();
        let claims = Claims {
            user_id: user.id,
            username: user.username.clone(),
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };
        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| PortError::Unexpected(format!("Failed to encode JWT: {e}")))
    }

    fn verify(&self, token: &str) -> PortResult<AuthUser> {
        let data = decode::<Claims>(token, &self.decoding_key, &Validation::default()).map_err(
            |e| {
                warn!(error = %e, "rejected bearer token");
                PortError::Unauthorized
            },
        )?;
        Ok(AuthUser {
            user_id: data.claims.user_id,
            username: data.claims.username,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_SECRET: &str = "test-secret-key-minimum-32-chars!!";

    fn alice() -> User {
        let now = Utc::now();
        User {
            id: 7,
            username: "alice".to_string(),
            email: "a@x.com".to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn issued_token_verifies_to_the_same_identity() {
        let tokens = JwtTokenService::new(TEST_SECRET);
        let token = tokens.issue(&alice()).unwrap();

        let auth = tokens.verify(&token).unwrap();
        assert_eq!(auth.user_id, 7);
        assert_eq!(auth.username, "alice");

        let claims = decode::<Claims>(
            &token,
            &DecodingKey::from_secret(TEST_SECRET.as_bytes()),
            &Validation::default(),
        )
        .unwrap()
        .claims;
        assert_eq!(claims.exp - claims.iat, 7 * 24 * 60 * 60);
    }

    #[test]
    fn expired_token_is_rejected() {
        // Past the default 60s leeway.
        let tokens = JwtTokenService::with_ttl(TEST_SECRET, Duration::seconds(-3600));
        let token = tokens.issue(&alice()).unwrap();
        assert!(matches!(tokens.verify(&token), Err(PortError::Unauthorized)));
    }

    #[test]
    fn foreign_secret_and_garbage_are_rejected() {
        let token = JwtTokenService::new("another-secret-key-of-some-length")
            .issue(&alice())
            .unwrap();
        let tokens = JwtTokenService::new(TEST_SECRET);
        assert!(matches!(tokens.verify(&token), Err(PortError::Unauthorized)));
        assert!(matches!(tokens.verify("not.a.jwt"), Err(PortError::Unauthorized)));
    }
}
