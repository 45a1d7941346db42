//! Signed session tokens.
//!
//! Local sessions are stateless HS256 JWTs carrying the user id. Tokens
//! expire after a fixed interval (one hour unless configured otherwise);
//! there is no refresh flow.

use anyhow::{Context, Result};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    #[serde(rename = "userId")]
    pub user_id: i32,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Clone)]
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: chrono::Duration,
}

impl TokenService {
    #[must_use]
    pub fn new(secret: &str, ttl_minutes: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl: chrono::Duration::minutes(ttl_minutes),
        }
    }

    pub fn issue(&self, user_id: i32) -> Result<String> {
        let now = chrono::Utc::now();
        let claims = Claims {
            user_id,
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };

        encode(&Header::default(), &claims, &self.encoding).context("Failed to sign session token")
    }

    /// Verify signature and expiry, returning the embedded claims.
    pub fn verify(&self, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
        decode::<Claims>(token, &self.decoding, &Validation::default()).map(|data| data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issued_token_round_trips() {
        let tokens = TokenService::new("unit-test-secret", 60);

        let token = tokens.issue(42).unwrap();
        let claims = tokens.verify(&token).unwrap();

        assert_eq!(claims.user_id, 42);
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn token_signed_with_other_secret_is_rejected() {
        let tokens = TokenService::new("unit-test-secret", 60);
        let other = TokenService::new("another-secret", 60);

        let token = other.issue(42).unwrap();

        assert!(tokens.verify(&token).is_err());
    }

    #[test]
    fn expired_token_is_rejected() {
        let tokens = TokenService::new("unit-test-secret", -5);

        let token = tokens.issue(42).unwrap();

        assert!(tokens.verify(&token).is_err());
    }

    #[test]
    fn garbage_token_is_rejected() {
        let tokens = TokenService::new("unit-test-secret", 60);

        assert!(tokens.verify("not-a-jwt").is_err());
    }
}
