//! Bearer-token authentication.
//!
//! Sessions are issued elsewhere; this service only verifies HS256 tokens carrying
//! `{sub, role, exp}` and turns them into a [`Principal`].

use crate::{
    api::AppState,
    config::settings::AuthConfig,
    core::access::Principal,
    entities::Role,
    errors::{Error, Result},
};
use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Token claims.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub sub: String,
    pub role: Role,
    /// Expiration (Unix timestamp seconds)
    pub exp: usize,
    /// Issued at (Unix timestamp seconds)
    pub iat: usize,
}

/// Signing and verification keys derived from the configured secret.
#[derive(Clone)]
pub struct JwtKeys {
    inner: Arc<KeysInner>,
}

struct KeysInner {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: chrono::Duration,
}

impl JwtKeys {
    #[must_use]
    pub fn new(config: &AuthConfig) -> Self {
        let secret = config.jwt_secret.as_bytes();
        Self {
            inner: Arc::new(KeysInner {
                encoding: EncodingKey::from_secret(secret),
                decoding: DecodingKey::from_secret(secret),
                ttl: chrono::Duration::minutes(config.token_ttl_minutes),
            }),
        }
    }

    /// Issues a token for `user_id`. Used by tooling and tests; there is no login route.
    pub fn issue_token(&self, user_id: &str, role: Role) -> Result<String> {
        let now = chrono::Utc::now();
        let claims = Claims {
            sub: user_id.to_string(),
            role,
            exp: usize::try_from((now + self.inner.ttl).timestamp()).unwrap_or(usize::MAX),
            iat: usize::try_from(now.timestamp()).unwrap_or_default(),
        };
        jsonwebtoken::encode(&Header::default(), &claims, &self.inner.encoding).map_err(|e| {
            Error::Config {
                message: format!("Failed to sign token: {e}"),
            }
        })
    }

    /// Verifies a token and returns the caller it names.
    pub fn verify(&self, token: &str) -> Result<Principal> {
        let data = jsonwebtoken::decode::<Claims>(token, &self.inner.decoding, &Validation::default())
            .map_err(|e| {
                tracing::debug!("Token validation failed: {e}");
                Error::Unauthorized
            })?;
        Ok(Principal::new(data.claims.sub, data.claims.role))
    }
}

impl FromRequestParts<AppState> for Principal {
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        if let Some(principal) = parts.extensions.get::<Self>() {
            return Ok(principal.clone());
        }

        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .and_then(|h| h.strip_prefix("Bearer "))
            .ok_or(Error::Unauthorized)?;

        let principal = state.keys.verify(token.trim())?;
        parts.extensions.insert(principal.clone());
        Ok(principal)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    fn keys(secret: &str) -> JwtKeys {
        JwtKeys::new(&AuthConfig {
            jwt_secret: secret.to_string(),
            token_ttl_minutes: 5,
        })
    }

    #[test]
    fn test_issue_and_verify() {
        let keys = keys("secret-a");
        let token = keys.issue_token("user-1", Role::Supplier).unwrap();
        let principal = keys.verify(&token).unwrap();
        assert_eq!(principal, Principal::new("user-1", Role::Supplier));
    }

    #[test]
    fn test_foreign_signature_rejected() {
        let token = keys("secret-a").issue_token("user-1", Role::Admin).unwrap();
        assert!(matches!(keys("secret-b").verify(&token), Err(Error::Unauthorized)));
        assert!(matches!(keys("secret-a").verify("garbage"), Err(Error::Unauthorized)));
    }
}
