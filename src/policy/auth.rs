//! Signed-token authentication for protected routes.
//!
//! Tokens are HMAC-SHA256 signed JWTs carried in the `Authorization` header.
//! Only routes whose first path segment (after the service name) appears in
//! the configured protected set require a token; everything else passes
//! through untouched. Verified claims are handed back to the request
//! handler, which forwards them upstream in the `X-Claims` header.

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::AuthConfig;

/// Secret used when the configured secret file cannot be read.
///
/// A deliberately weak development default; production deployments are
/// expected to point `auth.secret` at a real key file.
pub const DEFAULT_SECRET: &str = "test";

/// Categorical authentication failures surfaced to the client.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("missing auth token")]
    TokenMissing,

    #[error("invalid auth token")]
    InvalidToken,

    #[error("claims serialization failed")]
    Claims,
}

/// Claims carried by gateway tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Issuing service or client identifier.
    #[serde(default)]
    pub service: String,

    /// Expiry as seconds since the epoch.
    pub exp: u64,
}

/// Verifier for signed bearer tokens, scoped to a set of protected routes.
pub struct TokenAuth {
    enabled: bool,
    anonymous: bool,
    routes: Vec<String>,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl TokenAuth {
    pub fn new(enabled: bool, anonymous: bool, routes: Vec<String>, secret: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        Self {
            enabled,
            anonymous,
            routes,
            decoding_key: DecodingKey::from_secret(secret),
            validation,
        }
    }

    /// Build an authenticator from a service config, reading the secret from
    /// the configured file.
    ///
    /// Falls back to [`DEFAULT_SECRET`] with a warning when the file cannot
    /// be read.
    pub fn from_config(config: &AuthConfig) -> Self {
        let secret = match std::fs::read(&config.secret) {
            Ok(bytes) => bytes,
            Err(err) => {
                if config.enabled {
                    tracing::warn!(
                        path = %config.secret,
                        error = %err,
                        "Failed to read auth secret, using default"
                    );
                }
                DEFAULT_SECRET.as_bytes().to_vec()
            }
        };
        Self::new(
            config.enabled,
            config.anonymous,
            config.routes.clone(),
            &secret,
        )
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn is_anonymous(&self) -> bool {
        self.anonymous
    }

    /// Protected route segments, for registry snapshots.
    pub fn routes(&self) -> &[String] {
        &self.routes
    }

    /// Authenticate a request against the protected-route set.
    ///
    /// `path` is the full inbound URL path (`/service/route/...`); the
    /// segment after the service name decides whether a token is required.
    /// Returns the serialized claims when a token was verified, `None` when
    /// the route is unprotected, auth is disabled, or an anonymous pass
    /// applied.
    pub fn authenticate(
        &self,
        path: &str,
        authorization: Option<&str>,
    ) -> Result<Option<String>, AuthError> {
        let protected = format!("/{}", path.split('/').nth(2).unwrap_or_default());
        if !self.enabled || !self.routes.contains(&protected) {
            return Ok(None);
        }

        let raw = authorization.unwrap_or("").trim();
        if raw.is_empty() {
            if self.anonymous {
                tracing::warn!(path, "Anonymous request without token");
                return Ok(None);
            }
            return Err(AuthError::TokenMissing);
        }
        let token = raw.strip_prefix("Bearer ").unwrap_or(raw);

        match decode::<Claims>(token, &self.decoding_key, &self.validation) {
            Ok(data) => {
                let claims =
                    serde_json::to_string(&data.claims).map_err(|_| AuthError::Claims)?;
                Ok(Some(claims))
            }
            Err(err) if matches!(err.kind(), ErrorKind::ExpiredSignature) && self.anonymous => {
                tracing::warn!(path, "Anonymous request with expired token");
                Ok(None)
            }
            Err(err) => {
                tracing::error!(path, error = %err, "Token rejected");
                Err(AuthError::InvalidToken)
            }
        }
    }
}
