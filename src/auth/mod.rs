//! API key authentication
//!
//! A single statically configured key guards the invoice endpoints. Whether
//! the check is enforced at all is one configuration toggle (`AUTH_MODE`),
//! not a second code path.

use axum::{
    body::Body,
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::{IntoResponse, Response},
};
use sha2::{Digest, Sha256};
use std::sync::Arc;

use crate::api::error::{ApiError, ErrorCode};

/// Authentication failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    /// No credential on the request
    MissingAuth,
    /// Credential does not match the configured key
    InvalidApiKey,
}

/// Validates presented keys against the configured one.
///
/// Only the SHA-256 hash of the configured key is retained in memory.
pub struct ApiKeyValidator {
    key_hash: Option<String>,
}

impl ApiKeyValidator {
    pub fn new(configured_key: Option<&str>) -> Self {
        Self {
            key_hash: configured_key.map(Self::hash_key),
        }
    }

    /// Hash an API key for storage/comparison
    pub fn hash_key(key: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(key.as_bytes());
        hex::encode(hasher.finalize())
    }

    pub fn is_configured(&self) -> bool {
        self.key_hash.is_some()
    }

    /// Validate a presented API key
    pub fn validate(&self, key: &str) -> Result<(), AuthError> {
        match &self.key_hash {
            Some(expected) if Self::hash_key(key) == *expected => Ok(()),
            _ => Err(AuthError::InvalidApiKey),
        }
    }
}

/// Authentication middleware configuration/state.
#[derive(Clone)]
pub struct AuthMiddlewareState {
    pub validator: Arc<ApiKeyValidator>,
    /// If false, the check is skipped entirely (dev/test deployments).
    pub require_auth: bool,
}

/// Authentication middleware
pub async fn auth_middleware(
    State(state): State<AuthMiddlewareState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if !state.require_auth {
        return next.run(request).await;
    }

    let auth_header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    match authenticate(&state.validator, auth_header) {
        Ok(()) => next.run(request).await,
        Err(e) => auth_error_response(e),
    }
}

fn authenticate(validator: &ApiKeyValidator, header: Option<&str>) -> Result<(), AuthError> {
    let header = header.ok_or(AuthError::MissingAuth)?;

    // Accept raw keys as well as the common header schemes.
    let key = header
        .strip_prefix("Bearer ")
        .or_else(|| header.strip_prefix("ApiKey "))
        .unwrap_or(header);

    validator.validate(key)
}

/// Convert auth error to HTTP response
fn auth_error_response(error: AuthError) -> Response {
    match error {
        AuthError::MissingAuth => ApiError::new(ErrorCode::AuthRequired, "Missing authentication"),
        AuthError::InvalidApiKey => ApiError::new(ErrorCode::InvalidApiKey, "Invalid API key"),
    }
    .into_response()
}
