// SPDX-License-Identifier: AGPL-3.0-or-later

//! Axum extractors for authenticated requests — the per-service auth gate.
//!
//! Use the `Auth` extractor in handlers to require authentication:
//!
//! ```rust,ignore
//! async fn my_handler(Auth(user): Auth) -> impl IntoResponse {
//!     // user is AuthenticatedUser
//! }
//! ```
//!
//! `SecurityAdmin` additionally requires the `security_admin` role, and
//! `OptionalAuth` proceeds as anonymous instead of rejecting.

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use tracing::debug;

use crate::state::AppState;

use super::{AuthenticatedUser, AuthError, SECURITY_ADMIN};

/// Extractor for authenticated users (required mode).
///
/// Token transport: the `Authorization: Bearer <token>` header is
/// canonical; a `?token=` query parameter is accepted for clients that
/// cannot set headers (file links, event streams). Any verification
/// failure rejects the request with 401.
pub struct Auth(pub AuthenticatedUser);

impl FromRequestParts<AppState> for Auth {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        // Explicit test seam: a fixed identity, no crypto, no network.
        if state.config.auth_bypass {
            return Ok(Auth(bypass_identity()));
        }

        // First check if middleware already set the user
        if let Some(user) = parts.extensions.get::<AuthenticatedUser>().cloned() {
            return Ok(Auth(user));
        }

        let token = extract_token(parts)?;
        let claims = state
            .verifier
            .verify(&token)
            .await
            .inspect_err(|e| debug!(error = %e, "request authentication failed"))?;

        Ok(Auth(AuthenticatedUser::from_claims(claims)))
    }
}

/// Extractor that requires the `security_admin` role.
pub struct SecurityAdmin(pub AuthenticatedUser);

impl FromRequestParts<AppState> for SecurityAdmin {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Auth(user) = Auth::from_request_parts(parts, state).await?;

        if !user.is_security_admin() {
            return Err(AuthError::InsufficientPermissions);
        }

        Ok(SecurityAdmin(user))
    }
}

/// Optional authentication extractor.
///
/// Returns `None` if no valid authentication is present, instead of
/// rejecting. For endpoints that behave differently for authenticated and
/// anonymous callers without requiring authentication.
pub struct OptionalAuth(pub Option<AuthenticatedUser>);

impl FromRequestParts<AppState> for OptionalAuth {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        match Auth::from_request_parts(parts, state).await {
            Ok(Auth(user)) => Ok(OptionalAuth(Some(user))),
            Err(_) => Ok(OptionalAuth(None)),
        }
    }
}

/// The fixed identity returned under `AUTH_BYPASS=true`.
fn bypass_identity() -> AuthenticatedUser {
    AuthenticatedUser {
        subject: "bypass".to_string(),
        role: Some(SECURITY_ADMIN.to_string()),
        claims: None,
    }
}

/// Pull the bearer token off a request.
pub fn extract_token(parts: &Parts) -> Result<String, AuthError> {
    if let Some(header) = parts.headers.get(AUTHORIZATION) {
        let value = header.to_str().map_err(|_| AuthError::InvalidAuthHeader)?;
        let token = value
            .strip_prefix("Bearer ")
            .ok_or(AuthError::InvalidAuthHeader)?
            .trim();
        if token.is_empty() {
            return Err(AuthError::InvalidAuthHeader);
        }
        return Ok(token.to_string());
    }

    if let Some(token) = token_from_query(parts.uri.query().unwrap_or("")) {
        return Ok(token);
    }

    Err(AuthError::MissingToken)
}

/// Find a non-empty `token` parameter in a raw query string.
fn token_from_query(query: &str) -> Option<String> {
    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, value)| *key == "token" && !value.is_empty())
        .map(|(_, value)| value.to_string())
}
