// SPDX-License-Identifier: AGPL-3.0-or-later

//! Authentication errors.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Authentication error type.
///
/// Callers and tests distinguish `TokenExpired` from the signature and
/// malformed-token cases; the rejection messages keep that visible ("expired"
/// appears only in the expiry case).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// No bearer token on the request (neither header nor query parameter)
    MissingToken,
    /// Authorization header present but not a `Bearer <token>` scheme
    InvalidAuthHeader,
    /// Token is not a decodable JWT
    MalformedToken,
    /// Token signature does not verify against the shared secret
    InvalidSignature,
    /// Token `exp` is in the past
    TokenExpired,
    /// Token `nbf` is in the future
    TokenNotYetValid,
    /// The central issuer rejected the token
    RemoteRejected,
    /// The central issuer could not be reached and no local fallback applied
    RemoteUnreachable(String),
    /// Authenticated, but the role is not allowed for this endpoint
    InsufficientPermissions,
    /// Verifier misconfiguration or other unexpected failure
    InternalError(String),
}

#[derive(Serialize)]
struct AuthErrorBody {
    error: String,
    error_code: String,
}

impl AuthError {
    /// Get the error code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::MissingToken => "missing_token",
            AuthError::InvalidAuthHeader => "invalid_auth_header",
            AuthError::MalformedToken => "malformed_token",
            AuthError::InvalidSignature => "invalid_signature",
            AuthError::TokenExpired => "token_expired",
            AuthError::TokenNotYetValid => "token_not_yet_valid",
            AuthError::RemoteRejected => "remote_rejected",
            AuthError::RemoteUnreachable(_) => "remote_unreachable",
            AuthError::InsufficientPermissions => "insufficient_permissions",
            AuthError::InternalError(_) => "internal_error",
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::MissingToken
            | AuthError::InvalidAuthHeader
            | AuthError::MalformedToken
            | AuthError::InvalidSignature
            | AuthError::TokenExpired
            | AuthError::TokenNotYetValid
            | AuthError::RemoteRejected
            | AuthError::RemoteUnreachable(_) => StatusCode::UNAUTHORIZED,
            AuthError::InsufficientPermissions => StatusCode::FORBIDDEN,
            AuthError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::MissingToken => write!(f, "missing token"),
            AuthError::InvalidAuthHeader => {
                write!(f, "invalid authorization header (expected 'Bearer <token>')")
            }
            AuthError::MalformedToken => write!(f, "invalid token"),
            AuthError::InvalidSignature => write!(f, "invalid token signature"),
            AuthError::TokenExpired => write!(f, "token has expired"),
            AuthError::TokenNotYetValid => write!(f, "token is not yet valid"),
            AuthError::RemoteRejected => write!(f, "token rejected by verification service"),
            AuthError::RemoteUnreachable(msg) => {
                write!(f, "verification service unreachable: {msg}")
            }
            AuthError::InsufficientPermissions => {
                write!(f, "insufficient permissions for this operation")
            }
            AuthError::InternalError(msg) => write!(f, "internal authentication error: {msg}"),
        }
    }
}

impl std::error::Error for AuthError {}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        // Internal details are logged, never returned to the client.
        let error = match &self {
            AuthError::InternalError(detail) => {
                tracing::error!(%detail, "internal authentication error");
                "internal authentication error".to_string()
            }
            other => other.to_string(),
        };
        let body = Json(AuthErrorBody {
            error,
            error_code: self.error_code().to_string(),
        });
        (status, body).into_response()
    }
}
