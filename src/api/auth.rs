// SPDX-License-Identifier: AGPL-3.0-or-later

//! Token issuance endpoints: login and verify.

use axum::{body::Bytes, extract::State, http::StatusCode, Json};
use serde::Serialize;
use serde_json::Value;
use tracing::info;
use utoipa::ToSchema;

use crate::{
    auth::{extractor::extract_token, Auth, AuthError, AuthenticatedUser},
    error::ApiError,
    state::AppState,
};

/// Successful login payload.
#[derive(Debug, Serialize, ToSchema)]
pub struct LoginResponse {
    pub access_token: String,
    pub token_type: String,
    /// Token lifetime in seconds.
    pub expires_in: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

/// Verification outcome, also returned with `valid: false` on failures.
#[derive(Debug, Serialize, ToSchema)]
pub struct VerifyResponse {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Exchange credentials for a bearer token.
///
/// The body is parsed by hand rather than through a typed extractor: the
/// deployed clients send the identifier under either `email` or `user`,
/// and a non-JSON body must come back as a 400 with a stable message
/// instead of an extractor rejection.
#[utoipa::path(
    post,
    path = "/auth/login",
    tag = "Auth",
    request_body(content = String, content_type = "application/json",
        description = "JSON object with `email` (or `user`) and `password`"),
    responses(
        (status = 200, body = LoginResponse),
        (status = 400, description = "Malformed body or missing fields"),
        (status = 401, description = "Unknown identifier or wrong password")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<LoginResponse>, ApiError> {
    let payload: Value =
        serde_json::from_slice(&body).map_err(|_| ApiError::bad_request("invalid json"))?;

    let identifier = payload
        .get("email")
        .or_else(|| payload.get("user"))
        .and_then(Value::as_str);
    let password = payload.get("password").and_then(Value::as_str);

    let (Some(identifier), Some(password)) = (identifier, password) else {
        return Err(ApiError::bad_request("email and password are required"));
    };

    // The dummy-hash path inside check_password keeps an unknown identifier
    // and a wrong password indistinguishable in both response and cost.
    let credential = state.credentials.find_by_identifier(identifier);
    if !state
        .issuer
        .check_password(credential.as_ref().map(|c| &c.password), password)
    {
        info!(identifier, "login rejected");
        return Err(ApiError::unauthorized("invalid credentials"));
    }
    let Some(credential) = credential else {
        return Err(ApiError::unauthorized("invalid credentials"));
    };

    let role = match credential.role {
        Some(role) => Some(role),
        None => state.roles.read().await.role_for_email(&credential.email),
    };

    let (access_token, claims) = state.issuer.issue(&credential.email, role)?;
    info!(sub = %claims.sub, "issued access token");

    Ok(Json(LoginResponse {
        access_token,
        token_type: "Bearer".to_string(),
        expires_in: state.issuer.ttl_seconds(),
        role: claims.role,
    }))
}

/// Authoritatively check a token minted by this service.
///
/// This is the endpoint remote verifiers delegate to, so it always checks
/// locally. The token arrives as a bearer header or a `token` query
/// parameter; failure bodies keep `valid: false` alongside the error text.
#[utoipa::path(
    get,
    path = "/auth/verify",
    tag = "Auth",
    params(("token" = Option<String>, Query, description = "Token to verify, if not sent as a bearer header")),
    responses(
        (status = 200, body = VerifyResponse),
        (status = 400, description = "No token supplied"),
        (status = 401, description = "Invalid or expired token")
    )
)]
pub async fn verify(
    State(state): State<AppState>,
    parts: axum::http::request::Parts,
) -> (StatusCode, Json<VerifyResponse>) {
    let token = match extract_token(&parts) {
        Ok(token) => token,
        // No token at all is a caller mistake; a present-but-malformed
        // scheme is an invalid token.
        Err(AuthError::MissingToken) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(VerifyResponse {
                    valid: false,
                    sub: None,
                    role: None,
                    error: Some("token is required".to_string()),
                }),
            );
        }
        Err(err) => {
            return (
                StatusCode::UNAUTHORIZED,
                Json(VerifyResponse {
                    valid: false,
                    sub: None,
                    role: None,
                    error: Some(err.to_string()),
                }),
            );
        }
    };

    match state.verifier.verify_issued(&token) {
        Ok(claims) => (
            StatusCode::OK,
            Json(VerifyResponse {
                valid: true,
                sub: Some(claims.sub),
                role: claims.role,
                error: None,
            }),
        ),
        Err(err) => (
            StatusCode::UNAUTHORIZED,
            Json(VerifyResponse {
                valid: false,
                sub: None,
                role: None,
                error: Some(err.to_string()),
            }),
        ),
    }
}

/// The caller's own identity, as decoded from their token.
#[utoipa::path(
    get,
    path = "/v1/users/me",
    tag = "Auth",
    responses(
        (status = 200, body = AuthenticatedUser),
        (status = 401, description = "Missing or invalid token")
    )
)]
pub async fn me(Auth(user): Auth) -> Json<AuthenticatedUser> {
    Json(user)
}
