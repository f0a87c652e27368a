// SPDX-License-Identifier: AGPL-3.0-or-later

//! JWT claims and the request-scoped identity context.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Claims carried by an issued bearer token.
///
/// Tokens are self-contained: there is no server-side session and no
/// revocation list. `exp = iat + configured_ttl` at mint time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Claims {
    /// Subject: the credential's email or username
    pub sub: String,
    /// Role name, absent for legacy credentials with no assigned role
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// Issued-at, epoch seconds
    pub iat: i64,
    /// Expiry, epoch seconds
    pub exp: i64,
}

impl Claims {
    /// Build claims for a freshly minted token.
    pub fn new(sub: impl Into<String>, role: Option<String>, ttl_seconds: u64) -> Self {
        let now = Utc::now().timestamp();
        Self {
            sub: sub.into(),
            role,
            iat: now,
            exp: now + ttl_seconds as i64,
        }
    }
}

/// Authenticated identity derived from a validated token.
///
/// Built per-request by the auth gate, handed to handlers, and discarded at
/// request end. Never persisted.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuthenticatedUser {
    /// Canonical subject (email or username from the `sub` claim)
    pub subject: String,
    /// Role name, if the token carried one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// The validated claims, kept for downstream role checks and logging
    #[serde(skip)]
    pub claims: Option<Claims>,
}

impl AuthenticatedUser {
    /// Create from validated claims.
    pub fn from_claims(claims: Claims) -> Self {
        Self {
            subject: claims.sub.clone(),
            role: claims.role.clone(),
            claims: Some(claims),
        }
    }

    /// Check whether this identity carries the given role.
    pub fn has_role(&self, required: &str) -> bool {
        self.role.as_deref() == Some(required)
    }

    /// Check whether this identity is a security administrator.
    pub fn is_security_admin(&self) -> bool {
        self.has_role(super::SECURITY_ADMIN)
    }
}
