// SPDX-License-Identifier: AGPL-3.0-or-later

//! Token issuance, verification, and request authentication.
//!
//! The pieces fit together like this: [`TokenIssuer`] signs access tokens
//! for credentials that check out, [`TokenVerifier`] validates presented
//! tokens (locally, remotely, or remote-with-fallback depending on
//! configuration), and the extractors in [`extractor`] wire verification
//! into axum handlers.

pub mod claims;
pub mod error;
pub mod extractor;
pub mod issuer;
pub mod password;
pub mod verifier;

pub use claims::{AuthenticatedUser, Claims};
pub use error::AuthError;
pub use extractor::{Auth, OptionalAuth, SecurityAdmin};
pub use issuer::TokenIssuer;
pub use password::StoredPassword;
pub use verifier::TokenVerifier;

/// Role that unlocks administrative endpoints (role and permission
/// management). Gated by the [`SecurityAdmin`] extractor.
pub const SECURITY_ADMIN: &str = "security_admin";
