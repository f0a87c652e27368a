// SPDX-License-Identifier: AGPL-3.0-or-later

//! Password hashing and verification.
//!
//! New credentials are always hashed with Argon2id. Pre-migration rows may
//! still hold a plaintext password; those are modeled explicitly as
//! [`StoredPassword::LegacyPlaintext`] so the string-equality path is
//! visible and auditable instead of hiding inside a failed hash parse.
//! Legacy values are never upgraded to a hash automatically; that only
//! happens on an explicit reseed.

use argon2::password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, SaltString};
use argon2::{Argon2, Params, PasswordVerifier};
use serde::{Deserialize, Serialize};

use super::AuthError;

/// A stored password value, tagged by scheme.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "scheme", content = "value", rename_all = "snake_case")]
pub enum StoredPassword {
    /// Argon2id PHC string, the only scheme new writes produce.
    Argon2id(String),
    /// Plaintext from a legacy row. Technical debt kept working on purpose.
    LegacyPlaintext(String),
}

impl StoredPassword {
    /// Verify a presented plaintext password against this stored value.
    pub fn verify(&self, presented: &str) -> Result<bool, AuthError> {
        match self {
            StoredPassword::Argon2id(phc) => verify_password(presented, phc),
            StoredPassword::LegacyPlaintext(stored) => Ok(stored == presented),
        }
    }

    /// Classify a raw stored string: PHC-formatted values are hashes,
    /// anything else is a legacy plaintext row.
    pub fn from_stored(raw: &str) -> Self {
        if PasswordHash::new(raw).is_ok() {
            StoredPassword::Argon2id(raw.to_string())
        } else {
            StoredPassword::LegacyPlaintext(raw.to_string())
        }
    }
}

/// OWASP minimum Argon2id params: m=19456 KiB, t=2 iterations, p=1 thread.
fn argon2_instance() -> Argon2<'static> {
    let params = Params::new(19456, 2, 1, None).expect("valid argon2 params");
    Argon2::new(argon2::Algorithm::Argon2id, argon2::Version::V0x13, params)
}

/// Hash a password using Argon2id.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    argon2_instance()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| AuthError::InternalError(e.to_string()))
}

/// Verify a password against an Argon2 PHC string.
/// Uses the params stored in the hash itself.
pub fn verify_password(password: &str, stored_hash: &str) -> Result<bool, AuthError> {
    let parsed =
        PasswordHash::new(stored_hash).map_err(|e| AuthError::InternalError(e.to_string()))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}
