// SPDX-License-Identifier: AGPL-3.0-or-later

//! Token issuance.
//!
//! The issuer mints signed, time-bounded bearer tokens after a credential
//! check. It is stateless: nothing is recorded when a token is minted, and
//! tokens expire naturally (no server-side revocation).

use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};

use crate::config::AppConfig;

use super::password::{hash_password, StoredPassword};
use super::{AuthError, Claims};

/// Mints HMAC-signed bearer tokens.
pub struct TokenIssuer {
    encoding_key: Option<EncodingKey>,
    algorithm: Algorithm,
    ttl_seconds: u64,
    /// Hash verified when the identifier does not resolve, so an unknown
    /// email costs the same as a wrong password and the two cases stay
    /// indistinguishable from outside.
    dummy_hash: String,
}

impl TokenIssuer {
    /// Construct from process configuration.
    pub fn new(config: &AppConfig) -> Self {
        let dummy_hash =
            hash_password("medsupply-dummy-credential").expect("argon2 hashing available");
        Self {
            encoding_key: config
                .jwt_secret
                .as_ref()
                .map(|s| EncodingKey::from_secret(s.as_bytes())),
            algorithm: config.jwt_algorithm,
            ttl_seconds: config.token_ttl_seconds(),
            dummy_hash,
        }
    }

    /// Token lifetime in seconds, reported as `expires_in`.
    pub fn ttl_seconds(&self) -> u64 {
        self.ttl_seconds
    }

    /// Verify a presented password against an optionally-found stored value.
    ///
    /// When the credential was not found, a dummy hash is verified anyway
    /// and the result is `false`; callers must return the same error shape
    /// as for a wrong password.
    pub fn check_password(&self, stored: Option<&StoredPassword>, presented: &str) -> bool {
        match stored {
            Some(stored) => stored.verify(presented).unwrap_or(false),
            None => {
                let _ = super::password::verify_password(presented, &self.dummy_hash);
                false
            }
        }
    }

    /// Mint a signed token for the given subject and role.
    pub fn issue(&self, sub: &str, role: Option<String>) -> Result<(String, Claims), AuthError> {
        let key = self
            .encoding_key
            .as_ref()
            .ok_or_else(|| AuthError::InternalError("signing secret not configured".to_string()))?;

        let claims = Claims::new(sub, role, self.ttl_seconds);
        let token = encode(&Header::new(self.algorithm), &claims, key)
            .map_err(|e| AuthError::InternalError(e.to_string()))?;
        Ok((token, claims))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::verifier::LocalVerifier;
    use crate::config::AppConfig;

    #[test]
    fn issue_then_local_verify_round_trips() {
        let config = AppConfig::default();
        let issuer = TokenIssuer::new(&config);
        let verifier = LocalVerifier::new("test-secret", Algorithm::HS256);

        let (token, minted) = issuer
            .issue("admin@medsupply.example", Some("security_admin".to_string()))
            .unwrap();
        let claims = verifier.verify(&token).unwrap();

        assert_eq!(claims.sub, "admin@medsupply.example");
        assert_eq!(claims.role.as_deref(), Some("security_admin"));
        assert_eq!(claims.exp, minted.iat + 3600);
    }

    #[test]
    fn issue_without_secret_fails() {
        let config = AppConfig {
            jwt_secret: None,
            ..AppConfig::default()
        };
        let issuer = TokenIssuer::new(&config);
        assert!(matches!(
            issuer.issue("a@b.c", None),
            Err(AuthError::InternalError(_))
        ));
    }

    #[test]
    fn check_password_handles_missing_credential() {
        let issuer = TokenIssuer::new(&AppConfig::default());
        assert!(!issuer.check_password(None, "anything"));

        let stored = StoredPassword::LegacyPlaintext("pw".to_string());
        assert!(issuer.check_password(Some(&stored), "pw"));
        assert!(!issuer.check_password(Some(&stored), "nope"));
    }
}
