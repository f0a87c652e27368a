// SPDX-License-Identifier: AGPL-3.0-or-later

//! Token verification.
//!
//! Two tiers exist because services are deployed with inconsistent
//! knowledge of the shared secret:
//!
//! - **Local**: HMAC signature + expiry check against the configured secret.
//! - **Remote**: delegate to the central issuer's `/auth/verify` endpoint.
//!
//! The chain between them is an explicit [`VerificationStrategy`], never
//! inferred from which configuration happens to be set. Under
//! `RemoteThenLocalFallback`, a non-200 response or a network error falls
//! through to local decode; that prioritizes availability over a single
//! source of truth and widens the trust boundary accordingly. The tradeoff
//! is inherited from the deployed system and kept visible here rather than
//! silently tightened.

use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use tracing::{debug, warn};

use crate::config::{AppConfig, VerificationStrategy, REMOTE_VERIFY_TIMEOUT};

use super::{AuthError, Claims};

/// Local HMAC verification against the shared secret.
pub struct LocalVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl LocalVerifier {
    pub fn new(secret: &str, algorithm: Algorithm) -> Self {
        let mut validation = Validation::new(algorithm);
        // A token is valid only strictly before `exp`; no clock-skew grace.
        validation.leeway = 0;
        validation.validate_aud = false;
        Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    /// Verify signature and expiry, returning the claims.
    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        let data = decode::<Claims>(token, &self.decoding_key, &self.validation).map_err(|e| {
            match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                jsonwebtoken::errors::ErrorKind::InvalidSignature => AuthError::InvalidSignature,
                jsonwebtoken::errors::ErrorKind::ImmatureSignature => AuthError::TokenNotYetValid,
                _ => AuthError::MalformedToken,
            }
        })?;
        Ok(data.claims)
    }
}

/// Outcome of a delegation call, before any fallback is applied.
#[derive(Debug)]
enum RemoteFailure {
    /// The issuer answered with a non-200 status.
    Rejected(u16),
    /// The issuer could not be reached (timeout, refused, DNS).
    Unreachable(String),
}

/// Delegated verification against the central issuer.
pub struct RemoteVerifier {
    verify_url: String,
    client: reqwest::Client,
}

impl RemoteVerifier {
    pub fn new(base_url: &str) -> Self {
        Self {
            verify_url: format!("{base_url}/auth/verify"),
            client: reqwest::Client::builder()
                .timeout(REMOTE_VERIFY_TIMEOUT)
                .build()
                .expect("failed to create HTTP client"),
        }
    }

    /// Ask the issuer whether the token is valid. A single synchronous
    /// outbound call with a short timeout and no retry.
    async fn verify(&self, token: &str) -> Result<(), RemoteFailure> {
        let response = self
            .client
            .get(&self.verify_url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| RemoteFailure::Unreachable(e.to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(RemoteFailure::Rejected(response.status().as_u16()))
        }
    }
}

/// Strategy-driven token verifier used by the auth gate.
pub struct TokenVerifier {
    strategy: VerificationStrategy,
    local: Option<LocalVerifier>,
    remote: Option<RemoteVerifier>,
}

impl TokenVerifier {
    /// Construct from process configuration. `AppConfig::from_env` has
    /// already rejected strategies whose inputs are missing.
    pub fn new(config: &AppConfig) -> Self {
        Self {
            strategy: config.verify_strategy,
            local: config
                .jwt_secret
                .as_ref()
                .map(|s| LocalVerifier::new(s, config.jwt_algorithm)),
            remote: config
                .auth_service_url
                .as_deref()
                .map(RemoteVerifier::new),
        }
    }

    /// The configured strategy, surfaced for health reporting.
    pub fn strategy(&self) -> VerificationStrategy {
        self.strategy
    }

    /// Verify a bearer token and return its claims.
    pub async fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        match self.strategy {
            VerificationStrategy::LocalOnly => self.local_verify(token),
            VerificationStrategy::RemoteOnly => match self.remote_verify(token).await {
                Ok(()) => decode_unverified(token),
                Err(RemoteFailure::Rejected(status)) => {
                    debug!(status, "token rejected by verification service");
                    Err(AuthError::RemoteRejected)
                }
                Err(RemoteFailure::Unreachable(reason)) => {
                    warn!(%reason, "verification service unreachable");
                    Err(AuthError::RemoteUnreachable(reason))
                }
            },
            VerificationStrategy::RemoteThenLocalFallback => {
                match self.remote_verify(token).await {
                    Ok(()) => decode_unverified(token),
                    Err(failure) => {
                        if self.local.is_some() {
                            warn!(?failure, "delegation failed, falling back to local decode");
                            self.local_verify(token)
                        } else {
                            match failure {
                                RemoteFailure::Rejected(_) => Err(AuthError::RemoteRejected),
                                RemoteFailure::Unreachable(reason) => {
                                    Err(AuthError::RemoteUnreachable(reason))
                                }
                            }
                        }
                    }
                }
            }
        }
    }

    /// Authoritative check for the issuer's own verify endpoint. Always
    /// local, regardless of strategy: delegating from here would loop.
    pub fn verify_issued(&self, token: &str) -> Result<Claims, AuthError> {
        self.local_verify(token)
    }

    fn local_verify(&self, token: &str) -> Result<Claims, AuthError> {
        self.local
            .as_ref()
            .ok_or_else(|| AuthError::InternalError("no local verification secret".to_string()))?
            .verify(token)
    }

    async fn remote_verify(&self, token: &str) -> Result<(), RemoteFailure> {
        match &self.remote {
            Some(remote) => remote.verify(token).await,
            None => Err(RemoteFailure::Unreachable(
                "no verification service configured".to_string(),
            )),
        }
    }
}

/// Extract claims without signature verification.
///
/// Only used after the remote issuer has already vouched for the token:
/// trust comes from the 200, the decode just recovers the claim contents.
fn decode_unverified(token: &str) -> Result<Claims, AuthError> {
    jsonwebtoken::dangerous::insecure_decode::<Claims>(token)
        .map(|data| data.claims)
        .map_err(|_| AuthError::MalformedToken)
}
