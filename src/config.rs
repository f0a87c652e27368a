// SPDX-License-Identifier: AGPL-3.0-or-later

//! # Runtime Configuration
//!
//! Configuration is loaded from the environment once at startup into an
//! [`AppConfig`] that is passed into each component constructor. Components
//! never read environment variables themselves.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `JWT_SECRET` | Shared HMAC signing secret | Required unless remote-only or bypass |
//! | `JWT_ALGORITHM` | Signing algorithm (`HS256`/`HS384`/`HS512`) | `HS256` |
//! | `ACCESS_TOKEN_EXPIRE_MINUTES` | Token lifetime in minutes | `60` |
//! | `AUTH_SERVICE_URL` | Base URL of the central issuer for delegated verification | Unset |
//! | `AUTH_VERIFY_STRATEGY` | `local`, `remote`, or `remote-then-local` | `local` |
//! | `DATABASE_URL` | Path to the embedded credential database; presence selects the persistent backend | Unset (in-memory) |
//! | `DATABASE_MIGRATE` | Run the versioned schema migration before serving | `false` |
//! | `USERS_JSON` | JSON array of `{email, password, role}` seed identities | Unset |
//! | `AUTH_BYPASS` | Test seam: short-circuit auth to a fixed dummy identity | `false` |
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info` |

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use jsonwebtoken::Algorithm;

/// Default token lifetime when `ACCESS_TOKEN_EXPIRE_MINUTES` is unset.
const DEFAULT_TOKEN_TTL_MINUTES: u64 = 60;

/// Timeout for the outbound delegation call. No retry is ever attempted.
pub const REMOTE_VERIFY_TIMEOUT: Duration = Duration::from_secs(3);

/// Configuration errors surfaced at startup, before the server binds.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {reason}")]
    InvalidValue { var: &'static str, reason: String },

    #[error("JWT_SECRET is required for verify strategy {strategy}")]
    MissingSecret { strategy: VerificationStrategy },

    #[error("AUTH_SERVICE_URL is required for verify strategy {strategy}")]
    MissingAuthServiceUrl { strategy: VerificationStrategy },
}

/// How bearer tokens are verified by this deployment.
///
/// The strategy is always configured explicitly; it is never inferred from
/// which other configuration values happen to be present. Deployments with
/// inconsistent knowledge of the shared secret use the remote variants to
/// lean on the central issuer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationStrategy {
    /// Verify signature and expiry against the local shared secret only.
    LocalOnly,
    /// Delegate every verification to the central issuer. Any remote
    /// failure rejects the token.
    RemoteOnly,
    /// Delegate first; on a non-200 response or a network error, fall back
    /// to local decode. Availability is prioritized over single-source
    /// verification here, which widens the trust boundary. That tradeoff
    /// is inherited from the deployed system and kept deliberate.
    RemoteThenLocalFallback,
}

impl VerificationStrategy {
    fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "local" => Some(Self::LocalOnly),
            "remote" => Some(Self::RemoteOnly),
            "remote-then-local" => Some(Self::RemoteThenLocalFallback),
            _ => None,
        }
    }

    /// Whether this strategy performs any local decoding.
    pub fn uses_local(&self) -> bool {
        matches!(self, Self::LocalOnly | Self::RemoteThenLocalFallback)
    }

    /// Whether this strategy performs any remote delegation.
    pub fn uses_remote(&self) -> bool {
        matches!(self, Self::RemoteOnly | Self::RemoteThenLocalFallback)
    }
}

impl std::fmt::Display for VerificationStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LocalOnly => write!(f, "local"),
            Self::RemoteOnly => write!(f, "remote"),
            Self::RemoteThenLocalFallback => write!(f, "remote-then-local"),
        }
    }
}

/// Process-wide configuration, read-only after load.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Shared HMAC signing secret. `None` only for remote-only deployments.
    pub jwt_secret: Option<String>,
    /// Signing algorithm (symmetric HMAC family only).
    pub jwt_algorithm: Algorithm,
    /// Token lifetime; `exp = iat + token_ttl`.
    pub token_ttl: Duration,
    /// Base URL of the central issuer, for delegated verification.
    pub auth_service_url: Option<String>,
    /// Token verification strategy.
    pub verify_strategy: VerificationStrategy,
    /// Path to the embedded credential database. `None` selects the
    /// in-memory backend seeded from `users_json`.
    pub database_path: Option<PathBuf>,
    /// Run the versioned schema migration before serving requests.
    pub database_migrate: bool,
    /// Seed identities as a raw JSON array of `{email, password, role}`.
    pub users_json: Option<String>,
    /// Test seam: when true, the auth gate returns a fixed dummy identity
    /// without any cryptographic or network work. Never enabled implicitly.
    pub auth_bypass: bool,
    /// Bind address.
    pub host: String,
    /// Bind port.
    pub port: u16,
}

impl AppConfig {
    /// Load configuration from the environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let jwt_secret = env::var("JWT_SECRET").ok().filter(|s| !s.is_empty());

        let jwt_algorithm = match env::var("JWT_ALGORITHM") {
            Ok(raw) => parse_algorithm(&raw)?,
            Err(_) => Algorithm::HS256,
        };

        let ttl_minutes = match env::var("ACCESS_TOKEN_EXPIRE_MINUTES") {
            Ok(raw) => raw.parse::<u64>().map_err(|e| ConfigError::InvalidValue {
                var: "ACCESS_TOKEN_EXPIRE_MINUTES",
                reason: e.to_string(),
            })?,
            Err(_) => DEFAULT_TOKEN_TTL_MINUTES,
        };

        let auth_service_url = env::var("AUTH_SERVICE_URL")
            .ok()
            .filter(|s| !s.is_empty())
            .map(|s| s.trim_end_matches('/').to_string());

        let verify_strategy = match env::var("AUTH_VERIFY_STRATEGY") {
            Ok(raw) => {
                VerificationStrategy::parse(&raw).ok_or_else(|| ConfigError::InvalidValue {
                    var: "AUTH_VERIFY_STRATEGY",
                    reason: format!("expected local, remote, or remote-then-local, got {raw:?}"),
                })?
            }
            Err(_) => VerificationStrategy::LocalOnly,
        };

        let auth_bypass = env_flag("AUTH_BYPASS");

        // A strategy that decodes locally needs the secret; a strategy that
        // delegates needs the issuer URL. Fail at startup, not per-request.
        // The bypass seam does not loosen verification itself: it is for
        // test rigs that never reach the verifier at all.
        if verify_strategy.uses_local() && jwt_secret.is_none() && !auth_bypass {
            return Err(ConfigError::MissingSecret {
                strategy: verify_strategy,
            });
        }
        if verify_strategy.uses_remote() && auth_service_url.is_none() {
            return Err(ConfigError::MissingAuthServiceUrl {
                strategy: verify_strategy,
            });
        }

        let port = match env::var("PORT") {
            Ok(raw) => raw.parse::<u16>().map_err(|e| ConfigError::InvalidValue {
                var: "PORT",
                reason: e.to_string(),
            })?,
            Err(_) => 8080,
        };

        Ok(Self {
            jwt_secret,
            jwt_algorithm,
            token_ttl: Duration::from_secs(ttl_minutes * 60),
            auth_service_url,
            verify_strategy,
            database_path: env::var("DATABASE_URL")
                .ok()
                .filter(|s| !s.is_empty())
                .map(PathBuf::from),
            database_migrate: env_flag("DATABASE_MIGRATE"),
            users_json: env::var("USERS_JSON").ok().filter(|s| !s.is_empty()),
            auth_bypass,
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port,
        })
    }

    /// Token lifetime in whole seconds, as reported in `expires_in`.
    pub fn token_ttl_seconds(&self) -> u64 {
        self.token_ttl.as_secs()
    }
}

impl Default for AppConfig {
    /// A local-only configuration suitable for tests.
    fn default() -> Self {
        Self {
            jwt_secret: Some("test-secret".to_string()),
            jwt_algorithm: Algorithm::HS256,
            token_ttl: Duration::from_secs(DEFAULT_TOKEN_TTL_MINUTES * 60),
            auth_service_url: None,
            verify_strategy: VerificationStrategy::LocalOnly,
            database_path: None,
            database_migrate: false,
            users_json: None,
            auth_bypass: false,
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

/// Only the symmetric HMAC family is supported; tokens are verified with
/// the same shared secret that signs them.
fn parse_algorithm(raw: &str) -> Result<Algorithm, ConfigError> {
    match raw.to_uppercase().as_str() {
        "HS256" => Ok(Algorithm::HS256),
        "HS384" => Ok(Algorithm::HS384),
        "HS512" => Ok(Algorithm::HS512),
        other => Err(ConfigError::InvalidValue {
            var: "JWT_ALGORITHM",
            reason: format!("unsupported algorithm {other:?}"),
        }),
    }
}

fn env_flag(var: &str) -> bool {
    env::var(var)
        .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false)
}
