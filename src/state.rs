// SPDX-License-Identifier: AGPL-3.0-or-later

use std::sync::Arc;

use tokio::sync::RwLock;

use crate::auth::{TokenIssuer, TokenVerifier};
use crate::config::AppConfig;
use crate::store::{CredentialStore, MemoryCredentialStore, RoleStore};

/// Shared application state, cloned per request.
///
/// Everything except the role store is read-only after startup; the role
/// store takes writes behind an async `RwLock`.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub issuer: Arc<TokenIssuer>,
    pub verifier: Arc<TokenVerifier>,
    pub credentials: Arc<dyn CredentialStore>,
    pub roles: Arc<RwLock<RoleStore>>,
}

impl AppState {
    pub fn new(config: AppConfig, credentials: Arc<dyn CredentialStore>) -> Self {
        let issuer = TokenIssuer::new(&config);
        let verifier = TokenVerifier::new(&config);
        Self {
            config: Arc::new(config),
            issuer: Arc::new(issuer),
            verifier: Arc::new(verifier),
            credentials,
            roles: Arc::new(RwLock::new(RoleStore::new())),
        }
    }

    /// State with an empty in-memory credential store.
    pub fn in_memory(config: AppConfig) -> Self {
        Self::new(config, Arc::new(MemoryCredentialStore::new()))
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::in_memory(AppConfig::default())
    }
}
