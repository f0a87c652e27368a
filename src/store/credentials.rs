// SPDX-License-Identifier: AGPL-3.0-or-later

//! Credential storage.
//!
//! Two backends implement [`CredentialStore`]: an in-memory map built once
//! at startup from `USERS_JSON`, and the embedded persistent store in
//! `store::database`. Selection happens in `main` based on configuration;
//! everything downstream sees only the trait.

use std::collections::HashMap;
use std::sync::RwLock;

use serde::Deserialize;
use tracing::info;

use crate::auth::password::{hash_password, StoredPassword};

/// An identity record.
///
/// Exactly one credential exists per email. `role` may be absent for
/// legacy rows; `user_id` links to the legacy side role table where one
/// exists.
#[derive(Debug, Clone)]
pub struct Credential {
    pub email: String,
    pub password: StoredPassword,
    pub role: Option<String>,
    pub user_id: Option<u64>,
}

/// Credential store failures mapped to HTTP statuses at the handler layer.
#[derive(Debug, thiserror::Error)]
pub enum CredentialStoreError {
    #[error("credential already exists for {0}")]
    Conflict(String),

    /// The backing schema is a legacy version that cannot hold new-format
    /// rows. The message is part of the observable contract.
    #[error("no writable columns available")]
    NoWritableColumns,

    #[error("storage error: {0}")]
    Storage(String),
}

/// A seed identity from `USERS_JSON`.
#[derive(Debug, Deserialize)]
pub struct SeedUser {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub role: Option<String>,
}

/// Lookup and administrative creation of credentials.
pub trait CredentialStore: Send + Sync {
    /// Case-sensitive exact-match lookup.
    fn find_by_identifier(&self, identifier: &str) -> Option<Credential>;

    /// Create a credential, hashing the password. Duplicate email fails.
    fn create(
        &self,
        email: &str,
        password: &str,
        role: Option<&str>,
    ) -> Result<Credential, CredentialStoreError>;

    /// Insert the given defaults if the store holds no credentials yet.
    fn ensure_seeded(&self, defaults: &[SeedUser]) -> Result<(), CredentialStoreError>;

    /// Short backend name for health reporting.
    fn backend_name(&self) -> &'static str;
}

/// Parse a `USERS_JSON` value.
pub fn parse_seed_users(raw: &str) -> Result<Vec<SeedUser>, serde_json::Error> {
    serde_json::from_str(raw)
}

/// In-memory credential store, used when no `DATABASE_URL` is configured.
pub struct MemoryCredentialStore {
    users: RwLock<HashMap<String, Credential>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self {
            users: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for MemoryCredentialStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn find_by_identifier(&self, identifier: &str) -> Option<Credential> {
        self.users.read().expect("lock poisoned").get(identifier).cloned()
    }

    fn create(
        &self,
        email: &str,
        password: &str,
        role: Option<&str>,
    ) -> Result<Credential, CredentialStoreError> {
        let mut users = self.users.write().expect("lock poisoned");
        if users.contains_key(email) {
            return Err(CredentialStoreError::Conflict(email.to_string()));
        }
        let hash =
            hash_password(password).map_err(|e| CredentialStoreError::Storage(e.to_string()))?;
        let credential = Credential {
            email: email.to_string(),
            password: StoredPassword::Argon2id(hash),
            role: role.map(str::to_string),
            user_id: None,
        };
        users.insert(email.to_string(), credential.clone());
        Ok(credential)
    }

    fn ensure_seeded(&self, defaults: &[SeedUser]) -> Result<(), CredentialStoreError> {
        if !self.users.read().expect("lock poisoned").is_empty() {
            return Ok(());
        }
        for seed in defaults {
            self.create(&seed.email, &seed.password, seed.role.as_deref())?;
        }
        info!(count = defaults.len(), "seeded in-memory credential store");
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seed() -> Vec<SeedUser> {
        parse_seed_users(
            r#"[{"email":"admin","password":"Admin#123","role":"security_admin"}]"#,
        )
        .unwrap()
    }

    #[test]
    fn seeded_credential_is_hashed_and_findable() {
        let store = MemoryCredentialStore::new();
        store.ensure_seeded(&seed()).unwrap();

        let credential = store.find_by_identifier("admin").unwrap();
        assert_eq!(credential.role.as_deref(), Some("security_admin"));
        assert!(matches!(credential.password, StoredPassword::Argon2id(_)));
        assert!(credential.password.verify("Admin#123").unwrap());
    }

    #[test]
    fn lookup_is_case_sensitive() {
        let store = MemoryCredentialStore::new();
        store.ensure_seeded(&seed()).unwrap();
        assert!(store.find_by_identifier("Admin").is_none());
    }

    #[test]
    fn duplicate_create_conflicts() {
        let store = MemoryCredentialStore::new();
        store.create("a@b.c", "pw", None).unwrap();
        assert!(matches!(
            store.create("a@b.c", "pw2", None),
            Err(CredentialStoreError::Conflict(_))
        ));
    }

    #[test]
    fn seeding_is_skipped_when_not_empty() {
        let store = MemoryCredentialStore::new();
        store.create("existing@x.com", "pw", None).unwrap();
        store.ensure_seeded(&seed()).unwrap();
        assert!(store.find_by_identifier("admin").is_none());
    }

    #[test]
    fn seed_json_with_missing_role_parses() {
        let seeds = parse_seed_users(r#"[{"email":"x","password":"y"}]"#).unwrap();
        assert!(seeds[0].role.is_none());
    }
}
