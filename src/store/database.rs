// SPDX-License-Identifier: AGPL-3.0-or-later

//! Embedded credential database backed by redb (pure Rust, ACID).
//!
//! ## Table Layout
//!
//! - `credentials`: email → serialized CredentialRecord (JSON bytes)
//! - `auth_user_roles`: legacy side table, numeric user id → role name
//! - `meta`: schema bookkeeping (`schema_version`)
//!
//! ## Schema Versions
//!
//! - **v1 (legacy)**: rows written by the pre-migration service. Passwords
//!   may be plaintext in the `password` field, roles may live only in the
//!   `auth_user_roles` side table. A v1 store is readable but rejects
//!   creates with the `"no writable columns available"` error.
//! - **v2 (current)**: rows carry an argon2 `password_hash`; creates work.
//!
//! Upgrading v1 → v2 is an explicit, versioned migration that runs before
//! the server binds and only when requested (`DATABASE_MIGRATE=true`).
//! It normalizes row encoding and bumps the version; it never drops a
//! table and never converts a plaintext password into a hash — legacy
//! values keep verifying by string equality until explicitly reseeded.

use std::path::Path;

use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::auth::password::{hash_password, StoredPassword};

use super::credentials::{Credential, CredentialStore, CredentialStoreError, SeedUser};

// =============================================================================
// Table Definitions
// =============================================================================

/// Primary table: email → serialized CredentialRecord (JSON bytes).
const CREDENTIALS: TableDefinition<&str, &[u8]> = TableDefinition::new("credentials");

/// Legacy side table: numeric user id → role name.
const AUTH_USER_ROLES: TableDefinition<u64, &str> = TableDefinition::new("auth_user_roles");

/// Schema bookkeeping: key → value.
const META: TableDefinition<&str, u32> = TableDefinition::new("meta");

const SCHEMA_VERSION_KEY: &str = "schema_version";

/// Legacy pre-migration schema.
pub const SCHEMA_V1_LEGACY: u32 = 1;
/// Current schema.
pub const SCHEMA_V2_CURRENT: u32 = 2;

// =============================================================================
// Error Type
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("redb database error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),

    #[error("redb transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("redb table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("redb storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("redb commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl From<DbError> for CredentialStoreError {
    fn from(e: DbError) -> Self {
        CredentialStoreError::Storage(e.to_string())
    }
}

// =============================================================================
// Stored record
// =============================================================================

/// On-disk credential row. Mirrors the legacy relational columns: a row has
/// either `password_hash` (current) or a plaintext `password` (legacy), and
/// its role may be inline or only reachable through the side table.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CredentialRecord {
    email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    password_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    user_id: Option<u64>,
}

// =============================================================================
// RedbCredentialStore
// =============================================================================

/// Persistent credential store selected by `DATABASE_URL`.
pub struct RedbCredentialStore {
    db: Database,
    schema_version: u32,
}

impl RedbCredentialStore {
    /// Open (or create) the database at the given path.
    ///
    /// A fresh database is stamped with the current schema version. An
    /// existing database keeps whatever version it has; no DDL happens
    /// here — upgrading is [`Self::migrate`]'s job, run out-of-band.
    pub fn open(path: &Path) -> Result<Self, DbError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let db = Database::create(path)?;

        // Pre-create all tables so later read transactions don't fail.
        let write_txn = db.begin_write()?;
        let schema_version;
        {
            let _ = write_txn.open_table(CREDENTIALS)?;
            let _ = write_txn.open_table(AUTH_USER_ROLES)?;
            let mut meta = write_txn.open_table(META)?;
            let existing = meta.get(SCHEMA_VERSION_KEY)?.map(|v| v.value());
            schema_version = match existing {
                Some(v) => v,
                None => {
                    meta.insert(SCHEMA_VERSION_KEY, SCHEMA_V2_CURRENT)?;
                    SCHEMA_V2_CURRENT
                }
            };
        }
        write_txn.commit()?;

        if schema_version != SCHEMA_V2_CURRENT {
            info!(
                schema_version,
                "credential database uses a legacy schema; creates are disabled until migration"
            );
        }

        Ok(Self { db, schema_version })
    }

    /// The schema version observed at open (or after migration).
    pub fn schema_version(&self) -> u32 {
        self.schema_version
    }

    /// Upgrade a legacy store to the current schema.
    ///
    /// Re-encodes every row (dropping unknown fields from older writers)
    /// and bumps the version stamp. Plaintext passwords and side-table
    /// roles are preserved as-is.
    pub fn migrate(&mut self) -> Result<(), DbError> {
        if self.schema_version == SCHEMA_V2_CURRENT {
            return Ok(());
        }

        let write_txn = self.db.begin_write()?;
        let mut migrated = 0usize;
        {
            let mut table = write_txn.open_table(CREDENTIALS)?;
            let rows: Vec<(String, Vec<u8>)> = table
                .iter()?
                .map(|entry| {
                    let (k, v) = entry?;
                    Ok((k.value().to_string(), v.value().to_vec()))
                })
                .collect::<Result<_, redb::StorageError>>()?;

            for (email, bytes) in rows {
                let record: CredentialRecord = serde_json::from_slice(&bytes)?;
                let normalized = serde_json::to_vec(&record)?;
                table.insert(email.as_str(), normalized.as_slice())?;
                migrated += 1;
            }

            let mut meta = write_txn.open_table(META)?;
            meta.insert(SCHEMA_VERSION_KEY, SCHEMA_V2_CURRENT)?;
        }
        write_txn.commit()?;

        self.schema_version = SCHEMA_V2_CURRENT;
        info!(
            rows = migrated,
            from = SCHEMA_V1_LEGACY,
            to = SCHEMA_V2_CURRENT,
            "credential schema migration complete"
        );
        Ok(())
    }

    fn get_record(&self, email: &str) -> Result<Option<CredentialRecord>, DbError> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(CREDENTIALS)?;
        match table.get(email)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    fn side_table_role(&self, user_id: u64) -> Result<Option<String>, DbError> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(AUTH_USER_ROLES)?;
        Ok(table.get(user_id)?.map(|v| v.value().to_string()))
    }

    fn is_empty(&self) -> Result<bool, DbError> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(CREDENTIALS)?;
        let empty = table.iter()?.next().is_none();
        Ok(empty)
    }

    fn insert_record(&self, record: &CredentialRecord) -> Result<(), DbError> {
        let json = serde_json::to_vec(record)?;
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(CREDENTIALS)?;
            table.insert(record.email.as_str(), json.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    fn record_to_credential(&self, record: CredentialRecord) -> Result<Credential, DbError> {
        // Password scheme: hash column wins; otherwise the legacy plaintext
        // column; a row with neither cannot authenticate.
        let password = match (&record.password_hash, &record.password) {
            (Some(hash), _) => StoredPassword::from_stored(hash),
            (None, Some(plain)) => StoredPassword::LegacyPlaintext(plain.clone()),
            (None, None) => StoredPassword::LegacyPlaintext(String::new()),
        };

        // Role resolution order: inline column, then the legacy side table,
        // then none.
        let role = match (&record.role, record.user_id) {
            (Some(role), _) => Some(role.clone()),
            (None, Some(user_id)) => self.side_table_role(user_id)?,
            (None, None) => None,
        };

        Ok(Credential {
            email: record.email,
            password,
            role,
            user_id: record.user_id,
        })
    }
}

impl CredentialStore for RedbCredentialStore {
    fn find_by_identifier(&self, identifier: &str) -> Option<Credential> {
        match self.get_record(identifier) {
            Ok(Some(record)) => self.record_to_credential(record).ok(),
            Ok(None) => None,
            Err(e) => {
                tracing::error!(error = %e, "credential lookup failed");
                None
            }
        }
    }

    fn create(
        &self,
        email: &str,
        password: &str,
        role: Option<&str>,
    ) -> Result<Credential, CredentialStoreError> {
        if self.schema_version != SCHEMA_V2_CURRENT {
            // Legacy schema has no hash or role columns to write into.
            return Err(CredentialStoreError::NoWritableColumns);
        }
        if self.get_record(email).map_err(CredentialStoreError::from)?.is_some() {
            return Err(CredentialStoreError::Conflict(email.to_string()));
        }

        let hash =
            hash_password(password).map_err(|e| CredentialStoreError::Storage(e.to_string()))?;
        let record = CredentialRecord {
            email: email.to_string(),
            password_hash: Some(hash),
            password: None,
            role: role.map(str::to_string),
            user_id: None,
        };
        self.insert_record(&record).map_err(CredentialStoreError::from)?;
        self.record_to_credential(record).map_err(CredentialStoreError::from)
    }

    fn ensure_seeded(&self, defaults: &[SeedUser]) -> Result<(), CredentialStoreError> {
        if self.schema_version != SCHEMA_V2_CURRENT {
            // Never write into a legacy schema; migrate first.
            return Ok(());
        }
        if !self.is_empty().map_err(CredentialStoreError::from)? {
            return Ok(());
        }
        for seed in defaults {
            self.create(&seed.email, &seed.password, seed.role.as_deref())?;
        }
        info!(count = defaults.len(), "seeded credential database");
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "redb"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    /// Write a v1 database by hand: a plaintext-password row whose role
    /// lives only in the side table, the way the pre-migration service
    /// left it.
    fn write_legacy_fixture(path: &Path) {
        let db = Database::create(path).unwrap();
        let write_txn = db.begin_write().unwrap();
        {
            let mut meta = write_txn.open_table(META).unwrap();
            meta.insert(SCHEMA_VERSION_KEY, SCHEMA_V1_LEGACY).unwrap();

            let record = serde_json::json!({
                "email": "legacy@medsupply.example",
                "password": "plaintext-pw",
                "user_id": 7
            });
            let bytes = serde_json::to_vec(&record).unwrap();
            let mut table = write_txn.open_table(CREDENTIALS).unwrap();
            table
                .insert("legacy@medsupply.example", bytes.as_slice())
                .unwrap();

            let mut side = write_txn.open_table(AUTH_USER_ROLES).unwrap();
            side.insert(7u64, "warehouse_manager").unwrap();
        }
        write_txn.commit().unwrap();
    }

    #[test]
    fn fresh_database_is_current_and_writable() {
        let dir = TempDir::new().unwrap();
        let store = RedbCredentialStore::open(&dir.path().join("auth.redb")).unwrap();
        assert_eq!(store.schema_version(), SCHEMA_V2_CURRENT);

        let created = store
            .create("new@medsupply.example", "pw123", Some("viewer"))
            .unwrap();
        assert!(matches!(created.password, StoredPassword::Argon2id(_)));

        let found = store.find_by_identifier("new@medsupply.example").unwrap();
        assert_eq!(found.role.as_deref(), Some("viewer"));
        assert!(found.password.verify("pw123").unwrap());
    }

    #[test]
    fn duplicate_create_conflicts() {
        let dir = TempDir::new().unwrap();
        let store = RedbCredentialStore::open(&dir.path().join("auth.redb")).unwrap();
        store.create("a@b.c", "pw", None).unwrap();
        assert!(matches!(
            store.create("a@b.c", "pw", None),
            Err(CredentialStoreError::Conflict(_))
        ));
    }

    #[test]
    fn legacy_row_resolves_plaintext_and_side_table_role() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("auth.redb");
        write_legacy_fixture(&path);

        let store = RedbCredentialStore::open(&path).unwrap();
        assert_eq!(store.schema_version(), SCHEMA_V1_LEGACY);

        let credential = store.find_by_identifier("legacy@medsupply.example").unwrap();
        assert!(matches!(
            credential.password,
            StoredPassword::LegacyPlaintext(_)
        ));
        assert!(credential.password.verify("plaintext-pw").unwrap());
        assert_eq!(credential.role.as_deref(), Some("warehouse_manager"));
    }

    #[test]
    fn create_on_legacy_schema_reports_no_writable_columns() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("auth.redb");
        write_legacy_fixture(&path);

        let store = RedbCredentialStore::open(&path).unwrap();
        let err = store.create("new@x.com", "pw", None).unwrap_err();
        assert!(err.to_string().contains("no writable columns available"));
    }

    #[test]
    fn migrate_bumps_version_and_preserves_legacy_values() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("auth.redb");
        write_legacy_fixture(&path);

        let mut store = RedbCredentialStore::open(&path).unwrap();
        store.migrate().unwrap();
        assert_eq!(store.schema_version(), SCHEMA_V2_CURRENT);

        // Plaintext stays plaintext; migration never hashes behind our back.
        let credential = store.find_by_identifier("legacy@medsupply.example").unwrap();
        assert!(matches!(
            credential.password,
            StoredPassword::LegacyPlaintext(_)
        ));
        assert_eq!(credential.role.as_deref(), Some("warehouse_manager"));

        // And creates now work.
        store.create("post@migration.example", "pw", None).unwrap();
    }

    #[test]
    fn seeding_only_when_empty() {
        let dir = TempDir::new().unwrap();
        let store = RedbCredentialStore::open(&dir.path().join("auth.redb")).unwrap();
        let seeds = crate::store::credentials::parse_seed_users(
            r#"[{"email":"admin","password":"Admin#123","role":"security_admin"}]"#,
        )
        .unwrap();

        store.ensure_seeded(&seeds).unwrap();
        assert!(store.find_by_identifier("admin").is_some());

        // A second call must not duplicate or overwrite.
        store.ensure_seeded(&seeds).unwrap();
        let credential = store.find_by_identifier("admin").unwrap();
        assert!(credential.password.verify("Admin#123").unwrap());
    }
}
