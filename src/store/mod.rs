// SPDX-License-Identifier: AGPL-3.0-or-later

//! # Storage Module
//!
//! Credential and role/permission storage.
//!
//! - `credentials` — the [`CredentialStore`] trait and its in-memory
//!   backend (seeded from `USERS_JSON`).
//! - `database` — the persistent redb backend selected by `DATABASE_URL`,
//!   including the versioned legacy-schema migration.
//! - `roles` — users, role definitions, permission assignments, and the
//!   access-control decision point.

pub mod credentials;
pub mod database;
pub mod roles;

pub use credentials::{
    parse_seed_users, Credential, CredentialStore, CredentialStoreError, MemoryCredentialStore,
    SeedUser,
};
pub use database::RedbCredentialStore;
pub use roles::{
    AccessCheckResult, AssignedRole, AssignmentInput, InvalidAction, PermissionAction,
    RoleRecord, RoleStore, RoleStoreError, UserRecord, UserWithRoles,
};
