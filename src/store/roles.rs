// SPDX-License-Identifier: AGPL-3.0-or-later

//! Role and permission assignments.
//!
//! Users, role definitions, and per-(user, role) permission flags, plus the
//! access-control decision point the downstream services query. Assignment
//! updates use replace semantics: every existing row for the user is
//! deleted and the new list inserted.
//!
//! Concurrent replaces for the *same* user are serialized in-process by the
//! `RwLock` around this store; across processes the delete-then-insert
//! window is unguarded, matching the deployed behavior.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// A named permission bucket. Immutable once referenced by assignments.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RoleRecord {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// A managed user, as known to the role store.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserRecord {
    pub id: i64,
    pub names: String,
    pub email: String,
    /// Optional plain role string assigned at creation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

/// Permission flags for one (user, role) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PermissionFlags {
    can_create: bool,
    can_edit: bool,
    can_delete: bool,
    can_view: bool,
}

/// One item of a `set_user_roles` request. Flags are coerced to booleans;
/// `can_view` defaults true, the rest false.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct AssignmentInput {
    pub role_id: i64,
    #[serde(default)]
    pub can_create: bool,
    #[serde(default)]
    pub can_edit: bool,
    #[serde(default)]
    pub can_delete: bool,
    #[serde(default = "default_true")]
    pub can_view: bool,
}

fn default_true() -> bool {
    true
}

/// A role assignment as returned to clients.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AssignedRole {
    pub id: i64,
    pub name: String,
    pub can_create: bool,
    pub can_edit: bool,
    pub can_delete: bool,
    pub can_view: bool,
}

/// A user together with all their role assignments. The `roles` array is
/// always present, possibly empty.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct UserWithRoles {
    pub id: i64,
    pub names: String,
    pub email: String,
    pub roles: Vec<AssignedRole>,
}

/// The action being checked at the access-control decision point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionAction {
    Create,
    Edit,
    Delete,
    View,
}

/// Rejection for an unrecognized action string. Unlike an absent user or
/// assignment, a bad action is a caller error, never a quiet `false`.
#[derive(Debug, thiserror::Error)]
#[error("invalid action {0:?}, expected one of create, edit, delete, view")]
pub struct InvalidAction(pub String);

impl PermissionAction {
    pub fn parse(s: &str) -> Result<Self, InvalidAction> {
        match s {
            "create" => Ok(Self::Create),
            "edit" => Ok(Self::Edit),
            "delete" => Ok(Self::Delete),
            "view" => Ok(Self::View),
            other => Err(InvalidAction(other.to_string())),
        }
    }
}

/// Outcome of an access check.
///
/// An absent user is a normal "no access" outcome; an absent role is a hard
/// error. The asymmetry is intentional, preserved from the deployed
/// contract (candidate for cleanup, tracked in DESIGN.md).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessCheckResult {
    /// User and role both exist; `permission` reflects the flag for the
    /// action, `false` when no assignment links them.
    Granted { permission: bool },
    /// No user with that email.
    UserNotFound,
    /// No role definition with that name.
    RoleNotFound,
}

/// Role store failures.
#[derive(Debug, thiserror::Error)]
pub enum RoleStoreError {
    #[error("email_exists")]
    EmailExists,

    #[error("role already exists: {0}")]
    DuplicateRole(String),
}

/// In-memory role/permission store.
#[derive(Default)]
pub struct RoleStore {
    users: HashMap<i64, UserRecord>,
    roles: HashMap<i64, RoleRecord>,
    /// (user_id, role_id) → flags; BTreeMap keeps listing order stable.
    assignments: BTreeMap<(i64, i64), PermissionFlags>,
    next_user_id: i64,
    next_role_id: i64,
}

impl RoleStore {
    pub fn new() -> Self {
        Self::default()
    }

    // =========================================================================
    // Roles
    // =========================================================================

    pub fn list_roles(&self) -> Vec<RoleRecord> {
        let mut roles: Vec<_> = self.roles.values().cloned().collect();
        roles.sort_by_key(|r| r.id);
        roles
    }

    pub fn create_role(
        &mut self,
        name: &str,
        description: &str,
    ) -> Result<RoleRecord, RoleStoreError> {
        if self.roles.values().any(|r| r.name == name) {
            return Err(RoleStoreError::DuplicateRole(name.to_string()));
        }
        self.next_role_id += 1;
        let role = RoleRecord {
            id: self.next_role_id,
            name: name.to_string(),
            description: description.to_string(),
        };
        self.roles.insert(role.id, role.clone());
        Ok(role)
    }

    fn role_by_name(&self, name: &str) -> Option<&RoleRecord> {
        self.roles.values().find(|r| r.name == name)
    }

    // =========================================================================
    // Users
    // =========================================================================

    pub fn list_users(&self) -> Vec<UserRecord> {
        let mut users: Vec<_> = self.users.values().cloned().collect();
        users.sort_by_key(|u| u.id);
        users
    }

    pub fn create_user(
        &mut self,
        names: &str,
        email: &str,
        role: Option<&str>,
    ) -> Result<UserRecord, RoleStoreError> {
        if self.users.values().any(|u| u.email == email) {
            return Err(RoleStoreError::EmailExists);
        }
        self.next_user_id += 1;
        let user = UserRecord {
            id: self.next_user_id,
            names: names.to_string(),
            email: email.to_string(),
            role: role.map(str::to_string),
        };
        self.users.insert(user.id, user.clone());
        Ok(user)
    }

    /// Remove a user and every assignment that references them. Used to
    /// unwind a user insert whose follow-up credential write failed.
    pub fn remove_user(&mut self, user_id: i64) -> Option<UserRecord> {
        let user = self.users.remove(&user_id)?;
        let stale: Vec<_> = self
            .assignments
            .range((user_id, i64::MIN)..=(user_id, i64::MAX))
            .map(|(k, _)| *k)
            .collect();
        for key in stale {
            self.assignments.remove(&key);
        }
        Some(user)
    }

    fn user_by_email(&self, email: &str) -> Option<&UserRecord> {
        self.users.values().find(|u| u.email == email)
    }

    /// Role name to embed in a token when the credential row itself has
    /// none: first assignment's role, then the user's plain role string.
    pub fn role_for_email(&self, email: &str) -> Option<String> {
        let user = self.user_by_email(email)?;
        self.assignments
            .range((user.id, i64::MIN)..=(user.id, i64::MAX))
            .find_map(|((_, role_id), _)| self.roles.get(role_id).map(|r| r.name.clone()))
            .or_else(|| user.role.clone())
    }

    // =========================================================================
    // Assignments
    // =========================================================================

    /// Replace the full assignment set for a user.
    ///
    /// Existing rows for the user are deleted first, then one row inserted
    /// per item. Items whose `role_id` does not resolve are skipped without
    /// error — deliberate best-effort behavior. Returns `None` (not an
    /// error) when the user does not exist.
    pub fn set_user_roles(
        &mut self,
        user_id: i64,
        items: &[AssignmentInput],
    ) -> Option<UserWithRoles> {
        self.users.get(&user_id)?;

        let stale: Vec<_> = self
            .assignments
            .range((user_id, i64::MIN)..=(user_id, i64::MAX))
            .map(|(k, _)| *k)
            .collect();
        for key in stale {
            self.assignments.remove(&key);
        }

        for item in items {
            if !self.roles.contains_key(&item.role_id) {
                continue;
            }
            self.assignments.insert(
                (user_id, item.role_id),
                PermissionFlags {
                    can_create: item.can_create,
                    can_edit: item.can_edit,
                    can_delete: item.can_delete,
                    can_view: item.can_view,
                },
            );
        }

        self.get_user_with_roles(user_id)
    }

    /// A user and their assignments; `roles` is always an array.
    pub fn get_user_with_roles(&self, user_id: i64) -> Option<UserWithRoles> {
        let user = self.users.get(&user_id)?;
        Some(self.build_user_with_roles(user))
    }

    pub fn users_with_roles(&self) -> Vec<UserWithRoles> {
        self.list_users()
            .iter()
            .map(|u| self.build_user_with_roles(u))
            .collect()
    }

    fn build_user_with_roles(&self, user: &UserRecord) -> UserWithRoles {
        let roles = self
            .assignments
            .range((user.id, i64::MIN)..=(user.id, i64::MAX))
            .filter_map(|((_, role_id), flags)| {
                self.roles.get(role_id).map(|role| AssignedRole {
                    id: role.id,
                    name: role.name.clone(),
                    can_create: flags.can_create,
                    can_edit: flags.can_edit,
                    can_delete: flags.can_delete,
                    can_view: flags.can_view,
                })
            })
            .collect();

        UserWithRoles {
            id: user.id,
            names: user.names.clone(),
            email: user.email.clone(),
            roles,
        }
    }

    // =========================================================================
    // Access-control decision point
    // =========================================================================

    /// Answer whether the permission flag for `action` is set on the
    /// (user, role) assignment. Never panics and never errors for a valid
    /// action: absence of the user or of the assignment is an ordinary
    /// "no permission" outcome.
    pub fn check_access(
        &self,
        email: &str,
        role_name: &str,
        action: PermissionAction,
    ) -> AccessCheckResult {
        let user = match self.user_by_email(email) {
            Some(user) => user,
            None => return AccessCheckResult::UserNotFound,
        };
        let role = match self.role_by_name(role_name) {
            Some(role) => role,
            None => return AccessCheckResult::RoleNotFound,
        };

        let permission = match self.assignments.get(&(user.id, role.id)) {
            Some(flags) => match action {
                PermissionAction::Create => flags.can_create,
                PermissionAction::Edit => flags.can_edit,
                PermissionAction::Delete => flags.can_delete,
                PermissionAction::View => flags.can_view,
            },
            None => false,
        };

        AccessCheckResult::Granted { permission }
    }
}
