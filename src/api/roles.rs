// SPDX-License-Identifier: AGPL-3.0-or-later

//! Role and user management endpoints.
//!
//! Reads require any authenticated caller; mutating the role-permission
//! matrix additionally requires the `security_admin` role.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::Value;
use tracing::{error, info};
use utoipa::ToSchema;

use crate::{
    auth::{Auth, SecurityAdmin},
    error::ApiError,
    state::AppState,
    store::{
        AssignmentInput, CredentialStoreError, RoleRecord, RoleStoreError, UserRecord,
        UserWithRoles,
    },
};

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateRoleRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateUserRequest {
    pub names: String,
    pub email: String,
    #[serde(default)]
    pub role: Option<String>,
    /// When present, a login credential is created alongside the user
    /// record so the new user can authenticate immediately.
    #[serde(default)]
    pub password: Option<String>,
}

#[utoipa::path(
    get,
    path = "/api/roles",
    tag = "Roles",
    responses((status = 200, body = [RoleRecord]))
)]
pub async fn list_roles(
    Auth(_user): Auth,
    State(state): State<AppState>,
) -> Json<Vec<RoleRecord>> {
    Json(state.roles.read().await.list_roles())
}

#[utoipa::path(
    post,
    path = "/api/roles",
    tag = "Roles",
    request_body = CreateRoleRequest,
    responses(
        (status = 201, body = RoleRecord),
        (status = 409, description = "Role name already exists")
    )
)]
pub async fn create_role(
    Auth(_user): Auth,
    State(state): State<AppState>,
    Json(request): Json<CreateRoleRequest>,
) -> Result<(StatusCode, Json<RoleRecord>), ApiError> {
    let mut roles = state.roles.write().await;
    let role = roles
        .create_role(&request.name, &request.description)
        .map_err(|e| ApiError::conflict(e.to_string()))?;
    info!(role = %role.name, id = role.id, "created role");
    Ok((StatusCode::CREATED, Json(role)))
}

#[utoipa::path(
    get,
    path = "/api/users",
    tag = "Users",
    responses((status = 200, body = [UserRecord]))
)]
pub async fn list_users(
    Auth(_user): Auth,
    State(state): State<AppState>,
) -> Json<Vec<UserRecord>> {
    Json(state.roles.read().await.list_users())
}

#[utoipa::path(
    post,
    path = "/api/users",
    tag = "Users",
    request_body = CreateUserRequest,
    responses(
        (status = 201, body = UserRecord),
        (status = 400, description = "Email already registered")
    )
)]
pub async fn create_user(
    Auth(_user): Auth,
    State(state): State<AppState>,
    Json(request): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<UserRecord>), ApiError> {
    let mut roles = state.roles.write().await;
    let user = roles
        .create_user(&request.names, &request.email, request.role.as_deref())
        .map_err(|e| match e {
            // Duplicate email is a 400 with a bare token, not a 409.
            // Clients branch on this exact body.
            RoleStoreError::EmailExists => ApiError::bad_request(e.to_string()),
            other => ApiError::conflict(other.to_string()),
        })?;

    if let Some(password) = request.password.as_deref() {
        // The user row must not survive a failed credential write, or a
        // retry would hit email_exists with no credential ever created.
        if let Err(e) = state
            .credentials
            .create(&user.email, password, request.role.as_deref())
        {
            roles.remove_user(user.id);
            return Err(match e {
                CredentialStoreError::Conflict(_) => {
                    ApiError::bad_request(RoleStoreError::EmailExists.to_string())
                }
                other => {
                    error!(%other, email = %user.email, "failed to create credential for new user");
                    ApiError::internal("credential creation failed")
                }
            });
        }
    }

    info!(email = %user.email, id = user.id, "created user");
    Ok((StatusCode::CREATED, Json(user)))
}

#[utoipa::path(
    get,
    path = "/api/users-with-roles",
    tag = "Users",
    responses((status = 200, body = [UserWithRoles]))
)]
pub async fn users_with_roles(
    Auth(_user): Auth,
    State(state): State<AppState>,
) -> Json<Vec<UserWithRoles>> {
    Json(state.roles.read().await.users_with_roles())
}

/// Replace a user's role assignments and permission flags.
///
/// The body is validated by hand because the contract distinguishes
/// "assignments missing or not a list" (400) from "an item lacks role_id"
/// (400 with a different message), and extractor rejections would collapse
/// both into one shape.
#[utoipa::path(
    put,
    path = "/api/users/{user_id}/roles-permissions",
    tag = "Users",
    params(("user_id" = i64, Path, description = "User whose assignments to replace")),
    responses(
        (status = 200, body = UserWithRoles),
        (status = 400, description = "Malformed assignment list"),
        (status = 403, description = "Caller is not a security admin"),
        (status = 404, description = "User does not exist")
    )
)]
pub async fn set_roles_permissions(
    SecurityAdmin(admin): SecurityAdmin,
    Path(user_id): Path<i64>,
    State(state): State<AppState>,
    Json(payload): Json<Value>,
) -> Result<Json<UserWithRoles>, ApiError> {
    let Some(raw_items) = payload.get("assignments") else {
        return Err(ApiError::bad_request("assignments is required"));
    };
    let Some(raw_items) = raw_items.as_array() else {
        return Err(ApiError::bad_request("assignments must be a list"));
    };

    let mut items = Vec::with_capacity(raw_items.len());
    for raw in raw_items {
        if raw.get("role_id").is_none() {
            return Err(ApiError::bad_request("each assignment requires role_id"));
        }
        let item: AssignmentInput = serde_json::from_value(raw.clone())
            .map_err(|_| ApiError::bad_request("each assignment requires role_id"))?;
        items.push(item);
    }

    let mut roles = state.roles.write().await;
    let user = roles
        .set_user_roles(user_id, &items)
        .ok_or_else(|| ApiError::not_found("user not found"))?;

    info!(
        admin = %admin.subject,
        user_id,
        assignments = user.roles.len(),
        "replaced role assignments"
    );
    Ok(Json(user))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{AuthenticatedUser, SECURITY_ADMIN};
    use serde_json::json;

    fn viewer() -> Auth {
        Auth(AuthenticatedUser {
            subject: "viewer@medsupply.example".to_string(),
            role: Some("viewer".to_string()),
            claims: None,
        })
    }

    fn admin() -> SecurityAdmin {
        SecurityAdmin(AuthenticatedUser {
            subject: "admin@medsupply.example".to_string(),
            role: Some(SECURITY_ADMIN.to_string()),
            claims: None,
        })
    }

    #[tokio::test]
    async fn create_and_list_roles() {
        let state = AppState::default();

        let (status, Json(role)) = create_role(
            viewer(),
            State(state.clone()),
            Json(CreateRoleRequest {
                name: "Pharmacist".to_string(),
                description: "dispenses".to_string(),
            }),
        )
        .await
        .unwrap();
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(role.name, "Pharmacist");

        let Json(roles) = list_roles(viewer(), State(state)).await;
        assert_eq!(roles.len(), 1);
    }

    #[tokio::test]
    async fn duplicate_role_conflicts() {
        let state = AppState::default();
        state.roles.write().await.create_role("Viewer", "").unwrap();

        let err = create_role(
            viewer(),
            State(state),
            Json(CreateRoleRequest {
                name: "Viewer".to_string(),
                description: String::new(),
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn duplicate_email_is_bad_request_with_token() {
        let state = AppState::default();
        state
            .roles
            .write()
            .await
            .create_user("A", "a@medsupply.example", None)
            .unwrap();

        let err = create_user(
            viewer(),
            State(state),
            Json(CreateUserRequest {
                names: "B".to_string(),
                email: "a@medsupply.example".to_string(),
                role: None,
                password: None,
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.message, "email_exists");
    }

    #[tokio::test]
    async fn create_user_unwinds_user_row_when_credential_email_is_taken() {
        let state = AppState::default();
        state
            .credentials
            .create("dup@medsupply.example", "pw", None)
            .unwrap();

        let err = create_user(
            viewer(),
            State(state.clone()),
            Json(CreateUserRequest {
                names: "Dup".to_string(),
                email: "dup@medsupply.example".to_string(),
                role: None,
                password: Some("other-pw".to_string()),
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.message, "email_exists");

        // No partial user row left behind.
        assert!(state.roles.read().await.list_users().is_empty());
        // And the original credential is untouched.
        let credential = state
            .credentials
            .find_by_identifier("dup@medsupply.example")
            .unwrap();
        assert!(credential.password.verify("pw").unwrap());
    }

    #[tokio::test]
    async fn create_user_with_password_creates_credential() {
        let state = AppState::default();

        let (status, Json(user)) = create_user(
            viewer(),
            State(state.clone()),
            Json(CreateUserRequest {
                names: "Nurse".to_string(),
                email: "nurse@medsupply.example".to_string(),
                role: Some("warehouse_manager".to_string()),
                password: Some("Nurse#123".to_string()),
            }),
        )
        .await
        .unwrap();
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(user.role.as_deref(), Some("warehouse_manager"));

        let credential = state
            .credentials
            .find_by_identifier("nurse@medsupply.example")
            .expect("credential created");
        assert!(credential.password.verify("Nurse#123").unwrap());
    }

    #[tokio::test]
    async fn set_roles_permissions_replaces_assignments() {
        let state = AppState::default();
        let (user_id, viewer_id, editor_id) = {
            let mut roles = state.roles.write().await;
            let user = roles.create_user("Ana", "ana@medsupply.example", None).unwrap();
            let viewer = roles.create_role("Viewer", "").unwrap();
            let editor = roles.create_role("Editor", "").unwrap();
            (user.id, viewer.id, editor.id)
        };

        let payload = json!({"assignments": [
            {"role_id": viewer_id, "can_view": true},
            {"role_id": editor_id, "can_edit": true, "can_view": true}
        ]});
        let Json(user) = set_roles_permissions(
            admin(),
            Path(user_id),
            State(state.clone()),
            Json(payload),
        )
        .await
        .unwrap();
        assert_eq!(user.roles.len(), 2);

        // A second call with one item replaces, not appends.
        let payload = json!({"assignments": [{"role_id": editor_id}]});
        let Json(user) =
            set_roles_permissions(admin(), Path(user_id), State(state), Json(payload))
                .await
                .unwrap();
        assert_eq!(user.roles.len(), 1);
        assert_eq!(user.roles[0].id, editor_id);
    }

    #[tokio::test]
    async fn set_roles_permissions_validates_shape() {
        let state = AppState::default();
        let user_id = {
            let mut roles = state.roles.write().await;
            roles.create_user("Ana", "ana@medsupply.example", None).unwrap().id
        };

        let err = set_roles_permissions(
            admin(),
            Path(user_id),
            State(state.clone()),
            Json(json!({})),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);

        let err = set_roles_permissions(
            admin(),
            Path(user_id),
            State(state.clone()),
            Json(json!({"assignments": "nope"})),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);

        let err = set_roles_permissions(
            admin(),
            Path(user_id),
            State(state),
            Json(json!({"assignments": [{"can_view": true}]})),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn set_roles_permissions_unknown_user_is_not_found() {
        let state = AppState::default();
        let err = set_roles_permissions(
            admin(),
            Path(999),
            State(state),
            Json(json!({"assignments": []})),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
    }
}
