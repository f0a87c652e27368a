// SPDX-License-Identifier: AGPL-3.0-or-later

//! Access-control decision endpoint.
//!
//! Other services call this to ask "may this user, acting under this role,
//! perform this action?". The answer is a uniform body echoing the inputs
//! plus a boolean `permission`.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use tracing::debug;
use utoipa::ToSchema;

use crate::{
    auth::Auth,
    error::ApiError,
    state::AppState,
    store::{AccessCheckResult, PermissionAction},
};

/// Field names follow the deployed wire contract, `rol` included.
#[derive(Debug, Deserialize, ToSchema)]
pub struct AccessCheckRequest {
    pub email: Option<String>,
    pub rol: Option<String>,
    pub action: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AccessCheckResponse {
    pub email: String,
    pub rol: String,
    pub action: String,
    pub permission: bool,
}

#[utoipa::path(
    post,
    path = "/api/access-control",
    tag = "Access",
    request_body = AccessCheckRequest,
    responses(
        (status = 200, body = AccessCheckResponse),
        (status = 400, description = "Missing field or unknown action"),
        (status = 404, description = "Role does not exist")
    )
)]
pub async fn check_access(
    Auth(_caller): Auth,
    State(state): State<AppState>,
    Json(request): Json<AccessCheckRequest>,
) -> Result<Json<AccessCheckResponse>, ApiError> {
    let (Some(email), Some(rol), Some(action)) =
        (request.email, request.rol, request.action)
    else {
        return Err(ApiError::bad_request("email, rol and action are required"));
    };

    let parsed = PermissionAction::parse(&action)
        .map_err(|e| ApiError::bad_request(format!("unknown action: {}", e.0)))?;

    let permission = match state.roles.read().await.check_access(&email, &rol, parsed) {
        AccessCheckResult::Granted { permission } => permission,
        // An unknown user is an ordinary denial; an unknown role is a hard
        // 404. Callers depend on the asymmetry.
        AccessCheckResult::UserNotFound => false,
        AccessCheckResult::RoleNotFound => {
            return Err(ApiError::not_found("role not found"));
        }
    };

    debug!(%email, %rol, %action, permission, "access check");
    Ok(Json(AccessCheckResponse {
        email,
        rol,
        action,
        permission,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::AuthenticatedUser;
    use crate::store::AssignmentInput;
    use axum::http::StatusCode;

    fn caller() -> Auth {
        Auth(AuthenticatedUser {
            subject: "svc@medsupply.example".to_string(),
            role: None,
            claims: None,
        })
    }

    fn request(email: &str, rol: &str, action: &str) -> AccessCheckRequest {
        AccessCheckRequest {
            email: Some(email.to_string()),
            rol: Some(rol.to_string()),
            action: Some(action.to_string()),
        }
    }

    async fn seeded_state() -> AppState {
        let state = AppState::default();
        let mut roles = state.roles.write().await;
        let user = roles.create_user("Ana", "ana@medsupply.example", None).unwrap();
        let editor = roles.create_role("Editor", "").unwrap();
        roles.set_user_roles(
            user.id,
            &[AssignmentInput {
                role_id: editor.id,
                can_create: false,
                can_edit: true,
                can_delete: false,
                can_view: true,
            }],
        );
        drop(roles);
        state
    }

    #[tokio::test]
    async fn grants_and_denies_per_flag() {
        let state = seeded_state().await;

        let Json(body) = check_access(
            caller(),
            State(state.clone()),
            Json(request("ana@medsupply.example", "Editor", "edit")),
        )
        .await
        .unwrap();
        assert!(body.permission);

        let Json(body) = check_access(
            caller(),
            State(state),
            Json(request("ana@medsupply.example", "Editor", "delete")),
        )
        .await
        .unwrap();
        assert!(!body.permission);
        assert_eq!(body.action, "delete");
    }

    #[tokio::test]
    async fn unknown_user_is_a_soft_denial() {
        let state = seeded_state().await;
        let Json(body) = check_access(
            caller(),
            State(state),
            Json(request("ghost@medsupply.example", "Editor", "view")),
        )
        .await
        .unwrap();
        assert!(!body.permission);
        assert_eq!(body.email, "ghost@medsupply.example");
    }

    #[tokio::test]
    async fn unknown_role_is_not_found() {
        let state = seeded_state().await;
        let err = check_access(
            caller(),
            State(state),
            Json(request("ana@medsupply.example", "Ghost", "view")),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn missing_fields_and_bad_action_are_rejected() {
        let state = seeded_state().await;

        let err = check_access(
            caller(),
            State(state.clone()),
            Json(AccessCheckRequest {
                email: Some("ana@medsupply.example".to_string()),
                rol: None,
                action: Some("view".to_string()),
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);

        let err = check_access(
            caller(),
            State(state),
            Json(request("ana@medsupply.example", "Editor", "fly")),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }
}
