// SPDX-License-Identifier: AGPL-3.0-or-later

use axum::{
    routing::{get, post, put},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    auth::{AuthenticatedUser, Claims},
    state::AppState,
    store::{AssignedRole, AssignmentInput, RoleRecord, UserRecord, UserWithRoles},
};

pub mod access;
pub mod auth;
pub mod health;
pub mod roles;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/auth/login", post(auth::login))
        .route("/auth/verify", get(auth::verify))
        .route("/v1/users/me", get(auth::me))
        .route("/api/roles", get(roles::list_roles).post(roles::create_role))
        .route("/api/users", get(roles::list_users).post(roles::create_user))
        .route("/api/users-with-roles", get(roles::users_with_roles))
        .route(
            "/api/users/{user_id}/roles-permissions",
            put(roles::set_roles_permissions),
        )
        .route("/api/access-control", post(access::check_access))
        .route("/health", get(health::health))
        .route("/health/live", get(health::live))
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

#[derive(OpenApi)]
#[openapi(
    paths(
        auth::login,
        auth::verify,
        auth::me,
        roles::list_roles,
        roles::create_role,
        roles::list_users,
        roles::create_user,
        roles::users_with_roles,
        roles::set_roles_permissions,
        access::check_access,
        health::health,
        health::live
    ),
    components(
        schemas(
            Claims,
            AuthenticatedUser,
            RoleRecord,
            UserRecord,
            UserWithRoles,
            AssignedRole,
            AssignmentInput,
            auth::LoginResponse,
            auth::VerifyResponse,
            roles::CreateRoleRequest,
            roles::CreateUserRequest,
            access::AccessCheckRequest,
            access::AccessCheckResponse,
            health::HealthResponse,
            health::HealthChecks
        )
    ),
    tags(
        (name = "Auth", description = "Token issuance and verification"),
        (name = "Roles", description = "Role definitions"),
        (name = "Users", description = "User records and role assignments"),
        (name = "Access", description = "Permission decisions"),
        (name = "Health", description = "Service health")
    )
)]
struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    #[tokio::test]
    async fn router_builds_with_all_routes() {
        let app = router(AppState::default());
        // Ensure the router can be converted into a service without panicking.
        let _ = app.into_make_service();
    }

    #[tokio::test]
    async fn health_responds_without_authentication() {
        let app = router(AppState::default());
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn protected_route_rejects_anonymous_callers() {
        let app = router(AppState::default());
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/roles")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn login_then_verify_round_trips_through_the_router() {
        use crate::store::SeedUser;

        let state = AppState::default();
        state
            .credentials
            .ensure_seeded(&[SeedUser {
                email: "admin".to_string(),
                password: "Admin#123".to_string(),
                role: Some("security_admin".to_string()),
            }])
            .unwrap();
        let app = router(state);

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/auth/login")
                    .header("content-type", "application/json")
                    .body(Body::from(
                        r#"{"email":"admin","password":"Admin#123"}"#,
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = to_bytes(response.into_body(), 4096).await.unwrap();
        let login: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(login["role"], "security_admin");
        let token = login["access_token"].as_str().unwrap();

        let response = app
            .oneshot(
                Request::builder()
                    .uri(format!("/auth/verify?token={token}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = to_bytes(response.into_body(), 4096).await.unwrap();
        let verify: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(verify["valid"], true);
        assert_eq!(verify["sub"], "admin");
        assert_eq!(verify["role"], "security_admin");
    }

    #[tokio::test]
    async fn login_rejects_malformed_body_through_the_router() {
        let app = router(AppState::default());
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/auth/login")
                    .header("content-type", "application/json")
                    .body(Body::from("{broken"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = to_bytes(response.into_body(), 1024).await.unwrap();
        assert_eq!(body.as_ref(), br#"{"error":"invalid json"}"#);
    }
}
