// SPDX-License-Identifier: AGPL-3.0-or-later

//! Health endpoints, unauthenticated by design so orchestrators can probe
//! the service before any credentials exist.

use axum::{extract::State, Json};
use serde::Serialize;
use utoipa::ToSchema;

use crate::state::AppState;

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: &'static str,
    pub checks: HealthChecks,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthChecks {
    pub service: &'static str,
    /// Which credential backend is active: `memory` or `redb`.
    pub credential_store: &'static str,
    /// The configured token verification strategy.
    pub verify_strategy: String,
}

#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    responses((status = 200, body = HealthResponse))
)]
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        checks: HealthChecks {
            service: "medsupply-auth",
            credential_store: state.credentials.backend_name(),
            verify_strategy: state.verifier.strategy().to_string(),
        },
    })
}

/// Liveness probe, no dependency checks at all.
#[utoipa::path(
    get,
    path = "/health/live",
    tag = "Health",
    responses((status = 200))
)]
pub async fn live() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}
