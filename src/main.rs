// SPDX-License-Identifier: AGPL-3.0-or-later

use std::net::SocketAddr;
use std::sync::Arc;

use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use medsupply_auth::api::router;
use medsupply_auth::config::AppConfig;
use medsupply_auth::state::AppState;
use medsupply_auth::store::{
    parse_seed_users, CredentialStore, MemoryCredentialStore, RedbCredentialStore,
};

#[tokio::main]
async fn main() {
    init_tracing();

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(%e, "invalid configuration");
            std::process::exit(1);
        }
    };

    if config.auth_bypass {
        warn!("AUTH_BYPASS is enabled; all requests get a dummy admin identity");
    }

    let credentials = build_credential_store(&config);

    if let Some(raw) = config.users_json.as_deref() {
        let seeds = match parse_seed_users(raw) {
            Ok(seeds) => seeds,
            Err(e) => {
                error!(%e, "USERS_JSON is not a valid seed list");
                std::process::exit(1);
            }
        };
        if let Err(e) = credentials.ensure_seeded(&seeds) {
            error!(%e, "failed to seed credential store");
            std::process::exit(1);
        }
    }

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .expect("failed to parse bind address");

    let state = AppState::new(config, credentials);
    let app = router(state);

    info!(%addr, "medsupply-auth listening (docs at /docs)");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("failed to bind listen address");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server failed");
}

/// Structured logging; `LOG_FORMAT=json` for machine ingestion, pretty
/// otherwise. `RUST_LOG` overrides the default filter.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,medsupply_auth=debug"));

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

/// Select the credential backend: redb when a database path is configured,
/// in-memory otherwise.
fn build_credential_store(config: &AppConfig) -> Arc<dyn CredentialStore> {
    match &config.database_path {
        Some(path) => {
            let mut store =
                RedbCredentialStore::open(path).expect("failed to open credential database");
            if config.database_migrate {
                info!("running credential schema migration");
                store.migrate().expect("schema migration failed");
            }
            Arc::new(store)
        }
        None => Arc::new(MemoryCredentialStore::new()),
    }
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("failed to install ctrl-c handler");
    info!("shutdown signal received");
}
