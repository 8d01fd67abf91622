//!
//! fluxauth HTTP server
//! --------------------
//! Axum router exposing the privilege evaluator to other node services.
//!
//! Responsibilities:
//! - Health route for liveness probes.
//! - Privilege check route: reads the `zelidauth` header and an optional
//!   `appname` query parameter, answers with a `{status, data}` envelope.
//! - zelid shape check route, reporting rejections with the error's code.
//! - Startup wiring of the store (optionally seeded from JSON) and the
//!   known-resource directory (static, or fetched over HTTP).

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::config::AuthConfig;
use crate::directory::{HttpResourceDirectory, SharedDirectory, StaticDirectory};
use crate::error::AuthError;
use crate::identity::{BitcoinMessageScheme, IdentityScheme, PrivilegeEvaluator};
use crate::messages::{data_message, unauthorized_message, ApiMessage};
use crate::storage::{MemoryStore, SharedStore};

/// Shared server state injected into all handlers.
#[derive(Clone)]
pub struct AppState {
    pub evaluator: Arc<PrivilegeEvaluator>,
}

impl AppState {
    pub fn new(evaluator: PrivilegeEvaluator) -> Self {
        Self { evaluator: Arc::new(evaluator) }
    }
}

#[derive(Debug, Deserialize)]
struct PrivilegeQuery {
    appname: Option<String>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(|| async { "fluxauth ok" }))
        .route("/auth/privilege/{privilege}", get(check_privilege))
        .route("/auth/zelid/{zelid}", get(check_zelid))
        .with_state(state)
}

async fn check_privilege(
    State(state): State<AppState>,
    Path(privilege): Path<String>,
    Query(q): Query<PrivilegeQuery>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let authorized = state
        .evaluator
        .verify_privilege(&privilege, Some(&headers), q.appname.as_deref())
        .await;
    debug!(target: "fluxauth::server", privilege = %privilege, appname = ?q.appname, authorized, "privilege check");
    if authorized {
        (StatusCode::OK, Json(data_message(json!({"privilege": privilege, "authorized": true}))))
    } else {
        (StatusCode::UNAUTHORIZED, Json(unauthorized_message()))
    }
}

fn error_response(e: &AuthError) -> (StatusCode, Json<ApiMessage>) {
    let status = StatusCode::from_u16(e.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(ApiMessage::from(e)))
}

async fn check_zelid(State(state): State<AppState>, Path(zelid): Path<String>) -> impl IntoResponse {
    match state.evaluator.scheme().validate_address(&zelid) {
        Ok(()) => (StatusCode::OK, Json(data_message(json!({"zelid": zelid, "valid": true})))),
        Err(e) => error_response(&e),
    }
}

/// Build the evaluator and its backing services from configuration.
pub fn build_state(config: &AuthConfig) -> anyhow::Result<AppState> {
    let store = match &config.seed_file {
        Some(path) => MemoryStore::load_json_file(path)
            .with_context(|| format!("While seeding store from {}", path.display()))?,
        None => MemoryStore::new(),
    };
    let store: SharedStore = Arc::new(store);

    let directory: SharedDirectory = match &config.directory_url {
        Some(url) => Arc::new(
            HttpResourceDirectory::new(url.clone(), config.directory_timeout())
                .with_context(|| format!("While creating directory client for {}", url))?,
        ),
        None => Arc::new(StaticDirectory::default()),
    };

    if config.admin_zelid.is_empty() {
        warn!(target: "fluxauth::server", "admin zelid is not configured; admin tiers will deny everyone");
    }
    let evaluator = PrivilegeEvaluator::new(config, store, directory, Arc::new(BitcoinMessageScheme::new()));
    Ok(AppState::new(evaluator))
}

/// Serve on an already bound listener until the task is dropped.
pub async fn serve(listener: tokio::net::TcpListener, state: AppState) -> anyhow::Result<()> {
    axum::serve(listener, router(state)).await?;
    Ok(())
}

/// Start the fluxauth HTTP server on `config.http_port`.
pub async fn run(config: AuthConfig) -> anyhow::Result<()> {
    let state = build_state(&config)?;
    let addr: SocketAddr = ([0, 0, 0, 0], config.http_port).into();
    info!(
        target: "fluxauth::server",
        "Starting server on {} (seed={:?}, directory={:?})",
        addr, config.seed_file, config.directory_url
    );
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    serve(listener, state).await
}
