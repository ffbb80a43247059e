//! Administrative HTTP API.
//!
//! Exposes the transaction operations (stage, diff, commit, rollback),
//! immediate single-variable changes, reads and group listing.
//! Every route requires the configured bearer token.

pub mod auth;
pub mod handlers;
pub mod sessions;

use std::sync::Arc;

use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::trace::TraceLayer;

use self::auth::admin_auth_middleware;
use self::handlers::*;
use self::sessions::SessionTable;
use crate::store::ConfigStore;

/// Shared state injected into admin handlers.
#[derive(Clone)]
pub struct AdminState {
    pub store: Arc<ConfigStore>,
    pub sessions: Arc<SessionTable>,
    pub api_key: Arc<str>,
}

impl AdminState {
    pub fn new(store: Arc<ConfigStore>, api_key: &str) -> Self {
        Self {
            store,
            sessions: Arc::new(SessionTable::new()),
            api_key: Arc::from(api_key),
        }
    }
}

pub fn setup_admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/groups", get(list_groups))
        .route("/admin/groups/{group}/{name}", get(get_variable).put(set_variable))
        .route("/admin/sessions", post(open_session))
        .route("/admin/sessions/{id}", delete(close_session))
        .route("/admin/sessions/{id}/changes/{group}/{name}", put(stage_change))
        .route("/admin/sessions/{id}/diff", get(session_diff))
        .route("/admin/sessions/{id}/commit", post(commit_session))
        .route("/admin/sessions/{id}/rollback", post(rollback_session))
        .layer(middleware::from_fn_with_state(state.clone(), admin_auth_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serves the admin API until shutdown is signalled.
pub async fn serve(
    listener: TcpListener,
    state: AdminState,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<(), std::io::Error> {
    let addr = listener.local_addr()?;
    tracing::info!(address = %addr, "Admin API listening");

    axum::serve(listener, setup_admin_router(state))
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
        })
        .await?;

    tracing::info!("Admin API stopped");
    Ok(())
}
