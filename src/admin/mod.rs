//! Control-plane subsystem.
//!
//! Fixed paths for runtime service registration, update, deregistration,
//! and introspection. Everything not matched here falls through to the
//! proxy pipeline.

pub mod handlers;

use axum::routing::{get, post};
use axum::Router;

use crate::http::server::AppState;
use self::handlers::*;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/services/register", post(register_service))
        .route("/services/update", post(update_service))
        .route("/services/deregister", post(deregister_service))
        .route("/services", get(list_services))
        .route("/health", get(health))
        .route("/config", get(get_config))
        .route("/metrics", get(metrics))
}
