//! Control-plane handlers.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::config::validation::validate_service;
use crate::config::ServiceConfig;
use crate::http::server::AppState;
use crate::registry::Service;

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct DeregisterBody {
    pub name: String,
}

/// POST /services/register — add or replace a service at runtime.
pub async fn register_service(
    State(state): State<AppState>,
    payload: Result<Json<ServiceConfig>, JsonRejection>,
) -> Response {
    let config = match decode(payload) {
        Ok(config) => config,
        Err(response) => return response,
    };
    if let Err(err) = validate_service(&config) {
        tracing::error!(error = %err, "Rejecting service registration");
        return (StatusCode::BAD_REQUEST, err.to_string()).into_response();
    }

    let name = config.name.clone();
    state.registry.register(Service::from_config(&config));

    Json(MessageResponse {
        message: format!("service {name} registered"),
    })
    .into_response()
}

/// POST /services/update — rebuild an existing entry from the posted config.
pub async fn update_service(
    State(state): State<AppState>,
    payload: Result<Json<ServiceConfig>, JsonRejection>,
) -> Response {
    let config = match decode(payload) {
        Ok(config) => config,
        Err(response) => return response,
    };
    if let Err(err) = validate_service(&config) {
        tracing::error!(error = %err, "Rejecting service update");
        return (StatusCode::BAD_REQUEST, err.to_string()).into_response();
    }

    let name = config.name.clone();
    if !state.registry.update(Service::from_config(&config)) {
        tracing::error!(name = %name, "Defined service doesn't exist");
        return (StatusCode::BAD_REQUEST, "service doesn't exists").into_response();
    }

    Json(MessageResponse {
        message: format!("service {name} updated"),
    })
    .into_response()
}

/// POST /services/deregister — remove a service by name.
pub async fn deregister_service(
    State(state): State<AppState>,
    payload: Result<Json<DeregisterBody>, JsonRejection>,
) -> Response {
    let body = match decode(payload) {
        Ok(body) => body,
        Err(response) => return response,
    };

    state.registry.deregister(&body.name);

    Json(MessageResponse {
        message: format!("service {} deregistered", body.name),
    })
    .into_response()
}

/// GET /services — serializable snapshot of the registry.
pub async fn list_services(State(state): State<AppState>) -> Response {
    Json(state.registry.snapshot()).into_response()
}

/// GET /health — liveness probe for the gateway itself.
pub async fn health() -> &'static str {
    "OK"
}

/// GET /config — the configuration the gateway booted with.
pub async fn get_config(State(state): State<AppState>) -> Response {
    Json(state.config.as_ref()).into_response()
}

/// GET /metrics — Prometheus exposition.
pub async fn metrics(State(state): State<AppState>) -> String {
    state.prometheus.render()
}

/// Map any body rejection to 400 with the decode error text.
fn decode<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, Response> {
    match payload {
        Ok(Json(value)) => Ok(value),
        Err(rejection) => {
            tracing::error!(error = %rejection.body_text(), "Error decoding request");
            Err((StatusCode::BAD_REQUEST, rejection.body_text()).into_response())
        }
    }
}
