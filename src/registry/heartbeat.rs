//! Background health probing of registered services.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode, Uri};
use tokio::sync::broadcast;

use crate::http::ensure_scheme;
use crate::http::HttpClient;
use crate::registry::ServiceRegistry;

/// Probe every health-enabled service once per `interval`.
///
/// Targets are snapshotted under the registry read lock and probed with the
/// lock released, so a slow upstream never delays registry writers. The
/// prober is strictly observational; probe outcomes are logged, never
/// written back.
pub async fn run(
    registry: Arc<ServiceRegistry>,
    client: HttpClient,
    interval: Duration,
    mut shutdown: broadcast::Receiver<()>,
) {
    loop {
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = shutdown.recv() => {
                tracing::debug!("Heartbeat stopping");
                return;
            }
        }

        let targets = registry.health_targets();
        tracing::info!(count = targets.len(), "Heartbeat registered services");

        for (name, addr, uri) in targets {
            probe(&client, &name, &addr, &uri).await;
        }
    }
}

async fn probe(client: &HttpClient, name: &str, addr: &str, health_uri: &str) {
    let target = format!("{}{}", ensure_scheme(addr), health_uri);
    let uri: Uri = match target.parse() {
        Ok(uri) => uri,
        Err(err) => {
            tracing::error!(name, target, error = %err, "Invalid health probe target");
            return;
        }
    };

    let request = Request::get(uri).body(Body::empty());
    let request = match request {
        Ok(request) => request,
        Err(err) => {
            tracing::error!(name, error = %err, "Failed to build health probe");
            return;
        }
    };

    match client.request(request).await {
        Ok(response) if response.status() == StatusCode::OK => {
            tracing::debug!(name, addr, "Service is healthy");
        }
        Ok(response) => {
            tracing::warn!(name, addr, status = %response.status(), "Service is unhealthy");
        }
        Err(err) => {
            tracing::error!(name, addr, error = %err, "Service is down");
        }
    }
}
