//! The request pipeline.
//!
//! # Responsibilities
//! - Resolve the target service from the first URL path segment
//! - Apply the per-service policy chain in a fixed order:
//!   rate limit → allow-list → auth → cache probe
//! - Forward to the upstream, through the circuit breaker when enabled
//! - Serve the fallback upstream while the breaker is open
//! - Populate the response cache and collect metrics on every terminal
//!   response

use std::net::SocketAddr;
use std::time::Instant;

use axum::{
    body::{to_bytes, Body},
    extract::{ConnectInfo, State},
    http::{
        header::AUTHORIZATION, HeaderMap, HeaderName, HeaderValue, Method, Request, Response,
        StatusCode, Uri,
    },
};
use bytes::Bytes;
use thiserror::Error;
use uuid::Uuid;

use crate::http::server::AppState;
use crate::policy::{AuthError, BreakerError};
use crate::registry::Service;

/// Tracing header attached to every forwarded request.
pub const TRACE_ID_HEADER: HeaderName = HeaderName::from_static("x-trace-id");

/// Header carrying verified claims to the upstream.
pub const CLAIMS_HEADER: HeaderName = HeaderName::from_static("x-claims");

/// Failures on the forward path.
#[derive(Debug, Error)]
pub enum ForwardError {
    #[error("invalid forward uri: {0}")]
    Uri(#[from] axum::http::uri::InvalidUri),

    #[error("failed to build forward request: {0}")]
    Build(#[from] axum::http::Error),

    #[error("upstream request failed: {0}")]
    Transport(#[from] hyper_util::client::legacy::Error),

    #[error("failed to read upstream body: {0}")]
    Read(axum::Error),
}

/// An upstream response buffered for the breaker path.
struct BufferedResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
}

/// Handle one inbound request end to end.
pub async fn proxy(
    State(state): State<AppState>,
    ConnectInfo(client_addr): ConnectInfo<SocketAddr>,
    request: Request<Body>,
) -> Response<Body> {
    let start = Instant::now();
    let method = request.method().clone();
    let route_label = request.uri().to_string();
    let path = request.uri().path().to_string();
    let raw_query = request.uri().query().unwrap_or_default().to_string();

    let (service_name, route) = resolve_path(&path);
    tracing::info!(service = %service_name, path = %path, method = %method, "Resolving service");

    let Some(service) = state.registry.get(&service_name) else {
        tracing::error!(service = %service_name, "No service exists with the provided name");
        return reject(
            &state,
            StatusCode::BAD_REQUEST,
            "Bad Request",
            &method,
            &route_label,
            start,
        );
    };

    if !service.limiter.allow(client_addr.ip()) {
        tracing::error!(
            service = %service_name,
            ip = %client_addr,
            path = %path,
            "Rate limit exceeded"
        );
        return reject(
            &state,
            StatusCode::TOO_MANY_REQUESTS,
            "Too Many Requests",
            &method,
            &route_label,
            start,
        );
    }

    if !service.allow_list.allowed(client_addr.ip()) {
        tracing::error!(
            service = %service_name,
            ip = %client_addr,
            path = %path,
            "Unauthorized request"
        );
        return reject(
            &state,
            StatusCode::UNAUTHORIZED,
            "unauthorized",
            &method,
            &route_label,
            start,
        );
    }

    let authorization = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok());
    let claims = match service.auth.authenticate(&path, authorization) {
        Ok(claims) => claims,
        Err(err) => {
            tracing::error!(service = %service_name, error = %err, "Auth failed");
            let message = match err {
                AuthError::TokenMissing => "token missing",
                AuthError::InvalidToken => "invalid token",
                AuthError::Claims => "auth failed",
            };
            return reject(
                &state,
                StatusCode::UNAUTHORIZED,
                message,
                &method,
                &route_label,
                start,
            );
        }
    };

    if service.addr.is_empty() {
        tracing::error!(service = %service_name, "Service has no address");
        return reject(
            &state,
            StatusCode::NOT_FOUND,
            "service not found",
            &method,
            &route_label,
            start,
        );
    }

    let cache_key = cache_key(&service_name, &route_label);
    if service.cache.is_enabled() {
        if let Some(payload) = service.cache.get(&cache_key) {
            tracing::info!(service = %service_name, path = %path, "Cache hit");
            let mut response = Response::new(Body::from(payload));
            state
                .metrics
                .collect(StatusCode::OK, &method, &route_label, start);
            *response.status_mut() = StatusCode::OK;
            return response;
        }
    }

    // Buffer the inbound body so the breaker-open fallback can resend it.
    let (parts, body) = request.into_parts();
    let body = match to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(err) => {
            tracing::error!(service = %service_name, error = %err, "Failed to read request body");
            return reject(
                &state,
                StatusCode::INTERNAL_SERVER_ERROR,
                "service is down",
                &method,
                &route_label,
                start,
            );
        }
    };

    let mut headers = parts.headers.clone();
    // The upstream authority comes from the forward URI, not the inbound
    // Host header.
    headers.remove(axum::http::header::HOST);
    append_trace_id(&mut headers);
    if let Some(claims) = claims {
        match HeaderValue::from_str(&claims) {
            Ok(value) => {
                headers.insert(CLAIMS_HEADER, value);
            }
            Err(err) => {
                tracing::error!(service = %service_name, error = %err, "Failed to attach claims");
            }
        }
    }

    let forward_uri = forward_uri(&service.addr, &route, &raw_query);
    tracing::info!(service = %service_name, forward_uri = %forward_uri, "Forwarding request");

    if service.breaker.is_enabled() {
        forward_with_breaker(
            &state, &service, &service_name, &method, headers, body, &forward_uri, &route,
            &raw_query, &cache_key, &route_label, start,
        )
        .await
    } else {
        forward(
            &state, &service, &service_name, &method, headers, body, &forward_uri, &cache_key,
            &route_label, start,
        )
        .await
    }
}

/// Forward to the upstream without breaker protection.
///
/// The upstream body is streamed through unless the service cache is
/// enabled, in which case it is buffered, written, and stored.
#[allow(clippy::too_many_arguments)]
async fn forward(
    state: &AppState,
    service: &Service,
    service_name: &str,
    method: &Method,
    headers: HeaderMap,
    body: Bytes,
    forward_uri: &str,
    cache_key: &str,
    route_label: &str,
    start: Instant,
) -> Response<Body> {
    let upstream = match send_upstream(state, method, headers, body, forward_uri).await {
        Ok(response) => response,
        Err(err) => {
            tracing::error!(service = %service_name, error = %err, "Error forwarding request");
            return reject(
                state,
                StatusCode::INTERNAL_SERVER_ERROR,
                "service is down",
                method,
                route_label,
                start,
            );
        }
    };

    let status = upstream.status();
    let upstream_headers = upstream.headers().clone();

    let body = if service.cache.is_enabled() {
        let bytes = match to_bytes(Body::new(upstream.into_body()), usize::MAX).await {
            Ok(bytes) => bytes,
            Err(err) => {
                tracing::error!(service = %service_name, error = %err, "Error reading upstream body");
                return reject(
                    state,
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "service is down",
                    method,
                    route_label,
                    start,
                );
            }
        };
        service.cache.set(cache_key, bytes.clone());
        tracing::info!(service = %service_name, key = %cache_key, "Cached upstream response");
        Body::from(bytes)
    } else {
        Body::new(upstream.into_body())
    };

    state.metrics.collect(status, method, route_label, start);
    let mut response = Response::new(body);
    *response.status_mut() = status;
    *response.headers_mut() = upstream_headers;
    response
}

/// Forward through the circuit breaker, falling back when it is open.
#[allow(clippy::too_many_arguments)]
async fn forward_with_breaker(
    state: &AppState,
    service: &Service,
    service_name: &str,
    method: &Method,
    headers: HeaderMap,
    body: Bytes,
    forward_uri: &str,
    route: &[String],
    raw_query: &str,
    cache_key: &str,
    route_label: &str,
    start: Instant,
) -> Response<Body> {
    let call_headers = headers.clone();
    let call_body = body.clone();
    let result: Result<BufferedResponse, BreakerError<ForwardError>> = service
        .breaker
        .execute(|| async {
            let upstream =
                send_upstream(state, method, call_headers, call_body, forward_uri).await?;
            let status = upstream.status();
            let upstream_headers = upstream.headers().clone();
            let bytes = to_bytes(Body::new(upstream.into_body()), usize::MAX)
                .await
                .map_err(ForwardError::Read)?;
            Ok(BufferedResponse {
                status,
                headers: upstream_headers,
                body: bytes,
            })
        })
        .await;

    match result {
        Ok(upstream) => {
            if service.cache.is_enabled() {
                service.cache.set(cache_key, upstream.body.clone());
                tracing::info!(service = %service_name, key = %cache_key, "Cached upstream response");
            }
            state
                .metrics
                .collect(upstream.status, method, route_label, start);
            let mut response = Response::new(Body::from(upstream.body));
            *response.status_mut() = upstream.status;
            *response.headers_mut() = upstream.headers;
            response
        }
        Err(BreakerError::Open) => {
            tracing::error!(service = %service_name, "Circuit breaker is open, making a fallback request");
            fallback(
                state, service, service_name, method, headers, body, route, raw_query, cache_key,
                route_label, start,
            )
            .await
        }
        Err(BreakerError::Call(err)) => {
            tracing::error!(service = %service_name, error = %err, "Error forwarding request");
            reject(
                state,
                StatusCode::INTERNAL_SERVER_ERROR,
                "service is down",
                method,
                route_label,
                start,
            )
        }
    }
}

/// Serve the request from the fallback upstream while the breaker is open.
#[allow(clippy::too_many_arguments)]
async fn fallback(
    state: &AppState,
    service: &Service,
    service_name: &str,
    method: &Method,
    headers: HeaderMap,
    body: Bytes,
    route: &[String],
    raw_query: &str,
    cache_key: &str,
    route_label: &str,
    start: Instant,
) -> Response<Body> {
    if service.fallback_uri.is_empty() {
        tracing::error!(service = %service_name, "Fallback URI not found");
        return reject(
            state,
            StatusCode::NOT_FOUND,
            "fallback uri not found",
            method,
            route_label,
            start,
        );
    }

    let forward_uri = forward_uri(&service.fallback_uri, route, raw_query);
    forward(
        state, service, service_name, method, headers, body, &forward_uri, cache_key,
        route_label, start,
    )
    .await
}

/// Issue the upstream request, preserving method and body.
async fn send_upstream(
    state: &AppState,
    method: &Method,
    headers: HeaderMap,
    body: Bytes,
    forward_uri: &str,
) -> Result<Response<hyper::body::Incoming>, ForwardError> {
    let uri: Uri = forward_uri.parse()?;
    let mut request = Request::builder()
        .method(method.clone())
        .uri(uri)
        .body(Body::from(body))?;
    *request.headers_mut() = headers;

    Ok(state.client.request(request).await?)
}

/// Split the URL path into service name and upstream route segments.
fn resolve_path(path: &str) -> (String, Vec<String>) {
    let parts: Vec<&str> = path.split('/').collect();
    if parts.len() < 2 {
        return (path.to_string(), Vec::new());
    }
    (
        parts[1].to_string(),
        parts[2..].iter().map(|s| s.to_string()).collect(),
    )
}

/// Build the upstream URI from the resolved route and raw query.
fn forward_uri(addr: &str, route: &[String], query: &str) -> String {
    let mut uri = format!("{}/{}", ensure_scheme(addr), route.join("/"));
    if !query.is_empty() {
        uri.push('?');
        uri.push_str(query);
    }
    uri
}

/// Prefix `http://` when the address carries no scheme.
pub fn ensure_scheme(addr: &str) -> String {
    if addr.starts_with("http://") || addr.starts_with("https://") {
        addr.to_string()
    } else {
        format!("http://{addr}")
    }
}

fn cache_key(service: &str, url: &str) -> String {
    format!("cache-{service}-{url}")
}

fn append_trace_id(headers: &mut HeaderMap) {
    if let Ok(value) = HeaderValue::from_str(&Uuid::new_v4().to_string()) {
        headers.insert(TRACE_ID_HEADER, value);
    }
}

/// Terminal rejection: plaintext body plus one metric sample.
fn reject(
    state: &AppState,
    status: StatusCode,
    message: &'static str,
    method: &Method,
    route_label: &str,
    start: Instant,
) -> Response<Body> {
    state.metrics.collect(status, method, route_label, start);
    let mut response = Response::new(Body::from(message));
    *response.status_mut() = status;
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_path_splits_service_and_route() {
        let (service, route) = resolve_path("/svc1/a/b");
        assert_eq!(service, "svc1");
        assert_eq!(route, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_resolve_path_single_segment() {
        let (service, route) = resolve_path("/svc1");
        assert_eq!(service, "svc1");
        assert!(route.is_empty());
    }

    #[test]
    fn test_resolve_path_empty() {
        let (service, route) = resolve_path("");
        assert_eq!(service, "");
        assert!(route.is_empty());
    }

    #[test]
    fn test_resolve_path_trailing_slash() {
        let (service, route) = resolve_path("/svc1/");
        assert_eq!(service, "svc1");
        assert_eq!(route, vec![String::new()]);
    }

    #[test]
    fn test_forward_uri_prefixes_scheme() {
        let uri = forward_uri("127.0.0.1:9000", &["a".into(), "b".into()], "");
        assert_eq!(uri, "http://127.0.0.1:9000/a/b");
    }

    #[test]
    fn test_forward_uri_keeps_existing_scheme() {
        let uri = forward_uri("https://svc.internal", &["a".into()], "");
        assert_eq!(uri, "https://svc.internal/a");
    }

    #[test]
    fn test_forward_uri_appends_query() {
        let uri = forward_uri("127.0.0.1:9000", &["x".into()], "y=1&z=2");
        assert_eq!(uri, "http://127.0.0.1:9000/x?y=1&z=2");
    }

    #[test]
    fn test_forward_uri_empty_route() {
        let uri = forward_uri("127.0.0.1:9000", &[], "");
        assert_eq!(uri, "http://127.0.0.1:9000/");
    }

    #[test]
    fn test_cache_key_shape() {
        assert_eq!(
            cache_key("svc1", "/svc1/x?y=1"),
            "cache-svc1-/svc1/x?y=1"
        );
    }
}
