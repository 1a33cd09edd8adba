//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router: control-plane routes plus the proxy fallback
//! - Wire up middleware (tracing, request timeout, global rate limit)
//! - Own the shared application state
//! - Bind and serve, plain or TLS-terminated
//! - Spawn the registry heartbeat

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{Request, StatusCode},
    middleware::{self, Next},
    response::Response,
    Router,
};
use hyper_util::client::legacy::{connect::HttpConnector, Client};
use hyper_util::rt::{TokioExecutor, TokioIo};
use metrics_exporter_prometheus::PrometheusHandle;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio_rustls::TlsAcceptor;
use tower::{Service, ServiceExt};
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::admin;
use crate::config::GatewayConfig;
use crate::http::handler;
use crate::lifecycle::Shutdown;
use crate::net::tls;
use crate::observability::Metrics;
use crate::policy::RateLimiter;
use crate::registry::{heartbeat, ServiceRegistry};

/// Heartbeat interval applied when the configured value is zero.
const DEFAULT_HEARTBEAT_SECS: u64 = 30;

/// Request timeout applied when the configured write timeout is zero.
const DEFAULT_WRITE_TIMEOUT_SECS: u64 = 10;

/// Shared client for upstream forwards and health probes.
pub type HttpClient = Client<HttpConnector, Body>;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<ServiceRegistry>,
    pub global_limiter: RateLimiter,
    pub metrics: Metrics,
    pub prometheus: PrometheusHandle,
    pub config: Arc<GatewayConfig>,
    pub client: HttpClient,
}

/// Error type for server startup and serving.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Tls(#[from] tls::TlsError),
}

/// The gateway HTTP server.
pub struct HttpServer {
    state: AppState,
    router: Router,
}

impl HttpServer {
    /// Build the server: registry populated from config, shared upstream
    /// client, metrics recorder handle, and the assembled router.
    pub fn new(config: GatewayConfig, prometheus: PrometheusHandle) -> Self {
        let config = Arc::new(config);

        let registry = Arc::new(ServiceRegistry::new());
        registry.populate(&config.registry.services);

        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());

        let state = AppState {
            registry,
            global_limiter: RateLimiter::from_config(&config.server.rate_limiter),
            metrics: Metrics::new(&config.server.metrics.prefix),
            prometheus,
            config: config.clone(),
            client,
        };

        let router = Self::build_router(&config, state.clone());
        Self { state, router }
    }

    /// Assemble the router: control-plane routes matched first, everything
    /// else falls through to the proxy pipeline behind the global limiter.
    fn build_router(config: &GatewayConfig, state: AppState) -> Router {
        let proxy = Router::new().fallback(handler::proxy).layer(
            middleware::from_fn_with_state(state.clone(), global_rate_limit),
        );

        let write_timeout = match config.server.write_timeout {
            0 => DEFAULT_WRITE_TIMEOUT_SECS,
            secs => secs,
        };

        admin::router()
            .merge(proxy)
            .with_state(state)
            .layer(TimeoutLayer::new(Duration::from_secs(write_timeout)))
            .layer(TraceLayer::new_for_http())
    }

    /// Bind and serve until the shutdown signal fires.
    pub async fn run(self, shutdown: &Shutdown) -> Result<(), ServerError> {
        let config = self.state.config.clone();

        let heartbeat_secs = match config.registry.heartbeat_interval {
            0 => DEFAULT_HEARTBEAT_SECS,
            secs => secs,
        };
        tokio::spawn(heartbeat::run(
            self.state.registry.clone(),
            self.state.client.clone(),
            Duration::from_secs(heartbeat_secs),
            shutdown.subscribe(),
        ));

        let addr = config.server.bind_address();
        let listener = TcpListener::bind(&addr).await?;
        tracing::info!(
            address = %addr,
            tls = config.server.tls.enabled,
            "Gateway started"
        );

        if config.server.tls.enabled {
            let acceptor = tls::build_acceptor(&config.server.tls)?;
            serve_tls(listener, acceptor, self.router, shutdown.subscribe()).await
        } else {
            let app = self
                .router
                .into_make_service_with_connect_info::<SocketAddr>();
            let mut rx = shutdown.subscribe();
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = rx.recv().await;
                })
                .await?;
            Ok(())
        }
    }
}

/// Gateway-wide rate limiting applied before the proxy pipeline.
pub async fn global_rate_limit(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if !state.global_limiter.allow(addr.ip()) {
        tracing::error!(
            ip = %addr,
            path = %request.uri().path(),
            method = %request.method(),
            "Global rate limit exceeded"
        );
        let mut response = Response::new(Body::from("Too Many Requests"));
        *response.status_mut() = StatusCode::TOO_MANY_REQUESTS;
        return response;
    }
    next.run(request).await
}

/// Accept loop for TLS termination.
///
/// Each accepted connection completes the handshake and is served by hyper
/// on its own task, with the peer address injected for the connect-info
/// extractors.
async fn serve_tls(
    listener: TcpListener,
    acceptor: TlsAcceptor,
    router: Router,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<(), ServerError> {
    let mut make_service = router.into_make_service_with_connect_info::<SocketAddr>();

    loop {
        tokio::select! {
            result = listener.accept() => {
                let (stream, remote_addr) = match result {
                    Ok(conn) => conn,
                    Err(err) => {
                        tracing::warn!(error = %err, "Accept failed");
                        continue;
                    }
                };
                let acceptor = acceptor.clone();
                let service = unwrap_infallible(make_service.call(remote_addr).await);

                tokio::spawn(async move {
                    let tls_stream = match acceptor.accept(stream).await {
                        Ok(tls) => tls,
                        Err(err) => {
                            tracing::debug!(peer = %remote_addr, error = %err, "TLS handshake failed");
                            return;
                        }
                    };

                    let io = TokioIo::new(tls_stream);
                    let hyper_service = hyper::service::service_fn(
                        move |request: Request<hyper::body::Incoming>| {
                            service.clone().oneshot(request)
                        },
                    );

                    if let Err(err) =
                        hyper_util::server::conn::auto::Builder::new(TokioExecutor::new())
                            .serve_connection_with_upgrades(io, hyper_service)
                            .await
                    {
                        tracing::debug!(peer = %remote_addr, error = %err, "Connection error");
                    }
                });
            }
            _ = shutdown.recv() => break,
        }
    }

    Ok(())
}

fn unwrap_infallible<T>(result: Result<T, Infallible>) -> T {
    match result {
        Ok(value) => value,
        Err(err) => match err {},
    }
}
