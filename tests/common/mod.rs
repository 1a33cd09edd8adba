//! Shared utilities for the integration tests.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use metrics_exporter_prometheus::PrometheusBuilder;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use edge_gateway::config::{
    AuthConfig, CacheConfig, CircuitBreakerConfig, GatewayConfig, HealthConfig,
    RateLimiterConfig, ServiceConfig,
};
use edge_gateway::{HttpServer, Shutdown};

/// Build a gateway config bound to the given port, with no services.
pub fn gateway_config(port: u16) -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.server.host = "127.0.0.1".to_string();
    config.server.port = port;
    config
}

/// Build a service definition with every policy disabled and an open
/// allow-list.
pub fn service_config(name: &str, addr: &str) -> ServiceConfig {
    ServiceConfig {
        name: name.to_string(),
        addr: addr.to_string(),
        whitelist: vec!["ALL".to_string()],
        fallback_uri: String::new(),
        health: HealthConfig::default(),
        auth: AuthConfig::default(),
        cache: CacheConfig::default(),
        circuit_breaker: CircuitBreakerConfig::default(),
        rate_limiter: RateLimiterConfig::default(),
    }
}

/// Start the gateway in the background and wait until it accepts requests.
///
/// The metrics recorder is built standalone (not installed globally) so
/// every test can spin up its own gateway.
pub async fn start_gateway(config: GatewayConfig) -> Arc<Shutdown> {
    let prometheus = PrometheusBuilder::new().build_recorder().handle();
    let shutdown = Arc::new(Shutdown::new());
    let server = HttpServer::new(config, prometheus);

    let server_shutdown = shutdown.clone();
    tokio::spawn(async move {
        let _ = server.run(&server_shutdown).await;
    });
    tokio::time::sleep(Duration::from_millis(300)).await;

    shutdown
}

/// Start a simple mock upstream that returns a fixed 200 response.
#[allow(dead_code)]
pub async fn start_mock_upstream(addr: SocketAddr, response: &'static str) {
    start_programmable_upstream(addr, move || async move { (200, response.to_string()) }).await;
}

/// Start a programmable mock upstream with async support.
#[allow(dead_code)]
pub async fn start_programmable_upstream<F, Fut>(addr: SocketAddr, f: F)
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind(addr).await.unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let f = f.clone();
                    tokio::spawn(async move {
                        drain_head(&mut socket).await;
                        let (status, body) = f().await;
                        let _ = socket.write_all(raw_response(status, &body).as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });
}

/// Start a mock upstream that records every request head it receives.
///
/// Returns the shared capture list; each element is the raw request line
/// plus headers of one request.
#[allow(dead_code)]
pub async fn start_capturing_upstream(
    addr: SocketAddr,
    response: &'static str,
) -> Arc<Mutex<Vec<String>>> {
    let listener = TcpListener::bind(addr).await.unwrap();
    let captured = Arc::new(Mutex::new(Vec::new()));
    let sink = captured.clone();

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let sink = sink.clone();
                    tokio::spawn(async move {
                        let head = read_head(&mut socket).await;
                        sink.lock().unwrap().push(head);
                        let _ = socket
                            .write_all(raw_response(200, response).as_bytes())
                            .await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    captured
}

fn raw_response(status: u16, body: &str) -> String {
    let status_text = match status {
        200 => "200 OK",
        404 => "404 Not Found",
        429 => "429 Too Many Requests",
        500 => "500 Internal Server Error",
        502 => "502 Bad Gateway",
        503 => "503 Service Unavailable",
        _ => "200 OK",
    };
    format!(
        "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status_text,
        body.len(),
        body
    )
}

/// Read until the end of the request head so the client is not racing the
/// response.
async fn drain_head(socket: &mut tokio::net::TcpStream) {
    let _ = read_head(socket).await;
}

async fn read_head(socket: &mut tokio::net::TcpStream) -> String {
    let mut buf = vec![0u8; 8192];
    let mut head = Vec::new();
    loop {
        match socket.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                head.extend_from_slice(&buf[..n]);
                if head.windows(4).any(|w| w == b"\r\n\r\n") {
                    break;
                }
            }
            Err(_) => break,
        }
    }
    String::from_utf8_lossy(&head).to_string()
}

/// A reqwest client that never pools connections, so each request observes
/// the gateway's current state.
#[allow(dead_code)]
pub fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}
