//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from the YAML config
//! file; the same `ServiceConfig` shape is accepted as JSON by the
//! control-plane register/update endpoints.

use serde::{Deserialize, Serialize};

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct GatewayConfig {
    /// Listener, timeout, TLS, metrics and global limiter settings.
    pub server: ServerConfig,

    /// Service registry boot population and heartbeat settings.
    pub registry: RegistryConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ServerConfig {
    /// Host to bind (e.g. "0.0.0.0").
    pub host: String,

    /// Port to bind.
    pub port: u16,

    /// Maximum duration in seconds for reading the entire request.
    pub read_timeout: u64,

    /// Maximum duration in seconds before timing out response writes.
    pub write_timeout: u64,

    /// Maximum duration in seconds for the graceful shutdown drain.
    pub graceful_timeout: u64,

    /// Optional TLS termination.
    pub tls: TlsConfig,

    /// Metrics naming and histogram buckets.
    pub metrics: MetricsConfig,

    /// Gateway-wide rate limiter applied before any per-service policy.
    pub rate_limiter: RateLimiterConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: 0,
            read_timeout: 5,
            write_timeout: 10,
            graceful_timeout: 10,
            tls: TlsConfig::default(),
            metrics: MetricsConfig::default(),
            rate_limiter: RateLimiterConfig::default(),
        }
    }
}

impl ServerConfig {
    /// The socket address string this server binds to.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// TLS termination settings.
///
/// Certificate and key paths are resolved relative to the working directory
/// at startup; missing files are a fatal startup error.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct TlsConfig {
    pub enabled: bool,

    /// Path to the certificate chain file (PEM).
    pub cert_file: String,

    /// Path to the private key file (PEM).
    pub key_file: String,
}

/// Metrics configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MetricsConfig {
    /// Prefix for the request counter and response-time histogram.
    pub prefix: String,

    /// Histogram buckets in seconds.
    pub buckets: Vec<f64>,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            prefix: "gateway".to_string(),
            buckets: vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0],
        }
    }
}

/// Token-bucket rate limiter settings, shared by the global limiter and the
/// per-service limiters.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RateLimiterConfig {
    pub enabled: bool,

    /// Sustained refill rate in tokens per second.
    pub rate: f64,

    /// Bucket capacity.
    pub burst: u32,

    /// Seconds a visitor may stay idle before its bucket is evicted.
    pub cleanup_interval: u64,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            rate: 100.0,
            burst: 50,
            cleanup_interval: 180,
        }
    }
}

/// Registry configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct RegistryConfig {
    /// Interval in seconds between health probes of registered services.
    pub heartbeat_interval: u64,

    /// Services registered at boot.
    pub services: Vec<ServiceConfig>,
}

/// A single registered service and its policy stack.
///
/// `name`, `addr`, `whitelist` and `health` are required; the policy
/// sections default to disabled when omitted.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceConfig {
    /// Unique service name; the first URL path segment routes to it.
    pub name: String,

    /// Upstream address, `host[:port]`, scheme optional.
    pub addr: String,

    /// Source IPs allowed to reach the service; `"ALL"` permits any.
    pub whitelist: Vec<String>,

    /// Alternate base URL used while the circuit breaker is open.
    #[serde(default)]
    pub fallback_uri: String,

    /// Heartbeat probe settings.
    pub health: HealthConfig,

    #[serde(default)]
    pub auth: AuthConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub circuit_breaker: CircuitBreakerConfig,

    #[serde(default)]
    pub rate_limiter: RateLimiterConfig,
}

/// Health probe settings for a service.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct HealthConfig {
    pub enabled: bool,

    /// Path of the upstream health endpoint (e.g. "/health").
    pub uri: String,
}

/// Token authentication settings for a service.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct AuthConfig {
    pub enabled: bool,

    /// When true, requests with missing or expired tokens pass through.
    pub anonymous: bool,

    /// Path to the file holding the signing secret.
    pub secret: String,

    /// First path segments (after the service name) requiring a token,
    /// each written as "/segment".
    pub routes: Vec<String>,
}

/// Response cache settings for a service.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct CacheConfig {
    pub enabled: bool,

    /// Entry time-to-live in seconds; 0 selects the default.
    pub expiration_interval: u64,

    /// Sweep period in seconds; 0 selects the default.
    pub cleanup_interval: u64,
}

/// Circuit breaker settings for a service.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CircuitBreakerConfig {
    pub enabled: bool,

    /// Seconds the breaker stays open before admitting a probe.
    pub timeout: u64,

    /// Sampling window in seconds over which failure counts accumulate.
    pub interval: u64,

    /// Failure ratio within a window that trips the breaker.
    pub failure_ratio: f64,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            timeout: 60,
            interval: 60,
            failure_ratio: 0.6,
        }
    }
}
