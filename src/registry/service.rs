//! Registered service entries.

use serde::Serialize;

use crate::config::ServiceConfig;
use crate::policy::{AllowList, CircuitBreaker, CircuitState, RateLimiter, ResponseCache, TokenAuth};

/// Heartbeat probe settings for one service.
#[derive(Debug, Clone, Serialize)]
pub struct HealthCheck {
    pub enabled: bool,
    pub uri: String,
}

impl HealthCheck {
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
}

/// A registered upstream service together with its policy stack.
///
/// Entries are shared as `Arc<Service>`; all runtime mutability lives inside
/// the individual policies. Control-plane updates replace the whole entry.
pub struct Service {
    pub name: String,
    pub addr: String,
    pub fallback_uri: String,
    pub health: HealthCheck,
    pub allow_list: AllowList,
    pub auth: TokenAuth,
    pub cache: ResponseCache,
    pub breaker: CircuitBreaker,
    pub limiter: RateLimiter,
}

impl Service {
    /// Build an entry and all its policy objects from configuration.
    pub fn from_config(config: &ServiceConfig) -> Self {
        Self {
            name: config.name.clone(),
            addr: config.addr.clone(),
            fallback_uri: config.fallback_uri.clone(),
            health: HealthCheck {
                enabled: config.health.enabled,
                uri: config.health.uri.clone(),
            },
            allow_list: AllowList::from_entries(&config.whitelist),
            auth: TokenAuth::from_config(&config.auth),
            cache: ResponseCache::from_config(&config.cache),
            breaker: CircuitBreaker::from_config(&config.name, &config.circuit_breaker),
            limiter: RateLimiter::from_config(&config.rate_limiter),
        }
    }

    /// Serializable view for `GET /services`.
    pub fn view(&self) -> ServiceView {
        ServiceView {
            addr: self.addr.clone(),
            fallback_uri: self.fallback_uri.clone(),
            health: self.health.clone(),
            whitelist: self.allow_list.entries(),
            auth: AuthView {
                enabled: self.auth.is_enabled(),
                anonymous: self.auth.is_anonymous(),
                routes: self.auth.routes().to_vec(),
            },
            cache: CacheView {
                enabled: self.cache.is_enabled(),
                expiration_interval: self.cache.ttl().as_secs(),
            },
            circuit_breaker: BreakerView {
                enabled: self.breaker.is_enabled(),
                state: self.breaker.state(),
            },
            rate_limiter: LimiterView {
                enabled: self.limiter.is_enabled(),
                visitors: self.limiter.visitor_count(),
            },
        }
    }
}

/// Serializable snapshot of one registry entry.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceView {
    pub addr: String,
    pub fallback_uri: String,
    pub health: HealthCheck,
    pub whitelist: Vec<String>,
    pub auth: AuthView,
    pub cache: CacheView,
    pub circuit_breaker: BreakerView,
    pub rate_limiter: LimiterView,
}

#[derive(Debug, Serialize)]
pub struct AuthView {
    pub enabled: bool,
    pub anonymous: bool,
    pub routes: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheView {
    pub enabled: bool,
    pub expiration_interval: u64,
}

#[derive(Debug, Serialize)]
pub struct BreakerView {
    pub enabled: bool,
    pub state: CircuitState,
}

#[derive(Debug, Serialize)]
pub struct LimiterView {
    pub enabled: bool,
    pub visitors: usize,
}
