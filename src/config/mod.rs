//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (YAML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated, immutable)
//!     → shared via Arc to all subsystems
//!
//! ServiceConfig doubles as the control-plane body:
//!     POST /services/register|update (JSON)
//!     → validation.rs (per-service checks)
//!     → registry entry rebuild
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; the registry is the only runtime-
//!   mutable state and is changed through the control plane
//! - Policy sections have defaults so minimal service definitions work
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    AuthConfig, CacheConfig, CircuitBreakerConfig, GatewayConfig, HealthConfig, MetricsConfig,
    RateLimiterConfig, RegistryConfig, ServerConfig, ServiceConfig, TlsConfig,
};
