//! Per-service policy subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request (after registry lookup):
//!     → rate_limit.rs (per-IP token bucket)
//!     → allow_list.rs (source-IP membership)
//!     → auth.rs (signed token on protected routes)
//!     → cache.rs (serve stored payload on hit)
//!     → circuit_breaker.rs (wrap the upstream forward)
//! ```
//!
//! # Design Decisions
//! - Each policy is an independent value owned by its registry entry;
//!   the pipeline composes them in a fixed order
//! - A disabled policy never rejects or mutates a request
//! - Background sweeps (limiter visitors, cache TTL) hold weak references
//!   and die with the entry that owns them

pub mod allow_list;
pub mod auth;
pub mod cache;
pub mod circuit_breaker;
pub mod rate_limit;

pub use allow_list::AllowList;
pub use auth::{AuthError, Claims, TokenAuth};
pub use cache::ResponseCache;
pub use circuit_breaker::{BreakerError, CircuitBreaker, CircuitState};
pub use rate_limit::RateLimiter;
