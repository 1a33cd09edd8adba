//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (request counter + response-time histogram)
//!
//! Consumers:
//!     → stdout log stream
//!     → GET /metrics (Prometheus scrape, rendered from the installed
//!       recorder handle)
//! ```
//!
//! # Design Decisions
//! - One counter and one histogram, both labeled {code, method, route};
//!   anything more belongs to the upstreams themselves
//! - The metric name prefix comes from config so multiple gateways can
//!   share a Prometheus instance

pub mod logging;
pub mod metrics;

pub use metrics::{install_recorder, Metrics};
