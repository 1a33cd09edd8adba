//! Reverse-proxy API gateway library.

pub mod admin;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod policy;
pub mod registry;

pub use config::GatewayConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
