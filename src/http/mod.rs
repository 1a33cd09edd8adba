//! HTTP subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (Axum setup, global rate limit, control-plane routes)
//!     → handler.rs (policy pipeline, forward, fallback)
//!     → upstream response back to the client
//! ```

pub mod handler;
pub mod server;

pub use handler::ensure_scheme;
pub use server::{AppState, HttpClient, HttpServer, ServerError};
