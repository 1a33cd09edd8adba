//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → plain: axum::serve with connect info
//!     → TLS: tls.rs acceptor → per-connection hyper serve loop
//! ```

pub mod tls;

pub use tls::{build_acceptor, TlsError};
