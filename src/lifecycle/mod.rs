//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup:
//!     Load config → Validate → Install metrics recorder →
//!     Build registry and server → Spawn heartbeat → Serve
//!
//! Shutdown:
//!     SIGINT/SIGTERM → broadcast signal → stop accepting →
//!     drain within gracefulTimeout → exit
//! ```

pub mod shutdown;

pub use shutdown::{listen_for_signals, Shutdown};
