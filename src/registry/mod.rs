//! Service registry subsystem.
//!
//! # Data Flow
//! ```text
//! Boot:
//!     config registry.services → Service::from_config → store
//!
//! Runtime:
//!     control plane register/update/deregister → store (write lock)
//!     request pipeline lookups → store (read lock, Arc clone out)
//!     heartbeat.rs → health_targets snapshot → probe outside the lock
//! ```
//!
//! # Design Decisions
//! - One owning container; entries shared as `Arc<Service>`
//! - Updates rebuild every policy object and replace the whole entry,
//!   so stale sweeps die with the old entry
//! - Registry operations never fail; absent names surface as HTTP errors
//!   at the call sites that need the entry

pub mod heartbeat;
pub mod service;
pub mod store;

pub use service::{HealthCheck, Service, ServiceView};
pub use store::ServiceRegistry;
