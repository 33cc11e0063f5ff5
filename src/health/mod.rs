//! Health endpoint.
//!
//! # Data Flow
//! ```text
//! Startup:
//!     ProxyConfig (version, route count) + start time
//!     → report.rs (HealthReport, built once)
//!     → shared through AppState
//!
//! GET /health:
//!     → health_handler → JSON document
//! ```
//!
//! # Design Decisions
//! - The document never changes after startup, so it is serialized per request from shared state
//! - Served locally; `/health` is never forwarded even if a route would match it

pub mod report;

pub use report::{health_handler, HealthReport};
