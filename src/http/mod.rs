//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, layers, graceful shutdown)
//!     → middleware/cors.rs (origin check, preflight, CORS headers)
//!     → /health → health report
//!     → proxy.rs (route → admission → rewrite → upstream → stream back)
//!     → response.rs (failures mapped to 404/502/503)
//!     → Send to client
//! ```

pub mod middleware;
pub mod proxy;
pub mod response;
pub mod server;

pub use response::ProxyError;
pub use server::{AppState, HttpServer};
