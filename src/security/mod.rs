//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Routed request:
//!     → admission.rs (bounded in-flight permits, cancellable wait)
//!     → headers.rs (strip hop-by-hop, set Host, append X-Forwarded-For)
//!     → Upstream
//!
//! Upstream response:
//!     → headers.rs (strip hop-by-hop, keep proxy CORS headers)
//!     → Client
//! ```
//!
//! # Design Decisions
//! - Overload is answered with 503, never with unbounded queuing past shutdown
//! - No trust in client-supplied hop-by-hop headers

pub mod admission;
pub mod headers;

pub use admission::{AdmissionController, AdmissionPermit, Rejected};
