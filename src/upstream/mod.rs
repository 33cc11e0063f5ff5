//! Upstream subsystem.
//!
//! # Data Flow
//! ```text
//! Prepared outbound request
//!     → transport.rs (per-host slot, pooled client, response-header timeout)
//!     → Response head + streaming body
//!     → streaming.rs (pooled buffer copy, releases permit/slot at end)
//!     → Client
//! ```
//!
//! # Design Decisions
//! - One transport per process; connections are reused across routes
//! - Response bodies are streamed, never collected
//! - Nothing here retries: a failed exchange is reported once

pub mod streaming;
pub mod transport;

pub use streaming::{BoxError, BufferPool, PooledBuffer, StreamingBody};
pub use transport::{HostSlot, TransportError, UpstreamClient, UpstreamTransport};
