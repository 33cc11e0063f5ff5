//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (path, query)
//!     → router.rs (longest-prefix lookup)
//!     → matcher.rs (segment-boundary prefix match, tail extraction)
//!     → Return: matched Route or None
//!
//! Route Compilation (at startup):
//!     RouteConfig[]
//!     → Parse targets
//!     → Freeze as immutable Router
//!
//! Forwarding:
//!     target base path + stripped tail → join_path → upstream URI
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - No regex in hot path (prefix matching only)
//! - Deterministic: same input always matches same route

pub mod matcher;
pub mod router;

pub use matcher::{join_path, normalize_prefix, PathPrefixMatcher};
pub use router::{Route, Router, Target};
