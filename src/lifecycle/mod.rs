//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (runtime.rs, startup.rs):
//!     Build runtime → Start metrics → Build server → Bind listener → Serve
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Stop accepting → Fail admission waiters → Drain → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then core, then listeners
//! - Ordered shutdown: stop accept, drain, close
//! - Shutdown has timeout: forced exit after the drain window

pub mod runtime;
pub mod shutdown;
pub mod signals;
pub mod startup;

pub use runtime::build_runtime;
pub use shutdown::{Shutdown, ShutdownSignal};
pub use signals::watch_signals;
pub use startup::{run, StartupError};
