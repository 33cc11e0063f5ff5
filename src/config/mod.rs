//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ProxyConfig (validated, immutable)
//!     → handed by value/reference to the subsystems that need it
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; routes never change at runtime
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    CorsConfig, ForwardingConfig, LogFormat, ObservabilityConfig, ProxyConfig, RouteConfig,
    RuntimeConfig, ServerConfig, TransportConfig, HEALTH_PATH,
};
pub use validation::{validate_config, ValidationError};
