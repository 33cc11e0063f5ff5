//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Path reserved for the health endpoint. No route may claim it.
pub const HEALTH_PATH: &str = "/health";

/// Root configuration for the reverse proxy.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProxyConfig {
    /// Configuration version, reported by the health endpoint.
    pub version: String,

    /// Listen address (e.g., "0.0.0.0:80").
    pub listen: String,

    /// Route definitions mapping path prefixes to upstream targets.
    pub routes: Vec<RouteConfig>,

    /// Shared upstream transport tuning.
    pub transport: TransportConfig,

    /// Cross-origin settings.
    pub cors: CorsConfig,

    /// Forwarding limits.
    pub proxy: ForwardingConfig,

    /// Outer server boundary (timeouts, drain window).
    pub server: ServerConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Runtime sizing.
    pub runtime: RuntimeConfig,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            version: "1.0.0".to_string(),
            listen: "0.0.0.0:80".to_string(),
            routes: Vec::new(),
            transport: TransportConfig::default(),
            cors: CorsConfig::default(),
            proxy: ForwardingConfig::default(),
            server: ServerConfig::default(),
            observability: ObservabilityConfig::default(),
            runtime: RuntimeConfig::default(),
        }
    }
}

/// A single prefix route.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct RouteConfig {
    /// Literal path prefix (e.g., "/svc").
    pub path: String,

    /// Upstream base URL (e.g., "http://127.0.0.1:9000/api/").
    pub target: String,
}

impl RouteConfig {
    pub fn new(path: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            target: target.into(),
        }
    }
}

/// Upstream transport configuration. Durations are whole seconds, buffers are bytes.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TransportConfig {
    pub dial_timeout: u64,
    pub dial_keep_alive: u64,
    pub max_idle_conns: usize,
    pub max_idle_conns_per_host: usize,
    pub max_conns_per_host: usize,
    pub idle_conn_timeout: u64,
    pub response_header_timeout: u64,
    pub read_buffer_size: usize,
    pub write_buffer_size: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            dial_timeout: 10,
            dial_keep_alive: 30,
            max_idle_conns: 10,
            max_idle_conns_per_host: 2,
            max_conns_per_host: 20,
            idle_conn_timeout: 30,
            response_header_timeout: 30,
            read_buffer_size: 4096,
            write_buffer_size: 4096,
        }
    }
}

impl TransportConfig {
    pub fn dial_timeout(&self) -> Duration {
        Duration::from_secs(self.dial_timeout)
    }

    pub fn dial_keep_alive(&self) -> Duration {
        Duration::from_secs(self.dial_keep_alive)
    }

    pub fn idle_conn_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_conn_timeout)
    }

    pub fn response_header_timeout(&self) -> Duration {
        Duration::from_secs(self.response_header_timeout)
    }

    /// Idle connections kept per host. The total idle ceiling caps the per-host one.
    pub fn idle_per_host(&self) -> usize {
        self.max_idle_conns_per_host.min(self.max_idle_conns)
    }
}

/// Cross-origin configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct CorsConfig {
    /// Allowed origins. Empty disables CORS; a single "*" allows any origin.
    pub allowed_origins: Vec<String>,
}

/// Forwarding limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ForwardingConfig {
    /// Upper bound on requests being forwarded at the same time.
    pub max_concurrent_requests: usize,
}

impl Default for ForwardingConfig {
    fn default() -> Self {
        Self {
            max_concurrent_requests: 100,
        }
    }
}

/// Outer server boundary, in seconds.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bound on any single wait for request body bytes.
    pub read_timeout: u64,
    /// Bound on producing the response head.
    pub write_timeout: u64,
    /// Time in-flight requests get to finish after a shutdown signal.
    pub shutdown_grace: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            read_timeout: 30,
            write_timeout: 120,
            shutdown_grace: 5,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Runtime sizing.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Worker threads for the async runtime. `TOKIO_WORKER_THREADS` takes precedence.
    pub worker_threads: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self { worker_threads: 2 }
    }
}
