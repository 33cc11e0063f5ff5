//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Reject the reserved health path and conflicting prefixes
//! - Check that every target is an absolute http(s) URL
//! - Validate value ranges (limits > 0, listen address parses)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashMap;
use std::net::SocketAddr;
use thiserror::Error;
use url::Url;

use crate::config::schema::{ProxyConfig, HEALTH_PATH};
use crate::routing::matcher::normalize_prefix;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("no routes defined")]
    NoRoutes,

    #[error("route path must be non-empty and start with '/': {0:?}")]
    InvalidPath(String),

    #[error("route path cannot be '/health' as it is reserved for the health check")]
    ReservedPath,

    #[error("route paths {first:?} and {second:?} claim the same prefix")]
    DuplicatePrefix { first: String, second: String },

    #[error("bad target {target:?} for route {path:?}: {reason}")]
    InvalidTarget {
        path: String,
        target: String,
        reason: String,
    },

    #[error("invalid listen address {0:?}")]
    InvalidListen(String),

    #[error("{0} must be greater than zero")]
    ZeroLimit(&'static str),
}

/// Validate a parsed configuration, collecting every problem found.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.routes.is_empty() {
        errors.push(ValidationError::NoRoutes);
    }

    let mut seen: HashMap<&str, &str> = HashMap::new();
    for route in &config.routes {
        if route.path.is_empty() || !route.path.starts_with('/') {
            errors.push(ValidationError::InvalidPath(route.path.clone()));
            continue;
        }
        let normalized = normalize_prefix(&route.path);
        if normalized == HEALTH_PATH {
            errors.push(ValidationError::ReservedPath);
            continue;
        }

        if let Some(first) = seen.insert(normalized, &route.path) {
            errors.push(ValidationError::DuplicatePrefix {
                first: first.to_string(),
                second: route.path.clone(),
            });
        }

        if let Err(reason) = check_target(&route.target) {
            errors.push(ValidationError::InvalidTarget {
                path: route.path.clone(),
                target: route.target.clone(),
                reason,
            });
        }
    }

    if config.listen.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidListen(config.listen.clone()));
    }

    let limits = [
        ("proxy.max_concurrent_requests", config.proxy.max_concurrent_requests),
        ("transport.max_conns_per_host", config.transport.max_conns_per_host),
        ("transport.read_buffer_size", config.transport.read_buffer_size),
        ("transport.write_buffer_size", config.transport.write_buffer_size),
    ];
    for (name, value) in limits {
        if value == 0 {
            errors.push(ValidationError::ZeroLimit(name));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_target(target: &str) -> Result<Url, String> {
    let url = Url::parse(target).map_err(|e| e.to_string())?;
    match url.scheme() {
        "http" | "https" => {}
        other => return Err(format!("unsupported scheme '{other}'")),
    }
    if url.host_str().is_none() {
        return Err("missing host".to_string());
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::RouteConfig;

    fn config_with(routes: Vec<RouteConfig>) -> ProxyConfig {
        ProxyConfig {
            listen: "127.0.0.1:8080".to_string(),
            routes,
            ..ProxyConfig::default()
        }
    }

    #[test]
    fn accepts_valid_config() {
        let config = config_with(vec![
            RouteConfig::new("/svc", "http://127.0.0.1:9000/api/"),
            RouteConfig::new("/", "https://example.com"),
        ]);
        assert_eq!(validate_config(&config), Ok(()));
    }

    #[test]
    fn rejects_empty_routes() {
        let errors = validate_config(&config_with(vec![])).unwrap_err();
        assert_eq!(errors, vec![ValidationError::NoRoutes]);
    }

    #[test]
    fn rejects_health_path() {
        let config = config_with(vec![RouteConfig::new("/health", "http://127.0.0.1:9000")]);
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors, vec![ValidationError::ReservedPath]);

        let config = config_with(vec![RouteConfig::new("/health/", "http://127.0.0.1:9000")]);
        assert_eq!(validate_config(&config), Err(vec![ValidationError::ReservedPath]));
    }

    #[test]
    fn rejects_prefixes_that_differ_only_by_trailing_slash() {
        let config = config_with(vec![
            RouteConfig::new("/svc", "http://127.0.0.1:9000"),
            RouteConfig::new("/svc/", "http://127.0.0.1:9001"),
        ]);
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![ValidationError::DuplicatePrefix {
                first: "/svc".to_string(),
                second: "/svc/".to_string(),
            }]
        );
    }

    #[test]
    fn collects_every_problem() {
        let mut config = config_with(vec![
            RouteConfig::new("svc", "http://127.0.0.1:9000"),
            RouteConfig::new("/ftp", "ftp://files.example"),
            RouteConfig::new("/bad", "not a url"),
        ]);
        config.listen = "nowhere".to_string();
        config.proxy.max_concurrent_requests = 0;

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 5);
        assert!(matches!(errors[0], ValidationError::InvalidPath(_)));
        assert!(matches!(errors[1], ValidationError::InvalidTarget { .. }));
        assert!(matches!(errors[2], ValidationError::InvalidTarget { .. }));
        assert_eq!(errors[3], ValidationError::InvalidListen("nowhere".to_string()));
        assert_eq!(errors[4], ValidationError::ZeroLimit("proxy.max_concurrent_requests"));
    }
}
