//! Route lookup and target rewriting.
//!
//! # Responsibilities
//! - Store compiled routes in registration order
//! - Look up the route owning a request path (longest literal prefix)
//! - Build the upstream URI for a matched request
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - O(n) prefix scan (acceptable for typical route counts)
//! - Explicit `None` on no-match rather than a silent default

use axum::http::uri::{InvalidUri, Uri};
use url::Url;

use crate::config::schema::RouteConfig;
use crate::config::validation::ValidationError;
use crate::routing::matcher::{join_path, PathPrefixMatcher};

/// A parsed upstream target: scheme, authority and base path.
#[derive(Debug, Clone)]
pub struct Target {
    url: Url,
    authority: String,
}

impl Target {
    pub fn parse(raw: &str) -> Result<Self, url::ParseError> {
        let url = Url::parse(raw)?;
        let host = url.host_str().ok_or(url::ParseError::EmptyHost)?;
        let authority = match url.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        };
        Ok(Self { url, authority })
    }

    pub fn scheme(&self) -> &str {
        self.url.scheme()
    }

    /// `host[:port]` as written in the target, used for the outbound Host header.
    pub fn authority(&self) -> &str {
        &self.authority
    }

    pub fn base_path(&self) -> &str {
        self.url.path()
    }
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.url)
    }
}

/// A compiled route.
#[derive(Debug, Clone)]
pub struct Route {
    /// Prefix as configured, used for logging and metrics labels.
    pub prefix: String,
    matcher: PathPrefixMatcher,
    pub target: Target,
}

impl Route {
    pub fn new(prefix: &str, target: Target) -> Self {
        Self {
            prefix: prefix.to_string(),
            matcher: PathPrefixMatcher::new(prefix),
            target,
        }
    }

    /// Upstream URI for a request path owned by this route. The query is passed through verbatim.
    pub fn upstream_uri(&self, path: &str, query: Option<&str>) -> Result<Uri, InvalidUri> {
        let tail = self.matcher.strip(path).unwrap_or("/");
        let forwarded = join_path(self.target.base_path(), tail);
        let uri = match query {
            Some(q) => format!(
                "{}://{}{}?{}",
                self.target.scheme(),
                self.target.authority(),
                forwarded,
                q
            ),
            None => format!(
                "{}://{}{}",
                self.target.scheme(),
                self.target.authority(),
                forwarded
            ),
        };
        uri.parse()
    }
}

/// Immutable prefix route table.
#[derive(Debug, Default)]
pub struct Router {
    routes: Vec<Route>,
}

impl Router {
    /// Compile routes from configuration.
    pub fn from_config(configs: &[RouteConfig]) -> Result<Self, ValidationError> {
        let mut routes = Vec::with_capacity(configs.len());
        for config in configs {
            let target =
                Target::parse(&config.target).map_err(|e| ValidationError::InvalidTarget {
                    path: config.path.clone(),
                    target: config.target.clone(),
                    reason: e.to_string(),
                })?;
            tracing::info!(prefix = %config.path, target = %target, "route registered");
            routes.push(Route::new(&config.path, target));
        }
        Ok(Self { routes })
    }

    /// Find the route owning `path`: the longest matching prefix wins.
    pub fn match_path(&self, path: &str) -> Option<&Route> {
        self.routes
            .iter()
            .filter(|r| r.matcher.strip(path).is_some())
            .max_by_key(|r| r.matcher.len())
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
