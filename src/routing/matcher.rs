//! Path prefix matching and rewriting.
//!
//! # Design Decisions
//! - Prefixes are literal strings, no wildcard syntax
//! - A prefix matches at a segment boundary: `/svc` owns `/svc` and `/svc/...`, not `/svcx`
//! - Trailing slashes on a prefix are insignificant (`/svc/` and `/svc` are the same route)
//! - Path matching is case-sensitive

/// Strip trailing slashes from a configured prefix. The root prefix becomes "".
pub fn normalize_prefix(prefix: &str) -> &str {
    prefix.trim_end_matches('/')
}

/// Matches the request path against a literal prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPrefixMatcher {
    prefix: String,
}

impl PathPrefixMatcher {
    /// Create a new path prefix matcher.
    pub fn new(prefix: &str) -> Self {
        Self {
            prefix: normalize_prefix(prefix).to_string(),
        }
    }

    /// Length of the normalized prefix, used to pick the longest match.
    pub fn len(&self) -> usize {
        self.prefix.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prefix.is_empty()
    }

    /// Returns the tail left after stripping the prefix, or `None` when the path is not owned.
    ///
    /// An empty tail is normalized to `/`.
    pub fn strip<'a>(&self, path: &'a str) -> Option<&'a str> {
        let rest = path.strip_prefix(self.prefix.as_str())?;
        if rest.is_empty() {
            Some("/")
        } else if rest.starts_with('/') {
            Some(rest)
        } else {
            None
        }
    }
}

/// Join an upstream base path and a request tail with a single slash between them.
pub fn join_path(base: &str, tail: &str) -> String {
    if base.is_empty() || base == "/" {
        return tail.to_string();
    }
    match (base.ends_with('/'), tail.starts_with('/')) {
        (true, true) => format!("{}{}", base, &tail[1..]),
        (false, false) => format!("{}/{}", base, tail),
        _ => format!("{}{}", base, tail),
    }
}
