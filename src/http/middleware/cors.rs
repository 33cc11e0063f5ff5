//! Cross-origin middleware wrapping the whole dispatch.
//!
//! # Responsibilities
//! - Decide per request whether the `Origin` is allowed
//! - Answer allowed preflights with 204 without touching the route table
//! - Stamp CORS headers on every response of an allowed request
//!
//! # Design Decisions
//! - A disallowed origin gets no CORS headers but is still dispatched; the browser enforces
//! - Only a leading `*` allows every origin; elsewhere it is an ordinary entry that matches nothing
//! - The CORS headers chosen here are handed to the proxy handler as a request
//!   extension and restored after the handler returns, so they win over upstream values

use axum::{
    body::Body,
    extract::State,
    http::{
        header::{
            ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
            ACCESS_CONTROL_ALLOW_ORIGIN, ACCESS_CONTROL_MAX_AGE, ORIGIN, VARY,
        },
        HeaderMap, HeaderValue, Method, Request, StatusCode,
    },
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;

use crate::config::CorsConfig;
use crate::security::headers::CorsSnapshot;

const ALLOW_METHODS: HeaderValue = HeaderValue::from_static("GET, POST, PUT, DELETE, OPTIONS, PATCH");
const ALLOW_HEADERS: HeaderValue =
    HeaderValue::from_static("Content-Type, Authorization, X-Requested-With");
const MAX_AGE: HeaderValue = HeaderValue::from_static("86400");

/// Origin policy built once from [`CorsConfig`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CorsPolicy {
    /// No allow-list configured; requests pass through untouched.
    Disabled,
    /// Every origin is allowed.
    Any,
    /// Only these exact origins are allowed.
    List(Vec<String>),
}

impl CorsPolicy {
    pub fn from_config(config: &CorsConfig) -> Self {
        let policy = match config.allowed_origins.first().map(String::as_str) {
            None => CorsPolicy::Disabled,
            Some("*") => CorsPolicy::Any,
            Some(_) => CorsPolicy::List(config.allowed_origins.clone()),
        };

        match &policy {
            CorsPolicy::Disabled => tracing::info!("CORS disabled"),
            CorsPolicy::Any => tracing::info!("CORS enabled for all origins"),
            CorsPolicy::List(origins) => {
                tracing::info!(origins = ?origins, "CORS enabled for listed origins")
            }
        }
        policy
    }

    /// Headers to stamp on responses for a request carrying `origin`, or `None`
    /// if the origin is not allowed.
    pub fn headers_for(&self, origin: &HeaderValue) -> Option<HeaderMap> {
        let mut headers = HeaderMap::new();
        match self {
            CorsPolicy::Disabled => return None,
            CorsPolicy::Any => {
                headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
            }
            CorsPolicy::List(origins) => {
                let requested = origin.to_str().ok()?;
                if !origins.iter().any(|o| o == requested) {
                    return None;
                }
                headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, origin.clone());
                headers.insert(VARY, HeaderValue::from_static("Origin"));
            }
        }
        headers.insert(ACCESS_CONTROL_ALLOW_METHODS, ALLOW_METHODS);
        headers.insert(ACCESS_CONTROL_ALLOW_HEADERS, ALLOW_HEADERS);
        headers.insert(ACCESS_CONTROL_MAX_AGE, MAX_AGE);
        Some(headers)
    }
}

/// CORS headers granted to the current request.
///
/// Present in request extensions only when the origin was allowed.
#[derive(Debug, Clone)]
pub struct CorsHeaders(pub HeaderMap);

pub async fn cors_middleware(
    State(policy): State<Arc<CorsPolicy>>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let granted = req
        .headers()
        .get(ORIGIN)
        .filter(|origin| !origin.is_empty())
        .and_then(|origin| policy.headers_for(origin));

    let Some(cors) = granted else {
        return next.run(req).await;
    };

    if req.method() == Method::OPTIONS {
        tracing::debug!(path = %req.uri().path(), "answering CORS preflight");
        let mut response = StatusCode::NO_CONTENT.into_response();
        response.headers_mut().extend(cors);
        return response;
    }

    let snapshot = CorsSnapshot::capture(&cors);
    req.extensions_mut().insert(CorsHeaders(cors));
    let mut response = next.run(req).await;
    snapshot.restore(response.headers_mut());
    response
}
