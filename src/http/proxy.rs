//! The forwarding handler.
//!
//! # Responsibilities
//! - Resolve the owning route, or answer 404 without taking a permit
//! - Hold an admission permit for the whole exchange, body included
//! - Rewrite the request for the upstream and relay the response back
//!
//! # Design Decisions
//! - Request bodies stream straight into the upstream request
//! - Response bodies stream out through a pooled buffer; the permit and the
//!   per-host slot ride along with the body and drop when it ends
//! - A dropped client connection drops this future and with it every held resource

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{Request, Version},
    response::{IntoResponse, Response},
};
use std::net::SocketAddr;
use std::time::Instant;

use crate::http::middleware::cors::CorsHeaders;
use crate::http::response::ProxyError;
use crate::http::server::AppState;
use crate::observability::metrics;
use crate::routing::Route;
use crate::security::headers::{merge_response_headers, prepare_outbound};
use crate::upstream::StreamingBody;

/// Catch-all handler for every non-health path.
pub async fn proxy_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_owned();

    let Some(route) = state.router.match_path(&path) else {
        tracing::debug!(method = %method, path = %path, "no route matched");
        metrics::record_request(method.as_str(), 404, "none", start);
        return ProxyError::NoRoute.into_response();
    };

    tracing::debug!(
        method = %method,
        path = %path,
        route = %route.prefix,
        target = %route.target,
        "forwarding request"
    );

    let response = match forward(&state, route, request).await {
        Ok(response) => response,
        Err(err) => {
            if let ProxyError::Upstream(e) = &err {
                metrics::record_upstream_error(e.kind());
            }
            tracing::warn!(
                method = %method,
                path = %path,
                route = %route.prefix,
                status = err.status().as_u16(),
                error = %err,
                "request not forwarded"
            );
            err.into_response()
        }
    };

    metrics::record_request(method.as_str(), response.status().as_u16(), &route.prefix, start);
    response
}

async fn forward(
    state: &AppState,
    route: &Route,
    request: Request<Body>,
) -> Result<Response, ProxyError> {
    let permit = state
        .admission
        .acquire(state.shutdown.subscribe().cancelled())
        .await?;

    let remote = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.to_string());
    let cors = request.extensions().get::<CorsHeaders>().cloned();

    let (parts, body) = request.into_parts();
    let uri = route.upstream_uri(parts.uri.path(), parts.uri.query())?;

    let mut headers = parts.headers;
    prepare_outbound(&mut headers, route.target.authority(), remote.as_deref())?;

    let mut outbound = Request::builder()
        .method(parts.method)
        .uri(uri)
        .version(Version::HTTP_11)
        .body(body)?;
    *outbound.headers_mut() = headers;

    let (response, slot) = state.transport.round_trip(outbound).await?;
    let (mut head, upstream_body) = response.into_parts();

    let mut client_headers = cors.map(|CorsHeaders(h)| h).unwrap_or_default();
    merge_response_headers(&mut client_headers, &head.headers);
    head.headers = client_headers;

    let body = StreamingBody::new(upstream_body, state.buffers.get(), (permit, slot));
    Ok(Response::from_parts(head, Body::new(body)))
}
