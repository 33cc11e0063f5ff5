//! Forwarding errors and their client-facing responses.
//!
//! # Design Decisions
//! - Each failure maps to exactly one status with a fixed plain-text body
//! - Upstream details are logged, never sent to the client
//! - Nothing is retried: an error is turned into a response where it happens

use axum::{
    http::{header::InvalidHeaderValue, uri::InvalidUri, StatusCode},
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::security::admission::Rejected;
use crate::upstream::TransportError;

/// Why a request could not be forwarded.
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("no route matches the request path")]
    NoRoute,

    #[error(transparent)]
    AdmissionRejected(#[from] Rejected),

    #[error("invalid upstream uri: {0}")]
    InvalidUri(#[from] InvalidUri),

    #[error("invalid outbound header: {0}")]
    InvalidHeader(#[from] InvalidHeaderValue),

    #[error("could not build upstream request: {0}")]
    InvalidRequest(#[from] axum::http::Error),

    #[error(transparent)]
    Upstream(#[from] TransportError),
}

impl ProxyError {
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::NoRoute => StatusCode::NOT_FOUND,
            ProxyError::AdmissionRejected(_) => StatusCode::SERVICE_UNAVAILABLE,
            ProxyError::InvalidUri(_)
            | ProxyError::InvalidHeader(_)
            | ProxyError::InvalidRequest(_)
            | ProxyError::Upstream(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = self.status();
        let text = status.canonical_reason().unwrap_or("Error");
        (status, text).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use std::time::Duration;

    async fn body_text(err: ProxyError) -> (StatusCode, String) {
        let response = err.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), 1024).await.unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn statuses_and_bodies() {
        assert_eq!(
            body_text(ProxyError::NoRoute).await,
            (StatusCode::NOT_FOUND, "Not Found".to_string())
        );
        assert_eq!(
            body_text(Rejected.into()).await,
            (StatusCode::SERVICE_UNAVAILABLE, "Service Unavailable".to_string())
        );
        assert_eq!(
            body_text(TransportError::ResponseTimeout(Duration::from_secs(1)).into()).await,
            (StatusCode::BAD_GATEWAY, "Bad Gateway".to_string())
        );
    }

    #[test]
    fn malformed_outbound_is_bad_gateway() {
        let err: ProxyError = "http://[bad".parse::<axum::http::Uri>().unwrap_err().into();
        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);
    }
}
