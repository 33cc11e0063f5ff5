//! Shared upstream HTTP client.
//!
//! # Responsibilities
//! - Own the single connection pool used for every outbound request
//! - Apply dial, keep-alive, idle and response-header timeouts
//! - Start the response-header clock only once the request body has been sent
//! - Cap concurrent exchanges per upstream host
//!
//! # Design Decisions
//! - HTTP/1.1 only towards upstreams; HTTPS via rustls with a TLS 1.2 floor
//! - No Accept-Encoding is ever added and bodies are never decoded
//! - Built once at startup and shared through `Arc`, never per request

use axum::body::Body;
use axum::http::{Request, Response};
use bytes::Bytes;
use dashmap::DashMap;
use http_body::{Body as HttpBody, Frame, SizeHint};
use hyper::body::Incoming;
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::client::legacy::{connect::HttpConnector, Client};
use hyper_util::rt::{TokioExecutor, TokioTimer};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{oneshot, OwnedSemaphorePermit, Semaphore};

use crate::config::TransportConfig;

pub type UpstreamClient = Client<HttpsConnector<HttpConnector>, Body>;

/// Errors talking to an upstream.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("upstream request failed: {0}")]
    Request(#[from] hyper_util::client::legacy::Error),

    #[error("no response headers within {0:?}")]
    ResponseTimeout(Duration),

    #[error("host connection limiter closed")]
    LimiterClosed,
}

impl TransportError {
    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            TransportError::Request(e) if e.is_connect() => "connect",
            TransportError::Request(_) => "request",
            TransportError::ResponseTimeout(_) => "timeout",
            TransportError::LimiterClosed => "limiter",
        }
    }
}

/// A held per-host exchange slot. Dropping it lets the next request to that host proceed.
#[derive(Debug)]
pub struct HostSlot {
    _permit: OwnedSemaphorePermit,
}

/// The process-wide upstream transport.
pub struct UpstreamTransport {
    client: UpstreamClient,
    response_header_timeout: Duration,
    max_conns_per_host: usize,
    host_slots: DashMap<String, Arc<Semaphore>>,
}

impl UpstreamTransport {
    pub fn new(config: &TransportConfig) -> Result<Self, rustls::Error> {
        let mut http = HttpConnector::new();
        http.enforce_http(false);
        http.set_nodelay(true);
        http.set_connect_timeout(Some(config.dial_timeout()));
        http.set_keepalive(Some(config.dial_keep_alive()));
        http.set_send_buffer_size(Some(config.write_buffer_size));

        let https = HttpsConnectorBuilder::new()
            .with_tls_config(tls_config()?)
            .https_or_http()
            .enable_http1()
            .wrap_connector(http);

        let client = Client::builder(TokioExecutor::new())
            .pool_timer(TokioTimer::new())
            .pool_idle_timeout(config.idle_conn_timeout())
            .pool_max_idle_per_host(config.idle_per_host())
            .http1_title_case_headers(true)
            .build(https);

        tracing::debug!(
            dial_timeout = ?config.dial_timeout(),
            idle_per_host = config.idle_per_host(),
            max_conns_per_host = config.max_conns_per_host,
            response_header_timeout = ?config.response_header_timeout(),
            "upstream transport ready"
        );

        Ok(Self {
            client,
            response_header_timeout: config.response_header_timeout(),
            max_conns_per_host: config.max_conns_per_host,
            host_slots: DashMap::new(),
        })
    }

    /// Send `request` and wait for the response head.
    ///
    /// The response-header timeout runs from the moment the request body has
    /// been fully handed to the connection, so slow uploads are not cut short.
    /// The returned [`HostSlot`] must live as long as the response body is being read.
    pub async fn round_trip(
        &self,
        request: Request<Body>,
    ) -> Result<(Response<Incoming>, HostSlot), TransportError> {
        let host = request
            .uri()
            .authority()
            .map(|a| a.as_str().to_ascii_lowercase())
            .unwrap_or_default();
        let slot = self.host_slot(host).await?;

        let (sent_tx, sent_rx) = oneshot::channel();
        let request = request.map(|body| Body::new(UploadWatch::new(body, sent_tx)));

        let timeout = self.response_header_timeout;
        let head_deadline = async move {
            // A dropped sender means the body is gone, which also ends the upload.
            let _ = sent_rx.await;
            tokio::time::sleep(timeout).await;
        };

        let response = tokio::select! {
            response = self.client.request(request) => response?,
            _ = head_deadline => return Err(TransportError::ResponseTimeout(timeout)),
        };

        Ok((response, slot))
    }

    async fn host_slot(&self, host: String) -> Result<HostSlot, TransportError> {
        let limiter = self
            .host_slots
            .entry(host)
            .or_insert_with(|| Arc::new(Semaphore::new(self.max_conns_per_host)))
            .value()
            .clone();
        let permit = limiter
            .acquire_owned()
            .await
            .map_err(|_| TransportError::LimiterClosed)?;
        Ok(HostSlot { _permit: permit })
    }

    /// Exchanges currently holding a slot for `host`.
    pub fn active_for_host(&self, host: &str) -> usize {
        self.host_slots
            .get(host)
            .map(|s| self.max_conns_per_host - s.available_permits())
            .unwrap_or(0)
    }
}

/// Request body that reports when its last frame has been handed out.
struct UploadWatch {
    inner: Body,
    sent: Option<oneshot::Sender<()>>,
}

impl UploadWatch {
    fn new(inner: Body, sent: oneshot::Sender<()>) -> Self {
        let mut watch = Self {
            inner,
            sent: Some(sent),
        };
        // Bodiless requests may never be polled.
        if watch.inner.is_end_stream() {
            watch.finish();
        }
        watch
    }

    fn finish(&mut self) {
        if let Some(tx) = self.sent.take() {
            let _ = tx.send(());
        }
    }
}

impl HttpBody for UploadWatch {
    type Data = Bytes;
    type Error = axum::Error;

    fn poll_frame(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let polled = Pin::new(&mut self.inner).poll_frame(cx);
        match &polled {
            Poll::Ready(None) | Poll::Ready(Some(Err(_))) => self.finish(),
            Poll::Ready(Some(Ok(_))) if self.inner.is_end_stream() => self.finish(),
            _ => {}
        }
        polled
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

fn tls_config() -> Result<rustls::ClientConfig, rustls::Error> {
    let mut roots = rustls::RootCertStore::empty();
    roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

    let provider = Arc::new(rustls::crypto::ring::default_provider());
    Ok(rustls::ClientConfig::builder_with_provider(provider)
        .with_protocol_versions(&[&rustls::version::TLS13, &rustls::version::TLS12])?
        .with_root_certificates(roots)
        .with_no_client_auth())
}
