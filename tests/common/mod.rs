//! Shared utilities for integration tests.
#![allow(dead_code)]

use axum::{
    body::Bytes,
    http::{HeaderMap, Method, Uri},
    response::IntoResponse,
    Router,
};
use edge_proxy::config::{ProxyConfig, RouteConfig};
use edge_proxy::http::HttpServer;
use edge_proxy::lifecycle::Shutdown;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

/// Serve `app` on an ephemeral loopback port.
pub async fn spawn_upstream(app: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr
}

/// Upstream that describes the request it received as JSON.
///
/// Returns its address and a counter of requests it has handled.
pub async fn start_echo_backend() -> (SocketAddr, Arc<AtomicUsize>) {
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();
    let app = Router::new().fallback(
        move |method: Method, uri: Uri, headers: HeaderMap, body: Bytes| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                echo(method, uri, headers, body)
            }
        },
    );
    (spawn_upstream(app).await, hits)
}

fn echo(method: Method, uri: Uri, headers: HeaderMap, body: Bytes) -> impl IntoResponse {
    let headers: Vec<(String, String)> = headers
        .iter()
        .map(|(k, v)| {
            (
                k.as_str().to_string(),
                String::from_utf8_lossy(v.as_bytes()).into_owned(),
            )
        })
        .collect();
    let doc = serde_json::json!({
        "method": method.as_str(),
        "path": uri.path(),
        "query": uri.query(),
        "headers": headers,
        "body_len": body.len(),
    });
    (
        [
            ("content-type", "application/json"),
            ("x-upstream", "echo"),
            ("access-control-allow-origin", "https://upstream.example"),
            ("vary", "Accept-Encoding"),
        ],
        doc.to_string(),
    )
}

/// Values of `name` in an echoed header list, in order.
pub fn echoed_header(doc: &serde_json::Value, name: &str) -> Vec<String> {
    doc["headers"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|pair| pair[0] == name)
        .map(|pair| pair[1].as_str().unwrap().to_string())
        .collect()
}

/// Upstream that writes a fixed raw HTTP/1.1 response to every connection.
pub async fn start_raw_backend(response: &'static str) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut buf = vec![0u8; 8192];
                let mut seen = Vec::new();
                // Read until the end of the request head.
                while !seen.windows(4).any(|w| w == b"\r\n\r\n") {
                    match socket.read(&mut buf).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => seen.extend_from_slice(&buf[..n]),
                    }
                }
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });
    addr
}

/// Upstream whose responses are held until `release` is notified.
pub async fn start_gated_backend() -> (SocketAddr, Arc<Notify>) {
    let release = Arc::new(Notify::new());
    let gate = release.clone();
    let app = Router::new().fallback(move || {
        let gate = gate.clone();
        async move {
            gate.notified().await;
            "released"
        }
    });
    (spawn_upstream(app).await, release)
}

/// Upstream that waits `delay` before answering.
pub async fn start_slow_backend(delay: Duration) -> SocketAddr {
    let app = Router::new().fallback(move || async move {
        tokio::time::sleep(delay).await;
        "slow"
    });
    spawn_upstream(app).await
}

/// A loopback address nothing is listening on.
pub async fn closed_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

pub fn config_with_routes(routes: &[(&str, String)]) -> ProxyConfig {
    ProxyConfig {
        listen: "127.0.0.1:0".into(),
        routes: routes
            .iter()
            .map(|(path, target)| RouteConfig::new(*path, target.clone()))
            .collect(),
        ..ProxyConfig::default()
    }
}

/// A running proxy.
pub struct TestProxy {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub handle: JoinHandle<std::io::Result<()>>,
}

impl TestProxy {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

pub async fn start_proxy(config: ProxyConfig) -> TestProxy {
    let shutdown = Shutdown::new();
    let server = HttpServer::new(config, shutdown.clone()).unwrap();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(server.run(listener));
    TestProxy {
        addr,
        shutdown,
        handle,
    }
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .no_proxy()
        .timeout(Duration::from_secs(10))
        .build()
        .unwrap()
}
