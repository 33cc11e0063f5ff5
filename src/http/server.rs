//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Build the shared state once from the validated config
//! - Create the Axum Router: `/health` locally, everything else through the proxy handler
//! - Wire up middleware (CORS, body read timeout, handler timeout, tracing)
//! - Serve with graceful shutdown, bounded by the drain window

use axum::{
    extract::FromRef,
    middleware::from_fn_with_state,
    routing::any,
    Router,
};
use chrono::Utc;
use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::{
    timeout::{RequestBodyTimeoutLayer, TimeoutLayer},
    trace::TraceLayer,
};

use crate::config::{validate_config, ConfigError, ProxyConfig, HEALTH_PATH};
use crate::health::{health_handler, HealthReport};
use crate::http::middleware::cors::{cors_middleware, CorsPolicy};
use crate::http::proxy::proxy_handler;
use crate::lifecycle::startup::StartupError;
use crate::lifecycle::Shutdown;
use crate::routing::Router as ProxyRouter;
use crate::security::admission::AdmissionController;
use crate::upstream::{BufferPool, UpstreamTransport};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub router: Arc<ProxyRouter>,
    pub admission: AdmissionController,
    pub transport: Arc<UpstreamTransport>,
    pub buffers: Arc<BufferPool>,
    pub shutdown: Shutdown,
    pub health: Arc<HealthReport>,
}

impl FromRef<AppState> for Arc<HealthReport> {
    fn from_ref(state: &AppState) -> Self {
        state.health.clone()
    }
}

/// HTTP server for the reverse proxy.
pub struct HttpServer {
    router: Router,
    config: ProxyConfig,
    state: AppState,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    ///
    /// `shutdown` stops the accept loop and fails requests still waiting for admission.
    pub fn new(config: ProxyConfig, shutdown: Shutdown) -> Result<Self, StartupError> {
        validate_config(&config).map_err(ConfigError::Validation)?;

        let proxy_router = Arc::new(ProxyRouter::from_config(&config.routes)?);
        let transport = Arc::new(UpstreamTransport::new(&config.transport)?);
        // One buffer per admitted request is the most that can be out at once.
        let buffers = Arc::new(BufferPool::new(
            config.transport.read_buffer_size,
            config.proxy.max_concurrent_requests,
        ));

        let state = AppState {
            router: proxy_router,
            admission: AdmissionController::new(config.proxy.max_concurrent_requests),
            transport,
            buffers,
            shutdown,
            health: Arc::new(HealthReport::new(&config, Utc::now())),
        };

        let cors = Arc::new(CorsPolicy::from_config(&config.cors));
        let router = Self::build_router(&config, state.clone(), cors);
        Ok(Self {
            router,
            config,
            state,
        })
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &ProxyConfig, state: AppState, cors: Arc<CorsPolicy>) -> Router {
        Router::new()
            .route(HEALTH_PATH, any(health_handler))
            .route("/", any(proxy_handler))
            .route("/{*path}", any(proxy_handler))
            .with_state(state)
            .layer(RequestBodyTimeoutLayer::new(Duration::from_secs(
                config.server.read_timeout,
            )))
            .layer(TimeoutLayer::new(Duration::from_secs(
                config.server.write_timeout,
            )))
            .layer(from_fn_with_state(cors, cors_middleware))
            .layer(TraceLayer::new_for_http())
    }

    /// The fully layered application, for driving without a socket.
    pub fn app(&self) -> Router {
        self.router.clone()
    }

    /// Admission permits currently held.
    pub fn in_flight(&self) -> usize {
        self.state.admission.in_flight()
    }

    /// Run the server, accepting connections on the given listener.
    ///
    /// Returns once shutdown has been triggered and either every connection has
    /// drained or the drain window has elapsed.
    pub async fn run(self, listener: TcpListener) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            routes = self.state.router.len(),
            max_concurrent_requests = self.state.admission.capacity(),
            "HTTP server starting"
        );

        let grace = Duration::from_secs(self.config.server.shutdown_grace);
        let shutdown = self.state.shutdown.clone();
        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        let serve = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown.subscribe().cancelled())
            .into_future();
        let drain_deadline = async {
            shutdown.subscribe().cancelled().await;
            tokio::time::sleep(grace).await;
        };

        tokio::select! {
            result = serve => result?,
            _ = drain_deadline => {
                tracing::warn!(grace = ?grace, "drain window elapsed, closing remaining connections");
            }
        }

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }
}
