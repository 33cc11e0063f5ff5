//! Async runtime construction.

use tokio::runtime::{Builder, Runtime};

use crate::config::RuntimeConfig;

/// Environment variable that overrides the configured worker count.
pub const WORKER_THREADS_ENV: &str = "TOKIO_WORKER_THREADS";

/// Build the multi-threaded runtime the proxy runs on.
pub fn build_runtime(config: &RuntimeConfig) -> std::io::Result<Runtime> {
    let mut builder = Builder::new_multi_thread();
    builder.enable_all().thread_name("edge-proxy-worker");

    // tokio reads the variable itself when worker_threads is left unset.
    let from_env = std::env::var(WORKER_THREADS_ENV).is_ok();
    if !from_env {
        builder.worker_threads(config.worker_threads.max(1));
    }

    let runtime = builder.build()?;
    tracing::debug!(
        worker_threads = runtime.metrics().num_workers(),
        from_env,
        "runtime built"
    );
    Ok(runtime)
}
