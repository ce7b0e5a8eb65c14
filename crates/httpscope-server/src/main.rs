//! httpscope server binary.
//!
//! Loads `HTTPSCOPE_CONFIG` (default `httpscope.yaml`), registers metrics,
//! starts the uptime reporter and serves until Ctrl-C.

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use httpscope_core::error::{HttpScopeError, Result};
use httpscope_server::{app_state::AppState, config, router};

const DEFAULT_CONFIG_PATH: &str = "httpscope.yaml";

#[tokio::main]
async fn main() {
    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if let Err(e) = run().await {
        error!(error = %e, class = e.class().as_str(), "httpscope-server failed");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let path = std::env::var("HTTPSCOPE_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_owned());
    let cfg = config::load_from_file(&path)?;
    let listen = cfg.server.listen_addr()?;

    let state = AppState::new(cfg)?;
    let cancel = CancellationToken::new();
    let reporter = state.spawn_uptime_reporter(cancel.clone());
    let app = router::build_router(state);

    info!(%listen, config = %path, "httpscope-server starting");
    let listener = TcpListener::bind(listen)
        .await
        .map_err(|e| HttpScopeError::Internal(format!("bind {listen} failed: {e}")))?;

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| HttpScopeError::Internal(format!("server failed: {e}")));

    cancel.cancel();
    if let Err(e) = reporter.await {
        warn!(error = %e, "uptime reporter task failed");
    }
    info!("httpscope-server stopped");
    served
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "ctrl-c handler unavailable; running until killed");
        std::future::pending::<()>().await;
    }
}
