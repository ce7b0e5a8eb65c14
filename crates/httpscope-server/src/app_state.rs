//! Shared application state.
//!
//! Owns the registry and every instrument family. Registration happens here,
//! once, before the router exists; any wiring error aborts startup.

use std::sync::Arc;
use std::time::Instant;

use httpscope_core::error::Result;
use httpscope_core::Registry;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::AppConfig;
use crate::obs::{self, BusinessMetrics, HttpMetrics, Instrumentation, UptimeMetrics};
use crate::services::{NumberSource, ThreadRngSource};

#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    cfg: AppConfig,
    registry: Registry,
    http: Arc<HttpMetrics>,
    business: BusinessMetrics,
    uptime: UptimeMetrics,
    numbers: Arc<dyn NumberSource>,
    started: Instant,
}

impl AppState {
    /// Build application state with the default random source.
    pub fn new(cfg: AppConfig) -> Result<Self> {
        Self::with_number_source(cfg, Arc::new(ThreadRngSource))
    }

    pub fn with_number_source(cfg: AppConfig, numbers: Arc<dyn NumberSource>) -> Result<Self> {
        let registry = Registry::new();
        let http = Arc::new(HttpMetrics::register(
            &registry,
            cfg.metrics.slow_request_threshold(),
            cfg.metrics.summary_window,
        )?);
        let business = BusinessMetrics::register(&registry)?;
        let uptime = UptimeMetrics::register(&registry)?;
        uptime.mark_started();

        tracing::info!(metrics = registry.names().len(), "metrics registered");

        Ok(Self {
            inner: Arc::new(AppStateInner {
                cfg,
                registry,
                http,
                business,
                uptime,
                numbers,
                started: Instant::now(),
            }),
        })
    }

    pub fn cfg(&self) -> &AppConfig {
        &self.inner.cfg
    }

    pub fn registry(&self) -> &Registry {
        &self.inner.registry
    }

    pub fn http_metrics(&self) -> Arc<HttpMetrics> {
        Arc::clone(&self.inner.http)
    }

    pub fn business(&self) -> &BusinessMetrics {
        &self.inner.business
    }

    pub fn numbers(&self) -> &dyn NumberSource {
        self.inner.numbers.as_ref()
    }

    /// Middleware state for this app.
    pub fn instrumentation(&self) -> Instrumentation {
        Instrumentation::new(
            self.http_metrics(),
            &self.inner.cfg.metrics.path,
            self.inner.cfg.metrics.record_unmatched,
        )
    }

    /// Start the uptime reporter; it stops when `cancel` fires.
    pub fn spawn_uptime_reporter(&self, cancel: CancellationToken) -> JoinHandle<()> {
        obs::spawn_uptime_reporter(
            self.inner.uptime.uptime().clone(),
            self.inner.started,
            self.inner.cfg.metrics.uptime_interval(),
            cancel,
        )
    }
}
