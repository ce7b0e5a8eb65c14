use std::net::SocketAddr;
use std::time::Duration;

use serde::Deserialize;
use httpscope_core::error::{HttpScopeError, Result};

use crate::router::DEMO_ROUTES;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    pub version: u32,

    #[serde(default)]
    pub server: ServerSection,

    #[serde(default)]
    pub metrics: MetricsSection,
}

impl AppConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(HttpScopeError::InvalidConfig(format!(
                "unsupported config version {}",
                self.version
            )));
        }
        self.server.validate()?;
        self.metrics.validate()?;
        Ok(())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            version: 1,
            server: ServerSection::default(),
            metrics: MetricsSection::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerSection {
    #[serde(default = "default_listen")]
    pub listen: String,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            listen: default_listen(),
        }
    }
}

impl ServerSection {
    pub fn validate(&self) -> Result<()> {
        self.listen_addr().map(|_| ())
    }

    pub fn listen_addr(&self) -> Result<SocketAddr> {
        self.listen.parse().map_err(|e| {
            HttpScopeError::InvalidConfig(format!("server.listen must be a valid SocketAddr: {e}"))
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MetricsSection {
    /// Scrape route; never instrumented itself.
    #[serde(default = "default_metrics_path")]
    pub path: String,

    #[serde(default = "default_slow_request_threshold_ms")]
    pub slow_request_threshold_ms: u64,

    #[serde(default = "default_uptime_interval_ms")]
    pub uptime_interval_ms: u64,

    /// Record requests that matched no route under the `unmatched` label.
    /// When false they bypass instrumentation entirely.
    #[serde(default = "default_record_unmatched")]
    pub record_unmatched: bool,

    /// Recent samples kept per summary series for quantile estimation.
    #[serde(default = "default_summary_window")]
    pub summary_window: usize,
}

impl Default for MetricsSection {
    fn default() -> Self {
        Self {
            path: default_metrics_path(),
            slow_request_threshold_ms: default_slow_request_threshold_ms(),
            uptime_interval_ms: default_uptime_interval_ms(),
            record_unmatched: default_record_unmatched(),
            summary_window: default_summary_window(),
        }
    }
}

impl MetricsSection {
    pub fn validate(&self) -> Result<()> {
        if !self.path.starts_with('/') {
            return Err(HttpScopeError::InvalidConfig(
                "metrics.path must start with '/'".into(),
            ));
        }
        if !self.path.chars().all(literal_path_char) {
            return Err(HttpScopeError::InvalidConfig(
                "metrics.path may only contain ASCII letters, digits and -._~/".into(),
            ));
        }
        if DEMO_ROUTES.contains(&self.path.as_str()) {
            return Err(HttpScopeError::InvalidConfig(format!(
                "metrics.path {} collides with a built-in route",
                self.path
            )));
        }
        if !(1..=600_000).contains(&self.slow_request_threshold_ms) {
            return Err(HttpScopeError::InvalidConfig(
                "metrics.slow_request_threshold_ms must be between 1 and 600000".into(),
            ));
        }
        if !(100..=60_000).contains(&self.uptime_interval_ms) {
            return Err(HttpScopeError::InvalidConfig(
                "metrics.uptime_interval_ms must be between 100 and 60000".into(),
            ));
        }
        if !(1..=65_536).contains(&self.summary_window) {
            return Err(HttpScopeError::InvalidConfig(
                "metrics.summary_window must be between 1 and 65536".into(),
            ));
        }
        Ok(())
    }

    pub fn slow_request_threshold(&self) -> Duration {
        Duration::from_millis(self.slow_request_threshold_ms)
    }

    pub fn uptime_interval(&self) -> Duration {
        Duration::from_millis(self.uptime_interval_ms)
    }
}

/// Characters the router treats literally (no `:param` or `*wildcard`).
fn literal_path_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_' | '~' | '/')
}

fn default_listen() -> String {
    "0.0.0.0:8080".into()
}
fn default_metrics_path() -> String {
    "/metrics".into()
}
fn default_slow_request_threshold_ms() -> u64 {
    1000
}
fn default_uptime_interval_ms() -> u64 {
    1000
}
fn default_record_unmatched() -> bool {
    true
}
fn default_summary_window() -> usize {
    1024
}
