//! Process start time and uptime gauges.
//!
//! The reporter recomputes uptime from a fixed start instant on every tick,
//! so skipped or late ticks never accumulate error.

use std::time::{Duration, Instant};

use httpscope_core::error::Result;
use httpscope_core::metrics::Gauge;
use httpscope_core::Registry;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::info;

pub struct UptimeMetrics {
    start_time: Gauge,
    uptime: Gauge,
}

impl UptimeMetrics {
    pub fn register(registry: &Registry) -> Result<Self> {
        Ok(Self {
            start_time: registry
                .register_gauge(
                    "app_start_time_seconds",
                    "Application start time in seconds since epoch",
                    &[],
                )?
                .with_label_values(&[])?,
            uptime: registry
                .register_gauge("app_uptime_seconds", "Application uptime in seconds", &[])?
                .with_label_values(&[])?,
        })
    }

    /// Stamp the start time gauge with the current wall clock.
    pub fn mark_started(&self) {
        self.start_time.set_to_current_time();
    }

    pub fn uptime(&self) -> &Gauge {
        &self.uptime
    }
}

/// Update `uptime` every `interval` until `cancel` fires.
pub async fn run_uptime_reporter(
    uptime: Gauge,
    started: Instant,
    interval: Duration,
    cancel: CancellationToken,
) {
    info!(interval_ms = interval.as_millis() as u64, "uptime reporter started");

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                uptime.set(started.elapsed().as_secs_f64());
            }
            _ = cancel.cancelled() => break,
        }
    }

    info!("uptime reporter stopped");
}

pub fn spawn_uptime_reporter(
    uptime: Gauge,
    started: Instant,
    interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(run_uptime_reporter(uptime, started, interval, cancel))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reports_until_cancelled() {
        let registry = Registry::new();
        let metrics = UptimeMetrics::register(&registry).unwrap();
        metrics.mark_started();

        let started = Instant::now();
        let cancel = CancellationToken::new();
        let handle = spawn_uptime_reporter(
            metrics.uptime().clone(),
            started,
            Duration::from_millis(10),
            cancel.clone(),
        );

        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("reporter stops after cancel")
            .unwrap();

        let reported = metrics.uptime().get();
        assert!(reported > 0.0, "uptime {reported}");
        assert!(reported < 60.0, "uptime {reported}");

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(metrics.uptime().get(), reported, "no updates after stop");

        let start = registry.gauge("app_start_time_seconds", &[]).unwrap().get();
        assert!(start > 0.0);
    }

    #[tokio::test]
    async fn already_cancelled_token_returns_promptly() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let gauge = Registry::new()
            .register_gauge("u", "u", &[])
            .unwrap()
            .with_label_values(&[])
            .unwrap();
        tokio::time::timeout(
            Duration::from_secs(1),
            run_uptime_reporter(gauge, Instant::now(), Duration::from_secs(60), cancel),
        )
        .await
        .expect("returns without waiting for a tick");
    }
}
