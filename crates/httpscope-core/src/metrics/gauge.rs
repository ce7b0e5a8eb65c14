use std::fmt::Write;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::Result;

use super::{format_value, AtomicF64, Desc, Family, MetricKind};

/// One gauge series. Cloning shares the underlying value.
#[derive(Debug, Clone)]
pub struct Gauge(Arc<AtomicF64>);

impl Gauge {
    pub fn set(&self, v: f64) {
        self.0.store(v);
    }

    pub fn inc(&self) {
        self.add(1.0);
    }

    pub fn dec(&self) {
        self.add(-1.0);
    }

    pub fn add(&self, delta: f64) {
        self.0.fetch_add(delta);
    }

    pub fn sub(&self, delta: f64) {
        self.0.fetch_add(-delta);
    }

    pub fn get(&self) -> f64 {
        self.0.load()
    }

    /// Set to the current Unix time in seconds.
    pub fn set_to_current_time(&self) {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0);
        self.set(now);
    }

    /// Increment now and decrement when the returned guard is dropped.
    ///
    /// The decrement runs on every exit path of the owner, including unwinding
    /// and future cancellation.
    pub fn track_in_flight(&self) -> InFlightGuard {
        self.inc();
        InFlightGuard {
            gauge: self.clone(),
        }
    }
}

/// Drop guard returned by [`Gauge::track_in_flight`].
#[derive(Debug)]
#[must_use = "the gauge is decremented as soon as the guard is dropped"]
pub struct InFlightGuard {
    gauge: Gauge,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.gauge.dec();
    }
}

/// Gauge instrument, optionally labeled.
#[derive(Clone)]
pub struct GaugeVec {
    family: Arc<Family<AtomicF64>>,
}

impl GaugeVec {
    pub fn new(name: &str, help: &str, label_names: &[&str]) -> Result<Self> {
        Ok(Self {
            family: Arc::new(Family::new(Desc::new(name, help, label_names)?)),
        })
    }

    pub fn desc(&self) -> &Desc {
        self.family.desc()
    }

    /// Series for the given label values, created on first use.
    pub fn with_label_values(&self, values: &[&str]) -> Result<Gauge> {
        self.family
            .get_or_create(values, AtomicF64::default)
            .map(Gauge)
    }

    /// Render in Prometheus text exposition format.
    pub(crate) fn render(&self, out: &mut String) {
        self.family.write_header(MetricKind::Gauge, out);
        let name = self.family.desc().name();
        for (values, value) in self.family.sorted_series() {
            let labels = self.family.label_block(&values, None);
            let _ = writeln!(out, "{}{} {}", name, labels, format_value(value.load()));
        }
    }
}
