use std::fmt::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::error::{HttpScopeError, Result};

use super::{format_value, AtomicF64, Desc, Family, MetricKind};

/// Prometheus client default buckets (seconds).
pub const DEFAULT_BUCKETS: [f64; 11] = [
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

/// Bucket counts are stored non-cumulatively with one trailing overflow slot,
/// so `+Inf` and `_count` are derived from the same loads at snapshot time.
#[derive(Debug)]
pub(crate) struct HistogramCell {
    bounds: Arc<[f64]>,
    counts: Box<[AtomicU64]>,
    sum: AtomicF64,
}

impl HistogramCell {
    fn new(bounds: Arc<[f64]>) -> Self {
        let counts = (0..=bounds.len()).map(|_| AtomicU64::new(0)).collect();
        Self {
            bounds,
            counts,
            sum: AtomicF64::default(),
        }
    }

    fn observe(&self, v: f64) {
        let idx = if v.is_nan() {
            self.bounds.len()
        } else {
            self.bounds.partition_point(|le| *le < v)
        };
        if let Some(slot) = self.counts.get(idx) {
            slot.fetch_add(1, Ordering::Relaxed);
        }
        self.sum.fetch_add(v);
    }

    fn snapshot(&self) -> HistogramSnapshot {
        let mut running = 0u64;
        let mut buckets = Vec::with_capacity(self.bounds.len());
        for (le, slot) in self.bounds.iter().zip(self.counts.iter()) {
            running += slot.load(Ordering::Relaxed);
            buckets.push((*le, running));
        }
        let overflow = self
            .counts
            .get(self.bounds.len())
            .map(|slot| slot.load(Ordering::Relaxed))
            .unwrap_or(0);
        HistogramSnapshot {
            buckets,
            sum: self.sum.load(),
            count: running + overflow,
        }
    }
}

/// Point-in-time view of one histogram series.
#[derive(Debug, Clone, PartialEq)]
pub struct HistogramSnapshot {
    /// `(upper bound, cumulative count)` for every finite bucket.
    pub buckets: Vec<(f64, u64)>,
    pub sum: f64,
    /// Also the value of the `+Inf` bucket.
    pub count: u64,
}

/// One histogram series.
#[derive(Debug, Clone)]
pub struct Histogram(Arc<HistogramCell>);

impl Histogram {
    pub fn observe(&self, v: f64) {
        self.0.observe(v);
    }

    pub fn snapshot(&self) -> HistogramSnapshot {
        self.0.snapshot()
    }
}

/// Bucketed histogram instrument, optionally labeled.
#[derive(Clone)]
pub struct HistogramVec {
    family: Arc<Family<HistogramCell>>,
    bounds: Arc<[f64]>,
}

impl HistogramVec {
    /// `buckets` must be non-empty, finite and strictly ascending; the `+Inf`
    /// bucket is implicit.
    pub fn new(name: &str, help: &str, label_names: &[&str], buckets: &[f64]) -> Result<Self> {
        let desc = Desc::new(name, help, label_names)?;
        desc.reject_label("le")?;
        if buckets.is_empty() {
            return Err(HttpScopeError::InvalidMetric(format!(
                "{name}: histogram needs at least one bucket"
            )));
        }
        if buckets.iter().any(|b| !b.is_finite()) {
            return Err(HttpScopeError::InvalidMetric(format!(
                "{name}: bucket bounds must be finite"
            )));
        }
        if buckets.windows(2).any(|w| matches!(w, [a, b] if a >= b)) {
            return Err(HttpScopeError::InvalidMetric(format!(
                "{name}: bucket bounds must be strictly ascending"
            )));
        }
        Ok(Self {
            family: Arc::new(Family::new(desc)),
            bounds: Arc::from(buckets),
        })
    }

    pub fn desc(&self) -> &Desc {
        self.family.desc()
    }

    /// Series for the given label values, created on first use.
    pub fn with_label_values(&self, values: &[&str]) -> Result<Histogram> {
        let bounds = Arc::clone(&self.bounds);
        self.family
            .get_or_create(values, move || HistogramCell::new(bounds))
            .map(Histogram)
    }

    /// Render in Prometheus text exposition format.
    pub(crate) fn render(&self, out: &mut String) {
        self.family.write_header(MetricKind::Histogram, out);
        let name = self.family.desc().name();
        for (values, cell) in self.family.sorted_series() {
            let snap = cell.snapshot();
            for (le, count) in &snap.buckets {
                let le = format_value(*le);
                let labels = self.family.label_block(&values, Some(("le", le.as_str())));
                let _ = writeln!(out, "{}_bucket{} {}", name, labels, count);
            }
            let inf = self.family.label_block(&values, Some(("le", "+Inf")));
            let _ = writeln!(out, "{}_bucket{} {}", name, inf, snap.count);

            let labels = self.family.label_block(&values, None);
            let _ = writeln!(out, "{}_sum{} {}", name, labels, format_value(snap.sum));
            let _ = writeln!(out, "{}_count{} {}", name, labels, snap.count);
        }
    }
}
