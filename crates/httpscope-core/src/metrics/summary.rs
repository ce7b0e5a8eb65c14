use std::collections::VecDeque;
use std::fmt::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::error::{HttpScopeError, Result};

use super::{format_value, AtomicF64, Desc, Family, MetricKind};

/// Quantiles reported when none are configured.
pub const DEFAULT_QUANTILES: [f64; 3] = [0.5, 0.9, 0.99];

/// Samples kept per series when no window is configured.
pub const DEFAULT_WINDOW: usize = 1024;

/// Summary options: which quantiles to report and how many recent samples
/// each series keeps to estimate them.
#[derive(Debug, Clone)]
pub struct SummaryOpts {
    pub quantiles: Vec<f64>,
    pub window: usize,
}

impl Default for SummaryOpts {
    fn default() -> Self {
        Self {
            quantiles: DEFAULT_QUANTILES.to_vec(),
            window: DEFAULT_WINDOW,
        }
    }
}

/// Count and sum cover every observation; quantiles are estimated over the
/// most recent `window` samples.
#[derive(Debug)]
pub(crate) struct SummaryCell {
    recent: Mutex<VecDeque<f64>>,
    window: usize,
    count: AtomicU64,
    sum: AtomicF64,
}

impl SummaryCell {
    fn new(window: usize) -> Self {
        Self {
            recent: Mutex::new(VecDeque::with_capacity(window.min(DEFAULT_WINDOW))),
            window,
            count: AtomicU64::new(0),
            sum: AtomicF64::default(),
        }
    }

    fn observe(&self, v: f64) {
        {
            let mut recent = self.recent.lock().unwrap_or_else(PoisonError::into_inner);
            if recent.len() == self.window {
                recent.pop_front();
            }
            recent.push_back(v);
        }
        self.count.fetch_add(1, Ordering::Relaxed);
        self.sum.fetch_add(v);
    }

    fn snapshot(&self, quantiles: &[f64]) -> SummarySnapshot {
        let mut samples: Vec<f64> = {
            let recent = self.recent.lock().unwrap_or_else(PoisonError::into_inner);
            recent.iter().copied().collect()
        };
        samples.sort_by(f64::total_cmp);
        SummarySnapshot {
            quantiles: quantiles
                .iter()
                .map(|q| (*q, nearest_rank(&samples, *q)))
                .collect(),
            sum: self.sum.load(),
            count: self.count.load(Ordering::Relaxed),
        }
    }
}

/// Nearest-rank quantile over sorted samples; NaN when there are none.
fn nearest_rank(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }
    let rank = (q * sorted.len() as f64).ceil() as usize;
    let idx = rank.saturating_sub(1).min(sorted.len() - 1);
    sorted.get(idx).copied().unwrap_or(f64::NAN)
}

/// Point-in-time view of one summary series.
#[derive(Debug, Clone, PartialEq)]
pub struct SummarySnapshot {
    /// `(quantile, estimate)` pairs in configured order.
    pub quantiles: Vec<(f64, f64)>,
    pub sum: f64,
    pub count: u64,
}

/// One summary series.
#[derive(Debug, Clone)]
pub struct Summary {
    cell: Arc<SummaryCell>,
    quantiles: Arc<[f64]>,
}

impl Summary {
    pub fn observe(&self, v: f64) {
        self.cell.observe(v);
    }

    pub fn snapshot(&self) -> SummarySnapshot {
        self.cell.snapshot(&self.quantiles)
    }
}

/// Quantile summary instrument, optionally labeled.
#[derive(Clone)]
pub struct SummaryVec {
    family: Arc<Family<SummaryCell>>,
    quantiles: Arc<[f64]>,
    window: usize,
}

impl SummaryVec {
    pub fn new(name: &str, help: &str, label_names: &[&str], opts: SummaryOpts) -> Result<Self> {
        let desc = Desc::new(name, help, label_names)?;
        desc.reject_label("quantile")?;
        if opts.window == 0 {
            return Err(HttpScopeError::InvalidMetric(format!(
                "{name}: summary window must be at least 1"
            )));
        }
        if opts.quantiles.iter().any(|q| !(0.0..=1.0).contains(q)) {
            return Err(HttpScopeError::InvalidMetric(format!(
                "{name}: quantiles must lie in [0, 1]"
            )));
        }
        Ok(Self {
            family: Arc::new(Family::new(desc)),
            quantiles: Arc::from(opts.quantiles),
            window: opts.window,
        })
    }

    pub fn desc(&self) -> &Desc {
        self.family.desc()
    }

    /// Series for the given label values, created on first use.
    pub fn with_label_values(&self, values: &[&str]) -> Result<Summary> {
        let window = self.window;
        let cell = self
            .family
            .get_or_create(values, move || SummaryCell::new(window))?;
        Ok(Summary {
            cell,
            quantiles: Arc::clone(&self.quantiles),
        })
    }

    /// Render in Prometheus text exposition format.
    pub(crate) fn render(&self, out: &mut String) {
        self.family.write_header(MetricKind::Summary, out);
        let name = self.family.desc().name();
        for (values, cell) in self.family.sorted_series() {
            let snap = cell.snapshot(&self.quantiles);
            for (q, estimate) in &snap.quantiles {
                let q = format_value(*q);
                let labels = self.family.label_block(&values, Some(("quantile", q.as_str())));
                let _ = writeln!(out, "{}{} {}", name, labels, format_value(*estimate));
            }
            let labels = self.family.label_block(&values, None);
            let _ = writeln!(out, "{}_sum{} {}", name, labels, format_value(snap.sum));
            let _ = writeln!(out, "{}_count{} {}", name, labels, snap.count);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn rejects_bad_options() {
        let zero = SummaryOpts {
            window: 0,
            ..SummaryOpts::default()
        };
        assert!(SummaryVec::new("s", "s", &[], zero).is_err());
        let bad_q = SummaryOpts {
            quantiles: vec![1.5],
            window: 10,
        };
        assert!(SummaryVec::new("s", "s", &[], bad_q).is_err());
        assert!(SummaryVec::new("s", "s", &["quantile"], SummaryOpts::default()).is_err());
    }

    #[test]
    fn nearest_rank_quantiles() {
        let s = SummaryVec::new("d", "D", &[], SummaryOpts::default())
            .unwrap()
            .with_label_values(&[])
            .unwrap();
        for v in 1..=100 {
            s.observe(v as f64);
        }
        let snap = s.snapshot();
        assert_eq!(snap.quantiles, vec![(0.5, 50.0), (0.9, 90.0), (0.99, 99.0)]);
        assert_eq!(snap.count, 100);
        assert_eq!(snap.sum, 5050.0);
    }

    #[test]
    fn window_keeps_only_recent_samples() {
        let opts = SummaryOpts {
            quantiles: vec![0.0, 1.0],
            window: 3,
        };
        let s = SummaryVec::new("d", "D", &[], opts)
            .unwrap()
            .with_label_values(&[])
            .unwrap();
        for v in [100.0, 1.0, 2.0, 3.0] {
            s.observe(v);
        }
        let snap = s.snapshot();
        assert_eq!(snap.quantiles, vec![(0.0, 1.0), (1.0, 3.0)]);
        assert_eq!(snap.count, 4);
        assert_eq!(snap.sum, 106.0);
    }

    #[test]
    fn empty_series_renders_nan_quantiles() {
        let vec = SummaryVec::new("lat", "Latency", &["path"], SummaryOpts::default()).unwrap();
        vec.with_label_values(&["/a"]).unwrap();
        let mut out = String::new();
        vec.render(&mut out);
        assert!(out.contains("# TYPE lat summary\n"));
        assert!(out.contains("lat{path=\"/a\",quantile=\"0.5\"} NaN\n"));
        assert!(out.contains("lat_sum{path=\"/a\"} 0\n"));
        assert!(out.contains("lat_count{path=\"/a\"} 0\n"));
    }
}
