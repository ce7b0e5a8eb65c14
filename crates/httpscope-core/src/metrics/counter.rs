use std::fmt::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::error::Result;

use super::{Desc, Family, MetricKind};

/// One counter series. Cloning shares the underlying value.
#[derive(Debug, Clone)]
pub struct Counter(Arc<AtomicU64>);

impl Counter {
    /// Increment by 1.
    pub fn inc(&self) {
        self.inc_by(1);
    }

    /// Increment by an arbitrary value.
    pub fn inc_by(&self, v: u64) {
        self.0.fetch_add(v, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Monotonic counter instrument, optionally labeled.
#[derive(Clone)]
pub struct CounterVec {
    family: Arc<Family<AtomicU64>>,
}

impl CounterVec {
    pub fn new(name: &str, help: &str, label_names: &[&str]) -> Result<Self> {
        Ok(Self {
            family: Arc::new(Family::new(Desc::new(name, help, label_names)?)),
        })
    }

    pub fn desc(&self) -> &Desc {
        self.family.desc()
    }

    /// Series for the given label values, created on first use.
    pub fn with_label_values(&self, values: &[&str]) -> Result<Counter> {
        self.family
            .get_or_create(values, AtomicU64::default)
            .map(Counter)
    }

    /// Render in Prometheus text exposition format.
    pub(crate) fn render(&self, out: &mut String) {
        self.family.write_header(MetricKind::Counter, out);
        let name = self.family.desc().name();
        for (values, value) in self.family.sorted_series() {
            let labels = self.family.label_block(&values, None);
            let _ = writeln!(out, "{}{} {}", name, labels, value.load(Ordering::Relaxed));
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn series_are_independent() {
        let vec = CounterVec::new("http_errors_total", "Errors", &["status"]).unwrap();
        vec.with_label_values(&["500"]).unwrap().inc();
        vec.with_label_values(&["500"]).unwrap().inc_by(2);
        vec.with_label_values(&["404"]).unwrap().inc();

        assert_eq!(vec.with_label_values(&["500"]).unwrap().get(), 3);
        assert_eq!(vec.with_label_values(&["404"]).unwrap().get(), 1);
    }

    #[test]
    fn renders_sorted_series() {
        let vec = CounterVec::new("hits_total", "Hits", &["path"]).unwrap();
        vec.with_label_values(&["/b"]).unwrap().inc();
        vec.with_label_values(&["/a"]).unwrap().inc_by(4);

        let mut out = String::new();
        vec.render(&mut out);
        assert_eq!(
            out,
            "# HELP hits_total Hits\n\
             # TYPE hits_total counter\n\
             hits_total{path=\"/a\"} 4\n\
             hits_total{path=\"/b\"} 1\n"
        );
    }

    #[test]
    fn unlabeled_counter_renders_without_braces() {
        let vec = CounterVec::new("plain_total", "Plain", &[]).unwrap();
        vec.with_label_values(&[]).unwrap().inc();

        let mut out = String::new();
        vec.render(&mut out);
        assert!(out.ends_with("plain_total 1\n"));
    }

    #[test]
    fn concurrent_increments_are_not_lost() {
        let vec = CounterVec::new("c_total", "C", &["k"]).unwrap();
        std::thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| {
                    for _ in 0..1000 {
                        vec.with_label_values(&["v"]).unwrap().inc();
                    }
                });
            }
        });
        assert_eq!(vec.with_label_values(&["v"]).unwrap().get(), 8000);
    }
}
