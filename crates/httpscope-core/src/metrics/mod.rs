//! In-process metrics registry with Prometheus text exposition.
//!
//! Instruments are defined once (name, help, label names) and hand out
//! per-label-tuple series lazily. Series live in `DashMap`s keyed by their
//! label values, and each series is its own set of atomics, so writers on
//! different series never contend and a scrape only ever holds one shard
//! lock at a time while it clones the series list.

mod counter;
mod gauge;
mod histogram;
mod registry;
mod summary;

use std::borrow::Borrow;
use std::fmt::Write;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;

use crate::error::{HttpScopeError, Result};

pub use counter::{Counter, CounterVec};
pub use gauge::{Gauge, GaugeVec, InFlightGuard};
pub use histogram::{Histogram, HistogramSnapshot, HistogramVec, DEFAULT_BUCKETS};
pub use registry::{Collector, Registry};
pub use summary::{
    Summary, SummaryOpts, SummarySnapshot, SummaryVec, DEFAULT_QUANTILES, DEFAULT_WINDOW,
};

/// Instrument kind, as written on the `# TYPE` line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    Counter,
    Gauge,
    Histogram,
    Summary,
}

impl MetricKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MetricKind::Counter => "counter",
            MetricKind::Gauge => "gauge",
            MetricKind::Histogram => "histogram",
            MetricKind::Summary => "summary",
        }
    }
}

/// Definition of an instrument: name, help text and ordered label names.
#[derive(Debug, Clone)]
pub struct Desc {
    name: String,
    help: String,
    label_names: Vec<String>,
}

impl Desc {
    /// Validate and build a definition.
    ///
    /// Names follow the exposition grammar: metric names match
    /// `[a-zA-Z_:][a-zA-Z0-9_:]*`, label names match `[a-zA-Z_][a-zA-Z0-9_]*`
    /// and may not start with `__`.
    pub fn new(name: &str, help: &str, label_names: &[&str]) -> Result<Self> {
        if !valid_metric_name(name) {
            return Err(HttpScopeError::InvalidMetric(format!(
                "invalid metric name: {name:?}"
            )));
        }
        let mut seen: Vec<&str> = Vec::with_capacity(label_names.len());
        for label in label_names {
            if !valid_label_name(label) {
                return Err(HttpScopeError::InvalidMetric(format!(
                    "{name}: invalid label name {label:?}"
                )));
            }
            if seen.contains(label) {
                return Err(HttpScopeError::InvalidMetric(format!(
                    "{name}: duplicate label name {label:?}"
                )));
            }
            seen.push(label);
        }
        Ok(Self {
            name: name.to_owned(),
            help: help.to_owned(),
            label_names: label_names.iter().map(|l| (*l).to_owned()).collect(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn help(&self) -> &str {
        &self.help
    }

    pub fn label_names(&self) -> &[String] {
        &self.label_names
    }

    fn reject_label(&self, reserved: &str) -> Result<()> {
        if self.label_names.iter().any(|l| l == reserved) {
            return Err(HttpScopeError::InvalidMetric(format!(
                "{}: label name {reserved:?} is reserved",
                self.name
            )));
        }
        Ok(())
    }
}

fn valid_metric_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == ':' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ':')
}

fn valid_label_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    !name.starts_with("__") && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Ordered label values, viewed either owned or borrowed so lookups of an
/// existing series do not allocate.
pub(crate) trait LabelValues {
    fn arity(&self) -> usize;
    fn value(&self, i: usize) -> &str;
}

/// Owned label values stored as a series key.
#[derive(Debug, Clone)]
pub(crate) struct LabelKey(Vec<String>);

/// Borrowed label values as passed by callers.
struct LabelRef<'a>(&'a [&'a str]);

impl LabelValues for LabelKey {
    fn arity(&self) -> usize {
        self.0.len()
    }
    fn value(&self, i: usize) -> &str {
        &self.0[i]
    }
}

impl LabelValues for LabelRef<'_> {
    fn arity(&self) -> usize {
        self.0.len()
    }
    fn value(&self, i: usize) -> &str {
        self.0[i]
    }
}

impl Hash for dyn LabelValues + '_ {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_usize(self.arity());
        for i in 0..self.arity() {
            self.value(i).hash(state);
        }
    }
}

impl PartialEq for dyn LabelValues + '_ {
    fn eq(&self, other: &Self) -> bool {
        self.arity() == other.arity() && (0..self.arity()).all(|i| self.value(i) == other.value(i))
    }
}

impl Eq for dyn LabelValues + '_ {}

impl Hash for LabelKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (self as &dyn LabelValues).hash(state);
    }
}

impl PartialEq for LabelKey {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for LabelKey {}

impl<'a> Borrow<dyn LabelValues + 'a> for LabelKey {
    fn borrow(&self) -> &(dyn LabelValues + 'a) {
        self
    }
}

/// All series of one instrument, keyed by label values in declaration order.
pub(crate) struct Family<S> {
    desc: Desc,
    series: DashMap<LabelKey, Arc<S>>,
}

impl<S> Family<S> {
    pub(crate) fn new(desc: Desc) -> Self {
        Self {
            desc,
            series: DashMap::new(),
        }
    }

    pub(crate) fn desc(&self) -> &Desc {
        &self.desc
    }

    /// Look up the series for `values`, creating it with `init` on first use.
    pub(crate) fn get_or_create(
        &self,
        values: &[&str],
        init: impl FnOnce() -> S,
    ) -> Result<Arc<S>> {
        let expected = self.desc.label_names.len();
        if values.len() != expected {
            return Err(HttpScopeError::LabelArity {
                metric: self.desc.name.clone(),
                expected,
                got: values.len(),
            });
        }
        let lookup = LabelRef(values);
        if let Some(series) = self.series.get(&lookup as &dyn LabelValues) {
            return Ok(Arc::clone(series.value()));
        }
        let key = LabelKey(values.iter().map(|v| (*v).to_owned()).collect());
        let series = self.series.entry(key).or_insert_with(|| Arc::new(init()));
        Ok(Arc::clone(series.value()))
    }

    /// Clone out every series, sorted by label values.
    pub(crate) fn sorted_series(&self) -> Vec<(Vec<String>, Arc<S>)> {
        let mut all: Vec<(Vec<String>, Arc<S>)> = self
            .series
            .iter()
            .map(|r| (r.key().0.clone(), Arc::clone(r.value())))
            .collect();
        all.sort_by(|a, b| a.0.cmp(&b.0));
        all
    }

    pub(crate) fn write_header(&self, kind: MetricKind, out: &mut String) {
        let _ = writeln!(out, "# HELP {} {}", self.desc.name, escape_help(&self.desc.help));
        let _ = writeln!(out, "# TYPE {} {}", self.desc.name, kind.as_str());
    }

    /// `{a="x",b="y"}` for the given values, plus an optional trailing pair
    /// (`le` / `quantile`). Empty string when there is nothing to print.
    pub(crate) fn label_block(&self, values: &[String], extra: Option<(&str, &str)>) -> String {
        let mut pairs: Vec<String> = self
            .desc
            .label_names
            .iter()
            .zip(values)
            .map(|(k, v)| format!("{}=\"{}\"", k, escape_label(v)))
            .collect();
        if let Some((k, v)) = extra {
            pairs.push(format!("{}=\"{}\"", k, escape_label(v)));
        }
        if pairs.is_empty() {
            String::new()
        } else {
            format!("{{{}}}", pairs.join(","))
        }
    }
}

/// Helper to escape label values.
fn escape_label(v: &str) -> String {
    v.replace('\\', "\\\\").replace('"', "\\\"").replace('\n', "\\n")
}

fn escape_help(v: &str) -> String {
    v.replace('\\', "\\\\").replace('\n', "\\n")
}

/// Format a sample value the way Prometheus clients do.
pub(crate) fn format_value(v: f64) -> String {
    if v.is_nan() {
        "NaN".to_owned()
    } else if v == f64::INFINITY {
        "+Inf".to_owned()
    } else if v == f64::NEG_INFINITY {
        "-Inf".to_owned()
    } else {
        v.to_string()
    }
}

/// f64 stored as bits in an `AtomicU64`.
#[derive(Debug, Default)]
pub(crate) struct AtomicF64(AtomicU64);

impl AtomicF64 {
    pub(crate) fn load(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::Relaxed))
    }

    pub(crate) fn store(&self, v: f64) {
        self.0.store(v.to_bits(), Ordering::Relaxed);
    }

    pub(crate) fn fetch_add(&self, delta: f64) {
        let mut current = self.0.load(Ordering::Relaxed);
        loop {
            let next = (f64::from_bits(current) + delta).to_bits();
            match self
                .0
                .compare_exchange_weak(current, next, Ordering::Relaxed, Ordering::Relaxed)
            {
                Ok(_) => return,
                Err(actual) => current = actual,
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn metric_and_label_names_are_validated() {
        assert!(Desc::new("http_requests_total", "h", &["method", "path"]).is_ok());
        assert!(Desc::new("ns:sub_total", "h", &[]).is_ok());
        assert!(Desc::new("1bad", "h", &[]).is_err());
        assert!(Desc::new("bad-name", "h", &[]).is_err());
        assert!(Desc::new("", "h", &[]).is_err());
        assert!(Desc::new("ok", "h", &["__reserved"]).is_err());
        assert!(Desc::new("ok", "h", &["a:b"]).is_err());

        let err = Desc::new("ok", "h", &["method", "method"]).unwrap_err();
        assert!(err.to_string().contains("duplicate label name"));
    }

    #[test]
    fn values_format_like_prometheus() {
        assert_eq!(format_value(1.0), "1");
        assert_eq!(format_value(0.005), "0.005");
        assert_eq!(format_value(2.5), "2.5");
        assert_eq!(format_value(f64::INFINITY), "+Inf");
        assert_eq!(format_value(f64::NEG_INFINITY), "-Inf");
        assert_eq!(format_value(f64::NAN), "NaN");
    }

    #[test]
    fn label_values_are_escaped() {
        assert_eq!(escape_label(r#"a"b\c"#), r#"a\"b\\c"#);
        assert_eq!(escape_label("x\ny"), "x\\ny");
        assert_eq!(escape_help("line\nnext"), "line\\nnext");
    }

    #[test]
    fn atomic_f64_accumulates() {
        let v = AtomicF64::default();
        v.fetch_add(1.5);
        v.fetch_add(-0.25);
        assert_eq!(v.load(), 1.25);
        v.store(7.0);
        assert_eq!(v.load(), 7.0);
    }

    #[test]
    fn family_rejects_wrong_arity_and_reuses_series() {
        let family: Family<AtomicU64> =
            Family::new(Desc::new("x_total", "h", &["method", "path"]).unwrap());
        let err = family.get_or_create(&["GET"], AtomicU64::default).unwrap_err();
        assert!(matches!(
            err,
            HttpScopeError::LabelArity { expected: 2, got: 1, .. }
        ));

        let a = family.get_or_create(&["GET", "/a"], AtomicU64::default).unwrap();
        a.fetch_add(3, Ordering::Relaxed);
        let again = family.get_or_create(&["GET", "/a"], AtomicU64::default).unwrap();
        assert_eq!(again.load(Ordering::Relaxed), 3);
        assert_eq!(family.sorted_series().len(), 1);
    }

    #[test]
    fn borrowed_and_owned_label_keys_agree() {
        use std::collections::hash_map::DefaultHasher;

        fn hash_of(v: &dyn LabelValues) -> u64 {
            let mut h = DefaultHasher::new();
            v.hash(&mut h);
            h.finish()
        }

        let owned = LabelKey(vec!["GET".into(), "/a".into()]);
        let owned: &dyn LabelValues = &owned;
        let same: &dyn LabelValues = &LabelRef(&["GET", "/a"]);
        let shifted: &dyn LabelValues = &LabelRef(&["GE", "T/a"]);
        assert_eq!(hash_of(owned), hash_of(same));
        assert!(*owned == *same);
        assert!(*owned != *shifted);
    }

    #[test]
    fn existing_series_is_found_without_recreating() {
        let family: Family<AtomicU64> =
            Family::new(Desc::new("y_total", "h", &["code"]).unwrap());
        let first = family.get_or_create(&["200"], AtomicU64::default).unwrap();
        let second = family
            .get_or_create(&["200"], || unreachable!("series already exists"))
            .unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }
}
