//! Name-keyed registry of instruments.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::error::{HttpScopeError, Result};

use super::{
    Counter, CounterVec, Desc, Gauge, GaugeVec, Histogram, HistogramVec, MetricKind, Summary,
    SummaryOpts, SummaryVec,
};

/// Any registered instrument.
#[derive(Clone)]
pub enum Collector {
    Counter(CounterVec),
    Gauge(GaugeVec),
    Histogram(HistogramVec),
    Summary(SummaryVec),
}

impl Collector {
    pub fn desc(&self) -> &Desc {
        match self {
            Collector::Counter(v) => v.desc(),
            Collector::Gauge(v) => v.desc(),
            Collector::Histogram(v) => v.desc(),
            Collector::Summary(v) => v.desc(),
        }
    }

    pub fn kind(&self) -> MetricKind {
        match self {
            Collector::Counter(_) => MetricKind::Counter,
            Collector::Gauge(_) => MetricKind::Gauge,
            Collector::Histogram(_) => MetricKind::Histogram,
            Collector::Summary(_) => MetricKind::Summary,
        }
    }

    fn render(&self, out: &mut String) {
        match self {
            Collector::Counter(v) => v.render(out),
            Collector::Gauge(v) => v.render(out),
            Collector::Histogram(v) => v.render(out),
            Collector::Summary(v) => v.render(out),
        }
    }

    fn mismatch(&self, expected: MetricKind) -> HttpScopeError {
        HttpScopeError::KindMismatch {
            name: self.desc().name().to_owned(),
            expected: expected.as_str(),
            actual: self.kind().as_str(),
        }
    }
}

impl From<CounterVec> for Collector {
    fn from(v: CounterVec) -> Self {
        Collector::Counter(v)
    }
}

impl From<GaugeVec> for Collector {
    fn from(v: GaugeVec) -> Self {
        Collector::Gauge(v)
    }
}

impl From<HistogramVec> for Collector {
    fn from(v: HistogramVec) -> Self {
        Collector::Histogram(v)
    }
}

impl From<SummaryVec> for Collector {
    fn from(v: SummaryVec) -> Self {
        Collector::Summary(v)
    }
}

/// Owner of every instrument in the process.
///
/// Construct one at startup and hand it (behind an `Arc`) to whatever records
/// or renders. Tests build a fresh one each.
#[derive(Default)]
pub struct Registry {
    families: DashMap<String, Collector>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an instrument. A name that is already taken is a wiring defect and
    /// is reported as `DuplicateMetric`.
    pub fn register(&self, collector: impl Into<Collector>) -> Result<()> {
        let collector = collector.into();
        let name = collector.desc().name().to_owned();
        match self.families.entry(name) {
            Entry::Occupied(e) => Err(HttpScopeError::DuplicateMetric(e.key().clone())),
            Entry::Vacant(e) => {
                tracing::debug!(metric = %e.key(), kind = collector.kind().as_str(), "metric registered");
                e.insert(collector);
                Ok(())
            }
        }
    }

    pub fn register_counter(&self, name: &str, help: &str, labels: &[&str]) -> Result<CounterVec> {
        let vec = CounterVec::new(name, help, labels)?;
        self.register(vec.clone())?;
        Ok(vec)
    }

    pub fn register_gauge(&self, name: &str, help: &str, labels: &[&str]) -> Result<GaugeVec> {
        let vec = GaugeVec::new(name, help, labels)?;
        self.register(vec.clone())?;
        Ok(vec)
    }

    pub fn register_histogram(
        &self,
        name: &str,
        help: &str,
        labels: &[&str],
        buckets: &[f64],
    ) -> Result<HistogramVec> {
        let vec = HistogramVec::new(name, help, labels, buckets)?;
        self.register(vec.clone())?;
        Ok(vec)
    }

    pub fn register_summary(
        &self,
        name: &str,
        help: &str,
        labels: &[&str],
        opts: SummaryOpts,
    ) -> Result<SummaryVec> {
        let vec = SummaryVec::new(name, help, labels, opts)?;
        self.register(vec.clone())?;
        Ok(vec)
    }

    fn lookup(&self, name: &str) -> Result<Collector> {
        self.families
            .get(name)
            .map(|c| c.value().clone())
            .ok_or_else(|| HttpScopeError::UnknownMetric(name.to_owned()))
    }

    /// Counter series by metric name and label values.
    pub fn counter(&self, name: &str, values: &[&str]) -> Result<Counter> {
        match self.lookup(name)? {
            Collector::Counter(v) => v.with_label_values(values),
            other => Err(other.mismatch(MetricKind::Counter)),
        }
    }

    /// Gauge series by metric name and label values.
    pub fn gauge(&self, name: &str, values: &[&str]) -> Result<Gauge> {
        match self.lookup(name)? {
            Collector::Gauge(v) => v.with_label_values(values),
            other => Err(other.mismatch(MetricKind::Gauge)),
        }
    }

    /// Histogram series by metric name and label values.
    pub fn histogram(&self, name: &str, values: &[&str]) -> Result<Histogram> {
        match self.lookup(name)? {
            Collector::Histogram(v) => v.with_label_values(values),
            other => Err(other.mismatch(MetricKind::Histogram)),
        }
    }

    /// Summary series by metric name and label values.
    pub fn summary(&self, name: &str, values: &[&str]) -> Result<Summary> {
        match self.lookup(name)? {
            Collector::Summary(v) => v.with_label_values(values),
            other => Err(other.mismatch(MetricKind::Summary)),
        }
    }

    /// Registered metric names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.families.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// Render every instrument in Prometheus text exposition format.
    ///
    /// Families are ordered by name and series by label values. Each series is
    /// read atomically on its own; the snapshot as a whole is not.
    pub fn render(&self) -> String {
        let mut collectors: Vec<Collector> =
            self.families.iter().map(|e| e.value().clone()).collect();
        collectors.sort_by(|a, b| a.desc().name().cmp(b.desc().name()));

        let mut out = String::new();
        for collector in &collectors {
            collector.render(&mut out);
        }
        out
    }
}
