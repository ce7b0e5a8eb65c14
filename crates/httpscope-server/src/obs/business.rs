//! Hooks for business handlers. The core never infers these from responses;
//! handlers call them explicitly.

use httpscope_core::error::Result;
use httpscope_core::metrics::{Counter, Histogram};
use httpscope_core::Registry;

pub const RANDOM_VALUE_BUCKETS: [f64; 11] = [
    0.0, 10.0, 20.0, 30.0, 40.0, 50.0, 60.0, 70.0, 80.0, 90.0, 100.0,
];

pub struct BusinessMetrics {
    generated: Counter,
    failed: Counter,
    value: Histogram,
}

impl BusinessMetrics {
    pub fn register(registry: &Registry) -> Result<Self> {
        Ok(Self {
            generated: registry
                .register_counter(
                    "random_number_generated_total",
                    "Total number of random numbers generated",
                    &[],
                )?
                .with_label_values(&[])?,
            failed: registry
                .register_counter(
                    "random_number_failed_total",
                    "Total number of failed random number generations",
                    &[],
                )?
                .with_label_values(&[])?,
            value: registry
                .register_histogram(
                    "random_number_value",
                    "Distribution of generated random number values",
                    &[],
                    &RANDOM_VALUE_BUCKETS,
                )?
                .with_label_values(&[])?,
        })
    }

    /// Count a generated value and record it in the value distribution.
    pub fn record_generated(&self, value: u32) {
        self.generated.inc();
        self.value.observe(f64::from(value));
    }

    pub fn record_failed(&self) {
        self.failed.inc();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn hooks_feed_their_instruments() {
        let registry = Registry::new();
        let business = BusinessMetrics::register(&registry).unwrap();
        business.record_generated(7);
        business.record_generated(93);
        business.record_failed();

        assert_eq!(registry.counter("random_number_generated_total", &[]).unwrap().get(), 2);
        assert_eq!(registry.counter("random_number_failed_total", &[]).unwrap().get(), 1);
        let snap = registry.histogram("random_number_value", &[]).unwrap().snapshot();
        assert_eq!(snap.count, 2);
        assert_eq!(snap.sum, 100.0);
        assert_eq!(snap.buckets.iter().find(|b| b.0 == 10.0).map(|b| b.1), Some(1));
    }
}
