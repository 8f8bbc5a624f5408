use std::sync::atomic::{AtomicU64, Ordering};

use crate::open_metric::{Measurement, OpenMetric};

/// A monotonically increasing named counter (e.g. `ConfigurationRefreshed`,
/// `EventProcessingCountCheckRetried`).
#[derive(Debug, Default)]
pub struct Counter {
    name: &'static str,
    help: &'static str,
    enabled: bool,
    value: AtomicU64,
}

impl Counter {
    pub const fn new(name: &'static str, help: &'static str, enabled: bool) -> Self {
        Self {
            name,
            help,
            enabled,
            value: AtomicU64::new(0),
        }
    }

    pub fn increment(&self) {
        if !self.enabled {
            return;
        }
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

impl OpenMetric for Counter {
    fn name(&self) -> String {
        self.name.to_string()
    }

    fn metric_type(&self) -> &'static str {
        "counter"
    }

    fn help(&self) -> Option<String> {
        Some(self.help.to_string())
    }

    fn measurements(&self) -> Vec<Measurement> {
        vec![Measurement::new(self.get() as f64)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn increments_are_visible() {
        let counter = Counter::new("test_counter", "a test counter", true);
        assert_eq!(counter.get(), 0);
        counter.increment();
        counter.increment();
        assert_eq!(counter.get(), 2);
    }

    #[test]
    fn disabled_counter_ignores_increments() {
        let counter = Counter::new("test_counter", "a test counter", false);
        counter.increment();
        assert_eq!(counter.get(), 0);
    }
}
