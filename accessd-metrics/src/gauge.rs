use std::sync::atomic::{AtomicI64, Ordering};

use crate::open_metric::{Measurement, OpenMetric};

/// A point-in-time value (e.g. `WriterNodeEventProcessingCount`).
#[derive(Debug, Default)]
pub struct Gauge {
    name: &'static str,
    help: &'static str,
    enabled: bool,
    value: AtomicI64,
}

impl Gauge {
    pub const fn new(name: &'static str, help: &'static str, enabled: bool) -> Self {
        Self {
            name,
            help,
            enabled,
            value: AtomicI64::new(0),
        }
    }

    pub fn set(&self, value: i64) {
        if !self.enabled {
            return;
        }
        self.value.store(value, Ordering::Relaxed);
    }

    pub fn get(&self) -> i64 {
        self.value.load(Ordering::Relaxed)
    }
}

impl OpenMetric for Gauge {
    fn name(&self) -> String {
        self.name.to_string()
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
    fn set_overwrites_previous_value() {
        let gauge = Gauge::new("test_gauge", "a test gauge", true);
        gauge.set(3);
        gauge.set(0);
        assert_eq!(gauge.get(), 0);
    }

    #[test]
    fn disabled_gauge_ignores_set() {
        let gauge = Gauge::new("test_gauge", "a test gauge", false);
        gauge.set(3);
        assert_eq!(gauge.get(), 0);
    }
}
