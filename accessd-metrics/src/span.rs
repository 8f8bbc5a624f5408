use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use crate::open_metric::{Measurement, OpenMetric};

/// A begin/cancel/end timer, matching the coordinator's metric contract
/// (spec §4.3/§4.4: `ConfigurationRefresh` span, per-operation spans,
/// `EventBatchReadTime`/`EventBatchWriteTime`/`EventDeleteTime`).
///
/// `begin()` returns a start marker; the caller must route it to exactly
/// one of `end()` (success — records a duration and bumps the completed
/// count) or `cancel()` (failure — bumps the cancelled count only, no
/// duration is recorded since the operation never finished).
#[derive(Debug, Default)]
pub struct Span {
    name: &'static str,
    help: &'static str,
    enabled: bool,
    last_duration_millis: AtomicU64,
    completed: AtomicU64,
    cancelled: AtomicU64,
}

impl Span {
    pub const fn new(name: &'static str, help: &'static str, enabled: bool) -> Self {
        Self {
            name,
            help,
            enabled,
            last_duration_millis: AtomicU64::new(0),
            completed: AtomicU64::new(0),
            cancelled: AtomicU64::new(0),
        }
    }

    pub fn begin(&self) -> Instant {
        Instant::now()
    }

    pub fn end(&self, start: Instant) {
        if !self.enabled {
            return;
        }
        let millis = start.elapsed().as_millis() as u64;
        self.last_duration_millis.store(millis, Ordering::Relaxed);
        self.completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn cancel(&self) {
        if !self.enabled {
            return;
        }
        self.cancelled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::Relaxed)
    }

    pub fn cancelled(&self) -> u64 {
        self.cancelled.load(Ordering::Relaxed)
    }

    pub fn last_duration_millis(&self) -> u64 {
        self.last_duration_millis.load(Ordering::Relaxed)
    }
}

impl OpenMetric for Span {
    fn name(&self) -> String {
        self.name.to_string()
    }

    fn help(&self) -> Option<String> {
        Some(self.help.to_string())
    }

    fn measurements(&self) -> Vec<Measurement> {
        vec![
            Measurement::new(self.last_duration_millis() as f64).with_label("stat", "last_duration_ms"),
            Measurement::new(self.completed() as f64).with_label("stat", "completed_total"),
            Measurement::new(self.cancelled() as f64).with_label("stat", "cancelled_total"),
        ]
    }
}

/// Runs `f`, routing the span to `end`/`cancel` based on the result, and
/// returns `f`'s result unchanged.
pub fn timed<T, E>(span: &Span, f: impl FnOnce() -> Result<T, E>) -> Result<T, E> {
    let start = span.begin();
    let result = f();
    match &result {
        Ok(_) => span.end(start),
        Err(_) => span.cancel(),
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn end_records_completion_without_touching_cancelled() {
        let span = Span::new("test_span", "a test span", true);
        let start = span.begin();
        span.end(start);
        assert_eq!(span.completed(), 1);
        assert_eq!(span.cancelled(), 0);
    }

    #[test]
    fn cancel_records_cancellation_only() {
        let span = Span::new("test_span", "a test span", true);
        span.begin();
        span.cancel();
        assert_eq!(span.completed(), 0);
        assert_eq!(span.cancelled(), 1);
    }

    #[test]
    fn timed_routes_based_on_result() {
        let span = Span::new("test_span", "a test span", true);
        let _: Result<(), &str> = timed(&span, || Ok(()));
        let _: Result<(), &str> = timed(&span, || Err("boom"));
        assert_eq!(span.completed(), 1);
        assert_eq!(span.cancelled(), 1);
    }

    #[test]
    fn disabled_span_records_nothing() {
        let span = Span::new("test_span", "a test span", false);
        let start = span.begin();
        span.end(start);
        span.cancel();
        assert_eq!(span.completed(), 0);
        assert_eq!(span.cancelled(), 0);
    }
}
