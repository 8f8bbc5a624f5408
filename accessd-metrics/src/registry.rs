use crate::{Counter, Gauge, OpenMetric, Span};

/// The coordinator's full set of named metrics (spec §4.3/§4.4/§4.5).
/// Constructed once and shared (the manager/coordinator/splitter each hold
/// an `Arc<CoordinatorMetrics>` or a reference to one); `enabled` lets a
/// deployment turn emission off entirely via `CoordinatorOptions::metrics_enabled`
/// — it is threaded into every `Span`/`Counter`/`Gauge` at construction, so
/// callers still call the recording methods unconditionally and they just
/// no-op when disabled.
pub struct CoordinatorMetrics {
    enabled: bool,
    pub configuration_refresh: Span,
    pub configuration_refreshed: Counter,
    pub operation: Span,
    pub operation_succeeded: Counter,
    pub event_batch_read: Span,
    pub event_batch_write: Span,
    pub event_delete: Span,
    pub writer_event_processing_count: Gauge,
    pub event_processing_count_check_retried: Counter,
}

impl CoordinatorMetrics {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            configuration_refresh: Span::new(
                "configuration_refresh",
                "time spent swapping in a new shard configuration",
                enabled,
            ),
            configuration_refreshed: Counter::new(
                "configuration_refreshed",
                "number of successful shard configuration refreshes",
                enabled,
            ),
            operation: Span::new("operation", "time spent in a coordinator operation", enabled),
            operation_succeeded: Counter::new(
                "operation_succeeded",
                "number of coordinator operations that succeeded",
                enabled,
            ),
            event_batch_read: Span::new(
                "event_batch_read_time",
                "time spent reading an event batch",
                enabled,
            ),
            event_batch_write: Span::new(
                "event_batch_write_time",
                "time spent writing an event batch to the target shard group",
                enabled,
            ),
            event_delete: Span::new(
                "event_delete_time",
                "time spent deleting events from the source shard group",
                enabled,
            ),
            writer_event_processing_count: Gauge::new(
                "writer_node_event_processing_count",
                "in-flight operation count observed on the source writer node during drain",
                enabled,
            ),
            event_processing_count_check_retried: Counter::new(
                "event_processing_count_check_retried",
                "number of drain polls that observed a non-zero processing count",
                enabled,
            ),
        }
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Every named metric, for rendering (spec: no HTTP exposition is
    /// defined here, only the open-metrics text a host mounts wherever it
    /// wants).
    pub fn all(&self) -> Vec<&dyn OpenMetric> {
        vec![
            &self.configuration_refresh,
            &self.configuration_refreshed,
            &self.operation,
            &self.operation_succeeded,
            &self.event_batch_read,
            &self.event_batch_write,
            &self.event_delete,
            &self.writer_event_processing_count,
            &self.event_processing_count_check_retried,
        ]
    }
}

impl Default for CoordinatorMetrics {
    fn default() -> Self {
        Self::new(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::open_metric::render_all;

    #[test]
    fn renders_every_registered_metric() {
        let metrics = CoordinatorMetrics::new(true);
        metrics.configuration_refreshed.increment();
        let rendered = render_all(&metrics.all());
        assert!(rendered.contains("configuration_refreshed"));
        assert!(rendered.contains("writer_node_event_processing_count"));
    }

    #[test]
    fn disabled_registry_does_not_record() {
        let metrics = CoordinatorMetrics::new(false);
        assert!(!metrics.enabled());

        let start = metrics.operation.begin();
        metrics.operation.end(start);
        metrics.operation_succeeded.increment();
        metrics.writer_event_processing_count.set(7);

        assert_eq!(metrics.operation.completed(), 0);
        assert_eq!(metrics.operation_succeeded.get(), 0);
        assert_eq!(metrics.writer_event_processing_count.get(), 0);
    }
}
