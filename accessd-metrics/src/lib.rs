//! Open-metrics-style instrumentation for the coordination layer. No
//! metrics backend or HTTP exposition is bundled here — those are
//! external collaborators per spec §1 — only the registry and the
//! text-rendering function.

pub mod counter;
pub mod gauge;
pub mod open_metric;
pub mod registry;
pub mod span;

pub use counter::Counter;
pub use gauge::Gauge;
pub use open_metric::{render_all, Measurement, OpenMetric};
pub use registry::CoordinatorMetrics;
pub use span::{timed, Span};
