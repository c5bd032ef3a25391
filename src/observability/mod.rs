// Observability: metrics recording and the optional Prometheus exporter

pub mod metrics;

pub use metrics::{init_exporter, MetricName};
