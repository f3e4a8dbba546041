pub mod backfill;
pub mod config;
mod prometheus_metrics;

#[cfg(any(test, feature = "tests"))]
pub mod test_utils;

pub use prometheus_metrics::PrometheusMetrics;
