// It's important to use the exported crate `prometheus_exporter::prometheus`
// instead of `prometheus`, as different versions of that crate have
// incompatible global registries.
use prometheus_exporter::prometheus;

/// Counters are labelled with the table of the derived records they refer
/// to, e.g. `token_supply`.
pub struct PrometheusMetrics {
    pub backfill_records_created: prometheus::IntCounterVec,
    pub backfill_failures: prometheus::IntCounterVec,
}

impl PrometheusMetrics {
    /// Registers the metrics with `registry`. Registering them twice with the
    /// same registry fails.
    pub fn new(registry: prometheus::Registry) -> prometheus::Result<Self> {
        let backfill_records_created = prometheus::register_int_counter_vec_with_registry!(
            "backfill_records_created",
            "Number of derived records created by backfill passes",
            &["table"],
            registry
        )?;
        let backfill_failures = prometheus::register_int_counter_vec_with_registry!(
            "backfill_failures",
            "Number of blocks for which a derived record couldn't be created",
            &["table"],
            registry
        )?;

        Ok(Self {
            backfill_records_created,
            backfill_failures,
        })
    }
}
