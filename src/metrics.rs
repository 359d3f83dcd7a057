use metrics::gauge;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Initialize the Prometheus recorder and expose a static gauge for the
    /// cache TTL.
    pub fn init(ttl_ms: u64) -> Self {
        // Use default buckets to avoid API differences across crate versions.
        let builder = PrometheusBuilder::new();

        let handle = builder
            .install_recorder()
            .expect("prometheus: install recorder");

        // Static gauge with the configured TTL (absolute, no sliding refresh)
        gauge!("dedup_cache_ttl_ms").set(ttl_ms as f64);

        Self { handle }
    }

    /// Current metrics in Prometheus exposition format; the host dumps this
    /// on shutdown when verbose tracing is on.
    pub fn render(&self) -> String {
        self.handle.render()
    }
}
