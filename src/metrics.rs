use axum::{routing::get, Router};
use metrics::{describe_counter, describe_gauge, describe_histogram, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

/// One-time metrics registration (so series show up on /metrics).
pub fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("news_accepted_total", "Items accepted into the window.");
        describe_counter!(
            "news_rejected_duplicate_total",
            "Pushes rejected by the similarity deduplicator."
        );
        describe_counter!(
            "news_rejected_classify_total",
            "Pushes rejected because classification failed."
        );
        describe_counter!(
            "news_swept_total",
            "Expired items physically removed by the sweep."
        );
        describe_gauge!("news_active_items", "Items in the store after last sweep.");
        describe_gauge!("dedup_cached_texts", "Texts held by the dedup cache.");
        describe_histogram!("classify_ms", "External classifier call latency in ms.");
    });
}

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Initialize Prometheus recorder and expose a static gauge for the
    /// configured retention window.
    pub fn init(retention_secs: u64) -> Self {
        // Use default buckets to avoid API differences across crate versions.
        let builder = PrometheusBuilder::new();

        let handle = builder
            .install_recorder()
            .expect("prometheus: install recorder");

        ensure_metrics_described();
        gauge!("news_retention_window_secs").set(retention_secs as f64);

        Self { handle }
    }

    /// Returns a router exposing `/metrics` with the Prometheus exposition format.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}
