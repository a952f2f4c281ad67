/// Prometheusメトリクス定義。
use prometheus::{
    Counter, Gauge, Histogram, HistogramOpts, Registry, register_counter_with_registry,
    register_gauge_with_registry, register_histogram_with_registry,
};

/// メトリクスコレクター。
#[derive(Debug, Clone)]
pub struct Metrics {
    // カウンター
    pub documents_vectorized: Counter,
    pub clustering_runs: Counter,
    pub kmeans_restarts: Counter,
    pub regression_fits: Counter,
    pub pipeline_failures: Counter,

    // ヒストグラム
    pub vectorize_duration: Histogram,
    pub clustering_duration: Histogram,
    pub kmeans_iterations: Histogram,
    pub regression_fit_duration: Histogram,

    // ゲージ
    pub vocabulary_size: Gauge,
    pub matrix_nnz: Gauge,
    pub kmeans_inertia: Gauge,
}

impl Metrics {
    /// 新しいメトリクスコレクターを作成し、`registry` に登録する。
    ///
    /// # Errors
    /// 同名のメトリクスが既に登録されている場合はエラーを返す。
    pub fn new(registry: &Registry) -> Result<Self, prometheus::Error> {
        Ok(Self {
            documents_vectorized: register_counter_with_registry!(
                "headline_documents_vectorized_total",
                "Total number of documents vectorized",
                registry
            )?,
            clustering_runs: register_counter_with_registry!(
                "headline_clustering_runs_total",
                "Total number of completed clustering fits",
                registry
            )?,
            kmeans_restarts: register_counter_with_registry!(
                "headline_kmeans_restarts_total",
                "Total number of k-means restarts executed",
                registry
            )?,
            regression_fits: register_counter_with_registry!(
                "headline_regression_fits_total",
                "Total number of regression models fitted",
                registry
            )?,
            pipeline_failures: register_counter_with_registry!(
                "headline_pipeline_failures_total",
                "Total number of pipeline runs rejected by input validation",
                registry
            )?,
            vectorize_duration: register_histogram_with_registry!(
                HistogramOpts::new(
                    "headline_vectorize_duration_seconds",
                    "Duration of TF-IDF vectorization"
                ),
                registry
            )?,
            clustering_duration: register_histogram_with_registry!(
                HistogramOpts::new(
                    "headline_clustering_duration_seconds",
                    "Duration of a k-means fit across all restarts"
                ),
                registry
            )?,
            kmeans_iterations: register_histogram_with_registry!(
                HistogramOpts::new(
                    "headline_kmeans_iterations",
                    "Iterations taken by the winning k-means restart"
                )
                .buckets(vec![1.0, 2.0, 5.0, 10.0, 20.0, 50.0, 100.0, 300.0]),
                registry
            )?,
            regression_fit_duration: register_histogram_with_registry!(
                HistogramOpts::new(
                    "headline_regression_fit_duration_seconds",
                    "Duration of fitting one regression model"
                ),
                registry
            )?,
            vocabulary_size: register_gauge_with_registry!(
                "headline_vocabulary_size",
                "Number of terms in the most recent vocabulary",
                registry
            )?,
            matrix_nnz: register_gauge_with_registry!(
                "headline_matrix_nonzero_entries",
                "Stored entries in the most recent term-document matrix",
                registry
            )?,
            kmeans_inertia: register_gauge_with_registry!(
                "headline_kmeans_inertia",
                "Inertia of the most recent clustering",
                registry
            )?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registers_every_metric_once() {
        let registry = Registry::new();
        let metrics = Metrics::new(&registry).expect("metrics");
        metrics.documents_vectorized.inc_by(3.0);
        assert_eq!(metrics.documents_vectorized.get(), 3.0);
        assert!(Metrics::new(&registry).is_err());
    }
}
