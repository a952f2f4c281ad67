pub(crate) mod metrics;
pub(crate) mod structured_log;
pub(crate) mod tracing;

use std::sync::Arc;

use anyhow::Result;
use prometheus::{Encoder, Registry, TextEncoder};

pub use self::metrics::Metrics;
pub use self::tracing::{LogFormat, init as init_tracing};

/// Telemetry（メトリクスとトレーシング）を管理する構造体。
#[derive(Debug, Clone)]
pub struct Telemetry {
    registry: Arc<Registry>,
    metrics: Arc<Metrics>,
}

impl Telemetry {
    /// 新しいTelemetryインスタンスを作成し、トレーシングとメトリクスを初期化する。
    ///
    /// # Errors
    /// サブスクライバまたはメトリクスの初期化に失敗した場合はエラーを返す。
    pub fn new(format: LogFormat) -> Result<Self> {
        tracing::init(format)?;
        Self::metrics_only()
    }

    /// トレーシングを初期化せずにメトリクスだけを用意する。
    ///
    /// # Errors
    /// メトリクスの登録に失敗した場合はエラーを返す。
    pub fn metrics_only() -> Result<Self> {
        let registry = Arc::new(Registry::new());
        let metrics = Arc::new(Metrics::new(&registry)?);
        Ok(Self { registry, metrics })
    }

    /// メトリクスへのアクセスを提供する。
    #[must_use]
    pub fn metrics(&self) -> Arc<Metrics> {
        Arc::clone(&self.metrics)
    }

    /// Prometheusメトリクスをレンダリングする。
    #[must_use]
    pub fn render_prometheus(&self) -> String {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer).ok();
        String::from_utf8(buffer).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_includes_registered_metrics() {
        let telemetry = Telemetry::metrics_only().expect("telemetry");
        telemetry.metrics().vocabulary_size.set(42.0);
        let rendered = telemetry.render_prometheus();
        assert!(rendered.contains("headline_vocabulary_size 42"));
    }
}
