//! コーパス読み込みからレポートまでを通しで実行するパイプライン。
//!
//! 中間成果物（語彙・行列・クラスタリング）は [`ClusterRun`] にまとめて返し、
//! 呼び出し側が必要に応じて再利用できるようにする。
use std::fmt;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use thiserror::Error;
use tracing::{info, info_span};

use crate::cluster::{self, Clustering, KMeansConfig};
use crate::config::Config;
use crate::corpus::{CorpusError, CorpusSource};
use crate::error::ClusteringError;
use crate::observability::Metrics;
use crate::regression::{
    Dataset, LinearRegression, RandomForest, RegressionError, Regressor, Ridge, Scores,
    train_test_split,
};
use crate::report::{self, ClusterReport, DEFAULT_TOP_N};
use crate::vectorize::{self, TermDocumentMatrix, VectorizerConfig, Vocabulary};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Corpus(#[from] CorpusError),
    #[error(transparent)]
    Clustering(#[from] ClusteringError),
    #[error(transparent)]
    Regression(#[from] RegressionError),
    #[error("failed to build worker pool")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClusterSettings {
    pub vectorizer: VectorizerConfig,
    pub kmeans: KMeansConfig,
    pub top_n: usize,
    pub workers: NonZeroUsize,
}

impl ClusterSettings {
    /// Default vectorizer and k-means settings for `k` clusters.
    #[must_use]
    pub fn new(k: usize) -> Self {
        Self {
            vectorizer: VectorizerConfig::default(),
            kmeans: KMeansConfig::new(k),
            top_n: DEFAULT_TOP_N,
            workers: NonZeroUsize::new(num_cpus::get()).unwrap_or(NonZeroUsize::MIN),
        }
    }

    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            vectorizer: config.vectorizer(),
            kmeans: config.kmeans(),
            top_n: config.top_n(),
            workers: config.workers(),
        }
    }
}

/// Everything one clustering run produced.
#[derive(Debug, Clone)]
pub struct ClusterRun {
    pub vocabulary: Vocabulary,
    pub matrix: TermDocumentMatrix,
    pub clustering: Clustering,
    pub report: ClusterReport,
}

pub struct ClusterPipeline {
    settings: ClusterSettings,
    metrics: Option<Arc<Metrics>>,
}

impl ClusterPipeline {
    #[must_use]
    pub fn new(settings: ClusterSettings) -> Self {
        Self {
            settings,
            metrics: None,
        }
    }

    #[must_use]
    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    #[must_use]
    pub fn settings(&self) -> &ClusterSettings {
        &self.settings
    }

    /// Loads `source` and clusters its documents.
    ///
    /// # Errors
    /// Returns [`PipelineError::Corpus`] when the source cannot be read, otherwise the
    /// errors of [`ClusterPipeline::run`].
    pub fn run_source(&self, source: &dyn CorpusSource) -> Result<ClusterRun, PipelineError> {
        let documents = source.load()?;
        self.run(&documents)
    }

    /// Vectorizes, clusters and reports `documents`.
    ///
    /// # Errors
    /// Returns [`PipelineError::Clustering`] for empty corpora, empty vocabularies or
    /// invalid parameters, and [`PipelineError::WorkerPool`] when the rayon pool cannot start.
    pub fn run<S: AsRef<str>>(&self, documents: &[S]) -> Result<ClusterRun, PipelineError> {
        let result = self.run_stages(documents);
        if result.is_err() {
            if let Some(metrics) = &self.metrics {
                metrics.pipeline_failures.inc();
            }
        }
        result
    }

    fn run_stages<S: AsRef<str>>(&self, documents: &[S]) -> Result<ClusterRun, PipelineError> {
        let span = info_span!(
            "cluster_pipeline",
            documents = documents.len(),
            k = self.settings.kmeans.k
        );
        let _entered = span.enter();

        let started = Instant::now();
        let (vocabulary, matrix) = vectorize::vectorize(documents, &self.settings.vectorizer)?;
        if let Some(metrics) = &self.metrics {
            metrics.vectorize_duration.observe(started.elapsed().as_secs_f64());
            metrics.documents_vectorized.inc_by(documents.len() as f64);
            metrics.vocabulary_size.set(vocabulary.len() as f64);
            metrics.matrix_nnz.set(matrix.nnz() as f64);
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.settings.workers.get())
            .build()?;
        let started = Instant::now();
        let clustering = pool.install(|| cluster::cluster(&matrix, &self.settings.kmeans))?;
        if let Some(metrics) = &self.metrics {
            metrics.clustering_duration.observe(started.elapsed().as_secs_f64());
            metrics.clustering_runs.inc();
            metrics.kmeans_restarts.inc_by(self.settings.kmeans.n_init as f64);
            metrics.kmeans_iterations.observe(clustering.iterations() as f64);
            metrics.kmeans_inertia.set(clustering.inertia());
        }

        let report = report::report(clustering.centroids(), &vocabulary, self.settings.top_n);
        info!(
            clusters = clustering.k(),
            inertia = clustering.inertia(),
            iterations = clustering.iterations(),
            converged = clustering.converged(),
            best_restart = clustering.best_restart(),
            "clustering pipeline finished"
        );

        Ok(ClusterRun {
            vocabulary,
            matrix,
            clustering,
            report,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RegressionSettings {
    pub test_fraction: f64,
    pub split_seed: u64,
    pub ridge_alpha: f64,
    pub forest_trees: usize,
    pub workers: NonZeroUsize,
}

impl Default for RegressionSettings {
    fn default() -> Self {
        Self {
            test_fraction: crate::config::DEFAULT_TEST_FRACTION,
            split_seed: crate::config::DEFAULT_SPLIT_SEED,
            ridge_alpha: crate::config::DEFAULT_RIDGE_ALPHA,
            forest_trees: crate::config::DEFAULT_FOREST_TREES,
            workers: NonZeroUsize::new(num_cpus::get()).unwrap_or(NonZeroUsize::MIN),
        }
    }
}

impl RegressionSettings {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            test_fraction: config.test_fraction(),
            split_seed: config.split_seed(),
            ridge_alpha: config.ridge_alpha(),
            forest_trees: config.forest_trees(),
            workers: config.workers(),
        }
    }
}

/// Test-set scores of one model on one label.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelScore {
    pub model: &'static str,
    pub label: String,
    pub scores: Scores,
}

impl fmt::Display for ModelScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}: mse={:.4} mae={:.4} r2={:.4}",
            self.model, self.label, self.scores.mse, self.scores.mae, self.scores.r2
        )
    }
}

pub struct RegressionPipeline {
    settings: RegressionSettings,
    metrics: Option<Arc<Metrics>>,
}

impl RegressionPipeline {
    #[must_use]
    pub fn new(settings: RegressionSettings) -> Self {
        Self {
            settings,
            metrics: None,
        }
    }

    #[must_use]
    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Ridge, ordinary least squares and random forest, in that order.
    fn models(&self) -> Vec<Box<dyn Regressor>> {
        vec![
            Box::new(Ridge::new(self.settings.ridge_alpha)),
            Box::new(LinearRegression),
            Box::new(
                RandomForest::default()
                    .with_trees(self.settings.forest_trees)
                    .with_seed(self.settings.split_seed),
            ),
        ]
    }

    /// Splits `dataset`, fits every model on the training rows for `label`
    /// and scores it on the held-out rows.
    ///
    /// # Errors
    /// Returns [`PipelineError::Regression`] for an unknown label, an impossible split
    /// or a failed fit.
    pub fn run(&self, dataset: &Dataset, label: &str) -> Result<Vec<ModelScore>, PipelineError> {
        let split = train_test_split(
            dataset,
            self.settings.test_fraction,
            self.settings.split_seed,
        )?;
        let train_y = split.train.label(label)?;
        let test_y = split.test.label(label)?;

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.settings.workers.get())
            .build()?;

        let mut scores = Vec::new();
        for model in self.models() {
            let _span = info_span!("regression_fit", model = model.name(), label).entered();
            let started = Instant::now();
            let fitted = pool.install(|| model.fit(split.train.features(), train_y))?;
            if let Some(metrics) = &self.metrics {
                metrics.regression_fit_duration.observe(started.elapsed().as_secs_f64());
                metrics.regression_fits.inc();
            }
            let predicted = fitted.predict(split.test.features());
            let model_scores = Scores::compute(test_y, predicted.view());
            info!(
                mse = model_scores.mse,
                mae = model_scores.mae,
                r2 = model_scores.r2,
                "model scored"
            );
            scores.push(ModelScore {
                model: model.name(),
                label: label.to_string(),
                scores: model_scores,
            });
        }
        Ok(scores)
    }

    /// Runs [`RegressionPipeline::run`] for every label column of `dataset`.
    ///
    /// # Errors
    /// Propagates the first failing label.
    pub fn run_all(&self, dataset: &Dataset) -> Result<Vec<ModelScore>, PipelineError> {
        let mut scores = Vec::new();
        for label in dataset.label_names() {
            scores.extend(self.run(dataset, label)?);
        }
        Ok(scores)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::InMemoryCorpus;
    use crate::observability::Telemetry;

    fn pets_and_vehicles() -> Vec<String> {
        ["cat dog", "cat cat", "car truck", "truck car"]
            .iter()
            .map(ToString::to_string)
            .collect()
    }

    fn small_settings(k: usize) -> ClusterSettings {
        let mut settings = ClusterSettings::new(k);
        settings.vectorizer = settings.vectorizer.with_min_df(1).with_max_df(1.0);
        settings.kmeans = settings.kmeans.with_seed(7);
        settings.workers = NonZeroUsize::new(2).expect("non-zero");
        settings
    }

    #[test]
    fn run_source_splits_topics_and_records_metrics() {
        let telemetry = Telemetry::metrics_only().expect("telemetry");
        let pipeline = ClusterPipeline::new(small_settings(2)).with_metrics(telemetry.metrics());
        let run = pipeline
            .run_source(&InMemoryCorpus::new(pets_and_vehicles()))
            .expect("pipeline should succeed");

        let assignments = run.clustering.assignments();
        assert_eq!(assignments[0], assignments[1]);
        assert_eq!(assignments[2], assignments[3]);
        assert_ne!(assignments[0], assignments[2]);
        assert_eq!(run.vocabulary.terms(), ["car", "cat", "dog", "truck"]);

        let metrics = telemetry.metrics();
        assert_eq!(metrics.documents_vectorized.get(), 4.0);
        assert_eq!(metrics.vocabulary_size.get(), 4.0);
        assert_eq!(metrics.clustering_runs.get(), 1.0);
        assert_eq!(metrics.kmeans_restarts.get(), 10.0);
    }

    #[test]
    fn failures_are_counted() {
        let telemetry = Telemetry::metrics_only().expect("telemetry");
        let pipeline = ClusterPipeline::new(small_settings(2)).with_metrics(telemetry.metrics());
        let err = pipeline
            .run::<String>(&[])
            .expect_err("empty corpus must fail");
        assert!(matches!(
            err,
            PipelineError::Clustering(ClusteringError::EmptyCorpus)
        ));
        assert_eq!(telemetry.metrics().pipeline_failures.get(), 1.0);
    }

    #[test]
    fn model_score_renders_one_line() {
        let score = ModelScore {
            model: "ridge",
            label: "heating_load".to_string(),
            scores: Scores {
                mse: 1.0,
                mae: 0.5,
                r2: 0.25,
            },
        };
        assert_eq!(
            score.to_string(),
            "ridge heating_load: mse=1.0000 mae=0.5000 r2=0.2500"
        );
    }
}
