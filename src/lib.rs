#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::module_name_repetitions,
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::float_cmp,
    clippy::missing_panics_doc,
    clippy::similar_names
)]

pub mod analysis;
pub mod cli;
pub mod cluster;
pub mod config;
pub mod corpus;
pub mod error;
pub mod observability;
pub mod pipeline;
pub mod regression;
pub mod report;
pub mod text;
pub mod vectorize;

pub use cluster::{Centroids, Clustering, KMeansConfig, cluster};
pub use corpus::{CorpusError, CorpusSource, InMemoryCorpus, JsonLinesCorpus, LinesCorpus, Pairing};
pub use error::ClusteringError;
pub use pipeline::{
    ClusterPipeline, ClusterRun, ClusterSettings, ModelScore, PipelineError, RegressionPipeline,
    RegressionSettings,
};
pub use report::{ClusterReport, ClusterTerms, TermWeight, report};
pub use vectorize::{TermDocumentMatrix, VectorizerConfig, Vocabulary, vectorize};
