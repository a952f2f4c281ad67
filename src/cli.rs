//! Command-line surface of the `headline-cluster` binary.
use std::io::Write;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};

use crate::config::Config;
use crate::corpus::{CorpusSource, JsonLinesCorpus, LinesCorpus, Pairing};
use crate::observability::{LogFormat, Telemetry};
use crate::pipeline::{ClusterPipeline, ClusterSettings, RegressionPipeline, RegressionSettings};
use crate::regression::Dataset;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Log output format on stderr (text or json)
    #[arg(long, env = "HEADLINE_CLUSTER_LOG_FORMAT", default_value = "text")]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Cluster a headline corpus with TF-IDF and k-means
    Cluster(ClusterArgs),
    /// Fit ridge, linear and random-forest regressors on a tabular dataset
    Regress(RegressArgs),
}

/// Input layout of a corpus file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CorpusFormat {
    /// One document per line
    Lines,
    /// JSON objects with `headline` and optional `description`
    #[default]
    Jsonl,
}

impl FromStr for CorpusFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "lines" | "text" => Ok(Self::Lines),
            "jsonl" | "json-lines" | "ndjson" => Ok(Self::Jsonl),
            other => Err(format!("unknown corpus format: {other}")),
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct ClusterArgs {
    /// Corpus file path
    #[arg(long, env = "HEADLINE_CLUSTER_CORPUS")]
    pub corpus: PathBuf,

    /// Corpus file layout (lines or jsonl)
    #[arg(long, default_value = "jsonl")]
    pub format: CorpusFormat,

    /// How headlines are paired with descriptions (zip or cross)
    #[arg(long, default_value = "zip")]
    pub pairing: Pairing,

    /// Number of clusters
    #[arg(short = 'k', long = "clusters")]
    pub k: Option<usize>,

    /// Upper document-frequency bound as a fraction of documents
    #[arg(long)]
    pub max_df: Option<f64>,

    /// Lower document-frequency bound as an absolute count
    #[arg(long)]
    pub min_df: Option<usize>,

    /// Iteration cap per k-means restart
    #[arg(long)]
    pub max_iter: Option<usize>,

    /// Number of k-means restarts
    #[arg(long)]
    pub n_init: Option<usize>,

    /// Random seed for reproducible clustering
    #[arg(long)]
    pub seed: Option<u64>,

    /// Terms listed per cluster
    #[arg(long)]
    pub top_n: Option<usize>,

    /// Print the report as JSON instead of text lines
    #[arg(long)]
    pub json: bool,

    /// Print Prometheus metrics after the report
    #[arg(long)]
    pub print_metrics: bool,
}

impl ClusterArgs {
    /// Applies the flags that were given on top of `config`.
    #[must_use]
    pub fn apply(&self, mut config: Config) -> Config {
        if let Some(k) = self.k {
            config = config.with_k(k);
        }
        if let Some(max_df) = self.max_df {
            config = config.with_max_df(max_df);
        }
        if let Some(min_df) = self.min_df {
            config = config.with_min_df(min_df);
        }
        if let Some(max_iter) = self.max_iter {
            config = config.with_max_iter(max_iter);
        }
        if let Some(n_init) = self.n_init {
            config = config.with_n_init(n_init);
        }
        if let Some(seed) = self.seed {
            config = config.with_seed(seed);
        }
        if let Some(top_n) = self.top_n {
            config = config.with_top_n(top_n);
        }
        config
    }

    fn source(&self) -> Box<dyn CorpusSource> {
        match self.format {
            CorpusFormat::Lines => Box::new(LinesCorpus::new(&self.corpus)),
            CorpusFormat::Jsonl => Box::new(JsonLinesCorpus::new(&self.corpus, self.pairing)),
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct RegressArgs {
    /// JSON Lines dataset with the energy-efficiency columns
    #[arg(long, env = "HEADLINE_CLUSTER_DATASET")]
    pub dataset: PathBuf,

    /// Fraction of rows held out for scoring
    #[arg(long)]
    pub test_fraction: Option<f64>,

    /// Seed for the train/test shuffle and the forest
    #[arg(long)]
    pub seed: Option<u64>,

    /// Ridge penalty strength
    #[arg(long)]
    pub ridge_alpha: Option<f64>,

    /// Trees in the random forest
    #[arg(long)]
    pub trees: Option<usize>,

    /// Print scores as JSON instead of text lines
    #[arg(long)]
    pub json: bool,
}

impl RegressArgs {
    #[must_use]
    pub fn apply(&self, mut config: Config) -> Config {
        if let Some(test_fraction) = self.test_fraction {
            config = config.with_test_fraction(test_fraction);
        }
        if let Some(seed) = self.seed {
            config = config.with_split_seed(seed);
        }
        if let Some(alpha) = self.ridge_alpha {
            config = config.with_ridge_alpha(alpha);
        }
        if let Some(trees) = self.trees {
            config = config.with_forest_trees(trees);
        }
        config
    }
}

/// Runs the parsed command, writing results to `out`.
///
/// # Errors
/// Returns an error when configuration, input loading or any pipeline stage fails.
pub fn run(cli: &Cli, config: Config, telemetry: &Telemetry, out: &mut dyn Write) -> Result<()> {
    match &cli.command {
        Command::Cluster(args) => run_cluster(args, config, telemetry, out),
        Command::Regress(args) => run_regress(args, config, telemetry, out),
    }
}

fn run_cluster(
    args: &ClusterArgs,
    config: Config,
    telemetry: &Telemetry,
    out: &mut dyn Write,
) -> Result<()> {
    let config = args.apply(config);
    let pipeline = ClusterPipeline::new(ClusterSettings::from_config(&config))
        .with_metrics(telemetry.metrics());
    let source = args.source();
    let run = pipeline
        .run_source(source.as_ref())
        .with_context(|| format!("failed to cluster corpus {}", args.corpus.display()))?;

    if args.json {
        serde_json::to_writer_pretty(&mut *out, &run.report)
            .context("failed to serialize cluster report")?;
        writeln!(out)?;
    } else {
        write!(out, "{}", run.report)?;
    }
    if args.print_metrics {
        write!(out, "{}", telemetry.render_prometheus())?;
    }
    Ok(())
}

fn run_regress(
    args: &RegressArgs,
    config: Config,
    telemetry: &Telemetry,
    out: &mut dyn Write,
) -> Result<()> {
    let config = args.apply(config);
    let dataset = Dataset::energy_efficiency(&args.dataset)
        .with_context(|| format!("failed to load dataset {}", args.dataset.display()))?;
    let pipeline = RegressionPipeline::new(RegressionSettings::from_config(&config))
        .with_metrics(telemetry.metrics());
    let scores = pipeline
        .run_all(&dataset)
        .context("regression pipeline failed")?;

    if args.json {
        serde_json::to_writer_pretty(&mut *out, &scores).context("failed to serialize scores")?;
        writeln!(out)?;
    } else {
        for score in &scores {
            writeln!(out, "{score}")?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_cluster_flags() {
        let cli = Cli::try_parse_from([
            "headline-cluster",
            "cluster",
            "--corpus",
            "news.jsonl",
            "--pairing",
            "cross",
            "-k",
            "5",
            "--seed",
            "9",
            "--json",
        ])
        .expect("valid arguments");

        let Command::Cluster(args) = cli.command else {
            panic!("expected the cluster subcommand");
        };
        assert_eq!(args.pairing, Pairing::CrossProduct);
        assert_eq!(args.format, CorpusFormat::Jsonl);
        assert_eq!(args.k, Some(5));
        assert_eq!(args.seed, Some(9));
        assert!(args.json);
        assert!(!args.print_metrics);
    }

    #[test]
    fn rejects_unknown_format() {
        let result = Cli::try_parse_from([
            "headline-cluster",
            "cluster",
            "--corpus",
            "news.txt",
            "--format",
            "csv",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn parses_regress_flags() {
        let cli = Cli::try_parse_from([
            "headline-cluster",
            "regress",
            "--dataset",
            "energy.jsonl",
            "--test-fraction",
            "0.2",
            "--trees",
            "25",
        ])
        .expect("valid arguments");

        let Command::Regress(args) = cli.command else {
            panic!("expected the regress subcommand");
        };
        assert_eq!(args.test_fraction, Some(0.2));
        assert_eq!(args.trees, Some(25));
        assert_eq!(args.ridge_alpha, None);
    }
}
