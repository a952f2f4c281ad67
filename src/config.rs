use std::{env, num::NonZeroUsize};

use thiserror::Error;

use crate::cluster::{DEFAULT_MAX_ITER, DEFAULT_N_INIT, DEFAULT_TOLERANCE, KMeansConfig};
use crate::report::DEFAULT_TOP_N;
use crate::text::StopWords;
use crate::text::tokenizer::DEFAULT_MIN_TOKEN_LEN;
use crate::vectorize::{DEFAULT_MAX_DF, DEFAULT_MIN_DF, VectorizerConfig};

pub const DEFAULT_K: usize = 8;
pub const DEFAULT_TEST_FRACTION: f64 = 0.25;
pub const DEFAULT_RIDGE_ALPHA: f64 = 1.0;
pub const DEFAULT_FOREST_TREES: usize = 100;
pub const DEFAULT_SPLIT_SEED: u64 = 42;

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    max_df: f64,
    min_df: usize,
    min_token_len: usize,
    stop_words_enabled: bool,
    extra_stop_words: Vec<String>,
    k: usize,
    max_iter: usize,
    n_init: usize,
    tolerance: f64,
    seed: Option<u64>,
    top_n: usize,
    workers: NonZeroUsize,
    test_fraction: f64,
    ridge_alpha: f64,
    forest_trees: usize,
    split_seed: u64,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {name}: {source}")]
    Invalid {
        name: &'static str,
        #[source]
        source: anyhow::Error,
    },
}

impl Config {
    /// 環境変数 `HEADLINE_CLUSTER_*` から設定値を読み込み、検証する。
    ///
    /// 未設定の項目は既定値になる。
    ///
    /// # Errors
    /// いずれかの値のパースまたは範囲検証に失敗した場合は [`ConfigError`] を返す。
    pub fn from_env() -> Result<Self, ConfigError> {
        // Vectorizer settings
        let max_df = parse_fraction("HEADLINE_CLUSTER_MAX_DF", DEFAULT_MAX_DF, true)?;
        let min_df = parse_usize("HEADLINE_CLUSTER_MIN_DF", DEFAULT_MIN_DF)?;
        let min_token_len = parse_non_zero_usize(
            "HEADLINE_CLUSTER_MIN_TOKEN_LEN",
            DEFAULT_MIN_TOKEN_LEN,
        )?
        .get();
        let stop_words_enabled = parse_bool("HEADLINE_CLUSTER_STOP_WORDS_ENABLED", true)?;
        let extra_stop_words = parse_csv("HEADLINE_CLUSTER_EXTRA_STOP_WORDS", "");

        // k-means settings
        let k = parse_non_zero_usize("HEADLINE_CLUSTER_K", DEFAULT_K)?.get();
        let max_iter = parse_non_zero_usize("HEADLINE_CLUSTER_MAX_ITER", DEFAULT_MAX_ITER)?.get();
        let n_init = parse_non_zero_usize("HEADLINE_CLUSTER_N_INIT", DEFAULT_N_INIT)?.get();
        let tolerance = parse_f64("HEADLINE_CLUSTER_TOLERANCE", DEFAULT_TOLERANCE)?;
        if !tolerance.is_finite() || tolerance < 0.0 {
            return Err(ConfigError::Invalid {
                name: "HEADLINE_CLUSTER_TOLERANCE",
                source: anyhow::anyhow!("must be a finite non-negative number"),
            });
        }
        let seed = parse_optional_u64("HEADLINE_CLUSTER_SEED")?;
        let top_n = parse_non_zero_usize("HEADLINE_CLUSTER_TOP_N", DEFAULT_TOP_N)?.get();
        let workers = parse_non_zero_usize("HEADLINE_CLUSTER_WORKERS", num_cpus::get())?;

        // Regression settings
        let test_fraction =
            parse_fraction("HEADLINE_CLUSTER_TEST_FRACTION", DEFAULT_TEST_FRACTION, false)?;
        let ridge_alpha = parse_f64("HEADLINE_CLUSTER_RIDGE_ALPHA", DEFAULT_RIDGE_ALPHA)?;
        if !ridge_alpha.is_finite() || ridge_alpha < 0.0 {
            return Err(ConfigError::Invalid {
                name: "HEADLINE_CLUSTER_RIDGE_ALPHA",
                source: anyhow::anyhow!("must be a finite non-negative number"),
            });
        }
        let forest_trees =
            parse_non_zero_usize("HEADLINE_CLUSTER_FOREST_TREES", DEFAULT_FOREST_TREES)?.get();
        let split_seed = parse_u64("HEADLINE_CLUSTER_SPLIT_SEED", DEFAULT_SPLIT_SEED)?;

        Ok(Self {
            max_df,
            min_df,
            min_token_len,
            stop_words_enabled,
            extra_stop_words,
            k,
            max_iter,
            n_init,
            tolerance,
            seed,
            top_n,
            workers,
            test_fraction,
            ridge_alpha,
            forest_trees,
            split_seed,
        })
    }

    #[must_use]
    pub fn max_df(&self) -> f64 {
        self.max_df
    }

    #[must_use]
    pub fn min_df(&self) -> usize {
        self.min_df
    }

    #[must_use]
    pub fn min_token_len(&self) -> usize {
        self.min_token_len
    }

    #[must_use]
    pub fn stop_words_enabled(&self) -> bool {
        self.stop_words_enabled
    }

    #[must_use]
    pub fn extra_stop_words(&self) -> &[String] {
        &self.extra_stop_words
    }

    #[must_use]
    pub fn k(&self) -> usize {
        self.k
    }

    #[must_use]
    pub fn max_iter(&self) -> usize {
        self.max_iter
    }

    #[must_use]
    pub fn n_init(&self) -> usize {
        self.n_init
    }

    #[must_use]
    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    #[must_use]
    pub fn seed(&self) -> Option<u64> {
        self.seed
    }

    #[must_use]
    pub fn top_n(&self) -> usize {
        self.top_n
    }

    #[must_use]
    pub fn workers(&self) -> NonZeroUsize {
        self.workers
    }

    #[must_use]
    pub fn test_fraction(&self) -> f64 {
        self.test_fraction
    }

    #[must_use]
    pub fn ridge_alpha(&self) -> f64 {
        self.ridge_alpha
    }

    #[must_use]
    pub fn forest_trees(&self) -> usize {
        self.forest_trees
    }

    #[must_use]
    pub fn split_seed(&self) -> u64 {
        self.split_seed
    }

    #[must_use]
    pub fn with_k(mut self, k: usize) -> Self {
        self.k = k;
        self
    }

    #[must_use]
    pub fn with_max_df(mut self, max_df: f64) -> Self {
        self.max_df = max_df;
        self
    }

    #[must_use]
    pub fn with_min_df(mut self, min_df: usize) -> Self {
        self.min_df = min_df;
        self
    }

    #[must_use]
    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    #[must_use]
    pub fn with_n_init(mut self, n_init: usize) -> Self {
        self.n_init = n_init;
        self
    }

    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    #[must_use]
    pub fn with_top_n(mut self, top_n: usize) -> Self {
        self.top_n = top_n;
        self
    }

    #[must_use]
    pub fn with_test_fraction(mut self, test_fraction: f64) -> Self {
        self.test_fraction = test_fraction;
        self
    }

    #[must_use]
    pub fn with_split_seed(mut self, split_seed: u64) -> Self {
        self.split_seed = split_seed;
        self
    }

    #[must_use]
    pub fn with_ridge_alpha(mut self, ridge_alpha: f64) -> Self {
        self.ridge_alpha = ridge_alpha;
        self
    }

    #[must_use]
    pub fn with_forest_trees(mut self, forest_trees: usize) -> Self {
        self.forest_trees = forest_trees;
        self
    }

    /// Vectorizer settings derived from this configuration.
    #[must_use]
    pub fn vectorizer(&self) -> VectorizerConfig {
        let base = if self.stop_words_enabled {
            StopWords::english()
        } else {
            StopWords::none()
        };
        VectorizerConfig::default()
            .with_max_df(self.max_df)
            .with_min_df(self.min_df)
            .with_min_token_len(self.min_token_len)
            .with_stop_words(base.with_extra(&self.extra_stop_words))
    }

    #[must_use]
    pub fn kmeans(&self) -> KMeansConfig {
        let config = KMeansConfig::new(self.k)
            .with_max_iter(self.max_iter)
            .with_n_init(self.n_init)
            .with_tolerance(self.tolerance);
        match self.seed {
            Some(seed) => config.with_seed(seed),
            None => config,
        }
    }
}

fn parse_usize(name: &'static str, default: usize) -> Result<usize, ConfigError> {
    let raw = env::var(name).unwrap_or_else(|_| default.to_string());
    raw.trim().parse::<usize>().map_err(|error| ConfigError::Invalid {
        name,
        source: anyhow::Error::new(error),
    })
}

fn parse_non_zero_usize(name: &'static str, default: usize) -> Result<NonZeroUsize, ConfigError> {
    let parsed = parse_usize(name, default)?;
    NonZeroUsize::new(parsed).ok_or_else(|| ConfigError::Invalid {
        name,
        source: anyhow::anyhow!("must be greater than zero"),
    })
}

fn parse_u64(name: &'static str, default: u64) -> Result<u64, ConfigError> {
    let raw = env::var(name).unwrap_or_else(|_| default.to_string());
    raw.trim().parse::<u64>().map_err(|error| ConfigError::Invalid {
        name,
        source: anyhow::Error::new(error),
    })
}

fn parse_optional_u64(name: &'static str) -> Result<Option<u64>, ConfigError> {
    match env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => {
            raw.trim()
                .parse::<u64>()
                .map(Some)
                .map_err(|error| ConfigError::Invalid {
                    name,
                    source: anyhow::Error::new(error),
                })
        }
        _ => Ok(None),
    }
}

fn parse_f64(name: &'static str, default: f64) -> Result<f64, ConfigError> {
    let raw = env::var(name).unwrap_or_else(|_| default.to_string());
    raw.trim().parse::<f64>().map_err(|error| ConfigError::Invalid {
        name,
        source: anyhow::Error::new(error),
    })
}

/// `(0, 1]` when `inclusive_one`, `(0, 1)` otherwise.
fn parse_fraction(
    name: &'static str,
    default: f64,
    inclusive_one: bool,
) -> Result<f64, ConfigError> {
    let parsed = parse_f64(name, default)?;
    let in_range = parsed > 0.0 && (parsed < 1.0 || (inclusive_one && parsed == 1.0));
    if !in_range {
        return Err(ConfigError::Invalid {
            name,
            source: anyhow::anyhow!("{parsed} is outside the allowed fraction range"),
        });
    }
    Ok(parsed)
}

fn parse_bool(name: &'static str, default: bool) -> Result<bool, ConfigError> {
    let raw = env::var(name).unwrap_or_else(|_| default.to_string());
    match raw.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            name,
            source: anyhow::anyhow!("invalid boolean value: {raw}"),
        }),
    }
}

fn parse_csv(name: &'static str, default: &str) -> Vec<String> {
    let raw = env::var(name).unwrap_or_else(|_| default.to_string());
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
