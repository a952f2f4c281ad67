//! TF-IDF 行列の k-means クラスタリング。
//!
//! `n_init` 回の独立した試行を rayon で並列に実行し、慣性が最小の結果を採用する。
//! 各試行のシードはマスター乱数から順に引くため、スケジューリングに依存せず再現可能。
use ndarray::{Array2, ArrayView1};
use rand::{Rng, SeedableRng, rngs::StdRng};
use rayon::prelude::*;

use crate::error::ClusteringError;
use crate::vectorize::TermDocumentMatrix;

pub(crate) mod kmeans;

pub const DEFAULT_MAX_ITER: usize = 100;
pub const DEFAULT_N_INIT: usize = 10;
pub const DEFAULT_TOLERANCE: f64 = 1e-4;

/// k-means の設定。
#[derive(Debug, Clone, PartialEq)]
pub struct KMeansConfig {
    pub k: usize,
    pub max_iter: usize,
    pub n_init: usize,
    /// 重心移動量（二乗和）の収束閾値
    pub tolerance: f64,
    pub seed: Option<u64>,
}

impl KMeansConfig {
    #[must_use]
    pub fn new(k: usize) -> Self {
        Self {
            k,
            max_iter: DEFAULT_MAX_ITER,
            n_init: DEFAULT_N_INIT,
            tolerance: DEFAULT_TOLERANCE,
            seed: None,
        }
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
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    fn validate(&self, matrix: &TermDocumentMatrix) -> Result<(), ClusteringError> {
        let n_documents = matrix.n_documents();
        if self.k == 0 || self.k > n_documents {
            return Err(ClusteringError::InvalidClusterCount {
                k: self.k,
                n_documents,
            });
        }
        if matrix.n_terms() == 0 {
            return Err(ClusteringError::DegenerateInput);
        }
        if self.max_iter == 0 {
            return Err(ClusteringError::invalid("max_iter", "must be at least 1"));
        }
        if self.n_init == 0 {
            return Err(ClusteringError::invalid("n_init", "must be at least 1"));
        }
        if !self.tolerance.is_finite() || self.tolerance < 0.0 {
            return Err(ClusteringError::invalid(
                "tolerance",
                format!("{} is not a finite non-negative number", self.tolerance),
            ));
        }
        Ok(())
    }
}

/// Dense cluster centres, one row per cluster over the vocabulary columns.
#[derive(Debug, Clone, PartialEq)]
pub struct Centroids {
    values: Array2<f64>,
}

impl Centroids {
    #[must_use]
    pub fn new(values: Array2<f64>) -> Self {
        Self { values }
    }

    #[must_use]
    pub fn k(&self) -> usize {
        self.values.nrows()
    }

    #[must_use]
    pub fn n_terms(&self) -> usize {
        self.values.ncols()
    }

    #[must_use]
    pub fn row(&self, cluster: usize) -> ArrayView1<'_, f64> {
        self.values.row(cluster)
    }

    #[must_use]
    pub fn as_array(&self) -> &Array2<f64> {
        &self.values
    }
}

/// クラスタリング結果。
#[derive(Debug, Clone, PartialEq)]
pub struct Clustering {
    assignments: Vec<usize>,
    centroids: Centroids,
    inertia: f64,
    iterations: usize,
    converged: bool,
    inertia_history: Vec<f64>,
    best_restart: usize,
}

impl Clustering {
    /// 文書番号 → クラスタ番号
    #[must_use]
    pub fn assignments(&self) -> &[usize] {
        &self.assignments
    }

    #[must_use]
    pub fn centroids(&self) -> &Centroids {
        &self.centroids
    }

    #[must_use]
    pub fn k(&self) -> usize {
        self.centroids.k()
    }

    #[must_use]
    pub fn inertia(&self) -> f64 {
        self.inertia
    }

    #[must_use]
    pub fn iterations(&self) -> usize {
        self.iterations
    }

    #[must_use]
    pub fn converged(&self) -> bool {
        self.converged
    }

    /// Inertia after every assignment step of the winning restart.
    #[must_use]
    pub fn inertia_history(&self) -> &[f64] {
        &self.inertia_history
    }

    #[must_use]
    pub fn best_restart(&self) -> usize {
        self.best_restart
    }

    #[must_use]
    pub fn cluster_sizes(&self) -> Vec<usize> {
        let mut sizes = vec![0; self.k()];
        for &cluster in &self.assignments {
            sizes[cluster] += 1;
        }
        sizes
    }

    #[must_use]
    pub fn members(&self, cluster: usize) -> Vec<usize> {
        self.assignments
            .iter()
            .enumerate()
            .filter(|&(_, &c)| c == cluster)
            .map(|(doc, _)| doc)
            .collect()
    }
}

/// 文書語行列を `k` 個のクラスタに分割する。
///
/// # Errors
/// `k` が `1..=n_documents` の外なら [`ClusteringError::InvalidClusterCount`]、
/// 列が無ければ [`ClusteringError::DegenerateInput`]、その他のパラメータが不正なら
/// [`ClusteringError::InvalidParameter`] を返す。
pub fn cluster(
    matrix: &TermDocumentMatrix,
    config: &KMeansConfig,
) -> Result<Clustering, ClusteringError> {
    config.validate(matrix)?;

    let mut master = config
        .seed
        .map_or_else(StdRng::from_os_rng, StdRng::seed_from_u64);
    let restart_seeds: Vec<u64> = (0..config.n_init).map(|_| master.random()).collect();
    let row_sq_norms: Vec<f64> = matrix
        .rows()
        .map(|row| row.iter().map(|(_, v)| v * v).sum())
        .collect();

    let outcomes: Vec<kmeans::RunOutcome> = restart_seeds
        .par_iter()
        .map(|&seed| {
            let mut rng = StdRng::seed_from_u64(seed);
            kmeans::run_once(
                matrix,
                &row_sq_norms,
                config.k,
                config.max_iter,
                config.tolerance,
                &mut rng,
            )
        })
        .collect();

    for (restart, outcome) in outcomes.iter().enumerate() {
        tracing::debug!(
            restart,
            inertia = outcome.inertia,
            iterations = outcome.iterations,
            converged = outcome.converged,
            "k-means restart finished"
        );
    }

    let (best_restart, best) = outcomes
        .into_iter()
        .enumerate()
        .min_by(|a, b| a.1.inertia.total_cmp(&b.1.inertia))
        .ok_or_else(|| ClusteringError::invalid("n_init", "must be at least 1"))?;

    if !best.converged {
        tracing::warn!(
            max_iter = config.max_iter,
            inertia = best.inertia,
            "k-means stopped at the iteration cap before converging"
        );
    }

    Ok(Clustering {
        assignments: best.assignments,
        centroids: Centroids::new(best.centroids),
        inertia: best.inertia,
        iterations: best.iterations,
        converged: best.converged,
        inertia_history: best.inertia_history,
        best_restart,
    })
}
