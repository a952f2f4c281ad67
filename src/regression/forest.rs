//! ランダムフォレスト回帰。
//!
//! ブートストラップ標本ごとに分散減少で分割する回帰木を rayon で並列に構築し、
//! 予測は全木の平均とする。
use ndarray::{Array1, ArrayView1, ArrayView2};
use rand::{Rng, SeedableRng, rngs::StdRng, seq::index};
use rayon::prelude::*;

use super::{FittedRegressor, RegressionError, Regressor, check_shapes};

#[derive(Debug, Clone, PartialEq)]
pub struct RandomForest {
    pub n_trees: usize,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    /// Features considered per split; `None` means all of them.
    pub max_features: Option<usize>,
    pub seed: Option<u64>,
}

impl Default for RandomForest {
    fn default() -> Self {
        Self {
            n_trees: 100,
            max_depth: None,
            min_samples_split: 2,
            max_features: None,
            seed: None,
        }
    }
}

impl RandomForest {
    #[must_use]
    pub fn with_trees(mut self, n_trees: usize) -> Self {
        self.n_trees = n_trees;
        self
    }

    #[must_use]
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = Some(max_depth);
        self
    }

    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// # Errors
    /// Returns [`RegressionError::InvalidParameter`] for zero trees or a split minimum below 2,
    /// or [`RegressionError::Shape`] for empty or misaligned inputs.
    pub fn fit_forest(
        &self,
        x: ArrayView2<'_, f64>,
        y: ArrayView1<'_, f64>,
    ) -> Result<FittedForest, RegressionError> {
        check_shapes(x, y)?;
        if self.n_trees == 0 {
            return Err(RegressionError::InvalidParameter {
                name: "n_trees",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.min_samples_split < 2 {
            return Err(RegressionError::InvalidParameter {
                name: "min_samples_split",
                reason: "must be at least 2".to_string(),
            });
        }

        let n_features = x.ncols();
        let grower = TreeGrower {
            x: x.view(),
            y: y.view(),
            max_depth: self.max_depth.unwrap_or(usize::MAX),
            min_samples_split: self.min_samples_split,
            max_features: self
                .max_features
                .map_or(n_features, |m| m.clamp(1, n_features.max(1))),
        };

        let mut master = self
            .seed
            .map_or_else(StdRng::from_os_rng, StdRng::seed_from_u64);
        let tree_seeds: Vec<u64> = (0..self.n_trees).map(|_| master.random()).collect();

        let trees = tree_seeds
            .par_iter()
            .map(|&seed| {
                let mut rng = StdRng::seed_from_u64(seed);
                let n = x.nrows();
                let mut sample: Vec<usize> = (0..n).map(|_| rng.random_range(0..n)).collect();
                grower.grow(&mut sample, 0, &mut rng)
            })
            .collect();

        Ok(FittedForest { trees })
    }
}

impl Regressor for RandomForest {
    fn name(&self) -> &'static str {
        "random_forest"
    }

    fn fit(
        &self,
        x: ArrayView2<'_, f64>,
        y: ArrayView1<'_, f64>,
    ) -> Result<Box<dyn FittedRegressor>, RegressionError> {
        Ok(Box::new(self.fit_forest(x, y)?))
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

impl Node {
    fn predict(&self, row: ArrayView1<'_, f64>) -> f64 {
        let mut node = self;
        loop {
            match node {
                Node::Leaf { value } => return *value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node = if row[*feature] <= *threshold {
                        left
                    } else {
                        right
                    };
                }
            }
        }
    }

    fn depth(&self) -> usize {
        match self {
            Node::Leaf { .. } => 0,
            Node::Split { left, right, .. } => 1 + left.depth().max(right.depth()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FittedForest {
    trees: Vec<Node>,
}

impl FittedForest {
    #[must_use]
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    #[must_use]
    pub fn max_depth(&self) -> usize {
        self.trees.iter().map(Node::depth).max().unwrap_or(0)
    }
}

impl FittedRegressor for FittedForest {
    fn predict(&self, x: ArrayView2<'_, f64>) -> Array1<f64> {
        let n_trees = self.trees.len() as f64;
        x.rows()
            .into_iter()
            .map(|row| self.trees.iter().map(|tree| tree.predict(row)).sum::<f64>() / n_trees)
            .collect()
    }
}

struct TreeGrower<'a> {
    x: ArrayView2<'a, f64>,
    y: ArrayView1<'a, f64>,
    max_depth: usize,
    min_samples_split: usize,
    max_features: usize,
}

struct BestSplit {
    feature: usize,
    threshold: f64,
    position: usize,
    score: f64,
}

impl TreeGrower<'_> {
    fn grow(&self, samples: &mut [usize], depth: usize, rng: &mut StdRng) -> Node {
        let n = samples.len();
        let sum: f64 = samples.iter().map(|&i| self.y[i]).sum();
        let mean = sum / n as f64;
        let sse: f64 = samples.iter().map(|&i| (self.y[i] - mean).powi(2)).sum();

        if n < self.min_samples_split || depth >= self.max_depth || sse <= f64::EPSILON {
            return Node::Leaf { value: mean };
        }

        let n_features = self.x.ncols();
        let candidates: Vec<usize> = if self.max_features < n_features {
            index::sample(rng, n_features, self.max_features).into_vec()
        } else {
            (0..n_features).collect()
        };

        let Some(best) = candidates
            .iter()
            .filter_map(|&feature| self.best_split(samples, feature))
            .min_by(|a, b| a.score.total_cmp(&b.score))
        else {
            return Node::Leaf { value: mean };
        };
        if best.score >= sse - 1e-12 {
            return Node::Leaf { value: mean };
        }

        let feature = best.feature;
        samples.sort_by(|&a, &b| self.x[[a, feature]].total_cmp(&self.x[[b, feature]]));
        let (left, right) = samples.split_at_mut(best.position);
        Node::Split {
            feature,
            threshold: best.threshold,
            left: Box::new(self.grow(left, depth + 1, rng)),
            right: Box::new(self.grow(right, depth + 1, rng)),
        }
    }

    /// Lowest summed squared error over all cut points of one feature.
    fn best_split(&self, samples: &[usize], feature: usize) -> Option<BestSplit> {
        let mut order = samples.to_vec();
        order.sort_by(|&a, &b| self.x[[a, feature]].total_cmp(&self.x[[b, feature]]));

        let n = order.len();
        let total_sum: f64 = order.iter().map(|&i| self.y[i]).sum();
        let total_sq: f64 = order.iter().map(|&i| self.y[i] * self.y[i]).sum();
        let mut left_sum = 0.0;
        let mut left_sq = 0.0;
        let mut best: Option<BestSplit> = None;

        for position in 1..n {
            let prev = order[position - 1];
            left_sum += self.y[prev];
            left_sq += self.y[prev] * self.y[prev];

            let lo = self.x[[prev, feature]];
            let hi = self.x[[order[position], feature]];
            if lo >= hi {
                continue;
            }

            let left_n = position as f64;
            let right_n = (n - position) as f64;
            let right_sum = total_sum - left_sum;
            let right_sq = total_sq - left_sq;
            let score = (left_sq - left_sum * left_sum / left_n)
                + (right_sq - right_sum * right_sum / right_n);

            if best.as_ref().is_none_or(|b| score < b.score) {
                best = Some(BestSplit {
                    feature,
                    threshold: lo + (hi - lo) / 2.0,
                    position,
                    score,
                });
            }
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array2, array};

    fn step_data() -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_fn((40, 2), |(i, j)| {
            if j == 0 { i as f64 } else { (i % 3) as f64 }
        });
        let y = x.column(0).mapv(|v| if v < 20.0 { 1.0 } else { 5.0 });
        (x, y)
    }

    #[test]
    fn forest_fits_step_function() {
        let (x, y) = step_data();
        let forest = RandomForest::default()
            .with_trees(20)
            .with_seed(3)
            .fit_forest(x.view(), y.view())
            .expect("fit");
        let predictions = forest.predict(array![[2.0, 0.0], [35.0, 1.0]].view());
        assert!((predictions[0] - 1.0).abs() < 0.5);
        assert!((predictions[1] - 5.0).abs() < 0.5);
        assert_eq!(forest.n_trees(), 20);
    }

    #[test]
    fn same_seed_builds_same_forest() {
        let (x, y) = step_data();
        let config = RandomForest::default().with_trees(5).with_seed(11);
        let first = config.fit_forest(x.view(), y.view()).expect("fit");
        let second = config.fit_forest(x.view(), y.view()).expect("fit");
        assert_eq!(first, second);
    }

    #[test]
    fn max_depth_limits_trees() {
        let (x, y) = step_data();
        let forest = RandomForest::default()
            .with_trees(4)
            .with_max_depth(1)
            .with_seed(1)
            .fit_forest(x.view(), y.view())
            .expect("fit");
        assert!(forest.max_depth() <= 1);
    }

    #[test]
    fn features_and_labels_may_borrow_from_different_scopes() {
        let (x, _) = step_data();
        let forest = {
            let y = x.column(0).mapv(|v| if v < 20.0 { 1.0 } else { 5.0 });
            RandomForest::default()
                .with_trees(5)
                .with_seed(7)
                .fit_forest(x.view(), y.view())
                .expect("fit")
        };
        let predictions = forest.predict(x.slice(ndarray::s![..2, ..]));
        assert_eq!(predictions.len(), 2);
        assert!((predictions[0] - 1.0).abs() < 0.5);
    }

    #[test]
    fn zero_trees_is_rejected() {
        let (x, y) = step_data();
        assert!(matches!(
            RandomForest::default().with_trees(0).fit_forest(x.view(), y.view()),
            Err(RegressionError::InvalidParameter { name: "n_trees", .. })
        ));
    }
}
