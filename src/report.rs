//! Top terms per cluster centroid.
use std::cmp::Ordering;
use std::fmt;

use serde::Serialize;

use crate::cluster::Centroids;
use crate::vectorize::Vocabulary;

pub const DEFAULT_TOP_N: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TermWeight {
    pub term: String,
    pub weight: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusterTerms {
    pub cluster_id: usize,
    pub terms: Vec<TermWeight>,
}

impl ClusterTerms {
    pub fn term_names(&self) -> impl Iterator<Item = &str> {
        self.terms.iter().map(|t| t.term.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusterReport {
    pub clusters: Vec<ClusterTerms>,
}

impl ClusterReport {
    #[must_use]
    pub fn cluster(&self, cluster_id: usize) -> Option<&ClusterTerms> {
        self.clusters.iter().find(|c| c.cluster_id == cluster_id)
    }
}

impl fmt::Display for ClusterReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for cluster in &self.clusters {
            let terms: Vec<&str> = cluster.term_names().collect();
            writeln!(f, "Cluster {}: {}", cluster.cluster_id, terms.join(", "))?;
        }
        Ok(())
    }
}

/// Lists the `top_n` heaviest terms of every centroid, heaviest first.
///
/// Equal weights are ordered by term; zero-weight terms are left out.
#[must_use]
pub fn report(centroids: &Centroids, vocabulary: &Vocabulary, top_n: usize) -> ClusterReport {
    let clusters = (0..centroids.k())
        .map(|cluster_id| {
            let mut weighted: Vec<(&str, f64)> = centroids
                .row(cluster_id)
                .iter()
                .enumerate()
                .filter(|&(_, &weight)| weight > 0.0)
                .filter_map(|(j, &weight)| vocabulary.term(j).map(|term| (term, weight)))
                .collect();
            weighted.sort_by(|a, b| {
                b.1.partial_cmp(&a.1)
                    .unwrap_or(Ordering::Equal)
                    .then_with(|| a.0.cmp(b.0))
            });
            weighted.truncate(top_n);
            ClusterTerms {
                cluster_id,
                terms: weighted
                    .into_iter()
                    .map(|(term, weight)| TermWeight {
                        term: term.to_string(),
                        weight,
                    })
                    .collect(),
            }
        })
        .collect();

    ClusterReport { clusters }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vectorize::{VectorizerConfig, vectorize};
    use ndarray::array;

    fn vocabulary() -> Vocabulary {
        let docs = ["apple banana cherry", "apple banana cherry"];
        let config = VectorizerConfig::default().with_min_df(1).with_max_df(1.0);
        vectorize(&docs, &config).expect("vectorize").0
    }

    #[test]
    fn orders_by_weight_then_term() {
        let centroids = Centroids::new(array![[0.2, 0.5, 0.2], [0.0, 0.1, 0.0]]);
        let report = report(&centroids, &vocabulary(), 10);

        let first: Vec<&str> = report.clusters[0].term_names().collect();
        assert_eq!(first, vec!["banana", "apple", "cherry"]);
        let second: Vec<&str> = report.clusters[1].term_names().collect();
        assert_eq!(second, vec!["banana"]);
    }

    #[test]
    fn truncates_to_top_n() {
        let centroids = Centroids::new(array![[0.3, 0.2, 0.1]]);
        let report = report(&centroids, &vocabulary(), 2);
        assert_eq!(report.clusters[0].terms.len(), 2);
        assert_eq!(report.cluster(0).map(|c| c.terms[0].term.as_str()), Some("apple"));
    }

    #[test]
    fn renders_one_line_per_cluster() {
        let centroids = Centroids::new(array![[0.3, 0.2, 0.0], [0.0, 0.0, 0.4]]);
        let rendered = report(&centroids, &vocabulary(), 10).to_string();
        assert_eq!(rendered, "Cluster 0: apple, banana\nCluster 1: cherry\n");
    }
}
