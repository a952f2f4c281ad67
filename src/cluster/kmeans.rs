use ndarray::{Array2, ArrayView1};
use rand::{Rng, rngs::StdRng};
use sprs::CsVecView;

use crate::vectorize::TermDocumentMatrix;

/// Result of a single seeded k-means run.
#[derive(Debug, Clone)]
pub(crate) struct RunOutcome {
    pub assignments: Vec<usize>,
    pub centroids: Array2<f64>,
    pub inertia: f64,
    pub iterations: usize,
    pub converged: bool,
    pub inertia_history: Vec<f64>,
}

/// Runs k-means++ seeding followed by Lloyd iterations.
///
/// # Arguments
/// * `matrix` - Rows to cluster.
/// * `row_sq_norms` - Squared L2 norm of every row.
/// * `k` - Number of clusters, already validated against the row count.
/// * `max_iterations` - Iteration cap.
/// * `tolerance` - Stop once the summed squared centroid shift falls below this.
pub(crate) fn run_once(
    matrix: &TermDocumentMatrix,
    row_sq_norms: &[f64],
    k: usize,
    max_iterations: usize,
    tolerance: f64,
    rng: &mut StdRng,
) -> RunOutcome {
    let mut centroids = kmeans_plus_plus(matrix, row_sq_norms, k, rng);
    let mut assignments = vec![usize::MAX; matrix.n_documents()];
    let mut inertia_history = Vec::new();
    let mut iterations = 0;
    let mut converged = false;
    let mut stable = false;

    while iterations < max_iterations {
        iterations += 1;

        // E-step: assign rows to nearest centroid
        let (new_assignments, inertia) = assign(matrix, row_sq_norms, &centroids);
        inertia_history.push(inertia);
        if new_assignments == assignments {
            converged = true;
            stable = true;
            break;
        }
        assignments = new_assignments;

        // M-step: move centroids to member means
        let shift = update_centroids(matrix, &assignments, &mut centroids);
        if shift < tolerance {
            converged = true;
            break;
        }
    }

    let (assignments, inertia) = if stable {
        let inertia = inertia_history.last().copied().unwrap_or_default();
        (assignments, inertia)
    } else {
        let (final_assignments, inertia) = assign(matrix, row_sq_norms, &centroids);
        inertia_history.push(inertia);
        (final_assignments, inertia)
    };

    RunOutcome {
        assignments,
        centroids,
        inertia,
        iterations,
        converged,
        inertia_history,
    }
}

/// k-means++ seeding: each next centroid is drawn with probability proportional to
/// its squared distance from the closest centroid chosen so far.
fn kmeans_plus_plus(
    matrix: &TermDocumentMatrix,
    row_sq_norms: &[f64],
    k: usize,
    rng: &mut StdRng,
) -> Array2<f64> {
    let rows: Vec<CsVecView<'_, f64>> = matrix.rows().collect();
    let n = rows.len();
    let mut centroids = Array2::zeros((k, matrix.n_terms()));
    let mut chosen = vec![false; n];

    let first = rng.random_range(0..n);
    place_row(&mut centroids, 0, rows[first].view());
    chosen[first] = true;

    let first_sq = row_sq_norms[first];
    let mut closest: Vec<f64> = (0..n)
        .map(|doc| {
            if chosen[doc] {
                0.0
            } else {
                sq_distance(
                    rows[doc].view(),
                    row_sq_norms[doc],
                    centroids.row(0),
                    first_sq,
                )
            }
        })
        .collect();

    for c in 1..k {
        let total: f64 = closest
            .iter()
            .zip(&chosen)
            .filter(|&(_, &taken)| !taken)
            .map(|(d, _)| d)
            .sum();

        let next = if total > 0.0 {
            sample_by_distance(&closest, &chosen, total, rng)
        } else {
            // every remaining row coincides with a centroid
            let remaining: Vec<usize> = (0..n).filter(|&doc| !chosen[doc]).collect();
            remaining[rng.random_range(0..remaining.len())]
        };

        place_row(&mut centroids, c, rows[next].view());
        chosen[next] = true;
        let centroid_sq = row_sq_norms[next];
        for doc in 0..n {
            if chosen[doc] {
                closest[doc] = 0.0;
                continue;
            }
            let dist = sq_distance(
                rows[doc].view(),
                row_sq_norms[doc],
                centroids.row(c),
                centroid_sq,
            );
            if dist < closest[doc] {
                closest[doc] = dist;
            }
        }
    }

    centroids
}

fn sample_by_distance(closest: &[f64], chosen: &[bool], total: f64, rng: &mut StdRng) -> usize {
    let target = rng.random::<f64>() * total;
    let mut cumulative = 0.0;
    let mut last_candidate = 0;
    for (doc, (&dist, &taken)) in closest.iter().zip(chosen).enumerate() {
        if taken || dist <= 0.0 {
            continue;
        }
        cumulative += dist;
        last_candidate = doc;
        if cumulative >= target {
            return doc;
        }
    }
    last_candidate
}

/// Assigns every row to its nearest centroid (ties go to the lowest index) and
/// returns the assignments together with the inertia.
pub(crate) fn assign(
    matrix: &TermDocumentMatrix,
    row_sq_norms: &[f64],
    centroids: &Array2<f64>,
) -> (Vec<usize>, f64) {
    let centroid_sq: Vec<f64> = centroids.rows().into_iter().map(|c| c.dot(&c)).collect();
    let mut assignments = Vec::with_capacity(matrix.n_documents());
    let mut inertia = 0.0;

    for (doc, row) in matrix.rows().enumerate() {
        let mut min_dist_sq = f64::INFINITY;
        let mut best_cluster = 0;
        for (j, centroid) in centroids.rows().into_iter().enumerate() {
            let dist_sq =
                sq_distance(row.view(), row_sq_norms[doc], centroid, centroid_sq[j]);
            if dist_sq < min_dist_sq {
                min_dist_sq = dist_sq;
                best_cluster = j;
            }
        }
        assignments.push(best_cluster);
        inertia += min_dist_sq;
    }

    (assignments, inertia)
}

/// Recomputes centroids as member means. A cluster without members keeps its
/// previous centroid. Returns the summed squared centroid shift.
fn update_centroids(
    matrix: &TermDocumentMatrix,
    assignments: &[usize],
    centroids: &mut Array2<f64>,
) -> f64 {
    let k = centroids.nrows();
    let mut sums = Array2::<f64>::zeros(centroids.raw_dim());
    let mut counts = vec![0usize; k];

    for (row, &cluster) in matrix.rows().zip(assignments) {
        for (j, &value) in row.iter() {
            sums[[cluster, j]] += value;
        }
        counts[cluster] += 1;
    }

    let mut shift = 0.0;
    for (cluster, &count) in counts.iter().enumerate() {
        if count == 0 {
            continue;
        }
        let mean = &sums.row(cluster) / count as f64;
        let mut current = centroids.row_mut(cluster);
        shift += current
            .iter()
            .zip(mean.iter())
            .map(|(old, new)| (old - new).powi(2))
            .sum::<f64>();
        current.assign(&mean);
    }
    shift
}

fn place_row(centroids: &mut Array2<f64>, slot: usize, row: CsVecView<'_, f64>) {
    let mut target = centroids.row_mut(slot);
    target.fill(0.0);
    for (j, &value) in row.iter() {
        target[j] = value;
    }
}

/// `||x - c||² = ||x||² - 2 x·c + ||c||²`, clamped at zero.
fn sq_distance(
    row: CsVecView<'_, f64>,
    row_sq: f64,
    centroid: ArrayView1<'_, f64>,
    centroid_sq: f64,
) -> f64 {
    let dot: f64 = row.iter().map(|(j, &value)| value * centroid[j]).sum();
    (row_sq - 2.0 * dot + centroid_sq).max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn blobs() -> TermDocumentMatrix {
        TermDocumentMatrix::from_dense_rows(
            &[
                vec![1.0, 0.0, 0.0],
                vec![0.9, 0.1, 0.0],
                vec![0.0, 0.0, 1.0],
                vec![0.0, 0.1, 0.9],
            ],
            3,
        )
    }

    fn sq_norms(matrix: &TermDocumentMatrix) -> Vec<f64> {
        matrix
            .rows()
            .map(|row| row.iter().map(|(_, v)| v * v).sum())
            .collect()
    }

    #[test]
    fn seeding_picks_distinct_rows() {
        let matrix = blobs();
        let norms = sq_norms(&matrix);
        let mut rng = StdRng::seed_from_u64(7);
        let centroids = kmeans_plus_plus(&matrix, &norms, 4, &mut rng);
        let mut rows: Vec<Vec<f64>> = centroids.rows().into_iter().map(|r| r.to_vec()).collect();
        rows.sort_by(|a, b| a.partial_cmp(b).unwrap());
        rows.dedup();
        assert_eq!(rows.len(), 4);
    }

    #[test]
    fn seeding_falls_back_to_uniform_when_rows_coincide() {
        let matrix = TermDocumentMatrix::from_dense_rows(&[vec![1.0], vec![1.0], vec![1.0]], 1);
        let norms = sq_norms(&matrix);
        let mut rng = StdRng::seed_from_u64(3);
        let centroids = kmeans_plus_plus(&matrix, &norms, 3, &mut rng);
        assert!(centroids.iter().all(|&v| (v - 1.0).abs() < 1e-12));
    }

    #[test]
    fn assign_breaks_ties_towards_lowest_index() {
        let matrix = TermDocumentMatrix::from_dense_rows(&[vec![1.0, 0.0]], 2);
        let norms = sq_norms(&matrix);
        let centroids = ndarray::array![[0.0, 1.0], [0.0, 1.0]];
        let (assignments, inertia) = assign(&matrix, &norms, &centroids);
        assert_eq!(assignments, vec![0]);
        assert!((inertia - 2.0).abs() < 1e-12);
    }

    #[test]
    fn empty_cluster_keeps_previous_centroid() {
        let matrix = blobs();
        let mut centroids = ndarray::array![[0.5, 0.0, 0.5], [5.0, 5.0, 5.0]];
        update_centroids(&matrix, &[0, 0, 0, 0], &mut centroids);
        assert_eq!(centroids.row(1).to_vec(), vec![5.0, 5.0, 5.0]);
        assert!((centroids[[0, 0]] - 0.475).abs() < 1e-12);
    }

    #[test]
    fn run_separates_blobs() {
        let matrix = blobs();
        let norms = sq_norms(&matrix);
        let mut rng = StdRng::seed_from_u64(11);
        let outcome = run_once(&matrix, &norms, 2, 100, 1e-4, &mut rng);
        assert_eq!(outcome.assignments[0], outcome.assignments[1]);
        assert_eq!(outcome.assignments[2], outcome.assignments[3]);
        assert_ne!(outcome.assignments[0], outcome.assignments[2]);
        assert!(outcome.converged);
    }

    #[test]
    fn inertia_history_never_increases() {
        let matrix = blobs();
        let norms = sq_norms(&matrix);
        let mut rng = StdRng::seed_from_u64(5);
        let outcome = run_once(&matrix, &norms, 2, 100, 0.0, &mut rng);
        for pair in outcome.inertia_history.windows(2) {
            assert!(pair[1] <= pair[0] + 1e-12);
        }
        assert_eq!(outcome.inertia_history.last().copied(), Some(outcome.inertia));
    }
}
