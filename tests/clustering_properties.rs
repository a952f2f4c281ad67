// TF-IDF ベクトル化と k-means の性質テスト。
use std::collections::BTreeSet;

use headline_cluster::analysis::{SYNTHETIC_TOPICS, purity, synthetic_headlines};
use headline_cluster::{
    ClusteringError, KMeansConfig, TermDocumentMatrix, VectorizerConfig, cluster, report,
    vectorize,
};
use rayon::ThreadPoolBuilder;
use rstest::rstest;

const PETS_AND_VEHICLES: [&str; 4] = ["cat dog", "cat cat", "car truck", "truck car"];

fn permissive() -> VectorizerConfig {
    VectorizerConfig::default().with_min_df(1).with_max_df(1.0)
}

fn dense_rows(matrix: &TermDocumentMatrix) -> Vec<Vec<f64>> {
    (0..matrix.n_documents())
        .map(|doc| (0..matrix.n_terms()).map(|term| matrix.get(doc, term)).collect())
        .collect()
}

fn total_variance(rows: &[Vec<f64>]) -> f64 {
    let n = rows.len() as f64;
    let width = rows[0].len();
    let mean: Vec<f64> = (0..width)
        .map(|j| rows.iter().map(|row| row[j]).sum::<f64>() / n)
        .collect();
    rows.iter()
        .map(|row| {
            row.iter()
                .zip(&mean)
                .map(|(x, m)| (x - m).powi(2))
                .sum::<f64>()
        })
        .sum()
}

#[test]
fn example_corpus_splits_into_pets_and_vehicles() {
    let (vocabulary, matrix) = vectorize(&PETS_AND_VEHICLES, &permissive()).expect("vectorize");
    assert_eq!(vocabulary.terms(), ["car", "cat", "dog", "truck"]);

    let clustering = cluster(&matrix, &KMeansConfig::new(2).with_seed(42)).expect("cluster");
    let assignments = clustering.assignments();
    assert_eq!(assignments[0], assignments[1]);
    assert_eq!(assignments[2], assignments[3]);
    assert_ne!(assignments[0], assignments[2]);

    let report = report(clustering.centroids(), &vocabulary, 10);
    let pets: BTreeSet<&str> = report
        .cluster(assignments[0])
        .expect("pets cluster")
        .term_names()
        .collect();
    let vehicles: BTreeSet<&str> = report
        .cluster(assignments[2])
        .expect("vehicles cluster")
        .term_names()
        .collect();
    assert_eq!(pets, BTreeSet::from(["cat", "dog"]));
    assert_eq!(vehicles, BTreeSet::from(["car", "truck"]));
}

#[test]
fn rows_are_unit_length_or_empty() {
    let documents = ["storm hits coast", "storm warning", "the and of", "coast guard"];
    let (_, matrix) = vectorize(&documents, &permissive()).expect("vectorize");
    for doc in 0..matrix.n_documents() {
        let norm = matrix.row_norm(doc);
        assert!(
            (norm - 1.0).abs() < 1e-9 || norm == 0.0,
            "row {doc} has norm {norm}"
        );
    }
    assert_eq!(matrix.row_norm(2), 0.0);
}

#[test]
fn vocabulary_is_dense_sorted_and_free_of_stop_words() {
    let documents = ["The cat and the dog", "A dog is not a cat", "Zebras are here"];
    let (vocabulary, matrix) = vectorize(&documents, &permissive()).expect("vectorize");

    let terms = vocabulary.terms().to_vec();
    let mut sorted = terms.clone();
    sorted.sort();
    assert_eq!(terms, sorted);
    for (index, term) in vocabulary.iter() {
        assert_eq!(vocabulary.index_of(term), Some(index));
    }
    for stop_word in ["the", "and", "is", "not", "are", "here"] {
        assert_eq!(vocabulary.index_of(stop_word), None);
    }
    assert_eq!(matrix.n_terms(), vocabulary.len());
}

#[test]
fn single_cluster_inertia_equals_total_variance() {
    let (_, matrix) = vectorize(&PETS_AND_VEHICLES, &permissive()).expect("vectorize");
    let clustering = cluster(&matrix, &KMeansConfig::new(1).with_seed(1)).expect("cluster");

    let expected = total_variance(&dense_rows(&matrix));
    assert!((clustering.inertia() - expected).abs() < 1e-9);
    assert!(clustering.assignments().iter().all(|&c| c == 0));
}

#[test]
fn one_cluster_per_distinct_document_has_zero_inertia() {
    let documents = ["apple banana", "cherry grape", "lemon mango", "peach plum"];
    let (_, matrix) = vectorize(&documents, &permissive()).expect("vectorize");
    let clustering = cluster(&matrix, &KMeansConfig::new(4).with_seed(5)).expect("cluster");

    assert!(clustering.inertia().abs() < 1e-9);
    let distinct: BTreeSet<usize> = clustering.assignments().iter().copied().collect();
    assert_eq!(distinct.len(), 4);
}

#[test]
fn same_seed_gives_identical_clustering() {
    let corpus = synthetic_headlines(120);
    let (_, matrix) =
        vectorize(&corpus.documents, &VectorizerConfig::default()).expect("vectorize");
    let config = KMeansConfig::new(4).with_seed(2024);

    let first = cluster(&matrix, &config).expect("first run");
    let second = cluster(&matrix, &config).expect("second run");
    assert_eq!(first, second);
}

#[test]
fn restarts_do_not_depend_on_thread_count() {
    let corpus = synthetic_headlines(300);
    let (_, matrix) =
        vectorize(&corpus.documents, &VectorizerConfig::default()).expect("vectorize");
    let config = KMeansConfig::new(5).with_seed(99);

    let run_with = |threads: usize| {
        ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()
            .expect("thread pool")
            .install(|| cluster(&matrix, &config))
            .expect("cluster")
    };
    assert_eq!(run_with(1), run_with(8));
}

#[rstest]
#[case(1)]
#[case(3)]
#[case(7)]
fn every_document_gets_a_valid_cluster(#[case] k: usize) {
    let corpus = synthetic_headlines(60);
    let (_, matrix) =
        vectorize(&corpus.documents, &VectorizerConfig::default()).expect("vectorize");
    let clustering = cluster(&matrix, &KMeansConfig::new(k).with_seed(3)).expect("cluster");

    assert_eq!(clustering.assignments().len(), 60);
    assert!(clustering.assignments().iter().all(|&c| c < k));
    assert_eq!(clustering.centroids().k(), k);
    assert_eq!(clustering.cluster_sizes().iter().sum::<usize>(), 60);
}

#[test]
fn inertia_never_increases_across_iterations() {
    let corpus = synthetic_headlines(200);
    let (_, matrix) =
        vectorize(&corpus.documents, &VectorizerConfig::default()).expect("vectorize");
    let clustering = cluster(&matrix, &KMeansConfig::new(6).with_seed(11)).expect("cluster");

    for pair in clustering.inertia_history().windows(2) {
        assert!(pair[1] <= pair[0] + 1e-9, "inertia rose: {pair:?}");
    }
}

#[test]
fn synthetic_topics_are_recovered() {
    let corpus = synthetic_headlines(200);
    let (_, matrix) =
        vectorize(&corpus.documents, &VectorizerConfig::default()).expect("vectorize");
    let clustering = cluster(&matrix, &KMeansConfig::new(SYNTHETIC_TOPICS).with_seed(8))
        .expect("cluster");

    assert!(purity(clustering.assignments(), &corpus.topics) >= 0.9);
}

#[rstest]
#[case(0)]
#[case(5)]
fn cluster_count_outside_document_range_is_rejected(#[case] k: usize) {
    let (_, matrix) = vectorize(&PETS_AND_VEHICLES, &permissive()).expect("vectorize");
    let err = cluster(&matrix, &KMeansConfig::new(k)).expect_err("k must be rejected");
    assert_eq!(
        err,
        ClusteringError::InvalidClusterCount { k, n_documents: 4 }
    );
}

#[test]
fn min_df_above_corpus_size_empties_the_vocabulary() {
    let config = permissive().with_min_df(5);
    let err = vectorize(&PETS_AND_VEHICLES, &config).expect_err("nothing survives");
    assert_eq!(err, ClusteringError::EmptyVocabulary);
}

#[test]
fn empty_corpus_is_rejected() {
    let documents: [&str; 0] = [];
    let err = vectorize(&documents, &VectorizerConfig::default()).expect_err("empty corpus");
    assert_eq!(err, ClusteringError::EmptyCorpus);
}
