// エネルギー効率回帰パイプラインの結合テスト。
use std::io::Write;
use std::num::NonZeroUsize;

use clap::Parser;
use headline_cluster::analysis::synthetic_energy;
use headline_cluster::cli::{Cli, run};
use headline_cluster::config::Config;
use headline_cluster::observability::Telemetry;
use headline_cluster::regression::dataset::ENERGY_FEATURES;
use headline_cluster::regression::{Dataset, RegressionError, train_test_split};
use headline_cluster::{PipelineError, RegressionPipeline, RegressionSettings};
use tempfile::NamedTempFile;

fn settings() -> RegressionSettings {
    RegressionSettings {
        forest_trees: 30,
        workers: NonZeroUsize::new(2).expect("non-zero"),
        ..RegressionSettings::default()
    }
}

#[test]
fn linear_models_fit_the_linear_heating_load() {
    let dataset = synthetic_energy(240, 7).expect("dataset");
    let scores = RegressionPipeline::new(settings())
        .run(&dataset, "heating_load")
        .expect("pipeline");

    let models: Vec<&str> = scores.iter().map(|s| s.model).collect();
    assert_eq!(models, ["ridge", "linear", "random_forest"]);
    let linear = scores.iter().find(|s| s.model == "linear").expect("linear");
    assert!(linear.scores.r2 > 0.95, "linear r2 = {}", linear.scores.r2);
    assert!(linear.scores.mae < 0.5);
}

#[test]
fn forest_fits_the_stepped_cooling_load() {
    let dataset = synthetic_energy(240, 11).expect("dataset");
    let scores = RegressionPipeline::new(settings())
        .run(&dataset, "cooling_load")
        .expect("pipeline");

    let forest = scores
        .iter()
        .find(|s| s.model == "random_forest")
        .expect("forest");
    assert!(forest.scores.r2 > 0.9, "forest r2 = {}", forest.scores.r2);
}

#[test]
fn run_all_scores_every_label() {
    let dataset = synthetic_energy(80, 1).expect("dataset");
    let scores = RegressionPipeline::new(settings())
        .run_all(&dataset)
        .expect("pipeline");
    assert_eq!(scores.len(), 6);
    assert!(scores.iter().take(3).all(|s| s.label == "heating_load"));
    assert!(scores.iter().skip(3).all(|s| s.label == "cooling_load"));
}

#[test]
fn unknown_label_is_rejected() {
    let dataset = synthetic_energy(40, 2).expect("dataset");
    let err = RegressionPipeline::new(settings())
        .run(&dataset, "lighting_load")
        .expect_err("unknown label");
    assert!(matches!(
        err,
        PipelineError::Regression(RegressionError::UnknownColumn(_))
    ));
}

#[test]
fn split_is_seeded_and_disjoint() {
    let dataset = synthetic_energy(20, 4).expect("dataset");
    let first = train_test_split(&dataset, 0.25, 9).expect("split");
    let second = train_test_split(&dataset, 0.25, 9).expect("split");
    assert_eq!(first, second);
    assert_eq!(first.test.n_samples(), 5);
    assert_eq!(first.train.n_samples(), 15);

    for test_row in first.test.features().rows() {
        assert!(
            first
                .train
                .features()
                .rows()
                .into_iter()
                .all(|train_row| train_row != test_row)
        );
    }
}

const RAW_COLUMNS: [&str; 10] = ["X1", "X2", "X3", "X4", "X5", "X6", "X7", "X8", "Y1", "Y2"];

#[test]
fn energy_file_with_raw_column_names_loads() {
    let mut file = NamedTempFile::new().expect("temp file");
    for row in 0..4 {
        let mut fields: Vec<String> = RAW_COLUMNS
            .iter()
            .enumerate()
            .map(|(idx, name)| format!("\"{name}\": {}", row * 10 + idx))
            .collect();
        fields.sort();
        writeln!(file, "{{{}}}", fields.join(", ")).expect("write row");
    }
    file.flush().expect("flush");

    let dataset = Dataset::energy_efficiency(file.path()).expect("dataset");
    assert_eq!(dataset.n_samples(), 4);
    assert_eq!(dataset.feature_names().len(), ENERGY_FEATURES.len());
    assert_eq!(dataset.features()[[1, 0]], 10.0);
    assert_eq!(dataset.label("cooling_load").expect("label")[3], 39.0);
}

#[test]
fn cli_regress_json_scores_every_model_and_label() {
    let dataset = synthetic_energy(80, 5).expect("dataset");
    let mut file = NamedTempFile::new().expect("temp file");
    for row in 0..dataset.n_samples() {
        let mut record = serde_json::Map::new();
        for (name, value) in dataset.feature_names().iter().zip(dataset.features().row(row)) {
            record.insert(name.clone(), serde_json::json!(value));
        }
        for (name, value) in dataset.label_names().iter().zip(dataset.labels().row(row)) {
            record.insert(name.clone(), serde_json::json!(value));
        }
        writeln!(file, "{}", serde_json::Value::Object(record)).expect("write row");
    }
    file.flush().expect("flush");

    let path = file.path().to_string_lossy().to_string();
    let cli = Cli::try_parse_from([
        "headline-cluster",
        "regress",
        "--dataset",
        path.as_str(),
        "--trees",
        "5",
        "--json",
    ])
    .expect("valid arguments");
    let config = temp_env::with_vars_unset(
        [
            "HEADLINE_CLUSTER_TEST_FRACTION",
            "HEADLINE_CLUSTER_SPLIT_SEED",
            "HEADLINE_CLUSTER_RIDGE_ALPHA",
            "HEADLINE_CLUSTER_WORKERS",
        ],
        Config::from_env,
    )
    .expect("config");
    let telemetry = Telemetry::metrics_only().expect("telemetry");
    let mut out = Vec::new();
    run(&cli, config, &telemetry, &mut out).expect("cli run");

    let value: serde_json::Value = serde_json::from_slice(&out).expect("json scores");
    let scores = value.as_array().expect("scores array");
    let models: Vec<&str> = scores
        .iter()
        .map(|score| score["model"].as_str().expect("model"))
        .collect();
    assert_eq!(
        models,
        ["ridge", "linear", "random_forest", "ridge", "linear", "random_forest"]
    );
    assert_eq!(scores[0]["label"], "heating_load");
    assert_eq!(scores[5]["label"], "cooling_load");
    for score in scores {
        for metric in ["mse", "mae", "r2"] {
            assert!(score["scores"][metric].is_f64(), "missing {metric}");
        }
    }
}
