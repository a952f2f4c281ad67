//! 数値表の読み込みと学習・評価用の分割。
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use ndarray::{Array2, ArrayView1, ArrayView2, Axis};
use rand::{SeedableRng, rngs::StdRng, seq::SliceRandom};
use serde_json::{Map, Value};

use super::RegressionError;

/// Descriptive names of the energy-efficiency features, in column order.
pub const ENERGY_FEATURES: [&str; 8] = [
    "relative_compactness",
    "surface_area",
    "wall_area",
    "roof_area",
    "overall_height",
    "orientation",
    "glazing_area",
    "glazing_area_distribution",
];

pub const ENERGY_LABELS: [&str; 2] = ["heating_load", "cooling_load"];

/// Raw column codes of the published table, matched when a row lacks the descriptive name.
const ENERGY_RAW_COLUMNS: [(&str, &str); 10] = [
    ("relative_compactness", "X1"),
    ("surface_area", "X2"),
    ("wall_area", "X3"),
    ("roof_area", "X4"),
    ("overall_height", "X5"),
    ("orientation", "X6"),
    ("glazing_area", "X7"),
    ("glazing_area_distribution", "X8"),
    ("heating_load", "Y1"),
    ("cooling_load", "Y2"),
];

#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    feature_names: Vec<String>,
    label_names: Vec<String>,
    features: Array2<f64>,
    labels: Array2<f64>,
}

impl Dataset {
    /// # Errors
    /// Returns [`RegressionError::Shape`] when column counts or row counts disagree.
    pub fn new(
        feature_names: Vec<String>,
        label_names: Vec<String>,
        features: Array2<f64>,
        labels: Array2<f64>,
    ) -> Result<Self, RegressionError> {
        if features.ncols() != feature_names.len() || labels.ncols() != label_names.len() {
            return Err(RegressionError::Shape(
                "column names do not match matrix widths".to_string(),
            ));
        }
        if features.nrows() != labels.nrows() {
            return Err(RegressionError::Shape(format!(
                "{} feature rows but {} label rows",
                features.nrows(),
                labels.nrows()
            )));
        }
        Ok(Self {
            feature_names,
            label_names,
            features,
            labels,
        })
    }

    /// JSON Lines 形式（1行1オブジェクト、数値フィールド）から読み込む。
    ///
    /// # Errors
    /// ファイルが読めない、JSON として不正、または列が欠けている場合はエラーを返す。
    pub fn from_json_lines(
        path: &Path,
        feature_names: &[&str],
        label_names: &[&str],
    ) -> Result<Self, RegressionError> {
        let file = File::open(path).map_err(|source| RegressionError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let mut feature_values = Vec::new();
        let mut label_values = Vec::new();
        let mut rows = 0;
        for (idx, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|source| RegressionError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            if line.trim().is_empty() {
                continue;
            }
            let record: Map<String, Value> =
                serde_json::from_str(&line).map_err(|source| RegressionError::Parse {
                    line: idx + 1,
                    source,
                })?;
            for &name in feature_names {
                feature_values.push(lookup(&record, name, idx + 1)?);
            }
            for &name in label_names {
                label_values.push(lookup(&record, name, idx + 1)?);
            }
            rows += 1;
        }

        let features = Array2::from_shape_vec((rows, feature_names.len()), feature_values)
            .map_err(|error| RegressionError::Shape(error.to_string()))?;
        let labels = Array2::from_shape_vec((rows, label_names.len()), label_values)
            .map_err(|error| RegressionError::Shape(error.to_string()))?;
        tracing::debug!(path = %path.display(), rows, "loaded regression dataset");

        Self::new(
            feature_names.iter().map(ToString::to_string).collect(),
            label_names.iter().map(ToString::to_string).collect(),
            features,
            labels,
        )
    }

    /// エネルギー効率データセットを読み込む。
    ///
    /// # Errors
    /// [`Dataset::from_json_lines`] と同じ。
    pub fn energy_efficiency(path: &Path) -> Result<Self, RegressionError> {
        Self::from_json_lines(path, &ENERGY_FEATURES, &ENERGY_LABELS)
    }

    #[must_use]
    pub fn n_samples(&self) -> usize {
        self.features.nrows()
    }

    #[must_use]
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    #[must_use]
    pub fn label_names(&self) -> &[String] {
        &self.label_names
    }

    #[must_use]
    pub fn features(&self) -> ArrayView2<'_, f64> {
        self.features.view()
    }

    #[must_use]
    pub fn labels(&self) -> ArrayView2<'_, f64> {
        self.labels.view()
    }

    /// # Errors
    /// Returns [`RegressionError::UnknownColumn`] when no label has that name.
    pub fn label(&self, name: &str) -> Result<ArrayView1<'_, f64>, RegressionError> {
        self.label_names
            .iter()
            .position(|label| label == name)
            .map(|idx| self.labels.column(idx))
            .ok_or_else(|| RegressionError::UnknownColumn(name.to_string()))
    }

    fn select_rows(&self, rows: &[usize]) -> Self {
        Self {
            feature_names: self.feature_names.clone(),
            label_names: self.label_names.clone(),
            features: self.features.select(Axis(0), rows),
            labels: self.labels.select(Axis(0), rows),
        }
    }
}

fn lookup(record: &Map<String, Value>, name: &str, line: usize) -> Result<f64, RegressionError> {
    let raw_name = ENERGY_RAW_COLUMNS
        .iter()
        .find(|(descriptive, _)| *descriptive == name)
        .map(|(_, raw)| *raw);
    record
        .get(name)
        .or_else(|| raw_name.and_then(|raw| record.get(raw)))
        .and_then(Value::as_f64)
        .ok_or_else(|| RegressionError::MissingColumn {
            line,
            column: name.to_string(),
        })
}

#[derive(Debug, Clone, PartialEq)]
pub struct Split {
    pub train: Dataset,
    pub test: Dataset,
}

/// Shuffles rows with `seed` and holds out `ceil(n * test_fraction)` of them.
///
/// # Errors
/// Returns [`RegressionError::InvalidSplit`] when either side would be empty.
pub fn train_test_split(
    dataset: &Dataset,
    test_fraction: f64,
    seed: u64,
) -> Result<Split, RegressionError> {
    if !(test_fraction > 0.0 && test_fraction < 1.0) {
        return Err(RegressionError::InvalidSplit(format!(
            "test fraction {test_fraction} is not in (0, 1)"
        )));
    }
    let n = dataset.n_samples();
    let test_size = (n as f64 * test_fraction).ceil() as usize;
    if test_size == 0 || test_size >= n {
        return Err(RegressionError::InvalidSplit(format!(
            "{n} rows cannot be split with test fraction {test_fraction}"
        )));
    }

    let mut rows: Vec<usize> = (0..n).collect();
    rows.shuffle(&mut StdRng::seed_from_u64(seed));
    let (test_rows, train_rows) = rows.split_at(test_size);

    Ok(Split {
        train: dataset.select_rows(train_rows),
        test: dataset.select_rows(test_rows),
    })
}
