//! 計測・評価用のユーティリティ群。
use ndarray::{Array1, Array2};
use rand::{Rng, SeedableRng, rngs::StdRng};
use rustc_hash::FxHashMap;

use crate::regression::{Dataset, RegressionError};
use crate::regression::dataset::{ENERGY_FEATURES, ENERGY_LABELS};

/// 合成ヘッドラインとその生成元トピック。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntheticCorpus {
    pub documents: Vec<String>,
    pub topics: Vec<usize>,
}

const TEMPLATES: [&str; 4] = [
    "{company} shares {move} after {quarter} earnings beat analyst forecasts",
    "{team} clinch {result} over {opponent} in {competition} final",
    "researchers unveil {device} that boosts {field} experiments",
    "{storm} storm forces evacuations across {region} coastline",
];

const REPLACEMENTS: [(&str, &[&str]); 11] = [
    ("company", &["Nova Labs", "Cortex Industries", "Parallel Fusion", "Helix Motors"]),
    ("move", &["surge", "slide", "rally", "tumble"]),
    ("quarter", &["first quarter", "second quarter", "annual", "holiday"]),
    ("team", &["Tokyo Sparks", "Osaka Dynamos", "Nagoya Blitz", "Kyoto Falcons"]),
    ("result", &["victory", "comeback win", "narrow win", "shootout win"]),
    ("opponent", &["Seoul Titans", "Taipei Hawks", "Shanghai Comets", "Fukuoka Waves"]),
    ("competition", &["league", "cup", "championship", "playoff"]),
    ("device", &["quantum sensor", "fusion reactor", "gene sequencer", "telescope"]),
    ("field", &["physics", "genomics", "astronomy", "chemistry"]),
    ("storm", &["tropical", "winter", "coastal", "severe"]),
    ("region", &["Florida", "Kyushu", "Queensland", "Brittany"]),
];

/// Number of distinct topics [`synthetic_headlines`] draws from.
pub const SYNTHETIC_TOPICS: usize = TEMPLATES.len();

/// 合成ヘッドラインを生成する。シードは固定なので同じ `count` なら常に同じ結果になる。
#[must_use]
pub fn synthetic_headlines(count: usize) -> SyntheticCorpus {
    let mut rng = StdRng::seed_from_u64(42);
    let mut documents = Vec::with_capacity(count);
    let mut topics = Vec::with_capacity(count);

    for _ in 0..count {
        let topic = rng.random_range(0..TEMPLATES.len());
        let mut headline = TEMPLATES[topic].to_string();
        for (key, options) in &REPLACEMENTS {
            let placeholder = format!("{{{key}}}");
            if headline.contains(&placeholder) {
                let choice = options[rng.random_range(0..options.len())];
                headline = headline.replace(&placeholder, choice);
            }
        }
        documents.push(headline);
        topics.push(topic);
    }

    SyntheticCorpus { documents, topics }
}

/// 各クラスタで最多のトピックが占める割合の加重平均（純度）。
#[must_use]
pub fn purity(assignments: &[usize], topics: &[usize]) -> f64 {
    if assignments.is_empty() {
        return 0.0;
    }
    let mut counts: FxHashMap<usize, FxHashMap<usize, usize>> = FxHashMap::default();
    for (&cluster, &topic) in assignments.iter().zip(topics) {
        *counts.entry(cluster).or_default().entry(topic).or_default() += 1;
    }
    let majority: usize = counts
        .values()
        .map(|by_topic| by_topic.values().copied().max().unwrap_or(0))
        .sum();
    majority as f64 / assignments.len() as f64
}

/// エネルギー効率データセットと同じ列を持つ合成データ。
///
/// 暖房負荷は特徴量の線形結合、冷房負荷は高さとガラス面積の閾値で段差を持つ。
///
/// # Errors
/// 行列の形が列名と一致しない場合（発生しない想定）にエラーを返す。
pub fn synthetic_energy(count: usize, seed: u64) -> Result<Dataset, RegressionError> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut features = Array2::<f64>::zeros((count, ENERGY_FEATURES.len()));
    let mut labels = Array2::<f64>::zeros((count, ENERGY_LABELS.len()));

    for mut row in features.rows_mut() {
        row[0] = rng.random_range(0.62..0.98);
        row[1] = rng.random_range(514.0..808.0);
        row[2] = rng.random_range(245.0..416.0);
        row[3] = rng.random_range(110.0..220.0);
        row[4] = if rng.random::<bool>() { 7.0 } else { 3.5 };
        row[5] = f64::from(rng.random_range(2_u8..=5));
        row[6] = [0.0, 0.1, 0.25, 0.4][rng.random_range(0..4_usize)];
        row[7] = f64::from(rng.random_range(0_u8..=5));
    }

    let noise = Array1::from_iter((0..count).map(|_| rng.random_range(-0.5..0.5)));
    for (idx, row) in features.rows().into_iter().enumerate() {
        let heating = 4.0 * row[4] + 20.0 * row[6] - 0.01 * row[1] + 0.02 * row[2] + noise[idx];
        let cooling = if row[4] > 5.0 { 30.0 } else { 15.0 } + if row[6] > 0.2 { 5.0 } else { 0.0 };
        labels[[idx, 0]] = heating;
        labels[[idx, 1]] = cooling;
    }

    Dataset::new(
        ENERGY_FEATURES.iter().map(ToString::to_string).collect(),
        ENERGY_LABELS.iter().map(ToString::to_string).collect(),
        features,
        labels,
    )
}
