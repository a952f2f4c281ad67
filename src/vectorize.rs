//! コーパスから語彙と TF-IDF 文書語行列を構築する。
use rustc_hash::FxHashMap;
use sprs::{CsMat, CsVecView};

use crate::error::ClusteringError;
use crate::text::{StopWords, Tokenizer, tokenizer::DEFAULT_MIN_TOKEN_LEN};

pub const DEFAULT_MAX_DF: f64 = 0.5;
pub const DEFAULT_MIN_DF: usize = 2;

/// ベクトル化の設定。
#[derive(Debug, Clone, PartialEq)]
pub struct VectorizerConfig {
    /// 文書頻度の上限（文書数に対する割合）
    pub max_df: f64,
    /// 文書頻度の下限（絶対数）
    pub min_df: usize,
    pub stop_words: StopWords,
    pub min_token_len: usize,
}

impl VectorizerConfig {
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
    pub fn with_stop_words(mut self, stop_words: StopWords) -> Self {
        self.stop_words = stop_words;
        self
    }

    #[must_use]
    pub fn with_min_token_len(mut self, min_token_len: usize) -> Self {
        self.min_token_len = min_token_len;
        self
    }

    fn validate(&self) -> Result<(), ClusteringError> {
        if !self.max_df.is_finite() || self.max_df <= 0.0 || self.max_df > 1.0 {
            return Err(ClusteringError::invalid(
                "max_df",
                format!("{} is not in (0, 1]", self.max_df),
            ));
        }
        Ok(())
    }
}

impl Default for VectorizerConfig {
    fn default() -> Self {
        Self {
            max_df: DEFAULT_MAX_DF,
            min_df: DEFAULT_MIN_DF,
            stop_words: StopWords::english(),
            min_token_len: DEFAULT_MIN_TOKEN_LEN,
        }
    }
}

/// 語 → 列番号の対応。番号は 0 始まりで密、語の辞書順に振られる。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vocabulary {
    terms: Vec<String>,
    index: FxHashMap<String, usize>,
    document_frequency: Vec<usize>,
}

impl Vocabulary {
    fn from_sorted(terms_with_df: Vec<(String, usize)>) -> Self {
        let index = terms_with_df
            .iter()
            .enumerate()
            .map(|(idx, (term, _))| (term.clone(), idx))
            .collect();
        let (terms, document_frequency) = terms_with_df.into_iter().unzip();
        Self {
            terms,
            index,
            document_frequency,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.terms.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    #[must_use]
    pub fn index_of(&self, term: &str) -> Option<usize> {
        self.index.get(term).copied()
    }

    #[must_use]
    pub fn term(&self, index: usize) -> Option<&str> {
        self.terms.get(index).map(String::as_str)
    }

    #[must_use]
    pub fn terms(&self) -> &[String] {
        &self.terms
    }

    /// Number of documents containing the term at `index`.
    #[must_use]
    pub fn document_frequency(&self, index: usize) -> Option<usize> {
        self.document_frequency.get(index).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &str)> {
        self.terms.iter().map(String::as_str).enumerate()
    }
}

/// Sparse CSR matrix of TF-IDF weights, one row per document.
#[derive(Debug, Clone)]
pub struct TermDocumentMatrix {
    inner: CsMat<f64>,
}

impl TermDocumentMatrix {
    /// Wraps an existing sparse matrix; CSC input is converted to CSR.
    #[must_use]
    pub fn from_sparse(matrix: CsMat<f64>) -> Self {
        let inner = if matrix.is_csr() {
            matrix
        } else {
            matrix.to_csr()
        };
        Self { inner }
    }

    /// Builds a matrix from dense rows, skipping zero entries.
    #[must_use]
    pub fn from_dense_rows(rows: &[Vec<f64>], n_terms: usize) -> Self {
        let mut indptr = Vec::with_capacity(rows.len() + 1);
        let mut indices = Vec::new();
        let mut data = Vec::new();
        indptr.push(0);
        for row in rows {
            for (col, &value) in row.iter().enumerate().take(n_terms) {
                if value != 0.0 {
                    indices.push(col);
                    data.push(value);
                }
            }
            indptr.push(indices.len());
        }
        Self {
            inner: CsMat::new((rows.len(), n_terms), indptr, indices, data),
        }
    }

    #[must_use]
    pub fn n_documents(&self) -> usize {
        self.inner.rows()
    }

    #[must_use]
    pub fn n_terms(&self) -> usize {
        self.inner.cols()
    }

    #[must_use]
    pub fn nnz(&self) -> usize {
        self.inner.nnz()
    }

    #[must_use]
    pub fn row(&self, document: usize) -> Option<CsVecView<'_, f64>> {
        self.inner.outer_view(document)
    }

    pub fn rows(&self) -> impl Iterator<Item = CsVecView<'_, f64>> {
        self.inner.outer_iterator()
    }

    #[must_use]
    pub fn get(&self, document: usize, term: usize) -> f64 {
        self.inner.get(document, term).copied().unwrap_or(0.0)
    }

    #[must_use]
    pub fn row_norm(&self, document: usize) -> f64 {
        self.row(document)
            .map_or(0.0, |row| row.iter().map(|(_, v)| v * v).sum::<f64>().sqrt())
    }

    #[must_use]
    pub fn as_sparse(&self) -> &CsMat<f64> {
        &self.inner
    }
}

/// `ln((1 + n) / (1 + df)) + 1`
#[must_use]
pub fn smoothed_idf(n_documents: usize, document_frequency: usize) -> f64 {
    ((1.0 + n_documents as f64) / (1.0 + document_frequency as f64)).ln() + 1.0
}

/// 文書列から語彙と L2 正規化済み TF-IDF 行列を構築する。
///
/// # Errors
/// 文書が空なら [`ClusteringError::EmptyCorpus`]、フィルタ後に語が残らなければ
/// [`ClusteringError::EmptyVocabulary`]、`max_df` が範囲外なら
/// [`ClusteringError::InvalidParameter`] を返す。
pub fn vectorize<S: AsRef<str>>(
    documents: &[S],
    config: &VectorizerConfig,
) -> Result<(Vocabulary, TermDocumentMatrix), ClusteringError> {
    config.validate()?;
    if documents.is_empty() {
        return Err(ClusteringError::EmptyCorpus);
    }

    let tokenizer = Tokenizer::new(config.min_token_len);
    let term_counts: Vec<FxHashMap<String, usize>> = documents
        .iter()
        .map(|document| {
            let mut counts: FxHashMap<String, usize> = FxHashMap::default();
            for token in tokenizer.tokenize(document.as_ref()) {
                if !config.stop_words.contains(&token) {
                    *counts.entry(token).or_insert(0) += 1;
                }
            }
            counts
        })
        .collect();

    let mut doc_freq: FxHashMap<&str, usize> = FxHashMap::default();
    for counts in &term_counts {
        for term in counts.keys() {
            *doc_freq.entry(term.as_str()).or_insert(0) += 1;
        }
    }
    let unique_terms = doc_freq.len();

    let n_documents = documents.len();
    let max_count = config.max_df * n_documents as f64;
    let mut retained: Vec<(String, usize)> = doc_freq
        .into_iter()
        .filter(|&(_, df)| df >= config.min_df && df as f64 <= max_count)
        .map(|(term, df)| (term.to_string(), df))
        .collect();
    if retained.is_empty() {
        return Err(ClusteringError::EmptyVocabulary);
    }
    retained.sort_unstable_by(|a, b| a.0.cmp(&b.0));

    let vocabulary = Vocabulary::from_sorted(retained);
    let idf: Vec<f64> = vocabulary
        .document_frequency
        .iter()
        .map(|&df| smoothed_idf(n_documents, df))
        .collect();

    let mut indptr = Vec::with_capacity(n_documents + 1);
    let mut indices = Vec::new();
    let mut data = Vec::new();
    indptr.push(0);
    for counts in &term_counts {
        let mut entries: Vec<(usize, f64)> = counts
            .iter()
            .filter_map(|(term, &count)| {
                vocabulary
                    .index_of(term)
                    .map(|col| (col, count as f64 * idf[col]))
            })
            .collect();
        entries.sort_unstable_by_key(|&(col, _)| col);
        let norm = entries.iter().map(|(_, w)| w * w).sum::<f64>().sqrt();
        for (col, weight) in entries {
            indices.push(col);
            data.push(weight / norm);
        }
        indptr.push(indices.len());
    }

    let matrix = TermDocumentMatrix {
        inner: CsMat::new((n_documents, vocabulary.len()), indptr, indices, data),
    };

    tracing::info!(
        documents = n_documents,
        unique_terms,
        vocabulary_size = vocabulary.len(),
        nnz = matrix.nnz(),
        "vectorized corpus"
    );

    Ok((vocabulary, matrix))
}
