//! ベクトル化とクラスタリングの入力検証エラー。
use thiserror::Error;

/// 入力検証で検出されるエラー。いずれもフィット開始前に呼び出し元へ返す。
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ClusteringError {
    #[error("corpus contains no documents")]
    EmptyCorpus,
    #[error("no term survived the document-frequency and stop-word filters")]
    EmptyVocabulary,
    #[error("invalid cluster count k={k} for {n_documents} documents")]
    InvalidClusterCount { k: usize, n_documents: usize },
    #[error("term-document matrix has no columns")]
    DegenerateInput,
    #[error("invalid value for {name}: {reason}")]
    InvalidParameter { name: &'static str, reason: String },
}

impl ClusteringError {
    pub(crate) fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_cluster_count_names_both_sides() {
        let error = ClusteringError::InvalidClusterCount {
            k: 5,
            n_documents: 3,
        };
        assert_eq!(
            error.to_string(),
            "invalid cluster count k=5 for 3 documents"
        );
    }

    #[test]
    fn invalid_parameter_carries_reason() {
        let error = ClusteringError::invalid("max_df", "must be in (0, 1]");
        assert_eq!(error.to_string(), "invalid value for max_df: must be in (0, 1]");
    }
}
