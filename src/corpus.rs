//! 見出しコーパスの読み込み。
//!
//! スクレイピング済みの見出しと説明文をローカルファイルから読み、文書列にする。
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CorpusError {
    #[error("failed to read corpus at {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse JSON on line {line}")]
    Parse {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}

/// Source of plain-text documents in a fixed order.
pub trait CorpusSource {
    /// # Errors
    /// Returns [`CorpusError`] when the underlying input cannot be read or parsed.
    fn load(&self) -> Result<Vec<String>, CorpusError>;
}

/// 見出しと説明文の組み合わせ方。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Pairing {
    /// 各見出しを同じ記事の説明文と結合する
    #[default]
    Zip,
    /// すべての見出しをすべての説明文と結合する
    CrossProduct,
}

impl FromStr for Pairing {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "zip" => Ok(Self::Zip),
            "cross" | "cross-product" | "cross_product" => Ok(Self::CrossProduct),
            other => Err(format!("unknown pairing: {other}")),
        }
    }
}

/// 1記事分の見出しと説明文。
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Headline {
    pub headline: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Joins headlines with descriptions into documents.
#[must_use]
pub fn pair_documents(headlines: &[Headline], pairing: Pairing) -> Vec<String> {
    match pairing {
        Pairing::Zip => headlines
            .iter()
            .map(|item| join(&item.headline, item.description.as_deref()))
            .collect(),
        Pairing::CrossProduct => {
            let descriptions: Vec<&str> = headlines
                .iter()
                .filter_map(|item| item.description.as_deref())
                .collect();
            if descriptions.is_empty() {
                return pair_documents(headlines, Pairing::Zip);
            }
            let descriptions = &descriptions;
            headlines
                .iter()
                .flat_map(move |item| {
                    descriptions
                        .iter()
                        .map(move |&description| join(&item.headline, Some(description)))
                })
                .collect()
        }
    }
}

fn join(headline: &str, description: Option<&str>) -> String {
    match description.map(str::trim).filter(|d| !d.is_empty()) {
        Some(description) => format!("{} {}", headline.trim(), description),
        None => headline.trim().to_string(),
    }
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryCorpus {
    documents: Vec<String>,
}

impl InMemoryCorpus {
    #[must_use]
    pub fn new(documents: Vec<String>) -> Self {
        Self { documents }
    }
}

impl CorpusSource for InMemoryCorpus {
    fn load(&self) -> Result<Vec<String>, CorpusError> {
        Ok(self.documents.clone())
    }
}

/// One document per non-blank line.
#[derive(Debug, Clone)]
pub struct LinesCorpus {
    path: PathBuf,
}

impl LinesCorpus {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl CorpusSource for LinesCorpus {
    fn load(&self) -> Result<Vec<String>, CorpusError> {
        let mut documents = Vec::new();
        for line in open_lines(&self.path)? {
            let line = line.map_err(|source| io_error(&self.path, source))?;
            let trimmed = line.trim();
            if !trimmed.is_empty() {
                documents.push(trimmed.to_string());
            }
        }
        Ok(documents)
    }
}

/// JSON Lines of `{"headline": ..., "description": ...}` objects.
#[derive(Debug, Clone)]
pub struct JsonLinesCorpus {
    path: PathBuf,
    pairing: Pairing,
}

impl JsonLinesCorpus {
    pub fn new(path: impl Into<PathBuf>, pairing: Pairing) -> Self {
        Self {
            path: path.into(),
            pairing,
        }
    }

    /// # Errors
    /// Returns [`CorpusError`] when the file cannot be read or a line is not a headline object.
    pub fn headlines(&self) -> Result<Vec<Headline>, CorpusError> {
        let mut headlines = Vec::new();
        for (idx, line) in open_lines(&self.path)?.enumerate() {
            let line = line.map_err(|source| io_error(&self.path, source))?;
            if line.trim().is_empty() {
                continue;
            }
            let record: Headline = serde_json::from_str(&line)
                .map_err(|source| CorpusError::Parse {
                    line: idx + 1,
                    source,
                })?;
            headlines.push(record);
        }
        Ok(headlines)
    }
}

impl CorpusSource for JsonLinesCorpus {
    fn load(&self) -> Result<Vec<String>, CorpusError> {
        let headlines = self.headlines()?;
        let documents = pair_documents(&headlines, self.pairing);
        tracing::debug!(
            path = %self.path.display(),
            headlines = headlines.len(),
            documents = documents.len(),
            pairing = ?self.pairing,
            "loaded headline corpus"
        );
        Ok(documents)
    }
}

fn open_lines(path: &Path) -> Result<std::io::Lines<BufReader<File>>, CorpusError> {
    let file = File::open(path).map_err(|source| io_error(path, source))?;
    Ok(BufReader::new(file).lines())
}

fn io_error(path: &Path, source: std::io::Error) -> CorpusError {
    CorpusError::Io {
        path: path.to_path_buf(),
        source,
    }
}
