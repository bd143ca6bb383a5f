//! TF-IDF term weighting.
//!
//! Tokens match `\b\w\w+\b`; n-grams join consecutive tokens with a single
//! space. IDF is smoothed (`ln((1 + n) / (1 + df)) + 1`) and every row is
//! L2-normalized. Columns are in lexicographic term order.

use std::{
    collections::{BTreeMap, BTreeSet},
    sync::LazyLock,
};

use ndarray::Array2;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{error::VectorizeError, model::FeatureVectors, stopwords::StopWords};

static TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\w\w+\b").expect("Failed to compile regex!"));

/// Split text into word tokens, lowercasing first when asked.
pub fn tokenize(text: &str, lowercase: bool) -> Vec<String> {
    let text = if lowercase {
        text.to_lowercase()
    } else {
        text.to_owned()
    };
    TOKEN
        .find_iter(&text)
        .map(|m| m.as_str().to_owned())
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TfidfConfig {
    /// Keep at most this many terms, by corpus frequency.
    pub max_features: usize,
    /// Minimum number of documents a term must appear in.
    pub min_df: usize,
    /// Maximum share of documents a term may appear in.
    pub max_df: f64,
    pub ngram_range: (usize, usize),
    /// Use `1 + ln(tf)` instead of raw counts.
    pub sublinear_tf: bool,
    pub lowercase: bool,
}

impl Default for TfidfConfig {
    fn default() -> Self {
        Self {
            max_features: 5000,
            min_df: 2,
            max_df: 0.95,
            ngram_range: (1, 2),
            sublinear_tf: false,
            lowercase: false,
        }
    }
}

/// Fitted weights: one row per document, one column per vocabulary term.
#[derive(Debug, Clone, PartialEq)]
pub struct TfidfMatrix {
    pub vocabulary: Vec<String>,
    pub matrix: Array2<f64>,
}

impl TfidfMatrix {
    pub fn n_documents(&self) -> usize {
        self.matrix.nrows()
    }

    pub fn n_terms(&self) -> usize {
        self.vocabulary.len()
    }

    pub fn to_feature_vectors(&self) -> FeatureVectors {
        self.matrix.clone().into()
    }
}

/// Builds a TF-IDF matrix from scratch for every corpus it's given.
#[derive(Debug, Clone, Default)]
pub struct TfidfVectorizer {
    config: TfidfConfig,
    stop_words: Option<StopWords>,
}

impl TfidfVectorizer {
    pub fn new(config: TfidfConfig) -> Self {
        Self {
            config,
            stop_words: None,
        }
    }

    /// Drop these words before n-grams are formed.
    #[must_use]
    pub fn with_stop_words(mut self, stop_words: StopWords) -> Self {
        self.stop_words = Some(stop_words);
        self
    }

    pub fn config(&self) -> &TfidfConfig {
        &self.config
    }

    fn analyze(&self, doc: &str) -> Vec<String> {
        let tokens = tokenize(doc, self.config.lowercase)
            .into_iter()
            .filter(|t| !self.stop_words.as_ref().is_some_and(|s| s.contains(t)))
            .collect::<Vec<String>>();
        let (min_n, max_n) = self.config.ngram_range;
        let mut terms = Vec::new();
        for n in min_n.max(1)..=max_n {
            terms.extend(tokens.windows(n).map(|w| w.join(" ")));
        }
        terms
    }

    pub fn fit_transform<S: AsRef<str>>(&self, documents: &[S]) -> Result<TfidfMatrix, VectorizeError> {
        let n_docs = documents.len();
        if n_docs == 0 {
            return Err(VectorizeError::NoDocuments);
        }
        let max_doc_count = (self.config.max_df * n_docs as f64).ceil() as usize;
        if max_doc_count < self.config.min_df {
            return Err(VectorizeError::DocumentFrequencyBounds {
                max_doc_count,
                min_df: self.config.min_df,
            });
        }

        let counts = documents
            .iter()
            .map(|doc| {
                let mut counts: BTreeMap<String, usize> = BTreeMap::new();
                for term in self.analyze(doc.as_ref()) {
                    *counts.entry(term).or_insert(0) += 1;
                }
                counts
            })
            .collect::<Vec<_>>();

        // corpus frequency and document frequency, in lexicographic order
        let mut totals: BTreeMap<&str, (usize, usize)> = BTreeMap::new();
        for doc in &counts {
            for (term, count) in doc {
                let entry = totals.entry(term.as_str()).or_insert((0, 0));
                entry.0 += count;
                entry.1 += 1;
            }
        }
        let mut kept = totals
            .into_iter()
            .filter(|(_, (_, df))| *df >= self.config.min_df && *df <= max_doc_count)
            .collect::<Vec<_>>();
        if kept.len() > self.config.max_features {
            let mut by_frequency = kept.clone();
            by_frequency.sort_by(|a, b| b.1.0.cmp(&a.1.0));
            let limit = by_frequency
                .into_iter()
                .take(self.config.max_features)
                .map(|(term, _)| term)
                .collect::<BTreeSet<&str>>();
            kept.retain(|(term, _)| limit.contains(term));
        }
        if kept.is_empty() {
            return Err(VectorizeError::EmptyVocabulary { documents: n_docs });
        }

        let vocabulary = kept.iter().map(|(t, _)| (*t).to_owned()).collect::<Vec<String>>();
        let idf = kept
            .iter()
            .map(|(_, (_, df))| ((1.0 + n_docs as f64) / (1.0 + *df as f64)).ln() + 1.0)
            .collect::<Vec<f64>>();

        let mut matrix = Array2::<f64>::zeros((n_docs, vocabulary.len()));
        for (row, doc) in counts.iter().enumerate() {
            for (col, term) in vocabulary.iter().enumerate() {
                let Some(&tf) = doc.get(term) else { continue };
                let tf = if self.config.sublinear_tf {
                    1.0 + (tf as f64).ln()
                } else {
                    tf as f64
                };
                matrix[[row, col]] = tf * idf[col];
            }
            let mut r = matrix.row_mut(row);
            let norm = r.iter().map(|x| x * x).sum::<f64>().sqrt();
            if norm > 0.0 {
                r.mapv_inplace(|x| x / norm);
            }
        }

        debug!(
            documents = n_docs,
            terms = vocabulary.len(),
            "tf-idf matrix built"
        );
        Ok(TfidfMatrix { vocabulary, matrix })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unigrams(min_df: usize, max_df: f64) -> TfidfVectorizer {
        TfidfVectorizer::new(TfidfConfig {
            min_df,
            max_df,
            ngram_range: (1, 1),
            ..TfidfConfig::default()
        })
    }

    #[test]
    fn test_tokenize() {
        assert_eq!(
            tokenize("Рост цен, a b ab-cd 42", true),
            vec!["рост", "цен", "ab", "cd", "42"]
        );
    }

    #[test]
    fn test_vocabulary_and_norms() {
        let docs = ["apple banana", "apple cherry", "banana cherry apple"];
        let tfidf = unigrams(1, 1.0).fit_transform(&docs).unwrap();
        assert_eq!(tfidf.vocabulary, vec!["apple", "banana", "cherry"]);
        assert_eq!(tfidf.matrix.dim(), (3, 3));
        for row in tfidf.matrix.rows() {
            let norm = row.dot(&row).sqrt();
            assert!((norm - 1.0).abs() < 1e-12);
        }
        // apple is everywhere, so it weighs less than banana in doc 0
        assert!(tfidf.matrix[[0, 0]] < tfidf.matrix[[0, 1]]);
        assert_eq!(tfidf.matrix[[0, 2]], 0.0);
    }

    #[test]
    fn test_smooth_idf() {
        let docs = ["alpha beta", "alpha"];
        let tfidf = unigrams(1, 1.0).fit_transform(&docs).unwrap();
        let alpha_idf: f64 = 1.0;
        let beta_idf = (3.0f64 / 2.0).ln() + 1.0;
        let norm = (alpha_idf.powi(2) + beta_idf.powi(2)).sqrt();
        assert!((tfidf.matrix[[0, 0]] - alpha_idf / norm).abs() < 1e-12);
        assert!((tfidf.matrix[[0, 1]] - beta_idf / norm).abs() < 1e-12);
        assert_eq!(tfidf.matrix[[1, 0]], 1.0);
    }

    #[test]
    fn test_document_frequency_pruning() {
        let docs = ["common rare", "common other", "common other"];
        let tfidf = unigrams(2, 0.5).fit_transform(&docs).unwrap();
        // common is in 3 > ceil(1.5) documents, rare only in 1
        assert_eq!(tfidf.vocabulary, vec!["other"]);
        assert_eq!(tfidf.matrix.row(0).sum(), 0.0);
    }

    #[test]
    fn test_max_features_keeps_most_frequent() {
        let docs = ["zeta zeta zeta alpha", "zeta beta beta", "gamma"];
        let vectorizer = TfidfVectorizer::new(TfidfConfig {
            max_features: 2,
            min_df: 1,
            max_df: 1.0,
            ngram_range: (1, 1),
            ..TfidfConfig::default()
        });
        let tfidf = vectorizer.fit_transform(&docs).unwrap();
        assert_eq!(tfidf.vocabulary, vec!["beta", "zeta"]);
    }

    #[test]
    fn test_ngrams_and_stop_words() {
        let vectorizer = TfidfVectorizer::new(TfidfConfig {
            min_df: 1,
            max_df: 1.0,
            ngram_range: (1, 2),
            lowercase: true,
            ..TfidfConfig::default()
        })
        .with_stop_words(StopWords::builtin());
        let tfidf = vectorizer.fit_transform(&["The Central Bank"]).unwrap();
        assert_eq!(
            tfidf.vocabulary,
            vec!["bank", "central", "central bank"]
        );
    }

    #[test]
    fn test_errors() {
        let empty: [&str; 0] = [];
        assert_eq!(
            unigrams(1, 1.0).fit_transform(&empty),
            Err(VectorizeError::NoDocuments)
        );
        assert_eq!(
            unigrams(1, 1.0).fit_transform(&["", "a"]),
            Err(VectorizeError::EmptyVocabulary { documents: 2 })
        );
        assert_eq!(
            unigrams(2, 0.95).fit_transform(&["alpha beta"]),
            Err(VectorizeError::DocumentFrequencyBounds {
                max_doc_count: 1,
                min_df: 2
            })
        );
    }
}
