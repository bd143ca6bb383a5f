//! Error types for the analytics engine.
//!
//! Only [`ClusterError`] and [`NarrativeError`] ever reach a caller of the
//! core. [`MetricError`] and [`KeywordError`] are recovered where they occur:
//! the quality evaluator omits a metric it cannot compute, and the keyword
//! extractor falls back to plain term frequencies.

use super::cluster::DistanceMetric;

/// Failures of the density clusterer. All of these are fatal for a batch and
/// are not retried, since the algorithm is deterministic.
#[derive(Debug, thiserror::Error)]
pub enum ClusterError {
    /// Empty, ragged or non-finite input.
    #[error("input shape error: {reason}")]
    InputShape { reason: String },

    /// A clustering parameter is out of range.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// The backend could not express the requested metric.
    #[error("{backend} backend does not support the {metric} metric")]
    UnsupportedMetric {
        backend: &'static str,
        metric: DistanceMetric,
    },

    /// Unexpected internal failure of the clustering algorithm.
    #[error("clustering failed: {0}")]
    Failure(String),
}

impl ClusterError {
    pub fn input_shape(reason: impl Into<String>) -> Self {
        Self::InputShape {
            reason: reason.into(),
        }
    }

    pub fn invalid_parameter(reason: impl Into<String>) -> Self {
        Self::InvalidParameter(reason.into())
    }

    pub fn failure(reason: impl Into<String>) -> Self {
        Self::Failure(reason.into())
    }
}

/// A single quality metric could not be computed.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MetricError {
    #[error("number of labels is {labels}; valid values are 2 to n_samples - 1 ({samples} samples)")]
    LabelCount { labels: usize, samples: usize },

    #[error("labels ({labels}) and vectors ({vectors}) differ in length")]
    LengthMismatch { labels: usize, vectors: usize },

    #[error("degenerate input: {0}")]
    Degenerate(String),
}

/// A term-weighting model could not be fitted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VectorizeError {
    #[error("no documents to fit")]
    NoDocuments,

    #[error("no terms remain after pruning ({documents} documents)")]
    EmptyVocabulary { documents: usize },

    #[error("max_df leaves room for {max_doc_count} documents, fewer than min_df = {min_df}")]
    DocumentFrequencyBounds { max_doc_count: usize, min_df: usize },
}

/// Keyword ranking for one cluster failed; triggers the frequency fallback.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeywordError {
    #[error("local term model failed to fit: {0}")]
    ModelFit(#[from] VectorizeError),

    #[error("every ranked term was filtered out")]
    NoTerms,
}

/// Mismatched inputs handed to the narrative builder.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NarrativeError {
    #[error("{items} items but {labels} labels")]
    LengthMismatch { items: usize, labels: usize },
}

/// Anything that can stop a batch run.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Clustering(#[from] ClusterError),

    #[error("vectorization failed: {0}")]
    Vectorization(#[from] VectorizeError),

    #[error(transparent)]
    Narrative(#[from] NarrativeError),
}
