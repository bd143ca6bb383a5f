//! Narrative extraction: text cleaning, TF-IDF vectors, density clustering,
//! clustering quality and per-cluster summaries.

pub mod cluster;
pub mod error;
pub mod keywords;
pub mod model;
pub mod narrative;
pub mod optimize;
pub mod pipeline;
pub mod quality;
pub mod sink;
pub mod stopwords;
pub mod text;
pub mod vectorizer;

pub use cluster::{Backend, Clusterer, DbscanClusterer, HdbscanClusterer, HdbscanParams};
pub use model::{ClusterLabel, ClusteringOutcome, FeatureVectors, Narrative, NewsItem};
pub use narrative::NarrativeBuilder;
pub use pipeline::{AnalysisReport, Pipeline};
pub use quality::{QualityEvaluator, QualityReport};
