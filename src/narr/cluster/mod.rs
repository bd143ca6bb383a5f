//! Density clustering of feature vectors.
//!
//! [`HdbscanClusterer`] is the primary backend; [`DbscanClusterer`] wraps
//! `linfa-clustering`'s fixed-radius DBSCAN. Both sit behind [`Clusterer`].

mod dbscan;
mod hdbscan;
mod params;
mod tree;

use ndarray::{Array2, Axis};
use serde::{Deserialize, Serialize};
use tracing::debug;

pub use dbscan::DbscanClusterer;
pub use hdbscan::HdbscanClusterer;
pub use params::{ClusterSelectionMethod, ClusterSize, DbscanEpsilon, DistanceMetric, HdbscanParams};

use super::{
    error::ClusterError,
    model::{ClusterAssignment, ClusterLabel, ClusteringOutcome, FeatureVectors},
};

/// A clustering backend. Implementations are deterministic: equal input
/// gives equal labels.
pub trait Clusterer: Send + Sync {
    fn name(&self) -> &'static str;

    fn cluster(&self, vectors: &FeatureVectors) -> Result<ClusteringOutcome, ClusterError>;
}

/// Which backend a run uses.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    Serialize,
    Deserialize,
    clap::ValueEnum,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Backend {
    #[default]
    Hdbscan,
    Dbscan,
}

impl Backend {
    /// Build the clusterer for this backend. DBSCAN takes its minimum
    /// neighbourhood from `min_cluster_size`.
    pub fn clusterer(
        &self,
        params: &HdbscanParams,
        dbscan_tolerance: DbscanEpsilon,
    ) -> Result<Box<dyn Clusterer>, ClusterError> {
        Ok(match self {
            Backend::Hdbscan => Box::new(HdbscanClusterer::new(params.clone())),
            Backend::Dbscan => Box::new(DbscanClusterer::new(
                ClusterSize::try_new(params.min_cluster_size.max(ClusterSize::MIN.into()))?,
                dbscan_tolerance,
                params.metric,
            )?),
        })
    }
}

/// Cluster with the default backend.
pub fn cluster(
    vectors: &FeatureVectors,
    params: &HdbscanParams,
) -> Result<ClusteringOutcome, ClusterError> {
    HdbscanClusterer::new(params.clone()).cluster(vectors)
}

/// Checked matrix for a metric, holding only the rows a backend should see.
///
/// Cosine rows are L2-normalized so that euclidean distance can stand in for
/// it. A zero row has no direction, so it is held out and always ends as
/// noise.
#[derive(Debug, Clone)]
pub struct PreparedMatrix {
    pub data: Array2<f64>,
    kept: Vec<usize>,
    total: usize,
}

impl PreparedMatrix {
    pub fn new(vectors: &FeatureVectors, metric: DistanceMetric) -> Result<Self, ClusterError> {
        let mut data = vectors.as_ndarray()?;
        let total = data.nrows();
        if metric != DistanceMetric::Cosine {
            return Ok(Self {
                data,
                kept: (0..total).collect(),
                total,
            });
        }

        let mut kept = Vec::with_capacity(total);
        for (idx, mut row) in data.rows_mut().into_iter().enumerate() {
            let norm = row.iter().map(|x| x * x).sum::<f64>().sqrt();
            if norm > 0.0 {
                row.mapv_inplace(|x| x / norm);
                kept.push(idx);
            }
        }
        if kept.len() < total {
            debug!(
                zero_rows = total - kept.len(),
                "zero vectors held out as noise"
            );
            data = data.select(Axis(0), &kept);
        }
        Ok(Self { data, kept, total })
    }

    /// Number of rows handed to the backend.
    pub fn len(&self) -> usize {
        self.kept.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kept.is_empty()
    }

    /// Spread the labels of the kept rows back over every input row. Held
    /// out rows are noise.
    pub fn restore(&self, labels: ClusterAssignment) -> ClusterAssignment {
        if self.kept.len() == self.total {
            return labels;
        }
        let mut restored = vec![ClusterLabel::NOISE; self.total];
        for (row, label) in self.kept.iter().zip(labels) {
            restored[*row] = label;
        }
        restored.into()
    }

    pub fn all_noise(&self) -> ClusteringOutcome {
        ClusteringOutcome::all_noise(self.total)
    }
}
