use linfa::prelude::*;
use linfa_clustering::Dbscan;
use tracing::debug;

use super::{
    Clusterer, PreparedMatrix,
    params::{ClusterSize, DbscanEpsilon, DistanceMetric},
};
use crate::narr::{
    error::ClusterError,
    model::{ClusterAssignment, ClusterLabel, ClusteringOutcome, FeatureVectors},
};

/// Fixed-radius DBSCAN from `linfa-clustering`.
/// See: https://rust-ml.github.io/book/4_dbscan.html
#[derive(Debug, Clone, Copy)]
pub struct DbscanClusterer {
    min_points: ClusterSize,
    tolerance: DbscanEpsilon,
    metric: DistanceMetric,
}

impl DbscanClusterer {
    /// linfa's DBSCAN only knows euclidean distance, so cosine is handled by
    /// normalizing rows first and manhattan is rejected.
    pub fn new(
        min_points: ClusterSize,
        tolerance: DbscanEpsilon,
        metric: DistanceMetric,
    ) -> Result<Self, ClusterError> {
        if metric == DistanceMetric::Manhattan {
            return Err(ClusterError::UnsupportedMetric {
                backend: "dbscan",
                metric,
            });
        }
        Ok(Self {
            min_points,
            tolerance,
            metric,
        })
    }
}

impl Clusterer for DbscanClusterer {
    fn name(&self) -> &'static str {
        "dbscan"
    }

    fn cluster(&self, vectors: &FeatureVectors) -> Result<ClusteringOutcome, ClusterError> {
        let prepared = PreparedMatrix::new(vectors, self.metric)?;
        if prepared.len() < *self.min_points {
            return Ok(prepared.all_noise());
        }

        let cluster_assignments = Dbscan::params(self.min_points.into())
            .tolerance(self.tolerance.into())
            .transform(&prepared.data)
            .map_err(|e| ClusterError::failure(format!("dbscan: {}", e)))?;

        let labels = cluster_assignments
            .iter()
            .map(|assignment| match assignment {
                Some(id) => i32::try_from(*id)
                    .map(ClusterLabel::from)
                    .map_err(|e| ClusterError::failure(e.to_string())),
                None => Ok(ClusterLabel::NOISE),
            })
            .collect::<Result<ClusterAssignment, ClusterError>>()?;

        let outcome = ClusteringOutcome::from_labels(prepared.restore(labels));
        debug!(
            clusters = outcome.n_clusters,
            noise = outcome.n_noise,
            "dbscan finished"
        );
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn squares() -> FeatureVectors {
        vec![
            vec![0.0, 0.0],
            vec![0.1, 0.0],
            vec![0.0, 0.1],
            vec![0.1, 0.1],
            vec![10.0, 10.0],
            vec![10.1, 10.0],
            vec![10.0, 10.1],
            vec![10.1, 10.1],
            vec![50.0, -50.0],
        ]
        .into()
    }

    #[test]
    fn test_dbscan_backend() {
        let clusterer = DbscanClusterer::new(
            ClusterSize::MIN,
            DbscanEpsilon::try_new(0.5).unwrap(),
            DistanceMetric::Euclidean,
        )
        .unwrap();
        let outcome = clusterer.cluster(&squares()).unwrap();
        assert_eq!(outcome.n_clusters, 2);
        assert_eq!(outcome.n_noise, 1);
        assert!(outcome.labels[8].is_noise());
        assert_eq!(outcome.labels[0], outcome.labels[3]);
        assert_ne!(outcome.labels[0], outcome.labels[4]);
    }

    #[test]
    fn test_dbscan_leaves_zero_vectors_as_noise() {
        let mut rows = vec![vec![1.0, 0.0]; 3];
        rows.extend(vec![vec![0.0, 1.0]; 3]);
        rows.extend(vec![vec![0.0, 0.0]; 3]);
        let clusterer = DbscanClusterer::new(
            ClusterSize::MIN,
            DbscanEpsilon::try_new(0.5).unwrap(),
            DistanceMetric::Cosine,
        )
        .unwrap();
        let outcome = clusterer.cluster(&rows.into()).unwrap();
        assert_eq!(outcome.n_clusters, 2);
        assert_eq!(outcome.n_noise, 3);
        assert!(outcome.labels[6..].iter().all(ClusterLabel::is_noise));
    }

    #[test]
    fn test_dbscan_rejects_manhattan() {
        let err = DbscanClusterer::new(
            ClusterSize::MIN,
            DbscanEpsilon::default(),
            DistanceMetric::Manhattan,
        )
        .unwrap_err();
        assert!(matches!(err, ClusterError::UnsupportedMetric { .. }));
        assert!(err.to_string().contains("manhattan"));
    }
}
