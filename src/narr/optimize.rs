//! Exhaustive grid search over HDBSCAN parameters.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::{
    cluster::{ClusterSelectionMethod, Clusterer, DistanceMetric, HdbscanClusterer, HdbscanParams},
    error::ClusterError,
    model::FeatureVectors,
    quality::{Preferred, QualityEvaluator, QualityReport},
};

/// Candidate values per parameter. An empty list means "only the base value".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParameterRanges {
    pub min_cluster_size: Vec<usize>,
    pub min_samples: Vec<usize>,
    pub metric: Vec<DistanceMetric>,
    pub cluster_selection_method: Vec<ClusterSelectionMethod>,
}

impl ParameterRanges {
    /// Every combination, varying the last parameter fastest.
    pub fn grid(&self, base: &HdbscanParams) -> Vec<HdbscanParams> {
        fn or_base<T: Clone>(values: &[T], base: T) -> Vec<T> {
            if values.is_empty() {
                vec![base]
            } else {
                values.to_vec()
            }
        }
        let sizes = or_base(&self.min_cluster_size, base.min_cluster_size);
        let samples = or_base(
            &self.min_samples.iter().copied().map(Some).collect::<Vec<_>>(),
            base.min_samples,
        );
        let metrics = or_base(&self.metric, base.metric);
        let methods = or_base(&self.cluster_selection_method, base.cluster_selection_method);

        let mut grid = Vec::with_capacity(sizes.len() * samples.len() * metrics.len() * methods.len());
        for &size in &sizes {
            for &min_samples in &samples {
                for &metric in &metrics {
                    for &method in &methods {
                        grid.push(HdbscanParams {
                            min_cluster_size: size,
                            min_samples,
                            metric,
                            cluster_selection_method: method,
                            ..base.clone()
                        });
                    }
                }
            }
        }
        grid
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationResult {
    /// `None` when no combination produced a usable clustering.
    pub best_params: Option<HdbscanParams>,
    pub best_score: f64,
    pub best_metrics: Option<QualityReport>,
    pub evaluated: usize,
    pub skipped: usize,
}

/// Cluster and evaluate every combination in `ranges`, keeping the best
/// scoring one. Ties keep the earlier combination in grid order.
pub fn optimize_parameters(
    vectors: &FeatureVectors,
    base: &HdbscanParams,
    ranges: &ParameterRanges,
    evaluator: &QualityEvaluator,
) -> OptimizationResult {
    let grid = ranges.grid(base);
    let scored = grid
        .par_iter()
        .map(|params| {
            let outcome = HdbscanClusterer::new(params.clone()).cluster(vectors)?;
            Ok(evaluator.evaluate(vectors, &outcome.labels, outcome.n_clusters, outcome.n_noise))
        })
        .collect::<Vec<Result<QualityReport, ClusterError>>>();

    let mut best: Option<(&HdbscanParams, QualityReport)> = None;
    let mut skipped = 0;
    for (params, result) in grid.iter().zip(scored) {
        let report = match result {
            Ok(report) if !report.is_error() => report,
            Ok(report) => {
                warn!(
                    params = ?params,
                    error = report.error.as_deref().unwrap_or_default(),
                    "skipping parameter combination, evaluation failed"
                );
                skipped += 1;
                continue;
            }
            Err(e) => {
                warn!(params = ?params, error = %e, "skipping parameter combination, clustering failed");
                skipped += 1;
                continue;
            }
        };
        let better = match &best {
            Some((_, current)) => current.compare(&report).winner == Preferred::Second,
            None => true,
        };
        if better {
            best = Some((params, report));
        }
    }

    let evaluated = grid.len() - skipped;
    let result = match best {
        Some((params, report)) => OptimizationResult {
            best_params: Some(params.clone()),
            best_score: report.overall_quality_score,
            best_metrics: Some(report),
            evaluated,
            skipped,
        },
        None => OptimizationResult {
            best_params: None,
            best_score: 0.0,
            best_metrics: None,
            evaluated,
            skipped,
        },
    };
    info!(
        combinations = grid.len(),
        skipped,
        best_score = result.best_score,
        "parameter search completed"
    );
    result
}
