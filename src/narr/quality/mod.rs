//! Quality evaluation of a flat clustering.
//!
//! [`QualityEvaluator::evaluate`] never fails: each metric group is computed
//! independently, metrics that can't be computed are left out of the
//! report, and an unusable input produces a report graded
//! [`QualityGrade::Error`] instead of an error.

mod metrics;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

pub use metrics::{calinski_harabasz_score, davies_bouldin_score, silhouette_score};

use super::{
    error::MetricError,
    model::{ClusterLabel, ClusterStats, FeatureVectors},
};

/// Clusters holding more than this share of the clustered points are "large".
const LARGE_CLUSTER_SHARE: f64 = 0.3;
/// Clusters with fewer points than this are "small".
const SMALL_CLUSTER_SIZE: usize = 5;
/// Below this many samples external metrics are skipped.
const MIN_SAMPLES_FOR_EXTERNAL: usize = 10;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum QualityGrade {
    Error,
    Bad,
    Poor,
    Fair,
    Good,
    Excellent,
}

impl QualityGrade {
    pub fn from_score(score: f64) -> Self {
        match score {
            s if s >= 0.8 => QualityGrade::Excellent,
            s if s >= 0.7 => QualityGrade::Good,
            s if s >= 0.6 => QualityGrade::Fair,
            s if s >= 0.4 => QualityGrade::Poor,
            _ => QualityGrade::Bad,
        }
    }
}

/// Size distribution of the non-noise clusters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SizeStatistics {
    pub avg_cluster_size: f64,
    pub max_cluster_size: usize,
    pub min_cluster_size: usize,
    pub cluster_size_std: f64,
    pub cluster_size_variance: f64,
    /// Share of clustered points in the largest cluster.
    pub dominant_cluster_ratio: f64,
    pub size_distribution: BTreeMap<ClusterLabel, usize>,
}

impl SizeStatistics {
    fn from_stats(stats: &ClusterStats) -> Self {
        let sizes = stats.sizes.values().copied().collect::<Vec<usize>>();
        let (Some(&max), Some(&min)) = (sizes.iter().max(), sizes.iter().min()) else {
            return Self::default();
        };
        let (mean, variance) = mean_and_variance(&sizes);
        let clustered = stats.clustered();
        Self {
            avg_cluster_size: mean,
            max_cluster_size: max,
            min_cluster_size: min,
            cluster_size_std: variance.sqrt(),
            cluster_size_variance: variance,
            dominant_cluster_ratio: if clustered > 0 {
                max as f64 / clustered as f64
            } else {
                0.0
            },
            size_distribution: stats.sizes.clone(),
        }
    }
}

/// Population mean and variance.
fn mean_and_variance(values: &[usize]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<usize>() as f64 / n;
    let variance = values
        .iter()
        .map(|v| (*v as f64 - mean).powi(2))
        .sum::<f64>()
        / n;
    (mean, variance)
}

/// Geometry-based metrics; each is `None` when it was skipped or failed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExternalMetrics {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub silhouette_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub calinski_harabasz_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub davies_bouldin_score: Option<f64>,
}

/// Label-only metrics, all in `[0, 1]`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InternalMetrics {
    pub balance_score: f64,
    pub coverage_score: f64,
    pub compactness_score: f64,
    pub efficiency_score: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StabilityMetrics {
    pub single_point_clusters: usize,
    pub large_clusters: usize,
    pub small_clusters: usize,
    pub medium_clusters: usize,
    pub stability_score: f64,
}

/// Weights of the normalized metrics in the overall score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreWeights {
    pub silhouette: f64,
    pub calinski_harabasz: f64,
    pub davies_bouldin: f64,
    pub coverage: f64,
    pub balance: f64,
    pub stability: f64,
    pub efficiency: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            silhouette: 0.25,
            calinski_harabasz: 0.15,
            davies_bouldin: 0.0,
            coverage: 0.20,
            balance: 0.15,
            stability: 0.15,
            efficiency: 0.10,
        }
    }
}

/// Outcome of evaluating one clustering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityReport {
    pub n_clusters: usize,
    pub n_noise: usize,
    pub total_samples: usize,
    pub clustered_samples: usize,
    pub noise_ratio: f64,
    pub clustering_ratio: f64,
    pub size: SizeStatistics,
    #[serde(flatten)]
    pub external: ExternalMetrics,
    #[serde(flatten)]
    pub internal: InternalMetrics,
    #[serde(flatten)]
    pub stability: StabilityMetrics,
    pub overall_quality_score: f64,
    pub quality_grade: QualityGrade,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl QualityReport {
    fn failed(n_clusters: usize, n_noise: usize, error: impl Into<String>) -> Self {
        Self {
            n_clusters,
            n_noise,
            total_samples: 0,
            clustered_samples: 0,
            noise_ratio: 0.0,
            clustering_ratio: 0.0,
            size: SizeStatistics::default(),
            external: ExternalMetrics::default(),
            internal: InternalMetrics::default(),
            stability: StabilityMetrics::default(),
            overall_quality_score: 0.0,
            quality_grade: QualityGrade::Error,
            error: Some(error.into()),
        }
    }

    pub fn is_error(&self) -> bool {
        self.quality_grade == QualityGrade::Error
    }

    /// Compare against another report; `other` wins only with a strictly
    /// higher score.
    pub fn compare(&self, other: &QualityReport) -> QualityComparison {
        let score_diff = other.overall_quality_score - self.overall_quality_score;
        QualityComparison {
            score_diff,
            winner: if score_diff > 0.0 {
                Preferred::Second
            } else {
                Preferred::First
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Preferred {
    First,
    Second,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityComparison {
    pub score_diff: f64,
    pub winner: Preferred,
}

/// Evaluates clusterings with a fixed set of score weights.
#[derive(Debug, Clone, Default)]
pub struct QualityEvaluator {
    weights: ScoreWeights,
}

impl QualityEvaluator {
    pub fn new(weights: ScoreWeights) -> Self {
        Self { weights }
    }

    pub fn weights(&self) -> &ScoreWeights {
        &self.weights
    }

    pub fn evaluate(
        &self,
        vectors: &FeatureVectors,
        labels: &[ClusterLabel],
        n_clusters: usize,
        n_noise: usize,
    ) -> QualityReport {
        if labels.len() != vectors.len() {
            let err = MetricError::LengthMismatch {
                labels: labels.len(),
                vectors: vectors.len(),
            };
            warn!(error = %err, "clustering quality evaluation failed");
            return QualityReport::failed(n_clusters, n_noise, err.to_string());
        }

        let total = labels.len();
        let clustered = total.saturating_sub(n_noise);
        let ratio = |part: usize| {
            if total > 0 {
                part as f64 / total as f64
            } else {
                0.0
            }
        };
        let stats = ClusterStats::from_labels(labels);

        let external = if total > MIN_SAMPLES_FOR_EXTERNAL && n_clusters > 1 && n_clusters < clustered
        {
            external_metrics(vectors, labels)
        } else {
            ExternalMetrics::default()
        };
        let internal = internal_metrics(&stats, total, n_clusters, n_noise);
        let stability = stability_metrics(&stats, n_clusters);

        let mut report = QualityReport {
            n_clusters,
            n_noise,
            total_samples: total,
            clustered_samples: clustered,
            noise_ratio: ratio(n_noise),
            clustering_ratio: ratio(clustered),
            size: SizeStatistics::from_stats(&stats),
            external,
            internal,
            stability,
            overall_quality_score: 0.0,
            quality_grade: QualityGrade::Bad,
            error: None,
        };
        report.overall_quality_score = self.overall_score(&report);
        report.quality_grade = QualityGrade::from_score(report.overall_quality_score);

        info!(
            clusters = n_clusters,
            noise_ratio = report.noise_ratio,
            quality_score = report.overall_quality_score,
            grade = %report.quality_grade,
            "clustering quality evaluation completed"
        );
        report
    }

    /// Weighted mean of the normalized metrics present in the report.
    fn overall_score(&self, report: &QualityReport) -> f64 {
        let w = &self.weights;
        let ext = &report.external;
        let candidates = [
            (ext.silhouette_score.map(|x| (x + 1.0) / 2.0), w.silhouette),
            (
                ext.calinski_harabasz_score.map(|x| (x / 1000.0).min(1.0)),
                w.calinski_harabasz,
            ),
            (
                ext.davies_bouldin_score.map(|x| (1.0 - x / 2.0).max(0.0)),
                w.davies_bouldin,
            ),
            (Some(report.internal.coverage_score), w.coverage),
            (Some(report.internal.balance_score), w.balance),
            (Some(report.stability.stability_score), w.stability),
            (Some(report.internal.efficiency_score), w.efficiency),
        ];

        let (score, total_weight) = candidates
            .iter()
            .filter(|(_, weight)| *weight > 0.0)
            .filter_map(|(value, weight)| value.map(|v| (v.clamp(0.0, 1.0), *weight)))
            .fold((0.0, 0.0), |(score, total), (v, weight)| {
                (score + v * weight, total + weight)
            });

        if total_weight > 0.0 {
            (score / total_weight).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }
}

/// Silhouette, Calinski–Harabasz and Davies–Bouldin over the non-noise
/// points. A metric that fails is left out.
fn external_metrics(vectors: &FeatureVectors, labels: &[ClusterLabel]) -> ExternalMetrics {
    let kept = labels
        .iter()
        .enumerate()
        .filter(|(_, l)| l.is_signal())
        .map(|(i, _)| i)
        .collect::<Vec<usize>>();
    if kept.len() < 2 {
        return ExternalMetrics::default();
    }

    let dense = labels
        .iter()
        .filter(|l| l.is_signal())
        .copied()
        .collect::<std::collections::BTreeSet<ClusterLabel>>()
        .into_iter()
        .enumerate()
        .map(|(i, l)| (l, i))
        .collect::<BTreeMap<ClusterLabel, usize>>();
    let kept_labels = kept
        .iter()
        .filter_map(|i| dense.get(&labels[*i]).copied())
        .collect::<Vec<usize>>();

    let filtered = FeatureVectors::from(
        kept.iter()
            .map(|i| vectors[*i].clone())
            .collect::<Vec<Vec<f64>>>(),
    );
    let data = match filtered.as_ndarray() {
        Ok(data) => data,
        Err(e) => {
            warn!(error = %e, "failed to calculate external metrics");
            return ExternalMetrics::default();
        }
    };

    let recover = |name: &str, result: Result<f64, MetricError>| match result {
        Ok(v) if v.is_finite() => Some(v),
        Ok(v) => {
            debug!(metric = name, value = v, "metric is not finite, omitted");
            None
        }
        Err(e) => {
            debug!(metric = name, error = %e, "metric calculation failed");
            None
        }
    };

    ExternalMetrics {
        silhouette_score: recover("silhouette", silhouette_score(&data, &kept_labels)),
        calinski_harabasz_score: recover(
            "calinski_harabasz",
            calinski_harabasz_score(&data, &kept_labels),
        ),
        davies_bouldin_score: recover("davies_bouldin", davies_bouldin_score(&data, &kept_labels)),
    }
}

fn internal_metrics(
    stats: &ClusterStats,
    total: usize,
    n_clusters: usize,
    n_noise: usize,
) -> InternalMetrics {
    let balance_score = if n_clusters > 0 {
        let expected = total.saturating_sub(n_noise) as f64 / n_clusters as f64;
        let sizes = stats.sizes.values().copied().collect::<Vec<usize>>();
        let (_, variance) = mean_and_variance(&sizes);
        if expected > 0.0 {
            (1.0 - variance.sqrt() / expected).clamp(0.0, 1.0)
        } else {
            0.0
        }
    } else {
        0.0
    };

    let coverage_score = if total > 0 {
        total.saturating_sub(n_noise) as f64 / total as f64
    } else {
        0.0
    };

    let compactness_score = if total > 0 {
        (1.0 - n_clusters as f64 / ((total + 1) as f64).ln()).clamp(0.1, 1.0)
    } else {
        0.0
    };

    InternalMetrics {
        balance_score,
        coverage_score,
        compactness_score,
        efficiency_score: (balance_score + coverage_score + compactness_score) / 3.0,
    }
}

fn stability_metrics(stats: &ClusterStats, n_clusters: usize) -> StabilityMetrics {
    let clustered = stats.clustered() as f64;
    let mut metrics = StabilityMetrics::default();
    for size in stats.sizes.values().copied() {
        if size == 1 {
            metrics.single_point_clusters += 1;
        } else if size as f64 > clustered * LARGE_CLUSTER_SHARE {
            metrics.large_clusters += 1;
        } else if size < SMALL_CLUSTER_SIZE {
            metrics.small_clusters += 1;
        } else {
            metrics.medium_clusters += 1;
        }
    }
    metrics.stability_score = if n_clusters > 0 {
        let unstable = (metrics.single_point_clusters + metrics.large_clusters) as f64;
        (1.0 - unstable / n_clusters as f64).max(0.0)
    } else {
        0.0
    };
    metrics
}
