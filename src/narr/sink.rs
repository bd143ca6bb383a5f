//! Run reporting. The pipeline reports what happened through a [`RunSink`]
//! handed to it by the caller.

use std::time::Duration;

use tracing::info;

use super::{model::ClusteringOutcome, quality::QualityReport};

/// Steps of a pipeline run, in execution order.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    strum::Display,
    strum::IntoStaticStr,
    strum::EnumIter,
)]
#[strum(serialize_all = "snake_case")]
pub enum Stage {
    Preprocess,
    Vectorize,
    Cluster,
    Evaluate,
    BuildNarratives,
}

/// Receives progress of a pipeline run.
pub trait RunSink: Send + Sync {
    fn stage_completed(&self, stage: Stage, elapsed: Duration);

    fn clustering_completed(&self, outcome: &ClusteringOutcome);

    fn quality_evaluated(&self, report: &QualityReport);
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl RunSink for NullSink {
    fn stage_completed(&self, _stage: Stage, _elapsed: Duration) {}

    fn clustering_completed(&self, _outcome: &ClusteringOutcome) {}

    fn quality_evaluated(&self, _report: &QualityReport) {}
}

/// Emits every report as a `tracing` event.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl RunSink for TracingSink {
    fn stage_completed(&self, stage: Stage, elapsed: Duration) {
        info!(
            target: "narrativas::run",
            stage = %stage,
            elapsed_ms = elapsed.as_millis() as u64,
            "stage completed"
        );
    }

    fn clustering_completed(&self, outcome: &ClusteringOutcome) {
        info!(
            target: "narrativas::run",
            clusters = outcome.n_clusters,
            noise = outcome.n_noise,
            points = outcome.len(),
            "clustering completed"
        );
    }

    fn quality_evaluated(&self, report: &QualityReport) {
        info!(
            target: "narrativas::run",
            score = report.overall_quality_score,
            grade = %report.quality_grade,
            "quality evaluated"
        );
    }
}
