//! External clustering metrics over a dense matrix and dense labels
//! `0..k`. Distances are euclidean.

use ndarray::{Array1, Array2, ArrayView1, Axis};
use rayon::prelude::*;

use crate::narr::error::MetricError;

const ALL_CLOSE: f64 = 1e-8;

fn euclidean(a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f64>()
        .sqrt()
}

/// Number of distinct labels, after checking `2 <= k <= n - 1`.
fn check_labels(data: &Array2<f64>, labels: &[usize]) -> Result<usize, MetricError> {
    let n = data.nrows();
    if labels.len() != n {
        return Err(MetricError::LengthMismatch {
            labels: labels.len(),
            vectors: n,
        });
    }
    let k = labels.iter().max().map_or(0, |m| m + 1);
    if k < 2 || k + 1 > n {
        return Err(MetricError::LabelCount {
            labels: k,
            samples: n,
        });
    }
    Ok(k)
}

fn counts(labels: &[usize], k: usize) -> Vec<usize> {
    let mut counts = vec![0usize; k];
    for label in labels {
        counts[*label] += 1;
    }
    counts
}

fn centroids(data: &Array2<f64>, labels: &[usize], k: usize) -> Result<Array2<f64>, MetricError> {
    let counts = counts(labels, k);
    if let Some(empty) = counts.iter().position(|c| *c == 0) {
        return Err(MetricError::Degenerate(format!("label {} has no members", empty)));
    }
    let mut centroids = Array2::<f64>::zeros((k, data.ncols()));
    for (row, label) in data.outer_iter().zip(labels) {
        let mut centroid = centroids.row_mut(*label);
        centroid += &row;
    }
    for (mut centroid, count) in centroids.outer_iter_mut().zip(counts) {
        centroid /= count as f64;
    }
    Ok(centroids)
}

/// Mean silhouette coefficient. Points alone in their cluster score 0.
pub fn silhouette_score(data: &Array2<f64>, labels: &[usize]) -> Result<f64, MetricError> {
    let k = check_labels(data, labels)?;
    let counts = counts(labels, k);
    let n = data.nrows();

    let samples = (0..n)
        .into_par_iter()
        .map(|i| {
            let own = labels[i];
            if counts[own] < 2 {
                return 0.0;
            }
            let mut sums = vec![0.0; k];
            for j in (0..n).filter(|j| *j != i) {
                sums[labels[j]] += euclidean(data.row(i), data.row(j));
            }
            let a = sums[own] / (counts[own] - 1) as f64;
            let b = (0..k)
                .filter(|c| *c != own && counts[*c] > 0)
                .map(|c| sums[c] / counts[c] as f64)
                .fold(f64::INFINITY, f64::min);
            let denom = a.max(b);
            if denom > 0.0 && denom.is_finite() {
                (b - a) / denom
            } else {
                0.0
            }
        })
        .collect::<Vec<f64>>();

    Ok(samples.iter().sum::<f64>() / n as f64)
}

/// Ratio of between-cluster to within-cluster dispersion. Higher is better.
pub fn calinski_harabasz_score(data: &Array2<f64>, labels: &[usize]) -> Result<f64, MetricError> {
    let k = check_labels(data, labels)?;
    let n = data.nrows();
    let centroids = centroids(data, labels, k)?;
    let mean: Array1<f64> = data
        .mean_axis(Axis(0))
        .ok_or_else(|| MetricError::Degenerate("empty matrix".into()))?;

    let extra: f64 = counts(labels, k)
        .iter()
        .zip(centroids.outer_iter())
        .map(|(count, centroid)| {
            let diff = &centroid - &mean;
            *count as f64 * diff.dot(&diff)
        })
        .sum();
    let intra: f64 = data
        .outer_iter()
        .zip(labels)
        .map(|(row, label)| {
            let diff = &row - &centroids.row(*label);
            diff.dot(&diff)
        })
        .sum();

    if intra == 0.0 {
        return Ok(1.0);
    }
    Ok(extra * (n - k) as f64 / (intra * (k - 1) as f64))
}

/// Mean over clusters of the worst ratio of summed spread to centroid
/// separation. Lower is better.
pub fn davies_bouldin_score(data: &Array2<f64>, labels: &[usize]) -> Result<f64, MetricError> {
    let k = check_labels(data, labels)?;
    let centroids = centroids(data, labels, k)?;
    let counts = counts(labels, k);

    let mut intra = vec![0.0; k];
    for (row, label) in data.outer_iter().zip(labels) {
        intra[*label] += euclidean(row, centroids.row(*label));
    }
    for (spread, count) in intra.iter_mut().zip(&counts) {
        *spread /= *count as f64;
    }

    let mut separation = Array2::<f64>::zeros((k, k));
    for a in 0..k {
        for b in 0..k {
            separation[[a, b]] = euclidean(centroids.row(a), centroids.row(b));
        }
    }

    if intra.iter().all(|d| d.abs() < ALL_CLOSE)
        || separation.iter().all(|d| d.abs() < ALL_CLOSE)
    {
        return Ok(0.0);
    }

    let worst = (0..k)
        .map(|a| {
            (0..k)
                .map(|b| {
                    let d = separation[[a, b]];
                    if d == 0.0 {
                        0.0
                    } else {
                        (intra[a] + intra[b]) / d
                    }
                })
                .fold(0.0, f64::max)
        })
        .collect::<Vec<f64>>();
    Ok(worst.iter().sum::<f64>() / k as f64)
}
