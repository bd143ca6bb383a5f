use derive_more::{AsRef, Deref, Display, Into};
use serde::{Deserialize, Serialize};
use strum::{EnumIter, EnumString, IntoStaticStr};

use crate::narr::error::ClusterError;

/// Distance used to compare feature vectors.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    clap::ValueEnum,
    strum::Display,
    EnumString,
    EnumIter,
    IntoStaticStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum DistanceMetric {
    /// Rows are L2-normalized, then compared with euclidean distance.
    #[default]
    Cosine,
    Euclidean,
    Manhattan,
}

impl DistanceMetric {
    /// Distance between two rows of equal width. Cosine rows must already be
    /// normalized; see [`super::PreparedMatrix`].
    pub fn distance(&self, a: &[f64], b: &[f64]) -> f64 {
        match self {
            DistanceMetric::Cosine | DistanceMetric::Euclidean => a
                .iter()
                .zip(b)
                .map(|(x, y)| (x - y) * (x - y))
                .sum::<f64>()
                .sqrt(),
            DistanceMetric::Manhattan => a.iter().zip(b).map(|(x, y)| (x - y).abs()).sum(),
        }
    }
}

/// How flat clusters are picked out of the condensed tree.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    clap::ValueEnum,
    strum::Display,
    EnumString,
    EnumIter,
    IntoStaticStr,
)]
pub enum ClusterSelectionMethod {
    /// Excess of mass: the most persistent clusters win.
    #[default]
    #[serde(rename = "eom")]
    #[strum(serialize = "eom")]
    #[value(name = "eom")]
    ExcessOfMass,
    /// Only leaves of the condensed tree.
    #[serde(rename = "leaf")]
    #[strum(serialize = "leaf")]
    #[value(name = "leaf")]
    Leaf,
}

/// Parameters for the density clusterer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HdbscanParams {
    /// Smallest group of points that counts as a cluster.
    pub min_cluster_size: usize,

    /// Neighbourhood size used for core distances. `None` derives it from
    /// `min_cluster_size`, see [`HdbscanParams::effective_min_samples`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_samples: Option<usize>,

    pub metric: DistanceMetric,

    pub cluster_selection_method: ClusterSelectionMethod,

    /// When false, a result with a single cluster and no noise is turned into
    /// all noise.
    pub allow_single_cluster: bool,

    /// Clusters closer than this distance are merged.
    pub cluster_selection_epsilon: f64,

    /// Scales raw distances before mutual reachability.
    pub alpha: f64,
}

impl Default for HdbscanParams {
    fn default() -> Self {
        Self {
            min_cluster_size: 5,
            min_samples: None,
            metric: DistanceMetric::Cosine,
            cluster_selection_method: ClusterSelectionMethod::ExcessOfMass,
            allow_single_cluster: false,
            cluster_selection_epsilon: 0.0,
            alpha: 1.0,
        }
    }
}

impl HdbscanParams {
    #[must_use]
    pub fn with_min_cluster_size(mut self, size: usize) -> Self {
        self.min_cluster_size = size;
        self
    }

    #[must_use]
    pub fn with_min_samples(mut self, samples: usize) -> Self {
        self.min_samples = Some(samples);
        self
    }

    #[must_use]
    pub fn with_metric(mut self, metric: DistanceMetric) -> Self {
        self.metric = metric;
        self
    }

    #[must_use]
    pub fn with_selection_method(mut self, method: ClusterSelectionMethod) -> Self {
        self.cluster_selection_method = method;
        self
    }

    #[must_use]
    pub fn with_allow_single_cluster(mut self, allow: bool) -> Self {
        self.allow_single_cluster = allow;
        self
    }

    #[must_use]
    pub fn with_selection_epsilon(mut self, epsilon: f64) -> Self {
        self.cluster_selection_epsilon = epsilon;
        self
    }

    #[must_use]
    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    /// `min_samples` if set, otherwise `max(min_cluster_size / 2, 1)`.
    pub fn effective_min_samples(&self) -> usize {
        self.min_samples
            .unwrap_or((self.min_cluster_size / 2).max(1))
    }

    /// Fails fast with a descriptive message on the first out-of-range value.
    pub fn validate(&self) -> Result<(), ClusterError> {
        if self.min_cluster_size < 1 {
            return Err(ClusterError::invalid_parameter(format!(
                "min_cluster_size must be >= 1, got {}",
                self.min_cluster_size
            )));
        }
        if self.min_samples == Some(0) {
            return Err(ClusterError::invalid_parameter(
                "min_samples must be >= 1, got 0",
            ));
        }
        if !(self.cluster_selection_epsilon.is_finite() && self.cluster_selection_epsilon >= 0.0) {
            return Err(ClusterError::invalid_parameter(format!(
                "cluster_selection_epsilon must be a finite value >= 0, got {}",
                self.cluster_selection_epsilon
            )));
        }
        if !(self.alpha.is_finite() && self.alpha > 0.0) {
            return Err(ClusterError::invalid_parameter(format!(
                "alpha must be a finite value > 0, got {}",
                self.alpha
            )));
        }
        Ok(())
    }
}

/// Newtype for cluster sizes which enforces the invariant that they're >= 2.
#[derive(
    Debug, Copy, Clone, Hash, PartialEq, Eq, Into, AsRef, Deref, Serialize, Deserialize, Display,
)]
pub struct ClusterSize(usize);
impl ClusterSize {
    pub const MIN: ClusterSize = ClusterSize(2);
    pub const MAX: ClusterSize = ClusterSize(usize::MAX);

    /// Create a new instance given a `usize`, and panic if
    /// `size < ClusterSize::MIN`.
    pub(crate) fn new_unchecked(size: usize) -> Self {
        assert!(
            Self::MIN.0 <= size,
            "Invalid value {}; must be {} ≤ N ≤ {}.",
            size,
            Self::MIN,
            Self::MAX
        );
        Self(size)
    }

    /// Attempt to create a new instance given a `usize`, checking that
    /// `size >= ClusterSize::MIN`.
    pub fn try_new(size: usize) -> Result<Self, ClusterError> {
        if size < ClusterSize::MIN.0 {
            Err(ClusterError::invalid_parameter(format!(
                "Invalid value {}; must be {} ≤ N ≤ {}.",
                size,
                Self::MIN,
                Self::MAX
            )))
        } else {
            Ok(Self::new_unchecked(size))
        }
    }
}

impl TryFrom<usize> for ClusterSize {
    type Error = ClusterError;

    fn try_from(value: usize) -> Result<Self, Self::Error> {
        Self::try_new(value)
    }
}

/// Newtype for the DBSCAN neighbourhood radius which enforces the invariant
/// that it's a finite value > 0.0.
#[derive(
    Debug, Copy, Clone, PartialEq, PartialOrd, Into, AsRef, Deref, Serialize, Deserialize, Display,
)]
pub struct DbscanEpsilon(f64);
impl DbscanEpsilon {
    pub const DEFAULT: DbscanEpsilon = DbscanEpsilon(0.5);

    /// Panics if the value isn't a finite number > 0.0.
    pub(crate) fn new_unchecked(value: f64) -> Self {
        assert!(
            value.is_finite() && value > 0.0,
            "invalid value {}; must be > 0",
            value,
        );
        Self(value)
    }

    pub fn try_new(epsilon: f64) -> Result<Self, ClusterError> {
        match epsilon {
            _ if epsilon.is_finite() && epsilon > 0.0 => Ok(Self::new_unchecked(epsilon)),
            _ => Err(ClusterError::invalid_parameter(format!(
                "invalid value {}; must be > 0",
                epsilon
            ))),
        }
    }
}

impl Default for DbscanEpsilon {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl TryFrom<f64> for DbscanEpsilon {
    type Error = ClusterError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::try_new(value)
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn test_default_params() {
        let params = HdbscanParams::default();
        assert_eq!(params.min_cluster_size, 5);
        assert_eq!(params.effective_min_samples(), 2);
        assert_eq!(params.metric, DistanceMetric::Cosine);
        assert_eq!(
            params.cluster_selection_method,
            ClusterSelectionMethod::ExcessOfMass
        );
        assert!(params.validate().is_ok());
    }

    #[test]
    fn test_effective_min_samples() {
        let params = HdbscanParams::default().with_min_cluster_size(1);
        assert_eq!(params.effective_min_samples(), 1);
        let params = params.with_min_samples(7);
        assert_eq!(params.effective_min_samples(), 7);
    }

    #[test]
    fn test_validate_rejects_out_of_range() {
        let base = HdbscanParams::default();
        assert!(base.clone().with_min_cluster_size(0).validate().is_err());
        assert!(base.clone().with_min_samples(0).validate().is_err());
        assert!(base.clone().with_alpha(0.0).validate().is_err());
        assert!(base.clone().with_alpha(f64::NAN).validate().is_err());
        assert!(base.clone().with_selection_epsilon(-0.1).validate().is_err());
        assert!(base.with_selection_epsilon(0.3).validate().is_ok());
    }

    #[test]
    fn test_metric_names() {
        assert_eq!(DistanceMetric::from_str("manhattan").unwrap(), DistanceMetric::Manhattan);
        assert_eq!(DistanceMetric::Cosine.to_string(), "cosine");
        assert_eq!(
            ClusterSelectionMethod::from_str("eom").unwrap(),
            ClusterSelectionMethod::ExcessOfMass
        );
        assert_eq!(ClusterSelectionMethod::Leaf.to_string(), "leaf");
    }

    #[test]
    fn test_params_from_toml() {
        let params: HdbscanParams =
            toml::from_str("min_cluster_size = 3\nmetric = \"euclidean\"\ncluster_selection_method = \"leaf\"")
                .unwrap();
        assert_eq!(params.min_cluster_size, 3);
        assert_eq!(params.metric, DistanceMetric::Euclidean);
        assert_eq!(params.cluster_selection_method, ClusterSelectionMethod::Leaf);
        assert_eq!(params.alpha, 1.0);
    }

    #[test]
    fn test_distances() {
        let a = [0.0, 0.0];
        let b = [3.0, 4.0];
        assert_eq!(DistanceMetric::Euclidean.distance(&a, &b), 5.0);
        assert_eq!(DistanceMetric::Manhattan.distance(&a, &b), 7.0);
    }

    #[test]
    fn test_cluster_size_checked() {
        assert!(ClusterSize::try_new(2).is_ok());
        assert!(ClusterSize::try_new(1000).is_ok());
        assert!(ClusterSize::try_new(ClusterSize::MAX.into()).is_ok());
        assert!(ClusterSize::try_new(ClusterSize::MIN.into()).is_ok());
        assert!(ClusterSize::try_new(ClusterSize::MIN.0 - 1).is_err());
        assert!(ClusterSize::try_new(0).is_err());
    }

    #[test]
    fn test_cluster_size_unchecked() {
        assert_eq!(
            ClusterSize::new_unchecked(ClusterSize::MIN.0),
            ClusterSize::MIN
        );
        assert_eq!(
            ClusterSize::new_unchecked(ClusterSize::MAX.0),
            ClusterSize::MAX
        );

        let result =
            std::panic::catch_unwind(|| ClusterSize::new_unchecked(ClusterSize::MIN.0 - 1));
        assert!(result.is_err())
    }

    #[test]
    fn test_epsilon_checked() {
        assert!(DbscanEpsilon::try_new(1.0).is_ok());
        assert!(DbscanEpsilon::try_new(0.0).is_err());
        assert!(DbscanEpsilon::try_new(-0.1).is_err());
        assert!(DbscanEpsilon::try_new(f64::INFINITY).is_err());
    }

    #[test]
    fn test_epsilon_unchecked() {
        assert_eq!(
            DbscanEpsilon::new_unchecked(DbscanEpsilon::DEFAULT.0),
            DbscanEpsilon::DEFAULT
        );

        let result = std::panic::catch_unwind(|| DbscanEpsilon::new_unchecked(-0.1));
        assert!(result.is_err());
    }
}
