use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use derive_more::{Deref, Display, From, Into, IntoIterator};
use ndarray::Array2;
use serde::{Deserialize, Serialize};

use super::error::ClusterError;

/// Placeholder used when a document store can't tell us where an item came from.
pub const UNKNOWN_SOURCE: &str = "Unknown source";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, From, Into, Display)]
#[display("{{ rows:{} columns:{} }}", self.0.0, self.0.1)]
pub struct Shape((usize, usize));

/// Newtype wrapper around the feature vectors of a run, one row per document.
/// Wraps a [`Vec<Vec<f64>>`] for type safety; rows are only guaranteed to be
/// of equal width once [`FeatureVectors::as_ndarray`] has succeeded.
#[derive(Debug, Clone, Default, PartialEq, From, Into, Deref, IntoIterator, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureVectors(Vec<Vec<f64>>);

impl FeatureVectors {
    /// The shape of this instance. Fails fast on empty or ragged input.
    pub fn shape(&self) -> Result<Shape, ClusterError> {
        let first = self
            .0
            .first()
            .ok_or_else(|| ClusterError::input_shape("no feature vectors"))?;
        let width = first.len();
        if width == 0 {
            return Err(ClusterError::input_shape("feature vectors have zero width"));
        }
        if let Some((row, v)) = self.0.iter().enumerate().find(|(_, v)| v.len() != width) {
            return Err(ClusterError::input_shape(format!(
                "row {} has width {}, expected {}",
                row,
                v.len(),
                width
            )));
        }
        Ok((self.0.len(), width).into())
    }

    /// Convert into an [`Array2`], checking shape and finiteness on the way.
    pub fn as_ndarray(&self) -> Result<Array2<f64>, ClusterError> {
        let shape = self.shape()?;
        if let Some((row, _)) = self
            .0
            .iter()
            .enumerate()
            .find(|(_, v)| v.iter().any(|x| !x.is_finite()))
        {
            return Err(ClusterError::input_shape(format!(
                "row {} contains a non-finite value",
                row
            )));
        }
        let flattened = self.0.iter().flatten().copied().collect::<Vec<f64>>();
        Array2::from_shape_vec(shape.0, flattened)
            .map_err(|e| ClusterError::input_shape(format!("{} ({})", e, shape)))
    }
}

impl From<Array2<f64>> for FeatureVectors {
    fn from(value: Array2<f64>) -> Self {
        Self(value.rows().into_iter().map(|r| r.to_vec()).collect())
    }
}

/// Simple newtype wrapper around a cluster label.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    From,
    Into,
    Display,
    Serialize,
    Deserialize,
)]
#[serde(transparent)]
pub struct ClusterLabel(i32);

impl ClusterLabel {
    /// The label given to points no cluster claimed.
    pub const NOISE: Self = ClusterLabel(-1);

    pub fn is_noise(&self) -> bool {
        *self == Self::NOISE
    }

    pub fn is_signal(&self) -> bool {
        !self.is_noise()
    }

    pub fn value(&self) -> i32 {
        self.0
    }
}

/// Document index → label mapping produced by a clustering run.
#[derive(Debug, Clone, Default, PartialEq, Eq, From, Into, Deref, IntoIterator, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClusterAssignment(Vec<ClusterLabel>);

impl ClusterAssignment {
    pub fn all_noise(n: usize) -> Self {
        Self(vec![ClusterLabel::NOISE; n])
    }

    /// Member indices of every non-noise label, in original order.
    pub fn groups(&self) -> BTreeMap<ClusterLabel, Vec<usize>> {
        group_indices(&self.0)
    }

    pub fn stats(&self) -> ClusterStats {
        ClusterStats::from_labels(&self.0)
    }
}

impl FromIterator<ClusterLabel> for ClusterAssignment {
    fn from_iter<T: IntoIterator<Item = ClusterLabel>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

pub(crate) fn group_indices(labels: &[ClusterLabel]) -> BTreeMap<ClusterLabel, Vec<usize>> {
    let mut groups: BTreeMap<ClusterLabel, Vec<usize>> = BTreeMap::new();
    for (idx, label) in labels.iter().enumerate().filter(|(_, l)| l.is_signal()) {
        groups.entry(*label).or_default().push(idx);
    }
    groups
}

/// Per-run statistics derived from an assignment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterStats {
    /// Size of every non-noise label.
    pub sizes: BTreeMap<ClusterLabel, usize>,
    pub n_noise: usize,
    pub n_points: usize,
}

impl ClusterStats {
    pub fn from_labels(labels: &[ClusterLabel]) -> Self {
        let mut sizes = BTreeMap::new();
        let mut n_noise = 0;
        for label in labels {
            if label.is_noise() {
                n_noise += 1;
            } else {
                *sizes.entry(*label).or_insert(0) += 1;
            }
        }
        Self {
            sizes,
            n_noise,
            n_points: labels.len(),
        }
    }

    pub fn n_clusters(&self) -> usize {
        self.sizes.len()
    }

    /// Number of points that landed in some cluster.
    pub fn clustered(&self) -> usize {
        self.sizes.values().sum()
    }

    pub fn distinct_labels(&self) -> Vec<ClusterLabel> {
        self.sizes.keys().copied().collect()
    }
}

/// Result of a clustering backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusteringOutcome {
    pub labels: ClusterAssignment,
    pub n_clusters: usize,
    pub n_noise: usize,
    pub distinct_labels: Vec<ClusterLabel>,
}

impl ClusteringOutcome {
    pub fn from_labels(labels: ClusterAssignment) -> Self {
        let stats = labels.stats();
        Self {
            n_clusters: stats.n_clusters(),
            n_noise: stats.n_noise,
            distinct_labels: stats.distinct_labels(),
            labels,
        }
    }

    pub fn all_noise(n: usize) -> Self {
        Self::from_labels(ClusterAssignment::all_noise(n))
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// A news item as returned by the document store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewsItem {
    #[serde(default)]
    pub id: Option<i64>,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub link: String,
    #[serde(default, alias = "source_name")]
    pub source_label: Option<String>,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
}

impl NewsItem {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_link(mut self, link: impl Into<String>) -> Self {
        self.link = link.into();
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source_label = Some(source.into());
        self
    }

    /// The text that represents this item for analysis.
    pub fn text(&self, use_titles_only: bool) -> String {
        if use_titles_only || self.description.is_empty() {
            self.title.clone()
        } else {
            format!("{} {}", self.title, self.description)
        }
    }

    /// Source label, or [`UNKNOWN_SOURCE`] when the store didn't have one.
    pub fn source(&self) -> &str {
        self.source_label
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(UNKNOWN_SOURCE)
    }
}

/// A reference back to one of the items in a narrative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepresentativeExample {
    pub title: String,
    pub link: String,
    pub source: String,
}

impl From<&NewsItem> for RepresentativeExample {
    fn from(item: &NewsItem) -> Self {
        Self {
            title: item.title.clone(),
            link: item.link.clone(),
            source: item.source().to_owned(),
        }
    }
}

/// A cluster's summary: what it's about and a few items that show it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Narrative {
    pub cluster_id: ClusterLabel,
    pub size: usize,
    /// Most relevant first.
    pub keywords: Vec<String>,
    pub representative_examples: Vec<RepresentativeExample>,
    pub news_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(raw: &[i32]) -> Vec<ClusterLabel> {
        raw.iter().copied().map(ClusterLabel::from).collect()
    }

    #[test]
    fn test_shape_rejects_empty_and_ragged() {
        assert!(FeatureVectors::default().shape().is_err());
        assert!(FeatureVectors::from(vec![vec![]]).shape().is_err());

        let ragged = FeatureVectors::from(vec![vec![1.0, 2.0], vec![1.0]]);
        let err = ragged.shape().unwrap_err();
        assert!(err.to_string().contains("row 1"));

        let ok = FeatureVectors::from(vec![vec![1.0, 2.0], vec![3.0, 4.0], vec![0.0, 0.0]]);
        assert_eq!(ok.shape().unwrap(), Shape::from((3, 2)));
    }

    #[test]
    fn test_as_ndarray_rejects_nan() {
        let v = FeatureVectors::from(vec![vec![1.0, f64::NAN]]);
        assert!(matches!(
            v.as_ndarray(),
            Err(ClusterError::InputShape { .. })
        ));
    }

    #[test]
    fn test_as_ndarray_round_trip() {
        let v = FeatureVectors::from(vec![vec![1.0, 2.0], vec![3.0, 4.0]]);
        let arr = v.as_ndarray().unwrap();
        assert_eq!(arr[[1, 0]], 3.0);
        assert_eq!(FeatureVectors::from(arr), v);
    }

    #[test]
    fn test_noise_label() {
        assert!(ClusterLabel::NOISE.is_noise());
        assert!(ClusterLabel::from(0).is_signal());
    }

    #[test]
    fn test_stats_account_for_every_point() {
        let assignment = ClusterAssignment::from(labels(&[0, 1, -1, 0, 2, -1, 1, 0]));
        let stats = assignment.stats();
        assert_eq!(stats.n_clusters(), 3);
        assert_eq!(stats.n_noise, 2);
        assert_eq!(stats.clustered() + stats.n_noise, 8);
        assert_eq!(stats.sizes[&ClusterLabel::from(0)], 3);

        let groups = assignment.groups();
        assert_eq!(groups[&ClusterLabel::from(0)], vec![0, 3, 7]);
        assert!(!groups.contains_key(&ClusterLabel::NOISE));
    }

    #[test]
    fn test_outcome_from_labels() {
        let outcome = ClusteringOutcome::from_labels(labels(&[1, 1, -1, 0]).into());
        assert_eq!(outcome.n_clusters, 2);
        assert_eq!(outcome.n_noise, 1);
        assert_eq!(
            outcome.distinct_labels,
            vec![ClusterLabel::from(0), ClusterLabel::from(1)]
        );

        let noise = ClusteringOutcome::all_noise(4);
        assert_eq!(noise.n_clusters, 0);
        assert_eq!(noise.n_noise, 4);
    }

    #[test]
    fn test_news_item_text_and_source() {
        let item = NewsItem::new("Title").with_description("Body");
        assert_eq!(item.text(true), "Title");
        assert_eq!(item.text(false), "Title Body");
        assert_eq!(item.source(), UNKNOWN_SOURCE);
        assert_eq!(item.clone().with_source("Wire").source(), "Wire");
        assert_eq!(item.with_source("  ").source(), UNKNOWN_SOURCE);
    }
}
