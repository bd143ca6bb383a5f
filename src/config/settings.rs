use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::paths::{AppData, UserConfig};
use crate::narr::{
    cluster::{Backend, DbscanEpsilon, HdbscanParams},
    quality::ScoreWeights,
    text::PreprocessingSettings,
    vectorizer::TfidfConfig,
};

pub const CONFIG_FILE_NAME: &str = "config.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisSettings {
    /// Only items published this many hours before the newest one are analyzed.
    pub time_window_hours: u32,
    pub top_narratives: usize,
    pub use_titles_only: bool,
    /// Keep at most this many items, in input order.
    pub max_news: usize,
    pub evaluate_quality: bool,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            time_window_hours: 24,
            top_narratives: 5,
            use_titles_only: true,
            max_news: 1000,
            evaluate_quality: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusteringSettings {
    pub backend: Backend,
    /// Neighbourhood radius, DBSCAN backend only.
    pub dbscan_epsilon: DbscanEpsilon,
    #[serde(flatten)]
    pub hdbscan: HdbscanParams,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NarrativeSettings {
    pub top_keywords: usize,
    pub top_titles: usize,
}

impl Default for NarrativeSettings {
    fn default() -> Self {
        Self {
            top_keywords: 20,
            top_titles: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputSettings {
    /// Defaults to `reports` under the app data dir.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reports_dir: Option<PathBuf>,
    /// `strftime` pattern for the date in report file names.
    pub date_format: String,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            reports_dir: None,
            date_format: "%Y-%m-%d".into(),
        }
    }
}

impl OutputSettings {
    /// The configured reports dir, or the default one, created if missing.
    pub fn reports_dir(&self) -> Result<PathBuf> {
        match &self.reports_dir {
            Some(dir) => {
                std::fs::create_dir_all(dir)
                    .with_context(|| format!("Unable to create reports dir {}", dir.display()))?;
                Ok(dir.clone())
            }
            None => AppData::get_data_path(Some("reports")),
        }
    }
}

/// Everything a run can be configured with. Every field has a default, so an
/// empty file is a valid configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub analysis: AnalysisSettings,
    pub preprocessing: PreprocessingSettings,
    pub vectorization: TfidfConfig,
    pub clustering: ClusteringSettings,
    pub narrative: NarrativeSettings,
    pub quality: ScoreWeights,
    pub output: OutputSettings,
}

impl Settings {
    /// Load settings from `path`, or from the user config dir when no path is
    /// given. A missing default file yields the defaults; a missing explicit
    /// file is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let settings = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let default_path = Self::default_path()?;
                if default_path.is_file() {
                    Self::from_file(&default_path)?
                } else {
                    debug!(path = %default_path.display(), "no config file, using defaults");
                    Self::default()
                }
            }
        };
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Unable to read config file {}", path.display()))?;
        Self::from_toml(&raw).with_context(|| format!("Invalid config file {}", path.display()))
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// `~/.config/narrativas/config.toml`.
    pub fn default_path() -> Result<PathBuf> {
        Ok(UserConfig::root()?.join(CONFIG_FILE_NAME))
    }

    /// Check every value, reporting all problems at once. Values that are
    /// legal but likely to be slow or unhelpful only log a warning.
    pub fn validate(&self) -> Result<()> {
        let mut errors: Vec<String> = Vec::new();

        let analysis = &self.analysis;
        if analysis.time_window_hours == 0 {
            errors.push("analysis.time_window_hours must be positive".into());
        } else if analysis.time_window_hours > 168 {
            warn!(hours = analysis.time_window_hours, "time window is longer than a week");
        }
        if analysis.top_narratives == 0 {
            errors.push("analysis.top_narratives must be positive".into());
        } else if analysis.top_narratives > 20 {
            warn!(top_narratives = analysis.top_narratives, "many narratives requested");
        }
        if analysis.max_news == 0 {
            errors.push("analysis.max_news must be positive".into());
        }

        let pre = &self.preprocessing;
        if pre.min_word_length == 0 {
            errors.push("preprocessing.min_word_length must be positive".into());
        }
        if pre.min_word_length >= pre.max_word_length {
            errors.push(format!(
                "preprocessing.min_word_length ({}) must be less than max_word_length ({})",
                pre.min_word_length, pre.max_word_length
            ));
        }
        if pre.max_workers == 0 {
            errors.push("preprocessing.max_workers must be positive".into());
        }
        if pre.stopwords_extra.len() > 1000 {
            warn!(count = pre.stopwords_extra.len(), "very long extra stopword list");
        }

        let vec = &self.vectorization;
        if vec.max_features == 0 {
            errors.push("vectorization.max_features must be positive".into());
        } else if vec.max_features > 10000 {
            warn!(max_features = vec.max_features, "large vocabulary will slow clustering");
        }
        if !(vec.max_df > 0.0 && vec.max_df <= 1.0) {
            errors.push(format!("vectorization.max_df must be in (0, 1], got {}", vec.max_df));
        }
        let (min_n, max_n) = vec.ngram_range;
        if min_n == 0 || min_n > max_n {
            errors.push(format!(
                "vectorization.ngram_range must satisfy 1 <= min <= max, got ({}, {})",
                min_n, max_n
            ));
        }

        let clustering = &self.clustering;
        if let Err(e) = clustering.hdbscan.validate() {
            errors.push(format!("clustering: {}", e));
        }
        if let Some(samples) = clustering.hdbscan.min_samples
            && samples > clustering.hdbscan.min_cluster_size
        {
            errors.push(format!(
                "clustering.min_samples ({}) must not exceed min_cluster_size ({})",
                samples, clustering.hdbscan.min_cluster_size
            ));
        }
        if let Err(e) = DbscanEpsilon::try_new(*clustering.dbscan_epsilon) {
            errors.push(format!("clustering.dbscan_epsilon: {}", e));
        }

        if self.narrative.top_keywords == 0 {
            errors.push("narrative.top_keywords must be positive".into());
        }
        if self.narrative.top_titles == 0 {
            errors.push("narrative.top_titles must be positive".into());
        }

        if vec.max_features > 5000 && analysis.max_news > 1000 {
            warn!(
                max_features = vec.max_features,
                max_news = analysis.max_news,
                "large vocabulary and batch, expect high memory use"
            );
        }

        if !errors.is_empty() {
            bail!("Invalid configuration:\n  - {}", errors.join("\n  - "));
        }
        Ok(())
    }
}
