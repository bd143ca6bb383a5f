mod paths;
mod settings;

use anyhow::Result;
use paths::UserConfig;
use std::path::{Path, PathBuf};

pub use settings::{
    AnalysisSettings, CONFIG_FILE_NAME, ClusteringSettings, NarrativeSettings, OutputSettings,
    Settings,
};

/// Get or create a subdirectory under user config.
/// - [`subpath`]: If Some(P), a subdirectory will be created if necessary
///   and returned. If None, the root config directory will be returned.
pub fn get_or_create_user_config_path<P: AsRef<Path>>(subpath: Option<P>) -> Result<PathBuf> {
    UserConfig::get_config_path(subpath)
}
