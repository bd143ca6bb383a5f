use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use directories::{ProjectDirs, UserDirs};

pub(crate) const APP_NAME: &str = "narrativas";

struct BaseLocations();
impl BaseLocations {
    fn proj_dirs() -> Option<ProjectDirs> {
        ProjectDirs::from("net", "crystaldrift", APP_NAME)
    }
    fn user_dirs() -> Option<UserDirs> {
        UserDirs::new()
    }
}

trait ConfigPath {
    fn get_root_path() -> Result<PathBuf>;

    /// Get a subdir under the root path, creating as necessary.
    fn get_or_create_subdir<P: AsRef<Path>>(subpath: Option<P>) -> Result<PathBuf> {
        let root_path = Self::get_root_path()?;
        let full_path = subpath.map(|p| root_path.join(p)).unwrap_or(root_path);
        std::fs::create_dir_all(&full_path)
            .with_context(|| format!("Unable to create {}", full_path.display()))?;
        Ok(full_path)
    }
}

pub(crate) struct AppData();
impl ConfigPath for AppData {
    fn get_root_path() -> Result<PathBuf> {
        BaseLocations::proj_dirs()
            .map(|d| d.data_dir().to_owned())
            .ok_or_else(|| anyhow!("Unable to determine app data dir!"))
    }
}
impl AppData {
    pub(crate) fn get_data_path<P: AsRef<Path>>(subpath: Option<P>) -> Result<PathBuf> {
        Self::get_or_create_subdir(subpath)
    }
}

pub(crate) struct UserConfig();
impl ConfigPath for UserConfig {
    /// As a matter of taste, XDG style `~/.config/<app>` on every platform.
    fn get_root_path() -> Result<PathBuf> {
        let home_dir = BaseLocations::user_dirs()
            .map(|d| d.home_dir().to_path_buf())
            .ok_or_else(|| anyhow!("Failed to get home directory"))?;
        Ok(home_dir.join(".config").join(APP_NAME))
    }
}
impl UserConfig {
    /// Root of the user config dir, without creating it.
    pub(crate) fn root() -> Result<PathBuf> {
        Self::get_root_path()
    }

    pub(crate) fn get_config_path<P: AsRef<Path>>(subpath: Option<P>) -> Result<PathBuf> {
        Self::get_or_create_subdir(subpath)
    }
}
