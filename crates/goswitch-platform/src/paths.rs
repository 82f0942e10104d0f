use std::path::PathBuf;
use thiserror::Error;

const HOME_ENV: &str = "GOSWITCH_HOME";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AppPathsError {
    #[error("Could not determine home directory")]
    HomeDirUnavailable,
    #[error("Could not determine config directory")]
    ConfigDirUnavailable,
    #[error("Could not determine cache directory")]
    CacheDirUnavailable,
    #[error("Could not determine data directory")]
    DataDirUnavailable,
}

/// Where goswitch keeps its files.
///
/// `root_dir` (default `~/.goswitch`, overridable with `GOSWITCH_HOME`) holds
/// the managed SDKs and the active pointer; the other three are the usual
/// per-platform application directories.
#[derive(Debug, Clone)]
pub struct AppPaths {
    pub config_dir: PathBuf,
    pub cache_dir: PathBuf,
    pub data_dir: PathBuf,
    pub root_dir: PathBuf,
}

impl AppPaths {
    /// Build application paths for the current platform.
    ///
    /// # Errors
    /// Returns an error when a required base directory (for example the user
    /// home/config/cache/data directory) cannot be determined.
    pub fn new() -> Result<Self, AppPathsError> {
        let home = dirs::home_dir().ok_or(AppPathsError::HomeDirUnavailable)?;
        let root_dir = std::env::var_os(HOME_ENV)
            .filter(|value| !value.is_empty())
            .map_or_else(|| home.join(".goswitch"), PathBuf::from);

        #[cfg(target_os = "macos")]
        {
            Ok(Self {
                config_dir: home.join("Library/Application Support/goswitch"),
                cache_dir: home.join("Library/Caches/goswitch"),
                data_dir: home.join("Library/Application Support/goswitch"),
                root_dir,
            })
        }

        #[cfg(not(target_os = "macos"))]
        {
            Ok(Self {
                config_dir: dirs::config_dir()
                    .ok_or(AppPathsError::ConfigDirUnavailable)?
                    .join("goswitch"),
                cache_dir: dirs::cache_dir()
                    .ok_or(AppPathsError::CacheDirUnavailable)?
                    .join("goswitch"),
                data_dir: dirs::data_dir()
                    .ok_or(AppPathsError::DataDirUnavailable)?
                    .join("goswitch"),
                root_dir,
            })
        }
    }

    #[must_use]
    pub fn with_root_dir(mut self, root_dir: PathBuf) -> Self {
        self.root_dir = root_dir;
        self
    }

    /// The managed install root: one subdirectory per installed version.
    #[must_use]
    pub fn sdk_dir(&self) -> PathBuf {
        self.root_dir.join("sdk")
    }

    #[must_use]
    pub fn settings_file(&self) -> PathBuf {
        self.config_dir.join("settings.json")
    }

    #[must_use]
    pub fn release_cache_file(&self) -> PathBuf {
        self.cache_dir.join("releases.json")
    }

    #[must_use]
    pub fn log_file(&self) -> PathBuf {
        self.data_dir.join("debug.log")
    }
}

#[cfg(test)]
mod tests {
    use std::path::{Path, PathBuf};

    use super::AppPaths;

    fn paths_under(base: &str) -> AppPaths {
        let base = PathBuf::from(base);
        AppPaths {
            config_dir: base.join("config"),
            cache_dir: base.join("cache"),
            data_dir: base.join("data"),
            root_dir: base.join("home"),
        }
    }

    #[test]
    fn file_paths_use_expected_filenames() {
        let paths = paths_under("/tmp/goswitch-paths");

        assert!(
            paths
                .settings_file()
                .ends_with(Path::new("config").join("settings.json"))
        );
        assert!(
            paths
                .release_cache_file()
                .ends_with(Path::new("cache").join("releases.json"))
        );
        assert!(paths.log_file().ends_with(Path::new("data").join("debug.log")));
        assert!(paths.sdk_dir().ends_with(Path::new("home").join("sdk")));
    }

    #[test]
    fn with_root_dir_moves_sdk_root_only() {
        let paths = paths_under("/tmp/goswitch-paths").with_root_dir("/opt/goswitch".into());

        assert_eq!(paths.sdk_dir(), Path::new("/opt/goswitch").join("sdk"));
        assert_eq!(
            paths.settings_file(),
            Path::new("/tmp/goswitch-paths/config/settings.json")
        );
    }
}
