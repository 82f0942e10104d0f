use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use goswitch_platform::AppPaths;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppSettings {
    /// Overrides `~/.goswitch` (and `GOSWITCH_HOME`).
    #[serde(default)]
    pub root_dir: Option<PathBuf>,

    /// Replaces `https://go.dev/dl/` for the release index and archives.
    #[serde(default)]
    pub download_mirror: Option<String>,

    #[serde(default = "default_true")]
    pub scan_system_installs: bool,

    #[serde(default)]
    pub extra_system_paths: Vec<PathBuf>,

    #[serde(default)]
    pub auto_activate_first_install: bool,

    #[serde(default = "default_http_timeout")]
    pub http_timeout_secs: u64,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_install_timeout")]
    pub install_timeout_secs: u64,

    #[serde(default = "default_retry_delays")]
    pub retry_delays_secs: Vec<u64>,

    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_hours: u64,

    #[serde(default = "default_progress_capacity")]
    pub progress_channel_capacity: usize,

    #[serde(default)]
    pub debug_logging: bool,

    #[serde(default = "default_max_log_size_bytes")]
    pub max_log_size_bytes: u64,
}

fn default_true() -> bool {
    true
}

fn default_http_timeout() -> u64 {
    30
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_install_timeout() -> u64 {
    1800
}

fn default_retry_delays() -> Vec<u64> {
    vec![0]
}

fn default_cache_ttl() -> u64 {
    1
}

fn default_progress_capacity() -> usize {
    64
}

fn default_max_log_size_bytes() -> u64 {
    5 * 1024 * 1024
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            root_dir: None,
            download_mirror: None,
            scan_system_installs: true,
            extra_system_paths: Vec::new(),
            auto_activate_first_install: false,
            http_timeout_secs: default_http_timeout(),
            connect_timeout_secs: default_connect_timeout(),
            install_timeout_secs: default_install_timeout(),
            retry_delays_secs: default_retry_delays(),
            cache_ttl_hours: default_cache_ttl(),
            progress_channel_capacity: default_progress_capacity(),
            debug_logging: false,
            max_log_size_bytes: default_max_log_size_bytes(),
        }
    }
}

impl AppSettings {
    pub fn load(paths: &AppPaths) -> Self {
        Self::load_from_path(&paths.settings_file())
    }

    fn load_from_path(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }
        match std::fs::read_to_string(path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|error| {
                log::warn!("Ignoring invalid settings in {}: {error}", path.display());
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    pub fn save(&self, paths: &AppPaths) -> Result<(), std::io::Error> {
        std::fs::create_dir_all(&paths.config_dir)?;
        self.save_to_path(&paths.settings_file())
    }

    fn save_to_path(&self, path: &Path) -> Result<(), std::io::Error> {
        let content = serde_json::to_string_pretty(self)?;
        goswitch_core::write_atomic(path, content.as_bytes())
    }

    /// `paths` with the configured root override applied.
    #[must_use]
    pub fn apply_to_paths(&self, paths: AppPaths) -> AppPaths {
        match &self.root_dir {
            Some(root) => paths.with_root_dir(root.clone()),
            None => paths,
        }
    }
}
