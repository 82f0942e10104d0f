use std::collections::HashSet;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use log::debug;
use which::which;

use goswitch_backend::{GoVersion, normalize_name};
use goswitch_core::has_go_binary;

/// Version label for an SDK whose version cannot be determined.
pub const UNKNOWN_VERSION: &str = "system";

/// A Go SDK found outside the managed install root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignInstall {
    pub version: String,
    pub path: PathBuf,
    pub modified: Option<DateTime<Utc>>,
}

/// Where to look for SDKs goswitch did not install.
///
/// Each location is either an SDK root (has `bin/go`) or a directory whose
/// immediate children are SDK roots, like the `~/sdk` tree that
/// `golang.org/dl` wrappers download into.
#[derive(Debug, Clone)]
pub struct SystemScan {
    enabled: bool,
    well_known: bool,
    extra_paths: Vec<PathBuf>,
}

impl Default for SystemScan {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemScan {
    #[must_use]
    pub fn new() -> Self {
        Self {
            enabled: true,
            well_known: true,
            extra_paths: Vec::new(),
        }
    }

    #[must_use]
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            well_known: false,
            extra_paths: Vec::new(),
        }
    }

    /// Scan only `paths`: no well-known locations, `GOROOT` or `PATH`.
    #[must_use]
    pub fn only(paths: Vec<PathBuf>) -> Self {
        Self {
            enabled: true,
            well_known: false,
            extra_paths: paths,
        }
    }

    #[must_use]
    pub fn with_extra_paths(mut self, paths: Vec<PathBuf>) -> Self {
        self.extra_paths.extend(paths);
        self
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn candidates(&self) -> Vec<PathBuf> {
        let mut candidates = Vec::new();
        if self.well_known {
            candidates.extend(goroot_from_env());
            candidates.extend(goroot_from_path());
            candidates.extend(well_known_paths());
        }
        candidates.extend(self.extra_paths.iter().cloned());
        candidates
    }

    /// Find SDKs, skipping anything under `managed_root` and listing each
    /// canonical location once.
    #[must_use]
    pub fn scan(&self, managed_root: &Path) -> Vec<ForeignInstall> {
        if !self.enabled {
            return Vec::new();
        }

        let managed_root = canonical(managed_root);
        let mut seen = HashSet::new();
        let mut found = Vec::new();

        for candidate in self.candidates() {
            for sdk in expand_candidate(&candidate) {
                let key = canonical(&sdk);
                if key.starts_with(&managed_root) {
                    debug!("Skipping managed install {}", sdk.display());
                    continue;
                }
                if !seen.insert(key) {
                    continue;
                }

                let (version, modified) = describe_install(&sdk);
                debug!("Found system Go {version} at {}", sdk.display());
                found.push(ForeignInstall {
                    version,
                    path: sdk,
                    modified,
                });
            }
        }

        found
    }
}

fn expand_candidate(candidate: &Path) -> Vec<PathBuf> {
    if has_go_binary(candidate) {
        return vec![candidate.to_path_buf()];
    }
    let Ok(entries) = std::fs::read_dir(candidate) else {
        return Vec::new();
    };
    let mut children: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| has_go_binary(path))
        .collect();
    children.sort();
    children
}

/// Canonical form used for path comparisons; falls back to the input when
/// the path cannot be resolved.
#[must_use]
pub fn canonical(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Version label and modification time of an SDK root. The label comes from
/// its `VERSION` file, then its directory name.
#[must_use]
pub fn describe_install(path: &Path) -> (String, Option<DateTime<Utc>>) {
    let version = read_version_file(path)
        .or_else(|| {
            path.file_name()
                .and_then(|name| name.to_str())
                .and_then(|name| name.parse::<GoVersion>().ok())
        })
        .map_or_else(|| UNKNOWN_VERSION.to_string(), |v| v.name().to_string());
    let modified = std::fs::metadata(path)
        .and_then(|meta| meta.modified())
        .ok()
        .map(DateTime::<Utc>::from);
    (version, modified)
}

fn read_version_file(sdk: &Path) -> Option<GoVersion> {
    let contents = std::fs::read_to_string(sdk.join("VERSION")).ok()?;
    let first = contents.lines().next()?;
    normalize_name(first).parse().ok()
}

fn goroot_from_env() -> Option<PathBuf> {
    std::env::var_os("GOROOT")
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
}

fn goroot_from_path() -> Option<PathBuf> {
    let binary = which("go").ok()?;
    let resolved = canonical(&binary);
    resolved.parent()?.parent().map(Path::to_path_buf)
}

fn well_known_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    #[cfg(unix)]
    {
        paths.push(PathBuf::from("/usr/local/go"));
        paths.push(PathBuf::from("/usr/lib/go"));
    }

    #[cfg(target_os = "macos")]
    {
        paths.push(PathBuf::from("/opt/homebrew/opt/go/libexec"));
        paths.push(PathBuf::from("/usr/local/opt/go/libexec"));
    }

    #[cfg(target_os = "windows")]
    {
        paths.push(PathBuf::from(r"C:\Program Files\Go"));
        paths.push(PathBuf::from(r"C:\Go"));
    }

    if let Some(home) = dirs::home_dir() {
        paths.push(home.join("go").join("go"));
        paths.push(home.join("sdk"));
    }

    paths
}
