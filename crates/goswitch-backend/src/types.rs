use chrono::{DateTime, Utc};
use semver::{BuildMetadata, Prerelease, Version};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

const PRERELEASE_MARKERS: [&str; 3] = ["rc", "beta", "alpha"];

/// A Go release name such as `1.22.0`, `go1.21.3` or `1.23rc1`.
///
/// The `go` prefix used upstream is stripped on parse, so `name()` is what the
/// managed install directory is called.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct GoVersion {
    name: String,
    parsed: Version,
}

impl GoVersion {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn semver(&self) -> &Version {
        &self.parsed
    }

    #[must_use]
    pub fn is_prerelease(&self) -> bool {
        classify(&self.name) == ReleaseClassification::PreRelease
    }
}

impl Ord for GoVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.parsed
            .cmp(&other.parsed)
            .then_with(|| self.name.cmp(&other.name))
    }
}

impl PartialOrd for GoVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for GoVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl From<GoVersion> for String {
    fn from(version: GoVersion) -> Self {
        version.name
    }
}

impl TryFrom<String> for GoVersion {
    type Error = VersionParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VersionParseError {
    #[error("Version name is empty")]
    Empty,
    #[error("Invalid version name: {input}")]
    InvalidName { input: String },
    #[error("Expected MAJOR[.MINOR[.PATCH]][pre-release] format, got: {input}")]
    InvalidFormat { input: String },
}

impl FromStr for GoVersion {
    type Err = VersionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = normalize_name(s);
        if name.is_empty() {
            return Err(VersionParseError::Empty);
        }
        if !is_safe_name(name) {
            return Err(VersionParseError::InvalidName {
                input: s.to_string(),
            });
        }

        let parsed = parse_go_semver(name).ok_or_else(|| VersionParseError::InvalidFormat {
            input: s.to_string(),
        })?;

        Ok(Self {
            name: name.to_string(),
            parsed,
        })
    }
}

/// Strip surrounding whitespace and the upstream `go` prefix.
#[must_use]
pub fn normalize_name(raw: &str) -> &str {
    let trimmed = raw.trim();
    trimmed.strip_prefix("go").unwrap_or(trimmed)
}

fn is_safe_name(name: &str) -> bool {
    !name.contains("..")
        && !name.contains(['/', '\\'])
        && !name.starts_with('.')
        && !name.chars().any(char::is_whitespace)
}

fn parse_go_semver(name: &str) -> Option<Version> {
    let split = name
        .find(|c: char| !c.is_ascii_digit() && c != '.')
        .unwrap_or(name.len());
    let (core, rest) = name.split_at(split);

    let mut parts = core.split('.');
    let major = parts.next()?.parse::<u64>().ok()?;
    let minor = match parts.next() {
        Some(part) => part.parse::<u64>().ok()?,
        None => 0,
    };
    let patch = match parts.next() {
        Some(part) => part.parse::<u64>().ok()?,
        None => 0,
    };
    if parts.next().is_some() {
        return None;
    }

    let suffix = rest.trim_start_matches('-');
    let pre = if suffix.is_empty() {
        Prerelease::EMPTY
    } else {
        Prerelease::new(&split_alpha_numeric(suffix)).ok()?
    };

    Some(Version {
        major,
        minor,
        patch,
        pre,
        build: BuildMetadata::EMPTY,
    })
}

// `rc10` must sort after `rc2`, which semver only does for numeric identifiers.
fn split_alpha_numeric(suffix: &str) -> String {
    let mut out = String::with_capacity(suffix.len() + 2);
    let mut prev: Option<char> = None;
    for ch in suffix.chars() {
        if let Some(p) = prev
            && p.is_ascii_alphabetic()
            && ch.is_ascii_digit()
        {
            out.push('.');
        }
        out.push(ch);
        prev = Some(ch);
    }
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReleaseClassification {
    #[serde(rename = "stable")]
    Stable,
    #[serde(rename = "pre-release")]
    PreRelease,
}

impl fmt::Display for ReleaseClassification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stable => write!(f, "stable"),
            Self::PreRelease => write!(f, "pre-release"),
        }
    }
}

/// Derive the release classification from markers in the version string.
#[must_use]
pub fn classify(version: &str) -> ReleaseClassification {
    let lower = version.to_ascii_lowercase();
    if PRERELEASE_MARKERS.iter().any(|marker| lower.contains(marker)) {
        ReleaseClassification::PreRelease
    } else {
        ReleaseClassification::Stable
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstalledVersion {
    pub version: String,
    pub path: PathBuf,
    pub active: bool,
    pub managed: bool,
    #[serde(default)]
    pub install_date: Option<DateTime<Utc>>,
}

impl InstalledVersion {
    #[must_use]
    pub fn parsed_version(&self) -> Option<GoVersion> {
        self.version.parse().ok()
    }
}

/// A subdirectory of the managed install root as reported by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagedInstall {
    pub version: String,
    pub path: PathBuf,
    pub modified: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseArtifact {
    pub filename: String,
    pub url: String,
    #[serde(default)]
    pub sha256: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteRelease {
    pub version: String,
    pub classification: ReleaseClassification,
    #[serde(default)]
    pub artifact: Option<ReleaseArtifact>,
}

impl RemoteRelease {
    #[must_use]
    pub fn new(version: impl Into<String>, artifact: Option<ReleaseArtifact>) -> Self {
        let version = version.into();
        let classification = classify(&version);
        Self {
            version,
            classification,
            artifact,
        }
    }
}

/// Progress notification for an in-flight install.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadProgress {
    pub version: String,
    pub progress: u8,
}

/// The single live download. An empty `version` means no install is running.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadState {
    pub version: String,
    pub progress: u8,
}

impl DownloadState {
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.version.is_empty()
    }
}
