use std::path::Path;

use chrono::{DateTime, Duration, Utc};
use goswitch_backend::RemoteRelease;
use serde::{Deserialize, Serialize};

// chrono durations are bounded by i64 milliseconds
const MAX_TTL_HOURS: i64 = i64::MAX / 3_600_000;

/// The last release index fetched, kept between runs so `install` does not
/// need a round trip to the index every time.
#[derive(Debug, Serialize, Deserialize)]
pub struct DiskCache {
    pub releases: Vec<RemoteRelease>,
    pub cached_at: DateTime<Utc>,
}

impl DiskCache {
    pub fn new(releases: Vec<RemoteRelease>) -> Self {
        Self {
            releases,
            cached_at: Utc::now(),
        }
    }

    pub fn load_from_path(path: &Path) -> Option<Self> {
        let data = std::fs::read_to_string(path).ok()?;
        serde_json::from_str(&data).ok()
    }

    pub fn save_to_path(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec(self)?;
        goswitch_core::write_atomic(path, &data)
    }

    /// Younger than `ttl_hours` at `now`. A timestamp in the future counts
    /// as stale.
    pub fn is_fresh(&self, ttl_hours: u64, now: DateTime<Utc>) -> bool {
        let age = now.signed_duration_since(self.cached_at);
        let hours = i64::try_from(ttl_hours).map_or(MAX_TTL_HOURS, |h| h.min(MAX_TTL_HOURS));
        let ttl = Duration::hours(hours);
        age >= Duration::zero() && age < ttl
    }
}

#[cfg(test)]
mod tests {
    use goswitch_backend::{ReleaseArtifact, ReleaseClassification};

    use super::*;

    fn sample_cache() -> DiskCache {
        DiskCache::new(vec![
            RemoteRelease::new(
                "1.22.0",
                Some(ReleaseArtifact {
                    filename: "go1.22.0.linux-amd64.tar.gz".to_string(),
                    url: "https://go.dev/dl/go1.22.0.linux-amd64.tar.gz".to_string(),
                    sha256: Some("ab".repeat(32)),
                    size: Some(68_988_925),
                }),
            ),
            RemoteRelease::new("1.23rc1", None),
        ])
    }

    #[test]
    fn save_to_path_and_load_from_path_keep_artifacts() {
        let temp_dir = tempfile::tempdir().expect("temporary directory should be created");
        let path = temp_dir.path().join("releases.json");

        sample_cache().save_to_path(&path).expect("cache should save");
        let loaded = DiskCache::load_from_path(&path).expect("cache should load");

        assert_eq!(loaded.releases.len(), 2);
        assert_eq!(
            loaded.releases[0]
                .artifact
                .as_ref()
                .and_then(|a| a.size),
            Some(68_988_925)
        );
        assert_eq!(
            loaded.releases[1].classification,
            ReleaseClassification::PreRelease
        );
    }

    #[test]
    fn load_from_path_returns_none_for_invalid_json() {
        let temp_dir = tempfile::tempdir().expect("temporary directory should be created");
        let path = temp_dir.path().join("invalid.json");
        std::fs::write(&path, "{not-valid-json").expect("invalid file should be written");

        assert!(DiskCache::load_from_path(&path).is_none());
    }

    #[test]
    fn save_creates_cache_dir_and_leaves_no_temp_files() {
        let temp_dir = tempfile::tempdir().expect("temporary directory should be created");
        let dir = temp_dir.path().join("cache");
        let path = dir.join("releases.json");

        sample_cache().save_to_path(&path).expect("cache should save");
        sample_cache().save_to_path(&path).expect("cache should overwrite");

        let names: Vec<_> = std::fs::read_dir(&dir)
            .expect("read cache dir")
            .filter_map(Result::ok)
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, ["releases.json"]);
    }

    #[test]
    fn freshness_respects_ttl() {
        let cache = sample_cache();
        let now = cache.cached_at;

        assert!(cache.is_fresh(1, now + Duration::minutes(59)));
        assert!(!cache.is_fresh(1, now + Duration::minutes(61)));
        assert!(!cache.is_fresh(0, now));
        assert!(!cache.is_fresh(1, now - Duration::minutes(5)));
    }
}
