use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::BackendError;
use crate::progress::ProgressReporter;
use crate::types::{
    DownloadProgress, DownloadState, InstalledVersion, ManagedInstall, ReleaseArtifact,
    ReleaseClassification, RemoteRelease,
};

/// The operation surface offered to a front end.
#[async_trait]
pub trait VersionManager: Send + Sync {
    fn name(&self) -> &'static str;

    /// Installed versions, managed and foreign, with the active one flagged.
    async fn list_versions(&self) -> Result<Vec<InstalledVersion>, BackendError>;

    /// Releases published upstream. Always performs a fresh retrieval.
    async fn fetch_remote_versions(&self) -> Result<Vec<RemoteRelease>, BackendError>;

    /// Repoint the active pointer at `target`, an install path.
    async fn switch_version(&self, target: &str) -> Result<InstalledVersion, BackendError>;

    /// Download, verify, unpack and register `version`. Progress is pushed to
    /// `progress` without ever waiting on the receiver.
    async fn install_version(
        &self,
        version: &str,
        progress: mpsc::Sender<DownloadProgress>,
        cancel: CancellationToken,
    ) -> Result<InstalledVersion, BackendError>;

    async fn uninstall_version(&self, version: &str) -> Result<(), BackendError>;

    fn download_state(&self) -> DownloadState;

    async fn active_version(&self) -> Result<Option<InstalledVersion>, BackendError> {
        let versions = self.list_versions().await?;
        Ok(versions.into_iter().find(|v| v.active))
    }

    async fn fetch_stable_versions(&self) -> Result<Vec<RemoteRelease>, BackendError> {
        let all = self.fetch_remote_versions().await?;
        Ok(all
            .into_iter()
            .filter(|r| r.classification == ReleaseClassification::Stable)
            .collect())
    }
}

/// Held while registry-affecting steps run. Dropping it releases the lock.
pub struct StoreLock {
    _guard: Option<Box<dyn Send + Sync>>,
}

impl StoreLock {
    #[must_use]
    pub fn new(guard: Box<dyn Send + Sync>) -> Self {
        Self {
            _guard: Some(guard),
        }
    }

    #[must_use]
    pub fn unguarded() -> Self {
        Self { _guard: None }
    }
}

impl std::fmt::Debug for StoreLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreLock")
            .field("guarded", &self._guard.is_some())
            .finish()
    }
}

/// Repository over the managed install root and the active pointer.
///
/// Implementations must make `write_active_pointer`, `commit_install` and
/// `remove_managed` all-or-nothing from a concurrent reader's view.
pub trait InstallStore: Send + Sync {
    fn install_root(&self) -> &Path;

    fn list_managed(&self) -> Result<Vec<ManagedInstall>, BackendError>;

    fn read_active_pointer(&self) -> Result<Option<PathBuf>, BackendError>;

    fn write_active_pointer(&self, target: &Path) -> Result<(), BackendError>;

    /// Whether `path` holds a usable toolchain (marker files present).
    fn is_installation(&self, path: &Path) -> bool;

    /// A scratch directory on the same filesystem as the install root, never
    /// reported by `list_managed`.
    fn staging_dir(&self) -> Result<PathBuf, BackendError>;

    /// Move an unpacked tree into place as `version`.
    fn commit_install(&self, version: &str, unpacked: &Path) -> Result<PathBuf, BackendError>;

    fn remove_managed(&self, version: &str) -> Result<(), BackendError>;

    /// Finish deleting `version` if an earlier removal was interrupted after
    /// it was unregistered. Returns whether anything was left to delete.
    fn finish_pending_removal(&self, version: &str) -> Result<bool, BackendError>;

    /// Delete staging and trash leftovers from interrupted operations.
    /// Returns how many entries were removed.
    fn sweep_leftovers(&self) -> Result<usize, BackendError>;

    /// Blocks until registry mutations are exclusively ours.
    fn lock_mutations(&self) -> Result<StoreLock, BackendError>;
}

/// Remote catalog and artifact transfer.
#[async_trait]
pub trait ReleaseSource: Send + Sync {
    async fn fetch_releases(&self) -> Result<Vec<RemoteRelease>, BackendError>;

    /// Stream `artifact` into `dest`, returning the number of bytes written.
    async fn download_artifact(
        &self,
        artifact: &ReleaseArtifact,
        dest: &Path,
        progress: &mut ProgressReporter,
        cancel: &CancellationToken,
    ) -> Result<u64, BackendError>;
}
