use std::cmp::Ordering;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use async_trait::async_trait;
use chrono::Utc;
use log::{debug, info, warn};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use goswitch_backend::{
    BackendError, DownloadProgress, DownloadState, GoVersion, InstallStore, InstalledVersion,
    ProgressReporter, ReleaseArtifact, ReleaseSource, RemoteRelease, StoreLock, VersionManager,
};
use goswitch_core::{extract_archive, toolchain_root, verify_sha256};
use goswitch_platform::{ArchiveKind, Target};

use crate::discovery::{SystemScan, canonical, describe_install};

type SharedSlot = Arc<Mutex<Option<DownloadState>>>;

#[derive(Debug, Clone, Default)]
pub struct ManagerOptions {
    pub scan: SystemScan,
    /// Point the active pointer at a fresh install when nothing is active.
    pub auto_activate_first_install: bool,
}

/// The Go SDK engine: lists, switches, installs and removes toolchains
/// against an `InstallStore`, pulling releases from a `ReleaseSource`.
///
/// Registry mutations are serialized by an in-process lock plus the store's
/// own cross-process lock. At most one install runs at a time; a second
/// request fails with `Busy` before touching the network.
pub struct SdkManager {
    store: Arc<dyn InstallStore>,
    source: Arc<dyn ReleaseSource>,
    options: ManagerOptions,
    mutation: tokio::sync::Mutex<()>,
    install_slot: SharedSlot,
    remote_cache: RwLock<Option<Vec<RemoteRelease>>>,
    active_cache: Mutex<Option<Option<PathBuf>>>,
}

impl SdkManager {
    #[must_use]
    pub fn new(
        store: Arc<dyn InstallStore>,
        source: Arc<dyn ReleaseSource>,
        options: ManagerOptions,
    ) -> Self {
        Self {
            store,
            source,
            options,
            mutation: tokio::sync::Mutex::new(()),
            install_slot: Arc::new(Mutex::new(None)),
            remote_cache: RwLock::new(None),
            active_cache: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn store(&self) -> &dyn InstallStore {
        self.store.as_ref()
    }

    /// Remove staging and trash leftovers from interrupted runs. Call once at
    /// startup, before other operations.
    ///
    /// # Errors
    /// Returns an error if the leftovers cannot be enumerated.
    pub async fn recover(&self) -> Result<usize, BackendError> {
        let _guard = self.mutation.lock().await;
        let _lock = self.lock_store().await?;
        let store = Arc::clone(&self.store);
        run_blocking(move || store.sweep_leftovers()).await
    }

    /// Replace the in-memory release list, e.g. from a persisted cache.
    pub fn seed_remote_cache(&self, releases: Vec<RemoteRelease>) {
        *self
            .remote_cache
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(releases);
    }

    pub fn invalidate_remote_cache(&self) {
        *self
            .remote_cache
            .write()
            .unwrap_or_else(PoisonError::into_inner) = None;
    }

    #[must_use]
    pub fn cached_remote_versions(&self) -> Option<Vec<RemoteRelease>> {
        self.remote_cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    async fn releases(&self) -> Result<Vec<RemoteRelease>, BackendError> {
        if let Some(cached) = self.cached_remote_versions() {
            return Ok(cached);
        }
        self.fetch_remote_versions().await
    }

    fn active_pointer(&self) -> Result<Option<PathBuf>, BackendError> {
        let mut cache = self
            .active_cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(pointer) = cache.as_ref() {
            return Ok(pointer.clone());
        }
        let pointer = self.store.read_active_pointer()?;
        *cache = Some(pointer.clone());
        Ok(pointer)
    }

    fn invalidate_active(&self) {
        *self
            .active_cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = None;
    }

    async fn lock_store(&self) -> Result<StoreLock, BackendError> {
        let store = Arc::clone(&self.store);
        run_blocking(move || store.lock_mutations()).await
    }

    fn resolve_switch_target(&self, target: &str) -> Result<PathBuf, BackendError> {
        let trimmed = target.trim();
        if trimmed.is_empty() {
            return Err(BackendError::not_found("Installation", target));
        }

        let as_path = Path::new(trimmed);
        if as_path.exists() || as_path.is_absolute() || as_path.components().count() > 1 {
            return std::path::absolute(as_path).map_err(|error| {
                BackendError::io_with_context(&format!("failed to resolve {trimmed}"), &error)
            });
        }

        let version: GoVersion = trimmed
            .parse()
            .map_err(|_| BackendError::not_found("Installation", target))?;
        Ok(self.store.install_root().join(version.name()))
    }

    fn is_managed_path(&self, path: &Path) -> bool {
        canonical(path).starts_with(canonical(self.store.install_root()))
    }

    /// Staging and trash trees live in hidden directories under the install
    /// root and get renamed or swept away, so they are never switch targets.
    fn is_internal_path(&self, path: &Path) -> bool {
        let path = canonical(path);
        let root = canonical(self.store.install_root());
        path.strip_prefix(&root)
            .ok()
            .and_then(|relative| relative.components().next())
            .is_some_and(|first| first.as_os_str().to_string_lossy().starts_with('.'))
    }

    /// Point at a fresh install when nothing is active yet. The install is
    /// already committed, so a failure here leaves it installed but inactive.
    fn activate_first(&self, path: &Path) -> bool {
        let result = self.store.read_active_pointer().and_then(|pointer| match pointer {
            Some(_) => Ok(false),
            None => self.store.write_active_pointer(path).map(|()| true),
        });
        result.unwrap_or_else(|error| {
            warn!("Installed {} but could not activate it: {error}", path.display());
            false
        })
    }

    async fn find_artifact(&self, version: &GoVersion) -> Result<ReleaseArtifact, BackendError> {
        let releases = self.releases().await?;
        let release = releases
            .into_iter()
            .find(|release| {
                release
                    .version
                    .parse::<GoVersion>()
                    .is_ok_and(|candidate| candidate.name() == version.name())
            })
            .ok_or_else(|| BackendError::not_found("Release", version.name()))?;

        release.artifact.ok_or_else(|| {
            BackendError::not_found("Release archive for this platform", version.name())
        })
    }

    async fn download_and_unpack(
        &self,
        version: &GoVersion,
        artifact: ReleaseArtifact,
        work_dir: &Path,
        progress: mpsc::Sender<DownloadProgress>,
        cancel: &CancellationToken,
    ) -> Result<PathBuf, BackendError> {
        let file_name = Path::new(&artifact.filename)
            .file_name()
            .map_or_else(|| PathBuf::from("download"), PathBuf::from);
        let archive_path = work_dir.join(file_name);

        let slot = Arc::clone(&self.install_slot);
        let mut reporter = ProgressReporter::new(version.name(), progress).with_observer(
            move |percent| {
                if let Some(state) = slot
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .as_mut()
                {
                    state.progress = percent;
                }
            },
        );

        let bytes = self
            .source
            .download_artifact(&artifact, &archive_path, &mut reporter, cancel)
            .await?;
        debug!("Downloaded {bytes} bytes for {version}");
        ensure_not_cancelled(cancel, version)?;

        let kind = ArchiveKind::from_filename(&artifact.filename)
            .or_else(|| Target::current().map(|target| target.archive_kind()))
            .ok_or_else(|| {
                BackendError::precondition(
                    "install",
                    version.name(),
                    "the release archive format is not supported",
                )
            })?;
        let unpack_dir = work_dir.join("unpacked");

        let root = run_blocking(move || {
            verify_sha256(&artifact, &archive_path)?;
            extract_archive(kind, &archive_path, &unpack_dir)?;
            Ok(toolchain_root(&unpack_dir)?)
        })
        .await?;
        ensure_not_cancelled(cancel, version)?;

        Ok(root)
    }
}

fn ensure_not_cancelled(cancel: &CancellationToken, version: &GoVersion) -> Result<(), BackendError> {
    if cancel.is_cancelled() {
        return Err(BackendError::Cancelled {
            version: version.name().to_string(),
        });
    }
    Ok(())
}

async fn run_blocking<T, F>(task: F) -> Result<T, BackendError>
where
    F: FnOnce() -> Result<T, BackendError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .map_err(|error| BackendError::IoError {
            kind: std::io::ErrorKind::Other,
            message: format!("background task failed: {error}"),
        })?
}

/// Claimed install slot. Dropping it frees the slot on every exit path.
struct InstallSlot {
    slot: SharedSlot,
}

impl InstallSlot {
    fn claim(slot: &SharedSlot, version: &str) -> Result<Self, BackendError> {
        let mut current = slot.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(running) = current.as_ref() {
            return Err(BackendError::Busy {
                version: running.version.clone(),
            });
        }
        *current = Some(DownloadState {
            version: version.to_string(),
            progress: 0,
        });
        Ok(Self {
            slot: Arc::clone(slot),
        })
    }
}

impl Drop for InstallSlot {
    fn drop(&mut self) {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

fn compare_listed(a: &InstalledVersion, b: &InstalledVersion) -> Ordering {
    match (a.parsed_version(), b.parsed_version()) {
        (Some(a), Some(b)) => b.cmp(&a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
    .then_with(|| b.managed.cmp(&a.managed))
    .then_with(|| a.path.cmp(&b.path))
}

fn collect_versions(
    store: &dyn InstallStore,
    scan: &SystemScan,
    pointer: Option<&Path>,
) -> Result<Vec<InstalledVersion>, BackendError> {
    let mut versions: Vec<InstalledVersion> = store
        .list_managed()?
        .into_iter()
        .map(|install| InstalledVersion {
            version: install.version,
            path: install.path,
            active: false,
            managed: true,
            install_date: install.modified,
        })
        .collect();

    versions.extend(
        scan.scan(store.install_root())
            .into_iter()
            .map(|foreign| InstalledVersion {
                version: foreign.version,
                path: foreign.path,
                active: false,
                managed: false,
                install_date: foreign.modified,
            }),
    );

    versions.sort_by(compare_listed);

    // a dangling pointer marks nothing
    if let Some(active) = pointer
        .filter(|path| store.is_installation(path))
        .map(canonical)
        && let Some(entry) = versions
            .iter_mut()
            .find(|entry| canonical(&entry.path) == active)
    {
        entry.active = true;
    }

    Ok(versions)
}

#[async_trait]
impl VersionManager for SdkManager {
    fn name(&self) -> &'static str {
        "go"
    }

    async fn list_versions(&self) -> Result<Vec<InstalledVersion>, BackendError> {
        let pointer = self.active_pointer()?;
        let store = Arc::clone(&self.store);
        let scan = self.options.scan.clone();

        let versions =
            run_blocking(move || collect_versions(store.as_ref(), &scan, pointer.as_deref()))
                .await?;
        debug!("Listed {} installed versions", versions.len());
        Ok(versions)
    }

    async fn fetch_remote_versions(&self) -> Result<Vec<RemoteRelease>, BackendError> {
        let releases = self.source.fetch_releases().await?;
        self.seed_remote_cache(releases.clone());
        Ok(releases)
    }

    async fn switch_version(&self, target: &str) -> Result<InstalledVersion, BackendError> {
        let path = self.resolve_switch_target(target)?;
        if self.is_internal_path(&path) || !self.store.is_installation(&path) {
            return Err(BackendError::not_found("Installation", target));
        }

        let _guard = self.mutation.lock().await;
        let _lock = self.lock_store().await?;

        // may have been uninstalled while we waited
        if !self.store.is_installation(&path) {
            return Err(BackendError::not_found("Installation", target));
        }

        self.store.write_active_pointer(&path)?;
        self.invalidate_active();

        let managed = self.is_managed_path(&path);
        let (version, install_date) = describe_install(&path);
        let version = if managed {
            path.file_name()
                .map_or(version, |name| name.to_string_lossy().into_owned())
        } else {
            version
        };
        info!("Switched to Go {version} at {}", path.display());

        Ok(InstalledVersion {
            version,
            path,
            active: true,
            managed,
            install_date,
        })
    }

    async fn install_version(
        &self,
        version: &str,
        progress: mpsc::Sender<DownloadProgress>,
        cancel: CancellationToken,
    ) -> Result<InstalledVersion, BackendError> {
        let version: GoVersion = version.parse()?;
        let _slot = InstallSlot::claim(&self.install_slot, version.name())?;
        info!("Installing Go {version}");

        let artifact = self.find_artifact(&version).await?;

        let already = self
            .store
            .list_managed()?
            .into_iter()
            .any(|install| install.version == version.name());
        if already {
            return Err(BackendError::precondition(
                "install",
                version.name(),
                "it is already installed",
            ));
        }

        let staging = self.store.staging_dir()?;
        let work_dir = tempfile::Builder::new()
            .prefix(&format!("{}-", version.name()))
            .tempdir_in(&staging)
            .map_err(|error| {
                BackendError::io_with_context("failed to create staging directory", &error)
            })?;

        let root = self
            .download_and_unpack(&version, artifact, work_dir.path(), progress, &cancel)
            .await?;

        let _guard = self.mutation.lock().await;
        let _lock = self.lock_store().await?;

        let path = self.store.commit_install(version.name(), &root)?;
        let active = self.options.auto_activate_first_install && self.activate_first(&path);
        self.invalidate_active();
        info!("Installed Go {version} at {}", path.display());

        Ok(InstalledVersion {
            version: version.name().to_string(),
            path,
            active,
            managed: true,
            install_date: Some(Utc::now()),
        })
    }

    async fn uninstall_version(&self, version: &str) -> Result<(), BackendError> {
        let version: GoVersion = version.parse()?;

        let _guard = self.mutation.lock().await;
        let _lock = self.lock_store().await?;

        let managed = self
            .store
            .list_managed()?
            .into_iter()
            .find(|install| install.version == version.name());

        let Some(install) = managed else {
            if self.store.finish_pending_removal(version.name())? {
                return Ok(());
            }
            let foreign = self
                .options
                .scan
                .scan(self.store.install_root())
                .into_iter()
                .any(|install| install.version == version.name());
            if foreign {
                return Err(BackendError::precondition(
                    "uninstall",
                    version.name(),
                    "it was not installed by goswitch",
                ));
            }
            return Err(BackendError::not_found("Installed version", version.name()));
        };

        self.invalidate_active();
        let active = self
            .active_pointer()?
            .filter(|pointer| self.store.is_installation(pointer))
            .is_some_and(|pointer| canonical(&pointer) == canonical(&install.path));
        if active {
            return Err(BackendError::precondition(
                "uninstall",
                version.name(),
                "it is the active version",
            ));
        }

        self.store.remove_managed(version.name())?;
        info!("Uninstalled Go {version}");
        Ok(())
    }

    fn download_state(&self) -> DownloadState {
        self.install_slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .unwrap_or_default()
    }
}
