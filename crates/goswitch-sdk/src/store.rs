use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use fs2::FileExt;
use log::{debug, info, warn};

use goswitch_backend::{BackendError, GoVersion, InstallStore, ManagedInstall, StoreLock};
use goswitch_core::{has_go_binary, unique_suffix};
use goswitch_platform::AppPaths;

const STAGING_DIR: &str = ".staging";
const TRASH_DIR: &str = ".trash";

/// `InstallStore` over a directory tree:
///
/// ```text
/// <root>/sdk/<version>/     managed installs
/// <root>/sdk/.staging/      unpack area, swept on recovery
/// <root>/sdk/.trash/        uninstall area, swept on recovery
/// <root>/current            symlink to the active install (Unix)
/// <root>/active             file holding the active install path (Windows)
/// <root>/.lock              cross-process mutation lock
/// ```
#[derive(Debug, Clone)]
pub struct FsStore {
    root_dir: PathBuf,
    sdk_dir: PathBuf,
}

impl FsStore {
    #[must_use]
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        let root_dir = root_dir.into();
        Self {
            sdk_dir: root_dir.join("sdk"),
            root_dir,
        }
    }

    #[must_use]
    pub fn from_paths(paths: &AppPaths) -> Self {
        Self {
            root_dir: paths.root_dir.clone(),
            sdk_dir: paths.sdk_dir(),
        }
    }

    #[must_use]
    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    /// The file or symlink that records the active install.
    #[must_use]
    pub fn pointer_path(&self) -> PathBuf {
        if cfg!(windows) {
            self.root_dir.join("active")
        } else {
            self.root_dir.join("current")
        }
    }

    fn staging_root(&self) -> PathBuf {
        self.sdk_dir.join(STAGING_DIR)
    }

    fn trash_root(&self) -> PathBuf {
        self.sdk_dir.join(TRASH_DIR)
    }

    fn managed_path(&self, version: &str) -> Result<PathBuf, BackendError> {
        let version: GoVersion = version.parse()?;
        Ok(self.sdk_dir.join(version.name()))
    }

    fn create_dir(path: &Path) -> Result<(), BackendError> {
        std::fs::create_dir_all(path).map_err(|error| {
            BackendError::io_with_context(&format!("failed to create {}", path.display()), &error)
        })
    }
}

impl InstallStore for FsStore {
    fn install_root(&self) -> &Path {
        &self.sdk_dir
    }

    fn list_managed(&self) -> Result<Vec<ManagedInstall>, BackendError> {
        let entries = match std::fs::read_dir(&self.sdk_dir) {
            Ok(entries) => entries,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                debug!("Install root {} does not exist yet", self.sdk_dir.display());
                return Ok(Vec::new());
            }
            Err(error) => {
                return Err(BackendError::io_with_context(
                    &format!("failed to read {}", self.sdk_dir.display()),
                    &error,
                ));
            }
        };

        let mut installs = Vec::new();
        for entry in entries.filter_map(Result::ok) {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') {
                continue;
            }
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            let Ok(version) = name.parse::<GoVersion>() else {
                debug!("Ignoring non-version directory {}", path.display());
                continue;
            };
            if !has_go_binary(&path) {
                debug!("Ignoring {} without a go binary", path.display());
                continue;
            }

            let modified = entry
                .metadata()
                .and_then(|meta| meta.modified())
                .ok()
                .map(DateTime::<Utc>::from);
            installs.push(ManagedInstall {
                version: version.name().to_string(),
                path,
                modified,
            });
        }

        Ok(installs)
    }

    #[cfg(unix)]
    fn read_active_pointer(&self) -> Result<Option<PathBuf>, BackendError> {
        let link = self.pointer_path();
        match std::fs::read_link(&link) {
            Ok(target) => Ok(Some(target)),
            Err(error)
                if matches!(
                    error.kind(),
                    std::io::ErrorKind::NotFound | std::io::ErrorKind::InvalidInput
                ) =>
            {
                Ok(None)
            }
            Err(error) => Err(BackendError::io_with_context(
                &format!("failed to read {}", link.display()),
                &error,
            )),
        }
    }

    #[cfg(not(unix))]
    fn read_active_pointer(&self) -> Result<Option<PathBuf>, BackendError> {
        let file = self.pointer_path();
        match std::fs::read_to_string(&file) {
            Ok(contents) => {
                let contents = contents.trim();
                Ok((!contents.is_empty()).then(|| PathBuf::from(contents)))
            }
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(error) => Err(BackendError::io_with_context(
                &format!("failed to read {}", file.display()),
                &error,
            )),
        }
    }

    #[cfg(unix)]
    fn write_active_pointer(&self, target: &Path) -> Result<(), BackendError> {
        Self::create_dir(&self.root_dir)?;
        let link = self.pointer_path();
        let tmp = self.root_dir.join(format!(".current.{}.tmp", unique_suffix()));

        std::os::unix::fs::symlink(target, &tmp).map_err(|error| {
            BackendError::io_with_context(&format!("failed to create {}", tmp.display()), &error)
        })?;
        // rename(2) swaps the link in one step
        if let Err(error) = std::fs::rename(&tmp, &link) {
            let _ = std::fs::remove_file(&tmp);
            return Err(BackendError::io_with_context(
                &format!("failed to replace {}", link.display()),
                &error,
            ));
        }

        info!("Active pointer now {}", target.display());
        Ok(())
    }

    #[cfg(not(unix))]
    fn write_active_pointer(&self, target: &Path) -> Result<(), BackendError> {
        Self::create_dir(&self.root_dir)?;
        let file = self.pointer_path();
        goswitch_core::write_atomic(&file, target.to_string_lossy().as_bytes()).map_err(
            |error| {
                BackendError::io_with_context(&format!("failed to write {}", file.display()), &error)
            },
        )?;

        info!("Active pointer now {}", target.display());
        Ok(())
    }

    fn is_installation(&self, path: &Path) -> bool {
        has_go_binary(path)
    }

    fn staging_dir(&self) -> Result<PathBuf, BackendError> {
        let staging = self.staging_root();
        Self::create_dir(&staging)?;
        Ok(staging)
    }

    fn commit_install(&self, version: &str, unpacked: &Path) -> Result<PathBuf, BackendError> {
        let dest = self.managed_path(version)?;
        if dest.exists() {
            return Err(BackendError::precondition(
                "install",
                version,
                "it is already installed",
            ));
        }
        Self::create_dir(&self.sdk_dir)?;

        std::fs::rename(unpacked, &dest).map_err(|error| {
            BackendError::io_with_context(
                &format!("failed to move {} into place", unpacked.display()),
                &error,
            )
        })?;

        info!("Registered {version} at {}", dest.display());
        Ok(dest)
    }

    fn remove_managed(&self, version: &str) -> Result<(), BackendError> {
        let dest = self.managed_path(version)?;
        if !dest.exists() {
            return Err(BackendError::not_found("Installed version", version));
        }

        let trash = self.trash_root();
        Self::create_dir(&trash)?;
        let doomed = trash.join(format!("{version}.{}", unique_suffix()));

        std::fs::rename(&dest, &doomed).map_err(|error| {
            BackendError::io_with_context(&format!("failed to remove {}", dest.display()), &error)
        })?;
        info!("Unregistered {version}");

        if let Err(error) = std::fs::remove_dir_all(&doomed) {
            warn!(
                "Leaving {} for the next cleanup: {error}",
                doomed.display()
            );
        }
        Ok(())
    }

    fn finish_pending_removal(&self, version: &str) -> Result<bool, BackendError> {
        let entries = match std::fs::read_dir(self.trash_root()) {
            Ok(entries) => entries,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(false),
            Err(error) => {
                return Err(BackendError::io_with_context("failed to read trash", &error));
            }
        };

        let mut pending = false;
        for entry in entries.filter_map(Result::ok) {
            if trashed_version(&entry.file_name().to_string_lossy()) != Some(version) {
                continue;
            }
            pending = true;
            let path = entry.path();
            std::fs::remove_dir_all(&path).map_err(|error| {
                BackendError::io_with_context(&format!("failed to remove {}", path.display()), &error)
            })?;
        }

        if pending {
            info!("Finished interrupted removal of {version}");
        }
        Ok(pending)
    }

    fn sweep_leftovers(&self) -> Result<usize, BackendError> {
        let mut removed = 0;
        for dir in [self.staging_root(), self.trash_root()] {
            let entries = match std::fs::read_dir(&dir) {
                Ok(entries) => entries,
                Err(error) if error.kind() == std::io::ErrorKind::NotFound => continue,
                Err(error) => {
                    return Err(BackendError::io_with_context(
                        &format!("failed to read {}", dir.display()),
                        &error,
                    ));
                }
            };

            for entry in entries.filter_map(Result::ok) {
                let path = entry.path();
                let result = if path.is_dir() {
                    std::fs::remove_dir_all(&path)
                } else {
                    std::fs::remove_file(&path)
                };
                match result {
                    Ok(()) => removed += 1,
                    Err(error) => warn!("Could not remove leftover {}: {error}", path.display()),
                }
            }
        }

        if removed > 0 {
            info!("Removed {removed} leftovers from interrupted operations");
        }
        Ok(removed)
    }

    fn lock_mutations(&self) -> Result<StoreLock, BackendError> {
        Self::create_dir(&self.root_dir)?;
        let lock_path = self.root_dir.join(".lock");
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&lock_path)
            .map_err(|error| BackendError::io_with_context("failed to open lock file", &error))?;

        file.lock_exclusive()
            .map_err(|error| BackendError::io_with_context("failed to acquire lock", &error))?;

        Ok(StoreLock::new(Box::new(file)))
    }
}

/// Version a trash entry belongs to. Entries are `<version>.<pid>.<nanos>`,
/// and versions contain dots themselves.
fn trashed_version(entry: &str) -> Option<&str> {
    let mut parts = entry.rsplitn(3, '.');
    let _nanos = parts.next()?;
    let _pid = parts.next()?;
    parts.next().filter(|version| !version.is_empty())
}

#[cfg(test)]
mod tests {
    use goswitch_backend::ErrorKind;
    use goswitch_platform::executable_name;

    use super::*;

    fn fake_sdk(dir: &Path) {
        std::fs::create_dir_all(dir.join("bin")).expect("bin dir");
        std::fs::write(dir.join("bin").join(executable_name("go")), b"").expect("go binary");
    }

    #[test]
    fn list_managed_on_missing_root_is_empty() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = FsStore::new(temp.path().join("absent"));

        assert!(store.list_managed().expect("listing").is_empty());
    }

    #[test]
    fn list_managed_skips_hidden_invalid_and_incomplete_dirs() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = FsStore::new(temp.path());
        fake_sdk(&temp.path().join("sdk/1.22.0"));
        fake_sdk(&temp.path().join("sdk/.staging/1.23.0"));
        fake_sdk(&temp.path().join("sdk/not-a-version"));
        std::fs::create_dir_all(temp.path().join("sdk/1.21.0/src")).expect("no bin");

        let installs = store.list_managed().expect("listing");

        assert_eq!(installs.len(), 1);
        assert_eq!(installs[0].version, "1.22.0");
        assert!(installs[0].modified.is_some());
    }

    #[test]
    fn active_pointer_round_trips_and_replaces() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = FsStore::new(temp.path());
        let first = temp.path().join("sdk/1.21.0");
        let second = temp.path().join("sdk/1.22.0");
        fake_sdk(&first);
        fake_sdk(&second);

        assert_eq!(store.read_active_pointer().expect("read"), None);

        store.write_active_pointer(&first).expect("first write");
        store.write_active_pointer(&second).expect("second write");

        assert_eq!(store.read_active_pointer().expect("read"), Some(second));
        let tmp_left = std::fs::read_dir(temp.path())
            .expect("root readable")
            .filter_map(Result::ok)
            .any(|entry| entry.file_name().to_string_lossy().ends_with(".tmp"));
        assert!(!tmp_left);
    }

    #[cfg(unix)]
    #[test]
    fn active_pointer_is_a_symlink_shells_can_follow() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = FsStore::new(temp.path());
        let sdk = temp.path().join("sdk/1.22.0");
        fake_sdk(&sdk);

        store.write_active_pointer(&sdk).expect("write");

        assert!(
            store
                .pointer_path()
                .join("bin")
                .join("go")
                .is_file()
        );
    }

    #[test]
    fn commit_install_moves_tree_and_refuses_duplicates() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = FsStore::new(temp.path());
        let staged = store.staging_dir().expect("staging").join("unpacked");
        fake_sdk(&staged);

        let dest = store.commit_install("1.22.0", &staged).expect("commit");

        assert_eq!(dest, temp.path().join("sdk/1.22.0"));
        assert!(!staged.exists());
        assert!(store.is_installation(&dest));

        let again = store.staging_dir().expect("staging").join("again");
        fake_sdk(&again);
        let error = store.commit_install("1.22.0", &again).expect_err("duplicate");
        assert_eq!(error.kind(), ErrorKind::Precondition);
    }

    #[test]
    fn commit_install_rejects_unsafe_names() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = FsStore::new(temp.path());
        let staged = temp.path().join("staged");
        fake_sdk(&staged);

        let error = store.commit_install("../escape", &staged).expect_err("unsafe");

        assert_eq!(error.kind(), ErrorKind::Parse);
        assert!(staged.exists());
    }

    #[test]
    fn remove_managed_leaves_nothing_behind() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = FsStore::new(temp.path());
        fake_sdk(&temp.path().join("sdk/1.22.0"));

        store.remove_managed("1.22.0").expect("remove");

        assert!(!temp.path().join("sdk/1.22.0").exists());
        assert!(store.list_managed().expect("listing").is_empty());
        let trash_entries = std::fs::read_dir(temp.path().join("sdk/.trash"))
            .expect("trash exists")
            .count();
        assert_eq!(trash_entries, 0);
    }

    #[test]
    fn remove_managed_missing_is_not_found() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = FsStore::new(temp.path());

        let error = store.remove_managed("1.22.0").expect_err("absent");
        assert_eq!(error.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn finish_pending_removal_only_touches_matching_entries() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = FsStore::new(temp.path());
        fake_sdk(&temp.path().join("sdk/.trash/1.22.0.100.1"));
        fake_sdk(&temp.path().join("sdk/.trash/1.22.1.100.2"));

        assert!(store.finish_pending_removal("1.22.0").expect("finish"));
        assert!(!store.finish_pending_removal("1.22.0").expect("nothing left"));
        assert!(temp.path().join("sdk/.trash/1.22.1.100.2").exists());
    }

    #[test]
    fn shorter_version_does_not_claim_longer_versions_trash() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = FsStore::new(temp.path());
        fake_sdk(&temp.path().join("sdk/.trash/1.20.1.4242.17"));

        assert!(!store.finish_pending_removal("1.20").expect("finish"));
        assert!(temp.path().join("sdk/.trash/1.20.1.4242.17").exists());
    }

    #[test]
    fn trashed_version_strips_pid_and_timestamp() {
        assert_eq!(trashed_version("1.20.1.4242.17"), Some("1.20.1"));
        assert_eq!(trashed_version("1.22rc1.1.2"), Some("1.22rc1"));
        assert_eq!(trashed_version("4242.17"), None);
        assert_eq!(trashed_version("stray"), None);
    }

    #[test]
    fn sweep_removes_staging_and_trash_contents() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = FsStore::new(temp.path());
        fake_sdk(&temp.path().join("sdk/.staging/dl-1/go"));
        fake_sdk(&temp.path().join("sdk/.trash/1.20.0.1.2"));
        std::fs::write(temp.path().join("sdk/.staging/stray.tar.gz"), b"x").expect("stray");
        fake_sdk(&temp.path().join("sdk/1.22.0"));

        assert_eq!(store.sweep_leftovers().expect("sweep"), 3);
        assert_eq!(store.sweep_leftovers().expect("second sweep"), 0);
        assert_eq!(store.list_managed().expect("listing").len(), 1);
    }

    #[test]
    fn lock_mutations_creates_lock_file() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = FsStore::new(temp.path().join("root"));

        let lock = store.lock_mutations().expect("lock");

        assert!(temp.path().join("root/.lock").is_file());
        drop(lock);
        store.lock_mutations().expect("relock after release");
    }
}
