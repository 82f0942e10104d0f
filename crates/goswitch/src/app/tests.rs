use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use goswitch_backend::{
    BackendError, DownloadProgress, ProgressReporter, ReleaseArtifact, ReleaseSource,
    RemoteRelease, VersionManager,
};
use goswitch_platform::{AppPaths, executable_name};
use goswitch_shell::{INIT_MARKER, ShellType};

use super::{App, AppEvent};
use crate::cache::DiskCache;
use crate::settings::AppSettings;

struct FakeSource {
    release: RemoteRelease,
    archive: Vec<u8>,
    catalog_down: AtomicBool,
    hang_until_cancelled: bool,
}

#[async_trait]
impl ReleaseSource for FakeSource {
    async fn fetch_releases(&self) -> Result<Vec<RemoteRelease>, BackendError> {
        if self.catalog_down.load(Ordering::SeqCst) {
            return Err(BackendError::network_request("fetch release catalog", "offline"));
        }
        Ok(vec![self.release.clone()])
    }

    async fn download_artifact(
        &self,
        artifact: &ReleaseArtifact,
        dest: &Path,
        progress: &mut ProgressReporter,
        cancel: &CancellationToken,
    ) -> Result<u64, BackendError> {
        progress.start();
        if self.hang_until_cancelled {
            cancel.cancelled().await;
            return Err(BackendError::Cancelled {
                version: artifact.filename.clone(),
            });
        }
        progress.report_percent(37);
        std::fs::write(dest, &self.archive)?;
        progress.finish();
        Ok(self.archive.len() as u64)
    }
}

fn sdk_zip() -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    let options = zip::write::SimpleFileOptions::default().unix_permissions(0o755);
    writer
        .start_file(format!("go/bin/{}", executable_name("go")), options)
        .expect("start go binary");
    writer.write_all(b"#!/bin/sh\n").expect("write go binary");
    writer.finish().expect("finish zip").into_inner()
}

fn source(hang_until_cancelled: bool) -> Arc<FakeSource> {
    Arc::new(FakeSource {
        release: RemoteRelease::new(
            "1.22.0",
            Some(ReleaseArtifact {
                filename: "go1.22.0.test.zip".to_string(),
                url: "https://fake.invalid/go1.22.0.test.zip".to_string(),
                sha256: None,
                size: None,
            }),
        ),
        archive: sdk_zip(),
        catalog_down: AtomicBool::new(false),
        hang_until_cancelled,
    })
}

fn paths(base: &Path) -> AppPaths {
    AppPaths {
        config_dir: base.join("config"),
        cache_dir: base.join("cache"),
        data_dir: base.join("data"),
        root_dir: base.join("home"),
    }
}

fn settings() -> AppSettings {
    AppSettings {
        scan_system_installs: false,
        ..AppSettings::default()
    }
}

fn drain(events: &mut broadcast::Receiver<AppEvent>) -> Vec<DownloadProgress> {
    let mut seen = Vec::new();
    while let Ok(AppEvent::DownloadProgress(progress)) = events.try_recv() {
        seen.push(progress);
    }
    seen
}

#[tokio::test]
async fn install_publishes_progress_then_reports_success() {
    let temp = tempfile::tempdir().expect("tempdir");
    let app = App::with_source(settings(), paths(temp.path()), source(false));
    app.start().await;
    let mut events = app.subscribe();

    let outcome = app.install_version("1.22.0").await;

    assert_eq!(outcome, "Success");
    let progress: Vec<u8> = drain(&mut events).iter().map(|p| p.progress).collect();
    assert_eq!(progress, [0, 37, 100]);
    let versions = app.list_versions().await.expect("list");
    assert_eq!(versions.len(), 1);
    assert!(versions[0].managed);
    assert!(!versions[0].active);
    assert!(app.manager.download_state().is_idle());
}

#[tokio::test]
async fn install_timeout_cancels_and_reports_error() {
    let temp = tempfile::tempdir().expect("tempdir");
    let settings = AppSettings {
        install_timeout_secs: 0,
        ..settings()
    };
    let app = App::with_source(settings, paths(temp.path()), source(true));

    let outcome = app.install_version("1.22.0").await;

    assert_eq!(outcome, "Error: Installation timed out after 0s");
    assert!(app.list_versions().await.expect("list").is_empty());
    assert!(app.manager.download_state().is_idle());
}

#[tokio::test]
async fn cancel_install_stops_running_install_only() {
    let temp = tempfile::tempdir().expect("tempdir");
    let app = Arc::new(App::with_source(
        settings(),
        paths(temp.path()),
        source(true),
    ));
    let mut events = app.subscribe();

    let running = tokio::spawn({
        let app = Arc::clone(&app);
        async move { app.install_version("1.22.0").await }
    });
    // the first progress event means the download has started
    let started = events.recv().await.expect("start event");
    assert_eq!(started.name(), "download_progress");
    app.cancel_install();

    let outcome = running.await.expect("install task");
    assert!(outcome.starts_with("Error: "), "{outcome}");
    assert!(outcome.contains("cancelled"), "{outcome}");
    assert!(!app.install_cancel.lock().expect("token").is_cancelled());
}

#[tokio::test]
async fn fetch_persists_catalog_and_startup_reuses_it_offline() {
    let temp = tempfile::tempdir().expect("tempdir");
    let remote = source(false);

    let first = App::with_source(settings(), paths(temp.path()), remote.clone());
    let releases = first.fetch_remote_versions().await.expect("fetch");
    assert_eq!(releases.len(), 1);
    assert!(
        DiskCache::load_from_path(&paths(temp.path()).release_cache_file()).is_some()
    );

    remote.catalog_down.store(true, Ordering::SeqCst);
    let second = App::with_source(settings(), paths(temp.path()), remote.clone());
    second.start().await;

    assert_eq!(second.install_version("1.22.0").await, "Success");
    assert!(second.fetch_remote_versions().await.is_err());
}

#[tokio::test]
async fn switch_and_uninstall_report_result_strings() {
    let temp = tempfile::tempdir().expect("tempdir");
    let app = App::with_source(settings(), paths(temp.path()), source(false));
    assert_eq!(app.install_version("1.22.0").await, "Success");

    assert_eq!(app.switch_version("1.22.0").await, "Success");
    let active = app.list_versions().await.expect("list");
    assert!(active[0].active);

    let refused = app.uninstall_version("1.22.0").await;
    assert!(refused.starts_with("Error: Cannot uninstall"), "{refused}");

    let missing = app.switch_version("1.9.9").await;
    assert!(missing.starts_with("Error: "), "{missing}");
    assert!(app.list_versions().await.expect("list")[0].active);
}

#[cfg(unix)]
#[tokio::test]
async fn env_snippet_points_at_the_pointer_symlink() {
    let temp = tempfile::tempdir().expect("tempdir");
    let app = App::with_source(settings(), paths(temp.path()), source(false));

    let snippet = app.env_snippet(ShellType::Bash).expect("snippet");

    let pointer: PathBuf = temp.path().join("home").join("current");
    assert!(snippet.contains(&format!("export GOROOT='{}'", pointer.display())));
}

#[test]
fn setup_shell_is_idempotent_and_reversible() {
    let temp = tempfile::tempdir().expect("tempdir");
    let app = App::with_source(settings(), paths(temp.path()), source(false));
    let profile = temp.path().join(".zshrc");
    std::fs::write(&profile, "setopt autocd\n").expect("seed profile");

    let added = app
        .setup_shell_at(ShellType::Zsh, &profile, false)
        .expect("add init");
    let again = app
        .setup_shell_at(ShellType::Zsh, &profile, false)
        .expect("add init again");
    assert!(added.has_changes());
    assert!(!again.has_changes());
    let content = std::fs::read_to_string(&profile).expect("read profile");
    assert_eq!(content.matches(INIT_MARKER).count(), 1);

    app.setup_shell_at(ShellType::Zsh, &profile, true)
        .expect("remove init");
    let content = std::fs::read_to_string(&profile).expect("read profile");
    assert_eq!(content, "setopt autocd\n");
}
