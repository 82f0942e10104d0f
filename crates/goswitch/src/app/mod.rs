//! The operation surface a front end talks to.
//!
//! Reads (`list_versions`, `fetch_remote_versions`) return data; mutations
//! (`switch_version`, `install_version`, `uninstall_version`) return
//! `"Success"` or `"Error: …"`. Install progress is published separately as
//! `download_progress` events on a broadcast channel.

mod async_helpers;
mod events;
mod shell;

#[cfg(test)]
mod tests;

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::Utc;
use log::{debug, info, warn};
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;

use goswitch_backend::{
    InstallStore, InstalledVersion, ReleaseSource, RemoteRelease, VersionManager,
};
use goswitch_core::{CatalogClient, HttpReleaseSource, build_http_client};
use goswitch_platform::AppPaths;
use goswitch_sdk::{FsStore, ManagerOptions, SdkManager, SystemScan};

use crate::cache::DiskCache;
use crate::error::{AppError, result_string};
use crate::settings::AppSettings;

use async_helpers::run_with_timeout;
pub use events::AppEvent;

const EVENT_BUFFER: usize = 256;

pub struct App {
    settings: AppSettings,
    paths: AppPaths,
    store: Arc<FsStore>,
    manager: Arc<SdkManager>,
    events: broadcast::Sender<AppEvent>,
    install_cancel: Mutex<CancellationToken>,
}

impl App {
    /// Wire the engine to the upstream download site described by
    /// `settings`.
    pub fn new(settings: AppSettings, paths: AppPaths) -> Result<Self, AppError> {
        let client = build_http_client(
            Duration::from_secs(settings.connect_timeout_secs),
            Duration::from_secs(settings.http_timeout_secs),
        )?;

        let mut catalog = CatalogClient::new(client)
            .with_retry_delays(settings.retry_delays_secs.clone())
            .with_timeout(Duration::from_secs(settings.http_timeout_secs));
        if let Some(mirror) = settings
            .download_mirror
            .as_deref()
            .map(str::trim)
            .filter(|mirror| !mirror.is_empty())
        {
            debug!("Using download mirror {mirror}");
            catalog = catalog.with_base_url(mirror);
        }

        Ok(Self::with_source(
            settings,
            paths,
            Arc::new(HttpReleaseSource::new(catalog)),
        ))
    }

    pub fn with_source(
        settings: AppSettings,
        paths: AppPaths,
        source: Arc<dyn ReleaseSource>,
    ) -> Self {
        let store = Arc::new(FsStore::from_paths(&paths));
        let options = ManagerOptions {
            scan: system_scan(&settings),
            auto_activate_first_install: settings.auto_activate_first_install,
        };
        let shared_store: Arc<dyn InstallStore> = store.clone();
        let manager = Arc::new(SdkManager::new(shared_store, source, options));
        let (events, _) = broadcast::channel(EVENT_BUFFER);

        Self {
            settings,
            paths,
            store,
            manager,
            events,
            install_cancel: Mutex::new(CancellationToken::new()),
        }
    }

    /// Clean up after interrupted runs and load a fresh enough release index
    /// from disk. Call once before serving operations.
    pub async fn start(&self) {
        match self.manager.recover().await {
            Ok(0) => {}
            Ok(removed) => info!("Recovered from {removed} interrupted operations"),
            Err(error) => warn!("Startup recovery failed: {error}"),
        }

        let cache_path = self.paths.release_cache_file();
        if let Some(cache) = DiskCache::load_from_path(&cache_path)
            && cache.is_fresh(self.settings.cache_ttl_hours, Utc::now())
        {
            debug!(
                "Seeding {} releases cached at {}",
                cache.releases.len(),
                cache.cached_at
            );
            self.manager.seed_remote_cache(cache.releases);
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AppEvent> {
        self.events.subscribe()
    }

    pub async fn list_versions(&self) -> Result<Vec<InstalledVersion>, AppError> {
        Ok(self.manager.list_versions().await?)
    }

    /// Always asks upstream, then persists the answer for later runs.
    pub async fn fetch_remote_versions(&self) -> Result<Vec<RemoteRelease>, AppError> {
        let releases = self.manager.fetch_remote_versions().await?;

        let cache = DiskCache::new(releases.clone());
        if let Err(error) = cache.save_to_path(&self.paths.release_cache_file()) {
            warn!("Failed to save release cache: {error}");
        }

        Ok(releases)
    }

    pub async fn switch_version(&self, target: &str) -> String {
        let result = self.manager.switch_version(target).await;
        if let Ok(version) = &result {
            info!("Active Go is now {} ({})", version.version, version.path.display());
        }
        result_string(&result.map_err(AppError::from))
    }

    /// Install `version`, bounded by the configured install timeout.
    pub async fn install_version(&self, version: &str) -> String {
        let cancel = self
            .install_cancel
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .child_token();

        let (tx, mut rx) = mpsc::channel(self.settings.progress_channel_capacity.max(1));
        let events = self.events.clone();
        let forwarder = tokio::spawn(async move {
            while let Some(progress) = rx.recv().await {
                // no subscribers is fine
                let _ = events.send(AppEvent::DownloadProgress(progress));
            }
        });

        let result = run_with_timeout(
            Duration::from_secs(self.settings.install_timeout_secs),
            "Installation",
            &cancel,
            self.manager.install_version(version, tx, cancel.clone()),
            AppError::from,
        )
        .await;

        // every progress event goes out before the result
        if let Err(error) = forwarder.await {
            warn!("Progress forwarder stopped: {error}");
        }

        let outcome = result_string(&result);
        info!("Install of {version}: {outcome}");
        outcome
    }

    /// Cancel the running install, if any. Later installs are unaffected.
    pub fn cancel_install(&self) {
        let previous = std::mem::take(
            &mut *self
                .install_cancel
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );
        previous.cancel();
    }

    pub async fn uninstall_version(&self, version: &str) -> String {
        let result = self.manager.uninstall_version(version).await;
        if result.is_ok() {
            info!("Uninstalled Go {version}");
        }
        result_string(&result.map_err(AppError::from))
    }
}

fn system_scan(settings: &AppSettings) -> SystemScan {
    if settings.scan_system_installs {
        SystemScan::new().with_extra_paths(settings.extra_system_paths.clone())
    } else if settings.extra_system_paths.is_empty() {
        SystemScan::disabled()
    } else {
        SystemScan::only(settings.extra_system_paths.clone())
    }
}
