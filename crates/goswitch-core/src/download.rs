use std::io::Read;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use goswitch_backend::{
    BackendError, ProgressReporter, ReleaseArtifact, ReleaseSource, RemoteRelease,
};
use log::{debug, info};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;

use crate::catalog::CatalogClient;

const OPERATION: &str = "download release archive";

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("{context}: {source}")]
    Http {
        context: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("download of {url} failed with HTTP {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },
    #[error("{context} {}: {source}", .path.display())]
    Io {
        context: &'static str,
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("download cancelled")]
    Cancelled,
}

impl DownloadError {
    fn http(context: &'static str, source: reqwest::Error) -> Self {
        Self::Http { context, source }
    }

    fn io(context: &'static str, path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            context,
            path: path.to_path_buf(),
            source,
        }
    }

    fn into_backend(self, version: &str) -> BackendError {
        if let Self::Io { source, .. } = &self {
            return BackendError::IoError {
                kind: source.kind(),
                message: self.to_string(),
            };
        }
        match self {
            Self::Cancelled => BackendError::Cancelled {
                version: version.to_string(),
            },
            other => BackendError::network_request_from(OPERATION, other),
        }
    }
}

/// Build the shared HTTP client used for the catalog and for archives.
///
/// `read_timeout` bounds each read rather than the whole transfer, so large
/// archives on slow links still complete.
///
/// # Errors
/// Returns an error if the TLS backend cannot be initialised.
pub fn build_http_client(
    connect_timeout: Duration,
    read_timeout: Duration,
) -> Result<reqwest::Client, BackendError> {
    reqwest::Client::builder()
        .connect_timeout(connect_timeout)
        .read_timeout(read_timeout)
        .user_agent(concat!("goswitch/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|error| BackendError::network_request_from("build HTTP client", error))
}

/// `ReleaseSource` backed by the upstream download site.
#[derive(Debug, Clone)]
pub struct HttpReleaseSource {
    catalog: CatalogClient,
}

impl HttpReleaseSource {
    #[must_use]
    pub fn new(catalog: CatalogClient) -> Self {
        Self { catalog }
    }

    #[must_use]
    pub fn catalog(&self) -> &CatalogClient {
        &self.catalog
    }
}

#[async_trait]
impl ReleaseSource for HttpReleaseSource {
    async fn fetch_releases(&self) -> Result<Vec<RemoteRelease>, BackendError> {
        Ok(self.catalog.fetch_releases().await?)
    }

    async fn download_artifact(
        &self,
        artifact: &ReleaseArtifact,
        dest: &Path,
        progress: &mut ProgressReporter,
        cancel: &CancellationToken,
    ) -> Result<u64, BackendError> {
        let version = progress.version().to_string();
        download_file(self.catalog.http(), artifact, dest, progress, cancel)
            .await
            .map_err(|error| error.into_backend(&version))
    }
}

async fn download_file(
    client: &reqwest::Client,
    artifact: &ReleaseArtifact,
    dest: &Path,
    progress: &mut ProgressReporter,
    cancel: &CancellationToken,
) -> Result<u64, DownloadError> {
    info!("Downloading {}", artifact.url);

    let response = tokio::select! {
        biased;
        () = cancel.cancelled() => return Err(DownloadError::Cancelled),
        response = client.get(&artifact.url).send() => {
            response.map_err(|error| DownloadError::http("download request failed", error))?
        }
    };

    if !response.status().is_success() {
        return Err(DownloadError::Status {
            url: artifact.url.clone(),
            status: response.status(),
        });
    }

    let total = response
        .content_length()
        .filter(|len| *len > 0)
        .or(artifact.size);
    let mut downloaded: u64 = 0;

    let mut file = tokio::fs::File::create(dest)
        .await
        .map_err(|error| DownloadError::io("failed to create download file", dest, error))?;

    progress.start();
    let mut stream = response.bytes_stream();
    loop {
        let next = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(DownloadError::Cancelled),
            next = stream.next() => next,
        };
        let Some(chunk) = next else {
            break;
        };
        let chunk = chunk.map_err(|error| DownloadError::http("download stream error", error))?;
        file.write_all(&chunk)
            .await
            .map_err(|error| DownloadError::io("failed to write download data", dest, error))?;
        downloaded += chunk.len() as u64;
        progress.report_bytes(downloaded, total);
    }

    file.flush()
        .await
        .map_err(|error| DownloadError::io("failed to flush download file", dest, error))?;
    progress.finish();

    debug!(
        "Download complete: {downloaded} bytes ({} progress events dropped)",
        progress.dropped_events()
    );
    Ok(downloaded)
}

/// Hex-encoded SHA-256 of the file at `path`.
///
/// # Errors
/// Returns an error if the file cannot be read.
pub fn sha256_file(path: &Path) -> Result<String, BackendError> {
    let mut file = std::fs::File::open(path).map_err(|error| {
        BackendError::io_with_context(
            &format!("failed to open {} for checksum", path.display()),
            &error,
        )
    })?;
    let mut hasher = Sha256::new();
    let mut buffer = [0_u8; 8192];

    loop {
        let read = file.read(&mut buffer).map_err(|error| {
            BackendError::io_with_context(
                &format!("failed to read {} for checksum", path.display()),
                &error,
            )
        })?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

/// Check a downloaded archive against its published digest. Artifacts with no
/// published digest pass unchecked.
///
/// # Errors
/// Returns `IntegrityError` on mismatch, or an IO error if the file cannot be
/// read.
pub fn verify_sha256(artifact: &ReleaseArtifact, path: &Path) -> Result<(), BackendError> {
    let Some(expected) = artifact.sha256.as_deref() else {
        debug!("No checksum published for {}", artifact.filename);
        return Ok(());
    };

    let actual = sha256_file(path)?;
    if actual.eq_ignore_ascii_case(expected) {
        info!("Checksum verified for {}", artifact.filename);
        Ok(())
    } else {
        Err(BackendError::IntegrityError {
            artifact: artifact.filename.clone(),
            expected: expected.to_ascii_lowercase(),
            actual,
        })
    }
}
