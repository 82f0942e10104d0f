use std::time::Duration;

use goswitch_backend::{BackendError, ReleaseArtifact, RemoteRelease, normalize_name};
use goswitch_platform::Target;
use log::{debug, info};
use serde::Deserialize;
use thiserror::Error;

use crate::retry::retry_with_delays;

pub const DEFAULT_DOWNLOAD_BASE: &str = "https://go.dev/dl/";
const CATALOG_QUERY: &str = "?mode=json&include=all";
const DEFAULT_CATALOG_TIMEOUT: Duration = Duration::from_secs(30);
const OPERATION: &str = "fetch release catalog";

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to fetch release catalog: {0}")]
    Request(#[source] reqwest::Error),
    #[error("release catalog request failed with HTTP {status}{body_snippet}")]
    HttpStatus {
        status: reqwest::StatusCode,
        body_snippet: String,
    },
    #[error("failed to parse release catalog: {0}")]
    Parse(#[source] serde_json::Error),
}

impl CatalogError {
    fn is_transient(&self) -> bool {
        match self {
            Self::Request(_) => true,
            Self::HttpStatus { status, .. } => status.is_server_error(),
            Self::Parse(_) => false,
        }
    }
}

impl From<CatalogError> for BackendError {
    fn from(error: CatalogError) -> Self {
        match &error {
            CatalogError::Parse(_) => BackendError::network_parse_from(OPERATION, error),
            _ => BackendError::network_request_from(OPERATION, error),
        }
    }
}

#[derive(Deserialize)]
struct RawRelease {
    version: String,
    #[serde(default)]
    files: Vec<RawFile>,
}

#[derive(Deserialize)]
struct RawFile {
    filename: String,
    #[serde(default)]
    os: String,
    #[serde(default)]
    arch: String,
    #[serde(default)]
    sha256: String,
    #[serde(default)]
    size: u64,
    #[serde(default)]
    kind: String,
}

/// Client for the upstream release index (`go.dev/dl`, or a mirror with the
/// same layout).
#[derive(Debug, Clone)]
pub struct CatalogClient {
    client: reqwest::Client,
    base_url: String,
    target: Option<Target>,
    retry_delays_secs: Vec<u64>,
    timeout: Duration,
}

impl CatalogClient {
    #[must_use]
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            base_url: DEFAULT_DOWNLOAD_BASE.to_string(),
            target: Target::current(),
            retry_delays_secs: vec![0],
            timeout: DEFAULT_CATALOG_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        self.base_url = base_url;
        self
    }

    #[must_use]
    pub fn with_target(mut self, target: Option<Target>) -> Self {
        self.target = target;
        self
    }

    /// Each entry is the delay before one attempt; `[0]` means a single try.
    #[must_use]
    pub fn with_retry_delays(mut self, retry_delays_secs: Vec<u64>) -> Self {
        self.retry_delays_secs = if retry_delays_secs.is_empty() {
            vec![0]
        } else {
            retry_delays_secs
        };
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    #[must_use]
    pub fn catalog_url(&self) -> String {
        format!("{}{CATALOG_QUERY}", self.base_url)
    }

    #[must_use]
    pub fn http(&self) -> &reqwest::Client {
        &self.client
    }

    /// Fetch and normalize the release index.
    ///
    /// # Errors
    /// Returns an error when every attempt fails to reach the index, the
    /// server answers with a non-success status, or the body is not a valid
    /// release index.
    pub async fn fetch_releases(&self) -> Result<Vec<RemoteRelease>, CatalogError> {
        let releases = retry_with_delays(
            OPERATION,
            &self.retry_delays_secs,
            CatalogError::is_transient,
            || self.fetch_once(),
        )
        .await?;
        info!("Fetched {} releases from {}", releases.len(), self.base_url);
        Ok(releases)
    }

    async fn fetch_once(&self) -> Result<Vec<RemoteRelease>, CatalogError> {
        let url = self.catalog_url();
        debug!("Requesting release catalog from {url}");

        let response = self
            .client
            .get(&url)
            .timeout(self.timeout)
            .header("User-Agent", "goswitch")
            .send()
            .await
            .map_err(CatalogError::Request)?;

        if !response.status().is_success() {
            let status = response.status();
            let body_snippet = response
                .text()
                .await
                .ok()
                .map(|body| response_snippet(&body, 160))
                .unwrap_or_default();
            return Err(CatalogError::HttpStatus {
                status,
                body_snippet,
            });
        }

        let body = response.text().await.map_err(CatalogError::Request)?;
        parse_catalog(&body, &self.base_url, self.target)
    }
}

/// Parse an upstream index document into releases, attaching the archive for
/// `target` when one is published.
///
/// # Errors
/// Returns an error when `body` is not a JSON array of releases.
pub fn parse_catalog(
    body: &str,
    base_url: &str,
    target: Option<Target>,
) -> Result<Vec<RemoteRelease>, CatalogError> {
    let raw: Vec<RawRelease> = serde_json::from_str(body).map_err(CatalogError::Parse)?;

    Ok(raw
        .into_iter()
        .filter(|entry| !normalize_name(&entry.version).is_empty())
        .map(|entry| {
            let artifact = target.and_then(|target| select_artifact(&entry.files, base_url, target));
            RemoteRelease::new(normalize_name(&entry.version), artifact)
        })
        .collect())
}

fn select_artifact(files: &[RawFile], base_url: &str, target: Target) -> Option<ReleaseArtifact> {
    let for_target = |file: &&RawFile| file.os == target.os && file.arch == target.arch;
    let preferred_ext = target.archive_kind().extension();

    files
        .iter()
        .filter(for_target)
        .filter(|file| file.kind == "archive")
        .find(|file| file.filename.ends_with(preferred_ext))
        .or_else(|| {
            files
                .iter()
                .filter(for_target)
                .find(|file| file.kind == "archive")
        })
        .map(|file| ReleaseArtifact {
            filename: file.filename.clone(),
            url: format!("{base_url}{}", file.filename),
            sha256: Some(file.sha256.to_ascii_lowercase()).filter(|hash| is_sha256_hex(hash)),
            size: Some(file.size).filter(|size| *size > 0),
        })
}

fn is_sha256_hex(value: &str) -> bool {
    value.len() == 64 && value.chars().all(|ch| ch.is_ascii_hexdigit())
}

fn response_snippet(body: &str, max_chars: usize) -> String {
    let snippet: String = body.chars().take(max_chars).collect();
    if snippet.is_empty() {
        String::new()
    } else {
        format!(": {snippet}")
    }
}
