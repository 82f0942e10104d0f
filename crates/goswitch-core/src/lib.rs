//! Network and archive plumbing shared by goswitch backends.
//!
//! - Release index fetching and normalization (`catalog`).
//! - Streaming archive downloads with progress, cancellation and SHA-256
//!   verification (`download`).
//! - Zip and tar.gz extraction with SDK root detection (`archive`).
//! - Small retry helper for flaky remote calls, and atomic file replacement.

pub mod archive;
pub mod catalog;
pub mod download;
mod fsutil;
mod retry;

pub use archive::{ExtractError, extract_archive, has_go_binary, toolchain_root};
pub use catalog::{CatalogClient, CatalogError, DEFAULT_DOWNLOAD_BASE, parse_catalog};
pub use download::{
    DownloadError, HttpReleaseSource, build_http_client, sha256_file, verify_sha256,
};
pub use fsutil::{unique_suffix, write_atomic};
pub use retry::retry_with_delays;
