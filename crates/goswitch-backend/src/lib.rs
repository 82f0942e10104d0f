mod error;
mod progress;
mod traits;
mod types;

pub use error::{BackendError, ErrorKind, NetworkStage};
pub use progress::ProgressReporter;
pub use traits::{InstallStore, ReleaseSource, StoreLock, VersionManager};
pub use types::{
    DownloadProgress, DownloadState, GoVersion, InstalledVersion, ManagedInstall,
    ReleaseArtifact, ReleaseClassification, RemoteRelease, VersionParseError, classify,
    normalize_name,
};
