use goswitch_backend::DownloadProgress;
use serde::Serialize;

/// Notifications published while operations run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum AppEvent {
    DownloadProgress(DownloadProgress),
}

impl AppEvent {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::DownloadProgress(_) => "download_progress",
        }
    }
}
