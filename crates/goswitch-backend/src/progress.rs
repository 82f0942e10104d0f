use tokio::sync::mpsc;

use crate::types::DownloadProgress;

type Observer = Box<dyn Fn(u8) + Send + Sync>;

/// Turns byte counts into whole-percent `DownloadProgress` events.
///
/// Events are only emitted when the percentage grows, and are pushed with
/// `try_send`: when the receiver is full or gone the event is dropped and the
/// transfer carries on.
pub struct ProgressReporter {
    version: String,
    sender: mpsc::Sender<DownloadProgress>,
    last: Option<u8>,
    dropped: u64,
    observer: Option<Observer>,
}

impl ProgressReporter {
    #[must_use]
    pub fn new(version: impl Into<String>, sender: mpsc::Sender<DownloadProgress>) -> Self {
        Self {
            version: version.into(),
            sender,
            last: None,
            dropped: 0,
            observer: None,
        }
    }

    /// Called with every accepted percentage, whether or not the event made
    /// it through the channel.
    #[must_use]
    pub fn with_observer(mut self, observer: impl Fn(u8) + Send + Sync + 'static) -> Self {
        self.observer = Some(Box::new(observer));
        self
    }

    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    #[must_use]
    pub fn last_reported(&self) -> Option<u8> {
        self.last
    }

    #[must_use]
    pub fn dropped_events(&self) -> u64 {
        self.dropped
    }

    /// Report transferred bytes. Without a known total nothing is emitted.
    pub fn report_bytes(&mut self, downloaded: u64, total: Option<u64>) {
        let Some(total) = total.filter(|t| *t > 0) else {
            return;
        };
        let percent = (u128::from(downloaded.min(total)) * 100 / u128::from(total)) as u8;
        self.report_percent(percent);
    }

    pub fn report_percent(&mut self, percent: u8) {
        let percent = percent.min(100);
        if self.last.is_some_and(|last| percent <= last) {
            return;
        }
        self.last = Some(percent);

        if let Some(observer) = &self.observer {
            observer(percent);
        }

        let event = DownloadProgress {
            version: self.version.clone(),
            progress: percent,
        };
        if self.sender.try_send(event).is_err() {
            self.dropped += 1;
        }
    }

    pub fn start(&mut self) {
        self.report_percent(0);
    }

    pub fn finish(&mut self) {
        self.report_percent(100);
    }
}

impl std::fmt::Debug for ProgressReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressReporter")
            .field("version", &self.version)
            .field("last", &self.last)
            .field("dropped", &self.dropped)
            .finish_non_exhaustive()
    }
}
