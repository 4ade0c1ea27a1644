//! Progress reporting for download, extraction, and install.
//!
//! Callback-based so the pipeline stays independent of presentation
//! (CLI `indicatif` bar vs. UI bindings).

/// Units completed out of an optional total.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Progress {
    /// Units completed so far (bytes, archive entries, install steps).
    pub completed: u64,
    /// Total units, if known.
    pub total: Option<u64>,
}

impl Progress {
    /// Progress with a known total.
    pub fn new(completed: u64, total: u64) -> Self {
        Self {
            completed,
            total: Some(total),
        }
    }

    /// Progress without a known total.
    pub fn indeterminate(completed: u64) -> Self {
        Self {
            completed,
            total: None,
        }
    }

    /// Completed fraction in `[0, 1]`, or `None` when the total is unknown.
    pub fn fraction(&self) -> Option<f64> {
        match self.total {
            Some(0) => Some(1.0),
            Some(total) => Some((self.completed as f64 / total as f64).min(1.0)),
            None => None,
        }
    }
}

/// Progress events emitted by the update pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    /// Download started.
    DownloadStarted {
        /// Source URL.
        url: String,
        /// Content length, if the server sent one.
        total_bytes: Option<u64>,
    },

    /// Bytes received so far.
    DownloadProgress(Progress),

    /// Download finished.
    DownloadComplete {
        /// Bytes written to disk.
        bytes: u64,
    },

    /// Archive entries unpacked so far.
    ExtractProgress(Progress),

    /// Install steps completed so far.
    InstallProgress(Progress),
}

/// Callback type for receiving progress events.
pub type ProgressCallback = Box<dyn Fn(ProgressEvent) + Send + Sync>;
