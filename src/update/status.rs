//! Update status and its transition function.
//!
//! The pipeline only moves forward: check → download → extract → install →
//! awaiting relaunch. Every step has a failure state that ends the attempt;
//! the only way out of a failure is a new check.

use crate::error::{Result, SvgPadError};
use crate::progress::Progress;
use crate::update::manifest::ReleaseManifest;
use std::path::PathBuf;

/// Where the update pipeline currently stands.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum UpdateStatus {
    /// Nothing has happened yet, or a check was skipped.
    #[default]
    Idle,
    /// The user declined to continue.
    Cancelled,
    /// Fetching the remote manifest.
    Checking,
    /// The manifest fetch failed.
    CheckFailed(String),
    /// Remote manifest matches the bundled one.
    NoUpdateAvailable,
    /// Remote manifest differs from the bundled one.
    UpdateAvailable(ReleaseManifest),
    /// Fetching the archive.
    Downloading {
        /// Manifest being installed.
        manifest: ReleaseManifest,
        /// Bytes received.
        progress: Progress,
    },
    /// The archive download failed.
    DownloadFailed(String),
    /// Unpacking the downloaded archive.
    Extracting {
        /// Manifest being installed.
        manifest: ReleaseManifest,
        /// Downloaded archive.
        archive: PathBuf,
        /// Entries unpacked.
        progress: Progress,
    },
    /// Unpacking failed or the archive had no single bundle.
    ExtractFailed(String),
    /// A single bundle was found in the archive.
    ExtractComplete {
        /// Manifest being installed.
        manifest: ReleaseManifest,
        /// Extracted bundle.
        bundle: PathBuf,
    },
    /// Replacing the running bundle.
    Installing {
        /// Manifest being installed.
        manifest: ReleaseManifest,
        /// Extracted bundle being installed.
        bundle: PathBuf,
        /// Install steps completed.
        progress: Progress,
    },
    /// Every install strategy failed.
    InstallFailed(String),
    /// Installed; the process is about to quit and relaunch.
    AwaitingRelaunch(ReleaseManifest),
}

/// Something that happened to the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateEvent {
    /// A check was requested.
    CheckStarted,
    /// The check completed: `Some` carries a differing remote manifest.
    CheckFinished(Option<ReleaseManifest>),
    /// The check could not decide (no local reference manifest).
    CheckSkipped,
    /// The manifest fetch failed.
    CheckFailed(String),
    /// Download requested.
    DownloadStarted,
    /// More bytes arrived.
    DownloadProgress(Progress),
    /// The archive is on disk.
    DownloadFinished(PathBuf),
    /// The download failed.
    DownloadFailed(String),
    /// More archive entries were unpacked.
    ExtractProgress(Progress),
    /// The bundle was located.
    ExtractFinished(PathBuf),
    /// Extraction failed.
    ExtractFailed(String),
    /// Install requested.
    InstallStarted,
    /// An install step completed.
    InstallProgress(Progress),
    /// The new bundle is in place.
    InstallFinished,
    /// Installation failed.
    InstallFailed(String),
    /// The user declined to continue.
    Cancel,
}

impl UpdateEvent {
    /// Short event name for diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            Self::CheckStarted => "start check",
            Self::CheckFinished(_) => "finish check",
            Self::CheckSkipped => "skip check",
            Self::CheckFailed(_) => "fail check",
            Self::DownloadStarted => "start download",
            Self::DownloadProgress(_) => "report download progress",
            Self::DownloadFinished(_) => "finish download",
            Self::DownloadFailed(_) => "fail download",
            Self::ExtractProgress(_) => "report extract progress",
            Self::ExtractFinished(_) => "finish extract",
            Self::ExtractFailed(_) => "fail extract",
            Self::InstallStarted => "start install",
            Self::InstallProgress(_) => "report install progress",
            Self::InstallFinished => "finish install",
            Self::InstallFailed(_) => "fail install",
            Self::Cancel => "cancel",
        }
    }
}

impl UpdateStatus {
    /// Short status name for diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Cancelled => "cancelled",
            Self::Checking => "checking",
            Self::CheckFailed(_) => "check failed",
            Self::NoUpdateAvailable => "no update available",
            Self::UpdateAvailable(_) => "update available",
            Self::Downloading { .. } => "downloading",
            Self::DownloadFailed(_) => "download failed",
            Self::Extracting { .. } => "extracting",
            Self::ExtractFailed(_) => "extract failed",
            Self::ExtractComplete { .. } => "extract complete",
            Self::Installing { .. } => "installing",
            Self::InstallFailed(_) => "install failed",
            Self::AwaitingRelaunch(_) => "awaiting relaunch",
        }
    }

    /// A step is running and must finish before a new check.
    pub fn is_in_flight(&self) -> bool {
        matches!(
            self,
            Self::Checking
                | Self::Downloading { .. }
                | Self::Extracting { .. }
                | Self::Installing { .. }
                | Self::AwaitingRelaunch(_)
        )
    }

    /// The attempt ended in a failure state.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            Self::CheckFailed(_)
                | Self::DownloadFailed(_)
                | Self::ExtractFailed(_)
                | Self::InstallFailed(_)
        )
    }

    /// Manifest carried by the current state, if any.
    pub fn manifest(&self) -> Option<&ReleaseManifest> {
        match self {
            Self::UpdateAvailable(m) | Self::AwaitingRelaunch(m) => Some(m),
            Self::Downloading { manifest, .. }
            | Self::Extracting { manifest, .. }
            | Self::ExtractComplete { manifest, .. }
            | Self::Installing { manifest, .. } => Some(manifest),
            _ => None,
        }
    }

    /// Compute the state that follows `event`.
    ///
    /// # Errors
    ///
    /// Returns [`SvgPadError::InvalidTransition`] if `event` is not legal in
    /// the current state.
    pub fn apply(&self, event: UpdateEvent) -> Result<Self> {
        use UpdateEvent as E;

        let invalid = |event: &UpdateEvent| SvgPadError::InvalidTransition {
            status: self.name(),
            event: event.name(),
        };

        let next = match (self, event) {
            (s, E::CheckStarted) if !s.is_in_flight() => Self::Checking,
            (Self::Checking, E::CheckFinished(Some(manifest))) => Self::UpdateAvailable(manifest),
            (Self::Checking, E::CheckFinished(None)) => Self::NoUpdateAvailable,
            (Self::Checking, E::CheckSkipped) => Self::Idle,
            (Self::Checking, E::CheckFailed(e)) => Self::CheckFailed(e),

            (Self::UpdateAvailable(m), E::DownloadStarted) => Self::Downloading {
                manifest: m.clone(),
                progress: Progress::default(),
            },
            (Self::Downloading { manifest, .. }, E::DownloadProgress(progress)) => {
                Self::Downloading {
                    manifest: manifest.clone(),
                    progress,
                }
            }
            (Self::Downloading { manifest, .. }, E::DownloadFinished(archive)) => {
                Self::Extracting {
                    manifest: manifest.clone(),
                    archive,
                    progress: Progress::default(),
                }
            }
            (Self::Downloading { .. }, E::DownloadFailed(e)) => Self::DownloadFailed(e),

            (Self::Extracting { manifest, archive, .. }, E::ExtractProgress(progress)) => {
                Self::Extracting {
                    manifest: manifest.clone(),
                    archive: archive.clone(),
                    progress,
                }
            }
            (Self::Extracting { manifest, .. }, E::ExtractFinished(bundle)) => {
                Self::ExtractComplete {
                    manifest: manifest.clone(),
                    bundle,
                }
            }
            (Self::Extracting { .. }, E::ExtractFailed(e)) => Self::ExtractFailed(e),

            (Self::ExtractComplete { manifest, bundle }, E::InstallStarted) => Self::Installing {
                manifest: manifest.clone(),
                bundle: bundle.clone(),
                progress: Progress::default(),
            },
            (Self::Installing { manifest, bundle, .. }, E::InstallProgress(progress)) => {
                Self::Installing {
                    manifest: manifest.clone(),
                    bundle: bundle.clone(),
                    progress,
                }
            }
            (Self::Installing { manifest, .. }, E::InstallFinished) => {
                Self::AwaitingRelaunch(manifest.clone())
            }
            (Self::Installing { .. }, E::InstallFailed(e)) => Self::InstallFailed(e),

            (
                Self::Idle
                | Self::NoUpdateAvailable
                | Self::UpdateAvailable(_)
                | Self::ExtractComplete { .. },
                E::Cancel,
            ) => Self::Cancelled,

            (_, event) => return Err(invalid(&event)),
        };
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    fn manifest() -> ReleaseManifest {
        ReleaseManifest::new(b"2.0".to_vec())
    }

    fn drive(events: Vec<UpdateEvent>) -> Result<UpdateStatus> {
        events
            .into_iter()
            .try_fold(UpdateStatus::Idle, |status, event| status.apply(event))
    }

    #[test]
    fn happy_path_reaches_awaiting_relaunch() {
        let status = drive(vec![
            UpdateEvent::CheckStarted,
            UpdateEvent::CheckFinished(Some(manifest())),
            UpdateEvent::DownloadStarted,
            UpdateEvent::DownloadProgress(Progress::new(5, 10)),
            UpdateEvent::DownloadFinished(PathBuf::from("/tmp/u.zip")),
            UpdateEvent::ExtractProgress(Progress::new(1, 1)),
            UpdateEvent::ExtractFinished(PathBuf::from("/tmp/x/SVGPad.app")),
            UpdateEvent::InstallStarted,
            UpdateEvent::InstallProgress(Progress::new(1, 3)),
            UpdateEvent::InstallFinished,
        ])
        .unwrap();
        assert_eq!(status, UpdateStatus::AwaitingRelaunch(manifest()));
    }

    #[test]
    fn check_without_difference_is_no_update() {
        let status = drive(vec![
            UpdateEvent::CheckStarted,
            UpdateEvent::CheckFinished(None),
        ])
        .unwrap();
        assert_eq!(status, UpdateStatus::NoUpdateAvailable);
    }

    #[test]
    fn skipped_check_returns_to_idle() {
        let status = drive(vec![UpdateEvent::CheckStarted, UpdateEvent::CheckSkipped]).unwrap();
        assert_eq!(status, UpdateStatus::Idle);
    }

    #[test]
    fn extracting_carries_archive_path() {
        let status = drive(vec![
            UpdateEvent::CheckStarted,
            UpdateEvent::CheckFinished(Some(manifest())),
            UpdateEvent::DownloadStarted,
            UpdateEvent::DownloadFinished(PathBuf::from("/tmp/u.zip")),
            UpdateEvent::ExtractProgress(Progress::new(3, 7)),
        ])
        .unwrap();
        match status {
            UpdateStatus::Extracting {
                archive, progress, ..
            } => {
                assert_eq!(archive, PathBuf::from("/tmp/u.zip"));
                assert_eq!(progress, Progress::new(3, 7));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn failure_is_terminal_until_new_check() {
        let failed = drive(vec![
            UpdateEvent::CheckStarted,
            UpdateEvent::CheckFinished(Some(manifest())),
            UpdateEvent::DownloadStarted,
            UpdateEvent::DownloadFailed("timeout".into()),
        ])
        .unwrap();
        assert!(failed.is_failure());
        assert!(failed.apply(UpdateEvent::DownloadStarted).is_err());
        assert!(failed.apply(UpdateEvent::InstallStarted).is_err());
        assert_eq!(
            failed.apply(UpdateEvent::CheckStarted).unwrap(),
            UpdateStatus::Checking
        );
    }

    #[test]
    fn cannot_skip_steps() {
        let available = UpdateStatus::UpdateAvailable(manifest());
        let err = available.apply(UpdateEvent::InstallStarted).unwrap_err();
        assert!(matches!(
            err,
            SvgPadError::InvalidTransition {
                status: "update available",
                event: "start install"
            }
        ));
    }

    #[test]
    fn new_check_refused_while_in_flight() {
        let installing = UpdateStatus::Installing {
            manifest: manifest(),
            bundle: PathBuf::from("/tmp/x/SVGPad.app"),
            progress: Progress::default(),
        };
        assert!(installing.apply(UpdateEvent::CheckStarted).is_err());
        assert!(UpdateStatus::Checking.apply(UpdateEvent::CheckStarted).is_err());
    }

    #[test]
    fn cancel_only_between_steps() {
        assert_eq!(
            UpdateStatus::UpdateAvailable(manifest())
                .apply(UpdateEvent::Cancel)
                .unwrap(),
            UpdateStatus::Cancelled
        );
        assert!(UpdateStatus::Checking.apply(UpdateEvent::Cancel).is_err());
    }

    #[test]
    fn manifest_is_carried_through() {
        let status = UpdateStatus::ExtractComplete {
            manifest: manifest(),
            bundle: PathBuf::from("/b"),
        };
        assert_eq!(status.manifest(), Some(&manifest()));
        assert!(UpdateStatus::Idle.manifest().is_none());
    }
}
