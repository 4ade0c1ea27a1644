//! Self-update pipeline for SVGPad.
//!
//! Compares the published release notes with the bundled copy, downloads the
//! release archive, unpacks the app bundle, replaces the running bundle with
//! escalating privileges, and relaunches.

pub mod checker;
pub mod controller;
pub mod downloader;
pub mod extractor;
pub mod installer;
pub mod manifest;
pub mod relaunch;
pub mod shell;
pub mod status;

pub use checker::{CheckOutcome, VersionChecker};
pub use controller::{
    ErrorHook, ProcessTerminator, Relauncher, StatusObserver, Terminator, UpdateContext,
    UpdateController,
};
pub use downloader::UpdateDownloader;
pub use extractor::ArchiveExtractor;
pub use installer::{
    BundleOps, InstallOptions, InstallServices, InstallTarget, Installer, ShellBundleOps,
};
pub use manifest::ReleaseManifest;
pub use relaunch::RelaunchCoordinator;
pub use status::{UpdateEvent, UpdateStatus};
