//! SVGPad: a small SVG viewer/editor and its self-updater.
//!
//! The crate carries the document text model and the update workflow:
//! release check → archive download → bundle extraction → in-place install
//! → relaunch.
//!
//! # Architecture
//!
//! - **Document**: [`document::SvgDocument`], one mutable UTF-8 string
//! - **Update pipeline**: [`update::UpdateController`] drives
//!   [`update::VersionChecker`], [`update::UpdateDownloader`],
//!   [`update::ArchiveExtractor`], [`update::Installer`], and
//!   [`update::RelaunchCoordinator`] through [`update::UpdateStatus`]
//! - **Platform**: bookmarks, folder picker, and administrator shell behind
//!   traits in [`platform`]
//! - **Persistence**: [`config::AppConfig`] (TOML) and
//!   [`preferences::Preferences`] (JSON)

pub mod app_dirs;
pub mod config;
pub mod document;
pub mod error;
pub mod platform;
pub mod preferences;
pub mod progress;
pub mod update;

pub use config::AppConfig;
pub use document::SvgDocument;
pub use error::{EscalationFailure, InstallTier, Result, SvgPadError};
pub use preferences::Preferences;
pub use progress::{Progress, ProgressCallback, ProgressEvent};
