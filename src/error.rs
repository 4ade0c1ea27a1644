//! Error types for svgpad.

use std::fmt;
use std::path::PathBuf;

/// Install strategy that produced an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallTier {
    /// Plain `mv`/`cp` as the current user.
    Unprivileged,
    /// Shell command run with administrator privileges.
    Privileged,
    /// Move inside a user-granted, security-scoped folder.
    ScopedFolder,
}

impl fmt::Display for InstallTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unprivileged => write!(f, "unprivileged move"),
            Self::Privileged => write!(f, "privileged move"),
            Self::ScopedFolder => write!(f, "scoped folder move"),
        }
    }
}

/// Top-level error type for the document service and the self-updater.
#[derive(Debug, thiserror::Error)]
pub enum SvgPadError {
    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// Document load/save error.
    #[error("document error: {0}")]
    Document(String),

    /// Persisted preferences could not be read or written.
    #[error("preferences error: {0}")]
    Preferences(String),

    /// Manifest fetch failed (network or HTTP status).
    #[error("update check failed: {0}")]
    Check(String),

    /// Artifact download failed.
    #[error("download failed: {0}")]
    Download(String),

    /// The archive could not be read or unpacked.
    #[error("archive error: {0}")]
    Archive(String),

    /// No bundle at the top level of the extracted archive.
    #[error("no .{extension} bundle found in {}", dir.display())]
    BundleNotFound {
        /// Scratch directory that was searched.
        dir: PathBuf,
        /// Bundle extension searched for.
        extension: String,
    },

    /// More than one bundle at the top level of the extracted archive.
    #[error("ambiguous update: {} bundles found in {}", candidates.len(), dir.display())]
    AmbiguousBundle {
        /// Scratch directory that was searched.
        dir: PathBuf,
        /// Every matching entry.
        candidates: Vec<PathBuf>,
    },

    /// Source and destination bundle names differ.
    #[error("bundle name mismatch: update is {source_name:?} but installed app is {destination_name:?}")]
    NameMismatch {
        /// Final path component of the extracted bundle.
        source_name: String,
        /// Final path component of the install destination.
        destination_name: String,
    },

    /// One install tier failed.
    #[error("{tier} failed: {message}")]
    Permission {
        /// Tier that failed.
        tier: InstallTier,
        /// What went wrong.
        message: String,
    },

    /// The user dismissed an authorization prompt.
    #[error("cancelled by user")]
    Cancelled,

    /// A cached folder authorization no longer resolves.
    #[error("stale authorization for {}", .0.display())]
    StaleAuthorization(PathBuf),

    /// Every install tier failed.
    #[error(transparent)]
    Escalation(#[from] EscalationFailure),

    /// The relaunch helper could not be spawned.
    #[error("relaunch error: {0}")]
    Relaunch(String),

    /// The requested status transition is not legal from the current state.
    #[error("cannot {event} while {status}")]
    InvalidTransition {
        /// Current status name.
        status: &'static str,
        /// Rejected event name.
        event: &'static str,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors collected from a full three-tier install escalation.
///
/// Displays the last tier's error, which is also its [`source`](std::error::Error::source).
/// The earlier errors stay reachable through [`errors`](Self::errors).
#[derive(Debug)]
pub struct EscalationFailure {
    errors: Vec<SvgPadError>,
}

impl EscalationFailure {
    /// Wrap the per-tier errors, in the order the tiers ran.
    pub fn new(errors: Vec<SvgPadError>) -> Self {
        Self { errors }
    }

    /// Every tier error in execution order.
    pub fn errors(&self) -> &[SvgPadError] {
        &self.errors
    }

    /// The error from the last tier attempted.
    pub fn last(&self) -> Option<&SvgPadError> {
        self.errors.last()
    }
}

impl fmt::Display for EscalationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.errors.last() {
            Some(last) => {
                write!(f, "install failed: {last}")?;
                let earlier = self.errors.len() - 1;
                if earlier > 0 {
                    write!(f, " (after {earlier} earlier failure(s))")?;
                }
                Ok(())
            }
            None => write!(f, "install failed"),
        }
    }
}

impl std::error::Error for EscalationFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.errors
            .last()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, SvgPadError>;
