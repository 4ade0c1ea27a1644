//! Replaces the running application bundle with an extracted update.
//!
//! The running process cannot count on write access to its own install
//! location, so the replacement escalates through three strategies, each
//! tried only when the previous one failed:
//!
//! 1. **Unprivileged move**: move the old bundle aside to `Name (PID).app`,
//!    move (or copy) the new bundle in, trash the old one.
//! 2. **Privileged move**: the same steps as one `&&`-chained shell command
//!    run with administrator privileges.
//! 3. **Scoped folder move**: obtain a user grant for the parent folder
//!    (cached bookmark or folder picker) and run the whole escalation again
//!    inside that grant.
//!
//! Moving the old bundle aside and trashing it are cleanup: their failures
//! are logged and ignored. Placing the new bundle is the primary step and
//! drives escalation. Nothing is rolled back: if the old bundle was moved
//! aside and every placement failed, it stays at its `Name (PID).app` sibling.

use crate::config::InstallConfig;
use crate::error::{EscalationFailure, InstallTier, Result, SvgPadError};
use crate::platform::applications::{self, ApplicationDir};
use crate::platform::{
    AppleScriptRunner, BookmarkManager, DialogFolderAuthorizer, FolderAuthorizer,
    PrivilegedRunner, ScopedAccess,
};
use crate::preferences::{Preferences, bookmark_key};
use crate::progress::{Progress, ProgressCallback, ProgressEvent};
use crate::update::shell;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};

/// Path fragments of locations the app must not update in place: Gatekeeper
/// translocation mounts and developer build products.
const TRANSIENT_MARKERS: &[&str] = &[
    "/AppTranslocation/",
    "/DerivedData/",
    "/Build/Products/",
    "/target/debug/",
    "/target/release/",
];

const TIER_COUNT: u64 = 3;

/// Source and destination of one install attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallTarget {
    /// Freshly extracted bundle.
    pub source: PathBuf,
    /// Where the bundle must end up.
    pub destination: PathBuf,
}

impl InstallTarget {
    /// Pair an extracted bundle with its install destination.
    pub fn new(source: impl Into<PathBuf>, destination: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            destination: destination.into(),
        }
    }

    /// Check bundle names and move a transient destination to the preferred
    /// application directory among `candidates`.
    ///
    /// # Errors
    ///
    /// Returns [`SvgPadError::NameMismatch`] if the final path components differ.
    pub fn resolve(self, candidates: &[ApplicationDir]) -> Result<Self> {
        check_names(&self.source, &self.destination)?;

        if !is_transient_location(&self.destination) {
            return Ok(self);
        }

        let Some(name) = self.destination.file_name() else {
            return Ok(self);
        };
        match applications::preferred_install_dir(candidates) {
            Some(dir) => {
                let destination = dir.join(name);
                tracing::info!(
                    "running from {}; installing to {} instead",
                    self.destination.display(),
                    destination.display()
                );
                Ok(Self {
                    source: self.source,
                    destination,
                })
            }
            None => {
                tracing::warn!(
                    "running from transient location {} and no install directory is available",
                    self.destination.display()
                );
                Ok(self)
            }
        }
    }
}

/// Whether `path` is a translocation mount or a build output directory.
pub fn is_transient_location(path: &Path) -> bool {
    let text = path.to_string_lossy();
    TRANSIENT_MARKERS.iter().any(|m| text.contains(m))
}

/// The bundle containing `exe`, found by walking up to the first
/// `.<extension>` directory.
pub fn locate_running_bundle(exe: &Path, extension: &str) -> Option<PathBuf> {
    exe.ancestors()
        .skip(1)
        .find(|p| p.extension().is_some_and(|e| e == extension))
        .map(Path::to_path_buf)
}

/// Sibling path the old bundle is moved to: `Name (PID).ext`.
pub fn aside_path(destination: &Path, pid: u32) -> PathBuf {
    let stem = destination
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match destination.extension() {
        Some(ext) => format!("{stem} ({pid}).{}", ext.to_string_lossy()),
        None => format!("{stem} ({pid})"),
    };
    destination.with_file_name(name)
}

fn check_names(source: &Path, destination: &Path) -> Result<()> {
    let source_name = source.file_name();
    let destination_name = destination.file_name();
    if source_name.is_some() && source_name == destination_name {
        Ok(())
    } else {
        Err(SvgPadError::NameMismatch {
            source_name: display_name(source_name),
            destination_name: display_name(destination_name),
        })
    }
}

fn display_name(name: Option<&OsStr>) -> String {
    name.map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Whether `source` can be moved rather than copied: both it and its parent
/// must be writable by this process.
pub fn is_writable_in_place(source: &Path) -> bool {
    let parent_ok = source.parent().is_none_or(is_writable);
    parent_ok && is_writable(source)
}

#[cfg(unix)]
fn is_writable(path: &Path) -> bool {
    use std::os::unix::ffi::OsStrExt;
    let Ok(c_path) = std::ffi::CString::new(path.as_os_str().as_bytes()) else {
        return false;
    };
    // SAFETY: `c_path` is a valid NUL-terminated string for the duration of the call.
    unsafe { libc::access(c_path.as_ptr(), libc::W_OK) == 0 }
}

#[cfg(not(unix))]
fn is_writable(path: &Path) -> bool {
    std::fs::metadata(path)
        .map(|m| !m.permissions().readonly())
        .unwrap_or(false)
}

/// Trash destination for `path` inside `trash_dir`, avoiding collisions.
fn trash_destination(path: &Path, trash_dir: &Path) -> PathBuf {
    let name = path.file_name().unwrap_or_else(|| OsStr::new("bundle"));
    let candidate = trash_dir.join(name);
    if candidate.exists() {
        let stamp = chrono::Local::now().format("%H.%M.%S");
        trash_dir.join(format!("{} {stamp}", name.to_string_lossy()))
    } else {
        candidate
    }
}

/// The single shell command the privileged tier runs.
///
/// Steps are joined with `&&`: move the old bundle aside (if there is one),
/// move or copy the new bundle in, then trash the old bundle.
pub fn privileged_command(
    source: &Path,
    destination: &Path,
    aside: Option<&Path>,
    copy: bool,
    trash_dir: Option<&Path>,
) -> String {
    let mut steps = Vec::with_capacity(3);
    if let Some(aside) = aside {
        steps.push(format!(
            "mv -f {} {}",
            shell::quote(destination),
            shell::quote(aside)
        ));
    }
    steps.push(if copy {
        format!("cp -pR {} {}", shell::quote(source), shell::quote(destination))
    } else {
        format!("mv -f {} {}", shell::quote(source), shell::quote(destination))
    });
    if let (Some(aside), Some(trash)) = (aside, trash_dir) {
        steps.push(format!(
            "mv -f {} {}",
            shell::quote(aside),
            shell::quote(&trash_destination(aside, trash))
        ));
    }
    steps.join(" && ")
}

/// File operations used by the unprivileged tier.
pub trait BundleOps: Send + Sync {
    /// Rename the installed bundle to its aside path. Cleanup step.
    fn move_aside(&self, destination: &Path, aside: &Path) -> anyhow::Result<()>;

    /// Put `source` at `destination`, copying with attributes when `copy`
    /// is set and moving otherwise. Primary step.
    fn place(&self, source: &Path, destination: &Path, copy: bool) -> anyhow::Result<()>;

    /// Move `path` into `trash_dir`. Cleanup step.
    fn trash(&self, path: &Path, trash_dir: &Path) -> anyhow::Result<()>;
}

/// [`BundleOps`] backed by `rename(2)`, `mv`, and `cp`.
#[derive(Debug, Default)]
pub struct ShellBundleOps;

impl BundleOps for ShellBundleOps {
    fn move_aside(&self, destination: &Path, aside: &Path) -> anyhow::Result<()> {
        std::fs::rename(destination, aside).map_err(|e| {
            anyhow::anyhow!(
                "cannot rename {} to {}: {e}",
                destination.display(),
                aside.display()
            )
        })
    }

    fn place(&self, source: &Path, destination: &Path, copy: bool) -> anyhow::Result<()> {
        // `mv`/`cp` would nest the bundle inside an existing directory.
        if destination.symlink_metadata().is_ok() {
            anyhow::bail!("{} is still occupied", destination.display());
        }
        if copy {
            shell::run("cp", &[OsStr::new("-pR"), source.as_os_str(), destination.as_os_str()])
        } else {
            shell::run("mv", &[source.as_os_str(), destination.as_os_str()])
        }
    }

    fn trash(&self, path: &Path, trash_dir: &Path) -> anyhow::Result<()> {
        let target = trash_destination(path, trash_dir);
        shell::run("mv", &[path.as_os_str(), target.as_os_str()])
    }
}

/// Platform services the installer escalates through.
pub struct InstallServices {
    /// Unprivileged file operations.
    pub ops: Box<dyn BundleOps>,
    /// Administrator shell.
    pub privileged: Box<dyn PrivilegedRunner>,
    /// Folder picker.
    pub authorizer: Box<dyn FolderAuthorizer>,
    /// Security-scoped bookmarks.
    pub bookmarks: Box<dyn BookmarkManager>,
}

impl InstallServices {
    /// The real services for this platform.
    pub fn platform(app_name: &str) -> Self {
        Self {
            ops: Box::new(ShellBundleOps),
            privileged: Box::new(AppleScriptRunner),
            authorizer: Box::new(DialogFolderAuthorizer::new(app_name)),
            bookmarks: crate::platform::create_bookmark_manager(),
        }
    }
}

/// Per-attempt installer settings.
#[derive(Debug, Clone)]
pub struct InstallOptions {
    /// PID used in the aside name.
    pub pid: u32,
    /// Where replaced bundles go; `None` leaves them next to the new one.
    pub trash_dir: Option<PathBuf>,
    /// Folder picker attempts before a wrong selection is final.
    pub folder_prompt_attempts: u32,
}

impl InstallOptions {
    /// Options for the current process from config.
    pub fn from_config(config: &InstallConfig) -> Self {
        Self {
            pid: std::process::id(),
            trash_dir: config
                .trash_dir
                .clone()
                .or_else(crate::app_dirs::trash_dir),
            folder_prompt_attempts: config.folder_prompt_attempts,
        }
    }
}

/// Runs the three-tier replacement for one install attempt.
pub struct Installer<'a> {
    services: &'a InstallServices,
    preferences: &'a mut Preferences,
    options: InstallOptions,
    progress: Option<&'a ProgressCallback>,
}

impl<'a> Installer<'a> {
    /// Create an installer over `services`, caching folder grants in `preferences`.
    pub fn new(
        services: &'a InstallServices,
        preferences: &'a mut Preferences,
        options: InstallOptions,
    ) -> Self {
        Self {
            services,
            preferences,
            options,
            progress: None,
        }
    }

    /// Report tier progress to `callback`.
    pub fn with_progress(mut self, callback: &'a ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    /// Replace `target.destination` with `target.source`.
    ///
    /// Returns the path the bundle was installed at, which differs from the
    /// requested destination only in form when a folder grant re-rooted it.
    ///
    /// # Errors
    ///
    /// Returns [`SvgPadError::NameMismatch`] before touching anything if the
    /// bundle names differ, or [`SvgPadError::Escalation`] with every tier's
    /// error when all three fail.
    pub fn install(&mut self, target: &InstallTarget) -> Result<PathBuf> {
        check_names(&target.source, &target.destination)?;

        if let Err(e) = shell::strip_quarantine(&target.source) {
            tracing::warn!("could not clear quarantine on {}: {e}", target.source.display());
        }

        tracing::info!(
            "installing {} to {}",
            target.source.display(),
            target.destination.display()
        );
        self.escalate(&target.source, &target.destination, 0)
    }

    fn escalate(&mut self, source: &Path, destination: &Path, depth: u32) -> Result<PathBuf> {
        let mut errors = Vec::with_capacity(TIER_COUNT as usize);

        self.report(0);
        match self.unprivileged_move(source, destination) {
            Ok(()) => return Ok(destination.to_owned()),
            Err(e) => {
                tracing::warn!("{e}");
                errors.push(e);
            }
        }

        self.report(1);
        match self.privileged_move(source, destination) {
            Ok(()) => return Ok(destination.to_owned()),
            Err(e) => {
                tracing::warn!("{e}");
                errors.push(e);
            }
        }

        self.report(2);
        let scoped = if depth == 0 {
            self.scoped_folder_move(source, destination, depth)
        } else {
            Err(SvgPadError::Permission {
                tier: InstallTier::ScopedFolder,
                message: "already inside a granted folder".to_owned(),
            })
        };
        match scoped {
            Ok(installed) => Ok(installed),
            Err(e) => {
                tracing::warn!("{e}");
                errors.push(e);
                Err(EscalationFailure::new(errors).into())
            }
        }
    }

    fn report(&self, tiers_done: u64) {
        if let Some(cb) = self.progress {
            cb(ProgressEvent::InstallProgress(Progress::new(tiers_done, TIER_COUNT)));
        }
    }

    fn unprivileged_move(&self, source: &Path, destination: &Path) -> Result<()> {
        let ops = self.services.ops.as_ref();

        let aside = if destination.symlink_metadata().is_ok() {
            let aside = aside_path(destination, self.options.pid);
            match ops.move_aside(destination, &aside) {
                Ok(()) => Some(aside),
                Err(e) => {
                    tracing::warn!("could not move old bundle aside: {e}");
                    None
                }
            }
        } else {
            None
        };

        let copy = !is_writable_in_place(source);
        ops.place(source, destination, copy)
            .map_err(|e| SvgPadError::Permission {
                tier: InstallTier::Unprivileged,
                message: e.to_string(),
            })?;

        if let Some(aside) = aside {
            self.trash_old(&aside);
        }
        Ok(())
    }

    fn trash_old(&self, aside: &Path) {
        let Some(trash_dir) = &self.options.trash_dir else {
            tracing::info!("no trash folder; leaving {}", aside.display());
            return;
        };
        if let Err(e) = self.services.ops.trash(aside, trash_dir) {
            tracing::warn!("could not trash {}: {e}", aside.display());
        }
    }

    fn privileged_move(&self, source: &Path, destination: &Path) -> Result<()> {
        let aside = destination
            .symlink_metadata()
            .is_ok()
            .then(|| aside_path(destination, self.options.pid));
        let command = privileged_command(
            source,
            destination,
            aside.as_deref(),
            !is_writable_in_place(source),
            self.options.trash_dir.as_deref(),
        );

        self.services
            .privileged
            .run_privileged(&command)
            .map_err(|e| SvgPadError::Permission {
                tier: InstallTier::Privileged,
                message: e.to_string(),
            })
    }

    fn scoped_folder_move(&mut self, source: &Path, destination: &Path, depth: u32) -> Result<PathBuf> {
        let (Some(folder), Some(name)) = (destination.parent(), destination.file_name()) else {
            return Err(SvgPadError::Permission {
                tier: InstallTier::ScopedFolder,
                message: format!("{} has no parent folder", destination.display()),
            });
        };

        let granted = self.authorize_folder(folder)?;
        let services = self.services;
        let access = ScopedAccess::start(services.bookmarks.as_ref(), &granted).map_err(|e| {
            SvgPadError::Permission {
                tier: InstallTier::ScopedFolder,
                message: e.to_string(),
            }
        })?;

        let scoped_destination = access.folder().join(name);
        tracing::info!("retrying inside granted folder {}", access.folder().display());
        self.escalate(source, &scoped_destination, depth + 1)
    }

    /// Access to `folder` from a cached bookmark, or from the folder picker.
    fn authorize_folder(&mut self, folder: &Path) -> Result<PathBuf> {
        if let Some(granted) = self.cached_grant(folder) {
            return Ok(granted);
        }

        let services = self.services;
        let attempts = self.options.folder_prompt_attempts.max(1);
        for attempt in 0..attempts {
            let selected = services
                .authorizer
                .request_folder(folder, attempt)
                .map_err(|e| SvgPadError::Permission {
                    tier: InstallTier::ScopedFolder,
                    message: e.to_string(),
                })?;

            let Some(selected) = selected else {
                return Err(SvgPadError::Cancelled);
            };
            if same_folder(&selected, folder) {
                self.remember_grant(&selected);
                return Ok(selected);
            }
            tracing::warn!(
                "selected {} but access to {} is required",
                selected.display(),
                folder.display()
            );
        }

        Err(SvgPadError::Permission {
            tier: InstallTier::ScopedFolder,
            message: format!("access to {} was not granted", folder.display()),
        })
    }

    fn cached_grant(&mut self, folder: &Path) -> Option<PathBuf> {
        let data = self.preferences.bookmark(folder)?;
        match self.services.bookmarks.resolve_bookmark(&data) {
            Ok(resolved) if !resolved.is_stale && same_folder(&resolved.path, folder) => {
                tracing::debug!("reusing bookmark for {}", folder.display());
                return Some(resolved.path);
            }
            Ok(_) => {
                tracing::info!("{}", SvgPadError::StaleAuthorization(folder.to_owned()));
            }
            Err(e) => {
                tracing::warn!("cannot resolve bookmark for {}: {e}", folder.display());
            }
        }
        if let Err(e) = self.preferences.remove_bookmark(folder) {
            tracing::warn!("cannot drop stale bookmark: {e}");
        }
        None
    }

    fn remember_grant(&mut self, folder: &Path) {
        let data = match self.services.bookmarks.create_bookmark(folder) {
            Ok(data) => data,
            Err(e) => {
                tracing::debug!("not caching access to {}: {e}", folder.display());
                return;
            }
        };
        if let Err(e) = self.preferences.set_bookmark(folder, &data) {
            tracing::warn!("cannot save bookmark for {}: {e}", folder.display());
        }
    }
}

/// Folder identity by absolute URL.
fn same_folder(a: &Path, b: &Path) -> bool {
    match (bookmark_key(a), bookmark_key(b)) {
        (Some(a), Some(b)) => a == b,
        _ => a == b,
    }
}
