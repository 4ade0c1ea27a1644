//! Platform services the installer escalates through.
//!
//! - [`BookmarkManager`]: security-scoped bookmarks (Cocoa on macOS, a stub
//!   elsewhere) so a folder the user granted stays writable across launches.
//! - [`FolderAuthorizer`]: interactive folder picker used to obtain that grant.
//! - [`PrivilegedRunner`]: runs a shell command with administrator privileges.
//! - [`applications`]: the standard per-domain application directories.

use std::path::{Path, PathBuf};

pub mod applications;
mod dialog;
mod privileged;

#[cfg(target_os = "macos")]
mod macos;
#[cfg(not(target_os = "macos"))]
mod stub;
// Re-export stub for tests on all platforms.
#[cfg(test)]
#[cfg(target_os = "macos")]
#[path = "stub.rs"]
mod stub;

pub use dialog::DialogFolderAuthorizer;
pub use privileged::{AppleScriptRunner, applescript_string};

/// A bookmark resolved back to a location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedBookmark {
    /// Folder the bookmark points at.
    pub path: PathBuf,
    /// The bookmark still resolves but should be recreated.
    pub is_stale: bool,
}

/// Manages security-scoped bookmarks for persistent folder access under App Sandbox.
///
/// On macOS, folders the user selects in a picker are only accessible for the
/// current session. Persisting access across restarts requires creating a
/// security-scoped bookmark and resolving it on the next launch.
pub trait BookmarkManager: Send + Sync {
    /// Create a security-scoped bookmark for `folder`.
    fn create_bookmark(&self, folder: &Path) -> anyhow::Result<Vec<u8>>;

    /// Resolve previously created bookmark data.
    fn resolve_bookmark(&self, data: &[u8]) -> anyhow::Result<ResolvedBookmark>;

    /// Begin accessing a security-scoped resource.
    ///
    /// Each successful call must be balanced by
    /// [`stop_accessing`](BookmarkManager::stop_accessing).
    fn start_accessing(&self, folder: &Path) -> anyhow::Result<()>;

    /// Stop accessing a security-scoped resource.
    fn stop_accessing(&self, folder: &Path);
}

/// Create the platform-appropriate bookmark manager.
pub fn create_bookmark_manager() -> Box<dyn BookmarkManager> {
    #[cfg(target_os = "macos")]
    {
        Box::new(macos::MacOsBookmarkManager::new())
    }
    #[cfg(not(target_os = "macos"))]
    {
        Box::new(stub::StubBookmarkManager)
    }
}

/// Holds security-scoped access to a folder until dropped.
pub struct ScopedAccess<'a> {
    manager: &'a dyn BookmarkManager,
    folder: PathBuf,
}

impl<'a> ScopedAccess<'a> {
    /// Start accessing `folder`.
    ///
    /// # Errors
    ///
    /// Returns an error if the platform refuses access.
    pub fn start(manager: &'a dyn BookmarkManager, folder: &Path) -> anyhow::Result<Self> {
        manager.start_accessing(folder)?;
        Ok(Self {
            manager,
            folder: folder.to_owned(),
        })
    }

    /// The folder being accessed.
    pub fn folder(&self) -> &Path {
        &self.folder
    }
}

impl Drop for ScopedAccess<'_> {
    fn drop(&mut self) {
        self.manager.stop_accessing(&self.folder);
    }
}

/// Asks the user to grant read/write access to a folder.
pub trait FolderAuthorizer: Send + Sync {
    /// Show a picker scoped to `folder`.
    ///
    /// `attempt` starts at 0 and increases each time the previous selection
    /// was the wrong folder. Returns `Ok(None)` if the user cancels.
    fn request_folder(&self, folder: &Path, attempt: u32) -> anyhow::Result<Option<PathBuf>>;
}

/// Runs a shell command line with elevated privileges.
pub trait PrivilegedRunner: Send + Sync {
    /// Run `command` through `/bin/sh` as an administrator, blocking until it
    /// exits.
    fn run_privileged(&self, command: &str) -> anyhow::Result<()>;
}
