//! No-op bookmark manager for non-macOS platforms.

use std::path::Path;

use super::{BookmarkManager, ResolvedBookmark};

/// Stub bookmark manager.
///
/// Folder access is not sandboxed on these platforms, so bookmarks are never
/// created (callers fall back to prompting) and access scoping is a no-op.
pub struct StubBookmarkManager;

impl BookmarkManager for StubBookmarkManager {
    fn create_bookmark(&self, _folder: &Path) -> anyhow::Result<Vec<u8>> {
        anyhow::bail!("security-scoped bookmarks are not supported on this platform")
    }

    fn resolve_bookmark(&self, _data: &[u8]) -> anyhow::Result<ResolvedBookmark> {
        anyhow::bail!("security-scoped bookmarks are not supported on this platform")
    }

    fn start_accessing(&self, _folder: &Path) -> anyhow::Result<()> {
        Ok(())
    }

    fn stop_accessing(&self, _folder: &Path) {}
}
