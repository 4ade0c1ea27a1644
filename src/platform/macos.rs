//! macOS security-scoped bookmark implementation.
//!
//! Uses Cocoa APIs (via `objc2-foundation`) to create, resolve, and scope
//! access to folder bookmarks.

use std::path::{Path, PathBuf};

use objc2::rc::Retained;
use objc2_foundation::{NSString, NSURL};

use super::{BookmarkManager, ResolvedBookmark};

/// macOS bookmark manager using NSURL bookmark APIs.
pub struct MacOsBookmarkManager;

impl MacOsBookmarkManager {
    /// Create a new macOS bookmark manager.
    pub fn new() -> Self {
        Self
    }
}

impl BookmarkManager for MacOsBookmarkManager {
    fn create_bookmark(&self, folder: &Path) -> anyhow::Result<Vec<u8>> {
        use objc2_foundation::NSURLBookmarkCreationOptions;

        let url = folder_url(folder)?;
        let data = url
            .bookmarkDataWithOptions_includingResourceValuesForKeys_relativeToURL_error(
                NSURLBookmarkCreationOptions::WithSecurityScope,
                None,
                None,
            )
            .map_err(|e| anyhow::anyhow!("failed to create bookmark for {}: {e}", folder.display()))?;

        Ok(data.to_vec())
    }

    fn resolve_bookmark(&self, data: &[u8]) -> anyhow::Result<ResolvedBookmark> {
        use objc2::runtime::Bool;
        use objc2_foundation::{NSData, NSURLBookmarkResolutionOptions};

        let ns_data = NSData::with_bytes(data);
        let mut is_stale = Bool::new(false);
        // SAFETY: `is_stale` outlives the call and is a valid BOOL out-pointer.
        let url = unsafe {
            NSURL::URLByResolvingBookmarkData_options_relativeToURL_bookmarkDataIsStale_error(
                &ns_data,
                NSURLBookmarkResolutionOptions::WithSecurityScope,
                None,
                &mut is_stale as *mut Bool,
            )
        }
        .map_err(|e| anyhow::anyhow!("failed to resolve bookmark: {e}"))?;

        let path = url
            .path()
            .ok_or_else(|| anyhow::anyhow!("resolved bookmark URL has no path"))?;

        Ok(ResolvedBookmark {
            path: PathBuf::from(path.to_string()),
            is_stale: is_stale.as_bool(),
        })
    }

    fn start_accessing(&self, folder: &Path) -> anyhow::Result<()> {
        let url = folder_url(folder)?;
        // SAFETY: plain Objective-C message on a valid NSURL.
        if unsafe { url.startAccessingSecurityScopedResource() } {
            Ok(())
        } else {
            anyhow::bail!(
                "failed to start accessing security-scoped resource: {}",
                folder.display()
            )
        }
    }

    fn stop_accessing(&self, folder: &Path) {
        let Ok(url) = folder_url(folder) else {
            return;
        };
        // SAFETY: a no-op if access was never started.
        unsafe {
            url.stopAccessingSecurityScopedResource();
        }
    }
}

fn folder_url(folder: &Path) -> anyhow::Result<Retained<NSURL>> {
    let path_str = folder
        .to_str()
        .ok_or_else(|| anyhow::anyhow!("path is not valid UTF-8: {}", folder.display()))?;
    Ok(NSURL::fileURLWithPath_isDirectory(
        &NSString::from_str(path_str),
        true,
    ))
}
