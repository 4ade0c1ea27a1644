//! Persisted user preferences.
//!
//! Holds one security-scoped bookmark per authorized folder, keyed by the
//! folder's absolute `file://` URL string. Persisted to
//! `config_dir()/preferences.json`. There is no locking: the last writer wins.

use crate::error::{Result, SvgPadError};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Preference key for a folder's bookmark: its absolute directory URL.
///
/// Returns `None` for relative paths.
pub fn bookmark_key(folder: &Path) -> Option<String> {
    url::Url::from_directory_path(folder)
        .ok()
        .map(|u| u.to_string())
}

/// Persisted preference entries.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    /// Folder URL → base64 bookmark bytes.
    bookmarks: BTreeMap<String, String>,
    #[serde(skip)]
    path: Option<PathBuf>,
}

impl Preferences {
    /// Preferences that are never written to disk.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Load from `path`. Returns empty preferences bound to `path` if the
    /// file is missing or cannot be parsed.
    ///
    /// Any other read failure leaves the preferences unbound, so later
    /// changes stay in memory instead of replacing a file that could not be
    /// read.
    pub fn load(path: &Path) -> Self {
        let mut prefs = match std::fs::read(path) {
            Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_else(|e| {
                tracing::warn!("ignoring unreadable preferences {}: {e}", path.display());
                Self::default()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Self::default(),
            Err(e) => {
                tracing::warn!(
                    "cannot read preferences {}: {e}; changes will not be saved",
                    path.display()
                );
                return Self::default();
            }
        };
        prefs.path = Some(path.to_owned());
        prefs
    }

    /// Load from the default location.
    pub fn load_default() -> Self {
        Self::load(&crate::app_dirs::AppDirs::resolve().preferences_file())
    }

    /// Persist to the bound path. A no-op for in-memory preferences.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or the file
    /// cannot be written.
    pub fn save(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                SvgPadError::Preferences(format!(
                    "cannot create preferences directory {}: {e}",
                    parent.display()
                ))
            })?;
        }

        let json = serde_json::to_string_pretty(self)
            .map_err(|e| SvgPadError::Preferences(format!("cannot serialize preferences: {e}")))?;

        std::fs::write(path, json).map_err(|e| {
            SvgPadError::Preferences(format!(
                "cannot write preferences to {}: {e}",
                path.display()
            ))
        })
    }

    /// Cached bookmark bytes for `folder`, if any.
    ///
    /// An entry that is not valid base64 is treated as absent.
    pub fn bookmark(&self, folder: &Path) -> Option<Vec<u8>> {
        let key = bookmark_key(folder)?;
        let encoded = self.bookmarks.get(&key)?;
        match BASE64.decode(encoded) {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                tracing::warn!("discarding corrupt bookmark for {key}: {e}");
                None
            }
        }
    }

    /// Store bookmark bytes for `folder` and persist, overwriting any
    /// previous entry.
    ///
    /// # Errors
    ///
    /// Returns an error if `folder` is not absolute or saving fails.
    pub fn set_bookmark(&mut self, folder: &Path, data: &[u8]) -> Result<()> {
        let key = bookmark_key(folder).ok_or_else(|| {
            SvgPadError::Preferences(format!("not an absolute folder: {}", folder.display()))
        })?;
        self.bookmarks.insert(key, BASE64.encode(data));
        self.save()
    }

    /// Drop the bookmark for `folder` and persist.
    ///
    /// # Errors
    ///
    /// Returns an error if saving fails.
    pub fn remove_bookmark(&mut self, folder: &Path) -> Result<()> {
        let Some(key) = bookmark_key(folder) else {
            return Ok(());
        };
        if self.bookmarks.remove(&key).is_some() {
            self.save()?;
        }
        Ok(())
    }

    /// Number of stored bookmarks.
    pub fn bookmark_count(&self) -> usize {
        self.bookmarks.len()
    }
}
