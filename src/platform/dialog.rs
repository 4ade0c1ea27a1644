//! Folder picker backed by the native file dialog.

use std::path::{Path, PathBuf};

use super::FolderAuthorizer;

/// Shows a native folder picker opened at the folder that needs access.
pub struct DialogFolderAuthorizer {
    app_name: String,
}

impl DialogFolderAuthorizer {
    /// Create an authorizer whose prompts mention `app_name`.
    pub fn new(app_name: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
        }
    }

    fn title(&self, folder: &Path, attempt: u32) -> String {
        let name = folder
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| folder.display().to_string());
        if attempt == 0 {
            format!("Allow {} to update itself in \"{name}\"", self.app_name)
        } else {
            format!("Please select the \"{name}\" folder to finish updating {}", self.app_name)
        }
    }
}

impl FolderAuthorizer for DialogFolderAuthorizer {
    fn request_folder(&self, folder: &Path, attempt: u32) -> anyhow::Result<Option<PathBuf>> {
        tracing::info!(
            "requesting access to {} (attempt {})",
            folder.display(),
            attempt + 1
        );
        Ok(rfd::FileDialog::new()
            .set_title(self.title(folder, attempt))
            .set_directory(folder)
            .pick_folder())
    }
}
