//! SVG document text model.
//!
//! The document is a single mutable string. Rendering is the platform's job;
//! this type only loads, holds, and persists the text.

use crate::error::{Result, SvgPadError};
use std::path::Path;

/// Placeholder shown for a new, unsaved document.
pub const NEW_DOCUMENT_TEXT: &str = "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"64\" height=\"64\">\n</svg>\n";

/// An SVG document held as text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SvgDocument {
    text: String,
    dirty: bool,
}

impl Default for SvgDocument {
    fn default() -> Self {
        Self {
            text: NEW_DOCUMENT_TEXT.to_owned(),
            dirty: false,
        }
    }
}

impl SvgDocument {
    /// Create a document from existing text.
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            dirty: false,
        }
    }

    /// Read a document from disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid UTF-8.
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        let text = String::from_utf8(bytes).map_err(|e| {
            SvgPadError::Document(format!("{} is not UTF-8 text: {e}", path.display()))
        })?;
        tracing::debug!("loaded {} ({} bytes)", path.display(), text.len());
        Ok(Self::from_text(text))
    }

    /// Write the document to disk and clear the dirty flag.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save(&mut self, path: &Path) -> Result<()> {
        std::fs::write(path, self.text.as_bytes())?;
        self.dirty = false;
        Ok(())
    }

    /// Current text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Replace the text. Marks the document dirty when it changes.
    pub fn set_text(&mut self, text: impl Into<String>) {
        let text = text.into();
        if text != self.text {
            self.text = text;
            self.dirty = true;
        }
    }

    /// Whether there are unsaved edits.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }
}
