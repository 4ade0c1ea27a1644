//! Release manifest: the raw bytes of the published release notes.

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

/// Opaque release manifest.
///
/// Identity is the byte content. A manifest that differs by even one byte
/// from the bundled copy means an update exists; no version parsing happens,
/// so "different" does not imply "newer".
#[derive(Clone, PartialEq, Eq)]
pub struct ReleaseManifest {
    bytes: Arc<[u8]>,
}

impl ReleaseManifest {
    /// Wrap fetched bytes.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into().into(),
        }
    }

    /// Raw manifest bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Release notes as text, with invalid UTF-8 replaced.
    pub fn notes(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.bytes)
    }

    /// Byte-wise inequality against a reference copy.
    pub fn differs_from(&self, reference: &[u8]) -> bool {
        *self.bytes != *reference
    }
}

impl fmt::Debug for ReleaseManifest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let notes = self.notes();
        let headline = notes.lines().next().unwrap_or_default();
        f.debug_struct("ReleaseManifest")
            .field("len", &self.bytes.len())
            .field("headline", &headline)
            .finish()
    }
}
