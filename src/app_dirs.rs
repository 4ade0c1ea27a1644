//! On-disk layout for SVGPad's own files.
//!
//! Three roots come from the [`dirs`] crate (container-relative under App
//! Sandbox), each overridable from the environment:
//!
//! | Root | Variable | Default (macOS) | Holds |
//! |------|----------|-----------------|-------|
//! | config | `SVGPAD_CONFIG_DIR` | `~/Library/Application Support/svgpad/` | `config.toml`, `preferences.json` |
//! | data | `SVGPAD_DATA_DIR` | `~/Library/Application Support/svgpad/` | `logs/` |
//! | cache | `SVGPAD_CACHE_DIR` | `~/Library/Caches/svgpad/` | `updates/` (downloads, extraction scratch) |

use std::ffi::OsString;
use std::path::{Path, PathBuf};

const APP_DIR_NAME: &str = "svgpad";

/// Resolved directory roots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppDirs {
    config: PathBuf,
    data: PathBuf,
    cache: PathBuf,
}

impl AppDirs {
    /// Resolve roots from the process environment and platform defaults.
    #[must_use]
    pub fn resolve() -> Self {
        Self::resolve_with(|key| std::env::var_os(key))
    }

    /// Resolve roots using `lookup` for the override variables.
    pub fn resolve_with(lookup: impl Fn(&str) -> Option<OsString>) -> Self {
        let root = |var: &str, platform: Option<PathBuf>, kind: &str| {
            lookup(var).map(PathBuf::from).unwrap_or_else(|| {
                platform
                    .map(|d| d.join(APP_DIR_NAME))
                    .unwrap_or_else(|| std::env::temp_dir().join(format!("{APP_DIR_NAME}-{kind}")))
            })
        };
        Self {
            config: root("SVGPAD_CONFIG_DIR", dirs::config_dir(), "config"),
            data: root("SVGPAD_DATA_DIR", dirs::data_dir(), "data"),
            cache: root("SVGPAD_CACHE_DIR", dirs::cache_dir(), "cache"),
        }
    }

    /// All three roots under one directory.
    pub fn under(root: &Path) -> Self {
        Self {
            config: root.join("config"),
            data: root.join("data"),
            cache: root.join("cache"),
        }
    }

    pub fn config_file(&self) -> PathBuf {
        self.config.join("config.toml")
    }

    /// Folder bookmarks granted by the user.
    pub fn preferences_file(&self) -> PathBuf {
        self.config.join("preferences.json")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.data.join("logs")
    }

    /// Downloaded archives and per-run extraction directories.
    pub fn updates_dir(&self) -> PathBuf {
        self.cache.join("updates")
    }
}

/// The user's Trash folder, if a home directory is known.
#[must_use]
pub fn trash_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".Trash"))
}

/// Whether the process runs inside a macOS App Sandbox container, which
/// sets `APP_SANDBOX_CONTAINER_ID`.
#[must_use]
pub fn is_sandboxed() -> bool {
    std::env::var_os("APP_SANDBOX_CONTAINER_ID").is_some()
}
