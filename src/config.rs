//! Configuration types for the updater.

use crate::error::{Result, SvgPadError};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Release endpoints and download settings.
    pub update: UpdateConfig,
    /// Bundle naming and install behavior.
    pub install: InstallConfig,
}

/// Where releases are published and how they are fetched.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdateConfig {
    /// Base releases URL; `latest/download/<name>` is appended.
    pub releases_base: String,
    /// Release notes file used as the version manifest.
    pub manifest_name: String,
    /// Archive holding the new application bundle.
    pub artifact_name: String,
    /// Local reference manifest. When unset, it is looked up in the running
    /// bundle's `Contents/Resources/`.
    pub local_manifest: Option<PathBuf>,
    /// Directory for downloads and extraction scratch (default: cache dir).
    pub download_dir: Option<PathBuf>,
    /// TCP connect timeout in seconds.
    pub connect_timeout_secs: u64,
    /// Whole-request timeout in seconds for the artifact download.
    pub download_timeout_secs: u64,
}

impl Default for UpdateConfig {
    fn default() -> Self {
        Self {
            releases_base: "https://github.com/svgpad/svgpad/releases".to_owned(),
            manifest_name: "RELEASE_NOTES.md".to_owned(),
            artifact_name: "svgpad.zip".to_owned(),
            local_manifest: None,
            download_dir: None,
            connect_timeout_secs: 15,
            download_timeout_secs: 300,
        }
    }
}

impl UpdateConfig {
    /// `<releases-base>/latest/download/<manifest-name>`.
    ///
    /// # Errors
    ///
    /// Returns a config error if the result is not a valid URL.
    pub fn manifest_url(&self) -> Result<url::Url> {
        self.latest_download_url(&self.manifest_name)
    }

    /// `<releases-base>/latest/download/<artifact-name>`.
    ///
    /// # Errors
    ///
    /// Returns a config error if the result is not a valid URL.
    pub fn artifact_url(&self) -> Result<url::Url> {
        self.latest_download_url(&self.artifact_name)
    }

    fn latest_download_url(&self, name: &str) -> Result<url::Url> {
        let raw = format!(
            "{}/latest/download/{}",
            self.releases_base.trim_end_matches('/'),
            name.trim_start_matches('/')
        );
        url::Url::parse(&raw).map_err(|e| SvgPadError::Config(format!("invalid URL {raw}: {e}")))
    }

    /// Download/scratch directory, falling back to the app cache.
    pub fn download_dir(&self) -> PathBuf {
        self.download_dir
            .clone()
            .unwrap_or_else(|| crate::app_dirs::AppDirs::resolve().updates_dir())
    }
}

/// Installed bundle naming and install policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InstallConfig {
    /// File name of the application bundle (e.g. `SVGPad.app`).
    pub bundle_name: String,
    /// Bundle directory extension, without the dot.
    pub bundle_extension: String,
    /// Install destination override. When unset, the running bundle is used.
    pub install_path: Option<PathBuf>,
    /// Relaunch the new bundle and quit after a successful install.
    pub relaunch: bool,
    /// How many times the folder picker is shown before giving up on a
    /// wrong selection.
    pub folder_prompt_attempts: u32,
    /// Where replaced bundles are moved (default: `~/.Trash`).
    pub trash_dir: Option<PathBuf>,
}

impl Default for InstallConfig {
    fn default() -> Self {
        Self {
            bundle_name: "SVGPad.app".to_owned(),
            bundle_extension: "app".to_owned(),
            install_path: None,
            relaunch: true,
            folder_prompt_attempts: 2,
            trash_dir: None,
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| SvgPadError::Config(e.to_string()))
    }

    /// Save configuration to a TOML file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot be serialized.
    pub fn save_to_file(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| SvgPadError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Load the default config file if present, otherwise defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be parsed.
    pub fn load_or_default() -> Result<Self> {
        let path = Self::default_config_path();
        if path.exists() {
            Self::from_file(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Returns the default config file path.
    pub fn default_config_path() -> PathBuf {
        crate::app_dirs::AppDirs::resolve().config_file()
    }
}
