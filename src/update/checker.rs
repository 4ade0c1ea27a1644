//! Release manifest checker.
//!
//! Fetches the published release notes and compares them byte-for-byte with
//! the copy bundled in the running app. Any difference counts as an update.

use crate::config::UpdateConfig;
use crate::error::{Result, SvgPadError};
use crate::update::manifest::ReleaseManifest;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Result of one manifest comparison.
#[derive(Debug, Clone, PartialEq)]
pub enum CheckOutcome {
    /// Remote bytes differ from the local copy.
    UpdateAvailable(ReleaseManifest),
    /// Remote bytes match the local copy.
    UpToDate,
    /// No local copy to compare against; nothing was fetched.
    Undetermined,
}

/// Where the running bundle keeps its copy of the manifest.
pub fn bundled_manifest_path(bundle: &Path, manifest_name: &str) -> PathBuf {
    bundle.join("Contents").join("Resources").join(manifest_name)
}

/// Build the HTTP client shared by checker and downloader.
pub(crate) fn http_client(config: &UpdateConfig, timeout: Option<Duration>) -> Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder()
        .user_agent(format!("SVGPad/{} (self-update)", env!("CARGO_PKG_VERSION")))
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs));
    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout);
    }
    builder
        .build()
        .map_err(|e| SvgPadError::Config(format!("cannot build HTTP client: {e}")))
}

/// Compares the remote release manifest against the bundled one.
pub struct VersionChecker {
    client: reqwest::Client,
}

impl VersionChecker {
    /// Create a checker using the configured timeouts.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &UpdateConfig) -> Result<Self> {
        Ok(Self {
            client: http_client(config, Some(Duration::from_secs(config.connect_timeout_secs * 2)))?,
        })
    }

    /// Fetch `remote` once and compare it with the file at `local`.
    ///
    /// Without a local copy there is nothing to compare, so no request is
    /// made and [`CheckOutcome::Undetermined`] is returned.
    ///
    /// # Errors
    ///
    /// Returns [`SvgPadError::Check`] if the local copy cannot be read, the
    /// request fails, or the server answers with a non-success status.
    pub async fn check(&self, remote: &url::Url, local: Option<&Path>) -> Result<CheckOutcome> {
        let Some(local) = local else {
            tracing::warn!("no bundled release manifest; cannot tell whether {remote} is new");
            return Ok(CheckOutcome::Undetermined);
        };

        let reference = tokio::fs::read(local).await.map_err(|e| {
            SvgPadError::Check(format!("cannot read local manifest {}: {e}", local.display()))
        })?;

        tracing::info!("checking {remote} for updates");
        let remote_bytes = self.fetch(remote).await?;
        let manifest = ReleaseManifest::new(remote_bytes);

        if manifest.differs_from(&reference) {
            tracing::info!("update available: {:?}", manifest);
            Ok(CheckOutcome::UpdateAvailable(manifest))
        } else {
            tracing::info!("release manifest unchanged");
            Ok(CheckOutcome::UpToDate)
        }
    }

    async fn fetch(&self, url: &url::Url) -> Result<Vec<u8>> {
        let resp = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| SvgPadError::Check(format!("request to {url} failed: {e}")))?
            .error_for_status()
            .map_err(|e| SvgPadError::Check(e.to_string()))?;

        let bytes = resp
            .bytes()
            .await
            .map_err(|e| SvgPadError::Check(format!("reading {url} failed: {e}")))?;
        Ok(bytes.to_vec())
    }
}
