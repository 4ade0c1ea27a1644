//! Update archive downloader.
//!
//! Streams the artifact to `<name>.part` and renames it on success. A failed
//! download deletes the partial file; the next attempt starts from scratch.

use crate::config::UpdateConfig;
use crate::error::{Result, SvgPadError};
use crate::progress::{Progress, ProgressCallback, ProgressEvent};
use futures_util::StreamExt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;

/// Downloads release artifacts into a local directory.
pub struct UpdateDownloader {
    client: reqwest::Client,
    dir: PathBuf,
}

impl UpdateDownloader {
    /// Create a downloader writing into the configured download directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &UpdateConfig) -> Result<Self> {
        Ok(Self {
            client: crate::update::checker::http_client(
                config,
                Some(Duration::from_secs(config.download_timeout_secs)),
            )?,
            dir: config.download_dir(),
        })
    }

    /// Directory archives are written to.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Download `url` to `<dir>/<file_name>`, reporting byte progress.
    ///
    /// # Errors
    ///
    /// Returns [`SvgPadError::Download`] on any network or write failure.
    pub async fn download(
        &self,
        url: &url::Url,
        file_name: &str,
        progress: Option<&ProgressCallback>,
    ) -> Result<PathBuf> {
        let name = Path::new(file_name)
            .file_name()
            .ok_or_else(|| SvgPadError::Download(format!("invalid artifact name {file_name:?}")))?;
        let dest = self.dir.join(name);
        let partial = dest.with_file_name(format!("{}.part", name.to_string_lossy()));

        tokio::fs::create_dir_all(&self.dir).await.map_err(|e| {
            SvgPadError::Download(format!("cannot create {}: {e}", self.dir.display()))
        })?;

        match self.fetch_to(url, &partial, progress).await {
            Ok(bytes) => {
                tokio::fs::rename(&partial, &dest).await.map_err(|e| {
                    SvgPadError::Download(format!("cannot finalize {}: {e}", dest.display()))
                })?;
                if let Some(cb) = progress {
                    cb(ProgressEvent::DownloadComplete { bytes });
                }
                tracing::info!("downloaded {url} to {} ({bytes} bytes)", dest.display());
                Ok(dest)
            }
            Err(e) => {
                if let Err(rm) = tokio::fs::remove_file(&partial).await {
                    if rm.kind() != std::io::ErrorKind::NotFound {
                        tracing::warn!("cannot remove partial download {}: {rm}", partial.display());
                    }
                }
                Err(e)
            }
        }
    }

    async fn fetch_to(
        &self,
        url: &url::Url,
        path: &Path,
        progress: Option<&ProgressCallback>,
    ) -> Result<u64> {
        let resp = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| SvgPadError::Download(format!("request to {url} failed: {e}")))?
            .error_for_status()
            .map_err(|e| SvgPadError::Download(e.to_string()))?;

        let total = resp.content_length();
        if let Some(cb) = progress {
            cb(ProgressEvent::DownloadStarted {
                url: url.to_string(),
                total_bytes: total,
            });
        }

        let mut file = tokio::fs::File::create(path).await.map_err(|e| {
            SvgPadError::Download(format!("cannot create {}: {e}", path.display()))
        })?;

        let mut stream = resp.bytes_stream();
        let mut received: u64 = 0;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| SvgPadError::Download(format!("transfer interrupted: {e}")))?;
            file.write_all(&chunk)
                .await
                .map_err(|e| SvgPadError::Download(format!("write failed: {e}")))?;
            received += chunk.len() as u64;
            if let Some(cb) = progress {
                cb(ProgressEvent::DownloadProgress(Progress {
                    completed: received,
                    total,
                }));
            }
        }

        file.flush()
            .await
            .map_err(|e| SvgPadError::Download(format!("write failed: {e}")))?;

        if let Some(expected) = total {
            if received != expected {
                return Err(SvgPadError::Download(format!(
                    "truncated download: got {received} of {expected} bytes"
                )));
            }
        }
        Ok(received)
    }
}
