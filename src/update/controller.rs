//! Drives the update pipeline and owns its status.
//!
//! [`UpdateController`] is the only writer of [`UpdateStatus`]. Every change
//! goes through [`UpdateStatus::apply`]; an illegal event is logged and the
//! status stays where it was. Progress callbacks from the downloader,
//! extractor, and installer feed back into the same transition function.

use crate::config::AppConfig;
use crate::error::{Result, SvgPadError};
use crate::platform::applications::{self, ApplicationDir};
use crate::preferences::Preferences;
use crate::progress::{ProgressCallback, ProgressEvent};
use crate::update::checker::{self, CheckOutcome, VersionChecker};
use crate::update::downloader::UpdateDownloader;
use crate::update::extractor::ArchiveExtractor;
use crate::update::installer::{self, InstallOptions, InstallServices, InstallTarget, Installer};
use crate::update::relaunch::RelaunchCoordinator;
use crate::update::status::{UpdateEvent, UpdateStatus};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

/// Ends the process once the relaunch helper is running.
pub trait Terminator: Send + Sync {
    /// Request termination.
    fn terminate(&self);
}

/// Exits the current process with status 0.
#[derive(Debug, Default)]
pub struct ProcessTerminator;

impl Terminator for ProcessTerminator {
    fn terminate(&self) {
        tracing::info!("exiting for relaunch");
        std::process::exit(0);
    }
}

/// Starts the new bundle after this process exits.
pub trait Relauncher: Send + Sync {
    /// Arrange for `bundle` to be opened once this process has exited.
    fn schedule(&self, bundle: &Path) -> Result<()>;
}

impl Relauncher for RelaunchCoordinator {
    fn schedule(&self, bundle: &Path) -> Result<()> {
        RelaunchCoordinator::schedule(self, bundle)
    }
}

/// Called after every accepted status change.
///
/// Runs while the status lock is held, so it must not call back into the
/// controller.
pub type StatusObserver = Box<dyn Fn(&UpdateStatus) + Send + Sync>;

/// Receives every pipeline failure.
pub type ErrorHook = Box<dyn Fn(&SvgPadError) + Send + Sync>;

/// Everything the controller needs, created once at startup.
pub struct UpdateContext {
    config: AppConfig,
    preferences: Preferences,
    services: InstallServices,
    terminator: Box<dyn Terminator>,
    relauncher: Box<dyn Relauncher>,
    application_dirs: Vec<ApplicationDir>,
    running_bundle: Option<PathBuf>,
    observer: Option<StatusObserver>,
    error_hook: ErrorHook,
}

impl UpdateContext {
    /// Context with the real platform services and persisted preferences.
    pub fn new(config: AppConfig) -> Self {
        let app_name = Path::new(&config.install.bundle_name)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| config.install.bundle_name.clone());
        let running_bundle = std::env::current_exe()
            .ok()
            .and_then(|exe| installer::locate_running_bundle(&exe, &config.install.bundle_extension));

        Self {
            preferences: Preferences::load_default(),
            services: InstallServices::platform(&app_name),
            terminator: Box::new(ProcessTerminator),
            relauncher: Box::new(RelaunchCoordinator::new()),
            application_dirs: applications::standard_application_dirs(),
            running_bundle,
            observer: None,
            error_hook: Box::new(|e| tracing::error!("update failed: {e}")),
            config,
        }
    }

    /// Replace the preferences store.
    pub fn with_preferences(mut self, preferences: Preferences) -> Self {
        self.preferences = preferences;
        self
    }

    /// Replace the install services.
    pub fn with_services(mut self, services: InstallServices) -> Self {
        self.services = services;
        self
    }

    /// Replace the terminator.
    pub fn with_terminator(mut self, terminator: Box<dyn Terminator>) -> Self {
        self.terminator = terminator;
        self
    }

    /// Replace the relauncher.
    pub fn with_relauncher(mut self, relauncher: Box<dyn Relauncher>) -> Self {
        self.relauncher = relauncher;
        self
    }

    /// Candidate install directories for transient locations.
    pub fn with_application_dirs(mut self, dirs: Vec<ApplicationDir>) -> Self {
        self.application_dirs = dirs;
        self
    }

    /// Override the detected running bundle.
    pub fn with_running_bundle(mut self, bundle: Option<PathBuf>) -> Self {
        self.running_bundle = bundle;
        self
    }

    /// Observe status changes.
    pub fn on_status(mut self, observer: StatusObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Replace the default error hook, which logs at error level.
    pub fn on_error(mut self, hook: ErrorHook) -> Self {
        self.error_hook = hook;
        self
    }

    /// Effective configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Bundle the process is running from, if any.
    pub fn running_bundle(&self) -> Option<&Path> {
        self.running_bundle.as_deref()
    }

    /// Manifest to compare against: the configured path, or the copy inside
    /// the running bundle when it exists.
    pub fn local_manifest(&self) -> Option<PathBuf> {
        if let Some(path) = &self.config.update.local_manifest {
            return Some(path.clone());
        }
        self.running_bundle
            .as_deref()
            .map(|b| checker::bundled_manifest_path(b, &self.config.update.manifest_name))
            .filter(|p| p.is_file())
    }

    /// Where the new bundle should go before transient-location redirection.
    ///
    /// # Errors
    ///
    /// Returns [`SvgPadError::Config`] if no destination can be determined.
    pub fn install_destination(&self) -> Result<PathBuf> {
        if let Some(path) = &self.config.install.install_path {
            return Ok(path.clone());
        }
        if let Some(bundle) = &self.running_bundle {
            return Ok(bundle.clone());
        }
        applications::preferred_install_dir(&self.application_dirs)
            .map(|dir| dir.join(&self.config.install.bundle_name))
            .ok_or_else(|| SvgPadError::Config("no install destination available".to_owned()))
    }
}

struct StatusCell {
    status: Mutex<UpdateStatus>,
    observer: Option<StatusObserver>,
}

impl StatusCell {
    fn get(&self) -> UpdateStatus {
        self.status
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn apply(&self, event: UpdateEvent) -> Result<()> {
        let mut status = self.status.lock().unwrap_or_else(PoisonError::into_inner);
        let next = status.apply(event).inspect_err(|e| tracing::warn!("{e}"))?;
        if status.name() != next.name() {
            tracing::debug!("update status: {} -> {}", status.name(), next.name());
        }
        *status = next;
        if let Some(observer) = &self.observer {
            observer(&status);
        }
        Ok(())
    }
}

fn progress_callback(cell: &Arc<StatusCell>) -> ProgressCallback {
    let cell = Arc::clone(cell);
    Box::new(move |event| {
        let update = match event {
            ProgressEvent::DownloadProgress(p) => UpdateEvent::DownloadProgress(p),
            ProgressEvent::ExtractProgress(p) => UpdateEvent::ExtractProgress(p),
            ProgressEvent::InstallProgress(p) => UpdateEvent::InstallProgress(p),
            ProgressEvent::DownloadStarted { .. } | ProgressEvent::DownloadComplete { .. } => {
                return;
            }
        };
        // Rejections are already logged.
        cell.apply(update).ok();
    })
}

/// Owns [`UpdateStatus`] and runs the pipeline steps.
pub struct UpdateController {
    cell: Arc<StatusCell>,
    context: UpdateContext,
}

impl UpdateController {
    /// Create an idle controller.
    pub fn new(mut context: UpdateContext) -> Self {
        let observer = context.observer.take();
        Self {
            cell: Arc::new(StatusCell {
                status: Mutex::new(UpdateStatus::Idle),
                observer,
            }),
            context,
        }
    }

    /// Current status.
    pub fn status(&self) -> UpdateStatus {
        self.cell.get()
    }

    /// The context this controller was created with.
    pub fn context(&self) -> &UpdateContext {
        &self.context
    }

    /// Fetch the remote manifest and compare it with the local one.
    ///
    /// # Errors
    ///
    /// Returns [`SvgPadError::InvalidTransition`] while another step is in
    /// flight, or the check error after moving to `CheckFailed`.
    pub async fn check(&mut self) -> Result<()> {
        self.cell.apply(UpdateEvent::CheckStarted)?;

        match self.run_check().await {
            Ok(CheckOutcome::UpdateAvailable(m)) => self.cell.apply(UpdateEvent::CheckFinished(Some(m))),
            Ok(CheckOutcome::UpToDate) => self.cell.apply(UpdateEvent::CheckFinished(None)),
            Ok(CheckOutcome::Undetermined) => self.cell.apply(UpdateEvent::CheckSkipped),
            Err(e) => self.fail(UpdateEvent::CheckFailed(e.to_string()), e),
        }
    }

    async fn run_check(&self) -> Result<CheckOutcome> {
        let config = &self.context.config.update;
        let url = config.manifest_url()?;
        let local = self.context.local_manifest();
        VersionChecker::new(config)?.check(&url, local.as_deref()).await
    }

    /// Download the release archive.
    ///
    /// # Errors
    ///
    /// Returns [`SvgPadError::InvalidTransition`] unless an update is
    /// available, or the download error after moving to `DownloadFailed`.
    pub async fn download(&mut self) -> Result<PathBuf> {
        self.cell.apply(UpdateEvent::DownloadStarted)?;

        match self.run_download().await {
            Ok(archive) => {
                self.cell.apply(UpdateEvent::DownloadFinished(archive.clone()))?;
                Ok(archive)
            }
            Err(e) => self.fail(UpdateEvent::DownloadFailed(e.to_string()), e),
        }
    }

    async fn run_download(&self) -> Result<PathBuf> {
        let config = &self.context.config.update;
        let url = config.artifact_url()?;
        let callback = progress_callback(&self.cell);
        UpdateDownloader::new(config)?
            .download(&url, &config.artifact_name, Some(&callback))
            .await
    }

    /// Unpack the downloaded archive and locate the bundle.
    ///
    /// # Errors
    ///
    /// Returns [`SvgPadError::InvalidTransition`] unless a download just
    /// finished, or the extraction error after moving to `ExtractFailed`.
    pub fn extract(&mut self) -> Result<PathBuf> {
        let archive = match self.cell.get() {
            UpdateStatus::Extracting { archive, .. } => archive,
            other => {
                let e = SvgPadError::InvalidTransition {
                    status: other.name(),
                    event: "start extract",
                };
                tracing::warn!("{e}");
                return Err(e);
            }
        };

        let extractor = ArchiveExtractor::new(
            self.context.config.update.download_dir(),
            self.context.config.install.bundle_extension.as_str(),
        );
        let callback = progress_callback(&self.cell);
        match extractor.extract(&archive, Some(&callback)) {
            Ok(bundle) => {
                self.cell.apply(UpdateEvent::ExtractFinished(bundle.clone()))?;
                Ok(bundle)
            }
            Err(e) => self.fail(UpdateEvent::ExtractFailed(e.to_string()), e),
        }
    }

    /// Replace the running bundle with the extracted one, then relaunch if
    /// configured.
    ///
    /// # Errors
    ///
    /// Returns [`SvgPadError::InvalidTransition`] unless extraction just
    /// completed, or the install error after moving to `InstallFailed`.
    pub fn install(&mut self) -> Result<PathBuf> {
        self.cell.apply(UpdateEvent::InstallStarted)?;
        let UpdateStatus::Installing { bundle, .. } = self.cell.get() else {
            return Err(SvgPadError::InvalidTransition {
                status: self.cell.get().name(),
                event: "start install",
            });
        };

        let installed = match self.run_install(&bundle) {
            Ok(installed) => installed,
            Err(e) => return self.fail(UpdateEvent::InstallFailed(e.to_string()), e),
        };
        self.cell.apply(UpdateEvent::InstallFinished)?;
        tracing::info!("installed {}", installed.display());

        if self.context.config.install.relaunch {
            if let Err(e) = self.context.relauncher.schedule(&installed) {
                (self.context.error_hook)(&e);
                return Err(e);
            }
            self.context.terminator.terminate();
        }
        Ok(installed)
    }

    fn run_install(&mut self, bundle: &Path) -> Result<PathBuf> {
        let destination = self.context.install_destination()?;
        let target = InstallTarget::new(bundle, destination).resolve(&self.context.application_dirs)?;
        let callback = progress_callback(&self.cell);
        let options = InstallOptions::from_config(&self.context.config.install);

        Installer::new(&self.context.services, &mut self.context.preferences, options)
            .with_progress(&callback)
            .install(&target)
    }

    /// Decline to continue from a resting state.
    ///
    /// # Errors
    ///
    /// Returns [`SvgPadError::InvalidTransition`] while a step is in flight.
    pub fn cancel(&mut self) -> Result<()> {
        self.cell.apply(UpdateEvent::Cancel)
    }

    /// Check, and if an update is available download, extract, and install it.
    ///
    /// Returns the final status. With relaunch enabled a successful install
    /// ends the process before this returns.
    ///
    /// # Errors
    ///
    /// Returns the first failing step's error.
    pub async fn run(&mut self) -> Result<UpdateStatus> {
        self.check().await?;
        if !matches!(self.status(), UpdateStatus::UpdateAvailable(_)) {
            return Ok(self.status());
        }
        self.download().await?;
        self.extract()?;
        self.install()?;
        Ok(self.status())
    }

    fn fail<T>(&self, event: UpdateEvent, error: SvgPadError) -> Result<T> {
        // A rejected failure event is already logged by `apply`.
        self.cell.apply(event).ok();
        (self.context.error_hook)(&error);
        Err(error)
    }
}
