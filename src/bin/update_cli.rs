//! Command line front end for the SVGPad updater.

use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use svgpad::platform::applications;
use svgpad::update::{
    InstallOptions, InstallServices, InstallTarget, Installer, RelaunchCoordinator,
    UpdateContext, UpdateController, UpdateStatus,
};
use svgpad::{AppConfig, Preferences};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Check for, download, and install SVGPad updates.
#[derive(Parser)]
#[command(name = "svgpad-update", version, about)]
struct Cli {
    /// Path to TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Subcommand to run.
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Compare the published release notes with the installed ones.
    Check,

    /// Check, download, extract, and install the latest release.
    Update {
        /// Leave the new version closed after installing.
        #[arg(long)]
        no_relaunch: bool,
    },

    /// Install an already extracted bundle.
    Install {
        /// The `.app` bundle to install.
        bundle: PathBuf,

        /// Install here instead of the configured or default location.
        #[arg(long)]
        to: Option<PathBuf>,

        /// Leave the new version closed after installing.
        #[arg(long)]
        no_relaunch: bool,
    },

    /// Print the effective configuration.
    Config,
}

fn init_tracing() -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("svgpad=info,svgpad_update=info"));
    let stderr = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    let logs = svgpad::app_dirs::AppDirs::resolve().logs_dir();
    let (file_layer, guard) = match std::fs::create_dir_all(&logs) {
        Ok(()) => {
            let appender = tracing_appender::rolling::daily(&logs, "svgpad-update.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(writer);
            (Some(layer), Some(guard))
        }
        Err(e) => {
            eprintln!("file logging disabled: cannot create {}: {e}", logs.display());
            (None, None)
        }
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr)
        .with(file_layer)
        .init();
    guard
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _log_guard = init_tracing();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => AppConfig::from_file(path)?,
        None => AppConfig::load_or_default()?,
    };

    match cli.command {
        Command::Check => run_check(config).await,
        Command::Update { no_relaunch } => run_update(config, no_relaunch).await,
        Command::Install {
            bundle,
            to,
            no_relaunch,
        } => run_install(config, bundle, to, no_relaunch),
        Command::Config => {
            print!("{}", toml::to_string_pretty(&config)?);
            Ok(())
        }
    }
}

async fn run_check(config: AppConfig) -> anyhow::Result<()> {
    let mut controller = UpdateController::new(UpdateContext::new(config));
    controller.check().await?;

    match controller.status() {
        UpdateStatus::UpdateAvailable(manifest) => {
            println!("Update available:\n\n{}", manifest.notes().trim_end());
        }
        UpdateStatus::NoUpdateAvailable => println!("SVGPad is up to date."),
        UpdateStatus::Idle => {
            println!("No bundled release notes found; cannot tell whether an update exists.");
        }
        other => println!("{}", other.name()),
    }
    Ok(())
}

fn progress_bar() -> ProgressBar {
    let pb = ProgressBar::new(0);
    if let Ok(style) =
        ProgressStyle::with_template("  {msg} [{bar:30}] {bytes}/{total_bytes} {bytes_per_sec}")
    {
        pb.set_style(style);
    }
    pb
}

async fn run_update(mut config: AppConfig, no_relaunch: bool) -> anyhow::Result<()> {
    if no_relaunch {
        config.install.relaunch = false;
    }

    let pb = progress_bar();
    let bar = pb.clone();
    let context = UpdateContext::new(config).on_status(Box::new(move |status| match status {
        UpdateStatus::Downloading { progress, .. } => {
            bar.set_message("downloading");
            if let Some(total) = progress.total {
                bar.set_length(total);
            }
            bar.set_position(progress.completed);
        }
        UpdateStatus::Extracting { .. } => bar.set_message("extracting"),
        UpdateStatus::Installing { .. } => bar.set_message("installing"),
        UpdateStatus::AwaitingRelaunch(_) => bar.finish_with_message("installed"),
        s if s.is_failure() => bar.abandon_with_message(s.name()),
        _ => {}
    }));

    let mut controller = UpdateController::new(context);
    let status = controller.run().await?;
    pb.finish_and_clear();

    match status {
        UpdateStatus::AwaitingRelaunch(_) => println!("Update installed. Restart SVGPad to use it."),
        UpdateStatus::NoUpdateAvailable => println!("SVGPad is up to date."),
        UpdateStatus::Idle => {
            println!("No bundled release notes found; cannot tell whether an update exists.");
        }
        other => println!("{}", other.name()),
    }
    Ok(())
}

fn run_install(
    config: AppConfig,
    bundle: PathBuf,
    to: Option<PathBuf>,
    no_relaunch: bool,
) -> anyhow::Result<()> {
    let candidates = applications::standard_application_dirs();
    let destination = match to.or_else(|| config.install.install_path.clone()) {
        Some(path) => path,
        None => applications::preferred_install_dir(&candidates)
            .map(|dir| dir.join(&config.install.bundle_name))
            .ok_or_else(|| anyhow::anyhow!("no application directory available; pass --to"))?,
    };
    let bundle = bundle.canonicalize()?;
    let target = InstallTarget::new(bundle, destination).resolve(&candidates)?;

    let app_name = target
        .destination
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let services = InstallServices::platform(&app_name);
    let mut preferences = Preferences::load_default();
    let installed = Installer::new(
        &services,
        &mut preferences,
        InstallOptions::from_config(&config.install),
    )
    .install(&target)?;
    println!("Installed {}", installed.display());

    if config.install.relaunch && !no_relaunch {
        RelaunchCoordinator::new().schedule(&installed)?;
    }
    Ok(())
}
