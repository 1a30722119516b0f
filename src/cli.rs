use std::{
    io,
    path::PathBuf,
    sync::mpsc::{Receiver, RecvTimeoutError},
    time::Duration,
};

use anyhow::{Context, Result, anyhow, bail};
use clap::{ArgAction, Parser, Subcommand};
use tracing::{debug, info};

use crate::{
    ProfileManager,
    config::{ManagerSettings, default_config_path},
    events::{AppEvent, AppEventKind},
    profile::Profile,
    telemetry,
};

#[derive(Parser, Debug)]
#[command(name = "dartdeck", version, about = "Autodarts companion app manager", long_about = None)]
pub struct Cli {
    /// Increase logging verbosity.
    #[arg(long, global = true, action = ArgAction::SetTrue)]
    pub verbose: bool,

    /// Custom settings path.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List profiles and the apps they start.
    Profiles,
    /// List every known app with its lifecycle state.
    Apps,
    /// Start every tagged app of a profile.
    Run { profile: String },
    /// Start a single app.
    Start { app: String },
    /// Print the command an app would be started with.
    CommandLine {
        app: String,
        /// Apply the runtime arguments the app has in this profile.
        #[arg(long)]
        profile: Option<String>,
    },
    /// Tag an app for start in a profile.
    Tag { profile: String, app: String },
    /// Stop starting an app with a profile.
    Untag { profile: String, app: String },
    /// Set an argument of an app. An empty value clears it.
    Set {
        app: String,
        argument: String,
        value: String,
    },
    /// Delete one persisted collection (e.g. `profiles.json`) so it is rebuilt from defaults.
    Reset { file: String },
}

/// Entry point of the `dartdeck` binary.
pub fn run() -> Result<()> {
    let cli = Cli::parse();
    let config_path = match cli.config.clone() {
        Some(path) => path,
        None => default_config_path()?,
    };
    let settings = ManagerSettings::load_or_default(&config_path)?;
    telemetry::init_tracing(cli.verbose, &settings.traces)?;
    if let Some(path) = telemetry::current_trace_file() {
        info!(path = %path.display(), "Writing JSON traces");
    }

    let mut manager = ProfileManager::from_settings(&settings)?;

    // A corrupt collection must stay deletable without loading it first.
    if let Command::Reset { file } = &cli.command {
        let Some(path) = manager.paths().by_file_name(file).map(PathBuf::from) else {
            let known: Vec<String> = manager
                .paths()
                .all()
                .iter()
                .filter_map(|path| path.file_name())
                .map(|name| name.to_string_lossy().into_owned())
                .collect();
            bail!("Unknown collection '{file}' (expected one of {})", known.join(", "));
        };
        manager.delete_configuration_file(&path)?;
        println!("Deleted {}", path.display());
        return Ok(());
    }

    manager.load_apps_and_profiles().map_err(|err| {
        let file = err
            .path()
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        anyhow!(err).context(format!(
            "Failed to load apps and profiles (run `dartdeck reset {file}` to rebuild it)"
        ))
    })?;
    let events = manager.take_event_receiver();

    match cli.command {
        Command::Profiles => {
            for profile in manager.profiles() {
                print_profile(profile);
            }
        }
        Command::Apps => {
            for app in manager.apps().iter() {
                println!(
                    "{:<28} {:<13} {:<15} {}",
                    app.name(),
                    app.kind().to_string(),
                    app.state().to_string(),
                    app.display_name()
                );
            }
        }
        Command::Run { profile } => {
            let started = manager.run_profile(&profile)?;
            let settled = watch_events(&manager, events.as_ref());
            finish(&manager, started && settled)?;
        }
        Command::Start { app } => {
            manager.start_app(&app)?;
            let settled = watch_events(&manager, events.as_ref());
            finish(&manager, settled)?;
        }
        Command::CommandLine { app, profile } => {
            println!("{}", manager.command_line(&app, profile.as_deref())?);
        }
        Command::Tag { profile, app } => {
            manager.set_tagged(&profile, &app, true)?;
            manager.store_apps()?;
        }
        Command::Untag { profile, app } => {
            manager.set_tagged(&profile, &app, false)?;
            manager.store_apps()?;
        }
        Command::Set {
            app,
            argument,
            value,
        } => {
            manager.set_argument(&app, &argument, &value)?;
            manager.store_apps()?;
        }
        Command::Reset { .. } => {}
    }

    Ok(())
}

fn print_profile(profile: &Profile) {
    println!("{}", profile.name);
    for (app, state) in &profile.apps {
        let marker = match (state.is_required, state.tagged_for_start) {
            (true, _) => "!",
            (false, true) => "*",
            (false, false) => " ",
        };
        if state.runtime_arguments.is_empty() {
            println!("  {marker} {app}");
        } else {
            let overrides: Vec<String> = state
                .runtime_arguments
                .iter()
                .map(|(name, value)| format!("{name}={value}"))
                .collect();
            println!("  {marker} {app} ({})", overrides.join(", "));
        }
    }
}

fn print_event(event: &AppEvent) {
    match &event.kind {
        AppEventKind::DownloadProgressed { transferred, total } => {
            debug!(app = %event.app, transferred, total = ?total, "Download progress");
        }
        AppEventKind::DownloadStarted => println!("{}: downloading", event.app),
        AppEventKind::DownloadFinished => println!("{}: downloaded", event.app),
        AppEventKind::DownloadFailed { reason } => {
            println!("{}: download failed: {reason}", event.app)
        }
        AppEventKind::InstallStarted => println!("{}: installing", event.app),
        AppEventKind::InstallFinished => println!("{}: installed", event.app),
        AppEventKind::InstallFailed { reason } => {
            println!("{}: install failed: {reason}", event.app)
        }
        AppEventKind::ConfigurationRequired { reason } => {
            println!("{}: configuration required: {reason}", event.app)
        }
        AppEventKind::StartFailed { reason } => {
            println!("{}: start failed: {reason}", event.app)
        }
    }
}

/// Prints events until no app is downloading or installing. Returns false
/// when a background step failed.
fn watch_events(manager: &ProfileManager, events: Option<&Receiver<AppEvent>>) -> bool {
    let Some(events) = events else {
        return true;
    };
    let mut settled = true;
    loop {
        match events.recv_timeout(Duration::from_millis(250)) {
            Ok(event) => {
                settled &= !event.kind.is_failure();
                print_event(&event);
            }
            Err(RecvTimeoutError::Timeout) => {
                if !manager.apps().iter().any(|app| app.state().is_busy()) {
                    break;
                }
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    while let Ok(event) = events.try_recv() {
        settled &= !event.kind.is_failure();
        print_event(&event);
    }
    settled
}

fn finish(manager: &ProfileManager, started: bool) -> Result<()> {
    manager.store_apps()?;
    if !started {
        manager.close_apps();
        bail!("Not every app could be started");
    }
    println!("Apps started. Press Enter to close them.");
    let mut line = String::new();
    io::stdin()
        .read_line(&mut line)
        .context("Failed to read from stdin")?;
    manager.close_apps();
    Ok(())
}
