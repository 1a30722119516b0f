use std::{
    fmt, fs,
    path::{Path, PathBuf},
    sync::{
        Arc, Mutex, MutexGuard, PoisonError,
        atomic::{AtomicBool, Ordering},
    },
    thread,
};

use anyhow::{Context, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{info, info_span, warn};

use crate::argument::{Argument, is_false};
use crate::configuration::Configuration;
use crate::download::{self, ArtifactKind, Downloader, artifact_file_name};
use crate::error::{AssemblyError, LaunchError};
use crate::events::{AppEventKind, EventSink};
use crate::launch::{CommandSpec, LaunchOptions, ProcessLauncher, RunningProcess};

/// Argument holding the target of local and open apps.
pub const FILE_ARGUMENT: &str = "file";
/// Free-form extra arguments of local apps.
pub const EXTRA_ARGUMENTS: &str = "arguments";

/// Lifecycle position of an app.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum AppState {
    NotDownloaded,
    Downloading,
    Downloaded,
    DownloadFailed,
    NotInstalled,
    Installing,
    Installed,
    InstallFailed,
    Runnable,
    Running,
    Terminated,
}

impl AppState {
    pub fn is_busy(&self) -> bool {
        matches!(self, AppState::Downloading | AppState::Installing)
    }
}

impl fmt::Display for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            AppState::NotDownloaded => "not downloaded",
            AppState::Downloading => "downloading",
            AppState::Downloaded => "downloaded",
            AppState::DownloadFailed => "download failed",
            AppState::NotInstalled => "not installed",
            AppState::Installing => "installing",
            AppState::Installed => "installed",
            AppState::InstallFailed => "install failed",
            AppState::Runnable => "runnable",
            AppState::Running => "running",
            AppState::Terminated => "terminated",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum AppKind {
    Downloadable,
    Installable,
    Local,
    Open,
}

impl fmt::Display for AppKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppKind::Downloadable => write!(f, "downloadable"),
            AppKind::Installable => write!(f, "installable"),
            AppKind::Local => write!(f, "local"),
            AppKind::Open => write!(f, "open"),
        }
    }
}

/// Collaborators an app needs to download, install and launch.
#[derive(Clone)]
pub struct AppServices {
    pub apps_dir: PathBuf,
    pub launcher: Arc<dyn ProcessLauncher>,
    pub downloader: Arc<dyn Downloader>,
    pub events: EventSink,
}

impl AppServices {
    pub fn app_dir(&self, name: &str) -> PathBuf {
        self.apps_dir.join(name)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Mutable, never persisted lifecycle data shared with worker threads.
#[derive(Default)]
pub struct AppRuntime {
    state: Mutex<Option<AppState>>,
    process: Mutex<Option<Box<dyn RunningProcess>>>,
    /// Set by `close`; a worker finishing afterwards must not start the app.
    close_requested: AtomicBool,
}

impl fmt::Debug for AppRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppRuntime")
            .field("state", &*lock(&self.state))
            .field("has_process", &lock(&self.process).is_some())
            .finish()
    }
}

impl AppRuntime {
    fn state(&self, initial: AppState) -> AppState {
        let mut state = lock(&self.state);
        let current = state.unwrap_or(initial);
        if current == AppState::Running {
            let mut process = lock(&self.process);
            if let Some(handle) = process.as_mut() {
                if handle.has_exited() {
                    *process = None;
                    *state = Some(AppState::Terminated);
                    return AppState::Terminated;
                }
            }
        }
        current
    }

    fn set_state(&self, next: AppState) {
        *lock(&self.state) = Some(next);
    }

    /// Moves into a busy state unless a download or install is in flight.
    fn begin(&self, initial: AppState, next: AppState) -> std::result::Result<(), AppState> {
        let mut state = lock(&self.state);
        let current = state.unwrap_or(initial);
        if current.is_busy() {
            return Err(current);
        }
        self.close_requested.store(false, Ordering::SeqCst);
        *state = Some(next);
        Ok(())
    }

    /// Starts the app from a worker unless `close` ran since `begin`.
    ///
    /// The state lock is held across `spawn` so a concurrent `close` either
    /// prevents the start or sees the new process.
    fn launch_from_worker(
        &self,
        spawn: impl FnOnce() -> Result<Option<Box<dyn RunningProcess>>>,
    ) -> Result<bool> {
        let mut state = lock(&self.state);
        if self.close_requested.load(Ordering::SeqCst) {
            return Ok(false);
        }
        let process = spawn()?;
        *lock(&self.process) = process;
        *state = Some(AppState::Running);
        Ok(true)
    }

    fn running(&self, process: Option<Box<dyn RunningProcess>>) {
        *lock(&self.process) = process;
        self.set_state(AppState::Running);
    }

    fn close(&self) -> Result<()> {
        let was_running = {
            let state = lock(&self.state);
            self.close_requested.store(true, Ordering::SeqCst);
            state.is_some_and(|state| state == AppState::Running)
        };
        let handle = lock(&self.process).take();
        let outcome = match handle {
            Some(mut handle) => handle.terminate(),
            None => Ok(()),
        };
        if was_running {
            self.set_state(AppState::Terminated);
        }
        outcome
    }
}

/// Fields every app variant shares.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AppBase {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub custom_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description_short: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub help_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub configuration: Option<Configuration>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub run_as_admin: bool,
}

impl AppBase {
    pub fn new(name: impl Into<String>, description_short: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            custom_name: String::new(),
            description_short: description_short.into(),
            help_url: None,
            configuration: None,
            run_as_admin: false,
        }
    }

    pub fn display_name(&self) -> &str {
        if self.custom_name.is_empty() {
            &self.name
        } else {
            &self.custom_name
        }
    }

    /// Fills an empty display name with the stable name.
    pub fn normalize_custom_name(&mut self) {
        if self.custom_name.trim().is_empty() {
            self.custom_name = self.name.clone();
        }
    }

    pub fn argument_value(&self, name: &str) -> Option<&str> {
        self.configuration
            .as_ref()?
            .find(name)?
            .value
            .as_deref()
            .filter(|value| !value.trim().is_empty())
    }

    fn arguments(
        &self,
        runtime: &IndexMap<String, String>,
        skip: &[&str],
        events: Option<&EventSink>,
    ) -> std::result::Result<Vec<String>, LaunchError> {
        let Some(configuration) = &self.configuration else {
            return Ok(Vec::new());
        };
        configuration
            .assemble(runtime, skip)
            .map_err(|err| match err {
                AssemblyError::MissingRequired { argument } => {
                    let label = configuration
                        .find(&argument)
                        .map(Argument::display_name)
                        .unwrap_or(&argument);
                    self.configuration_required(format!("{label} requires a value"), events)
                }
                other => LaunchError::Invalid {
                    app: self.name.clone(),
                    source: other,
                },
            })
    }

    fn configuration_required(&self, reason: String, events: Option<&EventSink>) -> LaunchError {
        if let Some(events) = events {
            events.emit(
                &self.name,
                AppEventKind::ConfigurationRequired {
                    reason: reason.clone(),
                },
            );
        }
        LaunchError::ConfigurationRequired {
            app: self.name.clone(),
            reason,
        }
    }

    /// Target of a local or open app after runtime overrides.
    fn target(
        &self,
        runtime: &IndexMap<String, String>,
        events: Option<&EventSink>,
    ) -> std::result::Result<String, LaunchError> {
        runtime
            .get(FILE_ARGUMENT)
            .map(String::as_str)
            .or_else(|| self.argument_value(FILE_ARGUMENT))
            .map(str::to_string)
            .ok_or_else(|| self.configuration_required("no file or url set".into(), events))
    }

    fn spawn_error(&self, err: anyhow::Error) -> LaunchError {
        LaunchError::Spawn {
            app: self.name.clone(),
            message: format!("{err:#}"),
        }
    }
}

/// Binary fetched from a release page and run in place.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AppDownloadable {
    #[serde(flatten)]
    pub base: AppBase,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub download_url: String,
    #[serde(default, skip_serializing_if = "is_false")]
    pub chmod: bool,
    /// Path of the binary inside an unpacked archive.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub executable: Option<String>,
    #[serde(skip)]
    runtime: Arc<AppRuntime>,
}

impl AppDownloadable {
    pub fn new(base: AppBase, download_url: impl Into<String>) -> Self {
        Self {
            base,
            download_url: download_url.into(),
            chmod: true,
            executable: None,
            runtime: Arc::default(),
        }
    }

    pub fn with_executable(mut self, executable: impl Into<String>) -> Self {
        self.executable = Some(executable.into());
        self
    }

    fn artifact_path(&self, services: &AppServices) -> PathBuf {
        services
            .app_dir(&self.base.name)
            .join(artifact_file_name(&self.download_url))
    }

    pub fn executable_path(&self, services: &AppServices) -> PathBuf {
        let dir = services.app_dir(&self.base.name);
        if let Some(executable) = self.executable.as_deref().filter(|e| !e.is_empty()) {
            return dir.join(executable);
        }
        let artifact = artifact_file_name(&self.download_url);
        let kind = ArtifactKind::from_file_name(&artifact);
        dir.join(kind.stem(&artifact))
    }

    pub fn state(&self) -> AppState {
        self.runtime.state(AppState::NotDownloaded)
    }

    fn refresh_state(&self, services: &AppServices) {
        if self.state().is_busy() || self.state() == AppState::Running {
            return;
        }
        let next = if self.executable_path(services).exists() {
            AppState::Downloaded
        } else {
            AppState::NotDownloaded
        };
        self.runtime.set_state(next);
    }

    fn command(
        &self,
        services: &AppServices,
        runtime: &IndexMap<String, String>,
        events: Option<&EventSink>,
    ) -> std::result::Result<CommandSpec, LaunchError> {
        let args = self.base.arguments(runtime, &[], events)?;
        Ok(CommandSpec::new(self.executable_path(services), args)
            .with_working_dir(services.app_dir(&self.base.name)))
    }

    fn options(&self) -> LaunchOptions {
        LaunchOptions {
            elevated: self.base.run_as_admin,
            service: false,
        }
    }

    pub fn run(
        &self,
        services: &AppServices,
        runtime: &IndexMap<String, String>,
    ) -> std::result::Result<(), LaunchError> {
        let state = self.state();
        if state.is_busy() {
            return Err(LaunchError::Busy {
                app: self.base.name.clone(),
                state: state.to_string(),
            });
        }
        if state == AppState::Running {
            return Ok(());
        }
        let command = self.command(services, runtime, Some(&services.events))?;
        if command.binary().exists() {
            let process = services
                .launcher
                .spawn(&command, self.options())
                .map_err(|err| self.base.spawn_error(err))?;
            self.runtime.running(Some(process));
            info!(app = %self.base.name, "App started");
            return Ok(());
        }

        if self.download_url.is_empty() {
            return Err(LaunchError::Unavailable {
                app: self.base.name.clone(),
                reason: "no download for this platform".into(),
            });
        }
        self.runtime
            .begin(AppState::NotDownloaded, AppState::Downloading)
            .map_err(|state| LaunchError::Busy {
                app: self.base.name.clone(),
                state: state.to_string(),
            })?;

        let job = FetchJob {
            app: self.base.name.clone(),
            url: self.download_url.clone(),
            artifact: self.artifact_path(services),
            app_dir: services.app_dir(&self.base.name),
            executable: command.binary().clone(),
            chmod: self.chmod,
        };
        let options = self.options();
        let runtime_state = Arc::clone(&self.runtime);
        let services = services.clone();
        let span = info_span!("app.download", app = %self.base.name);
        thread::spawn(move || {
            let _guard = span.enter();
            if let Err(err) = job.execute(&services) {
                warn!(error = %format!("{err:#}"), "Download failed");
                runtime_state.set_state(AppState::DownloadFailed);
                services.events.emit(
                    &job.app,
                    AppEventKind::DownloadFailed {
                        reason: format!("{err:#}"),
                    },
                );
                return;
            }
            runtime_state.set_state(AppState::Downloaded);
            services.events.emit(&job.app, AppEventKind::DownloadFinished);
            let started = runtime_state
                .launch_from_worker(|| services.launcher.spawn(&command, options).map(Some));
            report_worker_start(&services.events, &job.app, started, "download");
        });
        Ok(())
    }
}

/// Package fetched and executed as an installer before first use.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AppInstallable {
    #[serde(flatten)]
    pub base: AppBase,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub download_url: String,
    #[serde(default, skip_serializing_if = "is_false")]
    pub chmod: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub executable: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub default_path_executable: String,
    #[serde(default, skip_serializing_if = "is_false")]
    pub run_as_admin_install: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_service: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub starts_after_installation: bool,
    #[serde(skip)]
    runtime: Arc<AppRuntime>,
}

impl AppInstallable {
    pub fn new(
        base: AppBase,
        download_url: impl Into<String>,
        executable: impl Into<String>,
        default_path_executable: impl Into<String>,
    ) -> Self {
        Self {
            base,
            download_url: download_url.into(),
            chmod: true,
            executable: executable.into(),
            default_path_executable: default_path_executable.into(),
            run_as_admin_install: false,
            is_service: false,
            starts_after_installation: false,
            runtime: Arc::default(),
        }
    }

    fn installer_path(&self, services: &AppServices) -> PathBuf {
        services
            .app_dir(&self.base.name)
            .join(artifact_file_name(&self.download_url))
    }

    pub fn installed_executable(&self, services: &AppServices) -> PathBuf {
        let root = if self.default_path_executable.is_empty() {
            services.app_dir(&self.base.name)
        } else {
            PathBuf::from(&self.default_path_executable)
        };
        root.join(&self.executable)
    }

    pub fn state(&self) -> AppState {
        self.runtime.state(AppState::NotDownloaded)
    }

    fn refresh_state(&self, services: &AppServices) {
        if self.state().is_busy() || self.state() == AppState::Running {
            return;
        }
        let next = if !self.executable.is_empty() && self.installed_executable(services).exists() {
            AppState::Installed
        } else if self.installer_path(services).exists() {
            AppState::NotInstalled
        } else {
            AppState::NotDownloaded
        };
        self.runtime.set_state(next);
    }

    fn command(
        &self,
        services: &AppServices,
        runtime: &IndexMap<String, String>,
        events: Option<&EventSink>,
    ) -> std::result::Result<CommandSpec, LaunchError> {
        let args = self.base.arguments(runtime, &[], events)?;
        let executable = self.installed_executable(services);
        let mut command = CommandSpec::new(executable.clone(), args);
        if let Some(dir) = executable.parent() {
            command = command.with_working_dir(dir);
        }
        Ok(command)
    }

    fn options(&self) -> LaunchOptions {
        LaunchOptions {
            elevated: self.base.run_as_admin,
            service: self.is_service,
        }
    }

    pub fn run(
        &self,
        services: &AppServices,
        runtime: &IndexMap<String, String>,
    ) -> std::result::Result<(), LaunchError> {
        let state = self.state();
        if state.is_busy() {
            return Err(LaunchError::Busy {
                app: self.base.name.clone(),
                state: state.to_string(),
            });
        }
        if state == AppState::Running {
            return Ok(());
        }
        let command = self.command(services, runtime, Some(&services.events))?;
        if !self.executable.is_empty() && command.binary().exists() {
            let process = services
                .launcher
                .spawn(&command, self.options())
                .map_err(|err| self.base.spawn_error(err))?;
            self.runtime.running(Some(process));
            info!(app = %self.base.name, service = self.is_service, "App started");
            return Ok(());
        }

        let installer = self.installer_path(services);
        let needs_download = !installer.exists();
        if needs_download && self.download_url.is_empty() {
            return Err(LaunchError::Unavailable {
                app: self.base.name.clone(),
                reason: "no installer for this platform".into(),
            });
        }
        let busy_state = if needs_download {
            AppState::Downloading
        } else {
            AppState::Installing
        };
        self.runtime
            .begin(AppState::NotDownloaded, busy_state)
            .map_err(|state| LaunchError::Busy {
                app: self.base.name.clone(),
                state: state.to_string(),
            })?;

        let job = InstallJob {
            fetch: needs_download.then(|| FetchJob {
                app: self.base.name.clone(),
                url: self.download_url.clone(),
                artifact: installer.clone(),
                app_dir: services.app_dir(&self.base.name),
                executable: installer.clone(),
                chmod: self.chmod,
            }),
            app: self.base.name.clone(),
            installer: CommandSpec::new(installer, Vec::new())
                .with_working_dir(services.app_dir(&self.base.name)),
            install_options: LaunchOptions {
                elevated: self.run_as_admin_install,
                service: false,
            },
            command,
            options: self.options(),
            starts_after_installation: self.starts_after_installation,
        };
        let runtime_state = Arc::clone(&self.runtime);
        let services = services.clone();
        let span = info_span!("app.install", app = %self.base.name);
        thread::spawn(move || {
            let _guard = span.enter();
            job.execute(&runtime_state, &services);
        });
        Ok(())
    }
}

/// Program anywhere on the file system, chosen by the user.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AppLocal {
    #[serde(flatten)]
    pub base: AppBase,
    #[serde(skip)]
    runtime: Arc<AppRuntime>,
}

impl AppLocal {
    pub fn new(mut base: AppBase) -> Self {
        if base.configuration.is_none() {
            base.configuration = Some(Configuration::new(
                "",
                " ",
                vec![
                    Argument::new(FILE_ARGUMENT, "file")
                        .required()
                        .human(FILE_ARGUMENT),
                    Argument::new(EXTRA_ARGUMENTS, "string").human(EXTRA_ARGUMENTS),
                ],
            ));
        }
        Self {
            base,
            runtime: Arc::default(),
        }
    }

    pub fn state(&self) -> AppState {
        self.runtime.state(AppState::Runnable)
    }

    fn command(
        &self,
        runtime: &IndexMap<String, String>,
        events: Option<&EventSink>,
    ) -> std::result::Result<CommandSpec, LaunchError> {
        let target = PathBuf::from(self.base.target(runtime, events)?);
        let mut args = self
            .base
            .arguments(runtime, &[FILE_ARGUMENT, EXTRA_ARGUMENTS], events)?;
        let extra = runtime
            .get(EXTRA_ARGUMENTS)
            .map(String::as_str)
            .or_else(|| self.base.argument_value(EXTRA_ARGUMENTS));
        if let Some(extra) = extra {
            args.extend(extra.split_whitespace().map(str::to_string));
        }
        let mut command = CommandSpec::new(target.clone(), args);
        if let Some(dir) = target.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            command = command.with_working_dir(dir);
        }
        Ok(command)
    }

    pub fn run(
        &self,
        services: &AppServices,
        runtime: &IndexMap<String, String>,
    ) -> std::result::Result<(), LaunchError> {
        if self.state() == AppState::Running {
            return Ok(());
        }
        let command = self.command(runtime, Some(&services.events))?;
        let options = LaunchOptions {
            elevated: self.base.run_as_admin,
            service: false,
        };
        let process = services
            .launcher
            .spawn(&command, options)
            .map_err(|err| self.base.spawn_error(err))?;
        self.runtime.running(Some(process));
        info!(app = %self.base.name, "App started");
        Ok(())
    }
}

/// URL or file handed to the operating system's default handler.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AppOpen {
    #[serde(flatten)]
    pub base: AppBase,
    #[serde(skip)]
    runtime: Arc<AppRuntime>,
}

impl AppOpen {
    pub fn new(mut base: AppBase, default_value: Option<&str>) -> Self {
        if base.configuration.is_none() {
            let mut file = Argument::new(FILE_ARGUMENT, "file")
                .required()
                .human("file/url");
            file.value = default_value.map(str::to_string);
            base.configuration = Some(Configuration::new("", " ", vec![file]));
        }
        Self {
            base,
            runtime: Arc::default(),
        }
    }

    pub fn state(&self) -> AppState {
        self.runtime.state(AppState::Runnable)
    }

    pub fn run(
        &self,
        services: &AppServices,
        runtime: &IndexMap<String, String>,
    ) -> std::result::Result<(), LaunchError> {
        let target = self.base.target(runtime, Some(&services.events))?;
        services
            .launcher
            .open(&target)
            .map_err(|err| self.base.spawn_error(err))?;
        self.runtime.running(None);
        Ok(())
    }
}

/// Any app the manager knows about.
#[derive(Debug)]
pub enum AppVariant {
    Downloadable(AppDownloadable),
    Installable(AppInstallable),
    Local(AppLocal),
    Open(AppOpen),
}

impl AppVariant {
    pub fn base(&self) -> &AppBase {
        match self {
            AppVariant::Downloadable(app) => &app.base,
            AppVariant::Installable(app) => &app.base,
            AppVariant::Local(app) => &app.base,
            AppVariant::Open(app) => &app.base,
        }
    }

    pub fn base_mut(&mut self) -> &mut AppBase {
        match self {
            AppVariant::Downloadable(app) => &mut app.base,
            AppVariant::Installable(app) => &mut app.base,
            AppVariant::Local(app) => &mut app.base,
            AppVariant::Open(app) => &mut app.base,
        }
    }

    fn runtime(&self) -> &AppRuntime {
        match self {
            AppVariant::Downloadable(app) => &app.runtime,
            AppVariant::Installable(app) => &app.runtime,
            AppVariant::Local(app) => &app.runtime,
            AppVariant::Open(app) => &app.runtime,
        }
    }

    pub fn name(&self) -> &str {
        &self.base().name
    }

    pub fn display_name(&self) -> &str {
        self.base().display_name()
    }

    pub fn kind(&self) -> AppKind {
        match self {
            AppVariant::Downloadable(_) => AppKind::Downloadable,
            AppVariant::Installable(_) => AppKind::Installable,
            AppVariant::Local(_) => AppKind::Local,
            AppVariant::Open(_) => AppKind::Open,
        }
    }

    pub fn is_configurable(&self) -> bool {
        self.base().configuration.is_some()
    }

    pub fn is_installable(&self) -> bool {
        matches!(self, AppVariant::Installable(_))
    }

    pub fn state(&self) -> AppState {
        match self {
            AppVariant::Downloadable(app) => app.state(),
            AppVariant::Installable(app) => app.state(),
            AppVariant::Local(app) => app.state(),
            AppVariant::Open(app) => app.state(),
        }
    }

    /// Derives the initial state from what is present on disk.
    pub fn refresh_state(&self, services: &AppServices) {
        match self {
            AppVariant::Downloadable(app) => app.refresh_state(services),
            AppVariant::Installable(app) => app.refresh_state(services),
            AppVariant::Local(_) | AppVariant::Open(_) => {}
        }
    }

    pub fn run(
        &self,
        services: &AppServices,
        runtime: &IndexMap<String, String>,
    ) -> std::result::Result<(), LaunchError> {
        match self {
            AppVariant::Downloadable(app) => app.run(services, runtime),
            AppVariant::Installable(app) => app.run(services, runtime),
            AppVariant::Local(app) => app.run(services, runtime),
            AppVariant::Open(app) => app.run(services, runtime),
        }
    }

    /// Stops a process started by [`AppVariant::run`]. Idle apps are left alone.
    pub fn close(&self) -> Result<()> {
        self.runtime()
            .close()
            .with_context(|| format!("Failed to close {}", self.name()))
    }

    /// Renders what `run` would launch without emitting events.
    pub fn describe_launch(
        &self,
        services: &AppServices,
        runtime: &IndexMap<String, String>,
    ) -> std::result::Result<String, LaunchError> {
        let command = match self {
            AppVariant::Downloadable(app) => app.command(services, runtime, None)?,
            AppVariant::Installable(app) => app.command(services, runtime, None)?,
            AppVariant::Local(app) => app.command(runtime, None)?,
            AppVariant::Open(app) => return Ok(format!("open {}", app.base.target(runtime, None)?)),
        };
        Ok(command.describe())
    }
}

struct FetchJob {
    app: String,
    url: String,
    artifact: PathBuf,
    app_dir: PathBuf,
    executable: PathBuf,
    chmod: bool,
}

impl FetchJob {
    fn execute(&self, services: &AppServices) -> Result<()> {
        services.events.emit(&self.app, AppEventKind::DownloadStarted);
        let events = services.events.clone();
        let app = self.app.clone();
        let mut report = move |transferred: u64, total: Option<u64>| {
            events.emit(&app, AppEventKind::DownloadProgressed { transferred, total });
        };
        services
            .downloader
            .fetch(&self.url, &self.artifact, &mut report)?;

        let file_name = artifact_file_name(&self.url);
        let kind = ArtifactKind::from_file_name(&file_name);
        if kind.is_archive() {
            download::unpack(&self.artifact, kind, &self.app_dir)?;
            if let Err(err) = fs::remove_file(&self.artifact) {
                warn!(path = %self.artifact.display(), error = %err, "Failed to remove archive");
            }
        }
        if self.chmod {
            make_executable_if_present(&self.executable)?;
        }
        Ok(())
    }
}

fn report_worker_start(events: &EventSink, app: &str, started: Result<bool>, after: &str) {
    match started {
        Ok(true) => info!(after, "App started"),
        Ok(false) => info!(after, "App was closed before it could start"),
        Err(err) => {
            let reason = format!("{err:#}");
            warn!(after, error = %reason, "Start failed");
            events.emit(app, AppEventKind::StartFailed { reason });
        }
    }
}

fn make_executable_if_present(path: &Path) -> Result<()> {
    if path.exists() {
        download::make_executable(path)?;
    }
    Ok(())
}

struct InstallJob {
    fetch: Option<FetchJob>,
    app: String,
    installer: CommandSpec,
    install_options: LaunchOptions,
    command: CommandSpec,
    options: LaunchOptions,
    starts_after_installation: bool,
}

impl InstallJob {
    fn execute(self, runtime: &AppRuntime, services: &AppServices) {
        if let Some(fetch) = &self.fetch {
            if let Err(err) = fetch.execute(services) {
                warn!(error = %format!("{err:#}"), "Installer download failed");
                runtime.set_state(AppState::DownloadFailed);
                services.events.emit(
                    &self.app,
                    AppEventKind::DownloadFailed {
                        reason: format!("{err:#}"),
                    },
                );
                return;
            }
            services.events.emit(&self.app, AppEventKind::DownloadFinished);
            runtime.set_state(AppState::NotInstalled);
        }

        runtime.set_state(AppState::Installing);
        services.events.emit(&self.app, AppEventKind::InstallStarted);
        if let Err(err) = services
            .launcher
            .run_to_completion(&self.installer, self.install_options)
        {
            warn!(error = %format!("{err:#}"), "Installation failed");
            runtime.set_state(AppState::InstallFailed);
            services.events.emit(
                &self.app,
                AppEventKind::InstallFailed {
                    reason: format!("{err:#}"),
                },
            );
            return;
        }
        runtime.set_state(AppState::Installed);
        services.events.emit(&self.app, AppEventKind::InstallFinished);

        let started = if self.starts_after_installation {
            runtime.launch_from_worker(|| Ok(None))
        } else {
            runtime.launch_from_worker(|| {
                services
                    .launcher
                    .spawn(&self.command, self.options)
                    .map(Some)
            })
        };
        report_worker_start(&services.events, &self.app, started, "installation");
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::mpsc::Receiver;
    use std::time::Duration;

    use crate::events::AppEvent;
    use tempfile::tempdir;

    #[derive(Default)]
    pub(crate) struct LauncherLog {
        pub spawned: Vec<CommandSpec>,
        pub installed: Vec<CommandSpec>,
        pub opened: Vec<String>,
        pub closed: Vec<PathBuf>,
    }

    /// Records every launch; binaries listed in `fail_spawn` fail to start and
    /// processes of binaries in `fail_close` fail to terminate.
    #[derive(Default)]
    pub(crate) struct RecordingLauncher {
        pub log: Arc<Mutex<LauncherLog>>,
        pub fail_spawn: Vec<PathBuf>,
        pub fail_close: Vec<PathBuf>,
        pub fail_install: bool,
    }

    struct RecordedProcess {
        binary: PathBuf,
        fail_close: bool,
        log: Arc<Mutex<LauncherLog>>,
    }

    impl RunningProcess for RecordedProcess {
        fn id(&self) -> Option<u32> {
            None
        }

        fn has_exited(&mut self) -> bool {
            false
        }

        fn terminate(&mut self) -> Result<()> {
            self.log.lock().unwrap().closed.push(self.binary.clone());
            if self.fail_close {
                anyhow::bail!("refused to exit");
            }
            Ok(())
        }
    }

    impl ProcessLauncher for RecordingLauncher {
        fn spawn(
            &self,
            command: &CommandSpec,
            _options: LaunchOptions,
        ) -> Result<Box<dyn RunningProcess>> {
            if self.fail_spawn.contains(command.binary()) {
                anyhow::bail!("spawn refused");
            }
            self.log.lock().unwrap().spawned.push(command.clone());
            Ok(Box::new(RecordedProcess {
                binary: command.binary().clone(),
                fail_close: self.fail_close.contains(command.binary()),
                log: Arc::clone(&self.log),
            }))
        }

        fn run_to_completion(&self, command: &CommandSpec, _options: LaunchOptions) -> Result<()> {
            self.log.lock().unwrap().installed.push(command.clone());
            if self.fail_install {
                anyhow::bail!("installer exited with 1");
            }
            Ok(())
        }

        fn open(&self, target: &str) -> Result<()> {
            self.log.lock().unwrap().opened.push(target.to_string());
            Ok(())
        }
    }

    /// Writes a fixed payload; URLs containing "broken" fail.
    pub(crate) struct StubDownloader {
        pub payload: Vec<u8>,
    }

    impl Downloader for StubDownloader {
        fn fetch(
            &self,
            url: &str,
            destination: &Path,
            progress: &mut dyn FnMut(u64, Option<u64>),
        ) -> Result<u64> {
            if url.contains("broken") {
                anyhow::bail!("404 for {url}");
            }
            fs::create_dir_all(destination.parent().unwrap())?;
            fs::write(destination, &self.payload)?;
            let size = self.payload.len() as u64;
            progress(size, Some(size));
            Ok(size)
        }
    }

    /// Blocks every fetch until the test sends on the paired channel.
    struct GatedDownloader {
        gate: Mutex<Receiver<()>>,
    }

    impl Downloader for GatedDownloader {
        fn fetch(
            &self,
            _url: &str,
            destination: &Path,
            progress: &mut dyn FnMut(u64, Option<u64>),
        ) -> Result<u64> {
            self.gate.lock().unwrap().recv()?;
            fs::create_dir_all(destination.parent().unwrap())?;
            fs::write(destination, b"binary")?;
            progress(6, Some(6));
            Ok(6)
        }
    }

    pub(crate) fn services(
        apps_dir: &Path,
        launcher: RecordingLauncher,
    ) -> (AppServices, Receiver<AppEvent>) {
        let (events, receiver) = EventSink::channel();
        (
            AppServices {
                apps_dir: apps_dir.to_path_buf(),
                launcher: Arc::new(launcher),
                downloader: Arc::new(StubDownloader {
                    payload: b"binary".to_vec(),
                }),
                events,
            },
            receiver,
        )
    }

    fn wait_for(receiver: &Receiver<AppEvent>, wanted: impl Fn(&AppEventKind) -> bool) -> Vec<AppEventKind> {
        let mut seen = Vec::new();
        loop {
            let event = receiver
                .recv_timeout(Duration::from_secs(5))
                .expect("event within timeout");
            let done = wanted(&event.kind);
            seen.push(event.kind);
            if done {
                return seen;
            }
        }
    }

    fn wait_until(app: &AppVariant, state: AppState) {
        for _ in 0..500 {
            if app.state() == state {
                return;
            }
            thread::sleep(Duration::from_millis(10));
        }
        panic!("{} never reached {state}", app.name());
    }

    fn caller(url: &str) -> AppDownloadable {
        let mut base = AppBase::new("autodarts-caller", "Calls out thrown points");
        base.configuration = Some(Configuration::new(
            "-",
            " ",
            vec![Argument::new("U", "string").required().with_value("me@example.com")],
        ));
        AppDownloadable::new(base, url)
    }

    #[test]
    fn downloadable_downloads_then_starts() {
        let dir = tempdir().unwrap();
        let launcher = RecordingLauncher::default();
        let log = Arc::clone(&launcher.log);
        let (services, receiver) = services(dir.path(), launcher);
        let app = AppVariant::Downloadable(caller(
            "https://example.com/v2.8.2/autodarts-caller",
        ));
        app.refresh_state(&services);
        assert_eq!(app.state(), AppState::NotDownloaded);

        app.run(&services, &IndexMap::new()).unwrap();
        let events = wait_for(&receiver, |kind| *kind == AppEventKind::DownloadFinished);
        assert_eq!(events.first(), Some(&AppEventKind::DownloadStarted));
        assert!(events
            .iter()
            .any(|kind| matches!(kind, AppEventKind::DownloadProgressed { .. })));
        wait_until(&app, AppState::Running);

        let executable = dir.path().join("autodarts-caller/autodarts-caller");
        assert!(executable.exists());
        let spawned = log.lock().unwrap().spawned.clone();
        assert_eq!(spawned.len(), 1);
        assert_eq!(spawned[0].binary(), &executable);
        assert_eq!(spawned[0].args(), ["-U", "me@example.com"]);

        app.close().unwrap();
        assert_eq!(app.state(), AppState::Terminated);
    }

    #[test]
    fn start_failure_after_download_is_reported() {
        let dir = tempdir().unwrap();
        let launcher = RecordingLauncher {
            fail_spawn: vec![dir.path().join("autodarts-caller/autodarts-caller")],
            ..RecordingLauncher::default()
        };
        let (services, receiver) = services(dir.path(), launcher);
        let app = AppVariant::Downloadable(caller(
            "https://example.com/v2.8.2/autodarts-caller",
        ));
        app.run(&services, &IndexMap::new()).unwrap();
        let events = wait_for(&receiver, AppEventKind::is_failure);
        assert!(events.contains(&AppEventKind::DownloadFinished));
        assert!(matches!(
            events.last(),
            Some(AppEventKind::StartFailed { .. })
        ));
        assert_eq!(app.state(), AppState::Downloaded);
    }

    #[test]
    fn closing_during_download_prevents_the_start() {
        let dir = tempdir().unwrap();
        let launcher = RecordingLauncher::default();
        let log = Arc::clone(&launcher.log);
        let (mut services, receiver) = services(dir.path(), launcher);
        let (release, gate) = std::sync::mpsc::channel();
        services.downloader = Arc::new(GatedDownloader {
            gate: Mutex::new(gate),
        });
        let app = AppVariant::Downloadable(caller(
            "https://example.com/v2.8.2/autodarts-caller",
        ));
        app.run(&services, &IndexMap::new()).unwrap();
        wait_for(&receiver, |kind| *kind == AppEventKind::DownloadStarted);
        app.close().unwrap();
        assert_eq!(app.state(), AppState::Downloading);

        release.send(()).unwrap();
        wait_for(&receiver, |kind| *kind == AppEventKind::DownloadFinished);
        thread::sleep(Duration::from_millis(100));
        assert_eq!(app.state(), AppState::Downloaded);
        assert!(log.lock().unwrap().spawned.is_empty());

        app.run(&services, &IndexMap::new()).unwrap();
        assert_eq!(app.state(), AppState::Running);
        assert_eq!(log.lock().unwrap().spawned.len(), 1);
    }

    #[test]
    fn failed_download_is_reported_and_retryable() {
        let dir = tempdir().unwrap();
        let (services, receiver) = services(dir.path(), RecordingLauncher::default());
        let app = AppVariant::Downloadable(caller("https://example.com/broken/autodarts-caller"));
        app.run(&services, &IndexMap::new()).unwrap();
        let events = wait_for(&receiver, AppEventKind::is_failure);
        assert!(matches!(
            events.last(),
            Some(AppEventKind::DownloadFailed { .. })
        ));
        wait_until(&app, AppState::DownloadFailed);

        app.run(&services, &IndexMap::new()).unwrap();
        wait_for(&receiver, AppEventKind::is_failure);
        wait_until(&app, AppState::DownloadFailed);
    }

    #[test]
    fn missing_required_value_raises_configuration_required() {
        let dir = tempdir().unwrap();
        let (services, receiver) = services(dir.path(), RecordingLauncher::default());
        let mut downloadable = caller("https://example.com/autodarts-caller");
        downloadable
            .base
            .configuration
            .as_mut()
            .unwrap()
            .find_mut("U")
            .unwrap()
            .value = None;
        let app = AppVariant::Downloadable(downloadable);
        let err = app.run(&services, &IndexMap::new()).unwrap_err();
        assert!(matches!(err, LaunchError::ConfigurationRequired { .. }));
        let event = receiver.try_recv().unwrap();
        assert!(matches!(
            event.kind,
            AppEventKind::ConfigurationRequired { .. }
        ));
        assert_eq!(app.state(), AppState::NotDownloaded);
    }

    #[test]
    fn installable_installs_then_launches_as_service() {
        let dir = tempdir().unwrap();
        let launcher = RecordingLauncher::default();
        let log = Arc::clone(&launcher.log);
        let (services, receiver) = services(dir.path(), launcher);
        let mut epoc = AppInstallable::new(
            AppBase::new("epoc-cam", "Connects to your iOS phone- or tablet-camera"),
            "https://example.com/EpocCam_Installer64_3_4_0.exe",
            "EpocCamService.exe",
            "",
        );
        epoc.is_service = true;
        let app = AppVariant::Installable(epoc);
        app.run(&services, &IndexMap::new()).unwrap();

        let events = wait_for(&receiver, |kind| *kind == AppEventKind::InstallFinished);
        assert_eq!(
            events
                .iter()
                .filter(|kind| !matches!(kind, AppEventKind::DownloadProgressed { .. }))
                .cloned()
                .collect::<Vec<_>>(),
            vec![
                AppEventKind::DownloadStarted,
                AppEventKind::DownloadFinished,
                AppEventKind::InstallStarted,
                AppEventKind::InstallFinished,
            ]
        );
        wait_until(&app, AppState::Running);
        let log = log.lock().unwrap();
        assert_eq!(
            log.installed[0].binary(),
            &dir.path().join("epoc-cam/EpocCam_Installer64_3_4_0.exe")
        );
        assert_eq!(
            log.spawned[0].binary(),
            &dir.path().join("epoc-cam/EpocCamService.exe")
        );
    }

    #[test]
    fn start_failure_after_installation_is_reported() {
        let dir = tempdir().unwrap();
        let launcher = RecordingLauncher {
            fail_spawn: vec![dir.path().join("epoc-cam/EpocCamService.exe")],
            ..RecordingLauncher::default()
        };
        let (services, receiver) = services(dir.path(), launcher);
        let app = AppVariant::Installable(AppInstallable::new(
            AppBase::new("epoc-cam", "Connects to your iOS phone- or tablet-camera"),
            "https://example.com/EpocCam_Installer64_3_4_0.exe",
            "EpocCamService.exe",
            "",
        ));
        app.run(&services, &IndexMap::new()).unwrap();
        let events = wait_for(&receiver, AppEventKind::is_failure);
        assert!(events.contains(&AppEventKind::InstallFinished));
        assert!(matches!(
            events.last(),
            Some(AppEventKind::StartFailed { .. })
        ));
        assert_eq!(app.state(), AppState::Installed);
    }

    #[test]
    fn install_failure_leaves_app_retryable() {
        let dir = tempdir().unwrap();
        let launcher = RecordingLauncher {
            fail_install: true,
            ..RecordingLauncher::default()
        };
        let (services, receiver) = services(dir.path(), launcher);
        let mut droid = AppInstallable::new(
            AppBase::new("droid-cam", "Connects to your android phone- or tablet-camera"),
            "https://example.com/DroidCam.Setup.6.5.2.exe",
            "DroidCamApp.exe",
            "",
        );
        droid.starts_after_installation = true;
        let app = AppVariant::Installable(droid);
        app.run(&services, &IndexMap::new()).unwrap();
        wait_for(&receiver, AppEventKind::is_failure);
        wait_until(&app, AppState::InstallFailed);

        app.refresh_state(&services);
        assert_eq!(app.state(), AppState::NotInstalled);
    }

    #[test]
    fn starts_after_installation_skips_launch() {
        let dir = tempdir().unwrap();
        let launcher = RecordingLauncher::default();
        let log = Arc::clone(&launcher.log);
        let (services, receiver) = services(dir.path(), launcher);
        let mut client = AppInstallable::new(
            AppBase::new("dartboards-client", "Connects webcam to dartboards.online"),
            "https://example.com/dboclient_0.9.2.exe",
            "dartboardsonlineclient.exe",
            "",
        );
        client.starts_after_installation = true;
        let app = AppVariant::Installable(client);
        app.run(&services, &IndexMap::new()).unwrap();
        wait_for(&receiver, |kind| *kind == AppEventKind::InstallFinished);
        wait_until(&app, AppState::Running);
        assert!(log.lock().unwrap().spawned.is_empty());
    }

    #[test]
    fn local_app_needs_a_file() {
        let dir = tempdir().unwrap();
        let launcher = RecordingLauncher::default();
        let log = Arc::clone(&launcher.log);
        let (services, _receiver) = services(dir.path(), launcher);
        let mut local = AppLocal::new(AppBase::new("custom-1", "Starts a program on your file-system"));
        let app_err = AppVariant::Local(AppLocal::new(AppBase::new("custom-2", "")))
            .run(&services, &IndexMap::new())
            .unwrap_err();
        assert!(matches!(app_err, LaunchError::ConfigurationRequired { .. }));

        let configuration = local.base.configuration.as_mut().unwrap();
        configuration.find_mut(FILE_ARGUMENT).unwrap().value = Some("/opt/tools/obs".into());
        configuration.find_mut(EXTRA_ARGUMENTS).unwrap().value =
            Some("--startreplaybuffer --minimize-to-tray".into());
        let app = AppVariant::Local(local);
        app.run(&services, &IndexMap::new()).unwrap();
        assert_eq!(app.state(), AppState::Running);
        let spawned = log.lock().unwrap().spawned.clone();
        assert_eq!(spawned[0].binary(), &PathBuf::from("/opt/tools/obs"));
        assert_eq!(
            spawned[0].args(),
            ["--startreplaybuffer", "--minimize-to-tray"]
        );
    }

    #[test]
    fn open_app_hands_target_to_the_opener() {
        let dir = tempdir().unwrap();
        let launcher = RecordingLauncher::default();
        let log = Arc::clone(&launcher.log);
        let (services, _receiver) = services(dir.path(), launcher);
        let app = AppVariant::Open(AppOpen::new(
            AppBase::new("autodarts.io", "Opens a file or url"),
            Some("https://play.autodarts.io"),
        ));
        assert_eq!(app.state(), AppState::Runnable);
        app.run(&services, &IndexMap::new()).unwrap();
        assert_eq!(log.lock().unwrap().opened, vec!["https://play.autodarts.io"]);
        app.close().unwrap();
        assert_eq!(app.state(), AppState::Terminated);
    }

    #[test]
    fn archive_downloads_are_unpacked_before_launch() {
        use std::io::Write;

        let dir = tempdir().unwrap();
        let mut archive = Vec::new();
        {
            let mut writer = zip::ZipWriter::new(std::io::Cursor::new(&mut archive));
            writer
                .start_file("cam-loader.exe", zip::write::FileOptions::default())
                .unwrap();
            writer.write_all(b"MZ").unwrap();
            writer.finish().unwrap();
        }
        let launcher = RecordingLauncher::default();
        let log = Arc::clone(&launcher.log);
        let (mut services, receiver) = services(dir.path(), launcher);
        services.downloader = Arc::new(StubDownloader { payload: archive });
        let app = AppVariant::Downloadable(
            AppDownloadable::new(
                AppBase::new("cam-loader", "Saves and loads settings for multiple cameras"),
                "https://example.com/v1.0.0/cam-loader.zip",
            )
            .with_executable("cam-loader.exe"),
        );
        app.run(&services, &IndexMap::new()).unwrap();
        wait_for(&receiver, |kind| *kind == AppEventKind::DownloadFinished);
        wait_until(&app, AppState::Running);
        let executable = dir.path().join("cam-loader/cam-loader.exe");
        assert_eq!(fs::read(&executable).unwrap(), b"MZ");
        assert!(!dir.path().join("cam-loader/cam-loader.zip").exists());
        assert_eq!(log.lock().unwrap().spawned[0].binary(), &executable);
    }

    #[test]
    fn persisted_shape_uses_pascal_case_and_omits_defaults() {
        let app = caller("https://example.com/autodarts-caller");
        let json = serde_json::to_value(&app).unwrap();
        assert_eq!(json["Name"], "autodarts-caller");
        assert_eq!(json["DownloadUrl"], "https://example.com/autodarts-caller");
        assert_eq!(json["Chmod"], true);
        assert!(json.get("CustomName").is_none());
        assert!(json.get("RunAsAdmin").is_none());
        assert_eq!(json["Configuration"]["Delimitter"], " ");

        let parsed: AppDownloadable = serde_json::from_value(json).unwrap();
        assert_eq!(parsed.base, app.base);
        assert_eq!(parsed.state(), AppState::NotDownloaded);
    }
}
