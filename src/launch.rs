use std::{
    io,
    path::{Path, PathBuf},
    process::{Child, Command, Stdio},
};

use anyhow::{Context, Result, bail};
use tracing::{debug, info, warn};

use crate::download_map::{OsKind, Platform};

/// Materialised command specification ready to be spawned or logged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    binary: PathBuf,
    args: Vec<String>,
    env: Vec<(String, String)>,
    working_dir: Option<PathBuf>,
}

impl CommandSpec {
    pub fn new(binary: PathBuf, args: Vec<String>) -> Self {
        Self {
            binary,
            args,
            env: Vec::new(),
            working_dir: None,
        }
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn binary(&self) -> &PathBuf {
        &self.binary
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn env(&self) -> &[(String, String)] {
        &self.env
    }

    pub fn working_dir(&self) -> Option<&Path> {
        self.working_dir.as_deref()
    }

    pub fn to_command(&self) -> Command {
        let mut command = Command::new(&self.binary);
        command.args(&self.args);
        for (key, value) in &self.env {
            command.env(key, value);
        }
        if let Some(dir) = &self.working_dir {
            command.current_dir(dir);
        }
        command
    }

    pub fn describe(&self) -> String {
        if self.args.is_empty() {
            return self.binary.display().to_string();
        }
        let args = crate::configuration::render_tokens(&self.args);
        format!("{} {}", self.binary.display(), args)
    }
}

/// How a command should be started.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LaunchOptions {
    pub elevated: bool,
    /// Detach from the launcher instead of running in the foreground.
    pub service: bool,
}

/// Handle to a process started through a [`ProcessLauncher`].
pub trait RunningProcess: Send {
    fn id(&self) -> Option<u32>;
    fn has_exited(&mut self) -> bool;
    fn terminate(&mut self) -> Result<()>;
}

/// Seam between app lifecycles and the operating system.
pub trait ProcessLauncher: Send + Sync {
    fn spawn(&self, command: &CommandSpec, options: LaunchOptions)
    -> Result<Box<dyn RunningProcess>>;

    /// Runs to completion, failing on a non-zero exit status.
    fn run_to_completion(&self, command: &CommandSpec, options: LaunchOptions) -> Result<()>;

    /// Hands a URL or file path to the platform opener.
    fn open(&self, target: &str) -> Result<()>;
}

struct ChildProcess {
    child: Child,
}

impl RunningProcess for ChildProcess {
    fn id(&self) -> Option<u32> {
        Some(self.child.id())
    }

    fn has_exited(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(Some(_)))
    }

    fn terminate(&mut self) -> Result<()> {
        if self.has_exited() {
            return Ok(());
        }
        match self.child.kill() {
            Ok(()) => {}
            Err(err) if err.kind() == io::ErrorKind::InvalidInput => return Ok(()),
            Err(err) => return Err(err).context("Failed to terminate process"),
        }
        self.child.wait().context("Failed to reap terminated process")?;
        Ok(())
    }
}

/// [`ProcessLauncher`] backed by `std::process`.
#[derive(Debug, Clone)]
pub struct SystemLauncher {
    platform: Platform,
}

impl SystemLauncher {
    pub fn new(platform: Platform) -> Self {
        Self { platform }
    }

    fn prepare(&self, spec: &CommandSpec, options: LaunchOptions) -> Command {
        let mut command = if options.elevated {
            self.elevated_command(spec)
        } else {
            spec.to_command()
        };
        if options.service {
            command
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null());
        }
        command
    }

    fn elevated_command(&self, spec: &CommandSpec) -> Command {
        match self.platform.os {
            OsKind::Windows => {
                let quoted: Vec<String> = spec
                    .args()
                    .iter()
                    .map(|arg| format!("'{}'", arg.replace('\'', "''")))
                    .collect();
                let mut script = format!(
                    "Start-Process -FilePath '{}' -Verb RunAs -Wait",
                    spec.binary().display()
                );
                if !quoted.is_empty() {
                    script.push_str(&format!(" -ArgumentList {}", quoted.join(",")));
                }
                let mut command = Command::new("powershell");
                command.args(["-NoProfile", "-Command", &script]);
                if let Some(dir) = spec.working_dir() {
                    command.current_dir(dir);
                }
                command
            }
            _ => match which::which("pkexec") {
                Ok(pkexec) => {
                    let mut command = Command::new(pkexec);
                    command.arg(spec.binary()).args(spec.args());
                    for (key, value) in spec.env() {
                        command.env(key, value);
                    }
                    if let Some(dir) = spec.working_dir() {
                        command.current_dir(dir);
                    }
                    command
                }
                Err(_) => {
                    warn!(
                        binary = %spec.binary().display(),
                        "pkexec not found; starting without elevation"
                    );
                    spec.to_command()
                }
            },
        }
    }

    fn opener(&self, target: &str) -> Result<Command> {
        let command = match self.platform.os {
            OsKind::Windows => {
                let mut command = Command::new("cmd");
                command.args(["/C", "start", "", target]);
                command
            }
            OsKind::Mac => {
                let mut command = Command::new("open");
                command.arg(target);
                command
            }
            _ => {
                let binary = which::which("xdg-open")
                    .context("xdg-open is required to open files and urls")?;
                let mut command = Command::new(binary);
                command.arg(target);
                command
            }
        };
        Ok(command)
    }
}

impl ProcessLauncher for SystemLauncher {
    fn spawn(
        &self,
        spec: &CommandSpec,
        options: LaunchOptions,
    ) -> Result<Box<dyn RunningProcess>> {
        let child = self
            .prepare(spec, options)
            .spawn()
            .with_context(|| format!("Failed to spawn {}", spec.binary().display()))?;
        info!(
            pid = child.id(),
            command = %spec.describe(),
            elevated = options.elevated,
            service = options.service,
            "Started process"
        );
        Ok(Box::new(ChildProcess { child }))
    }

    fn run_to_completion(&self, spec: &CommandSpec, options: LaunchOptions) -> Result<()> {
        debug!(command = %spec.describe(), "Running to completion");
        let status = self
            .prepare(spec, options)
            .status()
            .with_context(|| format!("Failed to run {}", spec.binary().display()))?;
        if !status.success() {
            bail!("{} exited with {}", spec.binary().display(), status);
        }
        Ok(())
    }

    fn open(&self, target: &str) -> Result<()> {
        let mut command = self.opener(target)?;
        command
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        command
            .spawn()
            .with_context(|| format!("Failed to open {target}"))?;
        info!(target, "Opened target");
        Ok(())
    }
}
