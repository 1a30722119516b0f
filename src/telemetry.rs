use std::cmp::Reverse;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use anyhow::{Context, Result};
use chrono::Utc;
use once_cell::sync::OnceCell;
use tracing::{Subscriber, debug, subscriber};
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt};

use crate::config::TraceSettings;

const TRACE_SUFFIX: &str = ".trace.jsonl";

static TRACE_GUARD: OnceCell<WorkerGuard> = OnceCell::new();
static ACTIVE_TRACE_FILE: OnceCell<PathBuf> = OnceCell::new();
static TRACING_INITIALIZED: OnceCell<()> = OnceCell::new();

fn install_subscriber<S>(subscriber: S) -> Result<()>
where
    S: Subscriber + Send + Sync + 'static,
{
    if TRACING_INITIALIZED.get().is_some() {
        return Ok(());
    }

    subscriber::set_global_default(subscriber)?;
    let _ = TRACING_INITIALIZED.set(());
    Ok(())
}

/// Install tracing subscriber with optional JSON trace export.
pub fn init_tracing(verbose: bool, traces: &TraceSettings) -> Result<()> {
    let default_level = if verbose {
        "dartdeck=debug"
    } else {
        "dartdeck=info"
    };
    let make_env_filter =
        || EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    match build_trace_file_layer(traces)? {
        Some((writer, guard, path)) => {
            let subscriber = tracing_subscriber::registry()
                .with(make_env_filter())
                .with(fmt::layer().with_target(false))
                .with(
                    fmt::layer()
                        .json()
                        .with_current_span(true)
                        .with_span_list(true)
                        .with_file(true)
                        .with_line_number(true)
                        .with_target(true)
                        .with_writer(writer)
                        .with_filter(LevelFilter::TRACE),
                );
            let _ = TRACE_GUARD.set(guard);
            let _ = ACTIVE_TRACE_FILE.set(path);
            install_subscriber(subscriber)?;
        }
        None => {
            let subscriber = tracing_subscriber::registry()
                .with(make_env_filter())
                .with(fmt::layer().with_target(false));
            install_subscriber(subscriber)?;
        }
    }

    Ok(())
}

/// Trace file written by this process, if export is enabled.
pub fn current_trace_file() -> Option<&'static PathBuf> {
    ACTIVE_TRACE_FILE.get()
}

fn build_trace_file_layer(
    settings: &TraceSettings,
) -> Result<Option<(NonBlocking, WorkerGuard, PathBuf)>> {
    if !settings.enabled {
        return Ok(None);
    }

    let traces = TraceDir::new(settings.resolve_directory()?, settings.file_prefix());
    let (file, path) = traces.create()?;
    traces.prune(settings.max_files, &path)?;

    let (writer, guard) = tracing_appender::non_blocking(file);
    Ok(Some((writer, guard, path)))
}

/// Directory of `{prefix}-{timestamp}.trace.jsonl` files written by this crate.
struct TraceDir {
    directory: PathBuf,
    prefix: String,
}

impl TraceDir {
    fn new(directory: PathBuf, prefix: &str) -> Self {
        Self {
            directory,
            prefix: prefix.to_string(),
        }
    }

    fn owns(&self, name: &str) -> bool {
        name.strip_prefix(&self.prefix)
            .is_some_and(|rest| rest.starts_with('-') && rest.ends_with(TRACE_SUFFIX))
    }

    /// Opens a fresh trace file; a counter keeps same-second runs apart.
    fn create(&self) -> Result<(fs::File, PathBuf)> {
        fs::create_dir_all(&self.directory).with_context(|| {
            format!("Failed to create trace directory {}", self.directory.display())
        })?;
        let stamp = Utc::now().format("%Y%m%dT%H%M%SZ").to_string();
        let path = (0..)
            .map(|attempt: u32| match attempt {
                0 => format!("{}-{stamp}{TRACE_SUFFIX}", self.prefix),
                n => format!("{}-{stamp}-{n}{TRACE_SUFFIX}", self.prefix),
            })
            .map(|name| self.directory.join(name))
            .find(|candidate| !candidate.exists())
            .context("No free trace file name")?;

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("Failed to open trace file {}", path.display()))?;
        Ok((file, path))
    }

    /// Deletes our oldest traces so at most `max_files` remain, `current`
    /// included. Zero disables pruning. Returns how many files went.
    fn prune(&self, max_files: usize, current: &Path) -> Result<usize> {
        if max_files == 0 {
            return Ok(0);
        }
        let listing = fs::read_dir(&self.directory).with_context(|| {
            format!("Failed to read trace directory {}", self.directory.display())
        })?;
        let mut older: Vec<(SystemTime, PathBuf)> = listing
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().as_path() != current)
            .filter(|entry| entry.file_name().to_str().is_some_and(|name| self.owns(name)))
            .filter_map(|entry| {
                let metadata = entry.metadata().ok().filter(|metadata| metadata.is_file())?;
                Some((metadata.modified().ok()?, entry.path()))
            })
            .collect();

        older.sort_by_key(|(modified, _)| Reverse(*modified));
        let mut removed = 0;
        for (_, path) in older.into_iter().skip(max_files.saturating_sub(1)) {
            match fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(err) => debug!(path = %path.display(), error = %err, "Could not prune trace"),
            }
        }
        Ok(removed)
    }
}
