use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::download_map::Platform;

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("io", "dartdeck", "Dartdeck")
}

/// User configuration for the app manager.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ManagerSettings {
    /// Optional override for where the app and profile collections live.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
    /// Optional override for where apps are downloaded and unpacked.
    #[serde(default)]
    pub apps_dir: Option<PathBuf>,
    /// Pretend to run on another platform when picking downloads.
    #[serde(default)]
    pub platform: Option<Platform>,
    #[serde(default)]
    pub traces: TraceSettings,
    #[serde(default)]
    pub user_agent: Option<String>,
}

impl ManagerSettings {
    /// Load settings from disk, writing defaults if missing.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("Unable to read config at {}", path.display()))?;
            let parsed: Self = serde_json::from_str(&raw)
                .with_context(|| format!("Malformed config at {}", path.display()))?;
            Ok(parsed)
        } else {
            let settings = Self::default();
            settings
                .save(path)
                .with_context(|| format!("Failed to write default config to {}", path.display()))?;
            Ok(settings)
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory {}", parent.display())
            })?;
        }
        let serialised = serde_json::to_string_pretty(self)?;
        fs::write(path, serialised)
            .with_context(|| format!("Failed to persist config to {}", path.display()))
    }

    /// Resolve directory holding the five collection files.
    pub fn resolve_data_dir(&self) -> Result<PathBuf> {
        if let Some(path) = &self.data_dir {
            return Ok(path.clone());
        }
        let dirs = project_dirs().context("Unable to resolve platform data directory")?;
        Ok(dirs.data_dir().to_path_buf())
    }

    /// Resolve download and unpack root for apps.
    pub fn resolve_apps_dir(&self) -> Result<PathBuf> {
        if let Some(path) = &self.apps_dir {
            return Ok(path.clone());
        }
        Ok(self.resolve_data_dir()?.join("apps"))
    }

    pub fn platform(&self) -> Platform {
        self.platform.unwrap_or_else(Platform::current)
    }

    pub fn user_agent(&self) -> String {
        self.user_agent
            .clone()
            .unwrap_or_else(|| format!("dartdeck/{}", env!("CARGO_PKG_VERSION")))
    }
}

/// Controls structured JSON trace export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceSettings {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub directory: Option<PathBuf>,
    #[serde(default = "TraceSettings::default_max_files")]
    pub max_files: usize,
    /// Leading part of trace file names, e.g. the name of the board PC.
    #[serde(default)]
    pub file_prefix: Option<String>,
}

impl TraceSettings {
    const fn default_max_files() -> usize {
        10
    }

    pub fn file_prefix(&self) -> &str {
        self.file_prefix
            .as_deref()
            .filter(|prefix| !prefix.trim().is_empty())
            .unwrap_or("dartdeck")
    }

    pub fn resolve_directory(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.directory {
            return Ok(dir.clone());
        }
        let dirs = project_dirs().context("Unable to resolve platform trace directory")?;
        Ok(dirs.cache_dir().join("traces"))
    }
}

impl Default for TraceSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            directory: None,
            max_files: Self::default_max_files(),
            file_prefix: None,
        }
    }
}

pub fn default_config_path() -> Result<PathBuf> {
    let dirs = project_dirs().context("Unable to resolve platform config directory")?;
    Ok(dirs.config_dir().join("settings.json"))
}
