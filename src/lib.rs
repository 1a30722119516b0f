pub mod app;
pub mod argument;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod configuration;
pub mod download;
pub mod download_map;
pub mod error;
pub mod events;
pub mod launch;
pub mod migration;
pub mod profile;
pub mod telemetry;

use std::{
    fs, io,
    path::{Path, PathBuf},
    sync::{Arc, mpsc::Receiver},
};

use anyhow::{Context, Result, bail};
use indexmap::IndexMap;
use serde::{Serialize, de::DeserializeOwned};
use tracing::{info, info_span, warn};

use crate::app::{AppServices, AppVariant};
use crate::catalog::{AppCatalog, defaults};
use crate::config::{ManagerSettings, default_config_path};
use crate::download::HttpDownloader;
use crate::download_map::Platform;
use crate::error::{ConfigurationError, ConfigurationResult, LaunchError, ProfileError};
use crate::events::{AppEvent, EventSink};
use crate::launch::SystemLauncher;
use crate::migration::{AppContext, ProfileContext};
use crate::profile::Profile;

pub const DOWNLOADABLE_FILE: &str = "apps-downloadable.json";
pub const INSTALLABLE_FILE: &str = "apps-installable.json";
pub const LOCAL_FILE: &str = "apps-local.json";
pub const OPEN_FILE: &str = "apps-open.json";
pub const PROFILES_FILE: &str = "profiles.json";

/// Locations of the five persisted collections.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionPaths {
    pub downloadable: PathBuf,
    pub installable: PathBuf,
    pub local: PathBuf,
    pub open: PathBuf,
    pub profiles: PathBuf,
}

impl CollectionPaths {
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            downloadable: dir.join(DOWNLOADABLE_FILE),
            installable: dir.join(INSTALLABLE_FILE),
            local: dir.join(LOCAL_FILE),
            open: dir.join(OPEN_FILE),
            profiles: dir.join(PROFILES_FILE),
        }
    }

    pub fn all(&self) -> [&Path; 5] {
        [
            &self.downloadable,
            &self.installable,
            &self.local,
            &self.open,
            &self.profiles,
        ]
    }

    /// Finds a collection by file name, e.g. `profiles.json`.
    pub fn by_file_name(&self, name: &str) -> Option<&Path> {
        self.all()
            .into_iter()
            .find(|path| path.file_name().is_some_and(|file| file == name))
    }
}

fn read_collection<T: DeserializeOwned>(path: &Path) -> ConfigurationResult<Option<T>> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(err) => {
            return Err(ConfigurationError::Unreadable {
                path: path.to_path_buf(),
                message: err.to_string(),
            });
        }
    };
    serde_json::from_str(&raw)
        .map(Some)
        .map_err(|err| ConfigurationError::Malformed {
            path: path.to_path_buf(),
            message: err.to_string(),
        })
}

fn write_collection<T: Serialize + ?Sized>(path: &Path, items: &T) -> ConfigurationResult<()> {
    let write_error = |message: String| ConfigurationError::Write {
        path: path.to_path_buf(),
        message,
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|err| write_error(err.to_string()))?;
    }
    let serialised = serde_json::to_string_pretty(items).map_err(|err| write_error(err.to_string()))?;
    fs::write(path, serialised).map_err(|err| write_error(err.to_string()))
}

/// Primary orchestrator owning the app catalog and the profiles.
pub struct ProfileManager {
    paths: CollectionPaths,
    platform: Platform,
    services: AppServices,
    events: Option<Receiver<AppEvent>>,
    catalog: AppCatalog,
    profiles: Vec<Profile>,
}

impl ProfileManager {
    /// Construct a manager backed by the real downloader and process launcher.
    pub fn from_settings(settings: &ManagerSettings) -> Result<Self> {
        let platform = settings.platform();
        let data_dir = settings.resolve_data_dir()?;
        let apps_dir = settings.resolve_apps_dir()?;
        let downloader = HttpDownloader::new(&settings.user_agent())?;
        let (events, receiver) = EventSink::channel();
        let services = AppServices {
            apps_dir,
            launcher: Arc::new(SystemLauncher::new(platform)),
            downloader: Arc::new(downloader),
            events,
        };
        let mut manager = Self::with_services(&data_dir, platform, services);
        manager.events = Some(receiver);
        Ok(manager)
    }

    /// Load settings from the default path and construct a manager.
    pub fn bootstrap(config_path_override: Option<PathBuf>) -> Result<Self> {
        let config_path = match config_path_override {
            Some(path) => path,
            None => default_config_path()?,
        };
        let settings = ManagerSettings::load_or_default(&config_path)?;
        Self::from_settings(&settings)
    }

    /// Manager over caller-supplied collaborators. Events go wherever
    /// `services.events` sends them.
    pub fn with_services(data_dir: &Path, platform: Platform, services: AppServices) -> Self {
        Self {
            paths: CollectionPaths::in_dir(data_dir),
            platform,
            services,
            events: None,
            catalog: AppCatalog::new(),
            profiles: Vec::new(),
        }
    }

    /// Hands out the receiving end of the event channel once.
    pub fn take_event_receiver(&mut self) -> Option<Receiver<AppEvent>> {
        self.events.take()
    }

    pub fn paths(&self) -> &CollectionPaths {
        &self.paths
    }

    /// Reads, migrates and links all five collections.
    ///
    /// Absent files are replaced by the default catalog. Nothing is kept
    /// from a load that fails.
    pub fn load_apps_and_profiles(&mut self) -> ConfigurationResult<()> {
        let _span = info_span!("load_apps_and_profiles", platform = ?self.platform).entered();
        let context = AppContext {
            platform: self.platform,
        };
        let paths = &self.paths;

        let mut downloadables = read_collection(&paths.downloadable)?
            .unwrap_or_else(|| defaults::downloadables(self.platform));
        migration::migrate_downloadable(&mut downloadables, &context);
        let mut installables = read_collection(&paths.installable)?
            .unwrap_or_else(|| defaults::installables(self.platform));
        migration::migrate_installable(&mut installables, &context);
        let mut locals = read_collection(&paths.local)?.unwrap_or_else(defaults::locals);
        migration::migrate_local(&mut locals, &context);
        let mut opens = read_collection(&paths.open)?.unwrap_or_else(defaults::opens);
        migration::migrate_open(&mut opens, &context);

        let mut catalog = AppCatalog::new();
        catalog.extend(
            downloadables.into_iter().map(AppVariant::Downloadable),
            &paths.downloadable,
        )?;
        catalog.extend(
            installables.into_iter().map(AppVariant::Installable),
            &paths.installable,
        )?;
        catalog.extend(locals.into_iter().map(AppVariant::Local), &paths.local)?;
        catalog.extend(opens.into_iter().map(AppVariant::Open), &paths.open)?;

        let available = catalog.names();
        for name in &available {
            if let Some(app) = catalog.get_mut(name) {
                app.base_mut().normalize_custom_name();
                app.refresh_state(&self.services);
            }
        }

        let mut profiles: Vec<Profile> = read_collection(&paths.profiles)?
            .unwrap_or_else(|| defaults::profiles(&available));
        migration::migrate_profiles(&mut profiles, &ProfileContext { available });

        for profile in &mut profiles {
            for (app, state) in profile.apps.iter_mut() {
                if !catalog.contains(app) {
                    return Err(ConfigurationError::UnknownApp {
                        path: paths.profiles.clone(),
                        profile: profile.name.clone(),
                        app: app.clone(),
                    });
                }
                state.link(app);
            }
        }

        info!(
            apps = catalog.len(),
            profiles = profiles.len(),
            "Loaded apps and profiles"
        );
        self.catalog = catalog;
        self.profiles = profiles;
        Ok(())
    }

    /// Writes all five collections in full.
    pub fn store_apps(&self) -> ConfigurationResult<()> {
        write_collection(&self.paths.downloadable, &self.catalog.downloadable())?;
        write_collection(&self.paths.installable, &self.catalog.installable())?;
        write_collection(&self.paths.local, &self.catalog.local())?;
        write_collection(&self.paths.open, &self.catalog.open())?;
        write_collection(&self.paths.profiles, &self.profiles)?;
        info!(path = %self.paths.profiles.display(), "Stored apps and profiles");
        Ok(())
    }

    /// Starts every tagged app of `profile` in display-name order.
    ///
    /// Returns `false` as soon as one app fails to start; later apps are not
    /// attempted.
    pub fn run_profile(&self, profile: &str) -> Result<bool, ProfileError> {
        let profile = self
            .profile(profile)
            .ok_or_else(|| ProfileError::UnknownProfile(profile.to_string()))?;
        let _span = info_span!("run_profile", profile = %profile.name).entered();

        let mut tagged = Vec::new();
        for (name, state) in profile.tagged_apps() {
            let app = self
                .catalog
                .get(state.linked_app().unwrap_or(name))
                .ok_or_else(|| ProfileError::UnknownApp {
                    profile: profile.name.clone(),
                    app: name.to_string(),
                })?;
            tagged.push((app, &state.runtime_arguments));
        }
        tagged.sort_by(|(left, _), (right, _)| left.display_name().cmp(right.display_name()));

        for (app, runtime) in tagged {
            if let Err(err) = app.run(&self.services, runtime) {
                warn!(app = %app.name(), error = %err, "Profile stopped at failing app");
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Starts one app outside of any profile.
    pub fn start_app(&self, name: &str) -> Result<(), LaunchError> {
        let app = self.app(name).ok_or_else(|| LaunchError::Unavailable {
            app: name.to_string(),
            reason: "not in the catalog".into(),
        })?;
        app.run(&self.services, &IndexMap::new())
    }

    /// Closes every loaded app. Failures are logged and skipped.
    pub fn close_apps(&self) {
        for app in self.catalog.iter() {
            if let Err(err) = app.close() {
                warn!(app = %app.name(), error = %format!("{err:#}"), "Failed to close app");
            }
        }
    }

    /// Removes one persisted file so the next load falls back to defaults.
    pub fn delete_configuration_file(&self, path: &Path) -> Result<()> {
        match fs::remove_file(path) {
            Ok(()) => {
                info!(path = %path.display(), "Deleted configuration file");
                Ok(())
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err)
                .with_context(|| format!("Failed to delete configuration file {}", path.display())),
        }
    }

    pub fn profiles(&self) -> &[Profile] {
        &self.profiles
    }

    pub fn profile(&self, name: &str) -> Option<&Profile> {
        self.profiles.iter().find(|profile| profile.name == name)
    }

    pub fn apps(&self) -> &AppCatalog {
        &self.catalog
    }

    pub fn app(&self, name: &str) -> Option<&AppVariant> {
        self.catalog.get(name)
    }

    pub fn set_tagged(&mut self, profile: &str, app: &str, tagged: bool) -> Result<(), ProfileError> {
        let entry = self
            .profiles
            .iter_mut()
            .find(|candidate| candidate.name == profile)
            .ok_or_else(|| ProfileError::UnknownProfile(profile.to_string()))?;
        entry.set_tagged(app, tagged)
    }

    /// Validates and stores one argument value. An empty value clears it.
    pub fn set_argument(&mut self, app: &str, argument: &str, value: &str) -> Result<()> {
        let Some(entry) = self.catalog.get_mut(app) else {
            bail!("Unknown app '{app}'");
        };
        let Some(configuration) = entry.base_mut().configuration.as_mut() else {
            bail!("'{app}' has no configurable arguments");
        };
        let Some(target) = configuration.find_mut(argument) else {
            bail!("'{app}' has no argument '{argument}'");
        };
        target
            .set_value(Some(value.to_string()))
            .with_context(|| format!("Rejected value for {app} {argument}"))
    }

    /// Renders what starting `app` would execute, optionally with the
    /// runtime arguments it has in `profile`.
    pub fn command_line(&self, app: &str, profile: Option<&str>) -> Result<String> {
        let Some(entry) = self.app(app) else {
            bail!("Unknown app '{app}'");
        };
        let runtime = match profile {
            Some(name) => {
                let profile = self
                    .profile(name)
                    .ok_or_else(|| ProfileError::UnknownProfile(name.to_string()))?;
                profile
                    .apps
                    .get(app)
                    .map(|state| state.runtime_arguments.clone())
                    .ok_or_else(|| ProfileError::UnknownApp {
                        profile: name.to_string(),
                        app: app.to_string(),
                    })?
            }
            None => IndexMap::new(),
        };
        Ok(entry.describe_launch(&self.services, &runtime)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::tests::{RecordingLauncher, services};
    use crate::app::{AppLocal, FILE_ARGUMENT};
    use crate::download_map::{Arch, OsKind};
    use crate::profile::ProfileState;
    use std::sync::Mutex;
    use tempfile::tempdir;

    const LINUX: Platform = Platform::new(OsKind::Linux, Arch::X64);

    fn manager(data_dir: &Path, launcher: RecordingLauncher) -> ProfileManager {
        let (services, _events) = services(&data_dir.join("apps"), launcher);
        ProfileManager::with_services(data_dir, LINUX, services)
    }

    fn local(name: &str, display: &str, file: &str) -> AppLocal {
        let mut app = defaults::local(name);
        app.base.custom_name = display.to_string();
        app.base
            .configuration
            .as_mut()
            .unwrap()
            .find_mut(FILE_ARGUMENT)
            .unwrap()
            .value = Some(file.to_string());
        app
    }

    /// Three locals tagged in one profile whose display names sort
    /// differently from their keys.
    fn write_stage(data_dir: &Path) {
        let locals = vec![
            local("custom-1", "b-second", "/opt/b"),
            local("custom-2", "c-third", "/opt/c"),
            local("custom-3", "a-first", "/opt/a"),
        ];
        write_collection(&data_dir.join(LOCAL_FILE), &locals).unwrap();
        let mut stage = Profile::new("stage");
        for name in defaults::CUSTOM_LOCALS {
            let mut state = ProfileState::optional();
            state.tagged_for_start = true;
            stage = stage.with_app(name, state);
        }
        let idle = Profile::new("idle").with_app("custom-1", ProfileState::optional());
        write_collection(&data_dir.join(PROFILES_FILE), &vec![stage, idle]).unwrap();
    }

    #[test]
    fn defaults_are_synthesized_and_stable_across_reloads() {
        let dir = tempdir().unwrap();
        let mut first = manager(dir.path(), RecordingLauncher::default());
        first.load_apps_and_profiles().unwrap();
        assert!(first.app(defaults::CLIENT).is_some());
        assert!(first.profile(defaults::MINIMAL_PROFILE).is_some());
        first.store_apps().unwrap();
        for path in first.paths().all() {
            assert!(path.exists(), "{} missing", path.display());
        }
        let snapshot: Vec<String> = first
            .paths()
            .all()
            .iter()
            .map(|path| fs::read_to_string(path).unwrap())
            .collect();

        let mut second = manager(dir.path(), RecordingLauncher::default());
        second.load_apps_and_profiles().unwrap();
        second.store_apps().unwrap();
        let again: Vec<String> = second
            .paths()
            .all()
            .iter()
            .map(|path| fs::read_to_string(path).unwrap())
            .collect();
        assert_eq!(snapshot, again);
    }

    #[test]
    fn malformed_file_reports_its_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(OPEN_FILE);
        fs::write(&path, "[{ \"Name\": ").unwrap();
        let mut manager = manager(dir.path(), RecordingLauncher::default());
        let err = manager.load_apps_and_profiles().unwrap_err();
        assert!(matches!(err, ConfigurationError::Malformed { .. }));
        assert_eq!(err.path(), path.as_path());

        manager.delete_configuration_file(&path).unwrap();
        manager.load_apps_and_profiles().unwrap();
        assert!(manager.app(defaults::WEB_PLATFORM).is_some());
    }

    #[test]
    fn unknown_profile_reference_fails_linking() {
        let dir = tempdir().unwrap();
        let profiles = vec![Profile::new("phantom").with_app("not-an-app", ProfileState::required())];
        write_collection(&dir.path().join(PROFILES_FILE), &profiles).unwrap();
        let mut manager = manager(dir.path(), RecordingLauncher::default());
        match manager.load_apps_and_profiles().unwrap_err() {
            ConfigurationError::UnknownApp { path, profile, app } => {
                assert_eq!(path, dir.path().join(PROFILES_FILE));
                assert_eq!(profile, "phantom");
                assert_eq!(app, "not-an-app");
            }
            other => panic!("unexpected error {other}"),
        }
        assert!(manager.profiles().is_empty());
    }

    #[test]
    fn run_profile_stops_at_first_failure_in_display_order() {
        let dir = tempdir().unwrap();
        write_stage(dir.path());
        let launcher = RecordingLauncher {
            fail_spawn: vec![PathBuf::from("/opt/b")],
            ..RecordingLauncher::default()
        };
        let log = Arc::clone(&launcher.log);
        let mut manager = manager(dir.path(), launcher);
        manager.load_apps_and_profiles().unwrap();

        assert!(!manager.run_profile("stage").unwrap());
        let spawned: Vec<PathBuf> = log
            .lock()
            .unwrap()
            .spawned
            .iter()
            .map(|command| command.binary().clone())
            .collect();
        assert_eq!(spawned, vec![PathBuf::from("/opt/a")]);
    }

    #[test]
    fn run_profile_with_nothing_tagged_succeeds() {
        let dir = tempdir().unwrap();
        write_stage(dir.path());
        let launcher = RecordingLauncher::default();
        let log = Arc::clone(&launcher.log);
        let mut manager = manager(dir.path(), launcher);
        manager.load_apps_and_profiles().unwrap();

        assert!(manager.run_profile("idle").unwrap());
        assert!(log.lock().unwrap().spawned.is_empty());
        assert_eq!(
            manager.run_profile("missing"),
            Err(ProfileError::UnknownProfile("missing".into()))
        );
    }

    #[test]
    fn close_apps_reaches_every_app_despite_failures() {
        let dir = tempdir().unwrap();
        write_stage(dir.path());
        let launcher = RecordingLauncher {
            fail_close: vec![PathBuf::from("/opt/a")],
            ..RecordingLauncher::default()
        };
        let log: Arc<Mutex<_>> = Arc::clone(&launcher.log);
        let mut manager = manager(dir.path(), launcher);
        manager.load_apps_and_profiles().unwrap();

        assert!(manager.run_profile("stage").unwrap());
        manager.close_apps();
        let mut closed = log.lock().unwrap().closed.clone();
        closed.sort();
        assert_eq!(
            closed,
            vec![
                PathBuf::from("/opt/a"),
                PathBuf::from("/opt/b"),
                PathBuf::from("/opt/c")
            ]
        );
    }

    #[test]
    fn edits_are_validated_and_persisted() {
        let dir = tempdir().unwrap();
        write_stage(dir.path());
        let mut manager = manager(dir.path(), RecordingLauncher::default());
        manager.load_apps_and_profiles().unwrap();

        assert_eq!(
            manager.set_tagged(defaults::MINIMAL_PROFILE, defaults::CLIENT, false),
            Err(ProfileError::Required {
                profile: defaults::MINIMAL_PROFILE.into(),
                app: defaults::CLIENT.into(),
            })
        );
        manager.set_tagged("idle", "custom-1", true).unwrap();
        manager
            .set_argument("custom-1", "arguments", "--fullscreen --mute")
            .unwrap();
        assert_eq!(
            manager.command_line("custom-1", Some("idle")).unwrap(),
            "/opt/b --fullscreen --mute"
        );
        manager.store_apps().unwrap();

        let mut reloaded = ProfileManager::with_services(
            dir.path(),
            LINUX,
            services(&dir.path().join("apps"), RecordingLauncher::default()).0,
        );
        reloaded.load_apps_and_profiles().unwrap();
        assert!(reloaded.profile("idle").unwrap().apps["custom-1"].tagged_for_start);
        assert_eq!(
            reloaded.app("custom-1").unwrap().base().argument_value("arguments"),
            Some("--fullscreen --mute")
        );
    }

    #[test]
    fn collections_resolve_by_file_name() {
        let paths = CollectionPaths::in_dir(Path::new("/data"));
        assert_eq!(
            paths.by_file_name(PROFILES_FILE),
            Some(Path::new("/data/profiles.json"))
        );
        assert!(paths.by_file_name("settings.json").is_none());
    }
}
