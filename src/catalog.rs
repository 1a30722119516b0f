pub mod defaults;

use std::path::Path;

use indexmap::{IndexMap, IndexSet};

use crate::app::{AppDownloadable, AppInstallable, AppLocal, AppOpen, AppVariant};
use crate::error::{ConfigurationError, ConfigurationResult};

/// Owns every loaded app, keyed by its unique name in load order.
#[derive(Debug, Default)]
pub struct AppCatalog {
    apps: IndexMap<String, AppVariant>,
}

impl AppCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an app, refusing a name another collection already owns.
    pub fn insert(&mut self, app: AppVariant, source: &Path) -> ConfigurationResult<()> {
        if self.apps.contains_key(app.name()) {
            return Err(ConfigurationError::DuplicateApp {
                path: source.to_path_buf(),
                app: app.name().to_string(),
            });
        }
        self.apps.insert(app.name().to_string(), app);
        Ok(())
    }

    pub fn extend<I>(&mut self, apps: I, source: &Path) -> ConfigurationResult<()>
    where
        I: IntoIterator<Item = AppVariant>,
    {
        for app in apps {
            self.insert(app, source)?;
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&AppVariant> {
        self.apps.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut AppVariant> {
        self.apps.get_mut(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.apps.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.apps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.apps.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AppVariant> {
        self.apps.values()
    }

    pub fn names(&self) -> IndexSet<String> {
        self.apps.keys().cloned().collect()
    }

    pub fn downloadable(&self) -> Vec<&AppDownloadable> {
        self.iter()
            .filter_map(|app| match app {
                AppVariant::Downloadable(app) => Some(app),
                _ => None,
            })
            .collect()
    }

    pub fn installable(&self) -> Vec<&AppInstallable> {
        self.iter()
            .filter_map(|app| match app {
                AppVariant::Installable(app) => Some(app),
                _ => None,
            })
            .collect()
    }

    pub fn local(&self) -> Vec<&AppLocal> {
        self.iter()
            .filter_map(|app| match app {
                AppVariant::Local(app) => Some(app),
                _ => None,
            })
            .collect()
    }

    pub fn open(&self) -> Vec<&AppOpen> {
        self.iter()
            .filter_map(|app| match app {
                AppVariant::Open(app) => Some(app),
                _ => None,
            })
            .collect()
    }
}
