//! Version-free migrations applied to every collection on load.
//!
//! Each step inspects the current data and only acts when its change is
//! missing, so running a step list again over migrated data changes nothing.

pub mod downloadable;
pub mod installable;
pub mod local;
pub mod open;
pub mod profiles;

use indexmap::IndexSet;
use tracing::{debug, info};

use crate::app::{AppDownloadable, AppInstallable, AppLocal, AppOpen};
use crate::argument::Argument;
use crate::configuration::Configuration;
use crate::download_map::Platform;
use crate::profile::Profile;

/// One named, idempotent migration over a collection.
pub struct Step<T, C> {
    pub id: &'static str,
    /// Returns whether anything changed.
    pub apply: fn(&mut T, &C) -> bool,
}

/// Context for app collection migrations.
#[derive(Debug, Clone, Copy)]
pub struct AppContext {
    pub platform: Platform,
}

/// Context for profile migrations: names of every app left after the app
/// collections were migrated.
#[derive(Debug, Clone, Default)]
pub struct ProfileContext {
    pub available: IndexSet<String>,
}

impl ProfileContext {
    pub fn has(&self, app: &str) -> bool {
        self.available.contains(app)
    }
}

/// Applies `steps` in order and returns how many of them changed the data.
pub fn run_steps<T, C>(collection: &str, items: &mut T, steps: &[Step<T, C>], context: &C) -> usize {
    let mut changed = 0;
    for step in steps {
        if (step.apply)(items, context) {
            debug!(collection, step = step.id, "Applied migration step");
            changed += 1;
        }
    }
    if changed > 0 {
        info!(collection, changed, "Migrated collection");
    }
    changed
}

pub fn migrate_downloadable(apps: &mut Vec<AppDownloadable>, context: &AppContext) -> usize {
    run_steps("apps-downloadable", apps, downloadable::STEPS, context)
}

pub fn migrate_installable(apps: &mut Vec<AppInstallable>, context: &AppContext) -> usize {
    run_steps("apps-installable", apps, installable::STEPS, context)
}

pub fn migrate_local(apps: &mut Vec<AppLocal>, context: &AppContext) -> usize {
    run_steps("apps-local", apps, local::STEPS, context)
}

pub fn migrate_open(apps: &mut Vec<AppOpen>, context: &AppContext) -> usize {
    run_steps("apps-open", apps, open::STEPS, context)
}

pub fn migrate_profiles(profiles: &mut Vec<Profile>, context: &ProfileContext) -> usize {
    run_steps("profiles", profiles, profiles::STEPS, context)
}

/// Appends every argument of `definition` the configuration lacks.
pub(crate) fn backfill(configuration: &mut Configuration, definition: Vec<Argument>) -> bool {
    let mut changed = false;
    for argument in definition {
        changed |= configuration.add_if_absent(argument);
    }
    changed
}

/// Removes every listed argument.
pub(crate) fn remove_arguments(configuration: &mut Configuration, names: &[&str]) -> bool {
    let mut changed = false;
    for name in names {
        changed |= configuration.remove(name);
    }
    changed
}
