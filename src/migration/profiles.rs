use crate::catalog::defaults::{
    self, BOARD_MANAGER, CALLER, CAM_LOADER, CLIENT, CUSTOM_LOCALS, CUSTOM_URLS, DOWNLOADABLE_NAMES,
    DROID_CAM, EPOC_CAM, EXTERN, GIF, INSTALLABLE_NAMES, MINIMAL_PROFILE, VIRTUAL_DARTS_ZOOM, VOICE,
    WEB_PLATFORM, WLED,
};
use crate::profile::{Profile, ProfileState};

use super::{ProfileContext, Step};

type Profiles = Vec<Profile>;

const EXTERN_PROFILE_PREFIX: &str = "autodarts-extern: ";

/// Built-in names whose profile entries disappear together with the app.
fn built_in_apps() -> impl Iterator<Item = &'static str> {
    DOWNLOADABLE_NAMES
        .into_iter()
        .chain(INSTALLABLE_NAMES)
        .chain([WEB_PLATFORM, BOARD_MANAGER, "custom"])
        .chain(CUSTOM_LOCALS)
        .chain(CUSTOM_URLS)
}

pub const STEPS: &[Step<Profiles, ProfileContext>] = &[
    Step {
        id: "remove-autodarts-bot",
        apply: remove_autodarts_bot,
    },
    Step {
        id: "remove-orphaned-profiles",
        apply: remove_orphaned_profiles,
    },
    Step {
        id: "remove-vanished-apps",
        apply: remove_vanished_apps,
    },
    Step {
        id: "create-minimal-profile",
        apply: create_minimal_profile,
    },
    Step {
        id: "add-companions",
        apply: add_companions,
    },
    Step {
        id: "strip-cameras-from-minimal",
        apply: strip_cameras_from_minimal,
    },
    Step {
        id: "sync-cam-loader",
        apply: sync_cam_loader,
    },
    Step {
        id: "sync-voice",
        apply: sync_voice,
    },
    Step {
        id: "replace-custom",
        apply: replace_custom,
    },
];

fn remove_from_all(profiles: &mut Profiles, app: &str) -> bool {
    let mut changed = false;
    for profile in profiles.iter_mut() {
        changed |= profile.remove(app);
    }
    changed
}

/// Adds `app` as an optional entry everywhere `filter` allows.
fn add_to(profiles: &mut Profiles, app: &str, filter: impl Fn(&Profile) -> bool) -> bool {
    let mut changed = false;
    for profile in profiles.iter_mut().filter(|profile| filter(profile)) {
        changed |= profile.insert_if_absent(app, ProfileState::optional());
    }
    changed
}

fn is_minimal(profile: &Profile) -> bool {
    profile.name == MINIMAL_PROFILE
}

fn remove_autodarts_bot(profiles: &mut Profiles, _: &ProfileContext) -> bool {
    remove_from_all(profiles, "autodarts-bot")
}

fn remove_orphaned_profiles(profiles: &mut Profiles, context: &ProfileContext) -> bool {
    let before = profiles.len();
    profiles.retain(|profile| {
        let is_extern = profile.name.starts_with(EXTERN_PROFILE_PREFIX);
        if (profile.name == CALLER || is_extern) && !context.has(CALLER) {
            return false;
        }
        !(is_extern && !context.has(EXTERN))
    });
    before != profiles.len()
}

fn remove_vanished_apps(profiles: &mut Profiles, context: &ProfileContext) -> bool {
    let mut changed = false;
    for app in built_in_apps() {
        if !context.has(app) {
            changed |= remove_from_all(profiles, app);
        }
    }
    changed
}

fn create_minimal_profile(profiles: &mut Profiles, context: &ProfileContext) -> bool {
    if !context.has(CLIENT) || profiles.iter().any(is_minimal) {
        return false;
    }
    match defaults::minimal_profile(&context.available) {
        Some(profile) => {
            profiles.push(profile);
            true
        }
        None => false,
    }
}

fn add_companions(profiles: &mut Profiles, context: &ProfileContext) -> bool {
    let mut changed = false;
    for app in [WLED, BOARD_MANAGER, GIF] {
        if context.has(app) {
            changed |= add_to(profiles, app, |profile| !is_minimal(profile));
        }
    }
    changed
}

fn strip_cameras_from_minimal(profiles: &mut Profiles, _: &ProfileContext) -> bool {
    let mut changed = false;
    for profile in profiles.iter_mut().filter(|profile| is_minimal(profile)) {
        for app in [VIRTUAL_DARTS_ZOOM, DROID_CAM, EPOC_CAM] {
            changed |= profile.remove(app);
        }
    }
    changed
}

fn sync_cam_loader(profiles: &mut Profiles, context: &ProfileContext) -> bool {
    if context.has(CAM_LOADER) {
        add_to(profiles, CAM_LOADER, |_| true)
    } else {
        remove_from_all(profiles, CAM_LOADER)
    }
}

fn sync_voice(profiles: &mut Profiles, context: &ProfileContext) -> bool {
    if context.has(VOICE) {
        add_to(profiles, VOICE, |profile| !is_minimal(profile))
    } else {
        remove_from_all(profiles, VOICE)
    }
}

fn replace_custom(profiles: &mut Profiles, context: &ProfileContext) -> bool {
    let mut changed = remove_from_all(profiles, "custom");
    for app in CUSTOM_LOCALS.iter().chain(CUSTOM_URLS.iter()) {
        if context.has(app) {
            changed |= add_to(profiles, app, |_| true);
        }
    }
    changed
}
