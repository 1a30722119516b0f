use crate::app::{AppOpen, FILE_ARGUMENT};
use crate::catalog::defaults::{self, BOARD_MANAGER, CUSTOM_URLS, OPEN_DESCRIPTION};

use super::{AppContext, Step};

type Apps = Vec<AppOpen>;

const FILE_LABEL: &str = "file/url";

pub const STEPS: &[Step<Apps, AppContext>] = &[
    Step {
        id: "add-board-manager",
        apply: add_board_manager,
    },
    Step {
        id: "add-custom-urls",
        apply: add_custom_urls,
    },
    Step {
        id: "normalize-descriptions",
        apply: normalize_descriptions,
    },
];

fn add_missing(apps: &mut Apps, name: &str) -> bool {
    if apps.iter().any(|app| app.base.name == name) {
        return false;
    }
    apps.push(defaults::open(name));
    true
}

fn add_board_manager(apps: &mut Apps, _: &AppContext) -> bool {
    add_missing(apps, BOARD_MANAGER)
}

fn add_custom_urls(apps: &mut Apps, _: &AppContext) -> bool {
    let mut changed = false;
    for name in CUSTOM_URLS {
        changed |= add_missing(apps, name);
    }
    changed
}

fn normalize_descriptions(apps: &mut Apps, _: &AppContext) -> bool {
    let mut changed = false;
    for app in apps.iter_mut() {
        if app.base.description_short != OPEN_DESCRIPTION {
            app.base.description_short = OPEN_DESCRIPTION.to_string();
            changed = true;
        }
        let file = app
            .base
            .configuration
            .as_mut()
            .and_then(|configuration| configuration.find_mut(FILE_ARGUMENT));
        if let Some(file) = file {
            if file.name_human.as_deref() != Some(FILE_LABEL) {
                file.name_human = Some(FILE_LABEL.to_string());
                changed = true;
            }
        }
    }
    changed
}
