use crate::app::AppLocal;
use crate::catalog::defaults::{self, CUSTOM_LOCALS};

use super::{AppContext, Step};

type Apps = Vec<AppLocal>;

pub const STEPS: &[Step<Apps, AppContext>] = &[
    Step {
        id: "rename-custom",
        apply: rename_custom,
    },
    Step {
        id: "add-custom-slots",
        apply: add_custom_slots,
    },
];

fn rename_custom(apps: &mut Apps, _: &AppContext) -> bool {
    if apps.iter().any(|app| app.base.name == CUSTOM_LOCALS[0]) {
        return false;
    }
    let Some(custom) = apps.iter_mut().find(|app| app.base.name == "custom") else {
        return false;
    };
    custom.base.name = CUSTOM_LOCALS[0].to_string();
    if custom.base.custom_name == "custom" {
        custom.base.custom_name = CUSTOM_LOCALS[0].to_string();
    }
    true
}

fn add_custom_slots(apps: &mut Apps, _: &AppContext) -> bool {
    let mut changed = false;
    for name in &CUSTOM_LOCALS[1..] {
        if !apps.iter().any(|app| app.base.name == *name) {
            apps.push(defaults::local(name));
            changed = true;
        }
    }
    changed
}
