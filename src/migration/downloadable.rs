use tracing::debug;

use crate::app::AppDownloadable;
use crate::argument::{Argument, BOOL_FALSE, BOOL_TRUE, bool_value_mapping};
use crate::catalog::defaults::{self, CALLER, CLIENT, EXTERN, GIF, VOICE, WLED};
use crate::configuration::Configuration;

use super::{AppContext, Step, backfill, remove_arguments};

type Apps = Vec<AppDownloadable>;

pub const STEPS: &[Step<Apps, AppContext>] = &[
    Step {
        id: "remove-autodarts-bot",
        apply: remove_autodarts_bot,
    },
    Step {
        id: "add-companion-apps",
        apply: add_companion_apps,
    },
    Step {
        id: "caller-bool-mappings",
        apply: caller_bool_mappings,
    },
    Step {
        id: "caller-remove-retired-arguments",
        apply: caller_remove_retired,
    },
    Step {
        id: "caller-checkout-call-as-int",
        apply: caller_checkout_call_as_int,
    },
    Step {
        id: "caller-ambient-sounds-as-volume",
        apply: caller_ambient_sounds_as_volume,
    },
    Step {
        id: "caller-downloads-limit-as-int",
        apply: caller_downloads_limit_as_int,
    },
    Step {
        id: "caller-backfill-arguments",
        apply: caller_backfill,
    },
    Step {
        id: "extern-chat-defaults",
        apply: extern_chat_defaults,
    },
    Step {
        id: "extern-remove-host-port",
        apply: extern_remove_host_port,
    },
    Step {
        id: "extern-backfill-arguments",
        apply: extern_backfill,
    },
    Step {
        id: "wled-remove-retired-arguments",
        apply: wled_remove_retired,
    },
    Step {
        id: "wled-backfill-arguments",
        apply: wled_backfill,
    },
    Step {
        id: "wled-endpoints-without-scheme",
        apply: wled_endpoints_without_scheme,
    },
    Step {
        id: "gif-backfill-arguments",
        apply: gif_backfill,
    },
    Step {
        id: "voice-backfill-arguments",
        apply: voice_backfill,
    },
    Step {
        id: "client-help-url",
        apply: client_help_url,
    },
    Step {
        id: "refresh-platform-releases",
        apply: refresh_platform_releases,
    },
    Step {
        id: "force-chmod",
        apply: force_chmod,
    },
    Step {
        id: "dedupe-arguments",
        apply: dedupe_arguments,
    },
];

fn configuration<'a>(apps: &'a mut Apps, name: &str) -> Option<&'a mut Configuration> {
    apps.iter_mut()
        .find(|app| app.base.name == name)?
        .base
        .configuration
        .as_mut()
}

fn remove_autodarts_bot(apps: &mut Apps, _: &AppContext) -> bool {
    let before = apps.len();
    apps.retain(|app| app.base.name != "autodarts-bot");
    before != apps.len()
}

fn add_companion_apps(apps: &mut Apps, context: &AppContext) -> bool {
    let mut changed = false;
    for name in [WLED, GIF, defaults::CAM_LOADER, VOICE] {
        if apps.iter().any(|app| app.base.name == name) {
            continue;
        }
        if let Some(app) = defaults::downloadable(name, context.platform) {
            apps.push(app);
            changed = true;
        }
    }
    changed
}

fn caller_bool_mappings(apps: &mut Apps, _: &AppContext) -> bool {
    let Some(configuration) = configuration(apps, CALLER) else {
        return false;
    };
    let mut changed = false;
    for argument in &mut configuration.arguments {
        if argument.kind == "bool" && argument.value_mapping.is_none() {
            argument.value_mapping = Some(bool_value_mapping());
            changed = true;
        }
    }
    changed
}

fn caller_remove_retired(apps: &mut Apps, _: &AppContext) -> bool {
    configuration(apps, CALLER)
        .is_some_and(|configuration| remove_arguments(configuration, &["DLP", "ACC", "WTT"]))
}

/// Retypes a boolean argument, translating stored `True`/`False` values.
fn revalidate(argument: &mut Argument) {
    if let Err(err) = argument.validate_type() {
        debug!(argument = %argument.name, kind = %argument.kind, error = %err, "Retyped value no longer validates");
    }
}

fn retype_bool(
    configuration: &mut Configuration,
    name: &str,
    kind: &str,
    truthy: &str,
    falsy: &str,
) -> bool {
    let Some(argument) = configuration.find_mut(name) else {
        return false;
    };
    if argument.kind != "bool" {
        return false;
    }
    argument.value = match argument.value.take().as_deref() {
        Some(BOOL_TRUE) => Some(truthy.to_string()),
        Some(BOOL_FALSE) => Some(falsy.to_string()),
        other => other.map(str::to_string),
    };
    argument.kind = kind.to_string();
    argument.value_mapping = None;
    revalidate(argument);
    true
}

fn caller_checkout_call_as_int(apps: &mut Apps, _: &AppContext) -> bool {
    configuration(apps, CALLER)
        .is_some_and(|configuration| retype_bool(configuration, "PCC", "int", "1", "0"))
}

fn caller_ambient_sounds_as_volume(apps: &mut Apps, _: &AppContext) -> bool {
    configuration(apps, CALLER).is_some_and(|configuration| {
        retype_bool(configuration, "A", "float[0.0..1.0]", "1.0", "0.0")
    })
}

fn caller_downloads_limit_as_int(apps: &mut Apps, _: &AppContext) -> bool {
    let Some(argument) =
        configuration(apps, CALLER).and_then(|configuration| configuration.find_mut("DLL"))
    else {
        return false;
    };
    if argument.kind == "int" {
        return false;
    }
    argument.kind = "int".into();
    revalidate(argument);
    true
}

fn caller_backfill(apps: &mut Apps, _: &AppContext) -> bool {
    configuration(apps, CALLER)
        .is_some_and(|configuration| backfill(configuration, defaults::caller_arguments()))
}

fn extern_chat_defaults(apps: &mut Apps, _: &AppContext) -> bool {
    let Some(configuration) = configuration(apps, EXTERN) else {
        return false;
    };
    let mut changed = false;
    for (name, value) in defaults::extern_chat_defaults() {
        if let Some(argument) = configuration.find_mut(name) {
            if !argument.is_set() {
                argument.value = Some(value.to_string());
                changed = true;
            }
        }
    }
    changed
}

fn extern_remove_host_port(apps: &mut Apps, _: &AppContext) -> bool {
    configuration(apps, EXTERN).is_some_and(|configuration| configuration.remove("host_port"))
}

fn extern_backfill(apps: &mut Apps, _: &AppContext) -> bool {
    configuration(apps, EXTERN)
        .is_some_and(|configuration| backfill(configuration, defaults::extern_arguments()))
}

fn wled_remove_retired(apps: &mut Apps, _: &AppContext) -> bool {
    configuration(apps, WLED).is_some_and(|configuration| {
        remove_arguments(configuration, &["HSO", "HS", "-I", "-P", "BSSOS"])
    })
}

fn wled_backfill(apps: &mut Apps, _: &AppContext) -> bool {
    configuration(apps, WLED)
        .is_some_and(|configuration| backfill(configuration, defaults::wled_arguments()))
}

fn wled_endpoints_without_scheme(apps: &mut Apps, _: &AppContext) -> bool {
    let Some(argument) =
        configuration(apps, WLED).and_then(|configuration| configuration.find_mut("WEPS"))
    else {
        return false;
    };
    let Some(value) = argument.value.as_mut() else {
        return false;
    };
    let stripped = value.replace("http://", "").replace("https://", "");
    if stripped == *value {
        return false;
    }
    *value = stripped;
    true
}

fn gif_backfill(apps: &mut Apps, _: &AppContext) -> bool {
    configuration(apps, GIF)
        .is_some_and(|configuration| backfill(configuration, defaults::gif_arguments()))
}

fn voice_backfill(apps: &mut Apps, _: &AppContext) -> bool {
    configuration(apps, VOICE)
        .is_some_and(|configuration| backfill(configuration, defaults::voice_arguments()))
}

fn client_help_url(apps: &mut Apps, _: &AppContext) -> bool {
    let Some(client) = apps.iter_mut().find(|app| app.base.name == CLIENT) else {
        return false;
    };
    let help = "https://docs.autodarts.io/";
    if client.base.help_url.as_deref() == Some(help) {
        return false;
    }
    client.base.help_url = Some(help.into());
    true
}

/// Points known apps at the current release for this platform and drops the
/// ones without one. Unknown apps are left alone.
fn refresh_platform_releases(apps: &mut Apps, context: &AppContext) -> bool {
    let mut changed = false;
    apps.retain_mut(|app| {
        if !defaults::DOWNLOADABLE_NAMES.contains(&app.base.name.as_str()) {
            return true;
        }
        let Some(release) = defaults::downloadable(&app.base.name, context.platform) else {
            changed = true;
            return false;
        };
        if app.download_url != release.download_url {
            app.download_url = release.download_url;
            changed = true;
        }
        if app.base.description_short != release.base.description_short {
            app.base.description_short = release.base.description_short;
            changed = true;
        }
        if release.executable.is_some() && app.executable != release.executable {
            app.executable = release.executable;
            changed = true;
        }
        true
    });
    changed
}

fn force_chmod(apps: &mut Apps, _: &AppContext) -> bool {
    let mut changed = false;
    for app in apps.iter_mut().filter(|app| !app.chmod) {
        app.chmod = true;
        changed = true;
    }
    changed
}

fn dedupe_arguments(apps: &mut Apps, _: &AppContext) -> bool {
    let mut changed = false;
    for configuration in apps
        .iter_mut()
        .filter_map(|app| app.base.configuration.as_mut())
    {
        changed |= configuration.dedupe();
    }
    changed
}
