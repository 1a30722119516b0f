use crate::app::AppInstallable;
use crate::catalog::defaults;

use super::{AppContext, Step};

type Apps = Vec<AppInstallable>;

pub const STEPS: &[Step<Apps, AppContext>] = &[
    Step {
        id: "refresh-platform-installers",
        apply: refresh_platform_installers,
    },
    Step {
        id: "force-chmod",
        apply: force_chmod,
    },
];

fn refresh_platform_installers(apps: &mut Apps, context: &AppContext) -> bool {
    let mut changed = false;
    apps.retain_mut(|app| {
        if !defaults::INSTALLABLE_NAMES.contains(&app.base.name.as_str()) {
            return true;
        }
        let Some(release) = defaults::installable(&app.base.name, context.platform) else {
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::AppBase;
    use crate::download_map::{Arch, OsKind, Platform};
    use crate::migration::migrate_installable;

    #[test]
    fn installers_follow_the_platform() {
        let windows = AppContext {
            platform: Platform::new(OsKind::Windows, Arch::X64),
        };
        let mut droid = AppInstallable::new(
            AppBase::new(defaults::DROID_CAM, "old"),
            "https://github.com/dev47apps/windows-releases/releases/download/win-6.5.0/DroidCam.Setup.6.5.0.exe",
            "DroidCamApp.exe",
            "",
        );
        droid.chmod = false;
        let mut apps = vec![droid];
        assert_eq!(migrate_installable(&mut apps, &windows), 2);
        assert!(apps[0].download_url.ends_with("DroidCam.Setup.6.5.2.exe"));
        assert!(apps[0].chmod);
        let once = serde_json::to_string_pretty(&apps).unwrap();
        assert_eq!(migrate_installable(&mut apps, &windows), 0);
        assert_eq!(once, serde_json::to_string_pretty(&apps).unwrap());

        let linux = AppContext {
            platform: Platform::new(OsKind::Linux, Arch::X64),
        };
        migrate_installable(&mut apps, &linux);
        assert!(apps.is_empty());
    }
}
