//! Built-in app definitions and profiles written on first start.

use std::path::PathBuf;

use directories::BaseDirs;
use indexmap::IndexSet;

use crate::app::{AppBase, AppDownloadable, AppInstallable, AppLocal, AppOpen};
use crate::argument::Argument;
use crate::configuration::Configuration;
use crate::download_map::{DownloadMap, Platform};
use crate::profile::{Profile, ProfileState};

pub const CLIENT: &str = "autodarts-client";
pub const CALLER: &str = "autodarts-caller";
pub const EXTERN: &str = "autodarts-extern";
pub const WLED: &str = "autodarts-wled";
pub const VIRTUAL_DARTS_ZOOM: &str = "virtual-darts-zoom";
pub const GIF: &str = "autodarts-gif";
pub const VOICE: &str = "autodarts-voice";
pub const CAM_LOADER: &str = "cam-loader";
pub const DARTBOARDS_CLIENT: &str = "dartboards-client";
pub const DROID_CAM: &str = "droid-cam";
pub const EPOC_CAM: &str = "epoc-cam";
pub const WEB_PLATFORM: &str = "autodarts.io";
pub const BOARD_MANAGER: &str = "autodarts-boardmanager";

/// Profile that only starts the board client.
pub const MINIMAL_PROFILE: &str = CLIENT;

pub const CUSTOM_LOCALS: [&str; 3] = ["custom-1", "custom-2", "custom-3"];
pub const CUSTOM_URLS: [&str; 3] = ["custom-url-1", "custom-url-2", "custom-url-3"];

pub const DOWNLOADABLE_NAMES: [&str; 8] = [
    CLIENT,
    CALLER,
    EXTERN,
    WLED,
    VIRTUAL_DARTS_ZOOM,
    GIF,
    VOICE,
    CAM_LOADER,
];

pub const INSTALLABLE_NAMES: [&str; 3] = [DARTBOARDS_CLIENT, DROID_CAM, EPOC_CAM];

pub const LOCAL_DESCRIPTION: &str = "Starts a program on your file-system";
pub const OPEN_DESCRIPTION: &str = "Opens a file or url";

const LIDARTS_CHAT_START: &str = "Hi, GD! Automated darts-scoring - powered by autodarts.io - Enter the community: https://discord.gg/bY5JYKbmvM";
const LIDARTS_CHAT_END: &str = "Thanks GG, WP!";

const EXTERN_PROFILES: [(&str, &str); 3] = [
    ("autodarts-extern: lidarts.org", "lidarts"),
    ("autodarts-extern: nakka.com/n01/online", "nakka"),
    ("autodarts-extern: dartboards.online", "dartboards"),
];

fn lbormann(app: &str, asset: &str) -> String {
    format!("https://github.com/lbormann/{app}/releases/download/v***VERSION***/{asset}")
}

/// Standard release layout of the lbormann tools.
fn companion_map(app: &str, arm64: bool) -> DownloadMap {
    let mut map = DownloadMap::new()
        .windows_x64(lbormann(app, &format!("{app}.exe")))
        .linux_x64(lbormann(app, app))
        .mac_x64(lbormann(app, &format!("{app}-mac")));
    if arm64 {
        map = map.linux_arm64(lbormann(app, &format!("{app}-arm64")));
    }
    map
}

fn client_map() -> DownloadMap {
    let asset = |suffix: &str| {
        format!(
            "https://github.com/autodarts/releases/releases/download/v***VERSION***/autodarts***VERSION***.{suffix}"
        )
    };
    DownloadMap::new()
        .windows_x64(asset("windows-amd64.zip"))
        .linux_x64(asset("linux-amd64.tar.gz"))
        .linux_arm64(asset("linux-arm64.tar.gz"))
        .linux_arm(asset("linux-armv7l.tar.gz"))
        .mac_x64(asset("darwin-amd64.tar.gz"))
        .mac_arm64(asset("darwin-arm64.tar.gz"))
}

fn help(app: &str) -> Option<String> {
    Some(format!("https://github.com/lbormann/{app}"))
}

fn base(name: &str, description: &str, help_url: Option<String>) -> AppBase {
    let mut base = AppBase::new(name, description);
    base.help_url = help_url;
    base
}

fn arg(name: &str, kind: &str, human: &str, section: &str) -> Argument {
    Argument::new(name, kind).human(human).section(section)
}

fn flag(name: &str, human: &str, section: &str) -> Argument {
    arg(name, "bool", human, section).bool_mapping()
}

fn multi(name: &str, human: &str, section: &str) -> Argument {
    arg(name, "string", human, section).multi()
}

/// Effect or image lists for every score and board area.
fn score_lists(noun: &str, section: &str) -> Vec<Argument> {
    let scores = (0..=180).map(|score| {
        multi(
            &format!("S{score}"),
            &format!("-S{score} / --score_{score}_{noun}"),
            section,
        )
    });
    let areas = (1..=12).map(|area| {
        multi(
            &format!("A{area}"),
            &format!("-A{area} / --score_area_{area}_{noun}"),
            section,
        )
    });
    scores.chain(areas).collect()
}

pub fn caller_arguments() -> Vec<Argument> {
    vec![
        arg("U", "string", "-U / --autodarts_email", "Autodarts").required(),
        arg("P", "password", "-P / --autodarts_password", "Autodarts").required(),
        arg("B", "string", "-B / --autodarts_board_id", "Autodarts").required(),
        arg("M", "path", "-M / --media_path", "Media").required(),
        arg("MS", "path", "-MS / --media_path_shared", "Media"),
        arg("V", "float[0.0..1.0]", "-V / --caller_volume", "Media"),
        arg("C", "string", "-C / --caller", "Calls"),
        flag("R", "-R / --random_caller", "Random"),
        flag("L", "-L / --random_caller_each_leg", "Random"),
        arg("RL", "int[0..6]", "-RL / --random_caller_language", "Random"),
        arg("RG", "int[0..2]", "-RG / --random_caller_gender", "Random"),
        flag("CCP", "-CCP / --call_current_player", "Calls"),
        flag("CCPA", "-CCPA / --call_current_player_always", "Calls"),
        flag("E", "-E / --call_every_dart", "Calls"),
        flag("ESF", "-ESF / --call_every_dart_single_files", "Calls"),
        arg("PCC", "int", "-PCC / --possible_checkout_call", "Calls"),
        flag("PCCSF", "-PCCSF / --possible_checkout_call_single_files", "Calls"),
        flag("PCCYO", "-PCCYO / --possible_checkout_call_yourself_only", "Calls"),
        arg("A", "float[0.0..1.0]", "-A / --ambient_sounds", "Calls"),
        flag("AAC", "-AAC / --ambient_sounds_after_calls", "Calls"),
        flag("DL", "-DL / --downloads", "Downloads"),
        arg("DLLA", "int[0..6]", "-DLLA / --downloads_language", "Downloads"),
        arg("DLL", "int", "-DLL / --downloads_limit", "Downloads"),
        arg("DLN", "string", "-DLN / --downloads_name", "Downloads"),
        arg("BLP", "path", "-BLP / --blacklist_path", "Media"),
        arg("BAV", "float[0.0..1.0]", "-BAV / --background_audio_volume", "Calls"),
        arg("WEB", "int[0..2]", "-WEB / --web_caller", "Service"),
        flag("WEBSB", "-WEBSB / --web_caller_scoreboard", "Service"),
        arg("WEBP", "int", "-WEBP / --web_caller_port", "Service"),
        arg("HP", "int", "-HP / --host_port", "Service"),
        flag("DEB", "-DEB / --debug", "Service"),
        flag("CC", "-CC / --cert_check", "Service"),
    ]
}

pub fn extern_arguments() -> Vec<Argument> {
    let lidarts = "extern_platform=lidarts";
    let dartboards = "extern_platform=dartboards";
    vec![
        arg("connection", "string", "--connection", "Service"),
        Argument::new("browser_path", "file")
            .required()
            .human("--browser_path")
            .describe("Path to browser. fav. Chrome"),
        arg("autodarts_user", "string", "--autodarts_user", "Autodarts").required(),
        arg("autodarts_password", "password", "--autodarts_password", "Autodarts").required(),
        arg("autodarts_board_id", "string", "--autodarts_board_id", "Autodarts").required(),
        Argument::new("extern_platform", "selection[lidarts,nakka,dartboards]")
            .required()
            .runtime(),
        arg("time_before_exit", "int[0..150000]", "--time_before_exit", "Match"),
        arg("lidarts_user", "string", "--lidarts_user", "Lidarts").required_on(lidarts),
        arg("lidarts_password", "password", "--lidarts_password", "Lidarts").required_on(lidarts),
        arg("lidarts_skip_dart_modals", "bool", "--lidarts_skip_dart_modals", "Lidarts"),
        arg("lidarts_chat_message_start", "string", "--lidarts_chat_message_start", "Lidarts")
            .with_value(LIDARTS_CHAT_START),
        arg("lidarts_chat_message_end", "string", "--lidarts_chat_message_end", "Lidarts")
            .with_value(LIDARTS_CHAT_END),
        arg("lidarts_cam_fullscreen", "bool", "--lidarts_cam_fullscreen", "Lidarts"),
        arg("nakka_skip_dart_modals", "bool", "--nakka_skip_dart_modal", "Nakka"),
        arg("dartboards_user", "string", "--dartboards_user", "Dartboards").required_on(dartboards),
        arg("dartboards_password", "password", "--dartboards_password", "Dartboards")
            .required_on(dartboards),
        arg("dartboards_skip_dart_modals", "bool", "--dartboards_skip_dart_modals", "Dartboards"),
    ]
}

pub fn extern_chat_defaults() -> [(&'static str, &'static str); 2] {
    [
        ("lidarts_chat_message_start", LIDARTS_CHAT_START),
        ("lidarts_chat_message_end", LIDARTS_CHAT_END),
    ]
}

pub fn wled_arguments() -> Vec<Argument> {
    let mut arguments = vec![
        arg("CON", "string", "-CON / --connection", "Service"),
        multi("WEPS", "-WEPS / --wled_endpoints", "WLED").required(),
        arg("DU", "int[0..10]", "-DU / --effect_duration", "WLED"),
        arg("BSS", "float[0.0..10.0]", "-BSS / --board_stop_start", "Autodarts"),
        arg("BRI", "int[1..255]", "-BRI / --effect_brightness", "WLED"),
        arg("HFO", "int[2..170]", "-HFO / --high_finish_on", "Autodarts"),
        multi("HF", "-HF / --high_finish_effects", "WLED"),
        arg("IDE", "string", "-IDE / --idle_effect", "WLED"),
        multi("G", "-G / --game_won_effects", "WLED"),
        multi("M", "-M / --match_won_effects", "WLED"),
        multi("B", "-B / --busted_effects", "WLED"),
        flag("DEB", "-DEB / --debug", "Service"),
    ];
    arguments.extend(score_lists("effects", "WLED"));
    arguments
}

pub fn gif_arguments() -> Vec<Argument> {
    let mut arguments = vec![
        arg("MP", "path", "-MP / --media_path", "Media"),
        arg("CON", "string", "-CON / --connection", "Service"),
        arg("HFO", "int[2..170]", "-HFO / --high_finish_on", "Autodarts"),
        multi("HF", "-HF / --high_finish_images", "Images"),
        multi("G", "-G / --game_won_images", "Images"),
        multi("M", "-M / --match_won_images", "Images"),
        multi("B", "-B / --busted_images", "Images"),
        arg("WEB", "int[0..2]", "-WEB / --web_gif", "Service"),
        flag("DEB", "-DEB / --debug", "Service"),
    ];
    arguments.extend(score_lists("images", "Images"));
    arguments
}

const VOICE_KEYWORDS: [(&str, &str); 38] = [
    ("KNG", "next_game"),
    ("KN", "next"),
    ("KU", "undo"),
    ("KBC", "ban_caller"),
    ("KCC", "change_caller"),
    ("KSB", "start_board"),
    ("KSPB", "stop_board"),
    ("KRB", "reset_board"),
    ("KCB", "calibrate_board"),
    ("KFD", "first_dart"),
    ("KSD", "second_dart"),
    ("KTD", "third_dart"),
    ("KS", "single"),
    ("KD", "double"),
    ("KT", "triple"),
    ("KZERO", "zero"),
    ("KONE", "one"),
    ("KTWO", "two"),
    ("KTHREE", "three"),
    ("KFOUR", "four"),
    ("KFIVE", "five"),
    ("KSIX", "six"),
    ("KSEVEN", "seven"),
    ("KEIGHT", "eight"),
    ("KNINE", "nine"),
    ("KTEN", "ten"),
    ("KELEVEN", "eleven"),
    ("KTWELVE", "twelve"),
    ("KTHIRTEEN", "thirteen"),
    ("KFOURTEEN", "fourteen"),
    ("KFIFTEEN", "fifteen"),
    ("KSIXTEEN", "sixteen"),
    ("KSEVENTEEN", "seventeen"),
    ("KEIGHTEEN", "eighteen"),
    ("KNINETEEN", "nineteen"),
    ("KTWENTY", "twenty"),
    ("KTWENTYFIVE", "twenty_five"),
    ("KFIFTY", "fifty"),
];

pub fn voice_arguments() -> Vec<Argument> {
    let section = "Voice-Recognition";
    let mut arguments = vec![
        arg("CON", "string", "-CON / --connection", "Service"),
        arg("MP", "path", "-MP / --model_path", section).required(),
        arg("L", "int[0..2]", "-L / --language", section),
    ];
    arguments.extend(VOICE_KEYWORDS.iter().map(|(name, keyword)| {
        let shown = if *name == "KTWENTYFIVE" { "KTWENTY_FIVE" } else { *name };
        multi(name, &format!("-{shown} / --keywords_{keyword}"), section)
    }));
    arguments.push(flag("DEB", "-DEB / --debug", "Service"));
    arguments
}

fn dashed(arguments: Vec<Argument>) -> Option<Configuration> {
    Some(Configuration::new("-", " ", arguments))
}

/// Definition of a known downloadable app for `platform`, `None` when it has
/// no release there or the name is unknown.
pub fn downloadable(name: &str, platform: Platform) -> Option<AppDownloadable> {
    let (map, version) = match name {
        CLIENT => (client_map(), Some("0.22.0")),
        CALLER => (companion_map(CALLER, true), Some("2.8.2")),
        EXTERN => (companion_map(EXTERN, false), Some("1.5.8")),
        WLED => (companion_map(WLED, true), Some("1.4.10")),
        VIRTUAL_DARTS_ZOOM => (
            DownloadMap::new()
                .windows_x64("https://www.lehmann-bo.de/Downloads/VDZ/Virtual Darts Zoom.zip"),
            None,
        ),
        GIF => (companion_map(GIF, true), Some("1.0.6")),
        VOICE => (companion_map(VOICE, true), Some("1.0.8")),
        CAM_LOADER => {
            let url = lbormann(CAM_LOADER, "cam-loader.zip");
            (
                DownloadMap::new().windows_x86(url.clone()).windows_x64(url),
                Some("1.0.0"),
            )
        }
        _ => return None,
    };
    let url = map.resolve(platform, version)?;

    let app = match name {
        CLIENT => {
            let executable = if platform.is_windows() {
                "autodarts.exe"
            } else {
                "autodarts"
            };
            AppDownloadable::new(
                base(CLIENT, "Recognizes dart-positions", Some("https://docs.autodarts.io/".into())),
                url,
            )
            .with_executable(executable)
        }
        CALLER => {
            let mut base = base(CALLER, "Calls out thrown points", help(CALLER));
            base.configuration = dashed(caller_arguments());
            AppDownloadable::new(base, url)
        }
        EXTERN => {
            let mut base = base(EXTERN, "Bridges and automates other dart-platforms", help(EXTERN));
            base.configuration = Some(Configuration::new("--", " ", extern_arguments()));
            AppDownloadable::new(base, url)
        }
        WLED => {
            let mut base = base(WLED, "Controls WLED installations by autodarts-events", help(WLED));
            base.configuration = dashed(wled_arguments());
            AppDownloadable::new(base, url)
        }
        VIRTUAL_DARTS_ZOOM => {
            let mut base = base(
                VIRTUAL_DARTS_ZOOM,
                "Zooms webcam-image onto thrown darts",
                Some("https://lehmann-bo.de/?p=28".into()),
            );
            base.run_as_admin = true;
            AppDownloadable::new(base, url).with_executable("Virtual Darts Zoom.exe")
        }
        GIF => {
            let mut base = base(GIF, "Displays images according to autodarts-events", help(GIF));
            base.configuration = dashed(gif_arguments());
            AppDownloadable::new(base, url)
        }
        VOICE => {
            let mut base = base(VOICE, "Controls autodarts by using your voice", help(VOICE));
            base.configuration = dashed(voice_arguments());
            AppDownloadable::new(base, url)
        }
        _ => AppDownloadable::new(
            base(CAM_LOADER, "Saves and loads settings for multiple cameras", help(CAM_LOADER)),
            url,
        )
        .with_executable("cam-loader.exe"),
    };
    Some(app)
}

pub fn installable(name: &str, platform: Platform) -> Option<AppInstallable> {
    let (template, version) = match name {
        DARTBOARDS_CLIENT => ("https://dartboards.online/dboclient_***VERSION***.exe", "0.9.2"),
        DROID_CAM => (
            "https://github.com/dev47apps/windows-releases/releases/download/win-***VERSION***/DroidCam.Setup.***VERSION***.exe",
            "6.5.2",
        ),
        EPOC_CAM => (
            "https://edge.elgato.com/egc/windows/epoccam/EpocCam_Installer64_***VERSION***.exe",
            "3_4_0",
        ),
        _ => return None,
    };
    let url = DownloadMap::new()
        .windows_x64(template)
        .resolve(platform, Some(version))?;

    let app = match name {
        DARTBOARDS_CLIENT => {
            let install_dir = BaseDirs::new()
                .map(|dirs| {
                    dirs.home_dir()
                        .join("AppData")
                        .join("Local")
                        .join("Programs")
                        .join("dartboardsonlineclient")
                })
                .unwrap_or_else(|| PathBuf::from("dartboardsonlineclient"));
            let mut app = AppInstallable::new(
                base(
                    DARTBOARDS_CLIENT,
                    "Connects webcam to dartboards.online",
                    Some("https://dartboards.online/client".into()),
                ),
                url,
                "dartboardsonlineclient.exe",
                install_dir.display().to_string(),
            );
            app.starts_after_installation = true;
            app
        }
        DROID_CAM => {
            let mut app = AppInstallable::new(
                base(
                    DROID_CAM,
                    "Connects to your android phone- or tablet-camera",
                    Some("https://www.dev47apps.com".into()),
                ),
                url,
                "DroidCamApp.exe",
                r"C:\Program Files (x86)\DroidCam",
            );
            app.run_as_admin_install = true;
            app
        }
        _ => {
            let mut app = AppInstallable::new(
                base(
                    EPOC_CAM,
                    "Connects to your iOS phone- or tablet-camera",
                    Some("https://www.elgato.com/de/epoccam".into()),
                ),
                url,
                "EpocCamService.exe",
                r"C:\Program Files (x86)\Elgato\EpocCam",
            );
            app.is_service = true;
            app
        }
    };
    Some(app)
}

pub fn downloadables(platform: Platform) -> Vec<AppDownloadable> {
    DOWNLOADABLE_NAMES
        .iter()
        .filter_map(|name| downloadable(name, platform))
        .collect()
}

pub fn installables(platform: Platform) -> Vec<AppInstallable> {
    INSTALLABLE_NAMES
        .iter()
        .filter_map(|name| installable(name, platform))
        .collect()
}

pub fn local(name: &str) -> AppLocal {
    AppLocal::new(AppBase::new(name, LOCAL_DESCRIPTION))
}

pub fn locals() -> Vec<AppLocal> {
    CUSTOM_LOCALS.iter().map(|name| local(name)).collect()
}

pub fn open(name: &str) -> AppOpen {
    let default = match name {
        WEB_PLATFORM => Some("https://play.autodarts.io"),
        BOARD_MANAGER => Some("http://127.0.0.1:3180"),
        _ => None,
    };
    AppOpen::new(AppBase::new(name, OPEN_DESCRIPTION), default)
}

pub fn opens() -> Vec<AppOpen> {
    [WEB_PLATFORM, BOARD_MANAGER]
        .iter()
        .chain(CUSTOM_URLS.iter())
        .map(|name| open(name))
        .collect()
}

struct ProfileBuilder<'a> {
    available: &'a IndexSet<String>,
    profile: Profile,
}

impl<'a> ProfileBuilder<'a> {
    fn new(name: &str, available: &'a IndexSet<String>) -> Self {
        Self {
            available,
            profile: Profile::new(name),
        }
    }

    fn optional(mut self, app: &str) -> Self {
        if self.available.contains(app) {
            self.profile.insert_if_absent(app, ProfileState::optional());
        }
        self
    }

    fn required(mut self, app: &str, state: ProfileState) -> Self {
        if self.available.contains(app) {
            self.profile.insert_if_absent(app, state);
        }
        self
    }

    fn customs(mut self) -> Self {
        for app in CUSTOM_LOCALS.iter().chain(CUSTOM_URLS.iter()) {
            self = self.optional(app);
        }
        self
    }
}

/// Default profiles over the apps actually present.
pub fn profiles(available: &IndexSet<String>) -> Vec<Profile> {
    let has = |app: &str| available.contains(app);
    let mut profiles = Vec::new();

    if has(CALLER) {
        let profile = ProfileBuilder::new(CALLER, available)
            .optional(CLIENT)
            .optional(WEB_PLATFORM)
            .optional(BOARD_MANAGER)
            .required(CALLER, ProfileState::required())
            .optional(WLED)
            .optional(GIF)
            .optional(VOICE)
            .optional(CAM_LOADER)
            .customs();
        profiles.push(profile.profile);
    }

    if has(CALLER) && has(EXTERN) {
        for (name, platform) in EXTERN_PROFILES {
            let mut builder = ProfileBuilder::new(name, available)
                .optional(CLIENT)
                .optional(WEB_PLATFORM)
                .optional(BOARD_MANAGER)
                .required(CALLER, ProfileState::required())
                .optional(WLED)
                .optional(GIF)
                .optional(VOICE)
                .required(
                    EXTERN,
                    ProfileState::required().with_runtime_argument("extern_platform", platform),
                )
                .optional(VIRTUAL_DARTS_ZOOM)
                .optional(CAM_LOADER);
            if platform == "dartboards" {
                builder = builder.optional(DARTBOARDS_CLIENT);
            }
            let builder = builder.optional(DROID_CAM).optional(EPOC_CAM).customs();
            profiles.push(builder.profile);
        }
    }

    if has(CLIENT) {
        let profile = ProfileBuilder::new(MINIMAL_PROFILE, available)
            .required(CLIENT, ProfileState::required())
            .optional(WEB_PLATFORM)
            .optional(BOARD_MANAGER)
            .optional(CAM_LOADER)
            .customs();
        profiles.push(profile.profile);
    }

    profiles
}

/// Minimal profile on its own, used when migrating older profile files.
pub fn minimal_profile(available: &IndexSet<String>) -> Option<Profile> {
    profiles(available)
        .into_iter()
        .find(|profile| profile.name == MINIMAL_PROFILE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::download_map::{Arch, OsKind};

    const WINDOWS: Platform = Platform::new(OsKind::Windows, Arch::X64);
    const LINUX: Platform = Platform::new(OsKind::Linux, Arch::X64);
    const LINUX_ARM: Platform = Platform::new(OsKind::Linux, Arch::Arm);

    #[test]
    fn windows_gets_every_downloadable() {
        let names: Vec<_> = downloadables(WINDOWS)
            .into_iter()
            .map(|app| app.base.name)
            .collect();
        assert_eq!(names, DOWNLOADABLE_NAMES);
        assert_eq!(installables(WINDOWS).len(), 3);
    }

    #[test]
    fn linux_catalog_follows_release_maps() {
        let names: Vec<_> = downloadables(LINUX)
            .into_iter()
            .map(|app| app.base.name)
            .collect();
        assert_eq!(names, vec![CLIENT, CALLER, EXTERN, WLED, GIF, VOICE]);
        assert!(installables(LINUX).is_empty());

        let arm: Vec<_> = downloadables(LINUX_ARM)
            .into_iter()
            .map(|app| app.base.name)
            .collect();
        assert_eq!(arm, vec![CLIENT]);
    }

    #[test]
    fn caller_url_carries_the_version() {
        let caller = downloadable(CALLER, LINUX).unwrap();
        assert_eq!(
            caller.download_url,
            "https://github.com/lbormann/autodarts-caller/releases/download/v2.8.2/autodarts-caller"
        );
        let client = downloadable(CLIENT, LINUX).unwrap();
        assert!(client.download_url.ends_with("/v0.22.0/autodarts0.22.0.linux-amd64.tar.gz"));
    }

    #[test]
    fn score_lists_cover_every_score_and_area() {
        let wled = wled_arguments();
        assert_eq!(wled.len(), 12 + 181 + 12);
        let s180 = wled.iter().find(|arg| arg.name == "S180").unwrap();
        assert_eq!(s180.name_human.as_deref(), Some("-S180 / --score_180_effects"));
        assert!(s180.is_multi);
        let voice = voice_arguments();
        let twenty_five = voice.iter().find(|arg| arg.name == "KTWENTYFIVE").unwrap();
        assert_eq!(
            twenty_five.name_human.as_deref(),
            Some("-KTWENTY_FIVE / --keywords_twenty_five")
        );
    }

    #[test]
    fn default_profiles_match_available_apps() {
        let available: IndexSet<String> = downloadables(WINDOWS)
            .into_iter()
            .map(|app| app.base.name)
            .chain(installables(WINDOWS).into_iter().map(|app| app.base.name))
            .chain(["autodarts.io", BOARD_MANAGER].map(String::from))
            .chain(CUSTOM_LOCALS.map(String::from))
            .chain(CUSTOM_URLS.map(String::from))
            .collect();
        let profiles = profiles(&available);
        let names: Vec<_> = profiles.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "autodarts-caller",
                "autodarts-extern: lidarts.org",
                "autodarts-extern: nakka.com/n01/online",
                "autodarts-extern: dartboards.online",
                "autodarts-client",
            ]
        );
        let lidarts = &profiles[1].apps[EXTERN];
        assert!(lidarts.is_required);
        assert_eq!(lidarts.runtime_arguments["extern_platform"], "lidarts");
        assert!(!profiles[1].contains(DARTBOARDS_CLIENT));
        assert!(profiles[3].contains(DARTBOARDS_CLIENT));
        assert!(!profiles[4].contains(DROID_CAM));
    }

    #[test]
    fn profiles_skip_missing_anchor_apps() {
        let available: IndexSet<String> = [CLIENT, "autodarts.io"].map(String::from).into();
        let profiles = profiles(&available);
        assert_eq!(profiles.len(), 1);
        assert_eq!(profiles[0].apps.len(), 2);
    }
}
