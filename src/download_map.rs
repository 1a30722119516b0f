use std::{env, fmt};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Token replaced by the release version inside a URL template.
pub const VERSION_PLACEHOLDER: &str = "***VERSION***";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OsKind {
    Windows,
    Linux,
    Mac,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Arch {
    X86,
    X64,
    Arm,
    Arm64,
    Other,
}

/// Operating system and architecture pair used to pick a download.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Platform {
    pub os: OsKind,
    pub arch: Arch,
}

impl Platform {
    pub const fn new(os: OsKind, arch: Arch) -> Self {
        Self { os, arch }
    }

    /// Platform of the running process.
    pub fn current() -> Self {
        let os = match env::consts::OS {
            "windows" => OsKind::Windows,
            "linux" => OsKind::Linux,
            "macos" => OsKind::Mac,
            _ => OsKind::Other,
        };
        let arch = match env::consts::ARCH {
            "x86" => Arch::X86,
            "x86_64" => Arch::X64,
            "arm" => Arch::Arm,
            "aarch64" => Arch::Arm64,
            _ => Arch::Other,
        };
        Self { os, arch }
    }

    pub fn is_windows(&self) -> bool {
        self.os == OsKind::Windows
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let os = match self.os {
            OsKind::Windows => "windows",
            OsKind::Linux => "linux",
            OsKind::Mac => "mac",
            OsKind::Other => "other",
        };
        let arch = match self.arch {
            Arch::X86 => "x86",
            Arch::X64 => "x64",
            Arch::Arm => "arm",
            Arch::Arm64 => "arm64",
            Arch::Other => "other",
        };
        write!(f, "{os}-{arch}")
    }
}

/// One URL template per supported platform.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DownloadMap {
    templates: IndexMap<Platform, String>,
}

impl DownloadMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, os: OsKind, arch: Arch, template: impl Into<String>) -> Self {
        self.templates.insert(Platform::new(os, arch), template.into());
        self
    }

    pub fn windows_x86(self, template: impl Into<String>) -> Self {
        self.with(OsKind::Windows, Arch::X86, template)
    }

    pub fn windows_x64(self, template: impl Into<String>) -> Self {
        self.with(OsKind::Windows, Arch::X64, template)
    }

    pub fn linux_x64(self, template: impl Into<String>) -> Self {
        self.with(OsKind::Linux, Arch::X64, template)
    }

    pub fn linux_arm(self, template: impl Into<String>) -> Self {
        self.with(OsKind::Linux, Arch::Arm, template)
    }

    pub fn linux_arm64(self, template: impl Into<String>) -> Self {
        self.with(OsKind::Linux, Arch::Arm64, template)
    }

    pub fn mac_x64(self, template: impl Into<String>) -> Self {
        self.with(OsKind::Mac, Arch::X64, template)
    }

    pub fn mac_arm64(self, template: impl Into<String>) -> Self {
        self.with(OsKind::Mac, Arch::Arm64, template)
    }

    pub fn template(&self, platform: Platform) -> Option<&str> {
        self.templates.get(&platform).map(String::as_str)
    }

    pub fn supports(&self, platform: Platform) -> bool {
        self.templates.contains_key(&platform)
    }

    /// Concrete URL for `platform`, or `None` when the platform is unsupported.
    ///
    /// Every placeholder occurrence is replaced with `version` verbatim.
    pub fn resolve(&self, platform: Platform, version: Option<&str>) -> Option<String> {
        let template = self.template(platform)?;
        Some(match version {
            Some(version) => template.replace(VERSION_PLACEHOLDER, version),
            None => template.to_string(),
        })
    }

    pub fn get_download_url_by_os(&self, version: Option<&str>) -> Option<String> {
        self.resolve(Platform::current(), version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOWS: Platform = Platform::new(OsKind::Windows, Arch::X64);
    const LINUX_ARM: Platform = Platform::new(OsKind::Linux, Arch::Arm);

    #[test]
    fn substitutes_every_placeholder() {
        let map = DownloadMap::new()
            .windows_x64("https://example.com/v***VERSION***/x***VERSION***.zip");
        assert_eq!(
            map.resolve(WINDOWS, Some("1.2.3")).as_deref(),
            Some("https://example.com/v1.2.3/x1.2.3.zip")
        );
    }

    #[test]
    fn unsupported_platform_resolves_to_none() {
        let map = DownloadMap::new().windows_x64("https://example.com/app.exe");
        assert_eq!(map.resolve(LINUX_ARM, Some("1.0.0")), None);
        assert!(!map.supports(LINUX_ARM));
    }

    #[test]
    fn version_is_inserted_verbatim() {
        let map = DownloadMap::new().linux_arm("https://example.com/EpocCam_***VERSION***.pkg");
        assert_eq!(
            map.resolve(LINUX_ARM, Some("3_4_0")).as_deref(),
            Some("https://example.com/EpocCam_3_4_0.pkg")
        );
        assert_eq!(
            map.resolve(LINUX_ARM, None).as_deref(),
            Some("https://example.com/EpocCam_***VERSION***.pkg")
        );
    }

    #[test]
    fn current_platform_is_stable() {
        assert_eq!(Platform::current(), Platform::current());
        assert_eq!(WINDOWS.to_string(), "windows-x64");
    }
}
