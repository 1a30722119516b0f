use std::{
    fs::{self, File},
    io::{self, Read, Write},
    path::{Path, PathBuf},
    time::{Duration, Instant},
};

use anyhow::{Context, Result, bail};
use flate2::read::GzDecoder;
use reqwest::blocking::Client as BlockingClient;
use tracing::{debug, info};
use url::Url;

const CHUNK_SIZE: usize = 64 * 1024;
const PROGRESS_INTERVAL: Duration = Duration::from_millis(250);

/// Fetches a remote artifact onto disk.
pub trait Downloader: Send + Sync {
    /// Writes `url` to `destination`, reporting `(transferred, total)` as it goes.
    fn fetch(
        &self,
        url: &str,
        destination: &Path,
        progress: &mut dyn FnMut(u64, Option<u64>),
    ) -> Result<u64>;
}

/// Blocking HTTP downloader.
#[derive(Debug, Clone)]
pub struct HttpDownloader {
    client: BlockingClient,
}

impl HttpDownloader {
    pub fn new(user_agent: &str) -> Result<Self> {
        let client = BlockingClient::builder()
            .user_agent(user_agent)
            .connect_timeout(Duration::from_secs(15))
            .timeout(None::<Duration>)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { client })
    }
}

impl Downloader for HttpDownloader {
    fn fetch(
        &self,
        url: &str,
        destination: &Path,
        progress: &mut dyn FnMut(u64, Option<u64>),
    ) -> Result<u64> {
        let mut response = self
            .client
            .get(url)
            .send()
            .with_context(|| format!("Request to {url} failed"))?
            .error_for_status()
            .with_context(|| format!("Download of {url} was refused"))?;
        let total = response.content_length();

        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create download directory {}", parent.display())
            })?;
        }
        let partial = partial_path(destination);
        let mut file = File::create(&partial)
            .with_context(|| format!("Failed to create {}", partial.display()))?;

        let mut buffer = vec![0u8; CHUNK_SIZE];
        let mut transferred = 0u64;
        let mut last_report = Instant::now();
        progress(0, total);
        loop {
            let read = match response.read(&mut buffer) {
                Ok(0) => break,
                Ok(read) => read,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(err).with_context(|| format!("Reading {url} failed")),
            };
            file.write_all(&buffer[..read])
                .with_context(|| format!("Failed to write {}", partial.display()))?;
            transferred += read as u64;
            if last_report.elapsed() >= PROGRESS_INTERVAL {
                progress(transferred, total);
                last_report = Instant::now();
            }
        }
        file.flush()?;
        drop(file);

        if let Some(expected) = total {
            if expected != transferred {
                let _ = fs::remove_file(&partial);
                bail!("Download of {url} ended after {transferred} of {expected} bytes");
            }
        }
        fs::rename(&partial, destination).with_context(|| {
            format!("Failed to move download into {}", destination.display())
        })?;
        progress(transferred, total);
        info!(url, path = %destination.display(), bytes = transferred, "Download complete");
        Ok(transferred)
    }
}

fn partial_path(destination: &Path) -> PathBuf {
    let mut name = destination
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_default();
    name.push(".part");
    destination.with_file_name(name)
}

/// Layout of a downloaded artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    Zip,
    TarGz,
    Plain,
}

impl ArtifactKind {
    pub fn from_file_name(name: &str) -> Self {
        let lower = name.to_ascii_lowercase();
        if lower.ends_with(".zip") {
            ArtifactKind::Zip
        } else if lower.ends_with(".tar.gz") || lower.ends_with(".tgz") {
            ArtifactKind::TarGz
        } else {
            ArtifactKind::Plain
        }
    }

    pub fn is_archive(&self) -> bool {
        !matches!(self, ArtifactKind::Plain)
    }

    /// File name with the archive extension removed.
    pub fn stem<'a>(&self, name: &'a str) -> &'a str {
        let lower = name.to_ascii_lowercase();
        let suffix = match self {
            ArtifactKind::Zip => ".zip",
            ArtifactKind::TarGz if lower.ends_with(".tgz") => ".tgz",
            ArtifactKind::TarGz => ".tar.gz",
            ArtifactKind::Plain => "",
        };
        if lower.ends_with(suffix) {
            &name[..name.len() - suffix.len()]
        } else {
            name
        }
    }
}

/// Last path segment of a download URL, percent-decoded.
pub fn artifact_file_name(download_url: &str) -> String {
    let from_url = Url::parse(download_url).ok().and_then(|url| {
        url.path_segments()
            .and_then(|mut segments| segments.next_back().map(str::to_string))
    });
    let raw = from_url
        .or_else(|| download_url.rsplit('/').next().map(str::to_string))
        .unwrap_or_default();
    let decoded = raw.replace("%20", " ");
    if decoded.is_empty() {
        "download".into()
    } else {
        decoded
    }
}

/// Unpacks an archive into `into`, returning the number of extracted entries.
pub fn unpack(archive: &Path, kind: ArtifactKind, into: &Path) -> Result<usize> {
    fs::create_dir_all(into)
        .with_context(|| format!("Failed to create {}", into.display()))?;
    let file =
        File::open(archive).with_context(|| format!("Failed to open {}", archive.display()))?;
    let count = match kind {
        ArtifactKind::Zip => {
            let mut zip = zip::ZipArchive::new(file)
                .with_context(|| format!("{} is not a zip archive", archive.display()))?;
            let mut count = 0;
            for index in 0..zip.len() {
                let mut entry = zip.by_index(index)?;
                let Some(relative) = entry.enclosed_name().map(Path::to_path_buf) else {
                    debug!(entry = entry.name(), "Skipping unsafe zip entry");
                    continue;
                };
                let target = into.join(relative);
                if entry.is_dir() {
                    fs::create_dir_all(&target)?;
                    continue;
                }
                if let Some(parent) = target.parent() {
                    fs::create_dir_all(parent)?;
                }
                let mut output = File::create(&target)
                    .with_context(|| format!("Failed to create {}", target.display()))?;
                io::copy(&mut entry, &mut output)?;
                count += 1;
            }
            count
        }
        ArtifactKind::TarGz => {
            let mut tar = tar::Archive::new(GzDecoder::new(file));
            let mut count = 0;
            for entry in tar.entries()? {
                let mut entry = entry?;
                if entry.unpack_in(into)? {
                    count += 1;
                }
            }
            count
        }
        ArtifactKind::Plain => bail!("{} is not an archive", archive.display()),
    };
    info!(archive = %archive.display(), into = %into.display(), entries = count, "Unpacked archive");
    Ok(count)
}

/// Marks `path` executable for everyone. No-op off unix.
#[cfg(unix)]
pub fn make_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mut permissions = fs::metadata(path)
        .with_context(|| format!("Failed to stat {}", path.display()))?
        .permissions();
    permissions.set_mode(0o755);
    fs::set_permissions(path, permissions)
        .with_context(|| format!("Failed to chmod {}", path.display()))
}

#[cfg(not(unix))]
pub fn make_executable(_path: &Path) -> Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::{Compression, write::GzEncoder};
    use tempfile::tempdir;

    #[test]
    fn artifact_names_come_from_the_url_path() {
        assert_eq!(
            artifact_file_name(
                "https://github.com/lbormann/autodarts-caller/releases/download/v2.8.2/autodarts-caller.exe"
            ),
            "autodarts-caller.exe"
        );
        assert_eq!(
            artifact_file_name("https://www.lehmann-bo.de/Downloads/VDZ/Virtual Darts Zoom.zip"),
            "Virtual Darts Zoom.zip"
        );
    }

    #[test]
    fn artifact_kind_and_stem() {
        let name = "autodarts0.22.0.linux-amd64.tar.gz";
        let kind = ArtifactKind::from_file_name(name);
        assert_eq!(kind, ArtifactKind::TarGz);
        assert_eq!(kind.stem(name), "autodarts0.22.0.linux-amd64");
        assert_eq!(ArtifactKind::from_file_name("cam-loader.ZIP"), ArtifactKind::Zip);
        assert!(!ArtifactKind::from_file_name("autodarts-wled").is_archive());
    }

    #[test]
    fn unpacks_zip_archives() {
        let dir = tempdir().unwrap();
        let archive = dir.path().join("cam-loader.zip");
        {
            let file = File::create(&archive).unwrap();
            let mut writer = zip::ZipWriter::new(file);
            let options = zip::write::FileOptions::default();
            writer.start_file("cam-loader/cam-loader.exe", options).unwrap();
            writer.write_all(b"MZ").unwrap();
            writer.finish().unwrap();
        }
        let target = dir.path().join("out");
        let count = unpack(&archive, ArtifactKind::Zip, &target).unwrap();
        assert_eq!(count, 1);
        assert_eq!(
            fs::read(target.join("cam-loader/cam-loader.exe")).unwrap(),
            b"MZ"
        );
    }

    #[test]
    fn unpacks_tar_gz_archives() {
        let dir = tempdir().unwrap();
        let archive = dir.path().join("autodarts.tar.gz");
        {
            let file = File::create(&archive).unwrap();
            let encoder = GzEncoder::new(file, Compression::default());
            let mut builder = tar::Builder::new(encoder);
            let body = b"#!/bin/sh\n";
            let mut header = tar::Header::new_gnu();
            header.set_size(body.len() as u64);
            header.set_mode(0o755);
            header.set_cksum();
            builder
                .append_data(&mut header, "autodarts", &body[..])
                .unwrap();
            builder.into_inner().unwrap().finish().unwrap();
        }
        let target = dir.path().join("out");
        unpack(&archive, ArtifactKind::TarGz, &target).unwrap();
        assert_eq!(fs::read(target.join("autodarts")).unwrap(), b"#!/bin/sh\n");
    }

    #[cfg(unix)]
    #[test]
    fn make_executable_sets_mode() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let path = dir.path().join("autodarts-caller");
        fs::write(&path, b"bin").unwrap();
        make_executable(&path).unwrap();
        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
    }

    #[test]
    fn partial_path_appends_suffix() {
        assert_eq!(
            partial_path(Path::new("/apps/x/autodarts-caller")),
            PathBuf::from("/apps/x/autodarts-caller.part")
        );
    }
}
