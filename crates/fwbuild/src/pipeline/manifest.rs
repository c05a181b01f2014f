//! Build manifest (`<firmware>.json`).
//!
//! Field names and nesting are consumed by OTA tooling and must not change.

use super::checksum::{self, ALGORITHM};
use super::metadata::BuildMetadata;
use crate::context::BuildContext;
use anyhow::{bail, Context, Result};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const MANIFEST_EXTENSION: &str = "json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub version: String,
    pub build: BuildInfo,
    pub firmware: FirmwareInfo,
    pub ota: OtaInfo,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildInfo {
    pub timestamp: i64,
    /// ISO-8601 local date-time of manifest creation.
    pub date: String,
    pub git_commit: String,
    pub environment: String,
    pub platform: String,
    pub board: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FirmwareInfo {
    pub filename: String,
    pub size: u64,
    pub checksum: Checksum,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checksum {
    #[serde(rename = "type")]
    pub kind: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OtaInfo {
    pub hostname: String,
    pub port: u16,
    pub password_required: bool,
}

/// A manifest together with where it was written.
#[derive(Debug, Clone)]
pub struct EmittedManifest {
    pub manifest: Manifest,
    pub path: PathBuf,
}

/// `app.bin` -> `app.json`, next to the firmware.
pub fn manifest_path(firmware: &Path) -> PathBuf {
    firmware.with_extension(MANIFEST_EXTENSION)
}

impl Manifest {
    /// Describe `firmware` as it exists on disk right now.
    pub fn build(
        ctx: &BuildContext,
        meta: &BuildMetadata,
        firmware: &Path,
        now: DateTime<Local>,
    ) -> Result<Self> {
        let digest = checksum::digest_file(firmware)?;
        let filename = firmware
            .file_name()
            .with_context(|| format!("Firmware path has no file name: {}", firmware.display()))?
            .to_string_lossy()
            .into_owned();

        Ok(Self {
            version: ctx.app_version().to_string(),
            build: BuildInfo {
                timestamp: meta.timestamp,
                date: now.format("%Y-%m-%dT%H:%M:%S%.6f").to_string(),
                git_commit: meta.commit.clone(),
                environment: ctx.environment().to_string(),
                platform: ctx.platform().to_string(),
                board: ctx.board().to_string(),
            },
            firmware: FirmwareInfo {
                filename,
                size: digest.size,
                checksum: Checksum {
                    kind: ALGORITHM.to_string(),
                    value: digest.sha256,
                },
            },
            ota: OtaInfo {
                hostname: ctx.ota_hostname().to_string(),
                port: ctx.ota_port(),
                password_required: true,
            },
        })
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)? + "\n")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content =
            fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))
    }
}

/// Build the manifest for `firmware` and write it next to it.
pub fn write(
    ctx: &BuildContext,
    meta: &BuildMetadata,
    firmware: &Path,
    now: DateTime<Local>,
) -> Result<EmittedManifest> {
    let path = manifest_path(firmware);
    if path == firmware {
        bail!(
            "Firmware {} has a .{MANIFEST_EXTENSION} extension; its manifest would replace it",
            firmware.display()
        );
    }
    let manifest = Manifest::build(ctx, meta, firmware, now)?;
    fs::write(&path, manifest.to_json()?)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    tracing::info!(path = %path.display(), "manifest written");
    Ok(EmittedManifest { manifest, path })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DefineValue, EnvConfig};
    use chrono::TimeZone;

    fn ctx(dir: &Path) -> BuildContext {
        let mut env = EnvConfig {
            platform: Some("espressif32".into()),
            board: Some("esp32dev".into()),
            ..EnvConfig::default()
        };
        let defines = &mut env.defines;
        defines.insert("APP_VERSION".into(), DefineValue::Str("2.3.4".into()));
        defines.insert("OTA_HOSTNAME".into(), DefineValue::Str("\"line3\"".into()));
        BuildContext::from_env_config(&env, "production-esp32", dir).unwrap()
    }

    fn meta() -> BuildMetadata {
        BuildMetadata {
            timestamp: 1_767_225_600,
            commit: "unknown".into(),
            date: "2026-01-01".into(),
            time: "00:00:00".into(),
            host: "ci".into(),
        }
    }

    fn now() -> DateTime<Local> {
        Local.with_ymd_and_hms(2026, 1, 1, 12, 30, 0).unwrap()
    }

    #[test]
    fn test_manifest_path_replaces_extension() {
        let bin = manifest_path(Path::new("/b/app.bin"));
        assert_eq!(bin, Path::new("/b/app.json"));
        let bare = manifest_path(Path::new("/b/firmware"));
        assert_eq!(bare, Path::new("/b/firmware.json"));
    }

    #[test]
    fn test_build_fields() {
        let dir = tempfile::tempdir().unwrap();
        let fw = dir.path().join("app.bin");
        fs::write(&fw, vec![7u8; 4096]).unwrap();

        let m = Manifest::build(&ctx(dir.path()), &meta(), &fw, now()).unwrap();
        assert_eq!(m.version, "2.3.4");
        assert_eq!(m.build.timestamp, 1_767_225_600);
        assert_eq!(m.build.date, "2026-01-01T12:30:00.000000");
        assert_eq!(m.build.git_commit, "unknown");
        assert_eq!(m.build.environment, "production-esp32");
        assert_eq!(m.build.platform, "espressif32");
        assert_eq!(m.build.board, "esp32dev");
        assert_eq!(m.firmware.filename, "app.bin");
        assert_eq!(m.firmware.size, 4096);
        assert_eq!(m.firmware.checksum.kind, "sha256");
        let sha = checksum::sha256_file(&fw).unwrap();
        assert_eq!(m.firmware.checksum.value, sha);
        assert_eq!(m.ota.hostname, "line3");
        assert_eq!(m.ota.port, 3232);
        assert!(m.ota.password_required);
    }

    #[test]
    fn test_json_schema_names() {
        let dir = tempfile::tempdir().unwrap();
        let fw = dir.path().join("app.bin");
        fs::write(&fw, b"\x00\x01\x02").unwrap();

        let emitted = write(&ctx(dir.path()), &meta(), &fw, now()).unwrap();
        assert_eq!(emitted.path, dir.path().join("app.json"));

        let text = fs::read_to_string(&emitted.path).unwrap();
        assert!(text.starts_with("{\n  \"version\""));
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        let keys = [
            "timestamp",
            "date",
            "git_commit",
            "environment",
            "platform",
            "board",
        ];
        for key in keys {
            assert!(value["build"].get(key).is_some(), "build.{key}");
        }
        assert_eq!(value["firmware"]["checksum"]["type"], "sha256");
        assert_eq!(value["firmware"]["size"], 3);
        assert_eq!(value["ota"]["password_required"], true);
        assert_eq!(value.as_object().unwrap().len(), 4);

        assert_eq!(Manifest::load(&emitted.path).unwrap(), emitted.manifest);
    }

    #[test]
    fn test_json_firmware_is_not_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        let fw = dir.path().join("app.json");
        fs::write(&fw, b"image").unwrap();

        let err = write(&ctx(dir.path()), &meta(), &fw, now()).unwrap_err();
        assert!(err.to_string().contains("app.json"));
        assert_eq!(fs::read(&fw).unwrap(), b"image");
    }

    #[test]
    fn test_missing_firmware_propagates() {
        let dir = tempfile::tempdir().unwrap();
        let fw = dir.path().join("absent.bin");
        assert!(write(&ctx(dir.path()), &meta(), &fw, now()).is_err());
        assert!(!manifest_path(&fw).exists());
    }
}
