//! Release package assembly.
//!
//! Layout: `<project>/releases/<environment>/<YYYYMMDD_HHMMSS>/` holding the
//! firmware, its manifest and an installation README. A failure at any step
//! leaves a partial directory behind; callers must treat it as invalid.

use super::manifest::{EmittedManifest, Manifest};
use super::metadata::BuildMetadata;
use crate::context::BuildContext;
use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use std::fs::{self, File, FileTimes};
use std::path::{Path, PathBuf};

pub const RELEASES_DIR: &str = "releases";
pub const README_FILE: &str = "README.md";

/// Flash offset of the application partition, used in the esptool hint.
pub const APP_FLASH_OFFSET: &str = "0x10000";

/// `<project>/releases/<environment>/<YYYYMMDD_HHMMSS>`
pub fn package_dir(ctx: &BuildContext, now: DateTime<Local>) -> PathBuf {
    ctx.project_dir()
        .join(RELEASES_DIR)
        .join(ctx.environment())
        .join(now.format("%Y%m%d_%H%M%S").to_string())
}

/// Assemble a release package from `firmware` and the manifest already
/// emitted for it. The manifest file is moved into the package.
pub fn create(
    ctx: &BuildContext,
    meta: &BuildMetadata,
    firmware: &Path,
    emitted: &EmittedManifest,
    now: DateTime<Local>,
) -> Result<PathBuf> {
    let dir = package_dir(ctx, now);
    fs::create_dir_all(&dir).with_context(|| format!("Failed to create {}", dir.display()))?;

    let firmware_name = file_name(firmware)?;
    let firmware_dest = dir.join(&firmware_name);
    copy_preserving(firmware, &firmware_dest)?;
    tracing::debug!(dest = %firmware_dest.display(), "firmware copied");

    let manifest_dest = dir.join(file_name(&emitted.path)?);
    move_file(&emitted.path, &manifest_dest)?;
    tracing::debug!(dest = %manifest_dest.display(), "manifest moved");

    let readme = dir.join(README_FILE);
    fs::write(&readme, render_readme(ctx, meta, &emitted.manifest, now))
        .with_context(|| format!("Failed to write {}", readme.display()))?;

    tracing::info!(dir = %dir.display(), "release package created");
    Ok(dir)
}

/// Installation notes shipped with every package.
pub fn render_readme(
    ctx: &BuildContext,
    meta: &BuildMetadata,
    manifest: &Manifest,
    now: DateTime<Local>,
) -> String {
    let env = ctx.environment();
    let firmware = &manifest.firmware.filename;
    let manifest_name = Path::new(firmware)
        .with_extension(super::manifest::MANIFEST_EXTENSION)
        .to_string_lossy()
        .into_owned();

    format!(
        r"# Firmware Update Package

## Version Information
- Environment: {env}
- Build Date: {date}
- Git Commit: {commit}

## Files
- `{firmware}` - Firmware binary
- `{manifest_name}` - Build manifest with checksums

## Installation

### Via OTA Upload:
```bash
pio run -e {env} --target uploadota
```

### Via esptool:
```bash
esptool.py write_flash {APP_FLASH_OFFSET} {firmware}
```

## Verification
SHA256: {sha}
",
        date = now.format("%Y-%m-%d %H:%M:%S"),
        commit = meta.commit,
        sha = manifest.firmware.checksum.value,
    )
}

fn file_name(path: &Path) -> Result<String> {
    Ok(path
        .file_name()
        .with_context(|| format!("Path has no file name: {}", path.display()))?
        .to_string_lossy()
        .into_owned())
}

/// Copy contents and permission bits, then carry over access/modification
/// times. The copy may already be read-only at that point, so the times are
/// set through a read handle.
fn copy_preserving(src: &Path, dest: &Path) -> Result<()> {
    fs::copy(src, dest)
        .with_context(|| format!("Failed to copy {} to {}", src.display(), dest.display()))?;

    let meta = fs::metadata(src).with_context(|| format!("Failed to stat {}", src.display()))?;
    let mut times = FileTimes::new();
    if let Ok(accessed) = meta.accessed() {
        times = times.set_accessed(accessed);
    }
    if let Ok(modified) = meta.modified() {
        times = times.set_modified(modified);
    }

    File::open(dest)
        .and_then(|f| f.set_times(times))
        .with_context(|| format!("Failed to set timestamps on {}", dest.display()))?;
    Ok(())
}

/// Rename, falling back to copy + remove when the rename is refused
/// (typically across filesystems).
fn move_file(src: &Path, dest: &Path) -> Result<()> {
    if fs::rename(src, dest).is_ok() {
        return Ok(());
    }
    fs::copy(src, dest)
        .with_context(|| format!("Failed to move {} to {}", src.display(), dest.display()))?;
    fs::remove_file(src).with_context(|| format!("Failed to remove {}", src.display()))?;
    Ok(())
}
