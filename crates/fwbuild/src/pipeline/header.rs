//! Generated `include/version.h`.

use super::metadata::{escape_define, BuildMetadata};
use crate::context::BuildContext;
use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;

pub const VERSION_MAJOR: u32 = 1;
pub const VERSION_MINOR: u32 = 0;
pub const VERSION_PATCH: u32 = 1;

pub const HEADER_DIR: &str = "include";
pub const HEADER_FILE: &str = "version.h";

pub fn version_string() -> String {
    format!("{VERSION_MAJOR}.{VERSION_MINOR}.{VERSION_PATCH}")
}

/// Header text for this build. Pure function of its inputs; string values
/// lose any quote or backslash so the literals stay well-formed.
pub fn render(ctx: &BuildContext, meta: &BuildMetadata) -> String {
    format!(
        r#"
#ifndef VERSION_H
#define VERSION_H

#define VERSION_MAJOR {VERSION_MAJOR}
#define VERSION_MINOR {VERSION_MINOR}
#define VERSION_PATCH {VERSION_PATCH}
#define VERSION_STRING "{version}"

#define BUILD_TIMESTAMP {timestamp}
#define GIT_COMMIT "{commit}"
#define BUILD_ENV "{env}"

#endif // VERSION_H
"#,
        version = version_string(),
        timestamp = meta.timestamp,
        commit = escape_define(&meta.commit),
        env = escape_define(ctx.environment()),
    )
}

/// Write `<project>/include/version.h`, creating the directory if needed and
/// replacing any previous header.
pub fn emit(ctx: &BuildContext, meta: &BuildMetadata) -> Result<PathBuf> {
    let include_dir = ctx.project_dir().join(HEADER_DIR);
    fs::create_dir_all(&include_dir)
        .with_context(|| format!("Failed to create {}", include_dir.display()))?;

    let path = include_dir.join(HEADER_FILE);
    fs::write(&path, render(ctx, meta))
        .with_context(|| format!("Failed to write {}", path.display()))?;
    tracing::debug!(path = %path.display(), "version header written");
    Ok(path)
}
