//! Build metadata injection.
//!
//! Resolves the build timestamp, commit identifier and host/date/time facts
//! once per invocation and hands them to later phases explicitly. Pre-build
//! persists the record under the environment's state directory so that
//! post-build reports the same timestamp and commit.

use crate::context::BuildContext;
use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

pub const UNKNOWN_COMMIT: &str = "unknown";

const BUILD_INFO_FILE: &str = "build_info.json";
const BUILD_FLAGS_FILE: &str = "build_flags.txt";

/// Source of a short revision identifier for the project checkout.
pub trait RevisionProvider {
    /// `None` when no revision can be determined.
    fn short_revision(&self) -> Option<String>;
}

/// Asks git for `rev-parse --short HEAD` inside the project directory.
pub struct GitRevision {
    repo: PathBuf,
}

impl GitRevision {
    pub fn new(repo: &Path) -> Self {
        Self {
            repo: repo.to_path_buf(),
        }
    }
}

impl RevisionProvider for GitRevision {
    fn short_revision(&self) -> Option<String> {
        let output = Command::new("git")
            .args(["rev-parse", "--short", "HEAD"])
            .current_dir(&self.repo)
            .stderr(Stdio::null())
            .output()
            .ok()?;
        if !output.status.success() {
            return None;
        }
        let rev = String::from_utf8_lossy(&output.stdout).trim().to_string();
        (!rev.is_empty()).then_some(rev)
    }
}

/// A provider that always answers with the same value.
pub struct FixedRevision(pub Option<String>);

impl RevisionProvider for FixedRevision {
    fn short_revision(&self) -> Option<String> {
        self.0.clone()
    }
}

/// Values supplied by the caller that take precedence over anything generated.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub timestamp: Option<i64>,
    pub commit: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildMetadata {
    /// Seconds since the Unix epoch.
    pub timestamp: i64,
    pub commit: String,
    /// `YYYY-MM-DD`
    pub date: String,
    /// `HH:MM:SS`
    pub time: String,
    pub host: String,
}

impl BuildMetadata {
    /// Generate metadata from the wall clock, host name and `revision`,
    /// keeping any value already present in `overrides`.
    pub fn inject(overrides: &Overrides, revision: &dyn RevisionProvider) -> Self {
        Self::inject_at(overrides, revision, Local::now(), &host_name())
    }

    pub fn inject_at(
        overrides: &Overrides,
        revision: &dyn RevisionProvider,
        now: DateTime<Local>,
        host: &str,
    ) -> Self {
        let timestamp = overrides.timestamp.unwrap_or_else(|| now.timestamp());
        let commit = match overrides.commit.as_deref().filter(|c| !c.is_empty()) {
            Some(commit) => commit.to_string(),
            None => revision.short_revision().unwrap_or_else(|| {
                tracing::warn!("commit identifier unavailable, using \"{UNKNOWN_COMMIT}\"");
                UNKNOWN_COMMIT.to_string()
            }),
        };

        Self {
            timestamp,
            commit,
            date: now.format("%Y-%m-%d").to_string(),
            time: now.format("%H:%M:%S").to_string(),
            host: host.to_string(),
        }
    }

    /// Metadata for the post-build phase: overrides first, then whatever
    /// pre-build persisted, and only then freshly generated values.
    pub fn resolve(
        ctx: &BuildContext,
        overrides: &Overrides,
        revision: &dyn RevisionProvider,
    ) -> Self {
        match Self::load(ctx) {
            Ok(Some(mut persisted)) => {
                if let Some(ts) = overrides.timestamp {
                    persisted.timestamp = ts;
                }
                if let Some(commit) = overrides.commit.as_deref().filter(|c| !c.is_empty()) {
                    persisted.commit = commit.to_string();
                }
                persisted
            }
            Ok(None) => Self::inject(overrides, revision),
            Err(e) => {
                tracing::warn!("ignoring unreadable build info: {e:#}");
                Self::inject(overrides, revision)
            }
        }
    }

    /// Compile-time string definitions derived from this build.
    pub fn defines(&self) -> [(&'static str, &str); 3] {
        [
            ("BUILD_DATE", self.date.as_str()),
            ("BUILD_TIME", self.time.as_str()),
            ("BUILD_HOST", self.host.as_str()),
        ]
    }

    /// Compiler flags for [`BuildMetadata::defines`], one per line, in
    /// response-file form (`@build_flags.txt`).
    pub fn build_flags(&self) -> String {
        self.defines()
            .iter()
            .fold(String::new(), |mut out, (name, value)| {
                let _ = writeln!(out, "-D{name}=\\\"{}\\\"", escape_define(value));
                out
            })
    }

    /// Write `build_info.json` and `build_flags.txt` into the environment's
    /// state directory, replacing whatever a previous build left there.
    pub fn persist(&self, ctx: &BuildContext) -> Result<PathBuf> {
        let dir = ctx.state_dir();
        fs::create_dir_all(&dir).with_context(|| format!("Failed to create {}", dir.display()))?;

        let info = dir.join(BUILD_INFO_FILE);
        let json = serde_json::to_string_pretty(self)?;
        fs::write(&info, json + "\n")
            .with_context(|| format!("Failed to write {}", info.display()))?;

        let flags = dir.join(BUILD_FLAGS_FILE);
        fs::write(&flags, self.build_flags())
            .with_context(|| format!("Failed to write {}", flags.display()))?;

        Ok(flags)
    }

    pub fn load(ctx: &BuildContext) -> Result<Option<Self>> {
        let info = ctx.state_dir().join(BUILD_INFO_FILE);
        if !info.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&info)
            .with_context(|| format!("Failed to read {}", info.display()))?;
        let metadata = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", info.display()))?;
        Ok(Some(metadata))
    }
}

/// Quotes and backslashes would break a C string literal, so they are dropped.
pub(crate) fn escape_define(value: &str) -> String {
    value.replace(['\\', '"'], "")
}

/// Best-effort host name lookup.
pub fn host_name() -> String {
    if let Ok(name) = fs::read_to_string("/proc/sys/kernel/hostname") {
        let name = name.trim();
        if !name.is_empty() {
            return name.to_string();
        }
    }

    Command::new("hostname")
        .stderr(Stdio::null())
        .output()
        .ok()
        .filter(|out| out.status.success())
        .map(|out| String::from_utf8_lossy(&out.stdout).trim().to_string())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}
