//! Build context: the read-only snapshot every pipeline phase works from.
//!
//! Built once per invocation from `fwbuild.toml`, the selected environment and
//! the project directory, then passed by reference. Nothing mutates it.

use crate::config::{EnvConfig, ProjectConfig};
use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

pub const DEFAULT_APP_VERSION: &str = "1.0.0";
pub const DEFAULT_OTA_HOSTNAME: &str = "esp32-ota";
pub const DEFAULT_OTA_PORT: u16 = 3232;

const UNKNOWN: &str = "unknown";

/// Build profile derived from the environment name.
///
/// Matching is a substring test, checked in order: any name containing
/// `production` is [`Profile::Production`] (so `production-esp32` qualifies),
/// otherwise any name containing `staging` is [`Profile::Staging`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Profile {
    Production,
    Staging,
    Development,
}

impl Profile {
    pub fn from_environment(name: &str) -> Self {
        if name.contains("production") {
            Self::Production
        } else if name.contains("staging") {
            Self::Staging
        } else {
            Self::Development
        }
    }

    /// Only production builds are bundled into a release package.
    pub fn packages_release(self) -> bool {
        matches!(self, Self::Production)
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Production => "production",
            Self::Staging => "staging",
            Self::Development => "development",
        })
    }
}

#[derive(Debug, Clone)]
pub struct BuildContext {
    environment: String,
    platform: String,
    board: String,
    build_type: String,
    defines: BTreeMap<String, String>,
    ram: u64,
    flash: u64,
    dependencies: Vec<String>,
    project_dir: PathBuf,
    ota_port: u16,
}

impl BuildContext {
    /// Resolve `environment` against the project config.
    pub fn from_config(
        config: &ProjectConfig,
        environment: &str,
        project_dir: &Path,
    ) -> Result<Self> {
        Self::from_env_config(&config.resolve_env(environment), environment, project_dir)
    }

    pub fn from_env_config(env: &EnvConfig, environment: &str, project_dir: &Path) -> Result<Self> {
        let defines: BTreeMap<String, String> = env
            .defines
            .iter()
            .map(|(k, v)| (k.clone(), unquote(&v.to_string()).to_string()))
            .collect();

        let ota_port = match defines.get("OTA_PORT") {
            Some(raw) => raw
                .parse::<u16>()
                .with_context(|| format!("Invalid OTA_PORT for {environment}: {raw:?}"))?,
            None => DEFAULT_OTA_PORT,
        };

        Ok(Self {
            environment: environment.to_string(),
            platform: env.platform.clone().unwrap_or_else(|| UNKNOWN.to_string()),
            board: env.board.clone().unwrap_or_else(|| UNKNOWN.to_string()),
            build_type: env.build_type.clone().unwrap_or_else(|| "release".to_string()),
            defines,
            ram: env.ram.unwrap_or(0),
            flash: env.flash.unwrap_or(0),
            dependencies: env.lib_deps.clone(),
            project_dir: project_dir.to_path_buf(),
            ota_port,
        })
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn platform(&self) -> &str {
        &self.platform
    }

    pub fn board(&self) -> &str {
        &self.board
    }

    pub fn build_type(&self) -> &str {
        &self.build_type
    }

    pub fn defines(&self) -> &BTreeMap<String, String> {
        &self.defines
    }

    pub fn define(&self, name: &str) -> Option<&str> {
        self.defines.get(name).map(String::as_str)
    }

    /// Declared RAM budget in bytes.
    pub fn ram(&self) -> u64 {
        self.ram
    }

    /// Declared flash budget in bytes.
    pub fn flash(&self) -> u64 {
        self.flash
    }

    pub fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    pub fn project_dir(&self) -> &Path {
        &self.project_dir
    }

    pub fn profile(&self) -> Profile {
        Profile::from_environment(&self.environment)
    }

    pub fn app_version(&self) -> &str {
        self.define("APP_VERSION").unwrap_or(DEFAULT_APP_VERSION)
    }

    pub fn ota_hostname(&self) -> &str {
        self.define("OTA_HOSTNAME").unwrap_or(DEFAULT_OTA_HOSTNAME)
    }

    pub fn ota_port(&self) -> u16 {
        self.ota_port
    }

    /// Per-environment scratch directory for state handed from pre-build to
    /// post-build.
    pub fn state_dir(&self) -> PathBuf {
        self.project_dir.join(".fwbuild").join(&self.environment)
    }
}

/// Strip one pair of surrounding double quotes (`"\"esp32-ota\""` style defines).
fn unquote(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
}
