//! Project configuration file support.
//!
//! Reads `fwbuild.toml` from the project root. The file declares the build
//! environments (platform, board, memory budgets, library dependencies and
//! compile-time defines) that the pipeline phases read through
//! [`BuildContext`](crate::context::BuildContext).

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;

pub const CONFIG_FILE: &str = "fwbuild.toml";

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProjectConfig {
    #[serde(default)]
    pub project: ProjectSection,

    /// Defaults inherited by every environment.
    #[serde(default)]
    pub common: EnvConfig,

    #[serde(default)]
    pub env: BTreeMap<String, EnvConfig>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProjectSection {
    /// Environment used when `--env` is not given.
    #[serde(default)]
    pub default_env: Option<String>,
}

/// One `[env.<name>]` table (or the `[common]` table).
///
/// Every field is optional so that an environment only has to spell out what
/// differs from `[common]`.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EnvConfig {
    #[serde(default)]
    pub platform: Option<String>,

    #[serde(default)]
    pub board: Option<String>,

    #[serde(default)]
    pub build_type: Option<String>,

    /// Declared RAM budget in bytes.
    #[serde(default)]
    pub ram: Option<u64>,

    /// Declared flash budget in bytes.
    #[serde(default)]
    pub flash: Option<u64>,

    #[serde(default)]
    pub lib_deps: Vec<String>,

    #[serde(default)]
    pub defines: BTreeMap<String, DefineValue>,
}

/// A compile-time define as written in the config file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum DefineValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl fmt::Display for DefineValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{}", u8::from(*b)),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Str(s) => f.write_str(s),
        }
    }
}

impl EnvConfig {
    /// Layer `self` on top of `base`: scalar fields override, defines merge
    /// key-by-key, and `lib_deps` keep the base order followed by new entries.
    #[must_use]
    pub fn merged_over(&self, base: &EnvConfig) -> EnvConfig {
        let mut defines = base.defines.clone();
        defines.extend(self.defines.iter().map(|(k, v)| (k.clone(), v.clone())));

        let mut lib_deps = base.lib_deps.clone();
        for dep in &self.lib_deps {
            if !lib_deps.contains(dep) {
                lib_deps.push(dep.clone());
            }
        }

        EnvConfig {
            platform: self.platform.clone().or_else(|| base.platform.clone()),
            board: self.board.clone().or_else(|| base.board.clone()),
            build_type: self.build_type.clone().or_else(|| base.build_type.clone()),
            ram: self.ram.or(base.ram),
            flash: self.flash.or(base.flash),
            lib_deps,
            defines,
        }
    }
}

impl ProjectConfig {
    /// Load `fwbuild.toml` from the project directory (or use defaults if it
    /// doesn't exist).
    pub fn load(project_dir: &Path) -> Result<Self> {
        let path = project_dir.join(CONFIG_FILE);
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load_file(&path)
    }

    /// Load an explicitly named config file. Unlike [`ProjectConfig::load`],
    /// a missing file is an error.
    pub fn load_file(path: &Path) -> Result<Self> {
        let content =
            fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Failed to parse {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Pick the environment to build: explicit request, then
    /// `project.default_env`, then the only declared environment.
    pub fn select_env(&self, requested: Option<&str>) -> Result<String> {
        if let Some(name) = requested.filter(|n| !n.is_empty()) {
            return Ok(name.to_string());
        }
        if let Some(name) = &self.project.default_env {
            return Ok(name.clone());
        }
        let mut names = self.env.keys();
        match (names.next(), names.next()) {
            (Some(only), None) => Ok(only.clone()),
            (None, _) => bail!(
                "No build environment selected; pass --env <name> or declare one in {CONFIG_FILE}"
            ),
            (Some(_), Some(_)) => bail!(
                "Multiple environments declared ({}); pass --env <name> or set project.default_env",
                self.env.keys().cloned().collect::<Vec<_>>().join(", ")
            ),
        }
    }

    /// Resolved settings for `name`, with `[common]` applied underneath.
    /// Undeclared names resolve to the `[common]` defaults alone.
    pub fn resolve_env(&self, name: &str) -> EnvConfig {
        if let Some(env) = self.env.get(name) {
            return env.merged_over(&self.common);
        }
        tracing::debug!(environment = name, "undeclared, using [common]");
        self.common.clone()
    }
}
