//! Project-wide build metrics (`build_metrics.json`).
//!
//! Overwritten on every post-build; not a history. External dashboards read
//! it, nothing in the pipeline does.

use crate::context::BuildContext;
use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

pub const METRICS_FILE: &str = "build_metrics.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metrics {
    pub build_time: String,
    pub memory_usage: MemoryUsage,
    pub dependencies: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryUsage {
    pub ram: u64,
    pub flash: u64,
}

impl Metrics {
    pub fn collect(ctx: &BuildContext, now: DateTime<Local>) -> Self {
        Self {
            build_time: now.format("%Y-%m-%dT%H:%M:%S%.6f").to_string(),
            memory_usage: MemoryUsage {
                ram: ctx.ram(),
                flash: ctx.flash(),
            },
            dependencies: ctx.dependencies().to_vec(),
        }
    }
}

pub fn metrics_path(ctx: &BuildContext) -> PathBuf {
    ctx.project_dir().join(METRICS_FILE)
}

/// Replace the project's metrics document with this run's figures.
pub fn record(ctx: &BuildContext, now: DateTime<Local>) -> Result<PathBuf> {
    let metrics = Metrics::collect(ctx, now);
    let path = metrics_path(ctx);
    let json = serde_json::to_string_pretty(&metrics)? + "\n";
    fs::write(&path, json).with_context(|| format!("Failed to write {}", path.display()))?;
    tracing::debug!(path = %path.display(), "build metrics recorded");
    Ok(path)
}
