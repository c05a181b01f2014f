//! # fwbuild
//!
//! Firmware build-artifact pipeline, invoked by the build system around
//! compilation.
//!
//! ## Usage
//!
//! ```bash
//! fwbuild --env production-esp32 pre-build              # validate + version.h + build flags
//! fwbuild --env production-esp32 post-build app.bin     # manifest, release package, metrics
//! fwbuild checksum app.bin                              # print sha256
//! fwbuild --env staging context                         # show resolved build context
//! ```
//!
//! Credentials and overrides come from flags or their environment variables
//! (`PROD_WIFI_SSID`, `PROD_WIFI_PASS`, `PROD_OTA_PASS`, `DEVICE_ID`,
//! `BUILD_TIMESTAMP`, `GIT_COMMIT`).

use anyhow::Result;
use clap::{Args, Parser};
use fwbuild::config::ProjectConfig;
use fwbuild::context::BuildContext;
use fwbuild::pipeline::metadata::{GitRevision, Overrides};
use fwbuild::pipeline::validate::Credentials;
use fwbuild::pipeline::{self, checksum, PipelineCommands};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "fwbuild", about = "Firmware build-artifact pipeline")]
struct Cli {
    /// Project root (defaults to the current directory)
    #[arg(long, global = true)]
    project_dir: Option<PathBuf>,

    /// Project config file (defaults to <project>/fwbuild.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Build environment name
    #[arg(long = "env", env = "FWBUILD_ENV", global = true)]
    environment: Option<String>,

    /// Debug-level diagnostics on stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(flatten)]
    options: BuildOptions,

    #[command(subcommand)]
    command: PipelineCommands,
}

/// Credentials and metadata overrides; each flag falls back to its
/// environment variable.
#[derive(Args)]
struct BuildOptions {
    #[arg(
        long,
        env = "PROD_WIFI_SSID",
        hide_env_values = true,
        global = true
    )]
    wifi_ssid: Option<String>,

    #[arg(
        long,
        env = "PROD_WIFI_PASS",
        hide_env_values = true,
        global = true
    )]
    wifi_password: Option<String>,

    #[arg(
        long,
        env = "PROD_OTA_PASS",
        hide_env_values = true,
        global = true
    )]
    ota_password: Option<String>,

    #[arg(long, env = "DEVICE_ID", global = true)]
    device_id: Option<String>,

    /// Build timestamp override (seconds since epoch)
    #[arg(long, env = "BUILD_TIMESTAMP", global = true)]
    timestamp: Option<i64>,

    /// Commit identifier override
    #[arg(long, env = "GIT_COMMIT", global = true)]
    commit: Option<String>,
}

impl BuildOptions {
    fn credentials(&self) -> Credentials {
        Credentials {
            wifi_ssid: self.wifi_ssid.clone(),
            wifi_password: self.wifi_password.clone(),
            ota_password: self.ota_password.clone(),
            device_id: self.device_id.clone(),
        }
    }

    fn overrides(&self) -> Overrides {
        Overrides {
            timestamp: self.timestamp,
            commit: self.commit.clone().filter(|c| !c.is_empty()),
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "fwbuild=debug"
    } else {
        "fwbuild=warn"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let Cli {
        project_dir,
        config,
        environment,
        options,
        command,
        ..
    } = cli;

    match command {
        PipelineCommands::Checksum { file } => {
            println!("{}  {}", checksum::sha256_file(&file)?, file.display());
        }
        PipelineCommands::PreBuild => {
            let ctx = load_context(project_dir, config.as_deref(), environment.as_deref())?;
            let revision = GitRevision::new(ctx.project_dir());
            let credentials = options.credentials();
            pipeline::pre_build(&ctx, &credentials, &options.overrides(), &revision)?;
        }
        PipelineCommands::PostBuild { firmware } => {
            let ctx = load_context(project_dir, config.as_deref(), environment.as_deref())?;
            let revision = GitRevision::new(ctx.project_dir());
            pipeline::post_build(&ctx, &firmware, &options.overrides(), &revision)?;
        }
        PipelineCommands::Context => {
            let ctx = load_context(project_dir, config.as_deref(), environment.as_deref())?;
            pipeline::print_banner(&ctx);
            println!("RAM: {} bytes", ctx.ram());
            println!("Flash: {} bytes", ctx.flash());
            println!("Dependencies: {}", ctx.dependencies().join(", "));
            for (name, value) in ctx.defines() {
                println!("  -D{name}={value}");
            }
        }
    }

    Ok(())
}

fn load_context(
    project_dir: Option<PathBuf>,
    config: Option<&Path>,
    environment: Option<&str>,
) -> Result<BuildContext> {
    let project_dir = match project_dir {
        Some(dir) => dir,
        None => std::env::current_dir()?,
    };
    let config = match config {
        Some(path) => ProjectConfig::load_file(path)?,
        None => ProjectConfig::load(&project_dir)?,
    };
    let environment = config.select_env(environment)?;
    BuildContext::from_config(&config, &environment, &project_dir)
}
