//! Firmware build pipeline.
//!
//! Structure:
//! - `validate` - required credentials per build profile
//! - `metadata` - timestamp, commit and host facts, handed from pre- to post-build
//! - `header` - generated `include/version.h`
//! - `checksum` - streaming SHA-256
//! - `manifest` - `<firmware>.json` build manifest
//! - `package` - `releases/<env>/<timestamp>/` bundles (production only)
//! - `metrics` - project-wide `build_metrics.json`
//!
//! Pre-build runs before compilation, post-build once after a successful
//! link. Each phase is a single pass with no retries.

pub mod checksum;
pub mod header;
pub mod manifest;
pub mod metadata;
pub mod metrics;
pub mod package;
pub mod validate;

use crate::context::BuildContext;
use anyhow::Result;
use chrono::{DateTime, Local};
use clap::Subcommand;
use std::path::{Path, PathBuf};

use self::manifest::EmittedManifest;
use self::metadata::{BuildMetadata, Overrides, RevisionProvider};
use self::validate::Credentials;

/// Pipeline commands for the CLI.
#[derive(Subcommand)]
pub enum PipelineCommands {
    /// Validate the environment, stamp build metadata and write include/version.h
    #[command(name = "pre-build")]
    PreBuild,
    /// Checksum the firmware, write its manifest, package production builds, record metrics
    #[command(name = "post-build")]
    PostBuild {
        /// Linked firmware image (e.g. .pio/build/<env>/firmware.bin)
        firmware: PathBuf,
    },
    /// Print the SHA-256 of a file
    Checksum { file: PathBuf },
    /// Show the resolved build context
    Context,
}

/// What pre-build produced.
#[derive(Debug)]
pub struct PreBuildOutput {
    pub metadata: BuildMetadata,
    pub header: PathBuf,
    pub build_flags: PathBuf,
}

/// What post-build produced.
#[derive(Debug)]
pub struct PostBuildOutput {
    /// Final manifest location (inside the package for production builds).
    pub manifest: EmittedManifest,
    pub package: Option<PathBuf>,
    /// `None` when recording failed; that never fails the build.
    pub metrics: Option<PathBuf>,
}

pub fn print_banner(ctx: &BuildContext) {
    println!("Environment: {}", ctx.environment());
    println!("Platform: {}", ctx.platform());
    println!("Board: {}", ctx.board());
    println!("Build Type: {}", ctx.build_type());
    println!("Profile: {}", ctx.profile());
}

/// Validate -> inject metadata -> emit version header.
///
/// Validation runs first so that nothing is written for a build that is
/// going to be rejected.
pub fn pre_build(
    ctx: &BuildContext,
    credentials: &Credentials,
    overrides: &Overrides,
    revision: &dyn RevisionProvider,
) -> Result<PreBuildOutput> {
    println!("=== Pre-build: {} ===", ctx.environment());
    print_banner(ctx);

    validate::validate(ctx.profile(), credentials)?;

    let metadata = BuildMetadata::inject(overrides, revision);
    let build_flags = metadata.persist(ctx)?;
    let header = header::emit(ctx, &metadata)?;

    println!("  Timestamp: {}", metadata.timestamp);
    println!("  Commit:    {}", metadata.commit);
    println!("  Header:    {}", header.display());
    println!("  Flags:     @{}", build_flags.display());
    println!("=== Pre-build complete ===");

    Ok(PreBuildOutput {
        metadata,
        header,
        build_flags,
    })
}

/// Checksum -> manifest -> [package] -> metrics, using the metadata pre-build
/// left behind when there is one.
pub fn post_build(
    ctx: &BuildContext,
    firmware: &Path,
    overrides: &Overrides,
    revision: &dyn RevisionProvider,
) -> Result<PostBuildOutput> {
    let metadata = BuildMetadata::resolve(ctx, overrides, revision);
    post_build_at(ctx, firmware, &metadata, Local::now())
}

pub fn post_build_at(
    ctx: &BuildContext,
    firmware: &Path,
    metadata: &BuildMetadata,
    now: DateTime<Local>,
) -> Result<PostBuildOutput> {
    println!("=== Post-build: {} ===", ctx.environment());
    println!("Firmware: {}", firmware.display());

    let mut emitted = manifest::write(ctx, metadata, firmware, now)?;
    println!("Size: {} bytes", emitted.manifest.firmware.size);
    println!("Manifest: {}", emitted.path.display());

    let package = if ctx.profile().packages_release() {
        let dir = package::create(ctx, metadata, firmware, &emitted, now)?;
        if let Some(name) = emitted.path.file_name() {
            emitted.path = dir.join(name);
        }
        println!("Update package: {}", dir.display());
        Some(dir)
    } else {
        None
    };

    let metrics = match metrics::record(ctx, now) {
        Ok(path) => Some(path),
        Err(e) => {
            tracing::warn!("build metrics not recorded: {e:#}");
            None
        }
    };

    println!("=== Post-build complete ===");

    Ok(PostBuildOutput {
        manifest: emitted,
        package,
        metrics,
    })
}
