//! Firmware build-artifact pipeline.
//!
//! Pre-build validates the build environment and stamps version/build
//! metadata into the compiled output; post-build checksums the linked image,
//! writes its manifest, bundles production builds into a release directory
//! and records build metrics.

pub mod config;
pub mod context;
pub mod pipeline;
