//! # syncstack - infrastructure for an S3 sync server
//!
//! syncstack declares a small AWS deployment as three CloudFormation stacks
//! and synthesizes them into a cloud assembly for an external provisioning
//! engine to deploy. No cloud API is called.
//!
//! ## Stacks
//!
//! - **Network**: a VPC with one public and one private-with-egress subnet
//!   group and an S3 gateway endpoint, or an existing VPC resolved by name
//! - **Bastion**: an SSH jump host in the public subnet
//! - **Private host**: the sync server in the private subnet, reachable over
//!   SSH from the bastion only, allowed to list and read one bucket, and
//!   bootstrapped with a first-boot script that installs the sync client
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │     Context (cdk.json + -c overrides) -> typed Settings       │
//! └──────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌──────────────┐  NetworkHandle  ┌──────────────┐  SecurityGroupHandle
//! │   Network    │ ──────────────▶ │   Bastion    │ ─────────────┐
//! └──────────────┘        │        └──────────────┘              ▼
//!                         └──────────────────────────▶ ┌──────────────┐
//!                                                      │ Private host │
//!                                                      └──────────────┘
//!                               │
//!                               ▼
//! ┌──────────────────────────────────────────────────────────────┐
//! │   CloudAssembly: {stack}.template.json + manifest.json        │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Example
//!
//! ```rust,no_run
//! use syncstack::prelude::*;
//!
//! # async fn run() -> syncstack::error::Result<()> {
//! let mut context = Context::load_app_file("cdk.json")?;
//! context.apply_overrides(&["bucket_name=my-sync-bucket"])?;
//!
//! let settings = Settings::from_context(&context)?;
//! let lookups = LookupCache::load("cdk.context.json")?;
//! let app = App::from_settings(settings, Environment::from_env(), &lookups)?;
//!
//! app.synth()?.write_to("cdk.out").await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

// Re-export commonly used items in prelude
pub mod prelude {
    //! Convenient re-exports for building and synthesizing the deployment.
    //!
    //! ```rust
    //! use syncstack::prelude::*;
    //! ```

    pub use crate::app::App;
    pub use crate::assembly::CloudAssembly;
    pub use crate::context::Context;
    pub use crate::environment::Environment;
    pub use crate::error::{Error, Result};
    pub use crate::lookup::LookupCache;
    pub use crate::settings::Settings;
    pub use crate::stack::Stack;
    pub use crate::token::Token;
}

// ============================================================================
// Core
// ============================================================================

/// Error types and result aliases for syncstack operations.
pub mod error;

/// CloudFormation value tokens and cross-stack imports.
pub mod token;

/// Stacks: resources, parameters, outputs, and dependencies of one
/// deployable unit.
pub mod stack;

/// Target account and region.
pub mod environment;

/// Stack dependency graph.
pub mod graph;

// ============================================================================
// Infrastructure Model
// ============================================================================

/// Typed networking, security, compute, IAM, and user data building blocks.
pub mod model;

/// Context lookups answered from the lookup cache.
pub mod lookup;

// ============================================================================
// Deployment
// ============================================================================

/// Deployment context from the app file and command line.
pub mod context;

/// Typed settings parsed from the deployment context.
pub mod settings;

/// Builders of the network, bastion, and private host stacks.
pub mod stacks;

/// The app tying all stacks together.
pub mod app;

/// Synthesized cloud assembly and its manifest.
pub mod assembly;

// ============================================================================
// Configuration
// ============================================================================

/// Configuration of the tool itself.
///
/// Handles loading and merging configuration from config files and
/// environment variables.
pub mod config;

// ============================================================================
// Version Information
// ============================================================================

/// Returns the current version of syncstack.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// Returns detailed version information.
pub fn version_info() -> VersionInfo {
    VersionInfo {
        version: env!("CARGO_PKG_VERSION"),
        rust_version: option_env!("CARGO_PKG_RUST_VERSION").unwrap_or("unknown"),
        target: std::env::consts::ARCH,
        profile: if cfg!(debug_assertions) {
            "debug"
        } else {
            "release"
        },
    }
}

/// Detailed version information for the syncstack build.
#[derive(Debug, Clone)]
pub struct VersionInfo {
    /// Semantic version string
    pub version: &'static str,
    /// Minimum Rust version required
    pub rust_version: &'static str,
    /// Target architecture of the build
    pub target: &'static str,
    /// Build profile (debug or release)
    pub profile: &'static str,
}

impl std::fmt::Display for VersionInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "syncstack {} ({}, {})",
            self.version, self.target, self.profile
        )
    }
}
