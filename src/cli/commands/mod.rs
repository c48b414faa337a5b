//! Subcommands module for syncstack CLI
//!
//! This module contains all the subcommand implementations.

pub mod graph;
pub mod list;
pub mod synth;
pub mod user_data;

use crate::cli::output::{OutputFormatter, Palette};
use anyhow::{Context as _, Result};
use std::path::PathBuf;
use syncstack::app::App;
use syncstack::config::Config;
use syncstack::context::Context;
use syncstack::environment::Environment;
use syncstack::lookup::LookupCache;
use syncstack::settings::Settings;

/// Common context shared between commands
pub struct CommandContext {
    /// Configuration
    pub config: Config,
    /// Output formatter
    pub output: OutputFormatter,
    /// Context overrides from `-c`
    pub context_overrides: Vec<String>,
    /// Verbosity level
    pub verbosity: u8,
}

impl CommandContext {
    /// Create a new command context from CLI arguments
    pub fn new(cli: &crate::cli::Cli, mut config: Config) -> Self {
        if let Some(app) = &cli.app {
            config.synth.app = app.clone();
        }
        let use_color = !cli.no_color && config.colors.enabled;
        let output = OutputFormatter::new(use_color, cli.is_json(), cli.verbosity())
            .with_palette(Palette::from_config(&config.colors));

        Self {
            config,
            output,
            context_overrides: cli.context.clone(),
            verbosity: cli.verbosity(),
        }
    }

    /// App file in effect
    pub fn app_file(&self) -> &PathBuf {
        &self.config.synth.app
    }

    /// Load the deployment context: the app file's context table, then `-c`
    /// overrides on top
    pub fn load_context(&self) -> Result<Context> {
        let mut context = Context::load_app_file(self.app_file())
            .with_context(|| format!("Failed to load app file: {}", self.app_file().display()))?;
        context.apply_overrides(&self.context_overrides)?;
        self.output.debug(&format!(
            "Context keys: {}",
            context.keys().collect::<Vec<_>>().join(", ")
        ));
        Ok(context)
    }

    /// Build the app from context, lookup cache, and environment
    pub fn build_app(&self) -> Result<App> {
        let context = self.load_context()?;
        let settings = Settings::from_context(&context)?;

        let cache_path = self.config.context_cache_path();
        let lookups = LookupCache::load(&cache_path).with_context(|| {
            format!("Failed to load lookup cache: {}", cache_path.display())
        })?;
        self.output.debug(&format!(
            "Loaded {} cached lookups from {}",
            lookups.len(),
            cache_path.display()
        ));

        let environment = Environment::from_env();
        self.output
            .info(&format!("Target environment: {}", environment));

        Ok(App::from_settings(settings, environment, &lookups)?)
    }
}

/// Trait for runnable commands
#[async_trait::async_trait]
pub trait Runnable: Send + Sync {
    /// Execute the command
    async fn run(&self, ctx: &mut CommandContext) -> Result<i32>;
}
