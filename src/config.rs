//! Tool configuration for syncstack
//!
//! Handles loading and merging configuration from multiple sources:
//! - Default values
//! - User configuration (~/.syncstack.toml)
//! - Project configuration (./syncstack.toml)
//! - The file named by `SYNCSTACK_CONFIG`
//! - Environment variables
//!
//! This is configuration of the tool itself: where the app file lives, where
//! the assembly is written, how output looks. Deployment settings live in
//! the app file's context table (see [`crate::context`]).

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "SYNCSTACK_CONFIG";
/// Environment variable overriding the assembly output directory.
pub const OUTPUT_ENV: &str = "SYNCSTACK_OUTPUT";
/// Environment variable overriding the app file.
pub const APP_ENV: &str = "SYNCSTACK_APP";
/// Environment variable overriding the log level.
pub const LOG_LEVEL_ENV: &str = "SYNCSTACK_LOG_LEVEL";

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Synthesis settings
    pub synth: SynthConfig,

    /// Colors and output settings
    pub colors: ColorsConfig,

    /// Logging settings
    pub logging: LoggingConfig,
}

/// Synthesis settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthConfig {
    /// App file holding the deployment context
    pub app: PathBuf,

    /// Lookup cache
    pub context_cache: PathBuf,

    /// Directory the cloud assembly is written to
    pub output: PathBuf,
}

impl Default for SynthConfig {
    fn default() -> Self {
        Self {
            app: PathBuf::from("cdk.json"),
            context_cache: PathBuf::from("cdk.context.json"),
            output: PathBuf::from("cdk.out"),
        }
    }
}

/// Colors configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorsConfig {
    /// Enable colors
    pub enabled: bool,

    /// Highlight color
    pub highlight: String,

    /// Warning color
    pub warn: String,

    /// Error color
    pub error: String,

    /// OK color
    pub ok: String,
}

impl Default for ColorsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            highlight: "white".to_string(),
            warn: "bright_purple".to_string(),
            error: "red".to_string(),
            ok: "green".to_string(),
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level used when `-v` is not given and `RUST_LOG` is unset
    pub log_level: String,

    /// Emit JSON log lines
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_level: "warn".to_string(),
            json: false,
        }
    }
}

impl Config {
    /// Load configuration from all sources. An explicit path replaces the
    /// user, project, and `SYNCSTACK_CONFIG` files.
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        let mut config = Config::default();

        for path in Self::get_config_paths(config_path) {
            if path.exists() {
                config = config.merge_from_file(&path)?;
            }
        }

        config.apply_env_overrides();

        Ok(config)
    }

    /// Get the list of configuration file paths to check, lowest precedence
    /// first
    fn get_config_paths(explicit_path: Option<&PathBuf>) -> Vec<PathBuf> {
        let mut paths = Vec::new();

        // Explicit path takes priority
        if let Some(path) = explicit_path {
            paths.push(path.clone());
            return paths;
        }

        // User config
        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".syncstack.toml"));
        }

        // Project config (current directory)
        paths.push(PathBuf::from("syncstack.toml"));

        // Environment variable
        if let Ok(env_config) = std::env::var(CONFIG_ENV) {
            paths.push(PathBuf::from(env_config));
        }

        paths
    }

    /// Merge configuration from a file
    fn merge_from_file(&self, path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        // Determine format based on extension
        let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");

        let file_config: Config = match extension {
            "yml" | "yaml" => serde_yaml::from_str(&content)?,
            "json" => serde_json::from_str(&content)?,
            "toml" => toml::from_str(&content)?,
            _ => toml::from_str(&content)
                .or_else(|_| serde_yaml::from_str(&content))
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?,
        };

        Ok(self.merge(file_config))
    }

    /// Merge another config into this one; non-default values in `other`
    /// take precedence
    fn merge(&self, other: Config) -> Config {
        let synth_defaults = SynthConfig::default();
        let colors_defaults = ColorsConfig::default();
        let logging_defaults = LoggingConfig::default();

        let pick = |theirs: &PathBuf, ours: &PathBuf, default: &PathBuf| {
            if theirs != default {
                theirs.clone()
            } else {
                ours.clone()
            }
        };
        let pick_str = |theirs: &String, ours: &String, default: &String| {
            if theirs != default {
                theirs.clone()
            } else {
                ours.clone()
            }
        };

        Config {
            synth: SynthConfig {
                app: pick(&other.synth.app, &self.synth.app, &synth_defaults.app),
                context_cache: pick(
                    &other.synth.context_cache,
                    &self.synth.context_cache,
                    &synth_defaults.context_cache,
                ),
                output: pick(&other.synth.output, &self.synth.output, &synth_defaults.output),
            },
            colors: ColorsConfig {
                enabled: self.colors.enabled && other.colors.enabled,
                highlight: pick_str(
                    &other.colors.highlight,
                    &self.colors.highlight,
                    &colors_defaults.highlight,
                ),
                warn: pick_str(&other.colors.warn, &self.colors.warn, &colors_defaults.warn),
                error: pick_str(&other.colors.error, &self.colors.error, &colors_defaults.error),
                ok: pick_str(&other.colors.ok, &self.colors.ok, &colors_defaults.ok),
            },
            logging: LoggingConfig {
                log_level: pick_str(
                    &other.logging.log_level,
                    &self.logging.log_level,
                    &logging_defaults.log_level,
                ),
                json: self.logging.json || other.logging.json,
            },
        }
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        // SYNCSTACK_OUTPUT
        if let Ok(dir) = std::env::var(OUTPUT_ENV) {
            self.synth.output = PathBuf::from(dir);
        }

        // SYNCSTACK_APP
        if let Ok(app) = std::env::var(APP_ENV) {
            self.synth.app = PathBuf::from(app);
        }

        // SYNCSTACK_LOG_LEVEL
        if let Ok(level) = std::env::var(LOG_LEVEL_ENV) {
            self.logging.log_level = level;
        }

        // NO_COLOR
        if std::env::var("NO_COLOR").is_ok() {
            self.colors.enabled = false;
        }
    }

    /// Defaults with environment overrides applied, for when no config file
    /// could be read
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load from a specific file, without environment overrides
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        Config::default().merge_from_file(path.as_ref())
    }

    /// Lookup cache path, resolved next to the app file when relative
    pub fn context_cache_path(&self) -> PathBuf {
        if self.synth.context_cache.is_absolute() {
            return self.synth.context_cache.clone();
        }
        match self.synth.app.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.join(&self.synth.context_cache),
            _ => self.synth.context_cache.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.synth.app, PathBuf::from("cdk.json"));
        assert_eq!(config.synth.output, PathBuf::from("cdk.out"));
        assert!(config.colors.enabled);
        assert_eq!(config.logging.log_level, "warn");
    }

    #[test]
    fn test_config_merge() {
        let base = Config {
            synth: SynthConfig {
                output: PathBuf::from("build"),
                ..SynthConfig::default()
            },
            ..Config::default()
        };
        let other = Config {
            synth: SynthConfig {
                app: PathBuf::from("infra/cdk.json"),
                ..SynthConfig::default()
            },
            ..Config::default()
        };

        let merged = base.merge(other);
        assert_eq!(merged.synth.app, PathBuf::from("infra/cdk.json"));
        assert_eq!(merged.synth.output, PathBuf::from("build"));
    }

    #[test]
    fn test_context_cache_next_to_app() {
        let mut config = Config::default();
        assert_eq!(config.context_cache_path(), PathBuf::from("cdk.context.json"));

        config.synth.app = PathBuf::from("infra/cdk.json");
        assert_eq!(
            config.context_cache_path(),
            PathBuf::from("infra/cdk.context.json")
        );
    }

    #[test]
    fn test_from_yaml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("syncstack.yaml");
        std::fs::write(&path, "synth:\n  output: dist\nlogging:\n  json: true\n").unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.synth.output, PathBuf::from("dist"));
        assert!(config.logging.json);
        assert_eq!(config.synth.app, PathBuf::from("cdk.json"));
    }
}
