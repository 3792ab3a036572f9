//! Layered configuration system
//!
//! Config is loaded with four layers of precedence (highest wins):
//! 1. Environment variables: `PRISM_FACE_SIZE`, `PRISM_THETA_SAMPLES`, `PRISM_LOG`
//! 2. Project-local: `prism.toml`
//! 3. Global: `~/.prism/config.toml`
//! 4. Built-in defaults

use crate::{PrismError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Polar sample count the irradiance kernel is compiled with.
pub const DEFAULT_THETA_SAMPLES: u32 = 32;

/// Upper bound on polar samples; azimuth uses twice as many.
pub const MAX_THETA_SAMPLES: u32 = 4096;

/// Irradiance bake settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BakeConfig {
    /// Destination face size in texels. `None` uses half the panorama height.
    #[serde(default)]
    pub face_size: Option<u32>,
    #[serde(default = "default_theta_samples")]
    pub theta_samples: u32,
    #[serde(default)]
    pub use_gpu: bool,
}

impl Default for BakeConfig {
    fn default() -> Self {
        Self {
            face_size: None,
            theta_samples: default_theta_samples(),
            use_gpu: false,
        }
    }
}

fn default_theta_samples() -> u32 {
    DEFAULT_THETA_SAMPLES
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Top-level config file structure. Every field is optional so that a
/// layer only overrides what it mentions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PrismConfigFile {
    #[serde(default)]
    pub bake: Option<BakeFileSection>,
    #[serde(default)]
    pub log: Option<LogFileSection>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BakeFileSection {
    pub face_size: Option<u32>,
    pub theta_samples: Option<u32>,
    pub use_gpu: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogFileSection {
    pub level: Option<String>,
}

/// Resolved configuration with all layers applied
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PrismConfig {
    #[serde(default)]
    pub bake: BakeConfig,
    #[serde(default)]
    pub log: LogConfig,
}

impl PrismConfig {
    /// Load config with layered precedence: defaults < global < project < env vars
    pub fn load() -> Result<Self> {
        let mut config = PrismConfig::default();

        // Layer 1: Global config (~/.prism/config.toml)
        if let Some(global_path) = Self::global_config_path() {
            if global_path.exists() {
                let global = Self::load_file(&global_path)?;
                config.merge(global);
            }
        }

        // Layer 2: Project-local config (prism.toml)
        let local_path = PathBuf::from("prism.toml");
        if local_path.exists() {
            let local = Self::load_file(&local_path)?;
            config.merge(local);
        }

        // Layer 3: Environment variable overrides
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;

        Ok(config)
    }

    /// Load config from a specific file path on top of the defaults,
    /// then apply environment overrides
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let mut config = PrismConfig::default();
        config.merge(Self::load_file(path)?);
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a single TOML layer on top of the defaults, without env overrides
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let file: PrismConfigFile = toml::from_str(content)?;
        let mut config = PrismConfig::default();
        config.merge(file);
        config.validate()?;
        Ok(config)
    }

    /// Overlay a parsed file layer; fields absent from the layer are kept
    pub fn merge(&mut self, overlay: PrismConfigFile) {
        if let Some(bake) = overlay.bake {
            if bake.face_size.is_some() {
                self.bake.face_size = bake.face_size;
            }
            if let Some(theta) = bake.theta_samples {
                self.bake.theta_samples = theta;
            }
            if let Some(use_gpu) = bake.use_gpu {
                self.bake.use_gpu = use_gpu;
            }
        }
        if let Some(log) = overlay.log {
            if let Some(level) = log.level {
                self.log.level = level;
            }
        }
    }

    /// Apply `PRISM_*` overrides read through `lookup`
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup("PRISM_FACE_SIZE") {
            self.bake.face_size = Some(parse_env_u32("PRISM_FACE_SIZE", &value)?);
        }
        if let Some(value) = lookup("PRISM_THETA_SAMPLES") {
            self.bake.theta_samples = parse_env_u32("PRISM_THETA_SAMPLES", &value)?;
        }
        if let Some(value) = lookup("PRISM_LOG") {
            self.log.level = value;
        }
        Ok(())
    }

    /// Reject settings the bake cannot run with
    pub fn validate(&self) -> Result<()> {
        if !(1..=MAX_THETA_SAMPLES).contains(&self.bake.theta_samples) {
            return Err(PrismError::ConfigError(format!(
                "bake.theta_samples must be between 1 and {}, got {}",
                MAX_THETA_SAMPLES, self.bake.theta_samples
            )));
        }
        if self.bake.face_size == Some(0) {
            return Err(PrismError::ConfigError(
                "bake.face_size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    fn global_config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".prism").join("config.toml"))
    }

    fn load_file(path: &Path) -> Result<PrismConfigFile> {
        let content = std::fs::read_to_string(path)?;
        let file: PrismConfigFile = toml::from_str(&content).map_err(|e| {
            PrismError::ConfigError(format!("Failed to parse config {}: {}", path.display(), e))
        })?;
        Ok(file)
    }
}

fn parse_env_u32(key: &str, value: &str) -> Result<u32> {
    value
        .trim()
        .parse()
        .map_err(|_| PrismError::ConfigError(format!("{} must be an integer, got '{}'", key, value)))
}
