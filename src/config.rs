//! Engine configuration
//!
//! Loaded from an optional JSON file, then overridden from the
//! environment:
//!
//! - `PATCHCORD_PATCH_DIR` - user patch directory
//! - `PATCHCORD_SAMPLE_RATE` - processing sample rate in Hz
//! - `PATCHCORD_BLOCK_SIZE` - samples per processing block

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{PatchcordError, Result};
use crate::patch::{LoadOptions, DEFAULT_EXTENSION};

pub const ENV_PATCH_DIR: &str = "PATCHCORD_PATCH_DIR";
pub const ENV_SAMPLE_RATE: &str = "PATCHCORD_SAMPLE_RATE";
pub const ENV_BLOCK_SIZE: &str = "PATCHCORD_BLOCK_SIZE";

/// Settings shared by the render host and the patch manager
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Processing sample rate in Hz
    pub sample_rate: f32,

    /// Samples per processing block
    pub block_size: usize,

    /// User patch directory
    pub patch_directory: Option<PathBuf>,

    /// Patch document extension, without the dot
    pub patch_extension: String,

    /// Bound on a patch directory scan (`None` = unbounded)
    pub load_timeout_ms: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48000.0,
            block_size: 512,
            patch_directory: None,
            patch_extension: DEFAULT_EXTENSION.to_string(),
            load_timeout_ms: Some(10_000),
        }
    }
}

impl EngineConfig {
    /// Read a JSON config file; missing fields take defaults
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| PatchcordError::FileReadError {
            path: path.to_path_buf(),
            source: e,
        })?;
        let config: EngineConfig =
            serde_json::from_str(&content).map_err(|e| PatchcordError::InvalidConfig {
                reason: format!("{}: {}", path.display(), e),
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults with environment overrides applied
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env()?;
        Ok(config)
    }

    /// Apply environment overrides on top of the current values
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_overrides(|key| env::var(key).ok())
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(dir) = lookup(ENV_PATCH_DIR).filter(|d| !d.is_empty()) {
            self.patch_directory = Some(PathBuf::from(dir));
        }
        if let Some(rate) = lookup(ENV_SAMPLE_RATE) {
            self.sample_rate = rate.trim().parse().map_err(|_| PatchcordError::InvalidConfig {
                reason: format!("{ENV_SAMPLE_RATE}='{rate}' is not a number"),
            })?;
        }
        if let Some(size) = lookup(ENV_BLOCK_SIZE) {
            self.block_size = size.trim().parse().map_err(|_| PatchcordError::InvalidConfig {
                reason: format!("{ENV_BLOCK_SIZE}='{size}' is not a whole number"),
            })?;
        }
        self.validate()
    }

    pub fn validate(&self) -> Result<()> {
        if !self.sample_rate.is_finite() || self.sample_rate <= 0.0 {
            return Err(PatchcordError::InvalidConfig {
                reason: format!("sample_rate must be positive, got {}", self.sample_rate),
            });
        }
        if self.block_size == 0 {
            return Err(PatchcordError::InvalidConfig {
                reason: "block_size must be at least 1".to_string(),
            });
        }
        if self.patch_extension.trim_start_matches('.').is_empty() {
            return Err(PatchcordError::InvalidConfig {
                reason: "patch_extension must not be empty".to_string(),
            });
        }
        Ok(())
    }

    /// Directory scan options derived from `load_timeout_ms`
    pub fn load_options(&self) -> LoadOptions {
        LoadOptions {
            timeout: self.load_timeout_ms.map(Duration::from_millis),
        }
    }
}
