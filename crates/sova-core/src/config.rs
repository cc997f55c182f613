//! Application configuration
//!
//! Configuration is loaded from:
//! 1. Default values
//! 2. Config file (~/.config/sova/config.toml)
//! 3. Environment variables (SOVA_* prefix)
//!
//! Environment variables take precedence over config file values.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::import::{
    ImportSettings, DEFAULT_BATCH_SIZE, DEFAULT_CLASS_LABEL_PATTERN, DEFAULT_OUTLIERNESS_PREFIX,
};

/// Environment variable prefix
const ENV_PREFIX: &str = "SOVA";

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory holding the default store
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Store file name inside `data_dir`
    #[serde(default = "default_database_file")]
    pub database_file: String,

    /// Objects written per transaction
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Case-insensitive pattern for a trailing class label column
    #[serde(default = "default_class_label_pattern")]
    pub class_label_pattern: String,

    /// Name prefix of the synthetic score features
    #[serde(default = "default_outlierness_prefix")]
    pub outlierness_prefix: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            database_file: default_database_file(),
            batch_size: default_batch_size(),
            class_label_pattern: default_class_label_pattern(),
            outlierness_prefix: default_outlierness_prefix(),
        }
    }
}

impl Config {
    /// Load configuration from default location and environment
    ///
    /// Order of precedence (highest to lowest):
    /// 1. Environment variables (SOVA_DATA_DIR, SOVA_DATABASE_FILE, SOVA_BATCH_SIZE)
    /// 2. Config file (~/.config/sova/config.toml or SOVA_CONFIG)
    /// 3. Default values
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::config_file_path())
    }

    /// Load configuration from a specific path
    ///
    /// Environment variables are still applied as overrides.
    /// If the file doesn't exist, defaults are used.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {:?}", path))?;
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {:?}", path))?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Load configuration from a TOML string (useful for testing)
    pub fn load_from_str(toml_content: &str) -> Result<Self> {
        let mut config: Config =
            toml::from_str(toml_content).context("Failed to parse config TOML")?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        // SOVA_DATA_DIR
        if let Ok(val) = std::env::var(format!("{}_DATA_DIR", ENV_PREFIX)) {
            self.data_dir = PathBuf::from(val);
        }

        // SOVA_DATABASE_FILE
        if let Ok(val) = std::env::var(format!("{}_DATABASE_FILE", ENV_PREFIX)) {
            if !val.is_empty() {
                self.database_file = val;
            }
        }

        // SOVA_BATCH_SIZE, ignored unless a positive integer
        if let Ok(val) = std::env::var(format!("{}_BATCH_SIZE", ENV_PREFIX)) {
            if let Ok(size) = val.trim().parse::<usize>() {
                if size > 0 {
                    self.batch_size = size;
                }
            }
        }
    }

    /// Ensure data directory exists
    pub fn ensure_data_dir(&self) -> Result<()> {
        if !self.data_dir.exists() {
            std::fs::create_dir_all(&self.data_dir)
                .with_context(|| format!("Failed to create data directory: {:?}", self.data_dir))?;
        }
        Ok(())
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        self.save_to_path(&Self::config_file_path())
    }

    /// Save configuration to a specific path
    pub fn save_to_path(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(config_path, content)
            .with_context(|| format!("Failed to write config file: {:?}", config_path))?;
        Ok(())
    }

    /// Get the config file path
    ///
    /// Can be overridden with SOVA_CONFIG environment variable
    pub fn config_file_path() -> PathBuf {
        if let Ok(path) = std::env::var(format!("{}_CONFIG", ENV_PREFIX)) {
            return PathBuf::from(path);
        }

        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("sova")
            .join("config.toml")
    }

    /// Get the path to the default store
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(&self.database_file)
    }

    /// Import settings described by this configuration
    pub fn import_settings(&self) -> Result<ImportSettings> {
        ImportSettings::new(
            self.batch_size,
            &self.class_label_pattern,
            self.outlierness_prefix.clone(),
        )
        .with_context(|| {
            format!(
                "Invalid class_label_pattern '{}'",
                self.class_label_pattern
            )
        })
    }

    /// Set a value by key, as used by `sova config set`
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "data_dir" => self.data_dir = PathBuf::from(value),
            "database_file" => self.database_file = value.to_string(),
            "batch_size" => {
                let size: usize = value
                    .parse()
                    .with_context(|| format!("batch_size must be a positive integer, got '{}'", value))?;
                anyhow::ensure!(size > 0, "batch_size must be at least 1");
                self.batch_size = size;
            }
            "class_label_pattern" => self.class_label_pattern = value.to_string(),
            "outlierness_prefix" => self.outlierness_prefix = value.to_string(),
            _ => anyhow::bail!(
                "Unknown config key '{}'. Valid keys: data_dir, database_file, batch_size, class_label_pattern, outlierness_prefix",
                key
            ),
        }
        Ok(())
    }
}

/// Get the default data directory
fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("sova")
}

fn default_database_file() -> String {
    "sova.db".to_string()
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

fn default_class_label_pattern() -> String {
    DEFAULT_CLASS_LABEL_PATTERN.to_string()
}

fn default_outlierness_prefix() -> String {
    DEFAULT_OUTLIERNESS_PREFIX.to_string()
}
