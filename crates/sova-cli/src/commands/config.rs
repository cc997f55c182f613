//! Config command handlers

use anyhow::{Context, Result};

use sova_core::Config;

use crate::output::{Output, OutputFormat};

/// Show current configuration
pub fn show(output: &Output) -> Result<()> {
    let config = Config::load().context("Failed to load configuration")?;

    match output.format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "data_dir": config.data_dir,
                    "database_file": config.database_file,
                    "batch_size": config.batch_size,
                    "class_label_pattern": config.class_label_pattern,
                    "outlierness_prefix": config.outlierness_prefix,
                })
            );
        }
        OutputFormat::Quiet => {
            println!("{}", config.database_path().display());
        }
        OutputFormat::Human => {
            println!("Configuration:");
            println!("  data_dir:            {}", config.data_dir.display());
            println!("  database_file:       {}", config.database_file);
            println!("  batch_size:          {}", config.batch_size);
            println!("  class_label_pattern: {}", config.class_label_pattern);
            println!("  outlierness_prefix:  {}", config.outlierness_prefix);
            println!();
            println!("Config file: {}", Config::config_file_path().display());
        }
    }

    Ok(())
}

/// Set a configuration value
pub fn set(key: &str, value: &str, output: &Output) -> Result<()> {
    let mut config = Config::load().context("Failed to load configuration")?;
    config.set(key, value)?;
    if key == "class_label_pattern" {
        config.import_settings()?;
    }

    config.save().context("Failed to save configuration")?;
    output.success(&format!("Set {} = {}", key, value));

    Ok(())
}
