//! Formats command handler

use anyhow::Result;

use sova_core::{Config, Dispatcher};

use crate::output::{Output, OutputFormat};

/// List registered format strategies and their extensions
pub fn list(config: &Config, output: &Output) -> Result<()> {
    let dispatcher = Dispatcher::with_default_formats(config.import_settings()?);

    match output.format {
        OutputFormat::Json => {
            let formats: Vec<_> = dispatcher
                .formats()
                .iter()
                .map(|f| {
                    serde_json::json!({
                        "name": f.name(),
                        "extensions": f.extensions(),
                        "missing_token": f.missing_token(),
                    })
                })
                .collect();
            println!("{}", serde_json::Value::Array(formats));
        }
        OutputFormat::Quiet => {
            for format in dispatcher.formats() {
                for ext in format.extensions() {
                    println!("{}", ext);
                }
            }
        }
        OutputFormat::Human => {
            for format in dispatcher.formats() {
                println!(
                    "{:<6} .{}  (missing values: {})",
                    format.name(),
                    format.extensions().join(", ."),
                    format.missing_token()
                );
            }
        }
    }

    Ok(())
}
