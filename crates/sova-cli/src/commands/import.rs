//! Import command handler

use std::path::Path;

use anyhow::{Context, Result};

use sova_core::{Config, Database, Dispatcher};

use crate::output::Output;

/// Import `data` and `companion` into `db`, replacing its contents
pub fn run(
    config: &Config,
    db: &mut Database,
    data: &Path,
    companion: &Path,
    batch_size: Option<usize>,
    output: &Output,
) -> Result<()> {
    let mut settings = config.import_settings()?;
    if let Some(size) = batch_size {
        anyhow::ensure!(size > 0, "--batch-size must be at least 1");
        settings = settings.with_batch_size(size);
    }

    let dispatcher = Dispatcher::with_default_formats(settings);
    let importer = dispatcher.importer_for(data)?;
    let report = importer
        .import(db, data, companion)
        .with_context(|| format!("Failed to import {:?}", data))?;

    output.print_import(&report);
    Ok(())
}
