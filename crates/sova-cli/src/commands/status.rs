//! Status command handler

use anyhow::{Context, Result};

use sova_core::Database;

use crate::output::Output;

/// Show store statistics
pub fn show(db: &Database, output: &Output) -> Result<()> {
    let stats = db.stats().context("Failed to read store statistics")?;
    output.print_status(db.path(), &stats);
    Ok(())
}
