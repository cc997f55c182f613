//! Export command handler

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use sova_core::{Config, Database, Dispatcher, ExportOptions, Selection};

use crate::output::Output;

/// Export the store to `target`
pub fn run(
    config: &Config,
    db: &Database,
    target: &Path,
    with_outlierness: bool,
    companion_path: Option<PathBuf>,
    selection: Option<Selection>,
    output: &Output,
) -> Result<()> {
    let dispatcher = Dispatcher::with_default_formats(config.import_settings()?);
    let exporter = dispatcher.exporter_for(target)?;

    let options = ExportOptions {
        with_outlierness,
        selection,
        companion_path,
    };
    let report = exporter
        .export(db, target, &options)
        .with_context(|| format!("Failed to export to {:?}", target))?;

    output.print_export(&report);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::OutputFormat;
    use sova_core::ObjectBatch;
    use std::fs;

    #[test]
    fn test_export_selection_with_outlierness() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("out.arff");

        let mut db = Database::open_in_memory().unwrap();
        let names = vec!["x".to_string(), "Outlierness1".to_string()];
        db.define_features(&names, &[false, true]).unwrap();
        db.push_subspace(1, &[2, 1], "x").unwrap();
        let mut batch = ObjectBatch::new(2, 4);
        batch.push_row(&[1.0, 0.2]);
        batch.push_row(&[2.0, 0.8]);
        db.push_objects(&batch).unwrap();

        let output = Output::new(OutputFormat::Quiet);
        run(
            &Config::default(),
            &db,
            &target,
            true,
            None,
            Some("1".parse().unwrap()),
            &output,
        )
        .unwrap();

        assert!(fs::read_to_string(&target).unwrap().ends_with("@data\n2\n"));
        let companion = fs::read_to_string(dir.path().join("out.outlierness.txt")).unwrap();
        assert!(companion.ends_with("@data\n0,0,0.8\n"));
    }
}
