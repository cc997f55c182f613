//! Export reconciliation
//!
//! Regenerates the primary dataset file from the store and, when scores
//! are requested, a companion file the importer can read back.

use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::format::{relation_name, render_value, FileInfo, FormatStrategy};
use crate::import::companion::DATA_MARKER;
use crate::models::{Feature, Subspace};
use crate::selection::Selection;
use crate::storage::Database;

/// What to export
#[derive(Debug, Clone, Default)]
pub struct ExportOptions {
    /// Also write the per-subspace scores
    pub with_outlierness: bool,
    /// Restrict the export to these object positions
    pub selection: Option<Selection>,
    /// Companion file location, defaults to [`default_companion_path`]
    pub companion_path: Option<PathBuf>,
}

/// What an export wrote
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ExportReport {
    pub relation: String,
    /// Every feature covered by the export, scores included when requested
    pub features: Vec<String>,
    pub objects: usize,
    pub subspaces: usize,
    pub data_path: PathBuf,
    pub companion_path: Option<PathBuf>,
}

/// `<dir>/<stem>.outlierness.txt` next to the exported file
pub fn default_companion_path(target: &Path) -> PathBuf {
    target.with_file_name(format!("{}.outlierness.txt", relation_name(target)))
}

/// Counts newlines passing through to the inner writer
struct LineCounter<'a, W: Write> {
    inner: &'a mut W,
    lines: usize,
}

impl<W: Write> Write for LineCounter<'_, W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let written = self.inner.write(buf)?;
        self.lines += buf[..written].iter().filter(|b| **b == b'\n').count();
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Export engine bound to one format strategy
#[derive(Clone)]
pub struct Exporter {
    strategy: Arc<dyn FormatStrategy>,
}

impl Exporter {
    pub fn new(strategy: Arc<dyn FormatStrategy>) -> Self {
        Self { strategy }
    }

    /// The bound format strategy
    pub fn strategy(&self) -> &dyn FormatStrategy {
        self.strategy.as_ref()
    }

    /// Write the store's objects to `target`
    pub fn export(&self, db: &Database, target: &Path, options: &ExportOptions) -> Result<ExportReport> {
        info!("Exporting to {:?}", target);

        let features = db.features()?;
        let positions: HashMap<i64, usize> = features
            .iter()
            .enumerate()
            .map(|(position, f)| (f.id, position))
            .collect();
        let natural: Vec<Feature> = features.iter().filter(|f| !f.is_outlier).cloned().collect();

        let mut file_info = FileInfo {
            dialect: self.strategy.dialect(),
            relation: relation_name(target),
            features: features
                .iter()
                .filter(|f| !f.is_outlier || options.with_outlierness)
                .map(|f| f.name.clone())
                .collect(),
            first_data_line: 0,
            delimiter: self.strategy.default_delimiter(),
        };

        let subspaces = db.subspaces()?;
        let scored: Vec<(&Subspace, usize)> = if options.with_outlierness {
            scored_subspaces(&subspaces, &features, &positions)
        } else {
            Vec::new()
        };
        let mut scores: Vec<Vec<f64>> = vec![Vec::new(); scored.len()];

        let file = File::create(target).map_err(|e| Error::from_io(e, target))?;
        let mut writer = BufWriter::new(file);

        let mut counter = LineCounter {
            inner: &mut writer,
            lines: 0,
        };
        self.strategy
            .inject_header(&mut counter, &file_info, &natural)
            .map_err(|e| Error::from_io(e, target))?;
        file_info.first_data_line = counter.lines;

        let missing = self.strategy.missing_token();
        let delimiter = file_info.delimiter;
        let natural_positions: Vec<usize> = natural
            .iter()
            .filter_map(|f| positions.get(&f.id).copied())
            .collect();
        let mut line = String::new();

        let exported = db.for_each_object::<Error, _>(options.selection.as_ref(), |_, values| {
            line.clear();
            for (i, position) in natural_positions.iter().enumerate() {
                if i > 0 {
                    line.push(delimiter);
                }
                let value = values.get(*position).copied().unwrap_or(f64::NAN);
                line.push_str(&render_value(value, missing));
            }
            writeln!(writer, "{}", line).map_err(|e| Error::from_io(e, target))?;

            for (column, (_, position)) in scores.iter_mut().zip(&scored) {
                column.push(values.get(*position).copied().unwrap_or(f64::NAN));
            }
            Ok(())
        })?;

        writer.flush().map_err(|e| Error::from_io(e, target))?;
        debug!(
            "Wrote {} objects, header spans {} lines",
            exported, file_info.first_data_line
        );

        let companion_path = if !scored.is_empty() && exported > 0 {
            let path = options
                .companion_path
                .clone()
                .unwrap_or_else(|| default_companion_path(target));
            self.write_companion(&path, &scored, &natural, &scores)?;
            Some(path)
        } else {
            None
        };

        info!(
            "Exported {} objects{}",
            exported,
            if companion_path.is_some() { " with outlierness" } else { "" }
        );

        Ok(ExportReport {
            relation: file_info.relation,
            features: file_info.features,
            objects: exported,
            subspaces: if companion_path.is_some() { scored.len() } else { 0 },
            data_path: target.to_path_buf(),
            companion_path,
        })
    }

    /// Write subspace declarations and score triples, grouped by subspace
    fn write_companion(
        &self,
        path: &Path,
        scored: &[(&Subspace, usize)],
        natural: &[Feature],
        scores: &[Vec<f64>],
    ) -> Result<()> {
        let file = File::create(path).map_err(|e| Error::from_io(e, path))?;
        let mut writer = BufWriter::new(file);
        let missing = self.strategy.missing_token();

        let write_all = |writer: &mut BufWriter<File>| -> io::Result<()> {
            for (k, (subspace, _)) in scored.iter().enumerate() {
                let ids: Vec<String> = subspace
                    .natural_features()
                    .iter()
                    .filter_map(|id| natural.iter().position(|f| f.id == *id))
                    .map(|position| position.to_string())
                    .collect();
                writeln!(
                    writer,
                    "Subspace {} dimensionality = {} [{}]",
                    k + 1,
                    ids.len(),
                    ids.join(", ")
                )?;
            }

            writeln!(writer, "{}", DATA_MARKER)?;

            for (k, column) in scores.iter().enumerate() {
                for (row, score) in column.iter().enumerate() {
                    writeln!(writer, "{},{},{}", row, k, render_value(*score, missing))?;
                }
            }
            writer.flush()
        };

        write_all(&mut writer).map_err(|e| Error::from_io(e, path))
    }
}

/// Subspaces whose first reference is an outlier feature, with that
/// feature's position in the object vector
fn scored_subspaces<'a>(
    subspaces: &'a [Subspace],
    features: &[Feature],
    positions: &HashMap<i64, usize>,
) -> Vec<(&'a Subspace, usize)> {
    subspaces
        .iter()
        .filter_map(|subspace| {
            let id = subspace.outlier_feature()?;
            let position = *positions.get(&id)?;
            features[position].is_outlier.then_some((subspace, position))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::{ArffFormat, CsvFormat};
    use crate::models::ObjectBatch;
    use std::fs;

    fn sample_store() -> Database {
        let mut db = Database::open_in_memory().unwrap();
        let names: Vec<String> = ["a", "b", "Outlierness1"].iter().map(|s| s.to_string()).collect();
        db.define_features(&names, &[false, false, true]).unwrap();
        db.push_subspace(1, &[3, 1, 2], "a, b").unwrap();

        let mut batch = ObjectBatch::new(3, 10);
        batch.push_row(&[1.5, f64::NAN, 0.1]);
        batch.push_row(&[2.5, 3.0, 0.9]);
        batch.push_row(&[4.0, 5.0, 0.4]);
        db.push_objects(&batch).unwrap();
        db
    }

    #[test]
    fn test_export_without_outlierness() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("out.csv");
        let db = sample_store();

        let report = Exporter::new(Arc::new(CsvFormat))
            .export(&db, &target, &ExportOptions::default())
            .unwrap();

        assert_eq!(report.objects, 3);
        assert_eq!(report.features, vec!["a", "b"]);
        assert!(report.companion_path.is_none());
        assert!(!default_companion_path(&target).exists());
        assert_eq!(
            fs::read_to_string(&target).unwrap(),
            "a,b\n1.5,NaN\n2.5,3\n4,5\n"
        );
    }

    #[test]
    fn test_export_with_outlierness() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("out.csv");
        let db = sample_store();

        let options = ExportOptions {
            with_outlierness: true,
            ..Default::default()
        };
        let report = Exporter::new(Arc::new(CsvFormat))
            .export(&db, &target, &options)
            .unwrap();

        assert_eq!(report.features, vec!["a", "b", "Outlierness1"]);
        assert_eq!(report.subspaces, 1);
        let companion = report.companion_path.unwrap();
        assert_eq!(companion, dir.path().join("out.outlierness.txt"));
        assert_eq!(
            fs::read_to_string(&companion).unwrap(),
            "Subspace 1 dimensionality = 2 [0, 1]\n@data\n0,0,0.1\n1,0,0.9\n2,0,0.4\n"
        );
    }

    #[test]
    fn test_export_selection_renumbers_rows() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("out.csv");
        let companion = dir.path().join("scores.txt");
        let db = sample_store();

        let options = ExportOptions {
            with_outlierness: true,
            selection: Some(vec![2].into_iter().collect()),
            companion_path: Some(companion.clone()),
        };
        let report = Exporter::new(Arc::new(CsvFormat))
            .export(&db, &target, &options)
            .unwrap();

        assert_eq!(report.objects, 1);
        assert_eq!(fs::read_to_string(&target).unwrap(), "a,b\n4,5\n");
        assert!(fs::read_to_string(&companion)
            .unwrap()
            .ends_with("@data\n0,0,0.4\n"));
    }

    #[test]
    fn test_export_arff_uses_question_mark() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("out.arff");
        let db = sample_store();

        Exporter::new(Arc::new(ArffFormat))
            .export(&db, &target, &ExportOptions::default())
            .unwrap();

        let text = fs::read_to_string(&target).unwrap();
        assert!(text.starts_with("@relation out\n"));
        assert!(text.contains("@data\n1.5,?\n"));
    }

    #[test]
    fn test_empty_store_writes_no_companion() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("out.csv");
        let mut db = Database::open_in_memory().unwrap();
        let names: Vec<String> = ["a", "b", "Outlierness1"].iter().map(|s| s.to_string()).collect();
        db.define_features(&names, &[false, false, true]).unwrap();
        db.push_subspace(1, &[3, 1, 2], "a, b").unwrap();

        let options = ExportOptions {
            with_outlierness: true,
            ..Default::default()
        };
        let report = Exporter::new(Arc::new(CsvFormat))
            .export(&db, &target, &options)
            .unwrap();

        assert_eq!(report.objects, 0);
        assert!(report.companion_path.is_none());
        assert_eq!(fs::read_to_string(&target).unwrap(), "a,b\n");
    }

    #[test]
    fn test_line_counter() {
        let mut buf = Vec::new();
        let mut counter = LineCounter {
            inner: &mut buf,
            lines: 0,
        };
        write!(counter, "a\nb\n\nc").unwrap();
        assert_eq!(counter.lines, 3);
    }
}
