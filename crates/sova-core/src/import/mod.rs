//! Import reconciliation
//!
//! Merges a primary dataset file with the companion file written by an
//! outlier detection algorithm and streams the result into the store.
//!
//! ## Steps
//!
//! 1. Read the primary file header through the bound format strategy
//! 2. Parse and validate the whole companion file (subspaces and scores)
//! 3. Reset the store, persist subspaces, register features
//! 4. Stream data rows, pair each with one score per subspace, flush in
//!    batches of `batch_size`
//! 5. Recompute feature extrema
//!
//! Nothing is written before step 3, so header errors leave the store
//! untouched. Batches flushed before a later failure stay committed.

pub mod alignment;
pub mod companion;

use std::iter;
use std::path::Path;
use std::sync::Arc;

use regex::{Regex, RegexBuilder};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::format::{is_degenerate, parse_value, FileInfo, FormatStrategy};
use crate::models::ObjectBatch;
use crate::storage::Database;

use self::alignment::ScoreQueues;
use self::companion::{parse_companion, SubspaceDecl};

/// Default number of objects per transaction
pub const DEFAULT_BATCH_SIZE: usize = 3000;

/// Default pattern for a trailing class label column
pub const DEFAULT_CLASS_LABEL_PATTERN: &str = "^(class|label)$";

/// Default name prefix of the synthetic score features
pub const DEFAULT_OUTLIERNESS_PREFIX: &str = "Outlierness";

/// Tunables of the import pipeline
#[derive(Debug, Clone)]
pub struct ImportSettings {
    /// Objects per transaction, at least 1
    pub batch_size: usize,
    /// Trailing feature names matching this are dropped
    pub class_label: Option<Regex>,
    /// Synthetic score features are named `<prefix><subspace id>`
    pub outlierness_prefix: String,
}

impl ImportSettings {
    /// Build settings, compiling `class_label_pattern` case-insensitively
    pub fn new(
        batch_size: usize,
        class_label_pattern: &str,
        outlierness_prefix: impl Into<String>,
    ) -> std::result::Result<Self, regex::Error> {
        let class_label = if class_label_pattern.is_empty() {
            None
        } else {
            Some(
                RegexBuilder::new(class_label_pattern)
                    .case_insensitive(true)
                    .build()?,
            )
        };

        Ok(Self {
            batch_size: batch_size.max(1),
            class_label,
            outlierness_prefix: outlierness_prefix.into(),
        })
    }

    /// Same settings with another batch size
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }
}

impl Default for ImportSettings {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            class_label: RegexBuilder::new(DEFAULT_CLASS_LABEL_PATTERN)
                .case_insensitive(true)
                .build()
                .ok(),
            outlierness_prefix: DEFAULT_OUTLIERNESS_PREFIX.to_string(),
        }
    }
}

/// What an import stored
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ImportReport {
    pub relation: String,
    pub objects: usize,
    pub subspaces: usize,
    pub features: usize,
    pub natural_features: usize,
    pub score_triples: usize,
    pub batches: usize,
    /// Fields that were not numbers and were stored as NaN
    pub unparsable_fields: usize,
}

/// Import engine bound to one format strategy
#[derive(Clone)]
pub struct Importer {
    strategy: Arc<dyn FormatStrategy>,
    settings: ImportSettings,
}

struct StreamStats {
    objects: usize,
    batches: usize,
    unparsable_fields: usize,
}

impl Importer {
    pub fn new(strategy: Arc<dyn FormatStrategy>, settings: ImportSettings) -> Self {
        Self { strategy, settings }
    }

    /// The bound format strategy
    pub fn strategy(&self) -> &dyn FormatStrategy {
        self.strategy.as_ref()
    }

    pub fn settings(&self) -> &ImportSettings {
        &self.settings
    }

    /// Import `data` together with its `companion` file into `db`
    ///
    /// Replaces whatever the store held before.
    pub fn import(&self, db: &mut Database, data: &Path, companion: &Path) -> Result<ImportReport> {
        for path in [data, companion] {
            if !path.exists() {
                return Err(Error::FileNotFound {
                    path: path.to_path_buf(),
                });
            }
        }

        info!("Importing {:?} with scores from {:?}", data, companion);

        let info = self.strategy.extract_file_info(data)?;
        if info.features.len() < 2 {
            return Err(Error::invalid(
                data,
                format!("expected at least 2 features, found {}", info.features.len()),
            ));
        }

        let natural = self.natural_features(&info.features);
        let mut parsed = parse_companion(companion, natural.len())?;
        debug!(
            "Companion declares {} subspaces with {} scores",
            parsed.subspaces.len(),
            parsed.triples
        );

        // Leftovers of an interrupted import may exist without features
        db.reset()?;

        let (names, flags) = self.persist_subspaces(db, &natural, &parsed.subspaces)?;
        db.define_features(&names, &flags)?;

        let stats = self.stream_objects(db, data, &info, natural.len(), names.len(), &mut parsed.scores)?;

        parsed
            .scores
            .finish()
            .map_err(|e| Error::invalid(companion, e.to_string()))?;

        db.recompute_feature_extrema()?;

        if stats.unparsable_fields > 0 {
            warn!(
                "{} fields in {:?} were not numeric and were stored as NaN",
                stats.unparsable_fields, data
            );
        }

        let report = ImportReport {
            relation: info.relation,
            objects: stats.objects,
            subspaces: parsed.subspaces.len(),
            features: names.len(),
            natural_features: natural.len(),
            score_triples: parsed.triples,
            batches: stats.batches,
            unparsable_fields: stats.unparsable_fields,
        };
        info!(
            "Imported {} objects, {} features, {} subspaces",
            report.objects, report.features, report.subspaces
        );
        Ok(report)
    }

    /// Feature names minus a trailing class label
    fn natural_features(&self, names: &[String]) -> Vec<String> {
        let mut natural = names.to_vec();
        let is_label = match (&self.settings.class_label, natural.last()) {
            (Some(pattern), Some(last)) => pattern.is_match(last.trim()),
            _ => false,
        };
        if is_label {
            natural.pop();
        }
        natural
    }

    /// Store every subspace and return the full feature list with outlier flags
    ///
    /// Natural feature `i` gets id `i + 1`; the score feature of the
    /// `k`-th subspace gets id `natural + k + 1`.
    fn persist_subspaces(
        &self,
        db: &mut Database,
        natural: &[String],
        subspaces: &[SubspaceDecl],
    ) -> Result<(Vec<String>, Vec<bool>)> {
        let mut names = natural.to_vec();
        let mut flags = vec![false; natural.len()];

        for (k, decl) in subspaces.iter().enumerate() {
            let score_feature = (natural.len() + k + 1) as i64;
            let feature_refs: Vec<i64> = iter::once(score_feature)
                .chain(decl.base_ids.iter().map(|id| *id as i64 + 1))
                .collect();
            let name = decl
                .base_ids
                .iter()
                .map(|id| natural[*id].as_str())
                .collect::<Vec<_>>()
                .join(", ");

            db.push_subspace(decl.id, &feature_refs, &name)?;

            names.push(format!("{}{}", self.settings.outlierness_prefix, decl.id));
            flags.push(true);
        }

        Ok((names, flags))
    }

    /// Stream data rows into the store in batches
    fn stream_objects(
        &self,
        db: &mut Database,
        data: &Path,
        info: &FileInfo,
        natural_count: usize,
        width: usize,
        scores: &mut ScoreQueues,
    ) -> Result<StreamStats> {
        let mut batch = ObjectBatch::new(width, self.settings.batch_size);
        let mut row = Vec::with_capacity(width);
        let mut stats = StreamStats {
            objects: 0,
            batches: 0,
            unparsable_fields: 0,
        };

        self.strategy.read_records(data, info, &mut |line_no, fields| {
            if is_degenerate(fields) {
                return Ok(());
            }

            row.clear();
            for i in 0..natural_count {
                let field = fields.get(i).copied().unwrap_or("");
                row.push(parse_value(field).unwrap_or_else(|| {
                    stats.unparsable_fields += 1;
                    f64::NAN
                }));
            }

            scores
                .append_row(&mut row)
                .map_err(|e| Error::invalid_at(data, line_no, e.to_string()))?;

            batch.push_row(&row);
            stats.objects += 1;

            if batch.is_full() {
                db.push_objects(&batch)?;
                batch.clear();
                stats.batches += 1;
            }
            Ok(())
        })?;

        if !batch.is_empty() {
            db.push_objects(&batch)?;
            stats.batches += 1;
        }

        Ok(stats)
    }
}
