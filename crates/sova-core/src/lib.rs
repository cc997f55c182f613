//! SOVA Core Library
//!
//! This crate reconciles a tabular dataset with the output of a subspace
//! outlier detection algorithm, persists the merged records in a
//! versioned SQLite store, and regenerates both files on export.
//!
//! # Architecture
//!
//! - **Formats**: pluggable header readers/writers (CSV, ARFF)
//! - **Import**: companion parsing, score alignment, batched writes
//! - **Export**: primary file and companion file regeneration
//! - **Storage**: SQLite store with a per-dataset object table
//!
//! # Quick Start
//!
//! ```text
//! let dispatcher = Dispatcher::with_default_formats(config.import_settings()?);
//! let mut db = Database::open(&config.database_path())?;
//!
//! let importer = dispatcher.importer_for(data)?;
//! let report = importer.import(&mut db, data, companion)?;
//!
//! let exporter = dispatcher.exporter_for(target)?;
//! exporter.export(&db, target, &ExportOptions::default())?;
//! ```
//!
//! # Modules
//!
//! - `dispatch`: Extension to engine routing
//! - `import`: Import reconciliation engine
//! - `export`: Export reconciliation engine
//! - `format`: File format strategies
//! - `storage`: SQLite store
//! - `models`: Features, subspaces and batch buffers
//! - `config`: Application configuration

pub mod config;
pub mod dispatch;
pub mod error;
pub mod export;
pub mod format;
pub mod import;
pub mod models;
pub mod selection;
pub mod storage;


pub use config::Config;
pub use dispatch::Dispatcher;
pub use error::{Error, Result};
pub use export::{ExportOptions, ExportReport, Exporter};
pub use format::{Dialect, FileInfo, FormatStrategy};
pub use import::{ImportReport, ImportSettings, Importer};
pub use models::{Feature, ObjectBatch, Subspace};
pub use selection::Selection;
pub use storage::{Database, StorageError, StoreStats};
