//! Extension-based routing to import and export engines

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::export::Exporter;
use crate::format::{ArffFormat, CsvFormat, FormatStrategy};
use crate::import::{ImportSettings, Importer};

/// Registry of engines keyed by lowercase file extension
pub struct Dispatcher {
    formats: Vec<Arc<dyn FormatStrategy>>,
    importers: HashMap<String, Importer>,
    exporters: HashMap<String, Exporter>,
    settings: ImportSettings,
}

impl Dispatcher {
    /// Create an empty registry
    pub fn new(settings: ImportSettings) -> Self {
        Self {
            formats: Vec::new(),
            importers: HashMap::new(),
            exporters: HashMap::new(),
            settings,
        }
    }

    /// Create a registry with the CSV and ARFF strategies
    pub fn with_default_formats(settings: ImportSettings) -> Self {
        let mut dispatcher = Self::new(settings);
        dispatcher.register(Arc::new(CsvFormat));
        dispatcher.register(Arc::new(ArffFormat));
        dispatcher
    }

    /// Register a strategy for both directions under all its extensions
    ///
    /// Later registrations win for shared extensions.
    pub fn register(&mut self, strategy: Arc<dyn FormatStrategy>) {
        for extension in strategy.extensions() {
            let key = extension.to_ascii_lowercase();
            self.importers.insert(
                key.clone(),
                Importer::new(Arc::clone(&strategy), self.settings.clone()),
            );
            self.exporters
                .insert(key, Exporter::new(Arc::clone(&strategy)));
        }
        self.formats.push(strategy);
    }

    /// Registered strategies in registration order
    pub fn formats(&self) -> &[Arc<dyn FormatStrategy>] {
        &self.formats
    }

    /// Importer for the primary dataset file at `path`
    pub fn importer_for(&self, path: &Path) -> Result<&Importer> {
        let extension = extension_of(path)?;
        self.importers
            .get(&extension)
            .ok_or(Error::UnsupportedFormat { extension })
    }

    /// Exporter for the target file at `path`
    pub fn exporter_for(&self, path: &Path) -> Result<&Exporter> {
        let extension = extension_of(path)?;
        self.exporters
            .get(&extension)
            .ok_or(Error::UnsupportedFormat { extension })
    }
}

fn extension_of(path: &Path) -> Result<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .ok_or_else(|| Error::invalid(path, "file name has no extension"))
}
