//! Output formatting for CLI
//!
//! Provides consistent output formatting across all commands:
//! - Human-readable default output
//! - JSON output (--json flag)
//! - Quiet mode for scripting (--quiet flag)

use std::path::Path;

use serde::Serialize;

use sova_core::{ExportReport, ImportReport, StoreStats};

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable output (default)
    Human,
    /// JSON output
    Json,
    /// Quiet mode - minimal output
    Quiet,
}

impl OutputFormat {
    /// Create format from CLI flags
    pub fn from_flags(json: bool, quiet: bool) -> Self {
        if quiet {
            OutputFormat::Quiet
        } else if json {
            OutputFormat::Json
        } else {
            OutputFormat::Human
        }
    }
}

/// Output helper for consistent formatting
pub struct Output {
    /// The output format
    pub format: OutputFormat,
}

impl Output {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Print an import report
    pub fn print_import(&self, report: &ImportReport) {
        match self.format {
            OutputFormat::Human => {
                println!(
                    "✓ Imported '{}': {} object(s), {} subspace(s)",
                    report.relation, report.objects, report.subspaces
                );
                println!(
                    "  features:      {} ({} natural)",
                    report.features, report.natural_features
                );
                println!("  score triples: {}", report.score_triples);
                println!("  batches:       {}", report.batches);
                if report.unparsable_fields > 0 {
                    println!(
                        "  {} unparsable field(s) stored as missing",
                        report.unparsable_fields
                    );
                }
            }
            OutputFormat::Json => print_json(report),
            OutputFormat::Quiet => println!("{}", report.objects),
        }
    }

    /// Print an export report
    pub fn print_export(&self, report: &ExportReport) {
        match self.format {
            OutputFormat::Human => {
                println!(
                    "✓ Exported {} object(s) to {}",
                    report.objects,
                    report.data_path.display()
                );
                println!("  features: {}", report.features.join(", "));
                if let Some(ref companion) = report.companion_path {
                    println!(
                        "  outlierness: {} subspace(s) in {}",
                        report.subspaces,
                        companion.display()
                    );
                }
            }
            OutputFormat::Json => print_json(report),
            OutputFormat::Quiet => {
                println!("{}", report.data_path.display());
                if let Some(ref companion) = report.companion_path {
                    println!("{}", companion.display());
                }
            }
        }
    }

    /// Print store statistics
    pub fn print_status(&self, path: Option<&Path>, stats: &StoreStats) {
        match self.format {
            OutputFormat::Human => {
                println!("SOVA Status");
                println!("===========");
                println!();
                println!(
                    "Store:    {}",
                    path.map(|p| p.display().to_string())
                        .unwrap_or_else(|| "(in memory)".to_string())
                );
                println!("Schema:   v{}", stats.schema_version);
                println!();
                println!(
                    "Features:  {} ({} outlierness)",
                    stats.features, stats.outlier_features
                );
                println!("Subspaces: {}", stats.subspaces);
                println!("Objects:   {}", stats.objects);
            }
            OutputFormat::Json => print_json(&serde_json::json!({
                "path": path,
                "stats": stats,
            })),
            OutputFormat::Quiet => println!("{}", stats.objects),
        }
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        match self.format {
            OutputFormat::Human => println!("✓ {}", message),
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({"status": "success", "message": message})
                );
            }
            OutputFormat::Quiet => {}
        }
    }

    /// Print a recovery hint after a failure, on stderr
    pub fn hint(&self, hint: &str) {
        if self.format != OutputFormat::Quiet {
            eprintln!("hint: {}", hint);
        }
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Failed to serialize output: {}", e),
    }
}
