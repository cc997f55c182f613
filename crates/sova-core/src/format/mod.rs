//! File format strategies
//!
//! A strategy knows how one file dialect declares its relation name,
//! feature names, delimiter and where the data rows start. Import and
//! export share the field-level helpers in this module.

pub mod arff;
pub mod csv;

use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::Path;

use crate::error::{Error, Result};
use crate::models::Feature;

pub use self::arff::ArffFormat;
pub use self::csv::CsvFormat;

/// Delimiters recognized when sniffing a line, in priority order
pub const DELIMITER_CANDIDATES: [char; 5] = [',', ';', ':', ' ', '\t'];

/// File dialects with a registered strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dialect {
    Csv,
    Arff,
}

/// Header metadata extracted from, or written into, a dataset file
#[derive(Debug, Clone, PartialEq)]
pub struct FileInfo {
    /// Dialect the header belongs to
    pub dialect: Dialect,
    /// Relation (dataset) name
    pub relation: String,
    /// Feature names in column order
    pub features: Vec<String>,
    /// 0-based index of the first line that may hold data
    pub first_data_line: usize,
    /// Field delimiter of the data rows
    pub delimiter: char,
}

/// A pluggable reader/writer for one file dialect
pub trait FormatStrategy: Send + Sync {
    /// Short display name
    fn name(&self) -> &'static str;

    /// Dialect produced and accepted by this strategy
    fn dialect(&self) -> Dialect;

    /// Lowercase file extensions handled by this strategy
    fn extensions(&self) -> &'static [&'static str];

    /// Read the header of `path`
    fn extract_file_info(&self, path: &Path) -> Result<FileInfo>;

    /// Sniff the data delimiter of `path`, `None` if no candidate occurs
    fn delimiter_of(&self, path: &Path) -> Result<Option<char>>;

    /// Delimiter used when writing
    fn default_delimiter(&self) -> char {
        ','
    }

    /// Token written for the not-a-number sentinel
    fn missing_token(&self) -> &'static str;

    /// Whether a data-section line is a comment
    fn is_comment(&self, _line: &str) -> bool {
        false
    }

    /// Write the header for `features`
    ///
    /// Writes nothing when `info` belongs to another dialect.
    fn inject_header(&self, writer: &mut dyn Write, info: &FileInfo, features: &[Feature])
        -> io::Result<()>;

    /// Visit every data record of `path` with its 1-based line number
    ///
    /// Comment lines are skipped; degenerate records are passed through.
    fn read_records(&self, path: &Path, info: &FileInfo, visit: RecordVisitor<'_>) -> Result<()> {
        read_line_records(path, info, |line| self.is_comment(line), visit)
    }
}

/// Callback receiving `(line number, fields)` for each data record
pub type RecordVisitor<'a> = &'a mut dyn FnMut(usize, &[&str]) -> Result<()>;

/// Line-oriented record reader splitting on `info.delimiter`
pub fn read_line_records(
    path: &Path,
    info: &FileInfo,
    is_comment: impl Fn(&str) -> bool,
    visit: RecordVisitor<'_>,
) -> Result<()> {
    for (index, line) in open_lines(path)?.enumerate().skip(info.first_data_line) {
        let line = line.map_err(|e| Error::from_io(e, path))?;
        if is_comment(&line) {
            continue;
        }
        visit(index + 1, &split_fields(&line, info.delimiter))?;
    }
    Ok(())
}

/// Find the first delimiter candidate present in `line`
pub fn detect_delimiter(line: &str) -> Option<char> {
    let line = line.trim();
    DELIMITER_CANDIDATES
        .iter()
        .copied()
        .find(|candidate| line.contains(*candidate))
}

/// Split a data line into trimmed fields
///
/// Whitespace delimiters collapse runs of blanks.
pub fn split_fields(line: &str, delimiter: char) -> Vec<&str> {
    if delimiter.is_whitespace() {
        line.split_whitespace().collect()
    } else {
        line.split(delimiter).map(str::trim).collect()
    }
}

/// A line whose fields are all empty carries no object
pub fn is_degenerate(fields: &[&str]) -> bool {
    fields.iter().all(|field| field.is_empty())
}

/// Parse a numeric field
///
/// Empty fields and `?` are absent values and map to NaN. Returns `None`
/// when the field is not a number.
pub fn parse_value(field: &str) -> Option<f64> {
    match field {
        "" | "?" => Some(f64::NAN),
        _ => field.parse().ok(),
    }
}

/// Render a value, NaN as `missing`
///
/// `f64`'s `Display` is the shortest text that parses back to the
/// same value.
pub fn render_value(value: f64, missing: &str) -> String {
    if value.is_nan() {
        missing.to_string()
    } else {
        value.to_string()
    }
}

/// Open a file for line reading, mapping absence to `FileNotFound`
pub(crate) fn open_lines(path: &Path) -> Result<io::Lines<BufReader<File>>> {
    let file = File::open(path).map_err(|e| Error::from_io(e, path))?;
    Ok(BufReader::new(file).lines())
}

/// Relation name derived from a file's base name
pub fn relation_name(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("dataset")
        .to_string()
}
