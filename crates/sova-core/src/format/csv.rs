//! Comma-separated dialect
//!
//! The first non-blank line names the features; every following line is
//! a data row. The relation name is the file's base name.

use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::Path;

use crate::error::{Error, Result};
use crate::format::{
    detect_delimiter, open_lines, read_line_records, relation_name, split_fields, Dialect,
    FileInfo, FormatStrategy, RecordVisitor,
};
use crate::models::Feature;

/// Strategy for `.csv` and plain delimited `.txt` files
#[derive(Debug, Clone, Copy, Default)]
pub struct CsvFormat;

impl CsvFormat {
    /// Locate the header row: (0-based line index, line text)
    fn header_line(path: &Path) -> Result<(usize, String)> {
        for (index, line) in open_lines(path)?.enumerate() {
            let line = line.map_err(|e| Error::from_io(e, path))?;
            if !line.trim().is_empty() {
                return Ok((index, line));
            }
        }
        Err(Error::invalid(path, "missing header row"))
    }
}

/// Parse a header row with the csv reader so quoted names keep their commas
fn parse_header(line: &str, delimiter: char) -> Vec<String> {
    if delimiter.is_whitespace() || !delimiter.is_ascii() {
        return split_fields(line, delimiter)
            .into_iter()
            .map(str::to_string)
            .collect();
    }

    let mut reader = ::csv::ReaderBuilder::new()
        .has_headers(false)
        .delimiter(delimiter as u8)
        .trim(::csv::Trim::All)
        .from_reader(line.as_bytes());

    match reader.records().next() {
        Some(Ok(record)) => record.iter().map(str::to_string).collect(),
        _ => split_fields(line, delimiter)
            .into_iter()
            .map(str::to_string)
            .collect(),
    }
}

impl FormatStrategy for CsvFormat {
    fn name(&self) -> &'static str {
        "CSV"
    }

    fn dialect(&self) -> Dialect {
        Dialect::Csv
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["csv", "txt"]
    }

    fn extract_file_info(&self, path: &Path) -> Result<FileInfo> {
        let (index, line) = Self::header_line(path)?;
        let delimiter = detect_delimiter(&line).unwrap_or(self.default_delimiter());

        Ok(FileInfo {
            dialect: Dialect::Csv,
            relation: relation_name(path),
            features: parse_header(&line, delimiter),
            first_data_line: index + 1,
            delimiter,
        })
    }

    fn delimiter_of(&self, path: &Path) -> Result<Option<char>> {
        let (_, line) = Self::header_line(path)?;
        Ok(detect_delimiter(&line))
    }

    fn missing_token(&self) -> &'static str {
        "NaN"
    }

    /// Quoted fields are honoured for single-byte delimiters; blank runs
    /// fall back to whitespace splitting
    fn read_records(&self, path: &Path, info: &FileInfo, visit: RecordVisitor<'_>) -> Result<()> {
        if info.delimiter.is_whitespace() || !info.delimiter.is_ascii() {
            return read_line_records(path, info, |_| false, visit);
        }

        let file = File::open(path).map_err(|e| Error::from_io(e, path))?;
        let mut reader = BufReader::new(file);
        let mut skipped = String::new();
        for _ in 0..info.first_data_line {
            skipped.clear();
            if reader
                .read_line(&mut skipped)
                .map_err(|e| Error::from_io(e, path))?
                == 0
            {
                return Ok(());
            }
        }

        let mut csv_reader = ::csv::ReaderBuilder::new()
            .has_headers(false)
            .delimiter(info.delimiter as u8)
            .trim(::csv::Trim::All)
            .flexible(true)
            .from_reader(reader);

        let line_of = |position: Option<&::csv::Position>| {
            info.first_data_line + position.map_or(0, |p| p.line() as usize)
        };

        let mut record = ::csv::StringRecord::new();
        loop {
            match csv_reader.read_record(&mut record) {
                Ok(true) => {
                    let fields: Vec<&str> = record.iter().collect();
                    visit(line_of(record.position()), &fields)?;
                }
                Ok(false) => return Ok(()),
                Err(e) => {
                    return Err(Error::invalid_at(path, line_of(e.position()), e.to_string()))
                }
            }
        }
    }

    fn inject_header(
        &self,
        writer: &mut dyn Write,
        info: &FileInfo,
        features: &[Feature],
    ) -> io::Result<()> {
        if info.dialect != Dialect::Csv {
            return Ok(());
        }

        let delimiter = if info.delimiter.is_ascii() {
            info.delimiter as u8
        } else {
            b','
        };

        let mut csv_writer = ::csv::WriterBuilder::new()
            .delimiter(delimiter)
            .from_writer(writer);
        csv_writer.write_record(features.iter().map(|f| f.name.as_str()))?;
        csv_writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn feature(id: i64, name: &str) -> Feature {
        Feature {
            id,
            name: name.to_string(),
            is_outlier: false,
            is_virtual: false,
            min_value: 0.0,
            max_value: 1.0,
        }
    }

    #[test]
    fn test_extract_file_info() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("points.csv");
        fs::write(&path, "\nx,y,\"long; name\"\n1,2,3\n").unwrap();

        let info = CsvFormat.extract_file_info(&path).unwrap();
        assert_eq!(info.dialect, Dialect::Csv);
        assert_eq!(info.relation, "points");
        assert_eq!(info.features, vec!["x", "y", "long; name"]);
        assert_eq!(info.first_data_line, 2);
        assert_eq!(CsvFormat.delimiter_of(&path).unwrap(), Some(','));
    }

    #[test]
    fn test_extract_file_info_semicolons() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("points.csv");
        fs::write(&path, "x;y\n1;2\n").unwrap();

        let info = CsvFormat.extract_file_info(&path).unwrap();
        assert_eq!(info.features, vec!["x", "y"]);
        assert_eq!(info.delimiter, ';');
        assert_eq!(info.first_data_line, 1);
    }

    #[test]
    fn test_missing_file() {
        let err = CsvFormat
            .extract_file_info(Path::new("/definitely/not/here.csv"))
            .unwrap_err();
        assert!(matches!(err, Error::FileNotFound { .. }));
    }

    #[test]
    fn test_empty_file_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.csv");
        fs::write(&path, "\n\n").unwrap();

        let err = CsvFormat.extract_file_info(&path).unwrap_err();
        assert!(matches!(err, Error::InvalidFile { .. }));
    }

    #[test]
    fn test_inject_header() {
        let info = FileInfo {
            dialect: Dialect::Csv,
            relation: "out".to_string(),
            features: vec!["a".to_string(), "b c".to_string()],
            first_data_line: 1,
            delimiter: ',',
        };
        let mut buf = Vec::new();
        CsvFormat
            .inject_header(&mut buf, &info, &[feature(1, "a"), feature(2, "b,c")])
            .unwrap();

        assert_eq!(String::from_utf8(buf).unwrap(), "a,\"b,c\"\n");
    }

    fn collect_records(path: &Path) -> Vec<(usize, Vec<String>)> {
        let info = CsvFormat.extract_file_info(path).unwrap();
        let mut records = Vec::new();
        CsvFormat
            .read_records(path, &info, &mut |line, fields| {
                records.push((line, fields.iter().map(|f| f.to_string()).collect()));
                Ok(())
            })
            .unwrap();
        records
    }

    #[test]
    fn test_read_records_honours_quotes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("quoted.csv");
        fs::write(&path, "\"a\",\"b\"\n\"1.5\",\" 2.5\"\n\n\"1,000\",2\n").unwrap();

        let records = collect_records(&path);
        assert_eq!(
            records,
            vec![
                (2, vec!["1.5".to_string(), "2.5".to_string()]),
                (4, vec!["1,000".to_string(), "2".to_string()]),
            ]
        );
    }

    #[test]
    fn test_read_records_whitespace_delimited() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plain.txt");
        fs::write(&path, "a b\n1   2\n").unwrap();

        let records = collect_records(&path);
        assert_eq!(records, vec![(2, vec!["1".to_string(), "2".to_string()])]);
    }

    #[test]
    fn test_inject_header_ignores_other_dialect() {
        let info = FileInfo {
            dialect: Dialect::Arff,
            relation: "out".to_string(),
            features: vec!["a".to_string()],
            first_data_line: 0,
            delimiter: ',',
        };
        let mut buf = Vec::new();
        CsvFormat
            .inject_header(&mut buf, &info, &[feature(1, "a")])
            .unwrap();
        assert!(buf.is_empty());
    }
}
