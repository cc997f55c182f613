//! Companion (algorithm output) file parser
//!
//! ```text
//! Subspace 1 dimensionality = 2 [0, 1]
//!
//! Subspace 3 dimensionality = 1 [2]
//! @data
//! 0,0,0.13
//! 1,0,0.87
//! 0,1,0.02
//! 1,1,0.44
//! ```
//!
//! Header lines are split on whitespace, brackets and commas. The fifth
//! field is the dimensionality and the following fields are 0-based
//! feature ids. Blank header lines declare nothing but still count
//! towards subspace ids, which are 1-based header line numbers. Body
//! lines are `row, subspace, score` triples, where `subspace` is the
//! 0-based index among the declared subspaces.

use std::path::Path;

use crate::error::{Error, Result};
use crate::format::{detect_delimiter, open_lines, parse_value, split_fields};
use crate::import::alignment::ScoreQueues;

/// Literal line separating subspace declarations from scores
pub const DATA_MARKER: &str = "@data";

/// Field position of the dimensionality in a header line
const DIMENSIONALITY_FIELD: usize = 4;

/// A subspace as declared by the detection algorithm
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubspaceDecl {
    /// 1-based header line the subspace was declared on
    pub id: i64,
    /// 0-based natural feature ids
    pub base_ids: Vec<usize>,
}

/// Parsed companion file
#[derive(Debug, Clone)]
pub struct Companion {
    pub subspaces: Vec<SubspaceDecl>,
    pub scores: ScoreQueues,
    /// Number of score triples read from the body
    pub triples: usize,
    /// Delimiter sniffed from the first body line
    pub delimiter: char,
}

fn header_fields(line: &str) -> Vec<&str> {
    line.split(|c: char| c.is_whitespace() || matches!(c, '[' | ']' | ','))
        .filter(|field| !field.is_empty())
        .collect()
}

/// Parse one header declaration against `natural_count` natural features
fn parse_declaration(
    path: &Path,
    line_no: usize,
    line: &str,
    natural_count: usize,
) -> Result<SubspaceDecl> {
    let fields = header_fields(line);
    let dimensionality: usize = fields
        .get(DIMENSIONALITY_FIELD)
        .and_then(|f| f.parse().ok())
        .ok_or_else(|| Error::invalid_at(path, line_no, "missing or non-numeric dimensionality"))?;

    let base_ids = fields[DIMENSIONALITY_FIELD + 1..]
        .iter()
        .map(|f| {
            f.parse::<usize>()
                .map_err(|_| Error::invalid_at(path, line_no, format!("bad feature id '{}'", f)))
        })
        .collect::<Result<Vec<usize>>>()?;

    if dimensionality == 0 || base_ids.len() != dimensionality {
        return Err(Error::invalid_at(
            path,
            line_no,
            format!(
                "dimensionality {} does not match {} listed feature ids",
                dimensionality,
                base_ids.len()
            ),
        ));
    }

    if let Some(id) = base_ids.iter().find(|id| **id >= natural_count) {
        return Err(Error::invalid_at(
            path,
            line_no,
            format!(
                "feature id {} out of range; the dataset has {} features",
                id, natural_count
            ),
        ));
    }

    Ok(SubspaceDecl {
        id: line_no as i64,
        base_ids,
    })
}

/// Parse and validate a whole companion file
pub fn parse_companion(path: &Path, natural_count: usize) -> Result<Companion> {
    let mut lines = open_lines(path)?;
    let mut subspaces = Vec::new();
    let mut line_no = 0;
    let mut found_marker = false;

    for line in lines.by_ref() {
        let line = line.map_err(|e| Error::from_io(e, path))?;
        line_no += 1;

        let trimmed = line.trim();
        if trimmed.eq_ignore_ascii_case(DATA_MARKER) {
            found_marker = true;
            break;
        }
        if trimmed.is_empty() {
            continue;
        }

        subspaces.push(parse_declaration(path, line_no, trimmed, natural_count)?);
    }

    if !found_marker {
        return Err(Error::invalid(path, format!("missing {} marker", DATA_MARKER)));
    }

    let first = match lines.next() {
        Some(Ok(line)) => line,
        Some(Err(e)) => {
            return Err(Error::invalid_at(
                path,
                line_no + 1,
                format!("unreadable line after {}: {}", DATA_MARKER, e),
            ))
        }
        None => {
            return Err(Error::invalid_at(
                path,
                line_no + 1,
                format!("no scores after {}", DATA_MARKER),
            ))
        }
    };
    let delimiter = detect_delimiter(&first).unwrap_or(',');

    let mut scores = ScoreQueues::new(subspaces.len());
    let mut triples = 0;

    for line in std::iter::once(Ok(first)).chain(lines) {
        let line = line.map_err(|e| Error::from_io(e, path))?;
        line_no += 1;

        let fields = split_fields(&line, delimiter);
        if fields.iter().take(2).all(|f| f.is_empty()) {
            continue;
        }
        if fields.len() < 3 {
            return Err(Error::invalid_at(
                path,
                line_no,
                "expected row, subspace and score",
            ));
        }

        fields[0]
            .parse::<usize>()
            .map_err(|_| Error::invalid_at(path, line_no, format!("bad row reference '{}'", fields[0])))?;
        let subspace: usize = fields[1].parse().map_err(|_| {
            Error::invalid_at(path, line_no, format!("bad subspace reference '{}'", fields[1]))
        })?;
        let score = parse_value(fields[2]).unwrap_or(f64::NAN);

        scores
            .push(subspace, score)
            .map_err(|e| Error::invalid_at(path, line_no, e.to_string()))?;
        triples += 1;
    }

    Ok(Companion {
        subspaces,
        scores,
        triples,
        delimiter,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write(content: &str) -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scores.txt");
        fs::write(&path, content).unwrap();
        (dir, path)
    }

    #[test]
    fn test_parse_header_and_body() {
        let (_dir, path) = write(
            "Subspace 1 dimensionality = 2 [0, 1]\n\
             \n\
             Subspace 3 dimensionality = 1 [2]\n\
             @data\n\
             0,0,0.13\n\
             1,0,0.87\n\
             \n\
             0,1,0.02\n\
             1,1,0.44\n",
        );

        let companion = parse_companion(&path, 3).unwrap();
        assert_eq!(
            companion.subspaces,
            vec![
                SubspaceDecl {
                    id: 1,
                    base_ids: vec![0, 1]
                },
                SubspaceDecl {
                    id: 3,
                    base_ids: vec![2]
                },
            ]
        );
        assert_eq!(companion.triples, 4);
        assert_eq!(companion.delimiter, ',');
        assert_eq!(companion.scores.pending(0), 2);
        assert_eq!(companion.scores.pending(1), 2);
    }

    #[test]
    fn test_whitespace_body() {
        let (_dir, path) = write("s 1 dim : 2 [0 1]\n@DATA\n0 0 0.5\n1   0\t0.25\n");

        let companion = parse_companion(&path, 2).unwrap();
        assert_eq!(companion.delimiter, ' ');
        assert_eq!(companion.triples, 2);
    }

    #[test]
    fn test_unparsable_score_becomes_nan() {
        let (_dir, path) = write("s 1 dim = 1 [0]\n@data\n0,0,oops\n");

        let mut companion = parse_companion(&path, 2).unwrap();
        let mut row = Vec::new();
        companion.scores.append_row(&mut row).unwrap();
        assert!(row[0].is_nan());
    }

    #[test]
    fn test_missing_marker() {
        let (_dir, path) = write("s 1 dim = 1 [0]\n0,0,0.1\n");
        let err = parse_companion(&path, 2).unwrap_err();
        assert!(matches!(err, Error::InvalidFile { .. }));
    }

    #[test]
    fn test_nothing_after_marker() {
        let (_dir, path) = write("s 1 dim = 1 [0]\n@data\n");
        let err = parse_companion(&path, 2).unwrap_err();
        assert!(matches!(err, Error::InvalidFile { line: Some(3), .. }));
    }

    #[test]
    fn test_dimensionality_mismatch() {
        let (_dir, path) = write("s 1 dim = 3 [0, 1]\n@data\n0,0,0.1\n");
        let err = parse_companion(&path, 2).unwrap_err();
        assert!(matches!(err, Error::InvalidFile { line: Some(1), .. }));
    }

    #[test]
    fn test_feature_id_out_of_range() {
        let (_dir, path) = write("s 1 dim = 1 [5]\n@data\n0,0,0.1\n");
        let err = parse_companion(&path, 2).unwrap_err();
        assert!(err.to_string().contains("out of range"));
    }

    #[test]
    fn test_unknown_subspace_reference() {
        let (_dir, path) = write("s 1 dim = 1 [0]\n@data\n0,0,0.1\n0,4,0.1\n");
        let err = parse_companion(&path, 2).unwrap_err();
        assert!(matches!(err, Error::InvalidFile { line: Some(4), .. }));
    }

    #[test]
    fn test_missing_file() {
        let err = parse_companion(Path::new("/no/such/scores.txt"), 2).unwrap_err();
        assert!(matches!(err, Error::FileNotFound { .. }));
    }
}
