//! Attribute-Relation File Format
//!
//! ```text
//! % comment
//! @relation glass
//! @attribute 'refractive index' numeric
//! @attribute class {1,2,3}
//! @data
//! 1.52,1
//! ```

use std::io::{self, Write};
use std::path::Path;

use crate::error::{Error, Result};
use crate::format::{
    detect_delimiter, open_lines, relation_name, Dialect, FileInfo, FormatStrategy,
};
use crate::models::Feature;

/// Strategy for `.arff` files
#[derive(Debug, Clone, Copy, Default)]
pub struct ArffFormat;

struct ArffHeader {
    relation: Option<String>,
    attributes: Vec<String>,
    first_data_line: usize,
    first_data_row: Option<String>,
}

fn is_comment_line(line: &str) -> bool {
    line.trim_start().starts_with('%')
}

/// Strip a leading `@keyword` (case-insensitive), returning the remainder
fn strip_keyword<'a>(line: &'a str, keyword: &str) -> Option<&'a str> {
    let head = line.get(..keyword.len())?;
    if !head.eq_ignore_ascii_case(keyword) {
        return None;
    }
    let rest = &line[keyword.len()..];
    match rest.chars().next() {
        None => Some(rest),
        Some(c) if c.is_whitespace() => Some(rest.trim()),
        Some(_) => None,
    }
}

/// Read a possibly quoted name from the start of `text`
///
/// Inside quotes a backslash escapes the next character.
fn leading_name(text: &str) -> Option<String> {
    let text = text.trim_start();
    let mut chars = text.chars();
    match chars.next()? {
        quote @ ('\'' | '"') => {
            let mut name = String::new();
            while let Some(c) = chars.next() {
                match c {
                    '\\' => name.push(chars.next()?),
                    c if c == quote => return Some(name),
                    c => name.push(c),
                }
            }
            None
        }
        _ => text.split_whitespace().next().map(str::to_string),
    }
}

/// Quote a name when it contains characters ARFF treats as separators
fn quoted(name: &str) -> String {
    let plain = !name.is_empty()
        && name
            .chars()
            .all(|c| !c.is_whitespace() && !matches!(c, ',' | '\'' | '"' | '\\' | '{' | '}' | '%'));
    if plain {
        name.to_string()
    } else {
        format!("'{}'", name.replace('\\', "\\\\").replace('\'', "\\'"))
    }
}

fn read_header(path: &Path) -> Result<ArffHeader> {
    let mut relation = None;
    let mut attributes = Vec::new();
    let mut data_start = None;

    let mut lines = open_lines(path)?.enumerate();
    for (index, line) in lines.by_ref() {
        let line = line.map_err(|e| Error::from_io(e, path))?;
        let trimmed = line.trim();
        if trimmed.is_empty() || is_comment_line(trimmed) {
            continue;
        }

        if let Some(rest) = strip_keyword(trimmed, "@relation") {
            relation = leading_name(rest);
        } else if let Some(rest) = strip_keyword(trimmed, "@attribute") {
            let name = leading_name(rest)
                .ok_or_else(|| Error::invalid_at(path, index + 1, "attribute without a name"))?;
            attributes.push(name);
        } else if strip_keyword(trimmed, "@data").is_some() {
            data_start = Some(index + 1);
            break;
        } else {
            return Err(Error::invalid_at(
                path,
                index + 1,
                format!("unexpected header line '{}'", trimmed),
            ));
        }
    }

    let first_data_line =
        data_start.ok_or_else(|| Error::invalid(path, "missing @data section"))?;

    let mut first_data_row = None;
    for (_, line) in lines {
        let line = line.map_err(|e| Error::from_io(e, path))?;
        if !line.trim().is_empty() && !is_comment_line(&line) {
            first_data_row = Some(line);
            break;
        }
    }

    Ok(ArffHeader {
        relation,
        attributes,
        first_data_line,
        first_data_row,
    })
}

impl FormatStrategy for ArffFormat {
    fn name(&self) -> &'static str {
        "ARFF"
    }

    fn dialect(&self) -> Dialect {
        Dialect::Arff
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["arff"]
    }

    fn extract_file_info(&self, path: &Path) -> Result<FileInfo> {
        let header = read_header(path)?;
        let delimiter = header
            .first_data_row
            .as_deref()
            .and_then(detect_delimiter)
            .unwrap_or(self.default_delimiter());

        Ok(FileInfo {
            dialect: Dialect::Arff,
            relation: header.relation.unwrap_or_else(|| relation_name(path)),
            features: header.attributes,
            first_data_line: header.first_data_line,
            delimiter,
        })
    }

    fn delimiter_of(&self, path: &Path) -> Result<Option<char>> {
        let header = read_header(path)?;
        Ok(header.first_data_row.as_deref().and_then(detect_delimiter))
    }

    fn missing_token(&self) -> &'static str {
        "?"
    }

    fn is_comment(&self, line: &str) -> bool {
        is_comment_line(line)
    }

    fn inject_header(
        &self,
        writer: &mut dyn Write,
        info: &FileInfo,
        features: &[Feature],
    ) -> io::Result<()> {
        if info.dialect != Dialect::Arff {
            return Ok(());
        }

        writeln!(writer, "@relation {}", quoted(&info.relation))?;
        writeln!(writer)?;
        for feature in features {
            writeln!(writer, "@attribute {} numeric", quoted(&feature.name))?;
        }
        writeln!(writer)?;
        writeln!(writer, "@data")?;
        Ok(())
    }
}
