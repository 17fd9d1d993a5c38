//! Formatted (text) O files.
//!
//! Each datablock starts with a header line `name type size [format]`,
//! followed by its values. Comment lines (`!`) and blank lines may
//! precede a header.

use crate::binary::decode_latin1;
use crate::fortran_format::{self, Layout};
use crate::reader::{Diagnostics, OdbReadError};
use crate::writer::{OdbWriteError, check_name, check_value, encode_latin1};
use odb_ir::{BlockData, BlockType, CHARACTER_WIDTH, Datablock, MAX_NAME_LEN, OdbDatabase};
use std::fmt::Write as _;

pub const INTEGER_FORMAT: &str = "(6I12)";
pub const REAL_FORMAT: &str = "(5E16.8)";
pub const CHARACTER_FORMAT: &str = "(10(1X,A6))";

const INTEGERS_PER_LINE: usize = 6;
const REALS_PER_LINE: usize = 5;
const CHARACTERS_PER_LINE: usize = 10;

/// Upper bound on up-front allocation for a block; header sizes are untrusted.
const MAX_PREALLOC: usize = 4096;

/// Line/column cursor over the text of a formatted file.
struct TextCursor<'a> {
    lines: Vec<&'a str>,
    line: usize,
    col: usize,
}

impl<'a> TextCursor<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            lines: text.lines().collect(),
            line: 0,
            col: 0,
        }
    }

    /// 1-based number of the line the cursor is on.
    fn line_number(&self) -> usize {
        self.line + 1
    }

    /// Discard the rest of a partly consumed line.
    fn finish_line(&mut self) {
        if self.col > 0 {
            self.line += 1;
            self.col = 0;
        }
    }

    /// Remainder of the current line; the cursor moves to the next line.
    fn take_line(&mut self) -> Option<&'a str> {
        let line = self.lines.get(self.line).copied()?;
        let rest = &line[self.col..];
        self.line += 1;
        self.col = 0;
        Some(rest)
    }

    /// Next whitespace-delimited token, crossing line boundaries.
    fn next_token(&mut self) -> Option<(usize, &'a str)> {
        loop {
            let line = self.lines.get(self.line).copied()?;
            let rest = &line[self.col..];
            let trimmed = rest.trim_start();
            if trimmed.is_empty() {
                self.line += 1;
                self.col = 0;
                continue;
            }
            let start = self.col + (rest.len() - trimmed.len());
            let len = trimmed.find(char::is_whitespace).unwrap_or(trimmed.len());
            self.col = start + len;
            return Some((self.line + 1, &line[start..start + len]));
        }
    }
}

struct Header {
    name: String,
    block_type: BlockType,
    size: usize,
    format: String,
}

/// Read the next header line, skipping comments and blank lines.
fn read_header(cursor: &mut TextCursor<'_>) -> Result<Option<Header>, OdbReadError> {
    cursor.finish_line();
    let (line_no, tokens) = loop {
        let line_no = cursor.line_number();
        let Some(line) = cursor.take_line() else {
            return Ok(None);
        };
        let tokens: Vec<&str> = line.split_whitespace().collect();
        match tokens.first() {
            None => continue,
            Some(t) if t.starts_with('!') => continue,
            Some(_) => break (line_no, tokens),
        }
    };

    let invalid = |reason: String| OdbReadError::InvalidHeader {
        line: line_no,
        reason,
    };

    let name = tokens[0].to_ascii_lowercase();
    let code = tokens
        .get(1)
        .and_then(|t| t.chars().next())
        .ok_or_else(|| invalid(format!("datablock '{name}' has no type")))?;
    let block_type = BlockType::from_code(code).ok_or_else(|| OdbReadError::UnknownBlockType {
        name: name.clone(),
        code,
    })?;
    let size_token = tokens
        .get(2)
        .ok_or_else(|| invalid(format!("datablock '{name}' has no size")))?;
    let size = size_token
        .parse::<usize>()
        .map_err(|_| invalid(format!("datablock '{name}' has size '{size_token}'")))?;
    let format = tokens[3.min(tokens.len())..].concat();

    if name.len() > MAX_NAME_LEN {
        log::warn!("line {}: datablock name '{}' is longer than {} characters", line_no, name, MAX_NAME_LEN);
    }

    Ok(Some(Header {
        name,
        block_type,
        size,
        format,
    }))
}

/// Decode a formatted O file into `db`.
///
/// Blocks decoded before an error stay in `db`.
pub(crate) fn decode(
    data: &[u8],
    db: &mut OdbDatabase,
    diag: &mut Diagnostics,
) -> Result<(), OdbReadError> {
    let text = decode_latin1(data);
    let mut cursor = TextCursor::new(&text);

    while let Some(header) = read_header(&mut cursor)? {
        let Header {
            name,
            block_type,
            size,
            format,
        } = header;

        let data = match block_type {
            BlockType::Integer => {
                BlockData::Integer(read_tokens(&mut cursor, &name, size, |t| t.parse().ok())?)
            }
            BlockType::Real => BlockData::Real(read_tokens(&mut cursor, &name, size, parse_real)?),
            BlockType::Character => {
                BlockData::Character(read_characters(&mut cursor, &name, size, &format, diag)?)
            }
            BlockType::Text => BlockData::Text(read_text(&mut cursor, &name, size, &format)?),
        };

        log::debug!("datablock '{}' {} {} {}", name, block_type, size, format);
        if let Some(old) = db.insert(Datablock::new(name, data)) {
            log::warn!("datablock '{}' appears more than once, keeping the last", old.name);
        }
    }

    Ok(())
}

/// Parse a real, accepting Fortran `D` exponents.
fn parse_real(token: &str) -> Option<f32> {
    token
        .parse()
        .ok()
        .or_else(|| token.replace(['D', 'd'], "e").parse().ok())
}

fn read_tokens<T>(
    cursor: &mut TextCursor<'_>,
    block: &str,
    size: usize,
    parse: impl Fn(&str) -> Option<T>,
) -> Result<Vec<T>, OdbReadError> {
    let mut values = Vec::with_capacity(size.min(MAX_PREALLOC));
    while values.len() < size {
        let (line, token) = cursor.next_token().ok_or_else(|| OdbReadError::UnexpectedEof {
            block: block.to_string(),
            expected: size,
            found: values.len(),
        })?;
        let value = parse(token).ok_or_else(|| OdbReadError::InvalidNumber {
            block: block.to_string(),
            line,
            token: token.to_string(),
        })?;
        values.push(value);
    }
    Ok(values)
}

fn read_characters(
    cursor: &mut TextCursor<'_>,
    block: &str,
    size: usize,
    format: &str,
    diag: &mut Diagnostics,
) -> Result<Vec<String>, OdbReadError> {
    if size == 0 {
        return Ok(Vec::new());
    }

    let layout = if format.is_empty() {
        None
    } else {
        let layout = fortran_format::compile(format).map_err(|source| OdbReadError::InvalidFormat {
            block: block.to_string(),
            source,
        })?;
        (layout.field_count() > 0).then_some(layout)
    };

    let Some(layout) = layout else {
        diag.warn(format_args!(
            "datablock '{}': no character fields in format '{}', reading free-form",
            block, format
        ));
        let values = read_tokens(cursor, block, size, |t| Some(t.to_string()))?;
        cursor.finish_line();
        return Ok(values);
    };

    read_with_layout(cursor, block, size, &layout)
}

fn read_with_layout(
    cursor: &mut TextCursor<'_>,
    block: &str,
    size: usize,
    layout: &Layout,
) -> Result<Vec<String>, OdbReadError> {
    let mut values = Vec::with_capacity(size.min(MAX_PREALLOC));
    while values.len() < size {
        let line = cursor.take_line().ok_or_else(|| OdbReadError::UnexpectedEof {
            block: block.to_string(),
            expected: size,
            found: values.len(),
        })?;
        let remaining = size - values.len();
        values.extend(layout.split_line(line).into_iter().take(remaining));
    }
    Ok(values)
}

/// Record length from the format of a `T` block: `72`, `A72` or `(A72)`.
fn record_length(format: &str) -> Option<usize> {
    let f = format.trim_start_matches('(').trim_end_matches(')');
    let f = f.trim_start_matches(['a', 'A']);
    f.parse().ok().filter(|&n| n > 0)
}

fn read_text(
    cursor: &mut TextCursor<'_>,
    block: &str,
    size: usize,
    format: &str,
) -> Result<Vec<String>, OdbReadError> {
    let reclen = record_length(format);
    if reclen.is_none() && !format.is_empty() {
        log::warn!("datablock '{}': unusable record length '{}'", block, format);
    }

    let mut records = Vec::with_capacity(size.min(MAX_PREALLOC));
    while records.len() < size {
        let line = cursor.take_line().ok_or_else(|| OdbReadError::UnexpectedEof {
            block: block.to_string(),
            expected: size,
            found: records.len(),
        })?;
        let rec: String = match reclen {
            Some(n) => line.chars().take(n).collect(),
            None => line.to_string(),
        };
        records.push(rec.trim_end_matches(|c: char| c <= ' ').to_string());
    }
    Ok(records)
}

// --- Encoding ---

/// Encode a database as a formatted O file.
pub(crate) fn encode(db: &OdbDatabase) -> Result<Vec<u8>, OdbWriteError> {
    let mut bytes = Vec::new();

    for block in db {
        let mut out = String::new();
        let name = &block.name;
        check_name(name)?;
        if name.chars().count() > MAX_NAME_LEN {
            return Err(OdbWriteError::NameTooLong(name.clone()));
        }
        let upper = name.to_ascii_uppercase();

        match &block.data {
            BlockData::Integer(v) => {
                header(&mut out, &upper, BlockType::Integer, v.len(), INTEGER_FORMAT);
                for chunk in v.chunks(INTEGERS_PER_LINE) {
                    for x in chunk {
                        let _ = write!(out, "{x:>12}");
                    }
                    out.push('\n');
                }
            }
            BlockData::Real(v) => {
                header(&mut out, &upper, BlockType::Real, v.len(), REAL_FORMAT);
                for chunk in v.chunks(REALS_PER_LINE) {
                    for x in chunk {
                        let _ = write!(out, "{x:>16.8e}");
                    }
                    out.push('\n');
                }
            }
            BlockData::Character(v) => {
                for (index, value) in v.iter().enumerate() {
                    check_value(name, index, value)?;
                    if value.chars().count() > CHARACTER_WIDTH {
                        return Err(OdbWriteError::CharacterTooLong {
                            block: name.clone(),
                            index,
                        });
                    }
                }
                header(&mut out, &upper, BlockType::Character, v.len(), CHARACTER_FORMAT);
                for chunk in v.chunks(CHARACTERS_PER_LINE) {
                    for value in chunk {
                        let _ = write!(out, " {value:<6}");
                    }
                    out.push('\n');
                }
            }
            BlockData::Text(records) => {
                for (index, rec) in records.iter().enumerate() {
                    check_value(name, index, rec)?;
                }
                let reclen = records
                    .iter()
                    .map(|r| r.chars().count())
                    .max()
                    .unwrap_or(0)
                    .max(1);
                header(&mut out, &upper, BlockType::Text, records.len(), &reclen.to_string());
                for rec in records {
                    out.push_str(rec);
                    out.push('\n');
                }
            }
        }
        bytes.extend(encode_latin1(&out, name)?);
    }

    Ok(bytes)
}

fn header(out: &mut String, name: &str, block_type: BlockType, size: usize, format: &str) {
    let _ = writeln!(out, "{name:<25} {block_type} {size:>8} {format}");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cursor_tokens_cross_lines() {
        let mut c = TextCursor::new("  1 2\n\n 3\n");
        assert_eq!(c.next_token(), Some((1, "1")));
        assert_eq!(c.next_token(), Some((1, "2")));
        assert_eq!(c.next_token(), Some((3, "3")));
        assert_eq!(c.next_token(), None);
    }

    #[test]
    fn test_cursor_finish_line_discards_rest() {
        let mut c = TextCursor::new("1 2 3\nnext\n");
        c.next_token();
        c.finish_line();
        assert_eq!(c.take_line(), Some("next"));
    }

    #[test]
    fn test_parse_real_fortran_exponent() {
        assert_eq!(parse_real("1.5D2"), Some(150.0));
        assert_eq!(parse_real("-2.0d-1"), Some(-0.2));
        assert_eq!(parse_real("3.25"), Some(3.25));
        assert_eq!(parse_real("x1"), None);
    }

    #[test]
    fn test_record_length_forms() {
        assert_eq!(record_length("72"), Some(72));
        assert_eq!(record_length("(A80)"), Some(80));
        assert_eq!(record_length("a40"), Some(40));
        assert_eq!(record_length(""), None);
        assert_eq!(record_length("0"), None);
    }
}
