use crate::binary;
use crate::compression::{self, Compression};
use crate::formatted;
use crate::reader::Encoding;
use odb_ir::OdbDatabase;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OdbWriteError {
    #[error("invalid datablock name '{0}'")]
    InvalidName(String),
    #[error("datablock name '{0}' is longer than {max} characters", max = odb_ir::MAX_NAME_LEN)]
    NameTooLong(String),
    #[error("element {index} of datablock '{block}' is longer than {width} characters", width = odb_ir::CHARACTER_WIDTH)]
    CharacterTooLong { block: String, index: usize },
    #[error("element {index} of datablock '{block}' contains a line terminator")]
    LineBreak { block: String, index: usize },
    #[error("element {index} of datablock '{block}' ends in a blank or control character")]
    TrailingBlank { block: String, index: usize },
    #[error("datablock '{0}' contains characters outside ISO-8859-1")]
    NotLatin1(String),
    #[error("datablock '{0}' is too large for a binary record")]
    BlockTooLarge(String),
    #[error("compression failed: {0}")]
    CompressionFailed(#[from] crate::compression::CompressionError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Default)]
pub struct WriteOptions {
    pub encoding: Encoding,
    pub compression: Compression,
}

/// Write a database as an O file.
pub fn write_odb_file(
    db: &OdbDatabase,
    options: &WriteOptions,
    path: &Path,
) -> Result<(), OdbWriteError> {
    let bytes = write_odb_bytes(db, options)?;
    std::fs::write(path, bytes)?;
    Ok(())
}

/// Write a database as O file bytes.
pub fn write_odb_bytes(db: &OdbDatabase, options: &WriteOptions) -> Result<Vec<u8>, OdbWriteError> {
    let encoded = match options.encoding {
        Encoding::Binary(order) => binary::encode(db, order)?,
        Encoding::Formatted => formatted::encode(db)?,
    };
    log::debug!(
        "encoded {} datablocks as {} ({} bytes)",
        db.len(),
        options.encoding,
        encoded.len()
    );

    if options.compression == Compression::None {
        return Ok(encoded);
    }
    Ok(compression::compress(&encoded, &options.compression)?)
}

/// Encode text as ISO-8859-1, the inverse of the decoders' byte mapping.
pub(crate) fn encode_latin1(text: &str, block: &str) -> Result<Vec<u8>, OdbWriteError> {
    text.chars()
        .map(|c| u8::try_from(c).map_err(|_| OdbWriteError::NotLatin1(block.to_string())))
        .collect()
}

/// Names must survive the header of either encoding: no blanks, and no
/// leading `!`, which marks a comment line in formatted files.
pub(crate) fn check_name(name: &str) -> Result<(), OdbWriteError> {
    if name.is_empty() || name.starts_with('!') || name.chars().any(char::is_whitespace) {
        return Err(OdbWriteError::InvalidName(name.to_string()));
    }
    Ok(())
}

/// Character and text values must decode back unchanged. The decoders end a
/// value at a line break and strip trailing bytes up to `' '`.
pub(crate) fn check_value(block: &str, index: usize, value: &str) -> Result<(), OdbWriteError> {
    if value.contains(['\r', '\n']) {
        return Err(OdbWriteError::LineBreak {
            block: block.to_string(),
            index,
        });
    }
    if value.ends_with(|c: char| c <= ' ') {
        return Err(OdbWriteError::TrailingBlank {
            block: block.to_string(),
            index,
        });
    }
    Ok(())
}
