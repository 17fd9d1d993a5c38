use crate::binary::{self, ByteOrder};
use crate::compression::{self, Compression};
use crate::formatted;
use crate::fortran_format::FormatError;
use odb_ir::OdbDatabase;
use std::fmt;
use std::path::Path;
use thiserror::Error;

/// Default cap on the size of decompressed input.
pub const DEFAULT_MAX_DECOMPRESSED: u64 = 1 << 30;

#[derive(Debug, Error)]
pub enum OdbReadError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("decompression failed: {0}")]
    Decompression(#[from] crate::compression::CompressionError),
    #[error("file ends inside the record at byte {offset}")]
    Truncated { offset: usize },
    #[error("record at byte {offset} has length markers {opening} and {closing}")]
    MalformedRecord {
        offset: usize,
        opening: u32,
        closing: u32,
    },
    #[error("header record at byte {offset} is {len} bytes long, expected {expected}", expected = binary::HEADER_LEN)]
    InvalidHeaderRecord { offset: usize, len: usize },
    #[error("datablock '{name}' has negative size {size}")]
    NegativeSize { name: String, size: i32 },
    #[error("datablock '{name}' declares {size} elements but the file is only {available} bytes")]
    ImplausibleSize {
        name: String,
        size: i32,
        available: usize,
    },
    #[error("datablock '{name}' has unknown type '{code}'")]
    UnknownBlockType { name: String, code: char },
    #[error("line {line}: {reason}")]
    InvalidHeader { line: usize, reason: String },
    #[error("line {line}: invalid value '{token}' in datablock '{block}'")]
    InvalidNumber {
        block: String,
        line: usize,
        token: String,
    },
    #[error("datablock '{block}' ends after {found} of {expected} elements")]
    UnexpectedEof {
        block: String,
        expected: usize,
        found: usize,
    },
    #[error("datablock '{block}': {source}")]
    InvalidFormat { block: String, source: FormatError },
}

/// How the datablocks of a file are stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Binary(ByteOrder),
    Formatted,
}

impl Default for Encoding {
    fn default() -> Self {
        Encoding::Binary(ByteOrder::Big)
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Encoding::Binary(ByteOrder::Big) => f.write_str("binary (big-endian)"),
            Encoding::Binary(ByteOrder::Little) => f.write_str("binary (little-endian)"),
            Encoding::Formatted => f.write_str("formatted"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReadOptions {
    /// Return the datablocks decoded before a malformed one instead of failing.
    pub lenient: bool,
    pub max_decompressed_size: u64,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            lenient: false,
            max_decompressed_size: DEFAULT_MAX_DECOMPRESSED,
        }
    }
}

/// What was learned about a file while reading it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OdbMetadata {
    pub encoding: Encoding,
    pub compression: Compression,
    /// Binary file whose first datablock name does not start with `.`
    /// (the layout of O's dgnl data files).
    pub dgnl: bool,
    /// Size of the (decompressed) data in bytes.
    pub size: usize,
    /// Number of recoverable anomalies logged while decoding.
    pub warnings: usize,
}

/// Decode-time settings and warning tally shared by the decoders.
#[derive(Debug, Default)]
pub(crate) struct Diagnostics {
    pub lenient: bool,
    pub warnings: usize,
}

impl Diagnostics {
    pub fn warn(&mut self, args: fmt::Arguments<'_>) {
        log::warn!("{}", args);
        self.warnings += 1;
    }
}

/// Classify (decompressed) data as binary or formatted.
pub fn sniff(data: &[u8]) -> Encoding {
    match ByteOrder::detect(data) {
        Some(order) => Encoding::Binary(order),
        None => Encoding::Formatted,
    }
}

/// Read an O file.
pub fn read_odb_file(path: &Path) -> Result<(OdbMetadata, OdbDatabase), OdbReadError> {
    read_odb_file_with(path, &ReadOptions::default())
}

pub fn read_odb_file_with(
    path: &Path,
    options: &ReadOptions,
) -> Result<(OdbMetadata, OdbDatabase), OdbReadError> {
    let data = std::fs::read(path)?;
    log::debug!("read {} bytes from {}", data.len(), path.display());
    read_odb_bytes_with(&data, options)
}

/// Read an O file held in memory.
pub fn read_odb_bytes(data: &[u8]) -> Result<(OdbMetadata, OdbDatabase), OdbReadError> {
    read_odb_bytes_with(data, &ReadOptions::default())
}

pub fn read_odb_bytes_with(
    data: &[u8],
    options: &ReadOptions,
) -> Result<(OdbMetadata, OdbDatabase), OdbReadError> {
    let compression = Compression::detect(data);
    let decompressed;
    let data = if compression == Compression::None {
        data
    } else {
        log::debug!("input is {:?} compressed", compression);
        decompressed =
            compression::decompress_bounded(data, &compression, options.max_decompressed_size)?;
        decompressed.as_slice()
    };

    let encoding = sniff(data);
    let dgnl = matches!(encoding, Encoding::Binary(_)) && data.get(4) != Some(&b'.');

    let mut diag = Diagnostics {
        lenient: options.lenient,
        warnings: 0,
    };
    let mut db = OdbDatabase::new();
    let result = match encoding {
        Encoding::Binary(order) => binary::decode(data, order, &mut db, &mut diag),
        Encoding::Formatted => formatted::decode(data, &mut db, &mut diag),
    };

    if let Err(e) = result {
        if !options.lenient {
            return Err(e);
        }
        diag.warn(format_args!(
            "stopped after {} datablocks: {}",
            db.len(),
            e
        ));
    }

    let metadata = OdbMetadata {
        encoding,
        compression,
        dgnl,
        size: data.len(),
        warnings: diag.warnings,
    };
    Ok((metadata, db))
}
