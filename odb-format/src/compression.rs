use std::io::{Read, Write};
use thiserror::Error;

const GZIP_MAGIC: &[u8] = &[0x1F, 0x8B];
const XZ_MAGIC: &[u8] = &[0xFD, b'7', b'z', b'X', b'Z', 0x00];
const ZSTD_MAGIC: &[u8] = &[0x28, 0xB5, 0x2F, 0xFD];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Compression {
    #[default]
    None,
    Gzip,
    Xz,
    Zstd,
}

impl Compression {
    pub fn algorithm_name(&self) -> Option<&'static str> {
        match self {
            Compression::None => None,
            Compression::Gzip => Some("gzip"),
            Compression::Xz => Some("xz"),
            Compression::Zstd => Some("zstd"),
        }
    }

    pub fn from_name(name: &str) -> Result<Self, CompressionError> {
        match name {
            "none" => Ok(Compression::None),
            "gzip" | "gz" => Ok(Compression::Gzip),
            "xz" => Ok(Compression::Xz),
            "zstd" | "zst" => Ok(Compression::Zstd),
            other => Err(CompressionError::UnknownAlgorithm(other.into())),
        }
    }

    /// Identify a compressed stream by its magic bytes.
    pub fn detect(data: &[u8]) -> Self {
        if data.starts_with(GZIP_MAGIC) {
            Compression::Gzip
        } else if data.starts_with(XZ_MAGIC) {
            Compression::Xz
        } else if data.starts_with(ZSTD_MAGIC) {
            Compression::Zstd
        } else {
            Compression::None
        }
    }
}

#[derive(Debug, Error)]
pub enum CompressionError {
    #[error("compression failed: {0}")]
    CompressFailed(String),
    #[error("decompression failed: {0}")]
    DecompressFailed(String),
    #[error("decompressed data exceeds limit of {0} bytes")]
    LimitExceeded(u64),
    #[error("unknown compression algorithm: {0}")]
    UnknownAlgorithm(String),
}

pub fn compress(data: &[u8], algo: &Compression) -> Result<Vec<u8>, CompressionError> {
    match algo {
        Compression::None => Ok(data.to_vec()),
        Compression::Gzip => {
            use flate2::write::GzEncoder;
            let mut encoder = GzEncoder::new(Vec::new(), flate2::Compression::default());
            encoder
                .write_all(data)
                .map_err(|e| CompressionError::CompressFailed(e.to_string()))?;
            encoder
                .finish()
                .map_err(|e| CompressionError::CompressFailed(e.to_string()))
        }
        Compression::Xz => {
            let mut encoder = xz2::write::XzEncoder::new(Vec::new(), 6);
            encoder
                .write_all(data)
                .map_err(|e| CompressionError::CompressFailed(e.to_string()))?;
            encoder
                .finish()
                .map_err(|e| CompressionError::CompressFailed(e.to_string()))
        }
        Compression::Zstd => zstd::encode_all(std::io::Cursor::new(data), 3)
            .map_err(|e| CompressionError::CompressFailed(e.to_string())),
    }
}

pub fn decompress(data: &[u8], algo: &Compression) -> Result<Vec<u8>, CompressionError> {
    decompress_bounded(data, algo, u64::MAX)
}

/// Decompress, failing once the output would grow past `limit` bytes.
pub fn decompress_bounded(
    data: &[u8],
    algo: &Compression,
    limit: u64,
) -> Result<Vec<u8>, CompressionError> {
    let decoder: Box<dyn Read + '_> = match algo {
        Compression::None => Box::new(data),
        Compression::Gzip => Box::new(flate2::read::GzDecoder::new(data)),
        Compression::Xz => Box::new(xz2::read::XzDecoder::new(data)),
        Compression::Zstd => Box::new(
            zstd::stream::read::Decoder::new(data)
                .map_err(|e| CompressionError::DecompressFailed(e.to_string()))?,
        ),
    };

    let mut out = Vec::new();
    decoder
        .take(limit.saturating_add(1))
        .read_to_end(&mut out)
        .map_err(|e| CompressionError::DecompressFailed(e.to_string()))?;
    if out.len() as u64 > limit {
        return Err(CompressionError::LimitExceeded(limit));
    }
    Ok(out)
}
