//! Reading and writing O datablock files, binary and formatted.

pub mod binary;
pub mod compression;
pub mod formatted;
pub mod fortran_format;
pub mod reader;
pub mod writer;

pub use binary::ByteOrder;
pub use compression::Compression;
pub use reader::{
    Encoding, OdbMetadata, OdbReadError, ReadOptions, read_odb_bytes, read_odb_bytes_with,
    read_odb_file, read_odb_file_with, sniff,
};
pub use writer::{OdbWriteError, WriteOptions, write_odb_bytes, write_odb_file};
