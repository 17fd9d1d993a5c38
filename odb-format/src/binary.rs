//! Binary O files: Fortran unformatted sequential records.
//!
//! Every record is bracketed by a 4-byte length marker. A datablock is a
//! 30-byte header record (`name[25] type[1] size:i32`) followed by one
//! payload record.

use crate::reader::{Diagnostics, OdbReadError};
use crate::writer::{OdbWriteError, check_name, check_value, encode_latin1};
use odb_ir::{BlockData, BlockType, CHARACTER_WIDTH, Datablock, MAX_NAME_LEN, OdbDatabase};

/// Length of the header record payload.
pub const HEADER_LEN: usize = MAX_NAME_LEN + 1 + 4;

/// Record terminator inside type `T` payloads.
pub const TEXT_RECORD_END: u8 = b'\r';

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ByteOrder {
    #[default]
    Big,
    Little,
}

impl ByteOrder {
    /// Byte order implied by the opening marker of the first header record.
    pub fn detect(data: &[u8]) -> Option<Self> {
        let marker: [u8; 4] = data.get(..4)?.try_into().ok()?;
        if u32::from_be_bytes(marker) as usize == HEADER_LEN {
            Some(ByteOrder::Big)
        } else if u32::from_le_bytes(marker) as usize == HEADER_LEN {
            Some(ByteOrder::Little)
        } else {
            None
        }
    }

    fn u32(self, b: [u8; 4]) -> u32 {
        match self {
            ByteOrder::Big => u32::from_be_bytes(b),
            ByteOrder::Little => u32::from_le_bytes(b),
        }
    }

    fn i32(self, b: [u8; 4]) -> i32 {
        match self {
            ByteOrder::Big => i32::from_be_bytes(b),
            ByteOrder::Little => i32::from_le_bytes(b),
        }
    }

    fn f32(self, b: [u8; 4]) -> f32 {
        match self {
            ByteOrder::Big => f32::from_be_bytes(b),
            ByteOrder::Little => f32::from_le_bytes(b),
        }
    }

    fn u32_bytes(self, v: u32) -> [u8; 4] {
        match self {
            ByteOrder::Big => v.to_be_bytes(),
            ByteOrder::Little => v.to_le_bytes(),
        }
    }

    fn i32_bytes(self, v: i32) -> [u8; 4] {
        match self {
            ByteOrder::Big => v.to_be_bytes(),
            ByteOrder::Little => v.to_le_bytes(),
        }
    }

    fn f32_bytes(self, v: f32) -> [u8; 4] {
        match self {
            ByteOrder::Big => v.to_be_bytes(),
            ByteOrder::Little => v.to_le_bytes(),
        }
    }
}

/// Sequential reader over marker-delimited records.
pub struct RecordReader<'a> {
    data: &'a [u8],
    pos: usize,
    order: ByteOrder,
}

impl<'a> RecordReader<'a> {
    pub fn new(data: &'a [u8], order: ByteOrder) -> Self {
        Self {
            data,
            pos: 0,
            order,
        }
    }

    pub fn offset(&self) -> usize {
        self.pos
    }

    pub fn at_end(&self) -> bool {
        self.pos >= self.data.len()
    }

    fn marker(&self, at: usize) -> Option<u32> {
        let bytes: [u8; 4] = self.data.get(at..at + 4)?.try_into().ok()?;
        Some(self.order.u32(bytes))
    }

    /// Next record payload, or `None` at a clean end of data.
    pub fn next_record(&mut self) -> Result<Option<&'a [u8]>, OdbReadError> {
        if self.at_end() {
            return Ok(None);
        }
        let start = self.pos;
        let truncated = || OdbReadError::Truncated { offset: start };

        let opening = self.marker(start).ok_or_else(truncated)?;
        let body = start + 4;
        let end = body
            .checked_add(opening as usize)
            .filter(|&e| e <= self.data.len())
            .ok_or_else(truncated)?;
        let closing = self.marker(end).ok_or_else(truncated)?;
        if opening != closing {
            return Err(OdbReadError::MalformedRecord {
                offset: start,
                opening,
                closing,
            });
        }

        self.pos = end + 4;
        Ok(Some(&self.data[body..end]))
    }
}

struct Header {
    name: String,
    code: u8,
    size: i32,
}

fn parse_header(record: &[u8], order: ByteOrder, offset: usize) -> Result<Header, OdbReadError> {
    if record.len() != HEADER_LEN {
        return Err(OdbReadError::InvalidHeaderRecord {
            offset,
            len: record.len(),
        });
    }
    let name = strip_trailing(&record[..MAX_NAME_LEN]);
    let name: String = decode_latin1(name).to_ascii_lowercase();
    let code = record[MAX_NAME_LEN];
    let size_bytes: [u8; 4] = [
        record[MAX_NAME_LEN + 1],
        record[MAX_NAME_LEN + 2],
        record[MAX_NAME_LEN + 3],
        record[MAX_NAME_LEN + 4],
    ];
    Ok(Header {
        name,
        code,
        size: order.i32(size_bytes),
    })
}

/// Decode a binary O file into `db`.
///
/// Blocks decoded before an error stay in `db`.
pub(crate) fn decode(
    data: &[u8],
    order: ByteOrder,
    db: &mut OdbDatabase,
    diag: &mut Diagnostics,
) -> Result<(), OdbReadError> {
    let mut records = RecordReader::new(data, order);

    loop {
        let offset = records.offset();
        let Some(record) = records.next_record()? else {
            break;
        };
        let header = parse_header(record, order, offset)?;

        if header.size == 0 {
            log::debug!("zero-size header '{}' ends the database", header.name);
            break;
        }
        let size = usize::try_from(header.size).map_err(|_| OdbReadError::NegativeSize {
            name: header.name.clone(),
            size: header.size,
        })?;

        let payload_offset = records.offset();
        let payload = records
            .next_record()?
            .ok_or(OdbReadError::Truncated {
                offset: payload_offset,
            })?;

        let Some(block_type) = BlockType::from_code(char::from(header.code)) else {
            let code = char::from(header.code);
            if diag.lenient {
                diag.warn(format_args!(
                    "skipping datablock '{}' of unknown type '{}'",
                    header.name, code
                ));
                continue;
            }
            return Err(OdbReadError::UnknownBlockType {
                name: header.name,
                code,
            });
        };

        let mut size = size;
        if payload_bytes(block_type, size) > data.len() {
            if !diag.lenient {
                return Err(OdbReadError::ImplausibleSize {
                    name: header.name,
                    size: header.size,
                    available: data.len(),
                });
            }
            size = element_count(block_type, payload.len());
            diag.warn(format_args!(
                "datablock '{}' declares {} elements in a {} byte file, keeping {}",
                header.name,
                header.size,
                data.len(),
                size
            ));
        }

        let data = decode_payload(&header.name, block_type, size, payload, order, diag);
        log::debug!(
            "datablock '{}' {} {} ({} payload bytes)",
            header.name,
            block_type,
            size,
            payload.len()
        );
        if let Some(old) = db.insert(Datablock::new(header.name, data)) {
            log::warn!("datablock '{}' appears more than once, keeping the last", old.name);
        }
    }

    Ok(())
}

/// Payload length implied by a header's element count.
fn payload_bytes(block_type: BlockType, size: usize) -> usize {
    match block_type {
        BlockType::Integer | BlockType::Real => size.saturating_mul(4),
        BlockType::Character => size.saturating_mul(CHARACTER_WIDTH),
        BlockType::Text => size,
    }
}

fn element_count(block_type: BlockType, payload_len: usize) -> usize {
    match block_type {
        BlockType::Integer | BlockType::Real => payload_len / 4,
        BlockType::Character => payload_len / CHARACTER_WIDTH,
        BlockType::Text => payload_len,
    }
}

fn decode_payload(
    name: &str,
    block_type: BlockType,
    size: usize,
    payload: &[u8],
    order: ByteOrder,
    diag: &mut Diagnostics,
) -> BlockData {
    let expected_bytes = payload_bytes(block_type, size);
    if payload.len() != expected_bytes {
        diag.warn(format_args!(
            "datablock '{}': expected {} payload bytes, got {}",
            name,
            expected_bytes,
            payload.len()
        ));
    }

    let words = || {
        payload
            .chunks_exact(4)
            .map(|c| [c[0], c[1], c[2], c[3]])
    };

    match block_type {
        BlockType::Integer => {
            let mut v: Vec<i32> = words().map(|w| order.i32(w)).collect();
            v.resize(size, 0);
            BlockData::Integer(v)
        }
        BlockType::Real => {
            let mut v: Vec<f32> = words().map(|w| order.f32(w)).collect();
            v.resize(size, 0.0);
            BlockData::Real(v)
        }
        BlockType::Character => {
            let mut v: Vec<String> = payload
                .chunks_exact(CHARACTER_WIDTH)
                .map(|c| decode_latin1(strip_trailing(c)))
                .collect();
            v.resize(size, String::new());
            BlockData::Character(v)
        }
        BlockType::Text => {
            let mut pieces: Vec<&[u8]> = payload.split(|&b| b == TEXT_RECORD_END).collect();
            // Bytes after the last terminator are not a record.
            pieces.pop();
            BlockData::Text(
                pieces
                    .into_iter()
                    .map(|r| decode_latin1(strip_trailing(r)))
                    .collect(),
            )
        }
    }
}

/// Strip trailing blanks and control bytes.
fn strip_trailing(bytes: &[u8]) -> &[u8] {
    let end = bytes
        .iter()
        .rposition(|&b| b > b' ')
        .map_or(0, |i| i + 1);
    &bytes[..end]
}

/// ISO-8859-1 maps every byte to the code point of the same value.
pub(crate) fn decode_latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}

// --- Encoding ---

fn push_record(out: &mut Vec<u8>, payload: &[u8], order: ByteOrder, name: &str) -> Result<(), OdbWriteError> {
    let len = u32::try_from(payload.len()).map_err(|_| OdbWriteError::BlockTooLarge(name.to_string()))?;
    out.extend_from_slice(&order.u32_bytes(len));
    out.extend_from_slice(payload);
    out.extend_from_slice(&order.u32_bytes(len));
    Ok(())
}

/// Encode a database as a binary O file.
///
/// Empty datablocks are left out: a zero-size header marks the end of a
/// binary file.
pub(crate) fn encode(db: &OdbDatabase, order: ByteOrder) -> Result<Vec<u8>, OdbWriteError> {
    let mut out = Vec::new();

    for block in db {
        let name = &block.name;
        if block.is_empty() {
            log::warn!("datablock '{}' is empty and cannot be stored in a binary file", name);
            continue;
        }

        let (size, payload) = encode_payload(block, order)?;
        let size = i32::try_from(size).map_err(|_| OdbWriteError::BlockTooLarge(name.clone()))?;

        let mut header = Vec::with_capacity(HEADER_LEN);
        header.extend_from_slice(&encode_name(name)?);
        header.push(block.block_type().code() as u8);
        header.extend_from_slice(&order.i32_bytes(size));

        push_record(&mut out, &header, order, name)?;
        push_record(&mut out, &payload, order, name)?;
    }

    Ok(out)
}

fn encode_name(name: &str) -> Result<[u8; MAX_NAME_LEN], OdbWriteError> {
    check_name(name)?;
    let bytes = encode_latin1(&name.to_ascii_uppercase(), name)?;
    if bytes.len() > MAX_NAME_LEN {
        return Err(OdbWriteError::NameTooLong(name.to_string()));
    }
    let mut padded = [b' '; MAX_NAME_LEN];
    padded[..bytes.len()].copy_from_slice(&bytes);
    Ok(padded)
}

fn encode_payload(block: &Datablock, order: ByteOrder) -> Result<(usize, Vec<u8>), OdbWriteError> {
    let name = &block.name;
    match &block.data {
        BlockData::Integer(v) => Ok((
            v.len(),
            v.iter().flat_map(|&x| order.i32_bytes(x)).collect(),
        )),
        BlockData::Real(v) => Ok((
            v.len(),
            v.iter().flat_map(|&x| order.f32_bytes(x)).collect(),
        )),
        BlockData::Character(v) => {
            let mut payload = Vec::with_capacity(v.len() * CHARACTER_WIDTH);
            for (index, value) in v.iter().enumerate() {
                check_value(name, index, value)?;
                let bytes = encode_latin1(value, name)?;
                if bytes.len() > CHARACTER_WIDTH {
                    return Err(OdbWriteError::CharacterTooLong {
                        block: name.clone(),
                        index,
                    });
                }
                payload.extend_from_slice(&bytes);
                payload.resize(payload.len() + CHARACTER_WIDTH - bytes.len(), b' ');
            }
            Ok((v.len(), payload))
        }
        BlockData::Text(records) => {
            let mut payload = Vec::new();
            for (index, rec) in records.iter().enumerate() {
                check_value(name, index, rec)?;
                payload.extend_from_slice(&encode_latin1(rec, name)?);
                payload.push(TEXT_RECORD_END);
            }
            Ok((payload.len(), payload))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(payload: &[u8]) -> Vec<u8> {
        let len = (payload.len() as u32).to_be_bytes();
        [&len[..], payload, &len[..]].concat()
    }

    #[test]
    fn test_detect_byte_order() {
        assert_eq!(ByteOrder::detect(&[0, 0, 0, 30, b'.']), Some(ByteOrder::Big));
        assert_eq!(ByteOrder::detect(&[30, 0, 0, 0, b'.']), Some(ByteOrder::Little));
        assert_eq!(ByteOrder::detect(b".MENU"), None);
        assert_eq!(ByteOrder::detect(&[0, 0]), None);
    }

    #[test]
    fn test_record_reader_walks_records() {
        let data = [record(b"abc"), record(b""), record(b"defg")].concat();
        let mut reader = RecordReader::new(&data, ByteOrder::Big);
        assert_eq!(reader.next_record().unwrap(), Some(&b"abc"[..]));
        assert_eq!(reader.next_record().unwrap(), Some(&b""[..]));
        assert_eq!(reader.next_record().unwrap(), Some(&b"defg"[..]));
        assert_eq!(reader.next_record().unwrap(), None);
    }

    #[test]
    fn test_record_reader_marker_mismatch() {
        let mut data = record(b"abcd");
        let last = data.len() - 1;
        data[last] = 5;
        let mut reader = RecordReader::new(&data, ByteOrder::Big);
        assert!(matches!(
            reader.next_record(),
            Err(OdbReadError::MalformedRecord {
                offset: 0,
                opening: 4,
                closing: 5
            })
        ));
    }

    #[test]
    fn test_record_reader_truncated() {
        let data = record(b"abcdef");
        let mut reader = RecordReader::new(&data[..data.len() - 2], ByteOrder::Big);
        assert!(matches!(
            reader.next_record(),
            Err(OdbReadError::Truncated { offset: 0 })
        ));
    }

    #[test]
    fn test_strip_trailing() {
        assert_eq!(strip_trailing(b"CA  \0\0"), b"CA");
        assert_eq!(strip_trailing(b" N"), b" N");
        assert_eq!(strip_trailing(b"   "), b"");
    }

    #[test]
    fn test_latin1_is_lossless() {
        let s = decode_latin1(&[b'O', 0xC5, 0xFF]);
        assert_eq!(s, "O\u{C5}\u{FF}");
        assert_eq!(encode_latin1(&s, "t").unwrap(), vec![b'O', 0xC5, 0xFF]);
    }
}
