use odb_format::reader::{Encoding, read_odb_bytes, read_odb_file};
use odb_format::writer::{OdbWriteError, WriteOptions, write_odb_bytes, write_odb_file};
use odb_format::{ByteOrder, Compression};
use odb_ir::{BlockData, Datablock, OdbDatabase};
use pretty_assertions::assert_eq;

fn sample_db() -> OdbDatabase {
    [
        Datablock::new(".menu", BlockData::Character(vec![
            "YES".into(),
            " NO".into(),
            "\u{C5}NGSTR".into(),
            String::new(),
            "ABCDEF".into(),
        ])),
        Datablock::new("m_atom_z", BlockData::Integer(vec![7, -6, i32::MAX, i32::MIN, 0, 1, 2])),
        Datablock::new("m_atom_xyz", BlockData::Real(vec![
            1.0,
            -0.1,
            3.402_823_5e38,
            1.0e-40,
            123_456.79,
            f32::MIN_POSITIVE,
        ])),
        Datablock::new(".help", BlockData::Text(vec![
            "First line".into(),
            String::new(),
            "   indented, with punctuation!".into(),
        ])),
    ]
    .into_iter()
    .collect()
}

fn roundtrip(db: &OdbDatabase, encoding: Encoding) -> OdbDatabase {
    let options = WriteOptions {
        encoding,
        ..Default::default()
    };
    let bytes = write_odb_bytes(db, &options).unwrap();
    let (meta, decoded) = read_odb_bytes(&bytes).unwrap();
    assert_eq!(meta.encoding, encoding);
    assert_eq!(meta.warnings, 0);
    decoded
}

#[test]
fn test_binary_big_endian_roundtrip() {
    let db = sample_db();
    assert_eq!(roundtrip(&db, Encoding::Binary(ByteOrder::Big)), db);
}

#[test]
fn test_binary_little_endian_roundtrip() {
    let db = sample_db();
    assert_eq!(roundtrip(&db, Encoding::Binary(ByteOrder::Little)), db);
}

#[test]
fn test_formatted_roundtrip() {
    let db = sample_db();
    assert_eq!(roundtrip(&db, Encoding::Formatted), db);
}

#[test]
fn test_formatted_output_layout() {
    let db: OdbDatabase = [
        Datablock::new("n", BlockData::Integer((1..=7).collect())),
        Datablock::new("t", BlockData::Text(vec!["ab".into(), "abcd".into()])),
    ]
    .into_iter()
    .collect();
    let options = WriteOptions {
        encoding: Encoding::Formatted,
        ..Default::default()
    };
    let text = String::from_utf8(write_odb_bytes(&db, &options).unwrap()).unwrap();
    let lines: Vec<&str> = text.lines().collect();

    assert_eq!(lines[0], format!("{:<25} I {:>8} (6I12)", "N", 7));
    assert_eq!(lines[1].len(), 72);
    assert_eq!(lines[2], format!("{:>12}", 7));
    assert_eq!(lines[3], format!("{:<25} T {:>8} 4", "T", 2));
    assert_eq!(&lines[4..], &["ab", "abcd"]);
}

#[test]
fn test_binary_header_bytes() {
    let db: OdbDatabase = [Datablock::new(".x", BlockData::Integer(vec![1]))]
        .into_iter()
        .collect();
    let bytes = write_odb_bytes(&db, &WriteOptions::default()).unwrap();

    assert_eq!(&bytes[..4], &[0, 0, 0, 30]);
    assert_eq!(&bytes[4..29], format!("{:<25}", ".X").as_bytes());
    assert_eq!(bytes[29], b'I');
    assert_eq!(&bytes[30..34], &1i32.to_be_bytes());
    assert_eq!(&bytes[34..38], &[0, 0, 0, 30]);
    assert_eq!(bytes.len(), 38 + 4 + 4 + 4);
}

#[test]
fn test_binary_skips_empty_blocks() {
    let db: OdbDatabase = [
        Datablock::new("a", BlockData::Integer(vec![1])),
        Datablock::new("empty", BlockData::Real(Vec::new())),
        Datablock::new("b", BlockData::Integer(vec![2])),
    ]
    .into_iter()
    .collect();

    let decoded = roundtrip(&db, Encoding::Binary(ByteOrder::Big));
    assert_eq!(decoded.names().collect::<Vec<_>>(), vec!["a", "b"]);

    let decoded = roundtrip(&db, Encoding::Formatted);
    assert_eq!(decoded, db);
}

#[test]
fn test_uppercase_names_are_lowercased_on_read() {
    let db: OdbDatabase = [Datablock::new("Mixed_Case", BlockData::Integer(vec![3]))]
        .into_iter()
        .collect();
    for encoding in [Encoding::Binary(ByteOrder::Big), Encoding::Formatted] {
        let decoded = roundtrip(&db, encoding);
        assert_eq!(decoded.names().collect::<Vec<_>>(), vec!["mixed_case"]);
    }
}

#[test]
fn test_write_and_read_file() {
    let dir = tempfile::tempdir().unwrap();
    let db = sample_db();

    for (file, encoding, compression) in [
        ("plain.o", Encoding::Binary(ByteOrder::Big), Compression::None),
        ("plain.odb", Encoding::Formatted, Compression::None),
        ("packed.o.gz", Encoding::Binary(ByteOrder::Little), Compression::Gzip),
        ("packed.odb.zst", Encoding::Formatted, Compression::Zstd),
        ("packed.o.xz", Encoding::Binary(ByteOrder::Big), Compression::Xz),
    ] {
        let path = dir.path().join(file);
        let options = WriteOptions {
            encoding,
            compression,
        };
        write_odb_file(&db, &options, &path).unwrap();

        let (meta, decoded) = read_odb_file(&path).unwrap();
        assert_eq!(meta.encoding, encoding, "{file}");
        assert_eq!(meta.compression, compression, "{file}");
        assert_eq!(decoded, db, "{file}");
    }
}

fn write_both(db: &OdbDatabase) -> [Result<Vec<u8>, OdbWriteError>; 2] {
    [Encoding::Binary(ByteOrder::Big), Encoding::Formatted].map(|encoding| {
        let options = WriteOptions {
            encoding,
            ..Default::default()
        };
        write_odb_bytes(db, &options)
    })
}

#[test]
fn test_rejects_long_name() {
    let db: OdbDatabase = [Datablock::new("n".repeat(26), BlockData::Integer(vec![1]))]
        .into_iter()
        .collect();
    for result in write_both(&db) {
        assert!(matches!(result, Err(OdbWriteError::NameTooLong(_))));
    }
}

#[test]
fn test_rejects_name_with_whitespace() {
    let db: OdbDatabase = [Datablock::new("two words", BlockData::Integer(vec![1]))]
        .into_iter()
        .collect();
    for result in write_both(&db) {
        assert!(matches!(result, Err(OdbWriteError::InvalidName(_))));
    }
}

#[test]
fn test_rejects_name_read_back_as_comment() {
    let db: OdbDatabase = [Datablock::new("!x", BlockData::Integer(vec![1]))]
        .into_iter()
        .collect();
    for result in write_both(&db) {
        assert!(matches!(result, Err(OdbWriteError::InvalidName(ref n)) if n == "!x"));
    }
}

#[test]
fn test_rejects_values_the_reader_would_strip() {
    let blocks = [
        BlockData::Character(vec!["A ".into(), " ".into()]),
        BlockData::Character(vec!["OK".into(), "B\0".into()]),
        BlockData::Text(vec!["x  ".into(), "\t".into()]),
    ];
    for data in blocks {
        let db: OdbDatabase = [Datablock::new("v", data)].into_iter().collect();
        for result in write_both(&db) {
            assert!(
                matches!(result, Err(OdbWriteError::TrailingBlank { ref block, .. }) if block == "v"),
                "{result:?}"
            );
        }
    }

    let db: OdbDatabase = [Datablock::new(
        "c",
        BlockData::Character(vec!["A\nB".into()]),
    )]
    .into_iter()
    .collect();
    for result in write_both(&db) {
        assert!(matches!(result, Err(OdbWriteError::LineBreak { index: 0, .. })));
    }
}

#[test]
fn test_leading_blanks_survive_roundtrip() {
    let db: OdbDatabase = [
        Datablock::new("c", BlockData::Character(vec![" A".into(), "  B  C".into()])),
        Datablock::new("t", BlockData::Text(vec!["  x".into(), "\ty".into()])),
    ]
    .into_iter()
    .collect();
    for encoding in [Encoding::Binary(ByteOrder::Big), Encoding::Formatted] {
        assert_eq!(roundtrip(&db, encoding), db);
    }
}

#[test]
fn test_rejects_long_character_value() {
    let db: OdbDatabase = [Datablock::new(
        "c",
        BlockData::Character(vec!["OK".into(), "SEVENCH".into()]),
    )]
    .into_iter()
    .collect();
    for result in write_both(&db) {
        assert!(matches!(
            result,
            Err(OdbWriteError::CharacterTooLong { index: 1, .. })
        ));
    }
}

#[test]
fn test_rejects_text_line_break() {
    let db: OdbDatabase = [Datablock::new(
        "t",
        BlockData::Text(vec!["one\rtwo".into()]),
    )]
    .into_iter()
    .collect();
    for result in write_both(&db) {
        assert!(matches!(
            result,
            Err(OdbWriteError::LineBreak { index: 0, .. })
        ));
    }
}

#[test]
fn test_rejects_non_latin1() {
    let db: OdbDatabase = [Datablock::new(
        "t",
        BlockData::Text(vec!["\u{3b1}-helix".into()]),
    )]
    .into_iter()
    .collect();
    for result in write_both(&db) {
        assert!(matches!(result, Err(OdbWriteError::NotLatin1(ref b)) if b == "t"));
    }
}
