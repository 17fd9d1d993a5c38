use anyhow::{Context, Result, bail};
use odb_format::compression::{self, Compression};
use odb_format::reader::{Encoding, OdbMetadata, ReadOptions, read_odb_file_with};
use odb_format::writer::{WriteOptions, write_odb_bytes};
use odb_format::ByteOrder;
use odb_ir::OdbDatabase;
use std::path::Path;
use std::time::Instant;

use crate::Format;

/// A decoded input file. `metadata` is set for O files only.
pub struct Input {
    pub db: OdbDatabase,
    pub metadata: Option<OdbMetadata>,
}

pub fn parse_input(input: &Path, lenient: bool) -> Result<Input> {
    let start = Instant::now();
    let parsed = match crate::base_extension(input).as_deref() {
        Some("json") => {
            let text = std::fs::read_to_string(input)
                .with_context(|| format!("reading {}", input.display()))?;
            let db = serde_json::from_str(&text)
                .with_context(|| format!("parsing JSON from {}", input.display()))?;
            Input { db, metadata: None }
        }
        Some("yml" | "yaml") => {
            let text = std::fs::read_to_string(input)
                .with_context(|| format!("reading {}", input.display()))?;
            let db = serde_yaml::from_str(&text)
                .with_context(|| format!("parsing YAML from {}", input.display()))?;
            Input { db, metadata: None }
        }
        _ => {
            let options = ReadOptions {
                lenient,
                ..Default::default()
            };
            let (metadata, db) = read_odb_file_with(input, &options)
                .with_context(|| format!("reading O file {}", input.display()))?;
            Input {
                db,
                metadata: Some(metadata),
            }
        }
    };

    log::debug!(
        "Parse time for {}: {:.1}ms",
        input.display(),
        start.elapsed().as_secs_f64() * 1000.0
    );
    Ok(parsed)
}

pub fn parse_compression(s: &str) -> Result<Compression> {
    match Compression::from_name(s) {
        Ok(c) => Ok(c),
        Err(_) => bail!("Unknown compression: {s}. Use gzip, xz, zstd, or none"),
    }
}

/// Compression implied by a `.gz`, `.xz` or `.zst` suffix.
fn compression_from_extension(path: &Path) -> Compression {
    match path.extension().and_then(|e| e.to_str()) {
        Some("gz") => Compression::Gzip,
        Some("xz") => Compression::Xz,
        Some("zst") => Compression::Zstd,
        _ => Compression::None,
    }
}

/// Serialize a database in the requested output format.
pub fn encode_output(db: &OdbDatabase, format: Format, compression: Compression) -> Result<Vec<u8>> {
    let bytes = match format {
        Format::Json => {
            let mut json = serde_json::to_vec_pretty(db).context("writing JSON")?;
            json.push(b'\n');
            json
        }
        Format::Yaml => serde_yaml::to_string(db).context("writing YAML")?.into_bytes(),
        Format::Binary | Format::BinaryLe | Format::Formatted => {
            let encoding = match format {
                Format::BinaryLe => Encoding::Binary(ByteOrder::Little),
                Format::Formatted => Encoding::Formatted,
                _ => Encoding::Binary(ByteOrder::Big),
            };
            let options = WriteOptions {
                encoding,
                compression: Compression::None,
            };
            write_odb_bytes(db, &options).context("encoding O file")?
        }
    };

    if compression == Compression::None {
        return Ok(bytes);
    }
    if !format.is_odb() {
        bail!("Compression is only supported for O output, not {format:?}");
    }
    Ok(compression::compress(&bytes, &compression)?)
}

pub struct ConvertOptions<'a> {
    pub input: &'a Path,
    pub output: &'a Path,
    pub to: Option<Format>,
    pub compression: Option<&'a str>,
    pub select: Option<&'a str>,
    pub lenient: bool,
    pub dry_run: bool,
}

pub fn run_convert(opts: &ConvertOptions<'_>) -> Result<()> {
    let total_start = Instant::now();
    let out_fmt = match opts.to {
        Some(f) => f,
        None => crate::detect_format(opts.output).context("output file")?,
    };
    let compression = match opts.compression {
        Some(name) => parse_compression(name)?,
        None => compression_from_extension(opts.output),
    };

    let Input { mut db, metadata } = parse_input(opts.input, opts.lenient)?;
    if let Some(meta) = &metadata {
        log::info!(
            "Read {} datablocks ({}, {} bytes)",
            db.len(),
            meta.encoding,
            meta.size
        );
        if meta.warnings > 0 {
            log::warn!("{}: {} decoding warnings", opts.input.display(), meta.warnings);
        }
    }

    if let Some(pattern) = opts.select {
        let before = db.len();
        odb_ir::filter_by_pattern(&mut db, pattern);
        log::info!("Select '{pattern}': {before} -> {} datablocks", db.len());
    }

    if let Err(errors) = odb_ir::validate_database(&db) {
        for e in &errors {
            log::warn!("Validation: {e}");
        }
    }

    log::info!("Converting to {:?}", out_fmt);
    let bytes = encode_output(&db, out_fmt, compression)?;

    if opts.dry_run {
        println!(
            "dry run: would write {} bytes to {}",
            bytes.len(),
            opts.output.display()
        );
        return Ok(());
    }

    std::fs::write(opts.output, &bytes)
        .with_context(|| format!("writing {}", opts.output.display()))?;

    log::debug!(
        "Total time: {:.1}ms",
        total_start.elapsed().as_secs_f64() * 1000.0
    );
    println!(
        "Converted {} -> {}",
        opts.input.display(),
        opts.output.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use odb_ir::{BlockData, Datablock};
    use pretty_assertions::assert_eq;

    fn sample_db() -> OdbDatabase {
        [
            Datablock::new("a_atom_z", BlockData::Integer(vec![6, 7, 8])),
            Datablock::new(".menu", BlockData::Character(vec!["YES".into(), "NO".into()])),
        ]
        .into_iter()
        .collect()
    }

    fn options<'a>(input: &'a Path, output: &'a Path) -> ConvertOptions<'a> {
        ConvertOptions {
            input,
            output,
            to: None,
            compression: None,
            select: None,
            lenient: false,
            dry_run: false,
        }
    }

    #[test]
    fn parse_compression_names() {
        assert_eq!(parse_compression("gzip").unwrap(), Compression::Gzip);
        assert_eq!(parse_compression("xz").unwrap(), Compression::Xz);
        assert_eq!(parse_compression("zstd").unwrap(), Compression::Zstd);
        assert_eq!(parse_compression("none").unwrap(), Compression::None);
    }

    #[test]
    fn parse_compression_invalid() {
        let err = parse_compression("brotli").unwrap_err();
        assert!(err.to_string().contains("Unknown compression"));
    }

    #[test]
    fn compression_follows_extension() {
        assert_eq!(compression_from_extension(Path::new("m.o.gz")), Compression::Gzip);
        assert_eq!(compression_from_extension(Path::new("m.odb.xz")), Compression::Xz);
        assert_eq!(compression_from_extension(Path::new("m.o")), Compression::None);
    }

    #[test]
    fn encode_json_rejects_compression() {
        let err = encode_output(&sample_db(), Format::Json, Compression::Gzip).unwrap_err();
        assert!(err.to_string().contains("only supported for O output"));
    }

    #[test]
    fn convert_binary_to_json_and_back() {
        let dir = tempfile::tempdir().unwrap();
        let bin = dir.path().join("in.o");
        let json = dir.path().join("out.json");
        let back = dir.path().join("back.odb.gz");

        std::fs::write(&bin, encode_output(&sample_db(), Format::Binary, Compression::None).unwrap())
            .unwrap();
        run_convert(&options(&bin, &json)).unwrap();
        run_convert(&options(&json, &back)).unwrap();

        let parsed = parse_input(&back, false).unwrap();
        let meta = parsed.metadata.unwrap();
        assert_eq!(meta.encoding, Encoding::Formatted);
        assert_eq!(meta.compression, Compression::Gzip);
        assert_eq!(parsed.db, sample_db());
    }

    #[test]
    fn convert_with_select_and_explicit_format() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.yaml");
        let output = dir.path().join("out.data");
        std::fs::write(&input, serde_yaml::to_string(&sample_db()).unwrap()).unwrap();

        let mut opts = options(&input, &output);
        opts.to = Some(Format::BinaryLe);
        opts.select = Some(".MENU");
        run_convert(&opts).unwrap();

        let (meta, db) = odb_format::read_odb_file(&output).unwrap();
        assert_eq!(meta.encoding, Encoding::Binary(ByteOrder::Little));
        assert_eq!(db.names().collect::<Vec<_>>(), vec![".menu"]);
    }

    #[test]
    fn convert_dry_run_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.json");
        let output = dir.path().join("out.o");
        std::fs::write(&input, serde_json::to_string(&sample_db()).unwrap()).unwrap();

        let mut opts = options(&input, &output);
        opts.dry_run = true;
        run_convert(&opts).unwrap();
        assert!(!output.exists());
    }

    #[test]
    fn convert_unknown_output_extension() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.json");
        std::fs::write(&input, "{\"blocks\":[]}").unwrap();
        let output = dir.path().join("out.pdb");
        let err = run_convert(&options(&input, &output)).unwrap_err();
        assert!(format!("{err:#}").contains("Unknown file extension"));
    }
}
