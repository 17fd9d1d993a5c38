mod convert;
mod info;
mod show;
mod validate;

use anyhow::{Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "odb-tool", about = "Inspect, validate and convert O datablock files")]
struct Cli {
    /// Enable debug logging with timing info
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Convert between binary, formatted, JSON and YAML datablock files
    Convert {
        /// Input file (binary or formatted O file, optionally compressed; .json; .yml/.yaml)
        input: PathBuf,

        /// Output file
        #[arg(short, long)]
        output: PathBuf,

        /// Output format (inferred from the output extension if omitted)
        #[arg(long = "to", value_enum)]
        to: Option<Format>,

        /// Compression for O output (none, gzip, xz, zstd); inferred from a
        /// .gz/.xz/.zst extension if omitted
        #[arg(long)]
        compression: Option<String>,

        /// Keep only datablocks matching these comma-separated globs
        #[arg(long)]
        select: Option<String>,

        /// Keep the datablocks read before a decoding error
        #[arg(long)]
        lenient: bool,

        /// Parse and validate without writing output
        #[arg(long)]
        dry_run: bool,
    },

    /// Decode and validate datablock files
    Validate {
        /// Input files
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Suppress individual error output
        #[arg(short, long)]
        quiet: bool,

        /// Print summary count only
        #[arg(short, long)]
        summary: bool,
    },

    /// Display information about datablock files
    Info {
        /// Input files
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
    },

    /// Print the values of one datablock
    Show {
        /// Input file
        input: PathBuf,

        /// Datablock name (case-insensitive)
        block: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Format {
    /// Binary O file, big-endian
    Binary,
    /// Binary O file, little-endian
    BinaryLe,
    /// Formatted (text) O file
    Formatted,
    Json,
    Yaml,
}

impl Format {
    pub(crate) fn is_odb(self) -> bool {
        matches!(self, Format::Binary | Format::BinaryLe | Format::Formatted)
    }
}

const COMPRESSED_EXTENSIONS: &[&str] = &["gz", "xz", "zst"];

/// Extension of `path`, looking through a trailing compression suffix.
pub(crate) fn base_extension(path: &Path) -> Option<String> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    if COMPRESSED_EXTENSIONS.contains(&ext.as_str()) {
        return base_extension(&path.with_extension(""));
    }
    Some(ext)
}

pub(crate) fn detect_format(path: &Path) -> Result<Format> {
    match base_extension(path).as_deref() {
        Some("o" | "dat" | "bin") => Ok(Format::Binary),
        Some("odb" | "txt" | "fmt") => Ok(Format::Formatted),
        Some("json") => Ok(Format::Json),
        Some("yml" | "yaml") => Ok(Format::Yaml),
        Some(ext) => bail!("Unknown file extension: .{ext}. Use --to to choose the output format"),
        None => bail!("Cannot detect format: file has no extension"),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    match cli.command {
        Command::Convert {
            input,
            output,
            to,
            compression,
            select,
            lenient,
            dry_run,
        } => convert::run_convert(&convert::ConvertOptions {
            input: &input,
            output: &output,
            to,
            compression: compression.as_deref(),
            select: select.as_deref(),
            lenient,
            dry_run,
        }),

        Command::Validate {
            inputs,
            quiet,
            summary,
        } => validate::run_validate(&inputs, quiet, summary),

        Command::Info { inputs } => info::run_info(&inputs),

        Command::Show { input, block } => show::run_show(&input, &block),
    }
}
