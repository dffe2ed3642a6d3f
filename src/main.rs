use std::fs;
use std::io::Read;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Parser};
use serde::Serialize;

mod parse;
mod decompress_lzo;
mod compress_lzo;
mod reconstruct;
mod pack;
mod flags;
mod formatter;
mod util;

/// nFlC game-archive unpacker (LZO-compressed chunk payloads).
#[derive(Parser, Debug)]
#[command(name = "nflc-dump", version)]
struct Cli {
    /// Input: .nflc archive (or any raw file with --pack)
    #[arg(value_name = "INPUT", required = true)]
    input: PathBuf,

    /// Output file; defaults to the input with a .bin (or .nflc) extension
    #[arg(short = 'o', long = "out")]
    out: Option<PathBuf>,

    /// Print header and chunk table, write nothing
    #[arg(short = 'i', long = "info", action = ArgAction::SetTrue)]
    info: bool,

    /// Build an archive from the input instead of unpacking it
    #[arg(long = "pack", action = ArgAction::SetTrue)]
    pack: bool,

    /// Overwrite an existing output file
    #[arg(short = 'f', long = "force", action = ArgAction::SetTrue)]
    force: bool,

    /// Verbose metadata on stderr
    #[arg(short = 'v', long = "verbose", action = ArgAction::SetTrue)]
    verbose: bool,

    /// Write a JSON summary to stdout
    #[arg(long = "json", action = ArgAction::SetTrue)]
    json: bool,
}

#[derive(Debug, Serialize)]
struct Summary {
    file: String,
    file_len: usize,
    header: parse::MainHeaderInfo,
    chunks: usize,
    strategy: reconstruct::Strategy,
    produced: usize,
    output: String,
    notes: Vec<String>,
}

#[derive(Debug, Serialize)]
struct InfoSummary<'a> {
    file: String,
    file_len: usize,
    header: &'a parse::MainHeaderInfo,
    chunks: &'a [parse::ChunkDescriptor],
}

#[derive(Debug, Serialize)]
struct PackSummary {
    file: String,
    file_len: usize,
    output: String,
    output_len: usize,
    chunks: usize,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logger based on verbose flag
    if std::env::var("RUST_LOG").is_err() {
        let level = if cli.verbose { "debug" } else { "info" };
        std::env::set_var("RUST_LOG", level);
    }
    env_logger::init();

    log::debug!("Parsed CLI options: {:?}", cli);

    let mut f = fs::File::open(&cli.input).with_context(|| format!("open {:?}", cli.input))?;
    let mut bytes = Vec::new();
    f.read_to_end(&mut bytes)?;
    log::debug!("Read {} bytes from input file", bytes.len());

    if cli.pack {
        return run_pack(&cli, &bytes);
    }

    let table =
        parse::parse_container(&bytes).with_context(|| format!("parse {:?}", cli.input))?;
    log::debug!("Chunk table ready: {} chunks", table.chunks.len());

    if cli.info {
        return run_info(&cli, &bytes, &table);
    }
    run_decompress(&cli, &bytes, &table)
}

fn run_info(cli: &Cli, bytes: &[u8], table: &parse::ChunkTable) -> Result<()> {
    if cli.json {
        let info = InfoSummary {
            file: cli.input.display().to_string(),
            file_len: bytes.len(),
            header: &table.header,
            chunks: &table.chunks,
        };
        println!("{}", serde_json::to_string_pretty(&info)?);
    } else {
        let path = cli.input.display().to_string();
        print!("{}", formatter::format_info(&path, bytes, table, cli.verbose));
    }
    Ok(())
}

fn run_decompress(cli: &Cli, bytes: &[u8], table: &parse::ChunkTable) -> Result<()> {
    let result = reconstruct::reconstruct(table, bytes)?;

    let out_path = cli
        .out
        .clone()
        .unwrap_or_else(|| util::default_out_path(&cli.input));
    if out_path == cli.input {
        bail!("output path equals the input path");
    }
    util::ensure_out_path(&out_path, cli.force)?;
    fs::write(&out_path, &result.data).with_context(|| format!("write {:?}", out_path))?;
    if cli.verbose {
        eprintln!("wrote {:?}", out_path);
    }

    let summary = Summary {
        file: cli.input.display().to_string(),
        file_len: bytes.len(),
        header: table.header,
        chunks: table.chunks.len(),
        strategy: result.strategy,
        produced: result.data.len(),
        output: out_path.display().to_string(),
        notes: result.notes.clone(),
    };
    log::debug!("Final summary prepared: {:#?}", summary);

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        let formatted =
            formatter::format_summary(&summary.file, bytes.len(), table, &result, &summary.output);
        print!("{}", formatted);
    }
    Ok(())
}

fn run_pack(cli: &Cli, bytes: &[u8]) -> Result<()> {
    let archive = pack::build_archive(bytes)?;

    let out_path = cli
        .out
        .clone()
        .unwrap_or_else(|| cli.input.with_extension("nflc"));
    if out_path == cli.input {
        bail!("output path equals the input path");
    }
    util::ensure_out_path(&out_path, cli.force)?;
    fs::write(&out_path, &archive).with_context(|| format!("write {:?}", out_path))?;
    if cli.verbose {
        eprintln!("wrote {:?}", out_path);
    }

    let summary = PackSummary {
        file: cli.input.display().to_string(),
        file_len: bytes.len(),
        output: out_path.display().to_string(),
        output_len: archive.len(),
        chunks: bytes.len().div_ceil(pack::INPUT_CHUNK).max(1),
    };
    if cli.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!(
            "packed {} ({}) into {} ({}, {} chunks)",
            summary.file,
            formatter::format_bytes(summary.file_len),
            summary.output,
            formatter::format_bytes(summary.output_len),
            summary.chunks
        );
    }
    Ok(())
}
