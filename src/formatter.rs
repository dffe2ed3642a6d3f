use crate::flags;
use crate::parse::ChunkTable;
use crate::reconstruct::Reconstructed;
use crate::util::hex_preview;
use std::fmt::Write;

// ANSI color codes
const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";
const CYAN: &str = "\x1b[36m";
const GREEN: &str = "\x1b[32m";
const BRIGHT_CYAN: &str = "\x1b[96m";
const BRIGHT_YELLOW: &str = "\x1b[93m";

/// Check if color output should be enabled
fn use_colors() -> bool {
    // Check if stdout is a terminal and NO_COLOR env var is not set
    atty::is(atty::Stream::Stdout) && std::env::var("NO_COLOR").is_err()
}

/// Analysis view: file facts, every header field, one row per chunk.
pub fn format_info(path: &str, buf: &[u8], table: &ChunkTable, verbose: bool) -> String {
    let colors = use_colors();
    let mut out = String::new();

    render_title(&mut out, colors);

    render_section(&mut out, "File", BRIGHT_CYAN, colors);
    let pairs = vec![
        ("Path", path.to_string()),
        ("Size", format_bytes(buf.len())),
        ("Chunks", table.chunks.len().to_string()),
    ];
    render_kv_block(&mut out, &pairs, 3, colors);
    writeln!(out).unwrap();

    render_header(&mut out, table, colors);
    writeln!(out).unwrap();

    render_chunk_rows(&mut out, buf, table, verbose, colors);
    out
}

/// Post-reconstruction summary for the default decompress mode.
pub fn format_summary(
    path: &str,
    file_len: usize,
    table: &ChunkTable,
    result: &Reconstructed,
    out_path: &str,
) -> String {
    let colors = use_colors();
    let mut out = String::new();

    render_title(&mut out, colors);

    render_section(&mut out, "Input", BRIGHT_CYAN, colors);
    let pairs = vec![
        ("Path", path.to_string()),
        ("Size", format_bytes(file_len)),
        ("Chunks", table.chunks.len().to_string()),
        ("Flags", flags::format_flags1(table.header.flags1)),
    ];
    render_kv_block(&mut out, &pairs, 3, colors);
    writeln!(out).unwrap();

    render_section(&mut out, "Reconstruction", BRIGHT_YELLOW, colors);
    let pairs = vec![
        ("Strategy", result.strategy.describe().to_string()),
        ("Produced", format_bytes(result.data.len())),
        (
            "Declared",
            format_bytes(table.header.decompressed_size as usize),
        ),
        ("Output", out_path.to_string()),
    ];
    render_kv_block(&mut out, &pairs, 3, colors);

    if !result.notes.is_empty() {
        writeln!(out).unwrap();
        render_section(&mut out, "Notes", BRIGHT_YELLOW, colors);
        for note in &result.notes {
            if colors {
                writeln!(out, "   {}•{} {}", DIM, RESET, note).unwrap();
            } else {
                writeln!(out, "   • {}", note).unwrap();
            }
        }
    }

    out
}

fn render_title(out: &mut String, colors: bool) {
    if colors {
        writeln!(out, "{}nFlC Archive{}", BOLD, RESET).unwrap();
        writeln!(out, "{}{}{}", CYAN, "=".repeat(50), RESET).unwrap();
    } else {
        writeln!(out, "nFlC Archive").unwrap();
        writeln!(out, "{}", "=".repeat(50)).unwrap();
    }
    writeln!(out).unwrap();
}

fn render_section(out: &mut String, name: &str, color: &str, colors: bool) {
    if colors {
        writeln!(out, "{}{}{}{}", BOLD, color, name, RESET).unwrap();
    } else {
        writeln!(out, "{}", name).unwrap();
    }
}

fn render_header(out: &mut String, table: &ChunkTable, colors: bool) {
    let h = &table.header;
    render_section(out, "Main Header", BRIGHT_CYAN, colors);
    let pairs = vec![
        ("Version", flags::format_word(h.version)),
        ("Flags", flags::format_flags1(h.flags1)),
        ("Flags 2", flags::format_word(h.flags2)),
        ("Hash 1", flags::format_word(h.hash1)),
        ("Hash 2", flags::format_word(h.hash2)),
        (
            "Extra",
            format!("{:#010x} / {:#010x}", h.extra1, h.extra2),
        ),
        ("Compressed", format_bytes(h.compressed_size as usize)),
        ("Declared", format_bytes(h.decompressed_size as usize)),
    ];
    render_kv_block(out, &pairs, 3, colors);
}

fn render_chunk_rows(
    out: &mut String,
    buf: &[u8],
    table: &ChunkTable,
    verbose: bool,
    colors: bool,
) {
    render_section(out, "Chunk Table", BRIGHT_YELLOW, colors);
    for (i, c) in table.chunks.iter().enumerate() {
        if colors {
            writeln!(
                out,
                "   {}#{:<3}{} offset {}{:#010x}{}  data at {:#010x}, {}  index {}",
                BOLD,
                i,
                RESET,
                GREEN,
                c.offset,
                RESET,
                c.data_offset,
                format_bytes(c.data_size),
                c.index
            )
            .unwrap();
        } else {
            writeln!(
                out,
                "   #{:<3} offset {:#010x}  data at {:#010x}, {}  index {}",
                i,
                c.offset,
                c.data_offset,
                format_bytes(c.data_size),
                c.index
            )
            .unwrap();
        }
        if verbose {
            let start = c.data_offset.min(buf.len());
            let end = (c.data_offset + c.data_size).min(buf.len());
            let preview = hex_preview(&buf[start..end], 16);
            if colors {
                writeln!(out, "        {}{}{}", DIM, preview, RESET).unwrap();
            } else {
                writeln!(out, "        {}", preview).unwrap();
            }
        }
    }
}

/// Render a block of key-value pairs with aligned colons
fn render_kv_block(out: &mut String, pairs: &[(&str, String)], indent: usize, colors: bool) {
    if pairs.is_empty() {
        return;
    }

    let max_key_len = pairs.iter().map(|(k, _)| k.len()).max().unwrap_or(0);
    let indent_str = " ".repeat(indent);

    for (key, value) in pairs {
        let padding = " ".repeat(max_key_len - key.len());
        if colors {
            writeln!(
                out,
                "{}{}{}{}{}{}: {}{}{}",
                indent_str, BOLD, CYAN, key, RESET, padding, BRIGHT_CYAN, value, RESET
            )
            .unwrap();
        } else {
            writeln!(out, "{}{}{}:  {}", indent_str, key, padding, value).unwrap();
        }
    }
}

/// Format bytes with thousands separators
pub fn format_bytes(n: usize) -> String {
    let digits = n.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    let lead = digits.len() % 3;
    for (i, ch) in digits.chars().enumerate() {
        if i != 0 && (i + 3 - lead) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    format!("{} bytes", grouped)
}
