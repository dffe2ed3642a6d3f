use anyhow::{anyhow, Result};
use log::debug;

use crate::compress_lzo::compress;
use crate::parse::{CHUNK_MAGIC, CHUNK_STRIDE, MAIN_HEADER_LEN};

/// Input bytes per chunk. Real archives compress their payload in
/// 0xA000-byte pieces, one chunk header per piece.
pub const INPUT_CHUNK: usize = 0xA000;

/// Assemble a container from raw bytes: 64-byte main header, chunk 0's
/// payload directly after it, every later chunk header on the next free
/// stride boundary with zero padding in between. Payloads are free to
/// run across stride positions; the parser's skip-on-mismatch scan
/// steps over them.
pub fn build_archive(input: &[u8]) -> Result<Vec<u8>> {
    let decompressed_size = u32::try_from(input.len())
        .map_err(|_| anyhow!("input too large to pack ({} bytes)", input.len()))?;

    let pieces: Vec<&[u8]> = if input.is_empty() {
        vec![&input[..]]
    } else {
        input.chunks(INPUT_CHUNK).collect()
    };

    let mut payloads = Vec::with_capacity(pieces.len());
    let mut total = 0usize;
    for (i, piece) in pieces.iter().enumerate() {
        let packed = compress(piece);
        debug!("chunk {}: {} -> {} bytes", i, piece.len(), packed.len());
        total += packed.len();
        payloads.push(packed);
    }
    let compressed_size = u32::try_from(total)
        .map_err(|_| anyhow!("compressed payload too large ({} bytes)", total))?;
    let chunk_count = payloads.len() as u32;

    let mut out = Vec::with_capacity(MAIN_HEADER_LEN + total);
    out.extend_from_slice(&CHUNK_MAGIC);
    push_u32(&mut out, 0x0000_0001); // chunk 0 index in bits 8..23
    push_u32(&mut out, 0x8000_0000 | chunk_count);
    push_u32(&mut out, 0); // flags2
    push_u32(&mut out, 0); // hash1
    push_u32(&mut out, 0); // hash2
    push_u32(&mut out, compressed_size);
    push_u32(&mut out, 0); // extra1
    push_u32(&mut out, 0); // extra2
    push_u32(&mut out, 0);
    push_u32(&mut out, decompressed_size);
    push_u32(&mut out, 0);
    out.extend_from_slice(&[0u8; 16]); // reserved

    for (i, payload) in payloads.iter().enumerate() {
        if i > 0 {
            let boundary = out.len().div_ceil(CHUNK_STRIDE) * CHUNK_STRIDE;
            out.resize(boundary, 0);
            out.extend_from_slice(&CHUNK_MAGIC);
            push_u32(&mut out, 0x01 | ((i as u32) << 8));
            push_u32(&mut out, 0);
            push_u32(&mut out, 0);
        }
        out.extend_from_slice(payload);
    }

    debug!(
        "archive: {} chunks, {} payload bytes, {} total",
        chunk_count,
        total,
        out.len()
    );
    Ok(out)
}

fn push_u32(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_le_bytes());
}
