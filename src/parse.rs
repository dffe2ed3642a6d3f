use log::{debug, warn};
use serde::Serialize;
use thiserror::Error;

pub const CHUNK_MAGIC: [u8; 4] = *b"nFlC";
pub const CHUNK_STRIDE: usize = 0x8000;
pub const MAIN_HEADER_LEN: usize = 64;
pub const CHUNK_HEADER_LEN: usize = 16;

/// Fatal container-level failures. Everything past these two is handled
/// by the reconstruction fallbacks, not the parser.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseError {
    #[error("no nFlC signature at offset 0")]
    NotAContainer,
    #[error("container has no usable chunk headers")]
    EmptyChunkTable,
}

/// Fixed 64-byte header at offset 0, little-endian words. The size
/// fields describe intent, not ground truth: real archives carry
/// headers that disagree with their own payload layout.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct MainHeaderInfo {
    pub version: u32,          // chunk index of chunk 0 in bits 8..23
    pub flags1: u32,           // chunk count; bit 31 = compressed payload
    pub flags2: u32,
    pub hash1: u32,
    pub hash2: u32,
    pub compressed_size: u32,  // payload bytes across all chunks
    pub extra1: u32,
    pub extra2: u32,
    pub decompressed_size: u32,
}

impl MainHeaderInfo {
    pub fn chunk_count(&self) -> u32 {
        self.flags1 & 0x7FFF_FFFF
    }

    pub fn is_compressed(&self) -> bool {
        self.flags1 & 0x8000_0000 != 0
    }
}

/// One located chunk. `data_size` runs to the next located header (or
/// the end of the buffer), never to what any size field claims.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ChunkDescriptor {
    pub offset: usize,       // where the header starts
    pub data_offset: usize,  // first payload byte
    pub data_size: usize,    // payload bytes up to the next header or EOF
    pub index: u16,          // bits 8..23 of the version word
    pub version: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChunkTable {
    pub header: MainHeaderInfo,
    pub chunks: Vec<ChunkDescriptor>,
}

/// Scan `buf` for chunk headers at stride offsets and build the table.
///
/// The signature is mandatory at offset 0 and optional afterwards:
/// compressed payloads regularly span several strides, so a stride
/// position that lands inside payload data is skipped, not fatal.
pub fn parse_container(buf: &[u8]) -> Result<ChunkTable, ParseError> {
    if buf.len() < CHUNK_MAGIC.len() || buf[..4] != CHUNK_MAGIC {
        return Err(ParseError::NotAContainer);
    }
    debug!("parse_container: {} bytes, signature present", buf.len());

    let mut chunks = Vec::new();
    let mut offset = 0usize;
    while offset < buf.len() {
        let header_len = if offset == 0 {
            MAIN_HEADER_LEN
        } else {
            CHUNK_HEADER_LEN
        };
        if buf.len() - offset < header_len {
            break;
        }
        if buf[offset..offset + 4] != CHUNK_MAGIC {
            debug!("no signature at stride offset {:#x}, skipping", offset);
            offset += CHUNK_STRIDE;
            continue;
        }
        let version = read_u32(buf, offset + 4);
        let index = ((version >> 8) & 0xFFFF) as u16;
        debug!(
            "chunk header at {:#x}: version {:#010x}, index {}",
            offset, version, index
        );
        chunks.push(ChunkDescriptor {
            offset,
            data_offset: offset + header_len,
            data_size: 0, // needs the next header's offset, filled below
            index,
            version,
        });
        offset += CHUNK_STRIDE;
    }

    if chunks.is_empty() {
        return Err(ParseError::EmptyChunkTable);
    }

    for i in 0..chunks.len() {
        let end = if i + 1 < chunks.len() {
            chunks[i + 1].offset
        } else {
            buf.len()
        };
        chunks[i].data_size = end.saturating_sub(chunks[i].data_offset);
    }

    let header = parse_main_header(buf);
    if header.chunk_count() as usize != chunks.len() {
        warn!(
            "header declares {} chunks, scan found {}",
            header.chunk_count(),
            chunks.len()
        );
    }

    Ok(ChunkTable { header, chunks })
}

/* ---------- helpers ---------- */

/// Fixed-offset reads; a non-empty table guarantees the 64 bytes exist.
fn parse_main_header(buf: &[u8]) -> MainHeaderInfo {
    MainHeaderInfo {
        version: read_u32(buf, 0x04),
        flags1: read_u32(buf, 0x08),
        flags2: read_u32(buf, 0x0C),
        hash1: read_u32(buf, 0x10),
        hash2: read_u32(buf, 0x14),
        compressed_size: read_u32(buf, 0x18),
        extra1: read_u32(buf, 0x1C),
        extra2: read_u32(buf, 0x20),
        decompressed_size: read_u32(buf, 0x28),
    }
}

fn read_u32(buf: &[u8], off: usize) -> u32 {
    u32::from_le_bytes([buf[off], buf[off + 1], buf[off + 2], buf[off + 3]])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn container(len: usize, signature_offsets: &[usize]) -> Vec<u8> {
        let mut buf = vec![0u8; len];
        for &off in signature_offsets {
            buf[off..off + 4].copy_from_slice(&CHUNK_MAGIC);
        }
        buf
    }

    #[test]
    fn two_chunk_layout_from_signature_scan() {
        let buf = container(65_536, &[0, 32_768]);
        let table = parse_container(&buf).unwrap();

        assert_eq!(table.chunks.len(), 2);
        assert_eq!(table.chunks[0].offset, 0);
        assert_eq!(table.chunks[0].data_offset, 64);
        assert_eq!(table.chunks[0].data_size, 32_704);
        assert_eq!(table.chunks[1].offset, 32_768);
        assert_eq!(table.chunks[1].data_offset, 32_784);
        assert_eq!(table.chunks[1].data_size, 32_752);
    }

    #[test]
    fn stride_without_signature_is_skipped() {
        // The middle stride position holds payload bytes, not a header.
        let mut buf = container(3 * CHUNK_STRIDE, &[0, 2 * CHUNK_STRIDE]);
        buf[CHUNK_STRIDE] = 0xAB;

        let table = parse_container(&buf).unwrap();
        assert_eq!(table.chunks.len(), 2);
        assert_eq!(table.chunks[0].data_size, 2 * CHUNK_STRIDE - 64);
        assert_eq!(table.chunks[1].offset, 2 * CHUNK_STRIDE);
        assert_eq!(table.chunks[1].data_size, CHUNK_STRIDE - 16);
    }

    #[test]
    fn missing_signature_is_not_a_container() {
        let err = parse_container(b"GIF89a, say").unwrap_err();
        assert_eq!(err, ParseError::NotAContainer);
        assert_eq!(parse_container(b"nF").unwrap_err(), ParseError::NotAContainer);
        assert_eq!(parse_container(&[]).unwrap_err(), ParseError::NotAContainer);
    }

    #[test]
    fn signature_without_full_header_is_an_empty_table() {
        let buf = container(63, &[0]);
        assert_eq!(
            parse_container(&buf).unwrap_err(),
            ParseError::EmptyChunkTable
        );
    }

    #[test]
    fn bare_header_is_a_single_empty_chunk() {
        let buf = container(MAIN_HEADER_LEN, &[0]);
        let table = parse_container(&buf).unwrap();
        assert_eq!(table.chunks.len(), 1);
        assert_eq!(table.chunks[0].data_offset, 64);
        assert_eq!(table.chunks[0].data_size, 0);
    }

    #[test]
    fn header_words_read_little_endian() {
        let mut buf = container(128, &[0]);
        buf[0x04..0x08].copy_from_slice(&0x00AB_CD01u32.to_le_bytes());
        buf[0x08..0x0C].copy_from_slice(&0x8000_0003u32.to_le_bytes());
        buf[0x0C..0x10].copy_from_slice(&0x1111_1111u32.to_le_bytes());
        buf[0x10..0x14].copy_from_slice(&0x2222_2222u32.to_le_bytes());
        buf[0x14..0x18].copy_from_slice(&0x3333_3333u32.to_le_bytes());
        buf[0x18..0x1C].copy_from_slice(&0x0001_0000u32.to_le_bytes());
        buf[0x1C..0x20].copy_from_slice(&0x4444_4444u32.to_le_bytes());
        buf[0x20..0x24].copy_from_slice(&0x5555_5555u32.to_le_bytes());
        buf[0x28..0x2C].copy_from_slice(&0x0004_0000u32.to_le_bytes());

        let table = parse_container(&buf).unwrap();
        let h = &table.header;
        assert_eq!(h.version, 0x00AB_CD01);
        assert_eq!(h.flags1, 0x8000_0003);
        assert_eq!(h.flags2, 0x1111_1111);
        assert_eq!(h.hash1, 0x2222_2222);
        assert_eq!(h.hash2, 0x3333_3333);
        assert_eq!(h.compressed_size, 0x0001_0000);
        assert_eq!(h.extra1, 0x4444_4444);
        assert_eq!(h.extra2, 0x5555_5555);
        assert_eq!(h.decompressed_size, 0x0004_0000);
        assert_eq!(h.chunk_count(), 3);
        assert!(h.is_compressed());
        // Index travels in bits 8..23 of the version word.
        assert_eq!(table.chunks[0].index, 0xABCD);
    }
}
