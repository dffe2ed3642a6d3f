//! Greedy LZO1X encoder. Produces streams the decoder in
//! `decompress_lzo` accepts; match finding is a single-probe hash table,
//! which trades ratio for simplicity.

const MIN_MATCH: usize = 3;

const M2_MAX_LEN: usize = 8;
const M2_MAX_DIST: usize = 0x0800;
const M3_BASE_LEN: usize = 33;
const M3_MAX_DIST: usize = 0x4000;
const M4_BASE_LEN: usize = 9;
const M4_MAX_DIST: usize = 0xBFFF;

const HASH_BITS: u32 = 13;
const HASH_SIZE: usize = 1 << HASH_BITS;

const END_MARKER: [u8; 3] = [0x11, 0x00, 0x00];

/// Worst-case compressed size for `len` input bytes.
pub fn max_compressed_len(len: usize) -> usize {
    len + len / 16 + 64 + 3
}

/// Compress `src` into a self-terminated LZO1X stream.
///
/// Empty input encodes to the bare end marker. Output never exceeds
/// `max_compressed_len(src.len())`.
pub fn compress(src: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(max_compressed_len(src.len()));
    if src.is_empty() {
        out.extend_from_slice(&END_MARKER);
        return out;
    }

    let mut table = vec![0usize; HASH_SIZE];
    let mut pos = 0usize;
    let mut lit_start = 0usize;

    while pos + MIN_MATCH <= src.len() {
        let h = hash(&src[pos..pos + MIN_MATCH]);
        let cand = table[h];
        table[h] = pos;

        // Slot 0 doubles as "never seen"; the byte compare sorts it out.
        if cand < pos
            && pos - cand <= M4_MAX_DIST
            && src[cand..cand + MIN_MATCH] == src[pos..pos + MIN_MATCH]
        {
            let limit = src.len() - pos;
            let mut len = MIN_MATCH;
            while len < limit && src[cand + len] == src[pos + len] {
                len += 1;
            }
            emit_literals(&mut out, &src[lit_start..pos]);
            emit_match(&mut out, pos - cand, len);
            pos += len;
            lit_start = pos;
        } else {
            pos += 1;
        }
    }

    emit_literals(&mut out, &src[lit_start..]);
    out.extend_from_slice(&END_MARKER);
    out
}

fn hash(b: &[u8]) -> usize {
    let v = b[0] as u32 | (b[1] as u32) << 8 | (b[2] as u32) << 16;
    (v.wrapping_mul(0x9E37_79B1) >> (32 - HASH_BITS)) as usize
}

/// Store a pending literal run. Runs of 1..=3 bytes ride in the low 2
/// bits of the previous match token (its second-to-last byte), which is
/// why this must only be called with a short run once a match has been
/// emitted; the stream-start form covers the remaining case.
fn emit_literals(out: &mut Vec<u8>, lits: &[u8]) {
    let t = lits.len();
    if t == 0 {
        return;
    }
    if out.is_empty() && t <= 238 {
        out.push((17 + t) as u8);
    } else if t <= 3 {
        let i = out.len() - 2;
        out[i] |= t as u8;
    } else if t <= 18 {
        out.push((t - 3) as u8);
    } else {
        out.push(0);
        push_extension(out, t - 18);
    }
    out.extend_from_slice(lits);
}

fn emit_match(out: &mut Vec<u8>, dist: usize, len: usize) {
    debug_assert!(len >= MIN_MATCH && dist >= 1 && dist <= M4_MAX_DIST);
    if dist <= M2_MAX_DIST && len <= M2_MAX_LEN {
        let off = dist - 1;
        out.push((((len - 1) << 5) | ((off & 7) << 2)) as u8);
        out.push((off >> 3) as u8);
    } else if dist <= M3_MAX_DIST {
        let off = dist - 1;
        if len <= M3_BASE_LEN {
            out.push((0x20 | (len - 2)) as u8);
        } else {
            out.push(0x20);
            push_extension(out, len - M3_BASE_LEN);
        }
        out.push((off << 2) as u8);
        out.push((off >> 6) as u8);
    } else {
        // Far form; bit 14 of the offset travels in the control byte, so
        // an emitted token can never alias the end marker (off >= 1).
        let off = dist - 0x4000;
        let high = ((off >> 11) & 8) as u8;
        if len <= M4_BASE_LEN {
            out.push(0x10 | high | (len - 2) as u8);
        } else {
            out.push(0x10 | high);
            push_extension(out, len - M4_BASE_LEN);
        }
        out.push((off << 2) as u8);
        out.push((off >> 6) as u8);
    }
}

/// Length extension: a zero byte per full 255, then the remainder.
fn push_extension(out: &mut Vec<u8>, mut rem: usize) {
    debug_assert!(rem > 0);
    while rem > 255 {
        out.push(0);
        rem -= 255;
    }
    out.push(rem as u8);
}
