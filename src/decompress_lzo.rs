use log::debug;
use thiserror::Error;

/// Failure states of the LZO1X stream decoder.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LzoError {
    #[error("compressed stream truncated (read would pass end of input)")]
    InputOverrun,
    #[error("output buffer too small for decoded data")]
    OutputOverrun,
    #[error("match references data before the start of output")]
    LookbehindOverrun,
    #[error("empty or malformed compressed stream")]
    InvalidData,
}

/// What the next control byte means, given what was just decoded.
enum Mode {
    /// Top of the stream loop: a control byte < 16 opens a literal run.
    Run,
    /// Directly after a literal run: a control byte < 16 is the 3-byte
    /// short match with the 0x800 distance base.
    PostRun,
    /// Match dispatch for an already-read control byte. Entered from the
    /// other modes when the byte is >= 16, and unconditionally after
    /// trailing literals (where a byte < 16 is the 2-byte short match).
    Match(usize),
}

/// Decode one LZO1X stream from `src` into `dst`.
///
/// Returns the number of bytes produced. The stream must terminate with
/// the far-match end marker; input left over after the marker is ignored
/// (chunk payloads are zero-padded past it). Every read and write is
/// bounds-checked before the access, so arbitrary input cannot touch
/// memory outside the two slices.
pub fn decompress(src: &[u8], dst: &mut [u8]) -> Result<usize, LzoError> {
    if src.is_empty() {
        return Err(LzoError::InvalidData);
    }

    let mut ip = 0usize;
    let mut op = 0usize;

    // A first byte above 17 encodes a bare literal run of first - 17
    // bytes. Counts of 1..=3 behave exactly like the trailing literals of
    // a preceding match, so the byte after them is match-dispatched.
    let first = src[0] as usize;
    let mut mode = if first > 17 {
        ip = 1;
        let run = first - 17;
        copy_literals(src, &mut ip, dst, &mut op, run)?;
        if run < 4 {
            Mode::Match(next_byte(src, &mut ip)?)
        } else {
            Mode::PostRun
        }
    } else {
        Mode::Run
    };

    loop {
        match mode {
            Mode::Run => {
                let t = next_byte(src, &mut ip)?;
                if t >= 16 {
                    mode = Mode::Match(t);
                    continue;
                }
                let count = if t == 0 {
                    extended_count(src, &mut ip, 15)?
                } else {
                    t
                };
                copy_literals(src, &mut ip, dst, &mut op, count + 3)?;
                mode = Mode::PostRun;
            }
            Mode::PostRun => {
                let t = next_byte(src, &mut ip)?;
                if t >= 16 {
                    mode = Mode::Match(t);
                    continue;
                }
                let h = next_byte(src, &mut ip)?;
                let dist = 0x801 + (t >> 2) + (h << 2);
                copy_match(dst, &mut op, dist, 3)?;
                mode = after_match(src, &mut ip, dst, &mut op, t & 3)?;
            }
            Mode::Match(t) => {
                if t >= 64 {
                    // Near match, length 3..=8 packed into the top bits.
                    let h = next_byte(src, &mut ip)?;
                    let dist = 1 + ((t >> 2) & 7) + (h << 3);
                    copy_match(dst, &mut op, dist, (t >> 5) + 1)?;
                    mode = after_match(src, &mut ip, dst, &mut op, t & 3)?;
                } else if t >= 32 {
                    // Mid-range match, distance up to 0x4000.
                    let len = 2 + if t & 31 == 0 {
                        extended_count(src, &mut ip, 31)?
                    } else {
                        t & 31
                    };
                    let d0 = next_byte(src, &mut ip)?;
                    let d1 = next_byte(src, &mut ip)?;
                    let dist = 1 + (d0 >> 2) + (d1 << 6);
                    copy_match(dst, &mut op, dist, len)?;
                    mode = after_match(src, &mut ip, dst, &mut op, d0 & 3)?;
                } else if t >= 16 {
                    // Far match, distance 0x4001..=0xBFFF. Doubles as the
                    // end-of-stream carrier: all distance bits zero means
                    // the reference resolves to the cursor itself.
                    let len = 2 + if t & 7 == 0 {
                        extended_count(src, &mut ip, 7)?
                    } else {
                        t & 7
                    };
                    let d0 = next_byte(src, &mut ip)?;
                    let d1 = next_byte(src, &mut ip)?;
                    let reach = ((t & 8) << 11) + (d0 >> 2) + (d1 << 6);
                    if reach == 0 {
                        if ip < src.len() {
                            debug!(
                                "{} input bytes remain after end marker",
                                src.len() - ip
                            );
                        }
                        return Ok(op);
                    }
                    copy_match(dst, &mut op, reach + 0x4000, len)?;
                    mode = after_match(src, &mut ip, dst, &mut op, d0 & 3)?;
                } else {
                    // 2-byte short match; only legal after trailing
                    // literals, and without the 0x800 base of the
                    // post-run form.
                    let h = next_byte(src, &mut ip)?;
                    let dist = 1 + (t >> 2) + (h << 2);
                    copy_match(dst, &mut op, dist, 2)?;
                    mode = after_match(src, &mut ip, dst, &mut op, t & 3)?;
                }
            }
        }
    }
}

/// Trailing-literal handling shared by every match form: the low 2 bits
/// of the match token's second-to-last byte name 0..=3 literals that
/// follow it, and after those the next byte is always match-dispatched.
fn after_match(
    src: &[u8],
    ip: &mut usize,
    dst: &mut [u8],
    op: &mut usize,
    trailing: usize,
) -> Result<Mode, LzoError> {
    if trailing == 0 {
        return Ok(Mode::Run);
    }
    copy_literals(src, ip, dst, op, trailing)?;
    Ok(Mode::Match(next_byte(src, ip)?))
}

fn next_byte(src: &[u8], ip: &mut usize) -> Result<usize, LzoError> {
    let b = *src.get(*ip).ok_or(LzoError::InputOverrun)?;
    *ip += 1;
    Ok(b as usize)
}

/// Zero-byte run extension: each 0x00 adds 255, the first non-zero byte
/// closes the count. Used by literal runs (base 15) and the two
/// extensible match forms (bases 31 and 7).
fn extended_count(src: &[u8], ip: &mut usize, base: usize) -> Result<usize, LzoError> {
    let mut total = base;
    loop {
        let b = next_byte(src, ip)?;
        if b == 0 {
            total += 255;
        } else {
            return Ok(total + b);
        }
    }
}

fn copy_literals(
    src: &[u8],
    ip: &mut usize,
    dst: &mut [u8],
    op: &mut usize,
    n: usize,
) -> Result<(), LzoError> {
    if dst.len() - *op < n {
        return Err(LzoError::OutputOverrun);
    }
    if src.len() - *ip < n {
        return Err(LzoError::InputOverrun);
    }
    dst[*op..*op + n].copy_from_slice(&src[*ip..*ip + n]);
    *ip += n;
    *op += n;
    Ok(())
}

fn copy_match(
    dst: &mut [u8],
    op: &mut usize,
    dist: usize,
    len: usize,
) -> Result<(), LzoError> {
    if dist > *op {
        return Err(LzoError::LookbehindOverrun);
    }
    if dst.len() - *op < len {
        return Err(LzoError::OutputOverrun);
    }
    let mut pos = *op - dist;
    // Source and destination may overlap (dist < len replicates a short
    // pattern), so this must stay a byte-at-a-time copy.
    for _ in 0..len {
        dst[*op] = dst[pos];
        *op += 1;
        pos += 1;
    }
    Ok(())
}
