use std::path::{Path, PathBuf};

use anyhow::{bail, Result};

/// Default output path: the input with a `.bin` extension.
pub fn default_out_path(input: &Path) -> PathBuf {
    input.with_extension("bin")
}

/// Refuse to clobber an existing output file unless forced.
pub fn ensure_out_path(path: &Path, force: bool) -> Result<()> {
    if path.exists() {
        if path.is_dir() {
            bail!("output path {} is a directory", path.display());
        }
        if !force {
            bail!(
                "output file {} exists; pass --force to overwrite",
                path.display()
            );
        }
    }
    Ok(())
}

/// First bytes of a payload as spaced hex pairs, ".." when truncated.
pub fn hex_preview(data: &[u8], limit: usize) -> String {
    let shown = data.len().min(limit);
    let mut parts: Vec<String> = data[..shown]
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect();
    if data.len() > shown {
        parts.push("..".into());
    }
    parts.join(" ")
}
