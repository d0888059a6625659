//! File encoding: read, digest, compress, base64.

use anyhow::{Context, Result};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use memmap2::Mmap;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use crate::StorageMode;
use crate::utils::config::ReadConsts;

/// A file's bytes in artifact form.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Encoded {
    /// Base64 of the stored bytes.
    pub data: String,
    /// Blake3 of the raw bytes, lowercase hex.
    pub digest: String,
    pub size: u64,
}

/// Encode raw bytes for the given storage mode. Gzip uses the maximum level.
pub fn encode_bytes(raw: &[u8], mode: StorageMode) -> Result<Encoded> {
    let digest = digest_hex(raw);
    let data = match mode {
        StorageMode::Gzip => {
            let mut gz = GzEncoder::new(Vec::with_capacity(raw.len() / 2), Compression::best());
            gz.write_all(raw).context("gzip write")?;
            STANDARD.encode(gz.finish().context("gzip finish")?)
        }
        StorageMode::Raw => STANDARD.encode(raw),
    };
    Ok(Encoded {
        data,
        digest,
        size: raw.len() as u64,
    })
}

/// Read the whole file at `path` and encode it. Memory-mapped above the mmap threshold,
/// buffered read otherwise.
pub fn encode_file(path: &Path, mode: StorageMode) -> Result<Encoded> {
    let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let size = file
        .metadata()
        .with_context(|| format!("stat {}", path.display()))?
        .len();

    if size > ReadConsts::MMAP_THRESHOLD {
        // SAFETY: read-only map; a concurrent truncate by another process can fault, same as
        // any mmap reader.
        let mmap = unsafe { Mmap::map(&file) }.with_context(|| format!("mmap {}", path.display()))?;
        encode_bytes(&mmap, mode)
    } else {
        let mut reader = std::io::BufReader::with_capacity(ReadConsts::READ_BUFFER_SIZE, file);
        let mut raw = Vec::with_capacity(size as usize);
        reader
            .read_to_end(&mut raw)
            .with_context(|| format!("read {}", path.display()))?;
        encode_bytes(&raw, mode)
    }
}

/// Inverse of [`encode_bytes`]: base64-decode, then gunzip in gzip mode.
pub fn decode_data(data: &str, mode: StorageMode) -> Result<Vec<u8>> {
    let stored = STANDARD.decode(data).context("base64 decode")?;
    match mode {
        StorageMode::Gzip => {
            let mut raw = Vec::new();
            GzDecoder::new(stored.as_slice())
                .read_to_end(&mut raw)
                .context("gunzip")?;
            Ok(raw)
        }
        StorageMode::Raw => Ok(stored),
    }
}

/// Blake3 hex digest of `raw`, for comparing against [`Encoded::digest`].
pub fn digest_hex(raw: &[u8]) -> String {
    blake3::hash(raw).to_hex().to_string()
}
