//! Binary layout of `<name>_index.bin`:
//!
//! ```text
//! magic "RDSKFLAT" | u32 version | u32 dim | u64 rows | [u8; 32] chunk digest | rows*dim f32
//! ```
//!
//! All integers and floats are little-endian. The digest is the BLAKE3 hash of
//! the chunk table the index was built with.

use ragdesk_core::{Error, Result};

use crate::flat::FlatL2Index;

pub const MAGIC: &[u8; 8] = b"RDSKFLAT";
pub const FORMAT_VERSION: u32 = 1;
pub const HEADER_LEN: usize = 8 + 4 + 4 + 8 + 32;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexHeader {
    pub version: u32,
    pub dim: u32,
    pub rows: u64,
    pub chunk_digest: [u8; 32],
}

/// Digest of a chunk table, independent of its JSON formatting.
pub fn chunk_table_digest(chunks: &[String]) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&(chunks.len() as u64).to_le_bytes());
    for chunk in chunks {
        hasher.update(&(chunk.len() as u64).to_le_bytes());
        hasher.update(chunk.as_bytes());
    }
    *hasher.finalize().as_bytes()
}

pub fn encode_index(index: &FlatL2Index, chunk_digest: &[u8; 32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(HEADER_LEN + index.as_slice().len() * 4);
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    out.extend_from_slice(&(index.dim() as u32).to_le_bytes());
    out.extend_from_slice(&(index.len() as u64).to_le_bytes());
    out.extend_from_slice(chunk_digest);
    for value in index.as_slice() {
        out.extend_from_slice(&value.to_le_bytes());
    }
    out
}

/// Parses an index artifact. `origin` only labels errors.
pub fn decode_index(bytes: &[u8], origin: &str) -> Result<(IndexHeader, FlatL2Index)> {
    let corrupt = |reason: String| Error::CorruptIndex { path: origin.to_string(), reason };

    if bytes.len() < HEADER_LEN {
        return Err(corrupt(format!("truncated header ({} bytes)", bytes.len())));
    }
    if &bytes[..8] != MAGIC {
        return Err(corrupt("bad magic".into()));
    }
    let version = u32::from_le_bytes(le_array(&bytes[8..12]));
    if version != FORMAT_VERSION {
        return Err(corrupt(format!("unsupported version {version}")));
    }
    let dim = u32::from_le_bytes(le_array(&bytes[12..16]));
    let rows = u64::from_le_bytes(le_array(&bytes[16..24]));
    let chunk_digest: [u8; 32] = le_array(&bytes[24..56]);

    let body = &bytes[HEADER_LEN..];
    let expected = (dim as u64)
        .checked_mul(rows)
        .and_then(|n| n.checked_mul(4))
        .ok_or_else(|| corrupt("size overflow".into()))?;
    if body.len() as u64 != expected {
        return Err(corrupt(format!("expected {expected} payload bytes, found {}", body.len())));
    }

    let data: Vec<f32> = body.chunks_exact(4).map(|b| f32::from_le_bytes(le_array(b))).collect();
    let index = FlatL2Index::from_raw(dim as usize, data).map_err(|e| corrupt(e.to_string()))?;
    Ok((IndexHeader { version, dim, rows, chunk_digest }, index))
}

fn le_array<const N: usize>(bytes: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&bytes[..N]);
    out
}
