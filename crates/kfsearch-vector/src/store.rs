//! Binary vector store.
//!
//! Layout, all integers little-endian:
//!
//! | offset | size | field |
//! |---|---|---|
//! | 0 | 4 | magic `KFVS` |
//! | 4 | 4 | format version |
//! | 8 | 4 | dimension D |
//! | 12 | 8 | row count N |
//! | 20 | 32 | blake3 of the payload |
//! | 52 | N·D·4 | row-major `f32` payload |
//!
//! Files are written to a sibling temp file and renamed into place.

use std::io::Write;
use std::path::Path;

use kfsearch_core::{Error, Result};

const MAGIC: &[u8; 4] = b"KFVS";
const VERSION: u32 = 1;
const HEADER_LEN: usize = 52;

#[derive(Debug, Clone, PartialEq)]
pub struct StoredVectors {
    pub dim: usize,
    pub count: usize,
    pub data: Vec<f32>,
}

pub fn encode(dim: usize, data: &[f32]) -> Result<Vec<u8>> {
    if dim == 0 || data.len() % dim != 0 {
        return Err(Error::Operation(format!(
            "payload of {} floats is not a whole number of {}-d rows",
            data.len(),
            dim
        )));
    }
    let count = (data.len() / dim) as u64;
    let dim32 = u32::try_from(dim).map_err(|_| Error::Operation(format!("dimension {} too large", dim)))?;

    let mut payload = Vec::with_capacity(data.len() * 4);
    for x in data {
        payload.extend_from_slice(&x.to_le_bytes());
    }
    let checksum = blake3::hash(&payload);

    let mut out = Vec::with_capacity(HEADER_LEN + payload.len());
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&VERSION.to_le_bytes());
    out.extend_from_slice(&dim32.to_le_bytes());
    out.extend_from_slice(&count.to_le_bytes());
    out.extend_from_slice(checksum.as_bytes());
    out.extend_from_slice(&payload);
    Ok(out)
}

/// Parse a store image. The error string names what is wrong.
pub fn decode(bytes: &[u8]) -> std::result::Result<StoredVectors, String> {
    if bytes.len() < HEADER_LEN {
        return Err(format!("file is {} bytes, shorter than the {}-byte header", bytes.len(), HEADER_LEN));
    }
    if &bytes[0..4] != MAGIC {
        return Err("bad magic, not a vector store".into());
    }
    let version = u32::from_le_bytes(read_array(&bytes[4..8]));
    if version != VERSION {
        return Err(format!("unsupported format version {}", version));
    }
    let dim = u32::from_le_bytes(read_array(&bytes[8..12])) as usize;
    let count = u64::from_le_bytes(read_array(&bytes[12..20]));
    if dim == 0 {
        return Err("dimension is zero".into());
    }
    let count = usize::try_from(count).map_err(|_| format!("row count {} too large", count))?;
    let expected_len = count
        .checked_mul(dim)
        .and_then(|n| n.checked_mul(4))
        .and_then(|n| n.checked_add(HEADER_LEN))
        .ok_or_else(|| "header sizes overflow".to_string())?;
    if bytes.len() != expected_len {
        return Err(format!(
            "expected {} bytes for {} rows of dimension {}, found {}",
            expected_len,
            count,
            dim,
            bytes.len()
        ));
    }
    let payload = &bytes[HEADER_LEN..];
    if blake3::hash(payload).as_bytes() != &bytes[20..52] {
        return Err("payload checksum mismatch".into());
    }
    let data = payload
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes(read_array(c)))
        .collect();
    Ok(StoredVectors { dim, count, data })
}

fn read_array<const N: usize>(slice: &[u8]) -> [u8; N] {
    let mut buf = [0u8; N];
    buf.copy_from_slice(&slice[..N]);
    buf
}

pub fn write(path: &Path, dim: usize, data: &[f32]) -> Result<()> {
    let bytes = encode(dim, data)?;
    write_atomic(path, &bytes)
}

pub fn read(path: &Path) -> Result<StoredVectors> {
    let bytes = std::fs::read(path).map_err(|e| Error::index_load(path, e))?;
    decode(&bytes).map_err(|reason| Error::index_load(path, reason))
}

pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| Error::Io(e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_decode_preserves_bits() {
        let data = vec![0.6f32, 0.8, -1.0, 0.0, f32::MIN_POSITIVE, 0.1];
        let bytes = encode(2, &data).unwrap();
        let stored = decode(&bytes).unwrap();
        assert_eq!(stored.dim, 2);
        assert_eq!(stored.count, 3);
        let same_bits = stored.data.iter().zip(&data).all(|(a, b)| a.to_bits() == b.to_bits());
        assert!(same_bits);
    }

    #[test]
    fn truncated_payload_is_rejected() {
        let bytes = encode(2, &[1.0, 0.0, 0.0, 1.0]).unwrap();
        let err = decode(&bytes[..bytes.len() - 4]).unwrap_err();
        assert!(err.contains("expected"), "{err}");
    }

    #[test]
    fn flipped_payload_byte_fails_checksum() {
        let mut bytes = encode(2, &[1.0, 0.0, 0.0, 1.0]).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0x01;
        assert_eq!(decode(&bytes).unwrap_err(), "payload checksum mismatch");
    }

    #[test]
    fn foreign_file_has_bad_magic() {
        let mut bytes = vec![0u8; HEADER_LEN];
        bytes[..4].copy_from_slice(b"FAIS");
        assert!(decode(&bytes).unwrap_err().contains("magic"));
    }

    #[test]
    fn ragged_payload_cannot_be_encoded() {
        assert!(encode(3, &[1.0, 2.0]).is_err());
        assert!(encode(0, &[]).is_err());
    }
}
