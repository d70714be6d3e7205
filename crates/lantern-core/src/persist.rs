//! Saves and restores the vector index and document store as a pair of files.
//!
//! One logical storage path `p` maps to two artifacts:
//! - `p.json`: JSON array of `{ "text": ... }` records
//! - `p.index`: binary vector blob
//!
//! Index blob layout (little endian):
//! - 4 bytes: magic `LNVX`
//! - 4 bytes: format version (u32)
//! - 4 bytes: dimension D (u32)
//! - 8 bytes: vector count N (u64)
//! - N * D * 4 bytes: f32 values in row-major order

use std::ffi::OsString;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::store::{DocumentRecord, DocumentStore};
use crate::vector_index::{IndexError, VectorIndex};

const MAGIC: &[u8; 4] = b"LNVX";
const FORMAT_VERSION: u32 = 1;
const HEADER_SIZE: usize = 20;

/// The two artifact paths derived from one storage path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoragePaths {
    pub metadata: PathBuf,
    pub index: PathBuf,
}

impl StoragePaths {
    pub fn new(base: impl AsRef<Path>) -> Self {
        let base = base.as_ref();
        Self {
            metadata: with_suffix(base, ".json"),
            index: with_suffix(base, ".index"),
        }
    }
}

fn with_suffix(base: &Path, suffix: &str) -> PathBuf {
    let mut s = OsString::from(base.as_os_str());
    s.push(suffix);
    PathBuf::from(s)
}

/// Write both artifacts.
///
/// Each file is first written to a temporary sibling and only renamed into place once
/// both temporaries are complete, so a failed write never touches the previous pair.
pub fn save(index: &VectorIndex, store: &DocumentStore, paths: &StoragePaths) -> Result<(), PersistError> {
    let metadata = serde_json::to_vec(store.records()).map_err(PersistError::Serialize)?;
    let blob = encode_index(index)?;

    let meta_tmp = write_temp(&paths.metadata, &metadata)?;
    let index_tmp = write_temp(&paths.index, &blob)?;

    index_tmp
        .persist(&paths.index)
        .map_err(|e| PersistError::Write(paths.index.clone(), e.error))?;
    // The new index is in place; a failure here leaves the pair mismatched.
    meta_tmp.persist(&paths.metadata).map_err(|e| {
        tracing::error!(
            path = %paths.metadata.display(),
            error = %e.error,
            "metadata rename failed after index rename, stored pair is inconsistent"
        );
        PersistError::Inconsistent(paths.metadata.clone(), e.error)
    })?;

    tracing::debug!(
        records = store.len(),
        path = %paths.metadata.display(),
        "saved vector store"
    );
    Ok(())
}

/// Read both artifacts. Missing pair means a fresh, empty store.
pub fn load(paths: &StoragePaths, dim: usize) -> Result<(VectorIndex, DocumentStore), PersistError> {
    let has_meta = paths.metadata.exists();
    let has_index = paths.index.exists();

    match (has_meta, has_index) {
        (false, false) => {
            tracing::info!(path = %paths.metadata.display(), "no stored data, starting empty");
            return Ok((VectorIndex::new(dim)?, DocumentStore::new()));
        }
        (true, false) => return Err(corrupt(&paths.index, "index file missing")),
        (false, true) => return Err(corrupt(&paths.metadata, "metadata file missing")),
        (true, true) => {}
    }

    let raw = std::fs::read(&paths.metadata)
        .map_err(|e| PersistError::Read(paths.metadata.clone(), e))?;
    let records: Vec<DocumentRecord> = serde_json::from_slice(&raw)
        .map_err(|e| corrupt(&paths.metadata, format!("invalid metadata: {e}")))?;

    let blob = std::fs::read(&paths.index).map_err(|e| PersistError::Read(paths.index.clone(), e))?;
    let index = decode_index(&blob, dim).map_err(|reason| corrupt(&paths.index, reason))?;

    if index.len() != records.len() {
        return Err(corrupt(
            &paths.metadata,
            format!(
                "record count mismatch: {} metadata records, {} vectors",
                records.len(),
                index.len()
            ),
        ));
    }

    tracing::info!(
        records = records.len(),
        dim,
        path = %paths.metadata.display(),
        "loaded vector store"
    );
    Ok((index, DocumentStore::from_records(records)))
}

fn write_temp(dest: &Path, bytes: &[u8]) -> Result<NamedTempFile, PersistError> {
    let dir = match dest.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir).map_err(|e| PersistError::Write(dir.clone(), e))?;

    let write = |tmp: &mut NamedTempFile| -> std::io::Result<()> {
        tmp.write_all(bytes)?;
        tmp.flush()?;
        tmp.as_file().sync_all()
    };
    let mut tmp = NamedTempFile::new_in(&dir).map_err(|e| PersistError::Write(dest.to_path_buf(), e))?;
    write(&mut tmp).map_err(|e| PersistError::Write(dest.to_path_buf(), e))?;
    Ok(tmp)
}

fn encode_index(index: &VectorIndex) -> Result<Vec<u8>, PersistError> {
    let dim = u32::try_from(index.dim()).map_err(|_| PersistError::TooLarge("dimension"))?;
    let count = u64::try_from(index.len()).map_err(|_| PersistError::TooLarge("vector count"))?;
    let flat = index.as_flat();

    let mut out = Vec::with_capacity(HEADER_SIZE + flat.len() * 4);
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    out.extend_from_slice(&dim.to_le_bytes());
    out.extend_from_slice(&count.to_le_bytes());
    for v in flat {
        out.extend_from_slice(&v.to_le_bytes());
    }
    Ok(out)
}

fn decode_index(bytes: &[u8], dim: usize) -> Result<VectorIndex, String> {
    if bytes.len() < HEADER_SIZE {
        return Err(format!("index file too short ({} bytes)", bytes.len()));
    }
    if &bytes[0..4] != MAGIC {
        return Err("bad index magic".to_string());
    }
    let version = u32::from_le_bytes(le_array(&bytes[4..8]));
    if version != FORMAT_VERSION {
        return Err(format!("unsupported index format version {version}"));
    }
    let stored_dim = u32::from_le_bytes(le_array(&bytes[8..12])) as usize;
    if stored_dim != dim {
        return Err(format!("index dimension {stored_dim} does not match configured {dim}"));
    }
    let count = u64::from_le_bytes(le_array(&bytes[12..20]));

    let expected = usize::try_from(count)
        .ok()
        .and_then(|n| n.checked_mul(dim))
        .and_then(|n| n.checked_mul(4))
        .and_then(|n| n.checked_add(HEADER_SIZE));
    if expected != Some(bytes.len()) {
        return Err(format!(
            "index file length {} does not hold {count} vectors of dimension {dim}",
            bytes.len()
        ));
    }

    let data: Vec<f32> = bytes[HEADER_SIZE..]
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes(le_array(c)))
        .collect();
    VectorIndex::from_flat(dim, data).map_err(|e| e.to_string())
}

fn le_array<const N: usize>(bytes: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(bytes);
    out
}

fn corrupt(path: &Path, reason: impl Into<String>) -> PersistError {
    PersistError::CorruptStorage {
        path: path.to_path_buf(),
        reason: reason.into(),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    #[error("corrupt storage at {path}: {reason}")]
    CorruptStorage { path: PathBuf, reason: String },
    #[error("read error for {0}: {1}")]
    Read(PathBuf, std::io::Error),
    #[error("write error for {0}: {1}")]
    Write(PathBuf, std::io::Error),
    /// Index was replaced but its metadata was not.
    #[error("stored pair left inconsistent, could not replace {0}: {1}")]
    Inconsistent(PathBuf, std::io::Error),
    #[error("failed to serialize records: {0}")]
    Serialize(serde_json::Error),
    #[error("{0} too large for the index format")]
    TooLarge(&'static str),
    #[error(transparent)]
    Index(#[from] IndexError),
}
