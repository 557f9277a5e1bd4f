//! GGUF header checks performed before a model is handed to a loader.

use std::fs::File;
use std::io::{ErrorKind, Read};
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};

use crate::error::LoadError;

pub const GGUF_MAGIC: &[u8; 4] = b"GGUF";

/// GGUF v1 used 32-bit counts and is no longer produced by llama.cpp.
pub const SUPPORTED_VERSIONS: RangeInclusive<u32> = 2..=3;

/// magic + version + tensor count + metadata kv count
pub const HEADER_LEN: usize = 4 + 4 + 8 + 8;

/// Header facts about a model artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactInfo {
    pub path: PathBuf,
    pub size_bytes: u64,
    pub version: u32,
    pub tensor_count: u64,
    pub metadata_kv_count: u64,
}

/// Checks that `path` names a readable GGUF file of at least `min_bytes`.
pub fn inspect(path: &Path, min_bytes: u64) -> Result<ArtifactInfo, LoadError> {
    let corrupt = |reason: String| LoadError::Corrupt {
        path: path.to_path_buf(),
        reason,
    };

    let metadata = match std::fs::metadata(path) {
        Ok(m) => m,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(LoadError::NotFound(path.to_path_buf()))
        }
        Err(e) => return Err(corrupt(format!("cannot read metadata: {}", e))),
    };

    if !metadata.is_file() {
        return Err(corrupt("not a regular file".to_string()));
    }

    let size_bytes = metadata.len();
    if size_bytes < min_bytes {
        return Err(corrupt(format!(
            "file is {} bytes, expected at least {}",
            size_bytes, min_bytes
        )));
    }

    let mut header = [0u8; HEADER_LEN];
    let mut file = File::open(path).map_err(|e| corrupt(format!("cannot open: {}", e)))?;
    file.read_exact(&mut header).map_err(|e| {
        if e.kind() == ErrorKind::UnexpectedEof {
            corrupt(format!("truncated header ({} bytes)", size_bytes))
        } else {
            corrupt(format!("cannot read header: {}", e))
        }
    })?;

    if &header[0..4] != GGUF_MAGIC {
        return Err(corrupt("missing GGUF magic".to_string()));
    }

    let version = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);
    if !SUPPORTED_VERSIONS.contains(&version) {
        return Err(corrupt(format!("unsupported GGUF version {}", version)));
    }

    let tensor_count = read_u64(&header[8..16]);
    let metadata_kv_count = read_u64(&header[16..24]);

    Ok(ArtifactInfo {
        path: path.to_path_buf(),
        size_bytes,
        version,
        tensor_count,
        metadata_kv_count,
    })
}

fn read_u64(bytes: &[u8]) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(bytes);
    u64::from_le_bytes(buf)
}
