//! Content fingerprints over a file set
//!
//! The fingerprint only depends on the relative paths and the bytes of the
//! files. Paths are sorted before hashing, so enumeration order never leaks
//! into the result, and file metadata (mtime, mode, owner) is never read.
//!
//! The summary format is compatible with Go's `dirhash.Hash1`:
//!
//! ```text
//! <hex sha256 of content>  <path>\n     (one line per file, sorted by path)
//! ```
//!
//! and the fingerprint is `"h1:" + base64(sha256(summary))`.

use crate::error::{Result, SiftError};
use crate::types::Fingerprint;
use base64::Engine;
use sha2::{Digest, Sha256};
use std::io::Read;
use std::path::Path;

/// Prefix identifying the fingerprint scheme
pub const FINGERPRINT_PREFIX: &str = "h1:";

/// Compute the hex SHA-256 of any readable source
pub fn compute_sha256<R: Read>(reader: &mut R) -> std::io::Result<String> {
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];

    loop {
        let bytes_read = reader.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(hex::encode(hasher.finalize()))
}

/// Fingerprint a file set using a content accessor keyed by relative path.
///
/// `open` is called once per distinct path, in sorted order. Any error it
/// returns aborts the whole computation; no partial fingerprint is produced.
pub fn hash_files<F, R>(files: &[String], mut open: F) -> Result<Fingerprint>
where
    F: FnMut(&str) -> Result<R>,
    R: Read,
{
    let mut sorted: Vec<&str> = files.iter().map(String::as_str).collect();
    sorted.sort_unstable();
    sorted.dedup();

    let mut summary = Sha256::new();
    for path in sorted {
        if path.contains('\n') {
            return Err(SiftError::InvalidFileName(path.to_string()));
        }

        let mut reader = open(path)?;
        let digest = compute_sha256(&mut reader).map_err(|source| SiftError::FingerprintIo {
            path: path.to_string(),
            source,
        })?;

        summary.update(format!("{}  {}\n", digest, path).as_bytes());
    }

    let encoded = base64::engine::general_purpose::STANDARD.encode(summary.finalize());
    Ok(Fingerprint::new(format!("{}{}", FINGERPRINT_PREFIX, encoded)))
}

/// Fingerprint files listed relative to `root`
pub fn hash_dir_files(root: impl AsRef<Path>, files: &[String]) -> Result<Fingerprint> {
    let root = root.as_ref();
    hash_files(files, |path| open_relative(root, path))
}

/// Open `path` (with `/` separators) beneath `root`
pub fn open_relative(root: &Path, path: &str) -> Result<std::fs::File> {
    let full = path.split('/').fold(root.to_path_buf(), |acc, part| acc.join(part));
    std::fs::File::open(&full).map_err(|source| SiftError::FingerprintIo {
        path: path.to_string(),
        source,
    })
}
