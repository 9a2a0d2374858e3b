//! Streaming extraction of gzip-compressed tarballs
//!
//! Entries are decoded one at a time straight from the reader into the
//! destination tree; the archive is never buffered in memory. Only
//! directories and regular files are accepted. Every entry name goes
//! through [`sanitize_entry_path`] first, so a `..` that would climb out of
//! the destination aborts extraction with [`SiftError::PathEscape`].
//!
//! Extraction is not transactional: on failure the caller throws away the
//! whole destination.

use flate2::read::GzDecoder;
use sift_common::{Result, SiftError};
use std::fs::{self, File};
use std::io::{BufReader, Read, Write};
use std::path::{Component, Path, PathBuf};
use tar::EntryType;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// Bytes copied between cancellation checks within one entry
const CANCEL_CHECK_BYTES: u64 = 4 * 1024 * 1024;

/// Counts reported after a successful extraction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractSummary {
    pub directories: usize,
    pub files: usize,
    pub bytes: u64,
}

/// Resolve an archive entry name beneath `root`.
///
/// The result is `root` (lexically normalized) joined with the entry's
/// components. `.` and leading `/` are dropped, `..` pops a component, and
/// popping above `root` is a [`SiftError::PathEscape`]. No filesystem access.
pub fn sanitize_entry_path(root: &Path, entry: &Path) -> Result<PathBuf> {
    let escape = || SiftError::PathEscape {
        entry: entry.display().to_string(),
        root: root.display().to_string(),
    };

    let mut dest = normalize(root);
    let mut depth = 0usize;

    for component in entry.components() {
        match component {
            Component::Normal(part) => {
                dest.push(part);
                depth += 1;
            },
            Component::CurDir | Component::RootDir => {},
            Component::ParentDir => {
                if depth == 0 {
                    return Err(escape());
                }
                dest.pop();
                depth -= 1;
            },
            Component::Prefix(_) => return Err(escape()),
        }
    }

    Ok(dest)
}

/// Lexically clean a path: drop `.` and fold `..` into its parent
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {},
            Component::ParentDir => {
                if !out.pop() {
                    out.push(component);
                }
            },
            other => out.push(other),
        }
    }
    out
}

/// Extract a `.tar.gz` file into `dest`
pub fn extract_tar_gz_file(
    archive: &Path,
    dest: &Path,
    cancel: &CancellationToken,
) -> Result<ExtractSummary> {
    let file = File::open(archive)?;
    extract_tar_gz(BufReader::new(file), dest, cancel)
}

/// Extract a gzip-compressed tar stream into `dest`
pub fn extract_tar_gz<R: Read>(
    reader: R,
    dest: &Path,
    cancel: &CancellationToken,
) -> Result<ExtractSummary> {
    fs::create_dir_all(dest)?;
    let root = normalize(dest);

    let mut archive = tar::Archive::new(GzDecoder::new(reader));
    let mut summary = ExtractSummary::default();

    let entries = archive
        .entries()
        .map_err(|e| SiftError::archive_corrupt(format!("failed to read tar entries: {}", e)))?;

    for entry in entries {
        if cancel.is_cancelled() {
            return Err(SiftError::Cancelled("extracting archive".to_string()));
        }

        let mut entry =
            entry.map_err(|e| SiftError::archive_corrupt(format!("failed to read entry: {}", e)))?;
        let name = entry
            .path()
            .map_err(|e| SiftError::archive_corrupt(format!("invalid entry name: {}", e)))?
            .into_owned();
        let entry_type = entry.header().entry_type();

        // Archive-wide PAX metadata, not a filesystem entry
        if entry_type == EntryType::XGlobalHeader {
            trace!(entry = %name.display(), "skipping pax global header");
            continue;
        }

        let target = sanitize_entry_path(&root, &name)?;

        match entry_type {
            EntryType::Directory => {
                fs::create_dir_all(&target)?;
                summary.directories += 1;
            },
            EntryType::Regular => {
                if target == root {
                    return Err(SiftError::archive_corrupt(format!(
                        "regular file entry '{}' resolves to the extraction root",
                        name.display()
                    )));
                }
                if let Some(parent) = target.parent() {
                    fs::create_dir_all(parent)?;
                }

                let mut out = File::create(&target)?;
                let written = copy_entry(&mut entry, &mut out, &name, cancel)?;
                out.flush()?;

                trace!(entry = %name.display(), bytes = written, "extracted file");
                summary.files += 1;
                summary.bytes += written;
            },
            other => {
                return Err(SiftError::UnsupportedEntry {
                    entry: name.display().to_string(),
                    kind: format!("{:?}", other),
                });
            },
        }
    }

    debug!(
        dest = %root.display(),
        files = summary.files,
        directories = summary.directories,
        bytes = summary.bytes,
        "archive extracted"
    );

    Ok(summary)
}

/// Copy an entry body, telling decode failures apart from write failures.
///
/// Cancellation is checked every [`CANCEL_CHECK_BYTES`] so a single huge
/// entry cannot hold up a deadline.
fn copy_entry<R: Read, W: Write>(
    entry: &mut R,
    out: &mut W,
    name: &Path,
    cancel: &CancellationToken,
) -> Result<u64> {
    let mut buffer = [0u8; 8192];
    let mut total = 0u64;
    let mut since_check = 0u64;

    loop {
        if since_check >= CANCEL_CHECK_BYTES {
            if cancel.is_cancelled() {
                return Err(SiftError::Cancelled("extracting archive".to_string()));
            }
            since_check = 0;
        }

        let bytes_read = entry.read(&mut buffer).map_err(|e| {
            SiftError::archive_corrupt(format!("truncated entry '{}': {}", name.display(), e))
        })?;
        if bytes_read == 0 {
            break;
        }
        out.write_all(&buffer[..bytes_read])?;
        total += bytes_read as u64;
        since_check += bytes_read as u64;
    }

    Ok(total)
}
