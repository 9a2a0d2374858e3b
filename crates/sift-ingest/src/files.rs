//! Regular-file enumeration beneath a root directory

use sift_common::{Result, SiftError};
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

/// Restartable listing of the regular files under a root.
///
/// Each call to [`FileList::iter`] walks the tree again. Yielded paths are
/// relative to the root and always use `/` as separator. The set of paths is
/// deterministic; the order is not, so callers that need a stable order
/// (fingerprinting) sort it themselves.
#[derive(Debug, Clone)]
pub struct FileList {
    root: PathBuf,
}

impl FileList {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Lazily walk the tree
    pub fn iter(&self) -> impl Iterator<Item = Result<String>> + '_ {
        WalkDir::new(&self.root)
            .follow_links(false)
            .into_iter()
            .filter_map(move |entry| match entry {
                Ok(entry) if entry.file_type().is_file() => {
                    Some(relative_slash_path(&self.root, entry.path()))
                },
                Ok(_) => None,
                Err(e) => Some(Err(SiftError::Io(e.into()))),
            })
    }

    /// Walk the tree and collect every path, failing on the first error
    pub fn collect(&self) -> Result<Vec<String>> {
        self.iter().collect()
    }
}

impl<'a> IntoIterator for &'a FileList {
    type Item = Result<String>;
    type IntoIter = Box<dyn Iterator<Item = Result<String>> + 'a>;

    fn into_iter(self) -> Self::IntoIter {
        Box::new(self.iter())
    }
}

/// List all regular files under `root`
pub fn list_files(root: impl AsRef<Path>) -> Result<Vec<String>> {
    FileList::new(root.as_ref()).collect()
}

fn relative_slash_path(root: &Path, path: &Path) -> Result<String> {
    let relative = path.strip_prefix(root).map_err(|_| {
        SiftError::InvalidFileName(format!("{} is not under {}", path.display(), root.display()))
    })?;

    let mut parts = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_str().ok_or_else(|| {
                SiftError::InvalidFileName(relative.to_string_lossy().into_owned())
            })?),
            _ => {
                return Err(SiftError::InvalidFileName(relative.to_string_lossy().into_owned()));
            },
        }
    }

    Ok(parts.join("/"))
}
