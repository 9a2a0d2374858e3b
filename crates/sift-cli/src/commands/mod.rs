//! CLI command implementations
//!
//! Each subcommand has its own module with a `run` function.

pub mod check;
pub mod files;
pub mod hash;
pub mod status;

use crate::error::{CliError, Result};
use std::path::{Path, PathBuf};

/// Inclusion patterns used by `hash` and `files` when none are given
pub const DEFAULT_LOCAL_INCLUDE: &str = "*";

/// Pick the inclusion spec from `--include`, `--include-file`, or the default
pub fn load_include(include: Option<&str>, include_file: Option<&Path>) -> Result<String> {
    match (include, include_file) {
        (Some(patterns), _) => Ok(patterns.to_string()),
        (None, Some(path)) => {
            if !path.exists() {
                return Err(CliError::FileNotFound(path.display().to_string()));
            }
            Ok(std::fs::read_to_string(path)?)
        },
        (None, None) => Ok(DEFAULT_LOCAL_INCLUDE.to_string()),
    }
}

/// List and filter the regular files under `dir`, sorted
pub fn filtered_files(dir: &Path, include: &str) -> Result<Vec<String>> {
    if !dir.is_dir() {
        return Err(CliError::FileNotFound(dir.display().to_string()));
    }

    let all = sift_ingest::files::list_files(dir)?;
    let mut included = sift_ingest::filter_file_list(&all, include);
    included.sort();

    tracing::debug!(total = all.len(), included = included.len(), "filtered local files");
    Ok(included)
}

/// Arguments shared by `hash` and `files`
#[derive(Debug, Clone)]
pub struct LocalArgs {
    pub dir: PathBuf,
    pub include: Option<String>,
    pub include_file: Option<PathBuf>,
}

impl LocalArgs {
    pub fn files(&self) -> Result<Vec<String>> {
        let include = load_include(self.include.as_deref(), self.include_file.as_deref())?;
        filtered_files(&self.dir, &include)
    }
}
