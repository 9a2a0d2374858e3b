//! `sift hash` command implementation
//!
//! Fingerprints a local directory the same way the pipeline fingerprints an
//! extracted artifact.

use crate::commands::LocalArgs;
use crate::error::Result;
use sift_common::fingerprint::hash_dir_files;

/// Print the fingerprint of the filtered files under `args.dir`
pub async fn run(args: LocalArgs, list: bool) -> Result<()> {
    let files = args.files()?;

    if list {
        for file in &files {
            println!("{}", file);
        }
    }

    let fingerprint = hash_dir_files(&args.dir, &files)?;
    println!("{}", fingerprint);

    Ok(())
}
