//! `sift files` command implementation

use crate::commands::LocalArgs;
use crate::error::Result;
use colored::Colorize;

/// Print the files under `args.dir` that the inclusion patterns select
pub async fn run(args: LocalArgs) -> Result<()> {
    let files = args.files()?;

    if files.is_empty() {
        eprintln!("{}", "No files matched the inclusion patterns.".yellow());
        return Ok(());
    }

    for file in &files {
        println!("{}", file);
    }

    Ok(())
}
