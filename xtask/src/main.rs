//! Build automation tasks for Sift
//!
//! - `generate-cli-docs`: render the `sift` command reference to Markdown

use clap::Parser;
use std::fs;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "xtask")]
#[command(about = "Build automation tasks for Sift", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Parser)]
enum Command {
    /// Generate the CLI reference in Markdown
    GenerateCliDocs {
        /// Output directory for generated documentation
        #[arg(short, long, default_value = "docs")]
        output_dir: String,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::GenerateCliDocs { output_dir } => generate_cli_docs(&output_dir)?,
    }

    Ok(())
}

fn generate_cli_docs(output_dir: &str) -> anyhow::Result<()> {
    println!("Generating CLI documentation...");

    // Generate markdown from clap definitions
    let markdown = clap_markdown::help_markdown::<sift_cli::Cli>();

    let content = format!(
        r#"# Sift CLI Reference

This documentation is generated from the CLI source code. Last updated: {}.

## Overview

Sift watches upstream artifacts (gzip-compressed tarballs published by a
catalog), keeps only the files selected by gitignore-style inclusion
patterns, and fingerprints them. A source is reported as `UPDATED` only when
the fingerprint of its selected files changes.

## Quick Start

```bash
# Preview which files a pattern set selects
sift files ./checkout --include $'go.*\ninternal/**/*.go\n!.*'

# Fingerprint a local directory
sift hash ./checkout --include-file .siftinclude

# Check every source declared in sift.yml
sift check

# Show stored fingerprints and conditions
sift status
```

## Manifest

```yaml
sources:
  - name: app
    sourceRef:
      kind: GitRepository
      name: app
      namespace: default
    include: |
      go.*
      internal/**/*.go
      !.*
catalog:
  - reference:
      kind: GitRepository
      name: app
      namespace: default
    artifact:
      url: https://artifacts.example.com/app.tar.gz
```

## Environment

| Variable | Default | Purpose |
|----------|---------|---------|
| `SIFT_MANIFEST` | `sift.yml` | Manifest path |
| `SIFT_STATE_FILE` | `.sift/state.json` | State file path |
| `SIFT_FETCH_TIMEOUT_SECS` | `300` | Whole-request download timeout |
| `SIFT_FETCH_CONNECT_TIMEOUT_SECS` | `30` | Connect timeout |
| `SIFT_USER_AGENT` | `sift/<version>` | HTTP user agent |
| `SIFT_SCRATCH_DIR` | OS temp dir | Parent of per-run scratch areas |
| `SIFT_MAX_CONCURRENT_RUNS` | `4` | Sources checked in parallel |
| `SIFT_RUN_TIMEOUT_SECS` | `600` | Deadline for one run |
| `LOG_LEVEL`, `LOG_OUTPUT`, `LOG_FORMAT` | `warn`, `console`, `text` | Logging |

## Commands

{}

---

*This documentation is generated from the CLI source code. To update, run `cargo xtask generate-cli-docs`.*
"#,
        chrono::Utc::now().format("%Y-%m-%d"),
        markdown
    );

    // Create output directory if it doesn't exist
    let output_path = PathBuf::from(output_dir);
    fs::create_dir_all(&output_path)?;

    let file_path = output_path.join("cli-reference.md");
    fs::write(&file_path, content)?;

    println!("Generated CLI documentation at: {}", file_path.display());

    Ok(())
}
