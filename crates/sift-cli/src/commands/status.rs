//! `sift status` command implementation
//!
//! Shows the stored observed state and the latest conditions of every
//! source in the state file.

use crate::config::Config;
use crate::error::Result;
use crate::state::StateFile;
use colored::Colorize;
use sift_ingest::status::ConditionStatus;

/// Show stored state
pub async fn run(config: &Config) -> Result<()> {
    let state = StateFile::load(&config.state_path)?;

    if state.sources.is_empty() {
        println!("No recorded sources in {}.", config.state_path.display());
        println!("Run 'sift check' to populate it.");
        return Ok(());
    }

    println!("{}", "Sources:".cyan().bold());
    println!();

    for source in state.sources.values() {
        println!("{}", source.reference.to_string().green());
        match &source.observed {
            Some(observed) => {
                println!("  Fingerprint: {}", observed.fingerprint);
                println!("  URL:         {}", observed.url);
                if !observed.artifact.revision.is_empty() {
                    println!("  Revision:    {}", observed.artifact.revision);
                }
                println!("  Files:       {}", observed.observed_file_list.len());
            },
            None => println!("  Fingerprint: {}", "none".dimmed()),
        }
        println!("  Updated:     {}", source.updated_at.format("%Y-%m-%d %H:%M:%S UTC"));

        for condition in &source.conditions {
            let status = match condition.status {
                ConditionStatus::True => condition.status.to_string().green(),
                ConditionStatus::False => condition.status.to_string().red(),
            };
            println!(
                "  {:<17} {} ({}) {}",
                format!("{}:", condition.kind),
                status,
                condition.reason,
                condition.message
            );
        }
        println!();
    }

    println!("{}", "Summary:".cyan().bold());
    println!("  Total sources: {}", state.sources.len());
    println!("  State file:    {}", config.state_path.display());

    Ok(())
}
