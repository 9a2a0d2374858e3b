//! `sift check` command implementation
//!
//! Runs the pipeline for every selected source of the manifest and records
//! the outcome in the state file.

use crate::config::Config;
use crate::error::{CliError, Result};
use crate::manifest::Manifest;
use crate::state::StateStore;
use colored::Colorize;
use sift_ingest::{IngestConfig, Pipeline, PipelineState, Reconciler, RunReport};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Check the named sources (all of them when `names` is empty)
pub async fn run(config: &Config, names: &[String]) -> Result<()> {
    let manifest = Manifest::load(&config.manifest_path)?;
    let selected = manifest.select(names)?;
    if selected.is_empty() {
        println!("No sources defined in {}.", config.manifest_path.display());
        return Ok(());
    }

    let ingest = IngestConfig::from_env().map_err(|e| CliError::config(format!("{:#}", e)))?;
    let pipeline = Pipeline::new(Arc::new(manifest.resolver()), &ingest)?;
    let store = Arc::new(StateStore::open(&config.state_path)?);
    let reconciler = Reconciler::new(pipeline, store, &ingest);

    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupt received, cancelling runs");
                shutdown.cancel();
            }
        });
    }

    let filters: Vec<_> = selected.iter().map(|s| s.filter()).collect();
    info!(sources = filters.len(), "checking sources");
    let results = reconciler.reconcile_all(&filters, &shutdown).await;

    let mut failed = 0;
    for (source, result) in selected.iter().zip(results) {
        match result {
            Ok(report) => {
                if report.is_failure() {
                    failed += 1;
                }
                println!("{}", render(source.name(), &report));
            },
            Err(e) => {
                failed += 1;
                println!("{}: {} {}", source.name(), "ERROR".red().bold(), e);
            },
        }
    }

    if failed > 0 {
        return Err(CliError::RunsFailed {
            failed,
            total: selected.len(),
        });
    }

    Ok(())
}

/// One output line per source: name, terminal state, fingerprint or failure
fn render(name: &str, report: &RunReport) -> String {
    let state = report.terminal_state();
    let label = match state {
        PipelineState::Updated => state.as_str().green().bold(),
        PipelineState::Unchanged => state.as_str().normal(),
        _ => state.as_str().red().bold(),
    };

    let detail = match (report.fingerprint(), report.failure_message()) {
        (Some(fingerprint), _) => fingerprint.to_string(),
        (None, Some(message)) => message,
        (None, None) => report
            .events()
            .first()
            .map(|event| event.message())
            .unwrap_or_default(),
    };

    format!("{}: {} {}", name, label, detail)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use sift_common::{Reference, SiftError};
    use sift_ingest::{Outcome, Stage};

    #[test]
    fn test_render_failure_includes_message() {
        colored::control::set_override(false);
        let report = RunReport {
            reference: Reference::new("GitRepository", "v1", "app", "default"),
            artifact: None,
            outcome: Outcome::Failed {
                stage: Stage::Resolve,
                error: SiftError::resolve("GitRepository default/app", "artifact not yet available"),
            },
        };

        let line = render("app", &report);

        assert!(line.starts_with("app: RESOLVE_FAILED "), "{line}");
        assert!(line.contains("artifact not yet available"), "{line}");
    }

    #[test]
    fn test_render_missing_includes_hint() {
        colored::control::set_override(false);
        let report = RunReport {
            reference: Reference::new("GitRepository", "v1", "ghost", "default"),
            artifact: None,
            outcome: Outcome::Missing,
        };

        let line = render("ghost", &report);

        assert!(line.starts_with("ghost: MISSING resource `ghost` missing."), "{line}");
    }
}
