//! `vigil scan` and `vigil batch`.

use crate::output;
use crate::runtime::{ContextMode, Runtime};
use anyhow::{bail, Context, Result};
use std::path::Path;
use vigil_scanner::{inspect_batch, Assessment, BatchOutcome};

pub async fn scan(
    config: &vigil_core::AppConfig,
    url: &str,
    persona: Option<&str>,
    timeout_ms: u64,
    json: bool,
) -> Result<()> {
    let runtime = Runtime::start(config, ContextMode::Ephemeral).await?;

    let outcome = match runtime.inspector.inspect(url, timeout_ms, persona).await {
        Ok(result) => runtime.assessor.assess(result).await,
        Err(e) => Err(e),
    };
    runtime.shutdown().await;

    let assessment = outcome.with_context(|| format!("scan of {url} failed"))?;
    output::print_assessment(&assessment, json)
}

pub async fn batch(
    config: &vigil_core::AppConfig,
    file: &Path,
    persona: Option<&str>,
    timeout_ms: u64,
    concurrency: usize,
    json: bool,
) -> Result<()> {
    let urls = read_url_list(file)?;
    if urls.is_empty() {
        bail!("no URLs in {}", file.display());
    }

    let runtime = Runtime::start(config, ContextMode::Pooled).await?;
    let outcomes = inspect_batch(&runtime.inspector, &urls, timeout_ms, persona, concurrency).await;

    let mut reports: Vec<(String, Result<Assessment>)> = Vec::with_capacity(outcomes.len());
    for BatchOutcome { url, result } in outcomes {
        let assessed = match result {
            Ok(result) => runtime.assessor.assess(result).await.map_err(Into::into),
            Err(e) => Err(e.into()),
        };
        reports.push((url, assessed));
    }
    runtime.shutdown().await;

    let mut failed = 0;
    for (url, report) in &reports {
        match report {
            Ok(assessment) => output::print_assessment(assessment, json)?,
            Err(e) => {
                failed += 1;
                output::print_failure(url, e, json);
            }
        }
    }

    if failed > 0 {
        bail!("{failed} of {} scans failed", reports.len());
    }
    Ok(())
}

/// URLs listed one per line; blank lines and `#` comments are skipped.
fn read_url_list(path: &Path) -> Result<Vec<String>> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    Ok(contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect())
}
