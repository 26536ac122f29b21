//! `vigil bench`: concurrent pooled scans of one URL.

use crate::runtime::{ContextMode, Runtime};
use anyhow::{Context, Result};
use futures::stream::{FuturesUnordered, StreamExt};
use std::time::{Duration, Instant};
use tracing::info;
use vigil_core::AppConfig;

pub async fn bench(config: &AppConfig, url: &str, scans: usize, timeout_ms: u64) -> Result<()> {
    let runtime = Runtime::start(config, ContextMode::Pooled).await?;
    let inspector = &runtime.inspector;

    let mut runs: FuturesUnordered<_> = (0..scans)
        .map(|_| async move {
            let started = Instant::now();
            let outcome = inspector.inspect(url, timeout_ms, None).await;
            (started.elapsed(), outcome.is_ok())
        })
        .collect();

    let mut durations = Vec::with_capacity(scans);
    let mut failed = 0usize;
    while let Some((elapsed, ok)) = runs.next().await {
        durations.push(elapsed);
        if !ok {
            failed += 1;
        }
    }
    drop(runs);
    runtime.shutdown().await;

    let median = median(&mut durations).context("no scans were run")?;
    let median_ms = median.as_secs_f64() * 1000.0;
    info!(scans, failed, pool_size = config.pool.size, median_ms, "benchmark finished");
    println!(
        "Median scan duration for {scans} concurrent scans: {median_ms:.2} ms ({failed} failed)"
    );
    Ok(())
}

/// Middle sample, or the mean of the two middle samples for an even count.
fn median(samples: &mut [Duration]) -> Option<Duration> {
    if samples.is_empty() {
        return None;
    }
    samples.sort_unstable();
    let mid = samples.len() / 2;
    Some(if samples.len() % 2 == 0 {
        (samples[mid - 1] + samples[mid]) / 2
    } else {
        samples[mid]
    })
}
