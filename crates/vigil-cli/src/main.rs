//! `vigil`: inspect live websites for privacy and compliance signals.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::info;
use vigil_core::AppConfig;

mod commands;
mod output;
mod runtime;

#[derive(Parser)]
#[command(
    name = "vigil",
    about = "Vigil: compliance inspection for live websites",
    version
)]
struct Cli {
    /// Configuration file (defaults to the platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Write logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Inspect one URL in a fresh browser context and assess it
    Scan {
        /// URL to inspect
        url: String,
        /// Persona to browse as
        #[arg(long)]
        persona: Option<String>,
        /// Navigation timeout (defaults to `scanning.timeout_ms`)
        #[arg(long)]
        timeout_ms: Option<u64>,
    },
    /// Inspect every URL listed in a file over the context pool
    Batch {
        /// File with one URL per line; `#` starts a comment
        file: PathBuf,
        /// Persona to browse as
        #[arg(long)]
        persona: Option<String>,
        /// Navigation timeout (defaults to `scanning.timeout_ms`)
        #[arg(long)]
        timeout_ms: Option<u64>,
        /// Scans in flight (defaults to `scanning.concurrent_scans`)
        #[arg(long)]
        concurrency: Option<usize>,
    },
    /// Manage rule packs
    Rules {
        #[command(subcommand)]
        action: RulesAction,
    },
    /// Median latency of concurrent pooled scans
    Bench {
        /// URL to inspect repeatedly
        #[arg(default_value = "https://example.com")]
        url: String,
        /// Number of concurrent scans
        #[arg(long, default_value = "25")]
        scans: usize,
        /// Navigation timeout (defaults to `scanning.timeout_ms`)
        #[arg(long)]
        timeout_ms: Option<u64>,
    },
}

#[derive(Subcommand)]
enum RulesAction {
    /// List installed rule packs
    List,
    /// Check a rule pack without installing it
    Validate {
        /// Rule pack file (JSON or TOML)
        path: PathBuf,
    },
    /// Validate a rule pack and install it as a community pack
    Add {
        /// Rule pack file (JSON or TOML)
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    if let Err(e) = run(cli).await {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = load_config(cli.config.as_deref())?;
    info!("vigil v{}", env!("CARGO_PKG_VERSION"));

    let timeout = |ms: Option<u64>| ms.unwrap_or(config.scanning.timeout_ms);

    match cli.command {
        Commands::Scan {
            url,
            persona,
            timeout_ms,
        } => {
            commands::scan::scan(
                &config,
                &url,
                persona.as_deref(),
                timeout(timeout_ms),
                cli.json,
            )
            .await
        }
        Commands::Batch {
            file,
            persona,
            timeout_ms,
            concurrency,
        } => {
            commands::scan::batch(
                &config,
                &file,
                persona.as_deref(),
                timeout(timeout_ms),
                concurrency.unwrap_or(config.scanning.concurrent_scans),
                cli.json,
            )
            .await
        }
        Commands::Rules { action } => match action {
            RulesAction::List => commands::rules::list(&config, cli.json),
            RulesAction::Validate { path } => commands::rules::validate(&path),
            RulesAction::Add { path } => commands::rules::add(&config, &path),
        },
        Commands::Bench {
            url,
            scans,
            timeout_ms,
        } => commands::bench::bench(&config, &url, scans, timeout(timeout_ms)).await,
    }
}

fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    match path {
        Some(path) => {
            let mut config = AppConfig::load_from(path)
                .with_context(|| format!("failed to load config from {}", path.display()))?;
            config.apply_overrides(|key| std::env::var(key).ok());
            config.validate()?;
            Ok(config)
        }
        None => AppConfig::load_with_env().context("failed to load config"),
    }
}

/// Logs go to stderr so `--json` output on stdout stays parseable.
fn init_tracing(json: bool) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,vigil=debug"));
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_bench_defaults() {
        let cli = Cli::parse_from(["vigil", "bench"]);
        match cli.command {
            Commands::Bench { url, scans, timeout_ms } => {
                assert_eq!(url, "https://example.com");
                assert_eq!(scans, 25);
                assert_eq!(timeout_ms, None);
            }
            _ => panic!("expected bench"),
        }
    }

    #[test]
    fn test_load_config_from_file() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[pool]\nsize = 2\n").expect("write config");

        let config = load_config(Some(&path)).expect("load config");
        assert_eq!(config.pool.size, 2);
    }
}
