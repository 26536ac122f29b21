//! Wiring of browser, history store and scanner from configuration.

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use vigil_browser::{
    ChromiumEngine, ContextFactory, ContextPool, ContextProvider, EphemeralProvider,
    PersonaRegistry, PooledProvider,
};
use vigil_core::AppConfig;
use vigil_db::Database;
use vigil_scanner::{
    AnomalyDetector, Assessor, DarkPatternClassifier, DisabledClassifier, HttpClassifier,
    Inspector, ScriptHistory, SqliteScriptHistory,
};

/// How scans get their browsing contexts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextMode {
    /// Borrow from a pool created once at start-up
    Pooled,
    /// Create a fresh context per scan, honoring persona proxies
    Ephemeral,
}

/// Everything a command needs to inspect and assess pages.
pub struct Runtime {
    engine: Arc<ChromiumEngine>,
    pool: Option<Arc<ContextPool>>,
    database: Database,
    pub inspector: Inspector,
    pub assessor: Assessor,
}

impl Runtime {
    pub async fn start(config: &AppConfig, mode: ContextMode) -> Result<Self> {
        let personas = Arc::new(load_personas(&config.storage.personas_file)?);

        let db_path = config.database_path()?;
        let database = Database::open_and_migrate(&db_path)
            .await
            .with_context(|| format!("failed to open history at {}", db_path.display()))?;
        let history: Arc<dyn ScriptHistory> =
            Arc::new(SqliteScriptHistory::new(database.clone()));

        let classifier = build_classifier(config)?;

        let engine = Arc::new(
            ChromiumEngine::launch(&config.browser)
                .await
                .context("failed to launch browser")?,
        );

        let (provider, pool): (Arc<dyn ContextProvider>, Option<Arc<ContextPool>>) = match mode {
            ContextMode::Pooled => {
                let pool = Arc::new(ContextPool::init(&*engine, config.pool.size).await?);
                let provider = PooledProvider::new(
                    Arc::clone(&pool),
                    Duration::from_millis(config.pool.acquire_timeout_ms),
                );
                (Arc::new(provider), Some(pool))
            }
            ContextMode::Ephemeral => {
                let factory: Arc<dyn ContextFactory> = engine.clone();
                (Arc::new(EphemeralProvider::new(factory)), None)
            }
        };

        let inspector =
            Inspector::from_config(config, provider, personas, Arc::clone(&history), classifier)?;
        let detector =
            AnomalyDetector::new(history).with_threshold(config.thresholds.rare_script_share);
        let assessor = Assessor::new(&config.storage.rule_packs_dir, detector);

        info!(?mode, "runtime ready");
        Ok(Self {
            engine,
            pool,
            database,
            inspector,
            assessor,
        })
    }

    /// Close the pool, the browser and the database, in that order.
    pub async fn shutdown(self) {
        let Self {
            engine,
            pool,
            database,
            inspector,
            assessor,
        } = self;
        drop(inspector);
        drop(assessor);

        if let Some(pool) = pool {
            if let Err(e) = pool.shutdown().await {
                warn!(error = %e, "context pool did not shut down cleanly");
            }
        }
        match Arc::try_unwrap(engine) {
            Ok(engine) => engine.shutdown().await,
            Err(_) => warn!("browser engine still referenced at shutdown"),
        }
        database.close().await;
    }
}

/// Registry from `path`, or an empty one when the file does not exist.
pub fn load_personas(path: &Path) -> Result<PersonaRegistry> {
    if !path.exists() {
        warn!(path = %path.display(), "persona file not found; only the default persona is available");
        return Ok(PersonaRegistry::new());
    }
    Ok(PersonaRegistry::load(path)?)
}

fn build_classifier(config: &AppConfig) -> Result<Arc<dyn DarkPatternClassifier>> {
    match &config.classifier.endpoint {
        Some(endpoint) => {
            let classifier = HttpClassifier::new(
                endpoint.clone(),
                Duration::from_secs(config.classifier.timeout_secs),
            )?;
            Ok(Arc::new(classifier))
        }
        None => {
            info!("no classifier endpoint configured, visual analysis disabled");
            Ok(Arc::new(DisabledClassifier))
        }
    }
}
