//! Configuration management for Vigil.
//!
//! Provides TOML-based configuration with XDG-compliant paths and
//! environment variable overrides.

use crate::error::{ConfigError, ConfigResult};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main application configuration.
///
/// This is loaded from `~/.config/vigil/config.toml` (or platform equivalent).
/// If the file doesn't exist, default values are used.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Scan behavior settings
    pub scanning: ScanningConfig,
    /// Browser context pool settings
    pub pool: PoolConfig,
    /// Browser launch settings
    pub browser: BrowserConfig,
    /// Detection thresholds
    pub thresholds: ThresholdConfig,
    /// Where things are read from and written to
    pub storage: StorageConfig,
    /// Dark-pattern classifier settings
    pub classifier: ClassifierConfig,
}

impl AppConfig {
    /// Load configuration from disk, falling back to defaults if not found.
    ///
    /// # Errors
    /// Returns error if:
    /// - Config directory cannot be determined
    /// - File exists but cannot be read
    /// - File contents are not valid TOML
    pub fn load() -> ConfigResult<Self> {
        let config_path = Self::config_path()?;
        Self::load_from(&config_path)
    }

    /// Load configuration from a specific file, falling back to defaults if it
    /// doesn't exist.
    pub fn load_from(config_path: &Path) -> ConfigResult<Self> {
        if config_path.exists() {
            tracing::debug!("Loading config from {}", config_path.display());
            let contents = fs::read_to_string(config_path)?;
            let config: Self = toml::from_str(&contents)?;
            config.validate()?;
            Ok(config)
        } else {
            tracing::debug!("Config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Load configuration with environment variable overrides.
    ///
    /// Supports the following environment variables:
    /// - `VIGIL_HEADLESS`: Override browser headless mode (true/false)
    /// - `VIGIL_POOL_SIZE`: Override the number of pooled browser contexts
    /// - `VIGIL_SCAN_TIMEOUT_MS`: Override the navigation timeout
    /// - `VIGIL_CLASSIFIER_URL`: Set the dark-pattern classifier endpoint
    /// - `VIGIL_DATABASE_PATH`: Override the script history database location
    pub fn load_with_env() -> ConfigResult<Self> {
        let mut config = Self::load()?;
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from a variable lookup (normally the process environment).
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(val) = lookup("VIGIL_HEADLESS") {
            if let Ok(headless) = val.parse() {
                self.browser.headless = headless;
                tracing::debug!("Override browser.headless from env: {}", headless);
            }
        }

        if let Some(val) = lookup("VIGIL_POOL_SIZE") {
            if let Ok(size) = val.parse() {
                self.pool.size = size;
                tracing::debug!("Override pool.size from env: {}", size);
            }
        }

        if let Some(val) = lookup("VIGIL_SCAN_TIMEOUT_MS") {
            if let Ok(timeout) = val.parse() {
                self.scanning.timeout_ms = timeout;
                tracing::debug!("Override scanning.timeout_ms from env: {}", timeout);
            }
        }

        if let Some(val) = lookup("VIGIL_CLASSIFIER_URL") {
            tracing::debug!("Override classifier.endpoint from env: {}", val);
            self.classifier.endpoint = Some(val);
        }

        if let Some(val) = lookup("VIGIL_DATABASE_PATH") {
            tracing::debug!("Override storage.database_path from env: {}", val);
            self.storage.database_path = Some(PathBuf::from(val));
        }
    }

    /// Check values that would make the engine misbehave.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.pool.size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "pool.size".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        for (field, value) in [
            ("thresholds.rare_script_share", self.thresholds.rare_script_share),
            (
                "thresholds.dark_pattern_probability",
                self.thresholds.dark_pattern_probability,
            ),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::InvalidValue {
                    field: field.to_string(),
                    reason: format!("must be within [0, 1], got {value}"),
                });
            }
        }

        if self.scanning.concurrent_scans == 0 {
            return Err(ConfigError::InvalidValue {
                field: "scanning.concurrent_scans".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        Ok(())
    }

    /// Save configuration to disk.
    ///
    /// Creates the config directory if it doesn't exist.
    pub fn save(&self) -> ConfigResult<()> {
        let config_path = Self::config_path()?;
        let config_dir = config_path
            .parent()
            .ok_or_else(|| ConfigError::InvalidValue {
                field: "config_path".to_string(),
                reason: "no parent directory".to_string(),
            })?;

        fs::create_dir_all(config_dir)?;
        tracing::debug!("Saving config to {}", config_path.display());

        let contents = toml::to_string_pretty(self)?;
        fs::write(config_path, contents)?;
        Ok(())
    }

    /// Get the path to the configuration file.
    ///
    /// Uses XDG base directories: `~/.config/vigil/config.toml`
    pub fn config_path() -> ConfigResult<PathBuf> {
        let dirs = ProjectDirs::from("com", "vigil", "vigil").ok_or(ConfigError::NoConfigDir)?;
        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Get the data directory path.
    ///
    /// Uses XDG base directories: `~/.local/share/vigil`
    pub fn data_dir() -> ConfigResult<PathBuf> {
        let dirs = ProjectDirs::from("com", "vigil", "vigil").ok_or(ConfigError::NoConfigDir)?;
        Ok(dirs.data_dir().to_path_buf())
    }

    /// Script history database path, defaulting to `<data_dir>/history.db`.
    pub fn database_path(&self) -> ConfigResult<PathBuf> {
        match &self.storage.database_path {
            Some(path) => Ok(path.clone()),
            None => Ok(Self::data_dir()?.join("history.db")),
        }
    }

    /// Raw HTML capture directory, defaulting to `<data_dir>/captures`.
    pub fn capture_dir(&self) -> ConfigResult<PathBuf> {
        match &self.storage.capture_dir {
            Some(path) => Ok(path.clone()),
            None => Ok(Self::data_dir()?.join("captures")),
        }
    }
}

/// Scan behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanningConfig {
    /// Navigation timeout in milliseconds
    pub timeout_ms: u64,
    /// Quiet period with no new requests before the page counts as settled
    pub network_idle_ms: u64,
    /// How long to keep re-checking for a late cookie banner
    pub banner_grace_ms: u64,
    /// Per-script fetch timeout in milliseconds
    pub script_fetch_timeout_ms: u64,
    /// Script fetches in flight per scan
    pub script_fetch_concurrency: usize,
    /// Scans in flight for batch runs
    pub concurrent_scans: usize,
    /// User agent when the persona doesn't set one
    pub user_agent: String,
}

impl Default for ScanningConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 120_000,
            network_idle_ms: 500,
            banner_grace_ms: 2_000,
            script_fetch_timeout_ms: 5_000,
            script_fetch_concurrency: 4,
            concurrent_scans: 5,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string(),
        }
    }
}

/// Browser context pool settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Number of contexts created at start-up
    pub size: usize,
    /// How long a scan may wait for a free context
    pub acquire_timeout_ms: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            size: 5,
            acquire_timeout_ms: 60_000,
        }
    }
}

/// Browser launch settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    /// Run browser in headless mode
    pub headless: bool,
    /// Explicit Chrome/Chromium binary; auto-detected when unset
    pub chrome_executable: Option<PathBuf>,
    /// Browser window width
    pub window_width: u32,
    /// Browser window height
    pub window_height: u32,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            chrome_executable: None,
            window_width: 1280,
            window_height: 800,
        }
    }
}

/// Detection thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdConfig {
    /// Scripts whose historical share is below this are flagged
    pub rare_script_share: f64,
    /// Dark-pattern probabilities above this are flagged
    pub dark_pattern_probability: f64,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            rare_script_share: 0.01,
            dark_pattern_probability: 0.70,
        }
    }
}

/// Storage locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Script history database; `<data_dir>/history.db` when unset
    pub database_path: Option<PathBuf>,
    /// Raw HTML capture directory; `<data_dir>/captures` when unset
    pub capture_dir: Option<PathBuf>,
    /// Directory of rule-pack documents
    pub rule_packs_dir: PathBuf,
    /// Persona registry file
    pub personas_file: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            capture_dir: None,
            rule_packs_dir: PathBuf::from("rule-packs"),
            personas_file: PathBuf::from("personas.json"),
        }
    }
}

/// Dark-pattern classifier settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// HTTP endpoint accepting screenshots; visual analysis is off when unset
    pub endpoint: Option<String>,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            timeout_secs: 30,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.scanning.timeout_ms, 120_000);
        assert_eq!(config.pool.size, 5);
        assert!(config.browser.headless);
        assert!((config.thresholds.rare_script_share - 0.01).abs() < f64::EPSILON);
        assert!((config.thresholds.dark_pattern_probability - 0.70).abs() < f64::EPSILON);
        assert!(config.classifier.endpoint.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_serialization() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("[scanning]"));
        assert!(toml_str.contains("[pool]"));
        assert!(toml_str.contains("[thresholds]"));

        let parsed: AppConfig = toml::from_str(&toml_str).expect("parse serialized config");
        assert_eq!(parsed.pool.size, config.pool.size);
    }

    #[test]
    fn test_load_from_file() {
        let tmp = TempDir::new().expect("create temp dir");
        let config_path = tmp.path().join("config.toml");

        let mut config = AppConfig::default();
        config.pool.size = 2;
        config.thresholds.dark_pattern_probability = 0.9;
        fs::write(&config_path, toml::to_string_pretty(&config).expect("serialize"))
            .expect("write config file");

        let loaded = AppConfig::load_from(&config_path).expect("load config");
        assert_eq!(loaded.pool.size, 2);
        assert!((loaded.thresholds.dark_pattern_probability - 0.9).abs() < f64::EPSILON);
    }

    #[test]
    fn test_load_from_missing_file_uses_defaults() {
        let tmp = TempDir::new().expect("create temp dir");
        let loaded = AppConfig::load_from(&tmp.path().join("absent.toml")).expect("load");
        assert_eq!(loaded.pool.size, 5);
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("VIGIL_HEADLESS", "false"),
            ("VIGIL_POOL_SIZE", "9"),
            ("VIGIL_SCAN_TIMEOUT_MS", "5000"),
            ("VIGIL_CLASSIFIER_URL", "http://localhost:9000/classify"),
            ("VIGIL_POOL_SIZE_IGNORED", "1"),
        ]);

        let mut config = AppConfig::default();
        config.apply_overrides(|key| vars.get(key).map(ToString::to_string));

        assert!(!config.browser.headless);
        assert_eq!(config.pool.size, 9);
        assert_eq!(config.scanning.timeout_ms, 5000);
        assert_eq!(
            config.classifier.endpoint.as_deref(),
            Some("http://localhost:9000/classify")
        );
        assert!(config.storage.database_path.is_none());
    }

    #[test]
    fn test_unparseable_override_is_ignored() {
        let mut config = AppConfig::default();
        config.apply_overrides(|key| (key == "VIGIL_POOL_SIZE").then(|| "lots".to_string()));
        assert_eq!(config.pool.size, 5);
    }

    #[test]
    fn test_partial_config() {
        let toml_str = r#"
[pool]
size = 3

[thresholds]
rare_script_share = 0.05
"#;

        let config: AppConfig = toml::from_str(toml_str).expect("parse partial config");
        assert_eq!(config.pool.size, 3);
        assert!((config.thresholds.rare_script_share - 0.05).abs() < f64::EPSILON);
        // These should be defaults
        assert_eq!(config.scanning.network_idle_ms, 500);
        assert!(config.browser.headless);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = AppConfig::default();
        config.pool.size = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { field, .. }) if field == "pool.size"
        ));

        let mut config = AppConfig::default();
        config.thresholds.dark_pattern_probability = 1.5;
        assert!(config.validate().is_err());
    }
}
