//! Vigil Core - Foundation crate for the Vigil compliance scanner.
//!
//! This crate provides the scan result data model, severity scoring,
//! error handling and configuration that all other Vigil crates depend on.
//!
//! # Modules
//!
//! - [`error`] - Central error types using thiserror
//! - [`config`] - TOML-based configuration with XDG paths
//! - [`types`] - Scan results, script observations, violations and severities
//!
//! # Example
//!
//! ```rust
//! use vigil_core::{compliance_score, AppConfig, Severity, Violation};
//!
//! let config = AppConfig::default();
//! assert_eq!(config.pool.size, 5);
//!
//! let violations = vec![Violation::new("missing_cookie_banner", "No banner", Severity::High)];
//! assert_eq!(compliance_score(&violations), 70);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod config;
pub mod error;
pub mod types;

// Re-export commonly used types
pub use config::{
    AppConfig, BrowserConfig, ClassifierConfig, PoolConfig, ScanningConfig, StorageConfig,
    ThresholdConfig,
};
pub use error::{ConfigError, ConfigResult, Result, VigilError};
pub use types::{
    compliance_score, sha256_hex, CookieRecord, PersonaId, ScanId, ScanResult, ScriptObservation,
    Severity, Violation,
};
