//! Vigil Scanner - compliance inspection of live pages.
//!
//! An [`Inspector`] borrows a browsing context, loads the target under a
//! persona and collects evidence: cookies, cookie-banner selectors,
//! network requests and third-party domains, robots directives, a raw
//! HTML capture, a screenshot for dark-pattern classification and every
//! referenced script. Scripts are recorded to an append-only history so
//! later scans can flag ones that are rare for the domain.
//!
//! # Features
//!
//! - Pooled or per-scan browsing contexts via `ContextProvider`
//! - Navigation bounded by a timeout that always releases the context
//! - Script history in `SQLite` or in memory
//! - Rule evaluation, anomaly detection and scoring in [`Assessor`]
//! - Concurrent batches with a bound on scans in flight
//!
//! # Example
//!
//! ```rust,ignore
//! use vigil_scanner::{Assessor, AnomalyDetector, Inspector};
//!
//! let inspector = Inspector::from_config(&config, provider, personas, history.clone(), classifier)?;
//! let result = inspector.inspect("https://shop.example", 30_000, Some("eu-visitor")).await?;
//!
//! let assessor = Assessor::new(&config.storage.rule_packs_dir, AnomalyDetector::new(history));
//! let assessment = assessor.assess(result).await?;
//! println!("score {}", assessment.score);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod anomaly;
pub mod assess;
pub mod batch;
pub mod capture;
pub mod error;
pub mod extractor;
pub mod history;
pub mod orchestrator;
pub mod scripts;
pub mod visual;

// Re-export commonly used types
pub use anomaly::AnomalyDetector;
pub use assess::{Assessment, Assessor};
pub use batch::{inspect_batch, BatchOutcome};
pub use capture::HtmlCapture;
pub use error::{Result, ScanError, ScanErrorKind};
pub use history::{InMemoryScriptHistory, ScriptHistory, SqliteScriptHistory};
pub use orchestrator::{Inspector, InspectorSettings};
pub use scripts::{HttpScriptFetcher, ScriptFetcher, ScriptIntegrityRecorder};
pub use visual::{DarkPatternClassifier, DisabledClassifier, HttpClassifier, VisualAnomalyAdapter};
