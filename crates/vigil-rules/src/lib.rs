//! Vigil Rules - compliance rules evaluated against scan results.
//!
//! Rules live in rule packs: JSON or TOML documents holding a description
//! and a list of rules. Each rule carries a test written in one of two
//! dialects, compiled once at load time:
//!
//! - **Structured query** ([`query`]): a JMESPath subset evaluated over the
//!   serialized scan result, e.g. `cookie_banner_detected == false`.
//! - **Expression** ([`expr`]): a small boolean/arithmetic language over a
//!   single name `result`, e.g. `len(result.third_party_domains) > 5`.
//!   Neither dialect can reach the filesystem, network or environment.
//!
//! # Example
//!
//! ```no_run
//! use vigil_rules::{RuleEngine, RuleLoader};
//!
//! # fn run(result: &vigil_core::ScanResult) -> Result<(), vigil_rules::RuleError> {
//! let rules = RuleLoader::new("rule-packs")?.load()?;
//! for violation in RuleEngine::new().evaluate(result, &rules) {
//!     println!("{} ({})", violation.id, violation.severity);
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod engine;
pub mod error;
pub mod expr;
pub mod loader;
pub mod query;
pub mod rule;
pub mod validate;
mod value;

// Re-export commonly used types
pub use engine::RuleEngine;
pub use error::{Result, RuleError};
pub use expr::Expression;
pub use loader::{PackSummary, RuleLoader};
pub use query::Query;
pub use rule::{Predicate, Rule, RuleDocument, RulePackDocument, RuleSet, TestType};
pub use validate::{validate_pack, RulePackInstaller, COMMUNITY_DIR};
