//! Shared types used across the Vigil workspace.
//!
//! This module defines the scan result record and everything it carries:
//! cookies, script observations, violations and their severities.

use crate::error::VigilError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::borrow::Borrow;
use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;
use std::sync::OnceLock;

/// Hex-encoded SHA-256 of arbitrary bytes.
#[must_use]
pub fn sha256_hex(bytes: impl AsRef<[u8]>) -> String {
    hex::encode(Sha256::digest(bytes.as_ref()))
}

/// Identifier of one inspection run.
///
/// Derived from the target URL and the start instant, so two invocations
/// against the same URL get different identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScanId(String);

impl ScanId {
    /// Derive a scan ID from the target URL and the scan start time.
    #[must_use]
    pub fn derive(url: &str, started_at_nanos: i64) -> Self {
        Self(sha256_hex(format!("{url}-{started_at_nanos}")))
    }

    /// Get the inner string value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ScanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Newtype for persona identifiers with validation.
///
/// Any 1-64 character name without leading or trailing whitespace, so
/// `EU-Visitor` and `mobile.ios` are both fine.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PersonaId(String);

impl PersonaId {
    /// Create a new `PersonaId` from a string.
    ///
    /// # Errors
    /// Returns error if the ID doesn't match the required format.
    pub fn new(id: impl Into<String>) -> Result<Self, VigilError> {
        let id = id.into();
        Self::validate(&id)?;
        Ok(Self(id))
    }

    /// Get the inner string value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn validate(id: &str) -> Result<(), VigilError> {
        static PERSONA_REGEX: OnceLock<Regex> = OnceLock::new();
        let regex = PERSONA_REGEX
            .get_or_init(|| Regex::new(r"^\S(?:.{0,62}\S)?$").expect("valid regex"));

        if regex.is_match(id) {
            Ok(())
        } else {
            Err(VigilError::InvalidPersonaId(id.to_string()))
        }
    }
}

impl TryFrom<String> for PersonaId {
    type Error = VigilError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<PersonaId> for String {
    fn from(id: PersonaId) -> Self {
        id.0
    }
}

impl Borrow<str> for PersonaId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PersonaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Violation severity.
///
/// Serialized lowercase; deserialized case-insensitively through
/// [`Severity::parse`], so rule packs may write `High` or `HIGH`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum Severity {
    /// Must be fixed before anything else
    Critical,
    /// Serious compliance gap
    High,
    /// Worth investigating
    Medium,
    /// Informational
    Low,
}

impl Severity {
    /// Points deducted from the compliance score for one violation.
    #[must_use]
    pub fn weight(self) -> u32 {
        match self {
            Self::Critical => 50,
            Self::High => 30,
            Self::Medium => 15,
            Self::Low => 5,
        }
    }

    /// Parse a severity name, case-insensitively.
    ///
    /// # Errors
    /// Returns error if the name is not one of the four levels.
    pub fn parse(s: &str) -> Result<Self, VigilError> {
        match s.to_ascii_lowercase().as_str() {
            "critical" => Ok(Self::Critical),
            "high" => Ok(Self::High),
            "medium" => Ok(Self::Medium),
            "low" => Ok(Self::Low),
            _ => Err(VigilError::UnknownSeverity(s.to_string())),
        }
    }

    /// Lowercase name as used in rule packs and reports.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

impl TryFrom<String> for Severity {
    type Error = VigilError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A compliance problem found by a rule, the anomaly detector or the
/// visual classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    /// Rule or detector identifier (e.g. `missing_cookie_banner`, `dark_sneaking`)
    pub id: String,
    /// Human-readable description
    pub description: String,
    /// Severity level
    pub severity: Severity,
    /// Classifier probability or occurrence share, when there is one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

impl Violation {
    /// Create a violation without a confidence value.
    #[must_use]
    pub fn new(id: impl Into<String>, description: impl Into<String>, severity: Severity) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            severity,
            confidence: None,
        }
    }

    /// Attach a confidence value.
    #[must_use]
    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = Some(confidence);
        self
    }
}

/// Compliance score: 100 minus the summed severity weights, floored at 0.
#[must_use]
pub fn compliance_score(violations: &[Violation]) -> u32 {
    let total: u32 = violations.iter().map(|v| v.severity.weight()).sum();
    100u32.saturating_sub(total)
}

/// A cookie present in the browsing session after the page settled.
///
/// Values are deliberately not retained.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CookieRecord {
    /// Cookie name
    pub name: String,
    /// Cookie domain
    pub domain: String,
    /// Cookie path
    pub path: String,
    /// `Secure` flag
    pub secure: bool,
    /// `HttpOnly` flag
    pub http_only: bool,
    /// `SameSite` attribute, if set
    #[serde(default)]
    pub same_site: Option<String>,
    /// Expiry as seconds since the Unix epoch; `None` for session cookies
    #[serde(default)]
    pub expires: Option<f64>,
}

/// One `<script src>` seen on a scanned page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptObservation {
    /// Absolute script URL
    pub script_url: String,
    /// SHA-256 over the URL string; an identity key, not a content hash
    pub hash: String,
    /// Response body length, `None` when the fetch failed
    pub response_size: Option<u64>,
}

impl ScriptObservation {
    /// Build an observation for an absolute script URL.
    #[must_use]
    pub fn new(script_url: impl Into<String>, response_size: Option<u64>) -> Self {
        let script_url = script_url.into();
        let hash = Self::identity_hash(&script_url);
        Self {
            script_url,
            hash,
            response_size,
        }
    }

    /// Identity hash of a resolved script URL.
    #[must_use]
    pub fn identity_hash(script_url: &str) -> String {
        sha256_hex(script_url)
    }
}

/// Everything one inspection observed.
///
/// Built once per scan and never updated in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanResult {
    /// Target URL as requested
    pub url: String,
    /// Cookies present in the session
    pub cookies: Vec<CookieRecord>,
    /// Whether any banner selector matched
    pub cookie_banner_detected: bool,
    /// Selector patterns that matched, in catalogue order
    pub cookie_banner_selectors: Vec<String>,
    /// Wall-clock duration of the scan
    pub scan_time_ms: u64,
    /// Content of `<meta name="robots">`
    pub robots_meta: Option<String>,
    /// Every outbound request URL, in observation order
    pub network_requests: Vec<String>,
    /// Network locations contacted that differ from the target's own
    pub third_party_domains: BTreeSet<String>,
    /// Persona used for the browsing profile
    pub persona_id: Option<String>,
    /// Scripts referenced by the page
    pub scripts: Vec<ScriptObservation>,
    /// Violations found so far
    pub violations: Vec<Violation>,
    /// Identifier of this scan
    pub scan_id: ScanId,
    /// Where the raw HTML capture was written
    #[serde(default)]
    pub capture_path: Option<PathBuf>,
}

impl ScanResult {
    /// Return a copy of this result with extra violations appended.
    #[must_use]
    pub fn with_violations(mut self, extra: impl IntoIterator<Item = Violation>) -> Self {
        self.violations.extend(extra);
        self
    }

    /// Compliance score over this result's violations.
    #[must_use]
    pub fn score(&self) -> u32 {
        compliance_score(&self.violations)
    }
}
