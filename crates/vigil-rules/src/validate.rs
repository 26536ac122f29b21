//! Rule pack validation and installation.

use crate::error::{Result, RuleError};
use crate::loader::{pack_name, RuleLoader};
use crate::rule::{Predicate, RulePackDocument};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::info;

/// Subdirectory that installed packs are copied into.
pub const COMMUNITY_DIR: &str = "community";

/// Check a pack document, collecting every problem found.
///
/// Ids must be non-empty and unique within the pack, and every test must
/// be non-empty and compile in its dialect.
pub fn validate_pack(doc: &RulePackDocument) -> Result<()> {
    let mut problems = Vec::new();
    let mut seen = HashSet::new();

    if doc.rules.is_empty() {
        problems.push("pack declares no rules".to_string());
    }

    for (index, rule) in doc.rules.iter().enumerate() {
        let label = if rule.id.trim().is_empty() {
            problems.push(format!("rule #{index}: empty id"));
            format!("#{index}")
        } else {
            if !seen.insert(rule.id.as_str()) {
                problems.push(format!("rule {}: duplicate id", rule.id));
            }
            rule.id.clone()
        };

        if rule.test.trim().is_empty() {
            problems.push(format!("rule {label}: empty test"));
        } else if let Err(e) = Predicate::compile(rule.test_type, &rule.test) {
            problems.push(format!("rule {label}: {} test does not compile: {e}", rule.test_type));
        }
    }

    if problems.is_empty() {
        Ok(())
    } else {
        Err(RuleError::InvalidPack { problems })
    }
}

/// Validates rule packs and installs them below a rules directory.
#[derive(Debug, Clone)]
pub struct RulePackInstaller {
    rules_dir: PathBuf,
}

impl RulePackInstaller {
    /// Installer targeting `rules_dir`, which must exist.
    pub fn new(rules_dir: impl Into<PathBuf>) -> Result<Self> {
        let loader = RuleLoader::new(rules_dir)?;
        Ok(Self {
            rules_dir: loader.rules_dir().to_path_buf(),
        })
    }

    /// Validate a pack file without installing it.
    pub fn check(pack_path: &Path) -> Result<RulePackDocument> {
        let doc = RuleLoader::load_pack(pack_path)?;
        validate_pack(&doc)?;
        Ok(doc)
    }

    /// Validate a pack and copy it into `<rules_dir>/community/`.
    ///
    /// Returns the installed path. An existing pack of the same file name
    /// is replaced.
    pub fn add(&self, pack_path: &Path) -> Result<PathBuf> {
        let doc = Self::check(pack_path)?;

        let file_name = pack_path
            .file_name()
            .ok_or_else(|| RuleError::UnsupportedFormat {
                path: pack_path.display().to_string(),
            })?;
        let target_dir = self.rules_dir.join(COMMUNITY_DIR);
        std::fs::create_dir_all(&target_dir)?;
        let target = target_dir.join(file_name);
        std::fs::copy(pack_path, &target)?;

        info!(
            pack = %pack_name(pack_path),
            rules = doc.rules.len(),
            path = %target.display(),
            "installed rule pack"
        );
        Ok(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::{RuleDocument, TestType};
    use tempfile::TempDir;
    use vigil_core::Severity;

    fn doc(id: &str, test: &str, test_type: TestType) -> RuleDocument {
        RuleDocument {
            id: id.to_string(),
            description: String::new(),
            severity: Severity::Medium,
            test: test.to_string(),
            test_type,
        }
    }

    #[test]
    fn test_valid_pack() {
        let pack = RulePackDocument {
            description: "ok".to_string(),
            rules: vec![
                doc("a", "cookies", TestType::StructuredQuery),
                doc("b", "len(result.cookies) > 2", TestType::Expression),
            ],
        };
        assert!(validate_pack(&pack).is_ok());
    }

    #[test]
    fn test_collects_every_problem() {
        let pack = RulePackDocument {
            description: String::new(),
            rules: vec![
                doc("dup", "cookies", TestType::StructuredQuery),
                doc("dup", "cookies", TestType::StructuredQuery),
                doc("", "cookies", TestType::StructuredQuery),
                doc("blank", "  ", TestType::StructuredQuery),
                doc("bad", "__import__('os')", TestType::Expression),
            ],
        };

        let Err(RuleError::InvalidPack { problems }) = validate_pack(&pack) else {
            panic!("expected InvalidPack");
        };
        assert_eq!(problems.len(), 4);
        assert!(problems[0].contains("duplicate id"));
        assert!(problems[1].contains("empty id"));
        assert!(problems[2].contains("empty test"));
        assert!(problems[3].starts_with("rule bad: expression test"));
    }

    #[test]
    fn test_empty_pack_is_invalid() {
        let pack = RulePackDocument {
            description: String::new(),
            rules: Vec::new(),
        };
        assert!(matches!(
            validate_pack(&pack),
            Err(RuleError::InvalidPack { .. })
        ));
    }

    #[test]
    fn test_add_copies_into_community() {
        let rules_dir = TempDir::new().expect("create rules dir");
        let source_dir = TempDir::new().expect("create source dir");
        let pack = source_dir.path().join("gdpr.json");
        std::fs::write(
            &pack,
            r#"{"description": "GDPR", "rules": [{"id": "no_banner", "test": "cookie_banner_detected == false"}]}"#,
        )
        .expect("write pack");

        let installer = RulePackInstaller::new(rules_dir.path()).expect("create installer");
        let installed = installer.add(&pack).expect("install pack");

        assert_eq!(installed, rules_dir.path().join("community").join("gdpr.json"));
        let rules = RuleLoader::new(rules_dir.path())
            .expect("create loader")
            .load()
            .expect("load rules");
        assert!(rules.get("no_banner").is_some());
    }

    #[test]
    fn test_add_rejects_invalid_pack() {
        let rules_dir = TempDir::new().expect("create rules dir");
        let pack = rules_dir.path().join("bad.json");
        std::fs::write(&pack, r#"{"rules": [{"id": "x", "test": "cookies[?"}]}"#)
            .expect("write pack");

        let installer = RulePackInstaller::new(rules_dir.path()).expect("create installer");
        assert!(matches!(
            installer.add(&pack),
            Err(RuleError::InvalidPack { .. })
        ));
        assert!(!rules_dir.path().join("community").exists());
    }
}
