//! Rule pack loading from a directory of JSON and TOML documents.

use crate::{
    error::{Result, RuleError},
    rule::{Rule, RulePackDocument, RuleSet},
};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Summary of one rule pack on disk, as shown by `rules list`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackSummary {
    /// File stem of the pack
    pub name: String,
    /// Pack description
    pub description: String,
    /// Number of rules declared
    pub rule_count: usize,
    /// Where the pack lives
    pub path: PathBuf,
}

/// Loader for rule packs below a directory.
#[derive(Debug, Clone)]
pub struct RuleLoader {
    rules_dir: PathBuf,
}

impl RuleLoader {
    /// Create a loader rooted at `rules_dir`.
    ///
    /// # Errors
    /// Returns [`RuleError::DirectoryNotFound`] if the path is not a directory.
    pub fn new(rules_dir: impl Into<PathBuf>) -> Result<Self> {
        let rules_dir = rules_dir.into();
        if !rules_dir.is_dir() {
            return Err(RuleError::DirectoryNotFound {
                path: rules_dir.display().to_string(),
            });
        }
        Ok(Self { rules_dir })
    }

    /// Root directory of this loader.
    #[must_use]
    pub fn rules_dir(&self) -> &Path {
        &self.rules_dir
    }

    /// Load and compile every rule below the directory.
    ///
    /// Packs are visited in sorted path order. Unreadable packs and rules
    /// whose test does not compile are skipped with a warning.
    pub fn load(&self) -> Result<RuleSet> {
        let mut rules = Vec::new();

        for path in self.pack_paths()? {
            let doc = match Self::load_pack(&path) {
                Ok(doc) => doc,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "failed to load rule pack");
                    continue;
                }
            };

            for rule_doc in &doc.rules {
                match Rule::compile(rule_doc) {
                    Ok(rule) => rules.push(rule),
                    Err(e) => warn!(
                        path = %path.display(),
                        rule_id = %rule_doc.id,
                        error = %e,
                        "skipping rule"
                    ),
                }
            }
            debug!(path = %path.display(), rules = doc.rules.len(), "loaded rule pack");
        }

        info!(
            count = rules.len(),
            dir = %self.rules_dir.display(),
            "loaded rules"
        );

        Ok(RuleSet::new(rules))
    }

    /// Describe every readable pack below the directory.
    pub fn list_packs(&self) -> Result<Vec<PackSummary>> {
        let mut packs = Vec::new();
        for path in self.pack_paths()? {
            match Self::load_pack(&path) {
                Ok(doc) => packs.push(PackSummary {
                    name: pack_name(&path),
                    description: doc.description,
                    rule_count: doc.rules.len(),
                    path,
                }),
                Err(e) => warn!(path = %path.display(), error = %e, "failed to load rule pack"),
            }
        }
        Ok(packs)
    }

    /// Parse one rule pack document by extension.
    pub fn load_pack(path: &Path) -> Result<RulePackDocument> {
        let format = PackFormat::of(path).ok_or_else(|| RuleError::UnsupportedFormat {
            path: path.display().to_string(),
        })?;

        let contents = std::fs::read_to_string(path).map_err(|e| RuleError::LoadError {
            path: path.display().to_string(),
            source: e,
        })?;

        let parsed = match format {
            PackFormat::Json => serde_json::from_str(&contents).map_err(|e| e.to_string()),
            PackFormat::Toml => toml::from_str(&contents).map_err(|e| e.to_string()),
        };
        parsed.map_err(|reason| RuleError::ParseError {
            path: path.display().to_string(),
            reason,
        })
    }

    fn pack_paths(&self) -> Result<Vec<PathBuf>> {
        let mut paths = Vec::new();
        collect_packs(&self.rules_dir, &mut paths)?;
        paths.sort();
        Ok(paths)
    }
}

#[derive(Debug, Clone, Copy)]
enum PackFormat {
    Json,
    Toml,
}

impl PackFormat {
    fn of(path: &Path) -> Option<Self> {
        match path.extension().and_then(|s| s.to_str()) {
            Some("json") => Some(Self::Json),
            Some("toml") => Some(Self::Toml),
            _ => None,
        }
    }
}

pub(crate) fn pack_name(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_string()
}

fn collect_packs(dir: &Path, paths: &mut Vec<PathBuf>) -> Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_packs(&path, paths)?;
        } else if PackFormat::of(&path).is_some() {
            paths.push(path);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use vigil_core::Severity;

    fn write(dir: &Path, rel: &str, contents: &str) -> PathBuf {
        let path = dir.join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("create pack dir");
        }
        std::fs::write(&path, contents).expect("write pack");
        path
    }

    const BASELINE: &str = r#"{
        "description": "Baseline checks",
        "rules": [
            {"id": "missing_cookie_banner", "description": "No banner", "severity": "high",
             "test": "cookie_banner_detected == false"},
            {"id": "too_many_third_parties", "test": "len(result.third_party_domains) > 3",
             "test_type": "python"}
        ]
    }"#;

    #[test]
    fn test_new_with_missing_dir() {
        let err = RuleLoader::new("/nonexistent/rules").unwrap_err();
        assert!(matches!(err, RuleError::DirectoryNotFound { .. }));
    }

    #[test]
    fn test_load_json_and_toml_in_sorted_order() {
        let dir = TempDir::new().expect("create temp dir");
        write(dir.path(), "b_baseline.json", BASELINE);
        write(
            dir.path(),
            "a/robots.toml",
            r#"
description = "Robots"

[[rules]]
id = "noindex"
severity = "LOW"
test = "robots_meta == 'noindex'"
"#,
        );

        let rules = RuleLoader::new(dir.path())
            .expect("create loader")
            .load()
            .expect("load rules");

        let ids: Vec<&str> = rules.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(
            ids,
            vec!["noindex", "missing_cookie_banner", "too_many_third_parties"]
        );
        assert_eq!(rules.get("noindex").expect("rule").severity, Severity::Low);
        assert_eq!(
            rules.get("too_many_third_parties").expect("rule").severity,
            Severity::Medium
        );
    }

    #[test]
    fn test_load_skips_bad_documents_and_rules() {
        let dir = TempDir::new().expect("create temp dir");
        write(dir.path(), "broken.json", "{ not json");
        write(dir.path(), "notes.txt", "ignored");
        write(
            dir.path(),
            "mixed.json",
            r#"{"rules": [
                {"id": "bad", "test": "cookies[?"},
                {"id": "good", "test": "cookies"}
            ]}"#,
        );

        let rules = RuleLoader::new(dir.path())
            .expect("create loader")
            .load()
            .expect("load rules");

        assert_eq!(rules.len(), 1);
        assert!(rules.get("good").is_some());
    }

    #[test]
    fn test_list_packs() {
        let dir = TempDir::new().expect("create temp dir");
        write(dir.path(), "baseline.json", BASELINE);

        let packs = RuleLoader::new(dir.path())
            .expect("create loader")
            .list_packs()
            .expect("list packs");

        assert_eq!(packs.len(), 1);
        assert_eq!(packs[0].name, "baseline");
        assert_eq!(packs[0].description, "Baseline checks");
        assert_eq!(packs[0].rule_count, 2);
    }

    #[test]
    fn test_load_pack_rejects_unknown_extension() {
        let dir = TempDir::new().expect("create temp dir");
        let path = write(dir.path(), "pack.yaml", "rules: []");
        assert!(matches!(
            RuleLoader::load_pack(&path),
            Err(RuleError::UnsupportedFormat { .. })
        ));
    }
}
